use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::{
    session_cookie,
    templates::{DashboardBody, FetchFailed, Layout, LoginPage, RegisterPage},
    views::Dashboard,
};
use crate::{
    api::errors::AppError,
    auth::{
        models::{Admin, SessionId, SignUpOutcome},
        AuthError,
    },
    db::{self, models::DryerReading},
    export,
    listing::ViewState,
    session::{Access, GateState, SessionGate},
    state::AppState,
    validation::{LoginForm, RegisterForm, ValidationErrors},
};

/// How long a sign-in or sign-out waits for the session gate to catch up
/// before redirecting.
const GATE_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

const CONFIRM_NOTICE: &str = "Check your inbox to confirm your email address, then sign in.";

fn page(status: StatusCode, title: &str, admin_name: Option<&str>, body: impl markup::Render) -> Response {
    let html = Layout {
        title,
        admin_name,
        body,
    }
    .to_string();
    (status, Html(html)).into_response()
}

async fn settle(gate: &SessionGate, sid: SessionId, predicate: impl FnMut(&GateState) -> bool) {
    if timeout(GATE_SETTLE_TIMEOUT, gate.wait_for(sid, predicate)).await.is_err() {
        warn!("Session gate did not settle before redirect");
    }
}

/// Whether the browser behind `jar` already has a live admin session.
async fn signed_in(state: &AppState, jar: &CookieJar) -> bool {
    let sid = session_cookie::session_id(jar);
    matches!(state.gate.resolve(&state.auth, sid).await, Access::Granted(_))
}

/// Bind the browser to its new session `sid`, ending the session its cookie
/// pointed at before.
async fn start_session(state: &AppState, jar: CookieJar, sid: SessionId) -> CookieJar {
    if let Some(previous) = session_cookie::session_id(&jar) {
        if let Err(e) = state.auth.sign_out(previous).await {
            warn!(error = %e, "Failed to end the browser's previous session");
        }
    }
    settle(&state.gate, sid, |s| s.admin.is_some()).await;
    session_cookie::issue(jar, sid)
}

/// Message shown on the form, and the status to answer with.
fn provider_failure(e: &AuthError, rejected_status: StatusCode) -> (StatusCode, String) {
    match e {
        AuthError::Rejected { message, .. } => (rejected_status, message.clone()),
        _ => (
            StatusCode::BAD_GATEWAY,
            "The sign-in service is unavailable. Please try again.".to_owned(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Sign in / sign up / sign out
// ---------------------------------------------------------------------------

pub async fn index() -> Redirect {
    Redirect::to("/dashboard")
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Set after a sign-up that still needs email confirmation.
    #[serde(default)]
    pub confirm: bool,
}

pub async fn login_form(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> Response {
    if signed_in(&state, &jar).await {
        return Redirect::to("/dashboard").into_response();
    }
    let notice = query.confirm.then_some(CONFIRM_NOTICE);
    login_page(StatusCode::OK, "", &ValidationErrors::default(), None, notice)
}

fn login_page(
    status: StatusCode,
    email: &str,
    errors: &ValidationErrors,
    error: Option<&str>,
    notice: Option<&str>,
) -> Response {
    page(
        status,
        "Sign in",
        None,
        LoginPage {
            email,
            errors,
            error,
            notice,
        },
    )
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => {
            return login_page(StatusCode::UNPROCESSABLE_ENTITY, &form.email, &errors, None, None);
        }
    };

    let sid = SessionId::new();
    match state
        .auth
        .sign_in(sid, &credentials.email, &credentials.password)
        .await
    {
        Ok(admin) => {
            info!(email = %admin.email, "Operator signed in");
            let jar = start_session(&state, jar, sid).await;
            (jar, Redirect::to("/dashboard")).into_response()
        }
        Err(e) => {
            warn!(email = %credentials.email, error = %e, "Sign-in failed");
            let (status, message) = provider_failure(&e, StatusCode::UNAUTHORIZED);
            login_page(
                status,
                &credentials.email,
                &ValidationErrors::default(),
                Some(&message),
                None,
            )
        }
    }
}

pub async fn register_form(State(state): State<AppState>, jar: CookieJar) -> Response {
    if signed_in(&state, &jar).await {
        return Redirect::to("/dashboard").into_response();
    }
    register_page(StatusCode::OK, &RegisterForm::default(), &ValidationErrors::default(), None)
}

fn register_page(
    status: StatusCode,
    form: &RegisterForm,
    errors: &ValidationErrors,
    error: Option<&str>,
) -> Response {
    page(
        status,
        "Create account",
        None,
        RegisterPage {
            full_name: &form.full_name,
            email: &form.email,
            errors,
            error,
        },
    )
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    let sign_up = match form.validate() {
        Ok(sign_up) => sign_up,
        Err(errors) => return register_page(StatusCode::UNPROCESSABLE_ENTITY, &form, &errors, None),
    };
    let email = &sign_up.credentials.email;
    let full_name = sign_up.full_name.as_deref();

    let sid = SessionId::new();
    let outcome = match state
        .auth
        .sign_up(sid, email, &sign_up.credentials.password, full_name)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(email = %email, error = %e, "Sign-up failed");
            let (status, message) = provider_failure(&e, StatusCode::BAD_REQUEST);
            return register_page(status, &form, &ValidationErrors::default(), Some(&message));
        }
    };

    let admin = outcome.admin();
    if let Err(e) = db::insert_admin_profile(&state.pool, admin.id, &admin.email, full_name).await {
        error!(email = %admin.email, error = %e, "Failed to create admin profile");
    }

    match outcome {
        SignUpOutcome::SignedIn(admin) => {
            info!(email = %admin.email, "Operator signed up");
            let jar = start_session(&state, jar, sid).await;
            (jar, Redirect::to("/dashboard")).into_response()
        }
        SignUpOutcome::ConfirmationRequired(_) => Redirect::to("/login?confirm=true").into_response(),
    }
}

/// Ends only the calling browser's session.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(sid) = session_cookie::session_id(&jar) {
        if let Err(e) = state.auth.sign_out(sid).await {
            warn!(error = %e, "Provider sign-out failed; local session cleared");
        }
        settle(&state.gate, sid, |s| s.admin.is_none()).await;
    }
    (session_cookie::clear(jar), Redirect::to("/login"))
}

// ---------------------------------------------------------------------------
// Dashboard & exports
// ---------------------------------------------------------------------------

/// All readings up to the configured cap, or the error page to answer with.
async fn load_readings(state: &AppState, admin: &Admin) -> Result<Vec<DryerReading>, Response> {
    db::fetch_all_readings(&state.pool, state.fetch_limit)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch dryer readings");
            fetch_failed(admin)
        })
}

fn fetch_failed(admin: &Admin) -> Response {
    page(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Error",
        Some(admin.display_name()),
        FetchFailed {},
    )
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(admin): Extension<Admin>,
    Query(view): Query<ViewState>,
) -> Response {
    let readings = match load_readings(&state, &admin).await {
        Ok(readings) => readings,
        Err(response) => return response,
    };

    match Dashboard::build(admin.display_name(), &view, &readings, Utc::now()) {
        Ok(dash) => page(
            StatusCode::OK,
            "Dashboard",
            Some(admin.display_name()),
            DashboardBody { dash: &dash },
        ),
        Err(e) => {
            error!(error = %e, "Failed to render dashboard");
            fetch_failed(&admin)
        }
    }
}

/// The filtered and sorted table, every page, as a CSV download.
pub async fn export_csv(
    State(state): State<AppState>,
    Extension(admin): Extension<Admin>,
    Query(view): Query<ViewState>,
) -> Response {
    let readings = match load_readings(&state, &admin).await {
        Ok(readings) => readings,
        Err(response) => return response,
    };

    let now = Utc::now();
    let listing = view.apply(&readings, now);
    let body = match export::to_csv(&listing.rows) {
        Ok(body) => body,
        Err(e) => return AppError(e).into_response(),
    };
    info!(rows = listing.rows.len(), "CSV export");

    let disposition = format!("attachment; filename=\"{}\"", export::csv_file_name(now));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// The filtered and sorted table as a page that opens the print dialog.
pub async fn export_print(
    State(state): State<AppState>,
    Extension(admin): Extension<Admin>,
    Query(view): Query<ViewState>,
) -> Response {
    let readings = match load_readings(&state, &admin).await {
        Ok(readings) => readings,
        Err(response) => return response,
    };

    let now = Utc::now();
    let listing = view.apply(&readings, now);
    info!(rows = listing.rows.len(), "Printable export");
    Html(export::to_printable_html(&listing.rows, now)).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{header, HeaderValue, StatusCode};
    use axum_test::TestResponse;
    use chrono::{TimeDelta, Utc};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use crate::{
        auth::models::SessionId,
        test_support::{
            lazy_pool, loading_server, operator_session, session_cookie, TestApp, UNUSED_AUTH,
        },
        web::session_cookie::SESSION_COOKIE,
    };

    const USER_ID: &str = "7b1f0a3e-4a57-4f4e-9d0e-2f0c3f8b6a11";

    fn token_body(expires_in: i64) -> String {
        json!({
            "access_token": "access-1",
            "token_type": "bearer",
            "expires_in": expires_in,
            "refresh_token": "refresh-1",
            "user": {
                "id": USER_ID,
                "email": "ops@example.com",
                "user_metadata": { "full_name": "Jane Operator" }
            }
        })
        .to_string()
    }

    async fn mock_password_grant(provider: &mut ServerGuard, expires_in: i64) {
        provider
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body(expires_in))
            .create_async()
            .await;
    }

    async fn log_in(app: &TestApp) -> TestResponse {
        app.server
            .post("/login")
            .form(&[("email", "ops@example.com"), ("password", "secret123")])
            .await
    }

    /// The session id a response handed to the browser.
    fn issued_session(resp: &TestResponse) -> SessionId {
        resp.cookie(SESSION_COOKIE).value().parse().unwrap()
    }

    async fn session_admin(app: &TestApp, cookie: Option<HeaderValue>) -> Value {
        let mut req = app.server.get("/api/session");
        if let Some(cookie) = cookie {
            req = req.add_header(header::COOKIE, cookie);
        }
        let body: Value = req.await.json();
        body["admin"].clone()
    }

    async fn insert_reading(pool: &PgPool, dryer_type: &str, battery: f64, t1: f64, minutes_ago: i64) {
        sqlx::query(
            "INSERT INTO dryer_data (type, t1, bat_percentage, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(dryer_type)
        .bind(t1)
        .bind(battery)
        .bind(Utc::now() - TimeDelta::minutes(minutes_ago))
        .execute(pool)
        .await
        .unwrap();
    }

    // -----------------------------------------------------------------------
    // Guard
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn index_redirects_to_dashboard() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        let resp = app.server.get("/").await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/dashboard");
    }

    #[tokio::test]
    async fn dashboard_redirects_to_login_without_session() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        app.signed_in_browser().await;

        let resp = app.server.get("/dashboard").await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/login");
    }

    #[tokio::test]
    async fn dashboard_shows_placeholder_while_loading() {
        let resp = loading_server().get("/export/csv").await;
        resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.header("retry-after"), "1");
        assert!(resp.text().contains("Loading..."));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn operator_login_does_not_sign_in_other_browsers(pool: PgPool) {
        let mut provider = Server::new_async().await;
        mock_password_grant(&mut provider, 3600).await;
        let logout = provider
            .mock("POST", "/auth/v1/logout")
            .match_query(Matcher::UrlEncoded("scope".into(), "local".into()))
            .match_header("authorization", "Bearer access-1")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let app = TestApp::start(pool, &provider.url()).await;

        let resp = log_in(&app).await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/dashboard");
        let operator = session_cookie(issued_session(&resp));

        // A second browser with no cookie.
        for path in ["/dashboard", "/export/csv", "/export/print"] {
            let resp = app.server.get(path).await;
            resp.assert_status(StatusCode::SEE_OTHER);
            assert_eq!(resp.header("location"), "/login");
        }
        app.server
            .get("/api/readings")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(session_admin(&app, None).await, Value::Null);
        app.server.get("/login").await.assert_status_ok();

        // A third browser guessing a session id.
        let forged = session_cookie(SessionId::new());
        let resp = app
            .server
            .get("/dashboard")
            .add_header(header::COOKIE, forged.clone())
            .await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(session_admin(&app, Some(forged.clone())).await, Value::Null);

        // Neither can sign the operator out.
        app.server.post("/logout").await.assert_status(StatusCode::SEE_OTHER);
        app.server
            .post("/logout")
            .add_header(header::COOKIE, forged)
            .await
            .assert_status(StatusCode::SEE_OTHER);

        let resp = app
            .server
            .get("/dashboard")
            .add_header(header::COOKIE, operator.clone())
            .await;
        resp.assert_status_ok();
        assert!(resp.text().contains("Jane Operator"));
        assert_eq!(
            session_admin(&app, Some(operator.clone())).await["email"],
            "ops@example.com"
        );

        // The operator's own sign-out ends the session.
        let resp = app
            .server
            .post("/logout")
            .add_header(header::COOKIE, operator.clone())
            .await;
        resp.assert_status(StatusCode::SEE_OTHER);
        let resp = app
            .server
            .get("/dashboard")
            .add_header(header::COOKIE, operator.clone())
            .await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/login");
        assert_eq!(session_admin(&app, Some(operator)).await, Value::Null);
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn failed_refresh_sends_browser_to_login() {
        let mut provider = Server::new_async().await;
        mock_password_grant(&mut provider, 10).await;
        let refresh = provider
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .match_body(Matcher::Json(json!({ "refresh_token": "refresh-1" })))
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#)
            .expect(1)
            .create_async()
            .await;
        let app = TestApp::start(lazy_pool(), &provider.url()).await;

        let resp = log_in(&app).await;
        resp.assert_status(StatusCode::SEE_OTHER);
        let sid = issued_session(&resp);

        let resp = app
            .server
            .get("/dashboard")
            .add_header(header::COOKIE, session_cookie(sid))
            .await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/login");
        refresh.assert_async().await;

        let state = tokio::time::timeout(
            Duration::from_secs(2),
            app.gate.wait_for(sid, |s| s.admin.is_none()),
        )
        .await
        .unwrap();
        assert!(!state.loading);
        assert!(app.auth.session(sid).await.unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn login_form_renders_for_signed_out_visitor() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        let resp = app.server.get("/login").await;
        resp.assert_status_ok();
        assert!(resp.text().contains("Sign in"));
    }

    #[tokio::test]
    async fn login_form_shows_confirmation_notice() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        let resp = app.server.get("/login").add_query_param("confirm", "true").await;
        assert!(resp.text().contains("confirm your email"));
    }

    #[tokio::test]
    async fn login_form_redirects_signed_in_browser() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        let cookie = app.signed_in_browser().await;

        let resp = app.server.get("/login").add_header(header::COOKIE, cookie).await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/dashboard");
    }

    #[tokio::test]
    async fn invalid_login_is_rejected_without_provider_call() {
        let mut provider = Server::new_async().await;
        let mock = provider
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let app = TestApp::start(lazy_pool(), &provider.url()).await;

        let resp = app
            .server
            .post("/login")
            .form(&[("email", "nope"), ("password", "123")])
            .await;

        resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let html = resp.text();
        assert!(html.contains("Enter a valid email address"));
        assert!(html.contains("Password must be at least 6 characters"));
        assert!(resp.maybe_cookie(SESSION_COOKIE).is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn successful_login_issues_session_cookie() {
        let mut provider = Server::new_async().await;
        mock_password_grant(&mut provider, 3600).await;
        let app = TestApp::start(lazy_pool(), &provider.url()).await;

        let resp = log_in(&app).await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/dashboard");

        let cookie = resp.cookie(SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        let sid: SessionId = cookie.value().parse().unwrap();
        assert!(app.gate.state(Some(sid)).admin.is_some());
    }

    #[tokio::test]
    async fn login_replaces_the_browsers_previous_session() {
        let mut provider = Server::new_async().await;
        mock_password_grant(&mut provider, 3600).await;
        provider
            .mock("POST", "/auth/v1/logout")
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;
        let app = TestApp::start(lazy_pool(), &provider.url()).await;
        let previous = SessionId::new();
        let old_cookie = app
            .browser_with(previous, operator_session(i64::MAX))
            .await;

        let resp = app
            .server
            .post("/login")
            .add_header(header::COOKIE, old_cookie)
            .form(&[("email", "ops@example.com"), ("password", "secret123")])
            .await;
        resp.assert_status(StatusCode::SEE_OTHER);

        assert_ne!(issued_session(&resp), previous);
        assert!(app.auth.session(previous).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_login_shows_provider_message() {
        let mut provider = Server::new_async().await;
        provider
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;
        let app = TestApp::start(lazy_pool(), &provider.url()).await;

        let resp = app
            .server
            .post("/login")
            .form(&[("email", "ops@example.com"), ("password", "wrong-pass")])
            .await;

        resp.assert_status(StatusCode::UNAUTHORIZED);
        let html = resp.text();
        assert!(html.contains("Invalid login credentials"));
        assert!(html.contains(r#"value="ops@example.com""#));
        assert!(resp.maybe_cookie(SESSION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn logout_clears_the_session_cookie() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        let cookie = app.signed_in_browser().await;

        let resp = app
            .server
            .post("/logout")
            .add_header(header::COOKIE, cookie.clone())
            .await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/login");
        assert_eq!(resp.cookie(SESSION_COOKIE).value(), "");

        assert_eq!(session_admin(&app, Some(cookie)).await, Value::Null);
    }

    // -----------------------------------------------------------------------
    // Register
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn register_requires_matching_passwords() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        let resp = app
            .server
            .post("/register")
            .form(&[
                ("full_name", "Jane"),
                ("email", "ops@example.com"),
                ("password", "secret123"),
                ("confirm_password", "secret124"),
            ])
            .await;

        resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(resp.text().contains("Passwords do not match"));
    }

    async fn stored_full_name(pool: &PgPool) -> Option<String> {
        let id: uuid::Uuid = USER_ID.parse().unwrap();
        sqlx::query_scalar("SELECT full_name FROM admins WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn register_awaiting_confirmation_creates_profile(pool: PgPool) {
        let mut provider = Server::new_async().await;
        provider
            .mock("POST", "/auth/v1/signup")
            .match_body(Matcher::PartialJson(json!({ "data": { "full_name": "Jane Operator" } })))
            .with_status(200)
            .with_body(
                json!({
                    "id": USER_ID,
                    "email": "ops@example.com",
                    "user_metadata": { "full_name": "Jane Operator" }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let app = TestApp::start(pool.clone(), &provider.url()).await;

        let resp = app
            .server
            .post("/register")
            .form(&[
                ("full_name", " Jane Operator "),
                ("email", "ops@example.com"),
                ("password", "secret123"),
                ("confirm_password", "secret123"),
            ])
            .await;

        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/login?confirm=true");
        assert!(resp.maybe_cookie(SESSION_COOKIE).is_none());
        assert_eq!(stored_full_name(&pool).await.as_deref(), Some("Jane Operator"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn register_with_session_signs_browser_in(pool: PgPool) {
        let mut provider = Server::new_async().await;
        provider
            .mock("POST", "/auth/v1/signup")
            .with_status(200)
            .with_body(token_body(3600))
            .create_async()
            .await;
        let app = TestApp::start(pool.clone(), &provider.url()).await;

        let resp = app
            .server
            .post("/register")
            .form(&[
                ("full_name", "Jane Operator"),
                ("email", "ops@example.com"),
                ("password", "secret123"),
                ("confirm_password", "secret123"),
            ])
            .await;

        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header("location"), "/dashboard");
        let cookie = session_cookie(issued_session(&resp));
        assert_eq!(session_admin(&app, Some(cookie)).await["email"], "ops@example.com");
        assert_eq!(stored_full_name(&pool).await.as_deref(), Some("Jane Operator"));
    }

    // -----------------------------------------------------------------------
    // Dashboard & exports
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn dashboard_renders_filtered_table(pool: PgPool) {
        insert_reading(&pool, "Corn", 15.0, 68.0, 5).await;
        insert_reading(&pool, "Rice", 55.0, 70.0, 10).await;
        let app = TestApp::start(pool, UNUSED_AUTH).await;
        let cookie = app.signed_in_browser().await;

        let resp = app
            .server
            .get("/dashboard")
            .add_header(header::COOKIE, cookie)
            .add_query_param("battery", "low")
            .await;
        resp.assert_status_ok();

        let html = resp.text();
        assert!(html.contains("<td>Corn</td>"));
        assert!(!html.contains("<td>Rice</td>"));
        assert!(html.contains("Sign out"));
        assert!(html.contains(r#"<script id="series" type="application/json">"#));
    }

    #[tokio::test]
    async fn dashboard_rejects_unknown_page_size() {
        let app = TestApp::start(lazy_pool(), UNUSED_AUTH).await;
        let cookie = app.signed_in_browser().await;
        let resp = app
            .server
            .get("/dashboard")
            .add_header(header::COOKIE, cookie)
            .add_query_param("per_page", 7)
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn csv_export_contains_every_filtered_row(pool: PgPool) {
        for i in 0..30 {
            insert_reading(&pool, "Corn", 40.0, 60.0, i).await;
        }
        insert_reading(&pool, "Rice", 40.0, 60.0, 1).await;
        let app = TestApp::start(pool, UNUSED_AUTH).await;
        let cookie = app.signed_in_browser().await;

        let resp = app
            .server
            .get("/export/csv")
            .add_header(header::COOKIE, cookie)
            .add_query_param("search", "corn")
            .add_query_param("per_page", 10)
            .await;
        resp.assert_status_ok();
        assert!(resp
            .header("content-disposition")
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"dryer-data-"));

        let body = resp.text();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 31);
        assert!(lines[0].starts_with("ID,Type,Target Temp"));
        assert!(lines[1..].iter().all(|l| l.contains(",Corn,")));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn print_export_opens_print_dialog(pool: PgPool) {
        insert_reading(&pool, "Corn", 15.0, 68.0, 5).await;
        let app = TestApp::start(pool, UNUSED_AUTH).await;
        let cookie = app.signed_in_browser().await;

        let resp = app
            .server
            .get("/export/print")
            .add_header(header::COOKIE, cookie)
            .await;
        resp.assert_status_ok();
        let html = resp.text();
        assert!(html.contains("window.print()"));
        assert!(html.contains("<td>Corn</td>"));
    }
}
