use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use super::{
    session_cookie,
    templates::{Layout, Loading},
};
use crate::{session::Access, state::AppState};

/// Route guard for the dashboard pages.
///
/// The requesting browser is identified by its session cookie. While the
/// initial session lookup runs, answers with a placeholder that reloads
/// itself. Without a live session for that browser, redirects to `/login`.
/// Otherwise the [`Admin`](crate::auth::models::Admin) is added to the
/// request extensions and the request proceeds.
pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let sid = session_cookie::session_id(&jar);
    match state.gate.resolve(&state.auth, sid).await {
        Access::Loading => {
            let page = Layout {
                title: "Loading",
                admin_name: None,
                body: Loading {},
            };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, "1")],
                Html(page.to_string()),
            )
                .into_response()
        }
        Access::Denied => {
            debug!(path = %req.uri().path(), "No signed-in admin; redirecting to login");
            Redirect::to("/login").into_response()
        }
        Access::Granted(admin) => {
            req.extensions_mut().insert(admin);
            next.run(req).await
        }
    }
}
