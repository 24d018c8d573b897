pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    session::Access,
    state::AppState,
    web::{self, session_cookie},
};

/// The whole application: HTML pages, the guarded JSON API and the
/// unguarded system routes.
pub fn router(state: AppState) -> Router {
    let (api_routes, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/readings", get(handlers::list_readings))
        .route("/api/readings/stats", get(handlers::reading_stats))
        .route("/api/readings/series", get(handlers::reading_series))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state.clone())
        .split_for_parts();

    let system = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/session", get(handlers::session_state))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { Json(api) }),
        )
        .with_state(state.clone());

    web::routes(state).merge(api_routes).merge(system)
}

/// JSON counterpart of the page guard: `503` while the session is loading,
/// `401` when the requesting browser has no signed-in admin.
async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let sid = session_cookie::session_id(&jar);
    match state.gate.resolve(&state.auth, sid).await {
        Access::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(json!({ "error": "session is still loading" })),
        )
            .into_response(),
        Access::Denied => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "sign in required" })),
        )
            .into_response(),
        Access::Granted(admin) => {
            req.extensions_mut().insert(admin);
            next.run(req).await
        }
    }
}
