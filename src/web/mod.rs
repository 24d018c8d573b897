pub mod guard;
pub mod pages;
pub mod session_cookie;
pub mod templates;
pub mod views;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// HTML routes. Everything behind `/dashboard` and `/export` requires a
/// browser with a signed-in admin session.
pub fn routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route("/export/csv", get(pages::export_csv))
        .route("/export/print", get(pages::export_print))
        .route_layer(middleware::from_fn_with_state(state.clone(), guard::require_admin));

    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login_form).post(pages::login))
        .route("/register", get(pages::register_form).post(pages::register))
        .route("/logout", post(pages::logout))
        .merge(protected)
        .with_state(state)
}
