use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// A failed JSON handler, answered with `500` and `{"error": …}`. Database
/// failures are reported without the driver's detail.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.0.downcast_ref::<sqlx::Error>().is_some() {
            error!(error = %self.0, "Dryer reading query failed");
            "Failed to load dryer readings".to_owned()
        } else {
            error!(error = %self.0, "Request failed");
            self.0.to_string()
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
