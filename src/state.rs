use sqlx::PgPool;

use crate::{auth::SupabaseAuth, session::SessionGate};

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth: SupabaseAuth,
    pub gate: SessionGate,
    /// Row cap for the "everything" fetch behind the dashboard and exports.
    pub fetch_limit: i64,
}
