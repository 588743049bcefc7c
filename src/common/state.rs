// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::flow::AuthFlow;

/// Shared handles passed to handlers through `Extension<Arc<AppState>>`
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth: Arc<AuthFlow>,
}

impl AppState {
    pub fn new(db: SqlitePool, auth: AuthFlow) -> Self {
        Self {
            db,
            auth: Arc::new(auth),
        }
    }
}
