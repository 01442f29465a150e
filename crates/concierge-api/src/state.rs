//! Application state shared by the fulfillment server's handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use concierge_types::config::DeploymentConfig;

/// Shared server state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DeploymentConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: DeploymentConfig) -> Self {
        Self {
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }
}
