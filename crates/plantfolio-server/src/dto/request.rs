//! Request DTOs for API endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Default number of sync logs returned when no limit is given.
pub const DEFAULT_LOG_LIMIT: i64 = 20;

/// Query parameters of the sync trigger.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct SyncTriggerQuery {
    /// Marks the run as manually triggered rather than scheduled
    #[param(example = true)]
    #[serde(default)]
    pub manual: bool,
}

/// Query parameters for listing sync logs.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SyncLogsQuery {
    /// Maximum number of runs (default: 20, max: 200)
    #[param(example = 20)]
    pub limit: Option<i64>,
}
