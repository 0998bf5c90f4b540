pub mod client;
pub mod types;

use crate::errors::AppError;
use std::path::Path;

/// External tracking/upload service the recorder drives. Every call is bounded by a fixed
/// timeout and reports failure as an `AppError`; none is retried automatically.
pub trait TrackingService: Send {
    /// Registers a new tracking record for `start_marker` and returns its id.
    fn create_tracking(&self, start_marker: &str) -> Result<String, AppError>;

    fn update_tracking(&self, tracking_id: &str, stop_marker: &str, end_time: &str) -> Result<(), AppError>;

    fn upload_artifact(&self, tracking_id: &str, artifact: &Path) -> Result<(), AppError>;
}
