use crate::common::file_utils;
use crate::core::session::SessionOutcome;
use crate::tracking::TrackingService;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Renames the closed recording to `{start}_to_{stop}_{stamp}.{ext}` in the same directory.
/// A failed rename keeps the original path; the artifact is never lost over a name.
pub fn rename_artifact(recorded: &Path, start_marker: &str, stop_marker: &str, extension: &str) -> PathBuf {
    let file_name = file_utils::artifact_filename(start_marker, stop_marker, extension);
    let target = match recorded.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    };
    match std::fs::rename(recorded, &target) {
        Ok(()) => {
            info!("📝 Artifact renamed to {}", target.display());
            target
        }
        Err(e) => {
            warn!(
                "⚠️ Could not rename '{}' to '{}': {}. Keeping the original name.",
                recorded.display(),
                target.display(),
                e
            );
            recorded.to_path_buf()
        }
    }
}

/// Uploads the artifact and deletes the local copy only after the server confirmed it.
/// On failure the file stays on disk untouched.
pub fn upload_and_release(
    tracking: &dyn TrackingService,
    tracking_id: &str,
    artifact: &Path,
) -> SessionOutcome {
    if !artifact.exists() {
        warn!("⚠️ No artifact at '{}'; upload skipped.", artifact.display());
        return SessionOutcome::NoArtifact;
    }

    info!("☁️ Uploading {} for tracking id {}...", artifact.display(), tracking_id);
    let started = Instant::now();
    match tracking.upload_artifact(tracking_id, artifact) {
        Ok(()) => {
            info!("✅ Video uploaded for {} in {:?}", tracking_id, started.elapsed());
            match file_utils::remove_artifact(artifact) {
                Ok(()) => info!("🗑️ Local video deleted: {}", artifact.display()),
                Err(e) => warn!("⚠️ Uploaded, but local copy could not be removed: {}", e),
            }
            SessionOutcome::Completed
        }
        Err(e) => {
            error!(
                "❌ Upload failed for {} after {:?}: {}. Artifact retained at {} for manual recovery.",
                tracking_id,
                started.elapsed(),
                e,
                artifact.display()
            );
            SessionOutcome::UploadFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use parking_lot::Mutex;

    struct StubUpload {
        succeed: bool,
        calls: Mutex<Vec<String>>,
    }

    impl TrackingService for StubUpload {
        fn create_tracking(&self, _start_marker: &str) -> Result<String, AppError> {
            Ok("1".into())
        }
        fn update_tracking(&self, _id: &str, _stop: &str, _end: &str) -> Result<(), AppError> {
            Ok(())
        }
        fn upload_artifact(&self, tracking_id: &str, _artifact: &Path) -> Result<(), AppError> {
            self.calls.lock().push(tracking_id.to_string());
            if self.succeed {
                Ok(())
            } else {
                Err(AppError::Upload("HTTP 500".into()))
            }
        }
    }

    #[test]
    fn rename_keeps_directory_and_markers() {
        let dir = tempfile::tempdir().unwrap();
        let recorded = dir.path().join("A1_20261016_101010.mp4");
        std::fs::write(&recorded, b"v").unwrap();

        let renamed = rename_artifact(&recorded, "A1", "B2", "mp4");
        assert_eq!(renamed.parent(), Some(dir.path()));
        let name = renamed.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("A1_to_B2_") && name.ends_with(".mp4"));
        assert!(renamed.exists());
        assert!(!recorded.exists());
    }

    #[test]
    fn failed_rename_keeps_original_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mp4");
        assert_eq!(rename_artifact(&missing, "A", "B", "mp4"), missing);
    }

    #[test]
    fn successful_upload_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("A_to_B.mp4");
        std::fs::write(&artifact, b"video").unwrap();
        let stub = StubUpload { succeed: true, calls: Mutex::new(Vec::new()) };

        assert_eq!(upload_and_release(&stub, "7", &artifact), SessionOutcome::Completed);
        assert!(!artifact.exists());
        assert_eq!(*stub.calls.lock(), vec!["7".to_string()]);
    }

    #[test]
    fn failed_upload_retains_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("A_to_B.mp4");
        std::fs::write(&artifact, b"video").unwrap();
        let stub = StubUpload { succeed: false, calls: Mutex::new(Vec::new()) };

        assert_eq!(upload_and_release(&stub, "7", &artifact), SessionOutcome::UploadFailed);
        assert_eq!(std::fs::read(&artifact).unwrap(), b"video");
    }

    #[test]
    fn missing_artifact_skips_upload() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubUpload { succeed: true, calls: Mutex::new(Vec::new()) };
        let outcome = upload_and_release(&stub, "7", &dir.path().join("none.mp4"));
        assert_eq!(outcome, SessionOutcome::NoArtifact);
        assert!(stub.calls.lock().is_empty());
    }
}
