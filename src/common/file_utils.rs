use crate::common::timestamp_utils::{self, ARTIFACT_TIMESTAMP_FORMAT};
use std::path::{Path, PathBuf};
use crate::errors::AppError;
use log::debug;

/// Strips line endings and surrounding whitespace from a scanned marker. The result is what
/// the tracking server sees; use [`filename_component`] before putting it into a path.
/// Returns `None` when nothing is left.
pub fn sanitize_marker(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Replaces path separators, characters Windows rejects in file names and control characters
/// with `_`, so a marker like `ORD/77` stays a single component inside the output directory.
pub fn filename_component(marker: &str) -> String {
    marker
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Name of the file the encoder writes while a session is recording: `{start}_{ts}.{ext}`.
pub fn recording_filename(start_marker: &str, timestamp_format: &str, extension: &str) -> String {
    let timestamp = timestamp_utils::current_local_timestamp_str(timestamp_format);
    format!("{}_{}.{}", filename_component(start_marker), timestamp, extension)
}

/// Final artifact name: `{start}_to_{stop}_{YYYYMMDD_HHMMSS}.{ext}`.
pub fn artifact_filename(start_marker: &str, stop_marker: &str, extension: &str) -> String {
    let timestamp = timestamp_utils::current_local_timestamp_str(ARTIFACT_TIMESTAMP_FORMAT);
    format!(
        "{}_to_{}_{}.{}",
        filename_component(start_marker),
        filename_component(stop_marker),
        timestamp,
        extension
    )
}

pub fn ensure_output_directory(dir_path_str: &str) -> Result<PathBuf, AppError> {
    let dir_path = PathBuf::from(dir_path_str);
    if !dir_path.exists() {
        debug!("Output directory '{}' does not exist, attempting to create it.", dir_path.display());
        std::fs::create_dir_all(&dir_path).map_err(|e| {
            AppError::Io(format!(
                "Failed to create output directory '{}': {}",
                dir_path.display(),
                e
            ))
        })?;
    } else if !dir_path.is_dir() {
        return Err(AppError::Io(format!(
            "Output path '{}' exists but is not a directory.",
            dir_path.display()
        )));
    }
    Ok(dir_path)
}

pub fn remove_artifact(path: &Path) -> Result<(), AppError> {
    std::fs::remove_file(path).map_err(|e| {
        AppError::Io(format!("Failed to delete '{}': {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_lose_line_endings() {
        assert_eq!(sanitize_marker("A1\r\n").as_deref(), Some("A1"));
        assert_eq!(sanitize_marker("  ORD\n-77 ").as_deref(), Some("ORD-77"));
        assert_eq!(sanitize_marker("\r\n"), None);
        assert_eq!(sanitize_marker(""), None);
    }

    #[test]
    fn artifact_name_carries_both_markers() {
        let name = artifact_filename("A1", "B2", "mp4");
        assert!(name.starts_with("A1_to_B2_"));
        assert!(name.ends_with(".mp4"));
        // A1_to_B2_ + YYYYMMDD_HHMMSS + .mp4
        assert_eq!(name.len(), "A1_to_B2_".len() + 15 + ".mp4".len());
    }

    #[test]
    fn recording_name_uses_start_marker() {
        let name = recording_filename("A1", "%Y", "avi");
        assert!(name.starts_with("A1_"));
        assert!(name.ends_with(".avi"));
    }

    #[test]
    fn markers_with_path_characters_stay_one_component() {
        assert_eq!(filename_component("ORD/77"), "ORD_77");
        assert_eq!(filename_component("../x"), ".._x");
        assert_eq!(filename_component(r#"a\b:c*d?e"f<g>h|i"#), "a_b_c_d_e_f_g_h_i");
        assert_eq!(filename_component("tab\there"), "tab_here");
        assert_eq!(filename_component("PKG-42.b"), "PKG-42.b");

        let name = artifact_filename("ORD/77", "..\\up", "mp4");
        assert!(name.starts_with("ORD_77_to_.._up_"));
        assert!(!name.contains('/') && !name.contains('\\'));
        assert_eq!(Path::new(&name).components().count(), 1);
    }

    #[test]
    fn output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let created = ensure_output_directory(nested.to_str().unwrap()).unwrap();
        assert!(created.is_dir());

        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_output_directory(file.to_str().unwrap()).is_err());
    }
}
