//! Path utilities for destination handling

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Path helpers for transcode destinations
pub struct PathUtils;

impl PathUtils {
    /// Generated destination: `<dir>/<source stem><uuid>.mp4`
    pub fn generate_destination(dir: &Path, source: &Path) -> PathBuf {
        let stem = Self::get_stem(source).unwrap_or_else(|| "video".to_string());
        dir.join(format!("{}{}.mp4", stem, Uuid::new_v4()))
    }

    /// Get file stem (name without extension) from path
    pub fn get_stem(path: &Path) -> Option<String> {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.is_empty())
    }

    /// Get lowercased file extension from path
    pub fn get_extension(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Parent directory that must exist before the file can be written
    pub fn parent_dir(path: &Path) -> Option<&Path> {
        path.parent().filter(|parent| !parent.as_os_str().is_empty())
    }
}
