//! Artifact naming for a capture run
//!
//! Every file written by a run shares the base name
//! `screenshot_<YYYYMMDD_HHMMSS>`, so an operator can correlate the
//! screenshots, HTML snapshot and log of one run by eye.
//!
//! Names have one-second resolution and no collision guard: two runs into the
//! same directory within the same second overwrite each other's files.
//!
//! # Examples
//!
//! ```
//! use std::path::Path;
//!
//! use web_screenshot::util::artifacts::ArtifactPaths;
//!
//! let paths = ArtifactPaths::new(Path::new("out"), "20240101_120000");
//! assert_eq!(paths.base_name, "screenshot_20240101_120000");
//! assert!(paths.full_page.ends_with("screenshot_20240101_120000_full.png"));
//! assert!(paths.log.ends_with("screenshot_20240101_120000_log.json"));
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{CaptureError, CaptureResult};

/// Prefix of every artifact base name
pub const BASE_NAME_PREFIX: &str = "screenshot";

/// Paths of all artifacts a run may produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Directory holding the artifacts
    pub dir:       PathBuf,
    /// Shared base name (`screenshot_<timestamp>`)
    pub base_name: String,
    /// Full scrollable page image
    pub full_page: PathBuf,
    /// Visible viewport image
    pub viewport:  PathBuf,
    /// Body element image
    pub body:      PathBuf,
    /// Serialized DOM
    pub html:      PathBuf,
    /// JSON session record
    pub log:       PathBuf,
}

impl ArtifactPaths {
    /// Derives artifact paths for a run timestamp inside `dir`
    pub fn new(dir: &Path, timestamp: &str) -> Self {
        let base_name = format!("{}_{}", BASE_NAME_PREFIX, timestamp);
        let file = |suffix: &str| dir.join(format!("{}{}", base_name, suffix));

        Self {
            dir: dir.to_path_buf(),
            full_page: file("_full.png"),
            viewport: file("_viewport.png"),
            body: file("_body.png"),
            html: file(".html"),
            log: file("_log.json"),
            base_name,
        }
    }
}

/// Returns the file name component of an artifact path for event messages
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Creates `dir` (and parents) if needed and returns its absolute path
pub fn prepare_output_dir(dir: &Path) -> CaptureResult<PathBuf> {
    let to_error = |source| CaptureError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(to_error)?;
    fs::canonicalize(dir).map_err(to_error)
}
