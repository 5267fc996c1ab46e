//! Capture test harness
//!
//! Runs the orchestrator over a [`MockBrowser`] inside a temporary output
//! directory, with scroll pauses disabled so runs finish instantly.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde_json::Value;
use tempfile::TempDir;
use web_screenshot::{
    CaptureOrchestrator, CaptureReport, CaptureSettings, capture::MockBrowser,
    error::CaptureResult,
};

/// Settings with zero scroll pause
pub fn fast_settings() -> CaptureSettings {
    CaptureSettings {
        scroll_pause: Duration::ZERO,
        ..CaptureSettings::default()
    }
}

/// Orchestrator, mock backend and output directory for one test
pub struct CaptureTestContext {
    pub orchestrator: CaptureOrchestrator<MockBrowser>,
    pub dir:          TempDir,
}

impl CaptureTestContext {
    /// Context over a default mock
    pub fn new_with_mock() -> Self {
        Self::with_backend(MockBrowser::new())
    }

    /// Context over a configured mock
    pub fn with_backend(backend: MockBrowser) -> Self {
        Self {
            orchestrator: CaptureOrchestrator::new(backend, fast_settings()),
            dir:          TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn backend(&self) -> &MockBrowser {
        self.orchestrator.backend()
    }

    pub fn output_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Captures `url` into the context's output directory
    pub async fn capture(&self, url: &str, device: &str) -> CaptureResult<CaptureReport> {
        self.orchestrator
            .capture(url, self.output_dir(), device)
            .await
    }

    /// Captures `https://example.com`, panicking on a hard failure
    pub async fn capture_ok(&self, device: &str) -> CaptureReport {
        self.capture("https://example.com", device)
            .await
            .expect("capture should succeed")
    }
}

/// File names in `dir`, sorted
pub fn list_artifacts(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("output dir should be readable")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Parses the JSON session log written by a run
pub fn read_log(report: &CaptureReport) -> Value {
    let text = fs::read_to_string(&report.paths.log).expect("log should exist");
    serde_json::from_str(&text).expect("log should be valid JSON")
}

/// Event messages from a parsed log, in order
pub fn event_messages(log: &Value) -> Vec<String> {
    log["events"]
        .as_array()
        .expect("events should be an array")
        .iter()
        .map(|event| event["message"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// PNG dimensions of an image file
pub fn png_dimensions(path: &PathBuf) -> (u32, u32) {
    use image::GenericImageView;

    image::open(path).expect("should be a readable image").dimensions()
}
