//! Browser backend traits and implementations
//!
//! This module provides the abstraction the capture orchestrator drives: a
//! [`BrowserBackend`] launches a browser and opens one configured page, and
//! the returned [`PageSession`] exposes the handful of page operations a
//! capture needs.
//!
//! # Backends
//!
//! | Backend | Engine | Used by |
//! |---------|--------|---------|
//! | [`ChromiumBackend`] | headless Chrome/Chromium via DevTools protocol | CLI |
//! | [`MockBrowser`] | synthetic pages and PNGs | tests |
//!
//! # Passive listeners
//!
//! `launch` receives the session's [`EventLog`]. Before returning, the backend
//! registers console, page-error and failed-request listeners that append to
//! that log for the rest of the page's lifetime. Listeners never influence
//! control flow.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::CaptureResult,
    model::{ContextOptions, LaunchOptions, NavigationResponse, ScreenshotScope},
    session::EventLog,
};

pub mod chromium_backend;
pub mod constants;
pub mod mock;

pub use chromium_backend::ChromiumBackend;
pub use mock::MockBrowser;

/// Launches a browser and opens a page configured for one capture
///
/// Implementations must be thread-safe so a backend can be shared behind an
/// `Arc` by callers that run on a multi-threaded runtime.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Starts the browser and opens a page with the given context options.
    ///
    /// Passive listeners are registered on the page before this returns, and
    /// record into `events`. A failure here is a hard failure for the run.
    async fn launch(
        &self,
        launch: &LaunchOptions,
        context: &ContextOptions,
        events: EventLog,
    ) -> CaptureResult<Box<dyn PageSession>>;
}

/// Operations on the single page of a capture
///
/// Every method returns quickly or within its explicit bound; none retries.
#[async_trait]
pub trait PageSession: Send {
    /// Navigates to `url` and waits until DOMContentLoaded.
    ///
    /// Returns the main-document response when one was observed. Returns
    /// [`CaptureError::Timeout`](crate::error::CaptureError::Timeout) with
    /// operation `"page load"` when `timeout` elapses first.
    async fn goto(&mut self, url: &str, timeout: Duration)
    -> CaptureResult<Option<NavigationResponse>>;

    /// Waits until no requests have been in flight for a quiet window.
    ///
    /// Returns a `"networkidle"` timeout error when `timeout` elapses first.
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> CaptureResult<()>;

    /// Evaluates a JavaScript expression in the page.
    ///
    /// `undefined` results are returned as `Value::Null`.
    async fn evaluate(&mut self, script: &str) -> CaptureResult<serde_json::Value>;

    /// Captures a PNG of the page.
    async fn screenshot(&mut self, scope: ScreenshotScope) -> CaptureResult<Vec<u8>>;

    /// Captures a PNG of the first element matching `selector`.
    ///
    /// Returns `Ok(None)` when no element matches.
    async fn element_screenshot(&mut self, selector: &str) -> CaptureResult<Option<Vec<u8>>>;

    /// Returns the serialized HTML of the current DOM.
    async fn content(&mut self) -> CaptureResult<String>;

    /// Closes the page and shuts the browser down.
    async fn close(self: Box<Self>) -> CaptureResult<()>;
}
