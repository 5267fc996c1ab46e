//! Mock browser backend for testing
//!
//! This module provides a `MockBrowser` implementation of the
//! [`BrowserBackend`] trait for testing and development purposes. The mock
//! renders synthetic PNGs and serves a fixed HTML document without requiring
//! a browser on the machine.
//!
//! # Features
//!
//! - **Synthetic Screenshots:** Real PNG data sized to the emulated viewport
//!   (or `viewport.width x page_height` for full-page captures)
//! - **Scripted Page:** Answers the metrics, page-info and scroll scripts the
//!   orchestrator evaluates
//! - **Listener Events:** Emits configured [`BrowserEvent`]s through the
//!   session log during navigation
//! - **Failure Injection:** Each page operation can be made to fail or time
//!   out independently
//! - **Inspection:** Records launch options, evaluated scripts and teardown
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use web_screenshot::{
//!     capture::{BrowserBackend, MockBrowser},
//!     model::{ContextOptions, DeviceProfile, LaunchOptions},
//!     session::EventLog,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MockBrowser::new().with_status(200);
//!     let context = ContextOptions::for_profile(DeviceProfile::Mobile);
//!     let mut page = backend
//!         .launch(&LaunchOptions::default(), &context, EventLog::new())
//!         .await
//!         .unwrap();
//!
//!     let response = page.goto("https://example.com", Duration::from_secs(1)).await.unwrap();
//!     assert_eq!(response.unwrap().status, 200);
//!
//!     page.close().await.unwrap();
//!     assert!(backend.is_closed());
//! }
//! ```

use std::{
    collections::HashSet,
    io::Cursor,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgba};
use serde_json::{Value, json};
use tokio::time::sleep;

use super::{BrowserBackend, PageSession};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{
        BrowserEvent, ContextOptions, LaunchOptions, NavigationResponse, ScreenshotScope, Viewport,
    },
    session::EventLog,
};

/// Page operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFailure {
    /// Browser launch
    Launch,
    /// Navigation times out
    NavigationTimeout,
    /// Network never goes idle
    NetworkIdleTimeout,
    /// Scroll script raises
    Scroll,
    /// Full-page screenshot
    FullPageScreenshot,
    /// Viewport screenshot
    ViewportScreenshot,
    /// Body element screenshot
    BodyScreenshot,
    /// Timing metrics script
    Metrics,
    /// Page info script
    PageInfo,
    /// DOM serialization
    Content,
}

/// Observable state shared between the backend and its page
#[derive(Debug, Default)]
struct MockState {
    launch:    Option<LaunchOptions>,
    context:   Option<ContextOptions>,
    scripts:   Vec<String>,
    navigated: Vec<String>,
    closed:    bool,
}

/// Mock browser backend for testing
///
/// The backend keeps a handle to the state of the page it launched, so
/// assertions can be made after the page has been closed.
#[derive(Debug)]
pub struct MockBrowser {
    status:           Option<u16>,
    navigation_error: Option<String>,
    html:             String,
    title:            String,
    page_height:      u32,
    has_body:         bool,
    events:           Vec<BrowserEvent>,
    failures:         HashSet<MockFailure>,
    delay:            Option<Duration>,
    state:            Arc<Mutex<MockState>>,
}

impl MockBrowser {
    /// Creates a mock with a 200 response, a body element and a 3000px page
    pub fn new() -> Self {
        Self {
            status:           Some(200),
            navigation_error: None,
            html:             Self::default_html(),
            title:            "Mock Page".to_string(),
            page_height:      3000,
            has_body:         true,
            events:           Vec::new(),
            failures:         HashSet::new(),
            delay:            None,
            state:            Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn default_html() -> String {
        "<html><head><title>Mock Page</title></head><body><h1>Mock Page</h1></body></html>"
            .to_string()
    }

    /// Sets the main-document status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Simulates a navigation with no observable main-document response
    pub fn without_response(mut self) -> Self {
        self.status = None;
        self
    }

    /// Makes navigation fail with a browser error text
    pub fn with_navigation_error(mut self, reason: impl Into<String>) -> Self {
        self.navigation_error = Some(reason.into());
        self
    }

    /// Makes navigation time out
    pub fn with_navigation_timeout(self) -> Self {
        self.with_failure(MockFailure::NavigationTimeout)
    }

    /// Makes the network-idle wait time out
    pub fn with_network_idle_timeout(self) -> Self {
        self.with_failure(MockFailure::NetworkIdleTimeout)
    }

    /// Makes the scroll script raise
    pub fn with_scroll_failure(self) -> Self {
        self.with_failure(MockFailure::Scroll)
    }

    /// Makes one of the page screenshots fail
    pub fn with_screenshot_failure(self, scope: ScreenshotScope) -> Self {
        match scope {
            ScreenshotScope::FullPage => self.with_failure(MockFailure::FullPageScreenshot),
            ScreenshotScope::Viewport => self.with_failure(MockFailure::ViewportScreenshot),
        }
    }

    /// Removes the body element from the page
    pub fn without_body(mut self) -> Self {
        self.has_body = false;
        self
    }

    /// Makes the body screenshot fail
    pub fn with_body_failure(self) -> Self {
        self.with_failure(MockFailure::BodyScreenshot)
    }

    /// Makes the metrics script raise
    pub fn with_metrics_failure(self) -> Self {
        self.with_failure(MockFailure::Metrics)
    }

    /// Makes the page-info script raise
    pub fn with_page_info_failure(self) -> Self {
        self.with_failure(MockFailure::PageInfo)
    }

    /// Makes DOM serialization fail
    pub fn with_content_failure(self) -> Self {
        self.with_failure(MockFailure::Content)
    }

    /// Makes the browser fail to launch
    pub fn with_launch_failure(self) -> Self {
        self.with_failure(MockFailure::Launch)
    }

    /// Injects an arbitrary failure
    pub fn with_failure(mut self, failure: MockFailure) -> Self {
        self.failures.insert(failure);
        self
    }

    /// Sets the served HTML document
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    /// Sets the document title reported by the page-info script
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the scrollable page height used for full-page captures
    pub fn with_page_height(mut self, height: u32) -> Self {
        self.page_height = height.max(1);
        self
    }

    /// Sets listener events emitted during navigation
    pub fn with_events(mut self, events: Vec<BrowserEvent>) -> Self {
        self.events = events;
        self
    }

    /// Sets a delay applied to every page operation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Launch options received by the last `launch`
    pub fn launch_options(&self) -> Option<LaunchOptions> {
        self.state.lock().ok().and_then(|s| s.launch.clone())
    }

    /// Context options received by the last `launch`
    pub fn context_options(&self) -> Option<ContextOptions> {
        self.state.lock().ok().and_then(|s| s.context.clone())
    }

    /// Scripts evaluated on the page, in order
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.scripts.clone())
            .unwrap_or_default()
    }

    /// URLs passed to `goto`, in order
    pub fn navigated_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.navigated.clone())
            .unwrap_or_default()
    }

    /// Whether the launched page was closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(false)
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserBackend for MockBrowser {
    async fn launch(
        &self,
        launch: &LaunchOptions,
        context: &ContextOptions,
        events: EventLog,
    ) -> CaptureResult<Box<dyn PageSession>> {
        if self.failures.contains(&MockFailure::Launch) {
            return Err(CaptureError::BrowserLaunch {
                reason: "mock browser configured to fail".to_string(),
            });
        }

        if let Ok(mut state) = self.state.lock() {
            *state = MockState {
                launch: Some(launch.clone()),
                context: Some(context.clone()),
                ..MockState::default()
            };
        }

        Ok(Box::new(MockPage {
            viewport: context.viewport,
            status: self.status,
            navigation_error: self.navigation_error.clone(),
            html: self.html.clone(),
            title: self.title.clone(),
            page_height: self.page_height,
            has_body: self.has_body,
            pending_events: self.events.clone(),
            failures: self.failures.clone(),
            delay: self.delay,
            events,
            current_url: None,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Page opened by [`MockBrowser`]
#[derive(Debug)]
struct MockPage {
    viewport:         Viewport,
    status:           Option<u16>,
    navigation_error: Option<String>,
    html:             String,
    title:            String,
    page_height:      u32,
    has_body:         bool,
    pending_events:   Vec<BrowserEvent>,
    failures:         HashSet<MockFailure>,
    delay:            Option<Duration>,
    events:           EventLog,
    current_url:      Option<String>,
    state:            Arc<Mutex<MockState>>,
}

impl MockPage {
    async fn apply_delay(&self) {
        if let Some(duration) = self.delay {
            sleep(duration).await;
        }
    }

    fn fails(&self, failure: MockFailure) -> bool {
        self.failures.contains(&failure)
    }

    fn script_error(message: &str) -> CaptureError {
        CaptureError::ScriptEvaluation {
            reason: message.to_string(),
        }
    }

    /// Renders a vertical gradient PNG of the given size
    fn render_png(width: u32, height: u32) -> CaptureResult<Vec<u8>> {
        let start = [255u8, 255u8, 255u8];
        let end = [0u8, 120u8, 215u8];

        let img = ImageBuffer::from_fn(width.max(1), height.max(1), |_x, y| {
            let ratio = y as f32 / height.max(1) as f32;
            let mix = |a: u8, b: u8| (a as f32 * (1.0 - ratio) + b as f32 * ratio) as u8;
            Rgba([mix(start[0], end[0]), mix(start[1], end[1]), mix(start[2], end[2]), 255])
        });

        let mut output = Vec::new();
        img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .map_err(|e| CaptureError::ScreenshotFailed {
                target: "mock".to_string(),
                reason: e.to_string(),
            })?;
        Ok(output)
    }

    /// Answers the scripts the orchestrator evaluates
    fn answer(&self, script: &str) -> CaptureResult<Value> {
        if script.contains("scrollTo") {
            if self.fails(MockFailure::Scroll) {
                return Err(Self::script_error("TypeError: window.scrollTo is not a function"));
            }
            return Ok(Value::Null);
        }
        if script.contains("performance.timing") {
            if self.fails(MockFailure::Metrics) {
                return Err(Self::script_error("ReferenceError: performance is not defined"));
            }
            return Ok(json!({
                "domContentLoaded": 120,
                "fullyLoaded": 480,
                "domInteractive": 95
            }));
        }
        if script.contains("document.title") {
            if self.fails(MockFailure::PageInfo) {
                return Err(Self::script_error("TypeError: document.documentElement is null"));
            }
            return Ok(json!({
                "title": self.title,
                "url": self.current_url.clone().unwrap_or_else(|| "about:blank".to_string()),
                "width": self.viewport.width,
                "height": self.page_height
            }));
        }
        if script.contains("querySelector") {
            return Ok(Value::Bool(self.has_body));
        }
        Ok(Value::Null)
    }
}

#[async_trait]
impl PageSession for MockPage {
    async fn goto(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> CaptureResult<Option<NavigationResponse>> {
        self.apply_delay().await;
        if let Ok(mut state) = self.state.lock() {
            state.navigated.push(url.to_string());
        }

        for event in self.pending_events.drain(..) {
            self.events.record(event.to_string());
        }

        if self.fails(MockFailure::NavigationTimeout) {
            return Err(CaptureError::timeout("page load", timeout));
        }
        if let Some(reason) = &self.navigation_error {
            return Err(CaptureError::NavigationFailed {
                url:    url.to_string(),
                reason: reason.clone(),
            });
        }

        self.current_url = Some(url.to_string());
        Ok(self.status.map(|status| NavigationResponse {
            status,
            url: url.to_string(),
        }))
    }

    async fn wait_for_network_idle(&mut self, timeout: Duration) -> CaptureResult<()> {
        self.apply_delay().await;
        if self.fails(MockFailure::NetworkIdleTimeout) {
            return Err(CaptureError::timeout("networkidle", timeout));
        }
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> CaptureResult<Value> {
        self.apply_delay().await;
        if let Ok(mut state) = self.state.lock() {
            state.scripts.push(script.to_string());
        }
        self.answer(script)
    }

    async fn screenshot(&mut self, scope: ScreenshotScope) -> CaptureResult<Vec<u8>> {
        self.apply_delay().await;
        let (failure, height) = match scope {
            ScreenshotScope::FullPage => (MockFailure::FullPageScreenshot, self.page_height),
            ScreenshotScope::Viewport => (MockFailure::ViewportScreenshot, self.viewport.height),
        };
        if self.fails(failure) {
            return Err(CaptureError::ScreenshotFailed {
                target: scope.label().to_string(),
                reason: "mock capture failure".to_string(),
            });
        }
        Self::render_png(self.viewport.width, height)
    }

    async fn element_screenshot(&mut self, selector: &str) -> CaptureResult<Option<Vec<u8>>> {
        self.apply_delay().await;
        if selector != "body" || !self.has_body {
            return Ok(None);
        }
        if self.fails(MockFailure::BodyScreenshot) {
            return Err(CaptureError::ScreenshotFailed {
                target: selector.to_string(),
                reason: "element has zero size".to_string(),
            });
        }
        Self::render_png(self.viewport.width, self.page_height).map(Some)
    }

    async fn content(&mut self) -> CaptureResult<String> {
        self.apply_delay().await;
        if self.fails(MockFailure::Content) {
            return Err(CaptureError::ContentUnavailable {
                reason: "target closed".to_string(),
            });
        }
        Ok(self.html.clone())
    }

    async fn close(self: Box<Self>) -> CaptureResult<()> {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceProfile;

    async fn open(backend: &MockBrowser, profile: DeviceProfile) -> Box<dyn PageSession> {
        backend
            .launch(
                &LaunchOptions::default(),
                &ContextOptions::for_profile(profile),
                EventLog::new(),
            )
            .await
            .unwrap()
    }

    fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
        use image::GenericImageView;

        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .unwrap()
            .dimensions()
    }

    #[tokio::test]
    async fn test_records_launch_and_context() {
        let backend = MockBrowser::new();
        let _page = open(&backend, DeviceProfile::Tablet).await;

        let context = backend.context_options().unwrap();
        assert_eq!(context.viewport, Viewport::new(768, 1024));
        assert!(context.is_mobile);
        assert!(backend.launch_options().unwrap().headless);
    }

    #[tokio::test]
    async fn test_screenshot_dimensions() {
        let backend = MockBrowser::new().with_page_height(2500);
        let mut page = open(&backend, DeviceProfile::Mobile).await;

        let full = page.screenshot(ScreenshotScope::FullPage).await.unwrap();
        assert_eq!(png_dimensions(&full), (375, 2500));

        let viewport = page.screenshot(ScreenshotScope::Viewport).await.unwrap();
        assert_eq!(png_dimensions(&viewport), (375, 667));
    }

    #[tokio::test]
    async fn test_navigation_timeout() {
        let backend = MockBrowser::new().with_navigation_timeout();
        let mut page = open(&backend, DeviceProfile::Desktop).await;

        let err = page
            .goto("https://slow.example", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout on page load");
    }

    #[tokio::test]
    async fn test_events_emitted_during_navigation() {
        let backend = MockBrowser::new().with_events(vec![BrowserEvent::RequestFailed {
            url: "https://cdn.example/app.js".to_string(),
        }]);
        let log = EventLog::new();
        let mut page = backend
            .launch(
                &LaunchOptions::default(),
                &ContextOptions::for_profile(DeviceProfile::Desktop),
                log.clone(),
            )
            .await
            .unwrap();

        assert!(log.is_empty());
        page.goto("https://example.com", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(log.contains("Request Failed: https://cdn.example/app.js"));
    }

    #[tokio::test]
    async fn test_body_missing() {
        let backend = MockBrowser::new().without_body();
        let mut page = open(&backend, DeviceProfile::Desktop).await;
        assert!(page.element_screenshot("body").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scripted_answers() {
        let backend = MockBrowser::new().with_title("Hello");
        let mut page = open(&backend, DeviceProfile::Laptop).await;
        page.goto("https://example.com", Duration::from_secs(1))
            .await
            .unwrap();

        let info = page.evaluate("(() => document.title)()").await.unwrap();
        assert_eq!(info["title"], "Hello");
        assert_eq!(info["url"], "https://example.com");

        let scroll = page.evaluate("window.scrollTo(0, 1000)").await.unwrap();
        assert!(scroll.is_null());
        assert_eq!(backend.evaluated_scripts().len(), 2);
    }

    #[tokio::test]
    async fn test_close_is_observable() {
        let backend = MockBrowser::new();
        let page = open(&backend, DeviceProfile::Desktop).await;
        assert!(!backend.is_closed());
        page.close().await.unwrap();
        assert!(backend.is_closed());
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let backend = MockBrowser::new().with_launch_failure();
        let result = backend
            .launch(
                &LaunchOptions::default(),
                &ContextOptions::for_profile(DeviceProfile::Desktop),
                EventLog::new(),
            )
            .await;
        assert!(matches!(result, Err(CaptureError::BrowserLaunch { .. })));
    }
}
