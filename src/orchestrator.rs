//! Capture orchestration
//!
//! [`CaptureOrchestrator`] runs one capture from start to finish against any
//! [`BrowserBackend`]: it prepares the output directory, launches the browser,
//! navigates, scrolls, captures screenshots, HTML and measurements, closes the
//! browser and writes the session log.
//!
//! # Failure tiers
//!
//! Only three failures end a run with `Err`: the output directory cannot be
//! created, the browser cannot be launched, or the session log cannot be
//! written. Every other step is soft: its error becomes a session event with
//! the step's message prefix and the run moves on. The browser is closed on
//! every path once it has been launched.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    capture::{BrowserBackend, ChromiumBackend, PageSession, constants},
    error::{CaptureError, CaptureResult},
    model::{ContextOptions, DeviceProfile, LaunchOptions, PageInfo, PageMetrics, ScreenshotScope},
    session::{CaptureSession, format_load_time},
    util::artifacts::{ArtifactPaths, file_name, prepare_output_dir},
};

/// Navigation timing offsets relative to `navigationStart`
const METRICS_SCRIPT: &str = r#"(() => {
    const timing = performance.timing;
    return {
        domContentLoaded: timing.domContentLoadedEventEnd - timing.navigationStart,
        fullyLoaded: timing.loadEventEnd - timing.navigationStart,
        domInteractive: timing.domInteractive - timing.navigationStart
    };
})()"#;

const PAGE_INFO_SCRIPT: &str = r#"(() => ({
    title: document.title,
    url: window.location.href,
    width: document.documentElement.scrollWidth,
    height: document.documentElement.scrollHeight
}))()"#;

/// Tunable bounds and pacing for a capture run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Bound on navigation up to DOMContentLoaded
    pub navigation_timeout:   Duration,
    /// Bound on the network-idle wait
    pub network_idle_timeout: Duration,
    /// Number of downward scroll steps
    pub scroll_steps:         u32,
    /// Distance of each scroll step in CSS pixels
    pub scroll_step_px:       u32,
    /// Pause after each scroll step
    pub scroll_pause:         Duration,
    /// Browser executable override
    pub chrome_path:          Option<PathBuf>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            navigation_timeout:   Duration::from_millis(constants::NAVIGATION_TIMEOUT_MS),
            network_idle_timeout: Duration::from_millis(constants::NETWORK_IDLE_TIMEOUT_MS),
            scroll_steps:         constants::SCROLL_STEPS,
            scroll_step_px:       constants::SCROLL_STEP_PX,
            scroll_pause:         Duration::from_millis(constants::SCROLL_PAUSE_MS),
            chrome_path:          None,
        }
    }
}

impl CaptureSettings {
    /// Defaults with `WEB_SCREENSHOT_*` environment overrides applied
    pub fn from_env() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(constants::navigation_timeout_ms()),
            network_idle_timeout: Duration::from_millis(constants::network_idle_timeout_ms()),
            scroll_pause: Duration::from_millis(constants::scroll_pause_ms()),
            chrome_path: constants::chrome_path(),
            ..Self::default()
        }
    }
}

/// Outcome of a completed capture run
#[derive(Debug, Clone)]
pub struct CaptureReport {
    /// Absolute output directory
    pub output_dir: PathBuf,
    /// Paths of every artifact the run could produce
    pub paths:      ArtifactPaths,
    /// Artifacts actually written, in write order
    pub written:    Vec<PathBuf>,
    /// Elapsed time from navigation start to the end of the scroll pass
    pub load_time:  Duration,
    /// The session record as written to the log
    pub session:    CaptureSession,
}

impl CaptureReport {
    /// Whether the artifact at `path` was written by this run
    pub fn wrote(&self, path: &Path) -> bool {
        self.written.iter().any(|p| p == path)
    }

    fn written_name(&self, path: &Path) -> String {
        if self.wrote(path) { file_name(path) } else { "not written".to_string() }
    }
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Screenshot captured successfully!")?;
        writeln!(f, "Directory: {}", self.output_dir.display())?;
        writeln!(f, "Full page: {}", self.written_name(&self.paths.full_page))?;
        writeln!(f, "Viewport: {}", self.written_name(&self.paths.viewport))?;
        writeln!(f, "HTML: {}", self.written_name(&self.paths.html))?;
        writeln!(f, "Log: {}", file_name(&self.paths.log))?;
        write!(f, "Time: {}", format_load_time(self.load_time))
    }
}

/// Runs capture sessions against a browser backend
pub struct CaptureOrchestrator<B: BrowserBackend> {
    backend:  B,
    settings: CaptureSettings,
}

impl<B: BrowserBackend> CaptureOrchestrator<B> {
    /// Creates an orchestrator over `backend`
    pub fn new(backend: B, settings: CaptureSettings) -> Self {
        Self { backend, settings }
    }

    /// The backend driven by this orchestrator
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Settings in effect
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Captures `url` into `output_dir` emulating the named device
    ///
    /// Unknown device names fall back to desktop. Soft failures are recorded
    /// in the session log; only directory creation, browser launch and the
    /// log write return `Err`.
    pub async fn capture(
        &self,
        url: &str,
        output_dir: &Path,
        device: &str,
    ) -> CaptureResult<CaptureReport> {
        let output_dir = prepare_output_dir(output_dir)?;

        let profile = DeviceProfile::from_name(device).unwrap_or_else(|| {
            warn!(device, "Unknown device profile, using desktop");
            DeviceProfile::Desktop
        });

        let mut session = CaptureSession::new(url, profile);
        let paths = ArtifactPaths::new(&output_dir, &session.timestamp);
        info!(
            url,
            device = %profile,
            output = %output_dir.display(),
            base = %paths.base_name,
            "Starting capture"
        );

        let launch = LaunchOptions::default().executable(self.settings.chrome_path.clone());
        let context = ContextOptions::for_profile(profile);
        let mut page = self
            .backend
            .launch(&launch, &context, session.events.clone())
            .await?;

        let mut written = Vec::new();
        let load_time = self
            .run_steps(page.as_mut(), url, &paths, &mut session, &mut written)
            .await;

        if let Err(e) = page.close().await {
            warn!("Failed to close browser: {}", e);
        }

        let json = session.to_json_pretty()?;
        tokio::fs::write(&paths.log, json).await?;
        written.push(paths.log.clone());
        info!(log = %paths.log.display(), events = session.events.len(), "Capture finished");

        Ok(CaptureReport {
            output_dir,
            paths,
            written,
            load_time,
            session,
        })
    }

    /// Steps between launch and teardown; none of them can fail the run
    async fn run_steps(
        &self,
        page: &mut dyn PageSession,
        url: &str,
        paths: &ArtifactPaths,
        session: &mut CaptureSession,
        written: &mut Vec<PathBuf>,
    ) -> Duration {
        let started = Instant::now();

        self.navigate(page, url, session).await;

        if let Err(e) = page
            .wait_for_network_idle(self.settings.network_idle_timeout)
            .await
        {
            warn!("Network idle wait: {}", e);
            session.log_event(e.to_string());
        }

        let scrolled = self.scroll_pass(page).await;
        soft(session, "Scroll error", scrolled);

        let load_time = started.elapsed();
        session.set_load_time(load_time);
        info!(load_time = %format_load_time(load_time), "Page loaded");

        for (scope, label, path) in [
            (ScreenshotScope::FullPage, "Full page", &paths.full_page),
            (ScreenshotScope::Viewport, "Viewport", &paths.viewport),
        ] {
            let saved = save_screenshot(page, scope, path).await;
            if soft(session, &format!("{} screenshot error", label), saved).is_some() {
                session.log_event(format!("{} screenshot saved: {}", label, file_name(path)));
                written.push(path.clone());
            }
        }

        let body = save_body_screenshot(page, &paths.body).await;
        match soft(session, "Body screenshot error", body) {
            Some(true) => {
                session.log_event(format!("Body screenshot saved: {}", file_name(&paths.body)));
                written.push(paths.body.clone());
            }
            Some(false) => {
                warn!("Body element not found");
                session.log_event("Body element not found");
            }
            None => {}
        }

        let metrics = collect_metrics(page).await;
        session.performance.metrics = soft(session, "Metrics error", metrics);

        let info = collect_page_info(page).await;
        session.page_info = soft(session, "Page info error", info);

        let html = save_html(page, &paths.html).await;
        if let Some(chars) = soft(session, "HTML save error", html) {
            session.log_event(format!("HTML saved: {} ({} chars)", file_name(&paths.html), chars));
            written.push(paths.html.clone());
        }

        load_time
    }

    /// Navigates and records the main-document response
    async fn navigate(&self, page: &mut dyn PageSession, url: &str, session: &mut CaptureSession) {
        match page.goto(url, self.settings.navigation_timeout).await {
            Ok(Some(response)) => {
                info!(status = response.status, "Navigation committed");
                session.log_event(format!("Response: {} - {}", response.status, response.url));
                session.status_code = Some(response.status);
            }
            Ok(None) => debug!("Navigation finished without a main-document response"),
            Err(e) if e.is_timeout() => {
                warn!("{}", e);
                session.log_event(e.to_string());
            }
            Err(e) => {
                warn!("Navigation error: {}", e);
                session.log_event(format!("Navigation error: {}", e));
            }
        }
    }

    /// Scrolls down in fixed steps to trigger lazy loading, then back to the top
    async fn scroll_pass(&self, page: &mut dyn PageSession) -> CaptureResult<()> {
        let pause = self.settings.scroll_pause;
        for step in 1..=self.settings.scroll_steps {
            let offset = step.saturating_mul(self.settings.scroll_step_px);
            page.evaluate(&format!("window.scrollTo(0, {})", offset)).await?;
            sleep(pause).await;
        }
        page.evaluate("window.scrollTo(0, 0)").await?;
        sleep(pause).await;
        debug!(steps = self.settings.scroll_steps, "Scroll pass complete");
        Ok(())
    }
}

/// Records a failed step as a `"<prefix>: <error>"` event and yields its value
fn soft<T>(session: &CaptureSession, prefix: &str, result: CaptureResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(hint = e.remediation_hint(), "{}: {}", prefix, e);
            session.log_event(format!("{}: {}", prefix, e));
            None
        }
    }
}

async fn save_screenshot(
    page: &mut dyn PageSession,
    scope: ScreenshotScope,
    path: &Path,
) -> CaptureResult<()> {
    let png = page.screenshot(scope).await?;
    tokio::fs::write(path, png).await?;
    debug!(path = %path.display(), "Saved {} screenshot", scope.label());
    Ok(())
}

/// Returns `false` when the page has no body element
async fn save_body_screenshot(page: &mut dyn PageSession, path: &Path) -> CaptureResult<bool> {
    match page.element_screenshot(constants::BODY_SELECTOR).await? {
        Some(png) => {
            tokio::fs::write(path, png).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn collect_metrics(page: &mut dyn PageSession) -> CaptureResult<PageMetrics> {
    let value = page.evaluate(METRICS_SCRIPT).await?;
    serde_json::from_value(value).map_err(|e| CaptureError::UnexpectedScriptResult {
        what:   "metrics".to_string(),
        reason: e.to_string(),
    })
}

async fn collect_page_info(page: &mut dyn PageSession) -> CaptureResult<PageInfo> {
    let value = page.evaluate(PAGE_INFO_SCRIPT).await?;
    serde_json::from_value(value).map_err(|e| CaptureError::UnexpectedScriptResult {
        what:   "page info".to_string(),
        reason: e.to_string(),
    })
}

/// Writes the serialized DOM and returns its length in characters
async fn save_html(page: &mut dyn PageSession, path: &Path) -> CaptureResult<usize> {
    let html = page.content().await?;
    tokio::fs::write(path, &html).await?;
    Ok(html.chars().count())
}

/// Captures `url` with a local headless Chrome, using environment settings
///
/// # Examples
///
/// ```no_run
/// # async fn run() -> web_screenshot::error::CaptureResult<()> {
/// let report = web_screenshot::capture_website("https://example.com", "out", "mobile").await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub async fn capture_website(
    url: &str,
    output_dir: impl AsRef<Path>,
    device: &str,
) -> CaptureResult<CaptureReport> {
    CaptureOrchestrator::new(ChromiumBackend::new(), CaptureSettings::from_env())
        .capture(url, output_dir.as_ref(), device)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockBrowser;

    fn fast_settings() -> CaptureSettings {
        CaptureSettings {
            scroll_pause: Duration::ZERO,
            ..CaptureSettings::default()
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.navigation_timeout, Duration::from_secs(60));
        assert_eq!(settings.network_idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.scroll_steps, 5);
        assert_eq!(settings.scroll_step_px, 1000);
        assert_eq!(settings.scroll_pause, Duration::from_millis(500));
        assert!(settings.chrome_path.is_none());
    }

    #[test]
    fn test_settings_from_env() {
        temp_env::with_vars(
            [
                ("WEB_SCREENSHOT_NAVIGATION_TIMEOUT_MS", Some("1500")),
                ("WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS", Some("not-a-number")),
                ("WEB_SCREENSHOT_SCROLL_PAUSE_MS", Some("0")),
                ("WEB_SCREENSHOT_CHROME_PATH", Some("/opt/chrome/chrome")),
            ],
            || {
                let settings = CaptureSettings::from_env();
                assert_eq!(settings.navigation_timeout, Duration::from_millis(1500));
                assert_eq!(settings.network_idle_timeout, Duration::from_secs(30));
                assert_eq!(settings.scroll_pause, Duration::ZERO);
                assert_eq!(settings.chrome_path, Some(PathBuf::from("/opt/chrome/chrome")));
            },
        );
    }

    #[test]
    fn test_soft_records_prefixed_event() {
        let session = CaptureSession::new("https://example.com", DeviceProfile::Desktop);

        let ok: Option<u8> = soft(&session, "Metrics error", Ok(7));
        assert_eq!(ok, Some(7));
        assert!(session.events.is_empty());

        let failed: Option<u8> = soft(
            &session,
            "Metrics error",
            Err(CaptureError::ScriptEvaluation {
                reason: "boom".to_string(),
            }),
        );
        assert!(failed.is_none());
        assert!(session.events.contains("Metrics error: "));
        assert!(session.events.contains("boom"));
    }

    #[tokio::test]
    async fn test_scroll_pass_order() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = CaptureOrchestrator::new(MockBrowser::new(), fast_settings());
        orchestrator
            .capture("https://example.com", dir.path(), "desktop")
            .await
            .unwrap();

        let scrolls: Vec<String> = orchestrator
            .backend()
            .evaluated_scripts()
            .into_iter()
            .filter(|s| s.contains("scrollTo"))
            .collect();
        assert_eq!(
            scrolls,
            vec![
                "window.scrollTo(0, 1000)",
                "window.scrollTo(0, 2000)",
                "window.scrollTo(0, 3000)",
                "window.scrollTo(0, 4000)",
                "window.scrollTo(0, 5000)",
                "window.scrollTo(0, 0)",
            ]
        );
    }

    #[tokio::test]
    async fn test_scroll_pauses_after_each_step() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CaptureSettings {
            scroll_pause: Duration::from_millis(20),
            ..CaptureSettings::default()
        };
        let orchestrator = CaptureOrchestrator::new(MockBrowser::new(), settings);
        let report = orchestrator
            .capture("https://example.com", dir.path(), "desktop")
            .await
            .unwrap();

        // Six pauses of 20ms each
        assert!(report.load_time >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_launch_options_carry_chrome_path() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CaptureSettings {
            chrome_path: Some(PathBuf::from("/usr/bin/chromium")),
            ..fast_settings()
        };
        let orchestrator = CaptureOrchestrator::new(MockBrowser::new(), settings);
        orchestrator
            .capture("https://example.com", dir.path(), "laptop")
            .await
            .unwrap();

        let launch = orchestrator.backend().launch_options().unwrap();
        assert!(launch.headless);
        assert_eq!(launch.executable, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[tokio::test]
    async fn test_report_summary() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = CaptureOrchestrator::new(MockBrowser::new(), fast_settings());
        let report = orchestrator
            .capture("https://example.com", dir.path(), "tablet")
            .await
            .unwrap();

        let summary = report.to_string();
        assert!(summary.starts_with("Screenshot captured successfully!"));
        assert!(summary.contains(&format!("Full page: {}_full.png", report.paths.base_name)));
        assert!(summary.contains(&format!("Log: {}_log.json", report.paths.base_name)));
        assert!(summary.lines().last().unwrap().starts_with("Time: "));
        assert!(report.wrote(&report.paths.log));
    }

    #[tokio::test]
    async fn test_report_summary_marks_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = CaptureOrchestrator::new(
            MockBrowser::new().with_screenshot_failure(ScreenshotScope::FullPage),
            fast_settings(),
        );
        let report = orchestrator
            .capture("https://example.com", dir.path(), "desktop")
            .await
            .unwrap();

        let summary = report.to_string();
        assert!(!report.wrote(&report.paths.full_page));
        assert!(summary.contains("Full page: not written"));
        assert!(summary.contains(&format!("Viewport: {}_viewport.png", report.paths.base_name)));
        assert!(summary.contains(&format!("HTML: {}.html", report.paths.base_name)));
    }

    #[tokio::test]
    async fn test_metrics_and_page_info_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = CaptureOrchestrator::new(
            MockBrowser::new().with_title("Hello").with_page_height(4200),
            fast_settings(),
        );
        let report = orchestrator
            .capture("https://example.com", dir.path(), "mobile")
            .await
            .unwrap();

        let metrics = report.session.performance.metrics.unwrap();
        assert_eq!(metrics.dom_content_loaded, 120);
        assert_eq!(metrics.fully_loaded, 480);
        assert_eq!(metrics.dom_interactive, 95);

        let info = report.session.page_info.unwrap();
        assert_eq!(info.title, "Hello");
        assert_eq!(info.width, 375);
        assert_eq!(info.height, 4200);
    }
}
