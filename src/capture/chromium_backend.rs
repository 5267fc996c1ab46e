//! Headless Chrome/Chromium backend
//!
//! Drives a local Chrome or Chromium over the DevTools protocol using
//! `chromiumoxide`. One browser process and one page are created per capture.
//!
//! # Emulation
//!
//! Device metrics, touch emulation, user agent and locale are applied with
//! `Emulation.*` commands right after the page is created, before any
//! navigation. The launcher's own default viewport is disabled so those
//! overrides are the only ones in effect.
//!
//! # Network idle
//!
//! CDP has no network-idle wait, so the backend keeps its own count of
//! in-flight requests from `Network.requestWillBeSent`,
//! `Network.loadingFinished` and `Network.loadingFailed`. The page is idle once
//! that count has stayed at zero for [`NETWORK_IDLE_QUIET_MS`].
//!
//! # Screenshots
//!
//! Captures go straight to `Page.captureScreenshot` with
//! `captureBeyondViewport` and an explicit clip. The launcher's own full-page
//! path resizes the device metrics and clears them afterwards, which would
//! drop the profile's emulation for the rest of the run.
//!
//! # Navigation
//!
//! `Page.navigate` only answers once the navigation commits, and every CDP
//! command is capped at [`BROWSER_REQUEST_TIMEOUT_MS`]. A navigate that hits
//! that cap keeps waiting for DOMContentLoaded under the caller's bound.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::{
        browser_protocol::{
            emulation::{
                SetDeviceMetricsOverrideParams, SetLocaleOverrideParams,
                SetTouchEmulationEnabledParams, SetUserAgentOverrideParams,
            },
            network::{
                EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
                EventResponseReceived, ResourceType,
            },
            page::{
                CaptureScreenshotFormat, CaptureScreenshotParams, EventDomContentEventFired,
                NavigateParams, Viewport as ClipRegion,
            },
        },
        js_protocol::runtime::{EventConsoleApiCalled, EventExceptionThrown, RemoteObject},
    },
    error::CdpError,
    page::Page,
};
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use super::{BrowserBackend, PageSession, constants::NETWORK_IDLE_QUIET_MS};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{
        BrowserEvent, ContextOptions, LaunchOptions, NavigationResponse, ScreenshotScope,
    },
    session::EventLog,
};

/// Per-command response limit hard-coded in `chromiumoxide`
pub const BROWSER_REQUEST_TIMEOUT_MS: u64 = 30_000;

impl From<CdpError> for CaptureError {
    fn from(error: CdpError) -> Self {
        match error {
            CdpError::Timeout => CaptureError::Timeout {
                operation:   "browser request".to_string(),
                duration_ms: BROWSER_REQUEST_TIMEOUT_MS,
            },
            CdpError::JavascriptException(details) => CaptureError::ScriptEvaluation {
                reason: exception_message(
                    details.exception.as_ref(),
                    &details.text,
                ),
            },
            other => CaptureError::Protocol {
                reason: other.to_string(),
            },
        }
    }
}

/// Backend that launches a local headless Chrome/Chromium
#[derive(Debug, Default, Clone)]
pub struct ChromiumBackend;

impl ChromiumBackend {
    /// Creates the backend; nothing is started until `launch`
    pub fn new() -> Self {
        Self
    }

    fn browser_config(launch: &LaunchOptions, context: &ContextOptions) -> CaptureResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .viewport(None)
            .window_size(context.viewport.width, context.viewport.height);

        if !launch.headless {
            builder = builder.with_head();
        }
        for arg in &launch.args {
            builder = builder.arg(arg.clone());
        }
        if let Some(executable) = &launch.executable {
            builder = builder.chrome_executable(executable);
        }

        builder
            .build()
            .map_err(|reason| CaptureError::BrowserLaunch { reason })
    }

    /// Applies viewport, touch, user-agent and locale overrides to the page
    async fn apply_context(page: &Page, context: &ContextOptions) -> CaptureResult<()> {
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(context.viewport.width),
            i64::from(context.viewport.height),
            1.0,
            context.is_mobile,
        ))
        .await?;
        page.execute(SetTouchEmulationEnabledParams::new(context.has_touch))
            .await?;
        page.execute(SetUserAgentOverrideParams::new(context.user_agent.clone()))
            .await?;
        page.execute(SetLocaleOverrideParams {
            locale: Some(context.locale.clone()),
        })
        .await?;

        debug!(
            viewport = %context.viewport,
            mobile = context.is_mobile,
            locale = %context.locale,
            "Applied context emulation"
        );
        Ok(())
    }

    /// Registers console, page-error and network listeners on the page
    async fn register_listeners(
        page: &Page,
        events: EventLog,
    ) -> CaptureResult<(Vec<JoinHandle<()>>, watch::Receiver<usize>)> {
        let mut console = page.event_listener::<EventConsoleApiCalled>().await?;
        let mut exceptions = page.event_listener::<EventExceptionThrown>().await?;
        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = page.event_listener::<EventLoadingFailed>().await?;

        let console_log = events.clone();
        let console_task = tokio::spawn(async move {
            while let Some(evt) = console.next().await {
                let event = BrowserEvent::Console {
                    level: format!("{:?}", evt.r#type).to_lowercase(),
                    text:  render_console_args(&evt.args),
                };
                console_log.record(event.to_string());
            }
        });

        let error_log = events.clone();
        let error_task = tokio::spawn(async move {
            while let Some(evt) = exceptions.next().await {
                let details = &evt.exception_details;
                let event = BrowserEvent::PageError {
                    message: exception_message(details.exception.as_ref(), &details.text),
                };
                error_log.record(event.to_string());
            }
        });

        let (inflight_tx, inflight_rx) = watch::channel(0usize);
        let network_task = tokio::spawn(async move {
            let mut inflight: HashMap<String, String> = HashMap::new();
            loop {
                tokio::select! {
                    Some(evt) = requests.next() => {
                        inflight.insert(evt.request_id.inner().clone(), evt.request.url.clone());
                    }
                    Some(evt) = finished.next() => {
                        inflight.remove(evt.request_id.inner());
                    }
                    Some(evt) = failed.next() => {
                        let url = inflight
                            .remove(evt.request_id.inner())
                            .unwrap_or_else(|| evt.request_id.inner().clone());
                        debug!(%url, error = %evt.error_text, "Request failed");
                        events.record(BrowserEvent::RequestFailed { url }.to_string());
                    }
                    else => break,
                }
                inflight_tx.send_replace(inflight.len());
            }
        });

        Ok((vec![console_task, error_task, network_task], inflight_rx))
    }
}

#[async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn launch(
        &self,
        launch: &LaunchOptions,
        context: &ContextOptions,
        events: EventLog,
    ) -> CaptureResult<Box<dyn PageSession>> {
        let config = Self::browser_config(launch, context)?;

        info!(headless = launch.headless, "Launching browser");
        let (mut browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| CaptureError::BrowserLaunch {
                    reason: e.to_string(),
                })?;

        let handler_task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(e) = result {
                    debug!("Browser handler error: {}", e);
                }
            }
        });
        let mut tasks = TaskGuard::new(vec![handler_task]);

        let setup = async {
            let page = browser.new_page("about:blank").await?;
            Self::apply_context(&page, context).await?;
            let (listeners, inflight) = Self::register_listeners(&page, events).await?;
            Ok::<_, CaptureError>((page, listeners, inflight))
        };

        match setup.await {
            Ok((page, listeners, inflight)) => {
                tasks.extend(listeners);
                info!(viewport = %context.viewport, "Browser page ready");
                Ok(Box::new(ChromiumPage {
                    page,
                    browser,
                    inflight,
                    tasks,
                }))
            }
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!("Failed to close browser after setup error: {}", close_err);
                }
                let _ = browser.wait().await;
                Err(CaptureError::BrowserLaunch {
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Aborts background tasks when dropped
#[derive(Debug)]
struct TaskGuard {
    tasks: Vec<JoinHandle<()>>,
}

impl TaskGuard {
    fn new(tasks: Vec<JoinHandle<()>>) -> Self {
        Self { tasks }
    }

    fn extend(&mut self, tasks: Vec<JoinHandle<()>>) {
        self.tasks.extend(tasks);
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// The single page of a Chromium capture
struct ChromiumPage {
    page:     Page,
    browser:  Browser,
    inflight: watch::Receiver<usize>,
    tasks:    TaskGuard,
}

impl ChromiumPage {
    /// Runs `Page.captureScreenshot` and decodes the PNG payload
    async fn capture_png(
        &self,
        params: CaptureScreenshotParams,
        target: &str,
    ) -> CaptureResult<Vec<u8>> {
        let failed = |reason: String| CaptureError::ScreenshotFailed {
            target: target.to_string(),
            reason,
        };

        let shot = self
            .page
            .execute(params)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let data: &str = shot.result.data.as_ref();
        base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| failed(format!("base64 decode failed: {}", e)))
    }
}

/// Document-relative bounds of an element in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct ElementBox {
    x:      f64,
    y:      f64,
    width:  f64,
    height: f64,
}

/// Script returning the first match's document-relative box, or `null`
fn element_box_script(quoted_selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({});
    if (!el) return null;
    const r = el.getBoundingClientRect();
    return {{ x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height }};
}})()"#,
        quoted_selector
    )
}

/// Clip region at scale 1, or `None` when the area is empty
fn clip_region(x: f64, y: f64, width: f64, height: f64) -> Option<ClipRegion> {
    let usable = |v: f64| v.is_finite() && v > 0.0;
    if !usable(width) || !usable(height) || !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(ClipRegion {
        x:      x.max(0.0),
        y:      y.max(0.0),
        width:  width.ceil(),
        height: height.ceil(),
        scale:  1.0,
    })
}

/// Folds the navigation outcome into the page-load contract
///
/// `None` means the caller's bound elapsed. Any timeout surfacing from the
/// protocol layer is reported the same way.
fn settle_page_load<T>(outcome: Option<CaptureResult<T>>, timeout: Duration) -> CaptureResult<T> {
    match outcome {
        Some(Err(e)) if e.is_timeout() => Err(CaptureError::timeout("page load", timeout)),
        Some(result) => result,
        None => Err(CaptureError::timeout("page load", timeout)),
    }
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn goto(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> CaptureResult<Option<NavigationResponse>> {
        let mut dom_ready = self.page.event_listener::<EventDomContentEventFired>().await?;
        let mut responses = self.page.event_listener::<EventResponseReceived>().await?;
        let page = &self.page;

        let navigate = async move {
            let frame_id = match page.execute(NavigateParams::new(url)).await {
                Ok(response) => {
                    let nav = response.result;
                    if let Some(reason) = nav.error_text.filter(|text| !text.is_empty()) {
                        return Err(CaptureError::NavigationFailed {
                            url: url.to_string(),
                            reason,
                        });
                    }
                    Some(nav.frame_id)
                }
                Err(CdpError::Timeout) => {
                    debug!("Page.navigate reply timed out, waiting for DOMContentLoaded");
                    page.mainframe().await?
                }
                Err(e) => return Err(e.into()),
            };

            dom_ready.next().await;

            // The document response precedes DOMContentLoaded, so it is already queued.
            let mut response = None;
            while let Some(Some(evt)) = responses.next().now_or_never() {
                let in_frame = match &frame_id {
                    Some(frame) => evt.frame_id.as_ref() == Some(frame),
                    None => true,
                };
                if evt.r#type == ResourceType::Document && in_frame && response.is_none() {
                    response = Some(NavigationResponse {
                        status: u16::try_from(evt.response.status).unwrap_or_default(),
                        url:    evt.response.url.clone(),
                    });
                }
            }
            Ok::<_, CaptureError>(response)
        };

        settle_page_load(tokio::time::timeout(timeout, navigate).await.ok(), timeout)
    }

    async fn wait_for_network_idle(&mut self, timeout: Duration) -> CaptureResult<()> {
        let mut inflight = self.inflight.clone();
        let quiet = Duration::from_millis(NETWORK_IDLE_QUIET_MS);

        let idle = async move {
            loop {
                while *inflight.borrow_and_update() > 0 {
                    if inflight.changed().await.is_err() {
                        return;
                    }
                }
                match tokio::time::timeout(quiet, inflight.changed()).await {
                    Ok(Ok(())) => continue,
                    // Quiet for the whole window, or the tracker is gone
                    Ok(Err(_)) | Err(_) => return,
                }
            }
        };

        tokio::time::timeout(timeout, idle)
            .await
            .map_err(|_| CaptureError::timeout("networkidle", timeout))
    }

    async fn evaluate(&mut self, script: &str) -> CaptureResult<Value> {
        let result = self.page.evaluate_expression(script).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn screenshot(&mut self, scope: ScreenshotScope) -> CaptureResult<Vec<u8>> {
        let mut params = CaptureScreenshotParams::builder().format(CaptureScreenshotFormat::Png);
        if scope == ScreenshotScope::FullPage {
            let metrics = self.page.layout_metrics().await?;
            let content = metrics.css_content_size;
            let clip = clip_region(0.0, 0.0, content.width, content.height).ok_or_else(|| {
                CaptureError::ScreenshotFailed {
                    target: scope.label().to_string(),
                    reason: format!("empty content size {}x{}", content.width, content.height),
                }
            })?;
            params = params.capture_beyond_viewport(true).clip(clip);
        }

        self.capture_png(params.build(), scope.label()).await
    }

    async fn element_screenshot(&mut self, selector: &str) -> CaptureResult<Option<Vec<u8>>> {
        let quoted = serde_json::to_string(selector)?;
        let value = self.evaluate(&element_box_script(&quoted)).await?;
        if value.is_null() {
            return Ok(None);
        }

        let bounds: ElementBox =
            serde_json::from_value(value).map_err(|e| CaptureError::UnexpectedScriptResult {
                what:   format!("{} bounds", selector),
                reason: e.to_string(),
            })?;
        let clip = clip_region(bounds.x, bounds.y, bounds.width, bounds.height).ok_or_else(|| {
            CaptureError::ScreenshotFailed {
                target: selector.to_string(),
                reason: format!("element has zero size ({}x{})", bounds.width, bounds.height),
            }
        })?;

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(true)
            .clip(clip)
            .build();
        self.capture_png(params, selector).await.map(Some)
    }

    async fn content(&mut self) -> CaptureResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| CaptureError::ContentUnavailable {
                reason: e.to_string(),
            })
    }

    async fn close(self: Box<Self>) -> CaptureResult<()> {
        let ChromiumPage {
            page,
            mut browser,
            tasks,
            ..
        } = *self;

        if let Err(e) = page.close().await {
            debug!("Page close failed: {}", e);
        }
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!("Failed waiting for browser exit: {}", e);
        }
        drop(tasks);
        info!("Browser closed");

        closed.map(|_| ()).map_err(CaptureError::from)
    }
}

/// Renders console arguments the way DevTools prints them, space-separated
fn render_console_args(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(Value::String(s)), _) => s.clone(),
            (Some(value), _) => value.to_string(),
            (None, Some(description)) => description.clone(),
            (None, None) => "undefined".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prefers the thrown object's description over the generic exception text
fn exception_message(exception: Option<&RemoteObject>, text: &str) -> String {
    exception
        .and_then(|obj| obj.description.clone())
        .unwrap_or_else(|| text.to_string())
}
