//! Error types for webpage capture operations
//!
//! This module defines the error type shared by the orchestrator and the
//! browser backends. Each variant carries enough context to be rendered as a
//! session event, and provides a remediation hint for the operator.

use std::path::PathBuf;

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error type for webpage capture operations
///
/// Soft failures (timeouts, evaluation errors, missing elements) are turned
/// into session events by the orchestrator. Hard failures (output directory,
/// browser launch, log write) are returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Output directory could not be created or resolved
    #[error("Cannot prepare output directory {path:?}: {source}")]
    OutputDirectory {
        /// Directory that was requested
        path:   PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// Browser process could not be started
    #[error("Failed to launch browser: {reason}")]
    BrowserLaunch {
        /// Reason reported by the browser engine
        reason: String,
    },

    /// A bounded wait elapsed
    #[error("Timeout on {operation}")]
    Timeout {
        /// Operation that timed out (e.g. "page load", "networkidle")
        operation:   String,
        /// Bound that elapsed, in milliseconds
        duration_ms: u64,
    },

    /// Navigation failed for a reason other than a timeout
    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed {
        /// Requested URL
        url:    String,
        /// Error text reported by the browser
        reason: String,
    },

    /// In-page script raised or could not be evaluated
    #[error("Script evaluation failed: {reason}")]
    ScriptEvaluation {
        /// Reason reported by the browser
        reason: String,
    },

    /// Script ran but returned a value of the wrong shape
    #[error("Unexpected {what} result: {reason}")]
    UnexpectedScriptResult {
        /// What was being evaluated (e.g. "metrics")
        what:   String,
        /// Decoding failure
        reason: String,
    },

    /// Screenshot capture failed
    #[error("Failed to capture {target} screenshot: {reason}")]
    ScreenshotFailed {
        /// Capture target ("full page", "viewport", "body")
        target: String,
        /// Reason for the failure
        reason: String,
    },

    /// Serialized DOM could not be retrieved
    #[error("Page content unavailable: {reason}")]
    ContentUnavailable {
        /// Reason for the failure
        reason: String,
    },

    /// Browser protocol error not covered by a more specific variant
    #[error("Browser protocol error: {reason}")]
    Protocol {
        /// Error text from the protocol layer
        reason: String,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Session record could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CaptureError {
    /// Builds a timeout error for the given operation and bound
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        CaptureError::Timeout {
            operation:   operation.into(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Returns true for errors produced by an elapsed bound
    pub fn is_timeout(&self) -> bool {
        matches!(self, CaptureError::Timeout { .. })
    }

    /// Returns an actionable remediation hint for this error
    ///
    /// # Examples
    ///
    /// ```
    /// use web_screenshot::error::CaptureError;
    ///
    /// let error = CaptureError::BrowserLaunch {
    ///     reason: "executable not found".to_string(),
    /// };
    /// assert!(error.remediation_hint().contains("WEB_SCREENSHOT_CHROME_PATH"));
    /// ```
    pub fn remediation_hint(&self) -> &str {
        match self {
            CaptureError::OutputDirectory { .. } => {
                "Check that the output path is writable and is not an existing file. Pass a \
                 different directory with --output."
            }
            CaptureError::BrowserLaunch { .. } => {
                "Install Chrome or Chromium, or point WEB_SCREENSHOT_CHROME_PATH at the browser \
                 executable. In containers make sure /dev/shm is available or keep \
                 --disable-dev-shm-usage."
            }
            CaptureError::Timeout { operation, .. } => match operation.as_str() {
                "page load" => {
                    "The page did not reach DOMContentLoaded in time. Raise \
                     WEB_SCREENSHOT_NAVIGATION_TIMEOUT_MS or check network access to the site."
                }
                "networkidle" => {
                    "The page kept making requests (analytics, long polling). Captures still \
                     proceed; raise WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS to wait longer."
                }
                _ => "The browser did not respond in time. Retry the capture.",
            },
            CaptureError::NavigationFailed { .. } => {
                "Verify the URL is reachable from this machine (DNS, proxy, TLS)."
            }
            CaptureError::ScriptEvaluation { .. } | CaptureError::UnexpectedScriptResult { .. } => {
                "The page may have replaced built-in objects or navigated away mid-capture."
            }
            CaptureError::ScreenshotFailed { .. } => {
                "Very tall pages can exceed the browser's texture limits. The remaining \
                 artifacts are still written."
            }
            CaptureError::ContentUnavailable { .. } => {
                "The document could not be serialized. The page may have crashed."
            }
            CaptureError::Protocol { .. } => {
                "The DevTools connection reported an error. Enable RUST_LOG=chromiumoxide=debug \
                 for protocol traces."
            }
            CaptureError::IoError(_) => {
                "An I/O error occurred. Check file permissions and disk space."
            }
            CaptureError::Serialization(_) => "The session record could not be encoded as JSON.",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_timeout_messages_match_event_text() {
        let error = CaptureError::timeout("page load", Duration::from_secs(60));
        assert_eq!(error.to_string(), "Timeout on page load");
        assert!(error.is_timeout());

        let error = CaptureError::timeout("networkidle", Duration::from_secs(30));
        assert_eq!(error.to_string(), "Timeout on networkidle");
    }

    #[test]
    fn test_timeout_records_duration() {
        match CaptureError::timeout("page load", Duration::from_millis(1500)) {
            CaptureError::Timeout { duration_ms, .. } => assert_eq!(duration_ms, 1500),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_remediation_per_operation() {
        let load = CaptureError::timeout("page load", Duration::from_secs(1));
        assert!(load.remediation_hint().contains("NAVIGATION_TIMEOUT"));

        let idle = CaptureError::timeout("networkidle", Duration::from_secs(1));
        assert!(idle.remediation_hint().contains("NETWORK_IDLE_TIMEOUT"));
    }

    #[test]
    fn test_navigation_failed_message() {
        let error = CaptureError::NavigationFailed {
            url:    "https://invalid.test".to_string(),
            reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid.test"));
        assert!(msg.contains("ERR_NAME_NOT_RESOLVED"));
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_screenshot_failed_message() {
        let error = CaptureError::ScreenshotFailed {
            target: "full page".to_string(),
            reason: "texture too large".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to capture full page screenshot: texture too large"
        );
    }

    #[test]
    fn test_output_directory_keeps_source() {
        use std::error::Error as _;

        let error = CaptureError::OutputDirectory {
            path:   PathBuf::from("/proc/forbidden"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(error.to_string().contains("forbidden"));
        assert!(error.source().is_some());
        assert!(error.remediation_hint().contains("--output"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: CaptureError = io_error.into();
        assert!(matches!(error, CaptureError::IoError(_)));
        assert!(error.to_string().contains("missing"));
    }

    #[test]
    fn test_all_variants_have_hints() {
        let errors = vec![
            CaptureError::BrowserLaunch {
                reason: "x".into(),
            },
            CaptureError::ScriptEvaluation {
                reason: "x".into(),
            },
            CaptureError::UnexpectedScriptResult {
                what:   "metrics".into(),
                reason: "x".into(),
            },
            CaptureError::ContentUnavailable {
                reason: "x".into(),
            },
            CaptureError::Protocol {
                reason: "x".into(),
            },
        ];
        for error in errors {
            assert!(!error.remediation_hint().is_empty(), "{error:?}");
        }
    }
}
