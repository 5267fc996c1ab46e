//! Centralized timeout and configuration constants for webpage capture.
//!
//! # Runtime Configuration
//!
//! Timeout values and the browser executable can be overridden at runtime via
//! environment variables:
//!
//! | Environment Variable | Default | Description |
//! |---------------------|---------|-------------|
//! | `WEB_SCREENSHOT_NAVIGATION_TIMEOUT_MS` | 60000 | Wait for DOMContentLoaded |
//! | `WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS` | 30000 | Wait for network idle |
//! | `WEB_SCREENSHOT_SCROLL_PAUSE_MS` | 500 | Pause after each scroll step |
//! | `WEB_SCREENSHOT_CHROME_PATH` | unset | Browser executable |
//!
//! Navigation only waits for DOMContentLoaded. The network-idle wait that
//! follows is bounded separately and its timeout is not fatal.

use std::path::PathBuf;

/// Timeout for navigation to reach DOMContentLoaded.
pub const NAVIGATION_TIMEOUT_MS: u64 = 60_000;

/// Timeout for the secondary network-idle wait.
pub const NETWORK_IDLE_TIMEOUT_MS: u64 = 30_000;

/// How long the page must have no in-flight requests to count as idle.
pub const NETWORK_IDLE_QUIET_MS: u64 = 500;

/// Number of scroll steps in the lazy-load pass.
pub const SCROLL_STEPS: u32 = 5;

/// Offset added on each scroll step, in pixels.
pub const SCROLL_STEP_PX: u32 = 1000;

/// Pause after each scroll step (and after returning to the top).
pub const SCROLL_PAUSE_MS: u64 = 500;

/// User agent presented by every capture, independent of device profile.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/122.0.0.0";

/// Locale presented by every capture.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Switches passed to the browser. Sandboxing is disabled for containers.
pub const BROWSER_LAUNCH_ARGS: &[&str] = &["--disable-dev-shm-usage", "--no-sandbox"];

/// Selector used for the element-scoped screenshot.
pub const BODY_SELECTOR: &str = "body";

/// Environment variable naming the browser executable.
pub const ENV_CHROME_PATH: &str = "WEB_SCREENSHOT_CHROME_PATH";

// =============================================================================
// Environment Variable Overrides
// =============================================================================

/// Helper to get a timeout from environment variable or fall back to default.
fn get_timeout_from_env(env_var: &str, default: u64) -> u64 {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Get the navigation timeout, checking environment variable override.
///
/// Override with: `WEB_SCREENSHOT_NAVIGATION_TIMEOUT_MS`
pub fn navigation_timeout_ms() -> u64 {
    get_timeout_from_env("WEB_SCREENSHOT_NAVIGATION_TIMEOUT_MS", NAVIGATION_TIMEOUT_MS)
}

/// Get the network-idle timeout, checking environment variable override.
///
/// Override with: `WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS`
///
/// # Example
///
/// ```bash
/// # Give chatty single-page apps a minute to settle
/// export WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS=60000
/// ```
pub fn network_idle_timeout_ms() -> u64 {
    get_timeout_from_env("WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS", NETWORK_IDLE_TIMEOUT_MS)
}

/// Get the scroll pause, checking environment variable override.
///
/// Override with: `WEB_SCREENSHOT_SCROLL_PAUSE_MS`
pub fn scroll_pause_ms() -> u64 {
    get_timeout_from_env("WEB_SCREENSHOT_SCROLL_PAUSE_MS", SCROLL_PAUSE_MS)
}

/// Get the browser executable override, if set and non-empty.
pub fn chrome_path() -> Option<PathBuf> {
    std::env::var_os(ENV_CHROME_PATH)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_sanity() {
        assert!(NAVIGATION_TIMEOUT_MS > 0);
        assert!(NETWORK_IDLE_TIMEOUT_MS > 0);

        // Network idle is a secondary wait and must be shorter than the load bound
        assert!(NETWORK_IDLE_TIMEOUT_MS < NAVIGATION_TIMEOUT_MS);
        assert!(NETWORK_IDLE_QUIET_MS < NETWORK_IDLE_TIMEOUT_MS);
    }

    #[test]
    fn test_scroll_pass_constants() {
        assert_eq!(SCROLL_STEPS, 5);
        assert_eq!(SCROLL_STEP_PX, 1000);
        assert_eq!(SCROLL_PAUSE_MS, 500);
    }

    #[test]
    fn test_env_override_with_value() {
        temp_env::with_var("WEB_SCREENSHOT_NAVIGATION_TIMEOUT_MS", Some("5000"), || {
            assert_eq!(navigation_timeout_ms(), 5000);
        });

        temp_env::with_var("WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS", Some("1000"), || {
            assert_eq!(network_idle_timeout_ms(), 1000);
        });

        temp_env::with_var("WEB_SCREENSHOT_SCROLL_PAUSE_MS", Some("0"), || {
            assert_eq!(scroll_pause_ms(), 0);
        });
    }

    #[test]
    fn test_env_override_invalid_value() {
        temp_env::with_var("WEB_SCREENSHOT_NAVIGATION_TIMEOUT_MS", Some("soon"), || {
            assert_eq!(navigation_timeout_ms(), NAVIGATION_TIMEOUT_MS);
        });

        temp_env::with_var("WEB_SCREENSHOT_NETWORK_IDLE_TIMEOUT_MS", Some("-1"), || {
            // Negative numbers won't parse as u64, should fall back
            assert_eq!(network_idle_timeout_ms(), NETWORK_IDLE_TIMEOUT_MS);
        });

        temp_env::with_var("WEB_SCREENSHOT_SCROLL_PAUSE_MS", Some("0.5"), || {
            assert_eq!(scroll_pause_ms(), SCROLL_PAUSE_MS);
        });
    }

    #[test]
    fn test_chrome_path_override() {
        temp_env::with_var(ENV_CHROME_PATH, Some("/opt/chromium/chrome"), || {
            assert_eq!(chrome_path(), Some(PathBuf::from("/opt/chromium/chrome")));
        });

        temp_env::with_var(ENV_CHROME_PATH, Some(""), || {
            assert_eq!(chrome_path(), None);
        });

        temp_env::with_var_unset(ENV_CHROME_PATH, || {
            assert_eq!(chrome_path(), None);
        });
    }
}
