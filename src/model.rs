//! Data models and type definitions for web-screenshot
//!
//! This module defines the core types used throughout the application:
//! - Device profiles and the browsing-context options derived from them
//! - Browser launch options
//! - Navigation results, passive browser events and in-page measurements

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::constants::{BROWSER_LAUNCH_ARGS, DEFAULT_LOCALE, DEFAULT_USER_AGENT};

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Viewport width
    pub width:  u32,
    /// Viewport height
    pub height: u32,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Emulated device used to configure the browsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    /// 1920x1080 desktop
    #[default]
    Desktop,
    /// 1366x768 laptop
    Laptop,
    /// 768x1024 tablet with touch
    Tablet,
    /// 375x667 phone with touch
    Mobile,
}

impl DeviceProfile {
    /// Every known profile, in CLI order
    pub fn all() -> [DeviceProfile; 4] {
        [
            DeviceProfile::Desktop,
            DeviceProfile::Laptop,
            DeviceProfile::Tablet,
            DeviceProfile::Mobile,
        ]
    }

    /// Looks up a profile by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|profile| profile.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Looks up a profile by name, falling back to [`DeviceProfile::Desktop`]
    ///
    /// # Examples
    ///
    /// ```
    /// use web_screenshot::model::DeviceProfile;
    ///
    /// assert_eq!(DeviceProfile::resolve("mobile"), DeviceProfile::Mobile);
    /// assert_eq!(DeviceProfile::resolve("smartwatch"), DeviceProfile::Desktop);
    /// ```
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }

    /// Returns the profile name as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceProfile::Desktop => "desktop",
            DeviceProfile::Laptop => "laptop",
            DeviceProfile::Tablet => "tablet",
            DeviceProfile::Mobile => "mobile",
        }
    }

    /// Viewport emulated for this profile
    pub fn viewport(&self) -> Viewport {
        match self {
            DeviceProfile::Desktop => Viewport::new(1920, 1080),
            DeviceProfile::Laptop => Viewport::new(1366, 768),
            DeviceProfile::Tablet => Viewport::new(768, 1024),
            DeviceProfile::Mobile => Viewport::new(375, 667),
        }
    }

    /// Whether mobile and touch emulation are enabled
    pub fn is_mobile(&self) -> bool {
        matches!(self, DeviceProfile::Tablet | DeviceProfile::Mobile)
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for the isolated browsing context opened for a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    /// Emulated viewport
    pub viewport:   Viewport,
    /// User-agent override
    pub user_agent: String,
    /// Locale override (e.g. "en-US")
    pub locale:     String,
    /// Mobile emulation (meta viewport, overlay scrollbars)
    pub is_mobile:  bool,
    /// Touch event emulation
    pub has_touch:  bool,
}

impl ContextOptions {
    /// Context options for a device profile with the fixed user agent and locale
    pub fn for_profile(profile: DeviceProfile) -> Self {
        Self {
            viewport:   profile.viewport(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            locale:     DEFAULT_LOCALE.to_string(),
            is_mobile:  profile.is_mobile(),
            has_touch:  profile.is_mobile(),
        }
    }
}

/// Options for starting the browser process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless:   bool,
    /// Extra command-line switches
    pub args:       Vec<String>,
    /// Browser executable; `None` lets the backend detect one
    pub executable: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless:   true,
            args:       BROWSER_LAUNCH_ARGS.iter().map(|arg| arg.to_string()).collect(),
            executable: None,
        }
    }
}

impl LaunchOptions {
    /// Overrides the browser executable
    pub fn executable(mut self, path: Option<PathBuf>) -> Self {
        self.executable = path;
        self
    }
}

/// Main-document response observed during navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResponse {
    /// HTTP status code
    pub status: u16,
    /// Final response URL
    pub url:    String,
}

/// Which part of the page a screenshot covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenshotScope {
    /// Entire scrollable content
    FullPage,
    /// Visible viewport only
    Viewport,
}

impl ScreenshotScope {
    /// Human-readable label used in event messages
    pub fn label(&self) -> &'static str {
        match self {
            ScreenshotScope::FullPage => "full page",
            ScreenshotScope::Viewport => "viewport",
        }
    }
}

/// Event observed by a passive page listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// `console.*` call from the page
    Console {
        /// Console method (log, warning, error, ...)
        level: String,
        /// Rendered message text
        text:  String,
    },
    /// Uncaught exception in the page
    PageError {
        /// Exception description
        message: String,
    },
    /// Network request that failed or was aborted
    RequestFailed {
        /// Request URL
        url: String,
    },
}

impl fmt::Display for BrowserEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserEvent::Console { level, text } => write!(f, "Console [{}]: {}", level, text),
            BrowserEvent::PageError { message } => write!(f, "Page Error: {}", message),
            BrowserEvent::RequestFailed { url } => write!(f, "Request Failed: {}", url),
        }
    }
}

/// Navigation timing offsets in milliseconds from navigation start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    /// `domContentLoadedEventEnd - navigationStart`
    pub dom_content_loaded: i64,
    /// `loadEventEnd - navigationStart`
    pub fully_loaded:       i64,
    /// `domInteractive - navigationStart`
    pub dom_interactive:    i64,
}

/// Descriptive information about the rendered document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// `document.title`
    pub title:  String,
    /// `window.location.href`
    pub url:    String,
    /// Full scrollable width
    pub width:  i64,
    /// Full scrollable height
    pub height: i64,
}
