//! Session record for a single capture run
//!
//! A [`CaptureSession`] accumulates every observation made during one run:
//! the ordered event log, the navigation status, timing metrics and page
//! information. It is serialized once, as the last artifact of the run.
//!
//! The [`EventLog`] is append-only and shared between the orchestrator and
//! the browser backend's passive listeners. Timestamps are taken while the
//! log is locked, so insertion order and timestamp order always agree.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

use crate::model::{DeviceProfile, PageInfo, PageMetrics};

/// Format of the run timestamp embedded in artifact names
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format of per-event timestamps (local time, microsecond precision)
pub const EVENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One entry in the session event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// ISO 8601 local timestamp
    pub time:    String,
    /// Free-text message
    pub message: String,
}

/// Append-only, chronologically ordered event log
///
/// Cloning the log yields another handle to the same entries.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    /// Creates an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message stamped with the current local time
    pub fn record(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(event = %message, "session event");
        if let Ok(mut entries) = self.entries.lock() {
            let time = Local::now().format(EVENT_TIMESTAMP_FORMAT).to_string();
            entries.push(Event { time, message });
        }
    }

    /// Returns the number of recorded events
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns true when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of all events in insertion order
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Returns true if any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.iter().any(|e| e.message.contains(needle)))
            .unwrap_or(false)
    }
}

impl Serialize for EventLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

/// Performance section of the session record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Performance {
    /// Elapsed time from navigation start to the end of the scroll pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_time: Option<String>,
    /// In-page navigation timing offsets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics:   Option<PageMetrics>,
}

/// Everything observed during one capture run
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSession {
    /// Requested URL
    pub url:         String,
    /// Device profile in effect
    pub device:      DeviceProfile,
    /// Run timestamp (`YYYYMMDD_HHMMSS`), shared by all artifact names
    pub timestamp:   String,
    /// Ordered event log
    pub events:      EventLog,
    /// Load time and timing metrics
    pub performance: Performance,
    /// Main-document HTTP status, absent when navigation did not complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Title, resolved URL and scroll dimensions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_info:   Option<PageInfo>,
    #[serde(skip)]
    started_at:      DateTime<Local>,
}

impl CaptureSession {
    /// Starts a session record stamped with the current local time
    pub fn new(url: impl Into<String>, device: DeviceProfile) -> Self {
        Self::started_at(url, device, Local::now())
    }

    /// Starts a session record with an explicit start time
    pub fn started_at(url: impl Into<String>, device: DeviceProfile, at: DateTime<Local>) -> Self {
        Self {
            url: url.into(),
            device,
            timestamp: at.format(RUN_TIMESTAMP_FORMAT).to_string(),
            events: EventLog::new(),
            performance: Performance::default(),
            status_code: None,
            page_info: None,
            started_at: at,
        }
    }

    /// When the session was started
    pub fn start_time(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Appends an event to the log
    pub fn log_event(&self, message: impl Into<String>) {
        self.events.record(message);
    }

    /// Records elapsed load time as fixed-precision seconds (e.g. `"2.35s"`)
    pub fn set_load_time(&mut self, elapsed: std::time::Duration) {
        self.performance.load_time = Some(format_load_time(elapsed));
    }

    /// Serializes the record as indented UTF-8 JSON with non-ASCII kept literal
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Formats a duration as seconds with two decimals
pub fn format_load_time(elapsed: std::time::Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
