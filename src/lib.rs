//! web-screenshot: Website capture with a headless browser
//!
//! This library loads a URL in an emulated device profile and writes a
//! full-page screenshot, a viewport screenshot, an optional body screenshot,
//! the rendered HTML and a JSON session log describing the run.
//!
//! The entry point is [`capture_website`], or [`CaptureOrchestrator`] for a
//! custom [`capture::BrowserBackend`].

pub mod capture;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod session;
pub mod util;

pub use orchestrator::{CaptureOrchestrator, CaptureReport, CaptureSettings, capture_website};
