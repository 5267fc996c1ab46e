//! web-screenshot: Capture a website in an emulated device profile
//!
//! Writes screenshots, the rendered HTML and a JSON session log into the
//! output directory, then prints a short summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use web_screenshot::capture_website;

#[derive(Parser)]
#[command(name = "web-screenshot")]
#[command(about = "Capture screenshots, HTML and load metrics of a website")]
struct Cli {
    /// URL of the page to capture
    url: String,
    /// Directory for the captured artifacts
    #[arg(short, long, default_value = "screenshots")]
    output: PathBuf,
    /// Device profile (desktop, laptop, tablet, mobile)
    #[arg(short, long, default_value = "desktop")]
    device: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Respects RUST_LOG; diagnostics go to stderr so stdout stays the summary
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("web_screenshot=info,chromiumoxide=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(url = %cli.url, device = %cli.device, "web-screenshot starting");

    let report = capture_website(&cli.url, &cli.output, &cli.device)
        .await
        .inspect_err(|e| error!("{}", e.remediation_hint()))
        .with_context(|| format!("Failed to capture {}", cli.url))?;

    println!("\n{}", report);
    Ok(())
}
