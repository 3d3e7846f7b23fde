//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)
//!
//! Launches one headless Chrome process per session, loads the caller's
//! markup through a `data:` URL, and captures the bitmap over CDP.

use crate::{CaptureOptions, Engine, EngineConfig, Error, ImageFormat, Result, Session, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use serde::Deserialize;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// CDP-based engine implementation
///
/// Holds only configuration; each [`Engine::launch`] call spawns a fresh
/// browser process so sessions share nothing across requests.
pub struct ChromeEngine {
    config: EngineConfig,
}

impl ChromeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl Engine for ChromeEngine {
    fn launch(&self, viewport: &Viewport) -> Result<Box<dyn Session>> {
        let scale_arg = format!(
            "--force-device-scale-factor={}",
            viewport.device_scale_factor
        );
        let mut args: Vec<&OsStr> = vec![OsStr::new("--hide-scrollbars"), OsStr::new(&scale_arg)];
        for arg in &self.config.extra_args {
            args.push(OsStr::new(arg.as_str()));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.config.sandbox)
            .window_size(Some((viewport.width, viewport.height)))
            .ignore_certificate_errors(true)
            .path(self.config.chrome_path.clone())
            .args(args)
            .idle_browser_timeout(Duration::from_millis(self.config.content_timeout_ms + 10_000))
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(self.config.content_timeout_ms));

        debug!("browser session launched");
        Ok(Box::new(ChromeSession {
            browser,
            tab,
            timeout_ms: self.config.content_timeout_ms,
            settle: Duration::from_millis(self.config.settle_ms),
        }))
    }
}

/// One request-scoped browser process and the tab used for rendering
struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
    timeout_ms: u64,
    settle: Duration,
}

#[derive(Deserialize)]
struct DocumentSize {
    width: f64,
    height: f64,
}

impl ChromeSession {
    /// Measure the full scrollable document for a full-page clip rectangle.
    fn document_clip(&self) -> Result<Page::Viewport> {
        const MEASURE: &str = "JSON.stringify({\
            width: Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0),\
            height: Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0)})";

        let result = self
            .tab
            .evaluate(MEASURE, false)
            .map_err(|e| Error::Capture(format!("Failed to measure document: {}", e)))?;

        let value = result
            .value
            .ok_or_else(|| Error::Capture("No value returned when measuring document".into()))?;
        let text = value
            .as_str()
            .ok_or_else(|| Error::Capture("Unexpected document measurement result".into()))?;
        let size: DocumentSize = serde_json::from_str(text)
            .map_err(|e| Error::Capture(format!("Failed to parse document size: {}", e)))?;

        Ok(Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: size.width.max(1.0),
            height: size.height.max(1.0),
            scale: 1.0,
        })
    }
}

impl Session for ChromeSession {
    fn set_content(&mut self, markup: &str) -> Result<()> {
        let url = content_data_url(markup);
        self.tab
            .navigate_to(&url)
            .map_err(|e| classify_load_error(e, self.timeout_ms))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| classify_load_error(e, self.timeout_ms))?;

        // Quiescence window so late layout/paint work can finish
        std::thread::sleep(self.settle);
        Ok(())
    }

    fn capture(&mut self, options: &CaptureOptions) -> Result<Vec<u8>> {
        let clip = if options.full_page {
            Some(self.document_clip()?)
        } else {
            None
        };

        let format = match options.format {
            ImageFormat::Png => Page::CaptureScreenshotFormatOption::Png,
            ImageFormat::Jpeg => Page::CaptureScreenshotFormatOption::Jpeg,
        };

        self.tab
            .capture_screenshot(format, options.quality, clip, true)
            .map_err(|e| Error::Capture(format!("Screenshot failed: {}", e)))
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Drop the tab and browser explicitly so the child process is
        // terminated promptly.
        let ChromeSession { browser, tab, .. } = *self;
        drop(tab);
        drop(browser);
        Ok(())
    }
}

/// Embed markup in a base64 `data:` URL so it can be navigated to directly.
fn content_data_url(markup: &str) -> String {
    let encoded = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, markup);
    format!("data:text/html;charset=utf-8;base64,{}", encoded)
}

/// Map a load-phase engine error onto the service taxonomy.
///
/// The underlying crate reports failures as strings, so classification is by
/// message: deadline expiries become [`Error::Timeout`], navigation failures
/// become [`Error::InvalidContent`], and the rest stay unclassified.
fn classify_load_error(err: anyhow::Error, timeout_ms: u64) -> Error {
    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        Error::Timeout(timeout_ms)
    } else if lower.contains("navigat") || lower.contains("net::err") {
        Error::InvalidContent(text)
    } else {
        Error::Other(text)
    }
}
