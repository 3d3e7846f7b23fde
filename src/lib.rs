//! Markshot
//!
//! An HTTP service that renders caller-supplied HTML/CSS markup to a
//! PNG or JPEG screenshot using a short-lived headless Chrome session.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome via the Chrome
//!   DevTools Protocol, one browser session per request
//! - **Capability Traits**: the browser is consumed through the [`Engine`]
//!   and [`Session`] traits so it can be replaced with a test double
//! - **Guaranteed Cleanup**: every session that launches is closed exactly
//!   once, on the success path and on every failure path
//!
//! # Example
//!
//! ```no_run
//! use markshot::{new_engine, render_screenshot, EngineConfig, RenderOptions};
//!
//! # fn main() -> markshot::Result<()> {
//! let engine = new_engine(EngineConfig::default());
//! let options = RenderOptions::default();
//! let bytes = render_screenshot(engine.as_ref(), "<h1>hello</h1>", &options)?;
//! println!("captured {} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

pub mod error;
pub use error::{Error, Result};

#[cfg(feature = "cdp")]
pub mod cdp;

pub mod server;

/// Default viewport width in CSS pixels
pub const DEFAULT_WIDTH: u32 = 1200;
/// Default viewport height in CSS pixels
pub const DEFAULT_HEIGHT: u32 = 800;
/// Default device scale factor
pub const DEFAULT_SCALE: f64 = 2.0;
/// Default JPEG quality
pub const DEFAULT_QUALITY: u32 = 90;

/// Largest accepted viewport edge, in CSS pixels
pub const MAX_DIMENSION: u32 = 8192;
/// Accepted device scale factor range
pub const SCALE_RANGE: std::ops::RangeInclusive<f64> = 0.25..=4.0;

/// Configuration for the Chrome backend
///
/// The defaults match the documented service behavior: a 20 second content
/// load deadline and a 500ms quiescence window after navigation completes.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the Chrome/Chromium executable; `None` means auto-detect
    pub chrome_path: Option<PathBuf>,
    /// Whether to run the browser with its sandbox enabled
    pub sandbox: bool,
    /// Deadline for the markup to finish loading, in milliseconds
    pub content_timeout_ms: u64,
    /// Quiescence window after navigation settles, in milliseconds
    pub settle_ms: u64,
    /// Extra command-line arguments passed to the browser process
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            sandbox: true,
            content_timeout_ms: 20_000,
            settle_ms: 500,
            extra_args: Vec::new(),
        }
    }
}

/// Viewport dimensions and device scale factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            device_scale_factor: DEFAULT_SCALE,
        }
    }
}

/// Output image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    /// MIME type for the encoded image
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Caller-facing rendering options
///
/// All fields are optional on the wire and fall back to the documented
/// defaults. Field names are camelCase to match the JSON request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Viewport width in CSS pixels
    pub width: u32,
    /// Viewport height in CSS pixels
    pub height: u32,
    /// Device scale factor
    pub scale: f64,
    /// Output encoding
    pub format: ImageFormat,
    /// JPEG quality (ignored for PNG)
    pub quality: u32,
    /// Capture the full scrollable document rather than just the viewport
    pub full_page: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scale: DEFAULT_SCALE,
            format: ImageFormat::default(),
            quality: DEFAULT_QUALITY,
            full_page: true,
        }
    }
}

impl RenderOptions {
    /// Validate option values against the accepted ranges.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.width > MAX_DIMENSION {
            return Err(Error::InvalidOptions(format!(
                "width must be between 1 and {}",
                MAX_DIMENSION
            )));
        }
        if self.height == 0 || self.height > MAX_DIMENSION {
            return Err(Error::InvalidOptions(format!(
                "height must be between 1 and {}",
                MAX_DIMENSION
            )));
        }
        if !SCALE_RANGE.contains(&self.scale) {
            return Err(Error::InvalidOptions(format!(
                "scale must be between {} and {}",
                SCALE_RANGE.start(),
                SCALE_RANGE.end()
            )));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(Error::InvalidOptions(
                "quality must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }

    /// The viewport these options describe.
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            device_scale_factor: self.scale,
        }
    }

    /// The capture parameters these options describe. Quality is only
    /// forwarded for JPEG output.
    pub fn capture(&self) -> CaptureOptions {
        CaptureOptions {
            format: self.format,
            quality: match self.format {
                ImageFormat::Jpeg => Some(self.quality),
                ImageFormat::Png => None,
            },
            full_page: self.full_page,
        }
    }
}

/// Parameters for a single bitmap capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    pub format: ImageFormat,
    pub quality: Option<u32>,
    pub full_page: bool,
}

/// Core trait for screenshot engine backends
///
/// An `Engine` is a long-lived factory held by the HTTP layer; each call to
/// [`Engine::launch`] produces a fresh, request-scoped [`Session`].
pub trait Engine: Send + Sync {
    /// Launch a browser session configured for the given viewport.
    fn launch(&self, viewport: &Viewport) -> Result<Box<dyn Session>>;
}

/// A single request-scoped browser session
///
/// Implementations must tolerate `close` being the only call after a failed
/// `set_content` or `capture`.
pub trait Session: Send {
    /// Load the caller's markup as the page document and wait for it to settle.
    fn set_content(&mut self, markup: &str) -> Result<()>;

    /// Capture a bitmap of the page.
    fn capture(&mut self, options: &CaptureOptions) -> Result<Vec<u8>>;

    /// Close the session and release the underlying browser.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Render markup to an encoded image through the given engine.
///
/// This is the single funnel for a request's browser lifecycle: input is
/// validated before any session exists, the steps run strictly in order
/// (launch, content, capture), and a session that launched is closed exactly
/// once no matter which step failed. A close failure is logged and discarded
/// so it never masks the primary error.
pub fn render_screenshot(
    engine: &dyn Engine,
    markup: &str,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    if markup.trim().is_empty() {
        return Err(Error::EmptyMarkup);
    }
    options.validate()?;

    let viewport = options.viewport();
    debug!(
        width = viewport.width,
        height = viewport.height,
        scale = viewport.device_scale_factor,
        "launching browser session"
    );
    let mut session = engine.launch(&viewport)?;

    let outcome = match session.set_content(markup) {
        Ok(()) => {
            debug!("content set, capturing");
            session.capture(&options.capture())
        }
        Err(err) => Err(err),
    };

    if let Err(err) = session.close() {
        warn!(error = %err, "failed to close browser session");
    }

    let bytes = outcome?;
    debug!(bytes = bytes.len(), "screenshot captured");
    Ok(bytes)
}

/// Create an engine instance with the default backend.
#[cfg(feature = "cdp")]
pub fn new_engine(config: EngineConfig) -> std::sync::Arc<dyn Engine> {
    std::sync::Arc::new(cdp::ChromeEngine::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_options() {
        let options = RenderOptions::default();
        assert_eq!(options.width, 1200);
        assert_eq!(options.height, 800);
        assert_eq!(options.scale, 2.0);
        assert_eq!(options.format, ImageFormat::Png);
        assert_eq!(options.quality, 90);
        assert!(options.full_page);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: RenderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.width, 1200);
        assert!(options.full_page);

        let options: RenderOptions =
            serde_json::from_str(r#"{"format":"jpeg","quality":50,"fullPage":false}"#).unwrap();
        assert_eq!(options.format, ImageFormat::Jpeg);
        assert_eq!(options.quality, 50);
        assert!(!options.full_page);
        assert_eq!(options.width, 1200);
    }

    #[test]
    fn quality_forwarded_for_jpeg_only() {
        let mut options = RenderOptions::default();
        assert_eq!(options.capture().quality, None);

        options.format = ImageFormat::Jpeg;
        options.quality = 55;
        assert_eq!(options.capture().quality, Some(55));
    }

    #[test]
    fn bounds_validation() {
        let mut options = RenderOptions::default();
        assert!(options.validate().is_ok());

        options.width = 0;
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidOptions(_))
        ));

        options.width = 1200;
        options.scale = 16.0;
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidOptions(_))
        ));

        options.scale = 2.0;
        options.quality = 101;
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[test]
    fn content_types() {
        assert_eq!(ImageFormat::Png.content_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.content_type(), "image/jpeg");
    }

    struct CountingEngine {
        launches: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        fail_capture: bool,
    }

    struct CountingSession {
        closes: Arc<AtomicUsize>,
        fail_capture: bool,
    }

    impl Engine for CountingEngine {
        fn launch(&self, _viewport: &Viewport) -> Result<Box<dyn Session>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession {
                closes: self.closes.clone(),
                fail_capture: self.fail_capture,
            }))
        }
    }

    impl Session for CountingSession {
        fn set_content(&mut self, _markup: &str) -> Result<()> {
            Ok(())
        }

        fn capture(&mut self, _options: &CaptureOptions) -> Result<Vec<u8>> {
            if self.fail_capture {
                Err(Error::Capture("boom".into()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn empty_markup_launches_nothing() {
        let launches = Arc::new(AtomicUsize::new(0));
        let engine = CountingEngine {
            launches: launches.clone(),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_capture: false,
        };

        let result = render_screenshot(&engine, "   \n", &RenderOptions::default());
        assert!(matches!(result, Err(Error::EmptyMarkup)));
        assert_eq!(launches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn session_closed_once_on_capture_failure() {
        let closes = Arc::new(AtomicUsize::new(0));
        let engine = CountingEngine {
            launches: Arc::new(AtomicUsize::new(0)),
            closes: closes.clone(),
            fail_capture: true,
        };

        let result = render_screenshot(&engine, "<p>hi</p>", &RenderOptions::default());
        assert!(matches!(result, Err(Error::Capture(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_closed_once_on_success() {
        let closes = Arc::new(AtomicUsize::new(0));
        let engine = CountingEngine {
            launches: Arc::new(AtomicUsize::new(0)),
            closes: closes.clone(),
            fail_capture: false,
        };

        let bytes = render_screenshot(&engine, "<p>hi</p>", &RenderOptions::default()).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
