//! Best-effort screenshot capture for failing invocations.
//!
//! Capture walks a two-step chain: the execution context's native capture
//! first, then a [`DisplayCapture`] of the primary display. Every error on the
//! way ends in an empty screenshot; none of them can fail the invocation.

use crate::config::ScreenshotSetting;
use crate::runtime::context::ExecutionContext;
use crate::runtime::invoker::catch_panic;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no display capture backend is available")]
    Unavailable,

    #[error("no primary display found")]
    NoPrimaryDisplay,

    #[error("display capture failed: {0}")]
    Backend(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Captures the full bounds of the primary display as PNG bytes.
pub trait DisplayCapture: Send {
    fn capture_png(&mut self) -> Result<Vec<u8>, CaptureError>;
}

/// Used when the crate is built without a display backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDisplay;

impl DisplayCapture for NoDisplay {
    fn capture_png(&mut self) -> Result<Vec<u8>, CaptureError> {
        Err(CaptureError::Unavailable)
    }
}

/// Primary monitor capture through `xcap`, encoded with its bundled `image`.
#[cfg(feature = "display-capture")]
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryDisplay;

#[cfg(feature = "display-capture")]
impl DisplayCapture for PrimaryDisplay {
    fn capture_png(&mut self) -> Result<Vec<u8>, CaptureError> {
        let monitors =
            xcap::Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        let primary = monitors
            .into_iter()
            .find(|monitor| monitor.is_primary())
            .ok_or(CaptureError::NoPrimaryDisplay)?;
        let frame = primary
            .capture_image()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;

        let mut png = std::io::Cursor::new(Vec::new());
        frame
            .write_to(&mut png, xcap::image::ImageFormat::Png)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        Ok(png.into_inner())
    }
}

/// The display backend compiled into this build.
pub fn default_display() -> Box<dyn DisplayCapture> {
    #[cfg(feature = "display-capture")]
    {
        Box::new(PrimaryDisplay)
    }
    #[cfg(not(feature = "display-capture"))]
    {
        Box::new(NoDisplay)
    }
}

/// Screenshot policy applied on the failure path.
pub struct ScreenshotChain {
    setting: ScreenshotSetting,
    fallback: Box<dyn DisplayCapture>,
}

impl ScreenshotChain {
    pub fn new(setting: ScreenshotSetting) -> Self {
        Self::with_fallback(setting, default_display())
    }

    pub fn with_fallback(setting: ScreenshotSetting, fallback: Box<dyn DisplayCapture>) -> Self {
        Self { setting, fallback }
    }

    pub fn setting(&self) -> &ScreenshotSetting {
        &self.setting
    }

    /// Screenshot bytes for a failing invocation; empty when disabled or when
    /// every source failed.
    pub fn capture<C: ExecutionContext + ?Sized>(&mut self, context: &mut C) -> Vec<u8> {
        if !self.setting.is_enabled() {
            debug!("Screenshot capture disabled");
            return Vec::new();
        }
        match self.try_capture(context) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(error = %err, "Screenshot omitted");
                Vec::new()
            }
        }
    }

    fn try_capture<C: ExecutionContext + ?Sized>(
        &mut self,
        context: &mut C,
    ) -> Result<Vec<u8>, CaptureError> {
        let native = catch_panic(|| context.try_screen_capture())
            .map_err(|panic| CaptureError::Backend(panic.message))?;
        if let Some(bytes) = native {
            return Ok(bytes);
        }

        debug!("No native capture available, falling back to primary display");
        let fallback = &mut self.fallback;
        catch_panic(|| fallback.capture_png())
            .map_err(|panic| CaptureError::Backend(panic.message))?
    }
}
