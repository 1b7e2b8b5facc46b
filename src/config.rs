//! Executor configuration.
//!
//! Configuration is loaded from an optional TOML file. Screenshot capture is
//! controlled by an explicit [`ScreenshotSetting`]; the default setting keeps
//! reading the `screenshot_on_failure` environment flag on every failing
//! invocation.

use crate::{ExecutorError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Environment flag consulted by [`ScreenshotSetting::FromEnv`] by default.
pub const SCREENSHOT_FLAG: &str = "screenshot_on_failure";

/// Whether failing invocations try to attach a screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScreenshotSetting {
    Enabled,
    Disabled,
    /// Read `var` fresh every time the setting is consulted.
    FromEnv { var: String },
}

impl Default for ScreenshotSetting {
    fn default() -> Self {
        ScreenshotSetting::FromEnv {
            var: SCREENSHOT_FLAG.to_string(),
        }
    }
}

impl ScreenshotSetting {
    pub fn is_enabled(&self) -> bool {
        match self {
            ScreenshotSetting::Enabled => true,
            ScreenshotSetting::Disabled => false,
            ScreenshotSetting::FromEnv { var } => {
                flag_enables_capture(env::var(var).ok().as_deref())
            }
        }
    }
}

/// Capture is on unless the flag is present and spells `false` in any case.
pub fn flag_enables_capture(value: Option<&str>) -> bool {
    !matches!(value, Some(v) if v.eq_ignore_ascii_case("false"))
}

/// Logging output options, consumed by [`crate::logging::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub screenshot: ScreenshotSetting,
    pub log: LogConfig,
}

impl ExecutorConfig {
    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ExecutorError::Config(msg) => {
                ExecutorError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ExecutorError::Config(e.to_string()))
    }
}
