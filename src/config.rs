//! Configuration types for the conversion workflow.
//!
//! All workflow behaviour is controlled through [`WorkflowConfig`], built via
//! its [`WorkflowConfigBuilder`]. One struct holds every knob so a CLI, a test
//! and an embedding application all configure the workflow the same way.

use crate::error::QuizError;
use crate::progress::WorkflowCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// File name given to every downloaded QTI package.
pub const DEFAULT_PACKAGE_FILE_NAME: &str = "quiz_package.zip";

/// Address of a conversion service started locally with its defaults.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Configuration for a conversion workflow.
///
/// Built via [`WorkflowConfig::builder()`] or using
/// [`WorkflowConfig::default()`].
///
/// # Example
/// ```rust
/// use quiz2qti::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .server_url("http://localhost:8080")
///     .tick_interval_ms(50)
///     .build()
///     .unwrap();
/// assert_eq!(config.progress_step, 10);
/// ```
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Base URL of the conversion service. Default: `http://127.0.0.1:5000`.
    ///
    /// `/preview`, `/download`, `/api/instructions` and `/api/` are resolved
    /// against it.
    pub server_url: String,

    /// Interval between two progress ticks in milliseconds. Default: 200.
    pub tick_interval_ms: u64,

    /// Progress added by each tick, in percent. Range: 1–100. Default: 10.
    ///
    /// The last tick is clamped so progress lands exactly on 100.
    pub progress_step: u8,

    /// Per-request timeout for every call to the conversion service, in seconds.
    /// Default: 60.
    pub request_timeout_secs: u64,

    /// Directory the exported package is saved into. Default: current directory.
    pub output_dir: PathBuf,

    /// File name of the exported package. Default: `quiz_package.zip`.
    pub package_file_name: String,

    /// Observer for status changes, progress ticks and export results.
    pub callback: Option<Arc<dyn WorkflowCallback>>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            tick_interval_ms: 200,
            progress_step: 10,
            request_timeout_secs: 60,
            output_dir: PathBuf::from("."),
            package_file_name: DEFAULT_PACKAGE_FILE_NAME.to_string(),
            callback: None,
        }
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("server_url", &self.server_url)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("progress_step", &self.progress_step)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("package_file_name", &self.package_file_name)
            .field("callback", &self.callback.as_ref().map(|_| "<dyn WorkflowCallback>"))
            .finish()
    }
}

impl WorkflowConfig {
    /// Create a new builder for `WorkflowConfig`.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full path the exported package is written to.
    pub fn package_path(&self) -> PathBuf {
        self.output_dir.join(&self.package_file_name)
    }
}

/// Builder for [`WorkflowConfig`].
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl fmt::Debug for WorkflowConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl WorkflowConfigBuilder {
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    pub fn progress_step(mut self, step: u8) -> Self {
        self.config.progress_step = step;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn package_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.package_file_name = name.into();
        self
    }

    pub fn callback(mut self, callback: Arc<dyn WorkflowCallback>) -> Self {
        self.config.callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, QuizError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.server_url).map_err(|e| {
            QuizError::InvalidConfig(format!("server URL '{}' is invalid: {e}", c.server_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(QuizError::InvalidConfig(format!(
                "server URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.tick_interval_ms == 0 {
            return Err(QuizError::InvalidConfig(
                "Tick interval must be ≥ 1ms".into(),
            ));
        }
        if c.progress_step == 0 || c.progress_step > 100 {
            return Err(QuizError::InvalidConfig(format!(
                "Progress step must be 1–100, got {}",
                c.progress_step
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(QuizError::InvalidConfig(
                "Request timeout must be ≥ 1s".into(),
            ));
        }
        if c.package_file_name.trim().is_empty() {
            return Err(QuizError::InvalidConfig(
                "Package file name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target format chosen when a conversion is requested.
///
/// The choice is kept by the engine and reused by the export step, so the
/// package downloaded matches what the user previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    /// QTI ZIP package (default).
    #[default]
    Qti,
    /// Direct Canvas quiz. Accepted but inert: export performs no download.
    Canvas,
}

impl ExportType {
    /// Upper-case label used in dialogs and log lines.
    pub fn label(self) -> &'static str {
        match self {
            ExportType::Qti => "QTI",
            ExportType::Canvas => "CANVAS",
        }
    }

    /// Whether `finalize()` has a download path for this type.
    pub fn is_enabled(self) -> bool {
        matches!(self, ExportType::Qti)
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
