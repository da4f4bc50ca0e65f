//! Tracing subscriber setup and span/event helpers
//!
//! The library only emits events. Installing a subscriber is left to the
//! binary, which does it through [`TracingConfig::init`].

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Console output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Colored compact output for interactive terminals
    #[default]
    Console,
    /// Plain output without ANSI colors, for CI logs and pipes
    Compact,
    /// One JSON object per event, with the current span and span list
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Subscriber configuration
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// 0 = info, 1 = debug, 2+ = trace
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive; overrides `verbosity`
    pub env_filter: Option<String>,
    /// Correlates all events of one CLI run
    pub session_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Filter directive for the configured verbosity
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// Fails on an unparsable filter or when a global subscriber is already set.
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        let registry = Registry::default().with(filter);
        match self.format {
            TracingFormat::Console | TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(self.format == TracingFormat::Console)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            }
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            }
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "mask preview session started");
        }

        Ok(())
    }
}

/// Initialize CLI tracing with a fresh session id
///
/// # Errors
/// See [`TracingConfig::init`].
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8, format: TracingFormat) -> anyhow::Result<String> {
    let session_id = uuid::Uuid::new_v4().to_string();
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_session_id(session_id.clone())
        .init()?;
    Ok(session_id)
}

/// Span helpers
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one CLI run
    pub fn session(session_id: &str, detector: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            detector = %detector
        )
    }

    /// Span for reading or writing one file
    pub fn file_processing(file_path: &std::path::Path, operation: &str) -> Span {
        tracing::span!(
            Level::DEBUG,
            "file_processing",
            file_path = %file_path.display(),
            operation = %operation
        )
    }
}

/// Event helpers
pub mod events {
    use crate::types::DetectionTimings;
    use tracing::{debug, error, info};

    /// User-facing progress line
    pub fn progress(message: &str) {
        info!("{}", message);
    }

    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!(error = %error, context = %context, "operation failed");
    }

    /// Per-stage detection timings at debug level
    pub fn detection_timings(timings: &DetectionTimings) {
        debug!(
            flood_fill_ms = timings.flood_fill_ms,
            smoothing_ms = timings.smoothing_ms,
            edge_detection_ms = timings.edge_detection_ms,
            merge_ms = timings.merge_ms,
            total_ms = timings.total_ms,
            "detection timings"
        );
    }
}
