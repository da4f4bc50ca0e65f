//! Conversion of CLI arguments into session configuration

use crate::cli::main_impl::{Cli, CliLogFormat, CliQuality, CliViewMode};
use crate::config::{DetectionSettings, PreviewConfig, Quality, ViewMode};
use crate::tracing_config::TracingFormat;
use crate::types::SelectionBox;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Everything one CLI run needs, parsed and validated
#[derive(Debug, Clone)]
pub(crate) struct CliRunConfig {
    pub input: PathBuf,
    /// Selection in canvas (display) pixels
    pub selection: SelectionBox,
    pub display_size: Option<(u32, u32)>,
    pub preview: PreviewConfig,
    pub quality: Quality,
    pub output: Option<PathBuf>,
    pub mask_output: Option<PathBuf>,
    /// `None` or `-` prints to stdout
    pub config_out: Option<String>,
    pub bounding_box_only: bool,
    pub log_format: TracingFormat,
}

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the run configuration from parsed arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<CliRunConfig> {
        let selection = Self::parse_box(&cli.selection).context("Invalid --box")?;
        let display_size = cli
            .display_size
            .as_deref()
            .map(Self::parse_size)
            .transpose()
            .context("Invalid --display-size")?;

        let settings = DetectionSettings::builder()
            .sensitivity(cli.sensitivity)
            .edge_threshold(cli.edge_threshold)
            .smoothing(cli.smoothing)
            .build()
            .context("Invalid detection settings")?;

        let view_mode = match cli.view {
            CliViewMode::Contour => ViewMode::Contour,
            CliViewMode::Box => ViewMode::Box,
        };

        let preview = PreviewConfig::builder()
            .settings(settings)
            .view_mode(view_mode)
            .build()
            .context("Invalid preview configuration")?;

        let quality = match cli.quality {
            CliQuality::Free => Quality::Free,
            CliQuality::Premium => Quality::Premium,
        };

        let log_format = match cli.log_format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
            #[cfg(not(feature = "tracing-json"))]
            CliLogFormat::Json => bail!("--log-format json needs the tracing-json feature"),
        };

        Ok(CliRunConfig {
            input: cli.input.clone(),
            selection,
            display_size,
            preview,
            quality,
            output: cli.output.clone(),
            mask_output: cli.mask_output.clone(),
            config_out: cli.config_out.clone(),
            bounding_box_only: cli.bounding_box_only,
            log_format,
        })
    }

    /// Reject out-of-range values instead of letting the builders clamp them
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        DetectionSettings {
            sensitivity: cli.sensitivity,
            edge_threshold: cli.edge_threshold,
            smoothing: cli.smoothing,
        }
        .validate()
        .context("Invalid detection settings")?;

        Self::parse_box(&cli.selection).context("Invalid --box")?;
        if let Some(size) = &cli.display_size {
            Self::parse_size(size).context("Invalid --display-size")?;
        }

        if cli.bounding_box_only && cli.mask_output.is_some() {
            bail!("--mask-output has no effect with --bounding-box-only");
        }

        if cfg!(not(feature = "tracing-json")) && cli.log_format == CliLogFormat::Json {
            bail!("--log-format json needs the tracing-json feature");
        }

        Ok(())
    }

    /// Parse `x,y,w,h`
    pub(crate) fn parse_box(value: &str) -> Result<SelectionBox> {
        let parts = value
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .with_context(|| format!("'{}' is not a number", part.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        let [x, y, width, height] = parts[..] else {
            bail!("expected x,y,width,height but got {} values", parts.len());
        };
        if parts.iter().any(|v| !v.is_finite()) {
            bail!("box values must be finite");
        }
        if width <= 0.0 || height <= 0.0 {
            bail!("box width and height must be positive");
        }
        Ok(SelectionBox::new(x, y, width, height))
    }

    /// Parse `WIDTHxHEIGHT`
    pub(crate) fn parse_size(value: &str) -> Result<(u32, u32)> {
        let Some((w, h)) = value.split_once(['x', 'X']) else {
            bail!("expected WIDTHxHEIGHT, got '{}'", value);
        };
        let width: u32 = w.trim().parse().with_context(|| format!("bad width '{}'", w))?;
        let height: u32 = h.trim().parse().with_context(|| format!("bad height '{}'", h))?;
        if width == 0 || height == 0 {
            bail!("display size must be non-zero");
        }
        Ok((width, height))
    }
}
