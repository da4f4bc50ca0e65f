//! Object mask preview CLI
//!
//! Replays a box drag over an image, runs detection and writes the preview
//! overlay, the raw mask and the object removal job config.

use super::config::{CliConfigBuilder, CliRunConfig};
use crate::{
    compositor::{blit, compose_overlay, flatten_onto, OverlayState, RasterSurface},
    config::{ObjectRemovalConfig, RemovalMethod},
    detection::{FloodFillDetector, ObjectDetector},
    mapping::PointerEvent,
    session::{ConfigListener, DetectionMode, MaskPreviewSession, SessionEvent, StateKind},
    tracing_config::{events, init_cli_tracing, spans},
    worker::DetectionWorker,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

/// Object mask preview tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "objmask")]
pub struct Cli {
    /// Input image
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Selection box in display pixels
    #[arg(long = "box", value_name = "X,Y,W,H")]
    pub selection: String,

    /// Size the image is displayed at [default: natural size]
    #[arg(long, value_name = "WxH")]
    pub display_size: Option<String>,

    /// Color similarity tolerance (0.1-0.8)
    #[arg(short, long, default_value_t = 0.3)]
    pub sensitivity: f32,

    /// Sobel magnitude threshold (0-100, 0 disables edge reinforcement)
    #[arg(short, long, default_value_t = 50)]
    pub edge_threshold: u8,

    /// Mask smoothing iterations (0-5)
    #[arg(long, default_value_t = 2)]
    pub smoothing: u8,

    /// How the mask is drawn in the overlay
    #[arg(long, value_enum, default_value_t = CliViewMode::Contour)]
    pub view: CliViewMode,

    /// Inpainting quality tier
    #[arg(short, long, value_enum, default_value_t = CliQuality::Free)]
    pub quality: CliQuality,

    /// Write the preview (image plus overlay) as PNG
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Write the raw RGBA mask as PNG
    #[arg(long, value_name = "PATH")]
    pub mask_output: Option<PathBuf>,

    /// Write the job config JSON here ("-" for stdout) [default: stdout]
    #[arg(long, value_name = "PATH")]
    pub config_out: Option<String>,

    /// Skip detection and emit a BOUNDING_BOX config
    #[arg(long)]
    pub bounding_box_only: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format on stderr (json needs the `tracing-json` feature)
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliViewMode {
    Contour,
    Box,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliQuality {
    Free,
    Premium,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    Json,
}

/// Drives a spinner from the session's busy notifications
struct SpinnerListener {
    bar: ProgressBar,
}

impl SpinnerListener {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid spinner template")?,
        );
        Ok(Self { bar })
    }
}

impl ConfigListener for SpinnerListener {
    fn on_config_change(&self, config: &ObjectRemovalConfig) {
        debug!(
            method = ?config.method,
            has_mask = config.mask.is_some(),
            token_cost = config.token_cost(),
            "config changed"
        );
    }

    fn on_busy_change(&self, busy: bool) {
        if busy {
            self.bar.set_message("Detecting object...");
            self.bar.enable_steady_tick(Duration::from_millis(100));
        } else {
            self.bar.finish_and_clear();
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let session_id =
        init_cli_tracing(cli.verbose, config.log_format).context("Failed to initialize tracing")?;

    let span = spans::session(&session_id, FloodFillDetector.name());
    match run(config).instrument(span).await {
        Ok(()) => Ok(()),
        Err(e) => {
            events::error_with_context(&*e, "objmask run");
            Err(e)
        }
    }
}

async fn run(config: CliRunConfig) -> Result<()> {
    let source = {
        let _span = spans::file_processing(&config.input, "load").entered();
        image::open(&config.input)
            .with_context(|| format!("Failed to open image {}", config.input.display()))?
            .to_rgba8()
    };
    let display_size = config.display_size.unwrap_or_else(|| source.dimensions());
    info!(
        "Input: {} ({}x{}), display {}x{}",
        config.input.display(),
        source.width(),
        source.height(),
        display_size.0,
        display_size.1
    );

    let detector: Arc<dyn ObjectDetector> = Arc::new(FloodFillDetector::new());
    let mut session = MaskPreviewSession::new(config.preview.clone())
        .with_detector(Arc::clone(&detector))
        .with_listener(Arc::new(SpinnerListener::new()?))
        .with_mode(DetectionMode::Deferred);
    session
        .load_image(source, display_size)
        .context("Failed to load image into session")?;
    session.set_quality(config.quality);

    if config.bounding_box_only {
        return write_bounding_box_only(&session, &config);
    }

    let selection = config.selection;
    session.dispatch(SessionEvent::PointerDown(PointerEvent::new(selection.x, selection.y)));
    session.dispatch(SessionEvent::PointerMove(PointerEvent::new(
        selection.x + selection.width,
        selection.y + selection.height,
    )));
    let state = session.dispatch(SessionEvent::PointerUp(PointerEvent::new(
        selection.x + selection.width,
        selection.y + selection.height,
    )));

    if state != StateKind::Detecting {
        bail!(
            "Selection {:.0}x{:.0} is below the {}px minimum",
            selection.width,
            selection.height,
            session.preview_config().min_selection_side
        );
    }

    let request = session
        .take_detection_request()
        .context("Detection request was not queued")?;
    let (mut worker, mut responses) = DetectionWorker::new(detector, 1);
    worker.submit(request);
    let response = responses
        .recv()
        .await
        .context("Detection worker stopped without a result")?;

    if session.dispatch(response.into()) != StateKind::Detected {
        bail!("No object could be detected inside the selection");
    }

    if let Some(timings) = session.last_timings() {
        events::detection_timings(timings);
        info!("Detection: {}", timings.summary());
    }
    if let Some(mask) = session.state().mask() {
        let stats = mask.statistics();
        events::progress(&format!(
            "Mask covers {} px ({:.1}% of canvas), {} edge-reinforced",
            stats.masked_pixels,
            stats.coverage_ratio * 100.0,
            stats.reinforced_pixels
        ));
    }

    if let Some(path) = &config.output {
        write_preview(&session, path)?;
    }
    if let Some(path) = &config.mask_output {
        let _span = spans::file_processing(path, "mask").entered();
        session
            .state()
            .mask()
            .context("Detected state without a mask")?
            .save_png(path)
            .with_context(|| format!("Failed to write mask {}", path.display()))?;
        info!("Mask written to {}", path.display());
    }

    write_config(session.removal_config(), config.config_out.as_deref())
}

fn write_bounding_box_only(session: &MaskPreviewSession, config: &CliRunConfig) -> Result<()> {
    let removal = ObjectRemovalConfig {
        method: RemovalMethod::BoundingBox,
        coordinates: Some(session.scale().canvas_to_image(&config.selection)),
        quality: Some(config.quality),
        mask: None,
        detection_settings: None,
    };

    if let Some(path) = &config.output {
        let (width, height) = session.canvas_size().context("Image not loaded")?;
        let committed = [config.selection];
        let overlay = compose_overlay(&OverlayState {
            width,
            height,
            mask: None,
            view_mode: config.preview.view_mode,
            committed: &committed,
            live_box: None,
            scale: session.scale(),
        });
        let mut surface = RasterSurface::new(width, height);
        blit(&overlay, &mut surface);
        save_flattened(session, &surface, path)?;
    }

    write_config(&removal, config.config_out.as_deref())
}

fn write_preview(session: &MaskPreviewSession, path: &Path) -> Result<()> {
    let (width, height) = session.canvas_size().context("Image not loaded")?;
    let mut surface = RasterSurface::new(width, height);
    session.render_to(&mut surface);
    save_flattened(session, &surface, path)
}

fn save_flattened(
    session: &MaskPreviewSession,
    surface: &RasterSurface,
    path: &Path,
) -> Result<()> {
    let _span = spans::file_processing(path, "preview").entered();
    let background = session.preview_image().context("Image not loaded")?;
    flatten_onto(background, surface.image())
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write preview {}", path.display()))?;
    for text in surface.texts() {
        debug!(text = %text.text, x = text.x, y = text.y, "label");
    }
    info!("Preview written to {}", path.display());
    Ok(())
}

fn write_config(removal: &ObjectRemovalConfig, destination: Option<&str>) -> Result<()> {
    if let Err(e) = removal.validate() {
        warn!("Config is not ready to submit: {}", e);
    }
    let json = serde_json::to_string_pretty(removal).context("Failed to serialize config")?;

    match destination {
        None | Some("-") => println!("{json}"),
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write config {}", path))?;
            info!("Config written to {} (token cost {})", path, removal.token_cost());
        }
    }
    Ok(())
}
