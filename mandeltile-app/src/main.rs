mod commands;
mod config;
mod snapshot;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error, info};

use mandeltile_core::{CoreError, ViewCommand, ViewState};
use mandeltile_render::{
    export_png, ExportMetadata, Layout, RenderBuffer, RenderCoordinator, RenderError,
};

use crate::config::{default_config_path, RenderConfig};

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no frame was rendered ({failed} batch(es) failed)")]
    NoFrame { failed: u64 },
}

/// Render the Mandelbrot set tile by tile on a pool of worker threads.
#[derive(Debug, Parser)]
#[command(name = "mandeltile", version)]
struct Cli {
    /// JSON settings file (defaults to mandeltile.json next to the binary).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start from a view snapshot written by --snapshot.
    #[arg(long)]
    view: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Tile grid rows.
    #[arg(long)]
    rows: Option<u32>,
    /// Tile grid columns.
    #[arg(long)]
    cols: Option<u32>,
    /// Compute units in the pool.
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, allow_hyphen_values = true)]
    cx: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    cy: Option<f64>,
    #[arg(long)]
    per_pixel: Option<f64>,
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Where to write the rendered PNG.
    #[arg(short, long, default_value = "mandeltile.png")]
    output: PathBuf,

    /// Also write the rendered view as JSON.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Navigation steps applied in order before the final frame:
    /// reset, more, fewer, zoom-out, up, down, left, right,
    /// zoom-in:PX,PY, pan:DX,DY.
    #[arg(value_parser = commands::parse_command)]
    commands: Vec<ViewCommand>,
}

impl Cli {
    /// Merge command-line overrides into the file settings.
    fn settings(&self, mut config: RenderConfig) -> Result<(Layout, usize, ViewState), AppError> {
        if let Some(w) = self.width {
            config.width = w;
        }
        if let Some(h) = self.height {
            config.height = h;
        }
        if let Some(r) = self.rows {
            config.rows = r;
        }
        if let Some(c) = self.cols {
            config.cols = c;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }

        let base = match &self.view {
            Some(path) => snapshot::load(path)?,
            None => config.start_view(),
        };
        let view = ViewState::new(
            self.cx.unwrap_or(base.cx),
            self.cy.unwrap_or(base.cy),
            self.per_pixel.unwrap_or(base.per_pixel),
            self.max_iterations.unwrap_or(base.max_iterations),
        )?;

        let layout = Layout {
            width: config.width,
            height: config.height,
            rows: config.rows,
            cols: config.cols,
        };
        Ok((layout, config.worker_count(), view))
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let (layout, workers, view) = cli.settings(RenderConfig::load(&config_path))?;
    info!(
        width = layout.width,
        height = layout.height,
        rows = layout.rows,
        cols = layout.cols,
        workers,
        "Rendering"
    );

    let surface = RenderBuffer::new(layout.width, layout.height);
    let mut coordinator = RenderCoordinator::with_workers(surface, workers, layout, view)?;

    coordinator.render();
    for command in &cli.commands {
        let next = coordinator.apply(*command);
        debug!(?command, cx = next.cx, cy = next.cy, per_pixel = next.per_pixel, "Applied command");
    }
    coordinator.wait_idle();

    let stats = coordinator.stats();
    let Some(rendered) = coordinator.rendered_view() else {
        return Err(AppError::NoFrame {
            failed: stats.batches_failed,
        });
    };

    let metadata = ExportMetadata {
        view: rendered,
        layout: coordinator.layout(),
    };
    export_png(coordinator.surface(), &cli.output, &metadata)?;
    if let Some(path) = &cli.snapshot {
        snapshot::save(path, &rendered)?;
    }

    info!(
        frames = stats.frames_committed,
        batches = stats.batches_started,
        failed = stats.batches_failed,
        last_frame_ms = stats.last_frame.map_or(0, |d| d.as_millis() as u64),
        output = %cli.output.display(),
        "Done"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting MandelTile");

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mandeltile").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_overrides_config() {
        let cli = parse(&["--width", "64", "--rows", "2", "--workers", "3", "--cx", "-1.25"]);
        let (layout, workers, view) = cli.settings(RenderConfig::default()).unwrap();
        assert_eq!(layout.width, 64);
        assert_eq!(layout.height, 600);
        assert_eq!((layout.rows, layout.cols), (2, 4));
        assert_eq!(workers, 3);
        assert!((view.cx - (-1.25)).abs() < f64::EPSILON);
        assert_eq!(view.max_iterations, ViewState::DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn commands_are_parsed_in_order() {
        let cli = parse(&["zoom-in:10,20", "more", "pan:-3,4"]);
        assert_eq!(
            cli.commands,
            vec![
                ViewCommand::ZoomIn { px: 10.0, py: 20.0 },
                ViewCommand::MoreIterations,
                ViewCommand::Pan { dx: -3.0, dy: 4.0 },
            ]
        );
    }

    #[test]
    fn invalid_override_is_an_error() {
        let cli = parse(&["--per-pixel", "0"]);
        assert!(matches!(
            cli.settings(RenderConfig::default()),
            Err(AppError::Core(_))
        ));
    }

    #[test]
    fn run_writes_png_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("out.png");
        let json = dir.path().join("view.json");
        let missing_config = dir.path().join("absent.json");

        let cli = parse(&[
            "--config",
            missing_config.to_str().unwrap(),
            "--width",
            "40",
            "--height",
            "30",
            "--workers",
            "2",
            "--max-iterations",
            "60",
            "--output",
            png.to_str().unwrap(),
            "--snapshot",
            json.to_str().unwrap(),
            "zoom-out",
            "more",
        ]);
        run(cli).unwrap();

        assert!(png.exists());
        let view = snapshot::load(&json).unwrap();
        assert_eq!(view.max_iterations, 90);
    }
}
