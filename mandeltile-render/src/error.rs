use thiserror::Error;

/// Errors originating from the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid tile grid: {rows}×{cols} (rows and cols must be > 0)")]
    InvalidGrid { rows: u32, cols: u32 },

    #[error("invalid image dimensions: {width}×{height} for a {rows}×{cols} grid")]
    InvalidDimensions {
        width: u32,
        height: u32,
        rows: u32,
        cols: u32,
    },

    #[error("invalid worker pool size: {0} (must be > 0)")]
    InvalidPoolSize(usize),

    #[error("failed to spawn compute unit: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode PNG: {0}")]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Core(#[from] mandeltile_core::CoreError),
}

/// Why a single submitted job did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("compute unit panicked: {0}")]
    Panicked(String),

    #[error("worker pool shut down before the job settled")]
    Disconnected,
}

/// A tile job whose shape doesn't match its tile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("tile {width}×{height} has no pixels")]
    EmptyTile { width: u32, height: u32 },

    #[error("per-pixel scale {0} is not positive and finite")]
    InvalidPerPixel(f64),
}
