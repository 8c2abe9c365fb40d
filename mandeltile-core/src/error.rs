use thiserror::Error;

/// Errors originating from the core fractal engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid per-pixel scale: {0} (must be positive and finite)")]
    InvalidPerPixel(f64),

    #[error("invalid view center: ({cx}, {cy}) (must be finite)")]
    InvalidCenter { cx: f64, cy: f64 },

    #[error("invalid canvas: {width}×{height} (must be > 0)")]
    InvalidCanvas { width: u32, height: u32 },
}
