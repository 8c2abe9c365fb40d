use mandeltile_core::{escape_count, ViewState};

use crate::error::ComputeError;
use crate::tile::Tile;

/// Everything a compute unit needs to fill one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileJob {
    pub tile: Tile,
    /// Fractal-space x of the tile's top-left pixel.
    pub x0: f64,
    /// Fractal-space y of the tile's top-left pixel.
    pub y0: f64,
    pub per_pixel: f64,
    pub max_iterations: u32,
}

impl TileJob {
    /// Resolve `tile`'s origin for `view` on a `width`×`height` canvas.
    pub fn new(tile: Tile, view: &ViewState, width: u32, height: u32) -> Self {
        let (x0, y0) = view.pixel_to_point(width, height, tile.x, tile.y);
        Self {
            tile,
            x0,
            y0,
            per_pixel: view.per_pixel,
            max_iterations: view.max_iterations,
        }
    }
}

/// Raw output of one tile job.
///
/// `iterations` holds one count per pixel in row-major order. After the
/// coordinator recolors it in place, the same buffer holds packed pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TileResult {
    pub tile: Tile,
    pub iterations: Vec<u32>,
    /// Smallest count in `iterations`.
    pub min: u32,
    /// Largest count in `iterations`.
    pub max: u32,
}

impl TileResult {
    /// Wrap a finished buffer, scanning it for its min/max.
    ///
    /// An empty buffer reports `min = max_iterations`, `max = 0`, which
    /// leaves the frame-wide aggregate unchanged.
    pub fn from_counts(tile: Tile, iterations: Vec<u32>, max_iterations: u32) -> Self {
        let (min, max) = iterations
            .iter()
            .fold((max_iterations, 0), |(lo, hi), &n| (lo.min(n), hi.max(n)));
        Self {
            tile,
            iterations,
            min,
            max,
        }
    }
}

/// Compute escape-time counts for every pixel of a tile.
///
/// Pure and deterministic; safe to run on any compute unit.
pub fn compute_tile(job: TileJob) -> Result<TileResult, ComputeError> {
    let TileJob {
        tile,
        x0,
        y0,
        per_pixel,
        max_iterations,
    } = job;
    if tile.pixel_count() == 0 {
        return Err(ComputeError::EmptyTile {
            width: tile.width,
            height: tile.height,
        });
    }
    if per_pixel <= 0.0 || !per_pixel.is_finite() {
        return Err(ComputeError::InvalidPerPixel(per_pixel));
    }

    let mut iterations = Vec::with_capacity(tile.pixel_count());
    let mut min = max_iterations;
    let mut max = 0;
    for row in 0..tile.height {
        let y = y0 + row as f64 * per_pixel;
        for col in 0..tile.width {
            let x = x0 + col as f64 * per_pixel;
            let n = escape_count(x, y, max_iterations);
            min = min.min(n);
            max = max.max(n);
            iterations.push(n);
        }
    }

    Ok(TileResult {
        tile,
        iterations,
        min,
        max,
    })
}
