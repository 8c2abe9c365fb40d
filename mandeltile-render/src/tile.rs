use crate::error::RenderError;

/// A rectangular tile within the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Pixel x of the top-left corner.
    pub x: u32,
    /// Pixel y of the top-left corner.
    pub y: u32,
    /// Tile width in pixels (the last column may be wider).
    pub width: u32,
    /// Tile height in pixels (the last row may be taller).
    pub height: u32,
}

impl Tile {
    /// Number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Split `len` pixels into `parts` spans. Every span is `len / parts` wide
/// except the last, which also takes the remainder.
fn spans(len: u32, parts: u32) -> impl Iterator<Item = (u32, u32)> {
    let base = len / parts;
    (0..parts).map(move |i| {
        let start = i * base;
        let size = if i + 1 == parts { len - start } else { base };
        (start, size)
    })
}

/// Partition a `width`×`height` canvas into a `rows`×`cols` grid of tiles.
///
/// Tiles come back in row-major order. The last column and last row absorb
/// any remainder pixels, so the grid covers the canvas exactly.
pub fn partition(width: u32, height: u32, rows: u32, cols: u32) -> crate::Result<Vec<Tile>> {
    if rows == 0 || cols == 0 {
        return Err(RenderError::InvalidGrid { rows, cols });
    }
    // Fewer pixels than grid cells would leave zero-sized tiles.
    if width < cols || height < rows {
        return Err(RenderError::InvalidDimensions {
            width,
            height,
            rows,
            cols,
        });
    }

    let mut tiles = Vec::with_capacity(rows as usize * cols as usize);
    for (y, th) in spans(height, rows) {
        for (x, tw) in spans(width, cols) {
            tiles.push(Tile {
                x,
                y,
                width: tw,
                height: th,
            });
        }
    }
    Ok(tiles)
}
