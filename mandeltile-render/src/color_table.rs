//! Iteration-count → packed pixel lookup, rebuilt per frame statistics.
//!
//! Pixels are packed little-endian RGBA (`0xAABBGGRR`). Every colour in the
//! table is black; intensity lives entirely in the alpha channel, so the
//! image reads as ink over whatever the surface is composited onto.

/// Packed value for points that never escaped: opaque black.
pub const INTERIOR: u32 = 0xFF00_0000;

/// Packed value for a frame whose only count is a non-interior one:
/// fully transparent.
pub const MIN_ESCAPE: u32 = 0;

/// A lookup table from escape count (`0..=max_iterations`) to packed pixel.
///
/// Built once per frame from the frame-wide `[min, max]` range and then
/// only read, so it can be shared across threads while buffers are recolored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    entries: Vec<u32>,
    min: u32,
    max: u32,
}

impl ColorTable {
    /// Build a table for a frame whose counts span `[min, max]`.
    ///
    /// Intensity grows with `ln(1 + i - min)` so that detail stays visible
    /// when most counts sit far above zero. A frame with a single count gets
    /// one flat entry: [`INTERIOR`] if that count is the cap, otherwise
    /// [`MIN_ESCAPE`].
    pub fn build(min: u32, max: u32, max_iterations: u32) -> Self {
        let max = max.min(max_iterations);
        let min = min.min(max);
        let mut entries = vec![MIN_ESCAPE; max_iterations as usize + 1];

        if min == max {
            entries[min as usize] = if min == max_iterations {
                INTERIOR
            } else {
                MIN_ESCAPE
            };
        } else {
            for i in min..=max {
                entries[i as usize] = log_alpha(i, min, max) << 24;
            }
        }

        Self { entries, min, max }
    }

    /// Whether this table can be reused for a frame with the given range.
    pub fn matches(&self, min: u32, max: u32, max_iterations: u32) -> bool {
        self.entries.len() == max_iterations as usize + 1 && self.min == min && self.max == max
    }

    /// Packed pixel for `count`. Counts past the table clamp to the last entry.
    #[inline]
    pub fn get(&self, count: u32) -> u32 {
        let idx = (count as usize).min(self.entries.len() - 1);
        self.entries[idx]
    }

    /// Replace every count in `buffer` with its packed pixel.
    pub fn recolor(&self, buffer: &mut [u32]) {
        for px in buffer.iter_mut() {
            *px = self.get(*px);
        }
    }

    /// Number of entries (`max_iterations + 1`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `(min, max)` range this table was built for.
    pub fn range(&self) -> (u32, u32) {
        (self.min, self.max)
    }
}

/// `ceil(255 * ln(1 + i - min) / ln(1 + max - min))`, for `min < max`.
fn log_alpha(i: u32, min: u32, max: u32) -> u32 {
    let max_log = (f64::from(max - min) + 1.0).ln();
    let alpha = ((f64::from(i - min) + 1.0).ln() / max_log * 255.0).ceil() as u32;
    alpha.min(255)
}

/// Alpha byte of a packed pixel.
#[inline]
pub fn alpha(packed: u32) -> u8 {
    (packed >> 24) as u8
}
