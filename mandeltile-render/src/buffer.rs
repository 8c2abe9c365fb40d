use crate::tile::Tile;

/// Where finished tiles end up.
///
/// `pixels` is one packed little-endian RGBA value per pixel of `tile`,
/// row-major. Implementations composite it at the tile's offset.
pub trait DisplaySurface {
    fn put_tile(&mut self, tile: &Tile, pixels: &[u32]);

    /// Called when the canvas changes size, before the next frame lands.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// An RGBA pixel buffer representing a rendered image.
#[derive(Debug, Clone)]
pub struct RenderBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel, row-major order.
    pub pixels: Vec<u8>,
}

impl RenderBuffer {
    /// Create a new, fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Packed RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.pixels[idx..idx + 4]);
        u32::from_le_bytes(bytes)
    }
}

impl DisplaySurface for RenderBuffer {
    fn put_tile(&mut self, tile: &Tile, pixels: &[u32]) {
        debug_assert_eq!(pixels.len(), tile.pixel_count());
        let stride = self.width as usize * 4;
        let tw = tile.width as usize;
        for (row, src) in pixels.chunks_exact(tw).enumerate() {
            let dst_start = (tile.y as usize + row) * stride + tile.x as usize * 4;
            let dst = &mut self.pixels[dst_start..dst_start + tw * 4];
            for (out, px) in dst.chunks_exact_mut(4).zip(src) {
                out.copy_from_slice(&px.to_le_bytes());
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }
}
