//! PNG export with embedded view metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use mandeltile_core::ViewState;

use crate::buffer::RenderBuffer;
use crate::coordinator::Layout;

/// Metadata to embed in an exported PNG as tEXt chunks.
pub struct ExportMetadata {
    pub view: ViewState,
    pub layout: Layout,
}

/// Write a rendered buffer as an RGBA PNG with the view it shows embedded.
///
/// Uses the `png` crate directly so custom tEXt chunks can be added.
pub fn export_png(
    buffer: &RenderBuffer,
    path: &Path,
    metadata: &ExportMetadata,
) -> crate::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, buffer.width, buffer.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder.add_text_chunk("Software".to_string(), "MandelTile".to_string())?;
    encoder.add_text_chunk("Description".to_string(), build_description(metadata))?;
    for (key, value) in build_metadata_pairs(metadata) {
        encoder.add_text_chunk(key, value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&buffer.pixels)?;

    debug!(
        width = buffer.width,
        height = buffer.height,
        path = %path.display(),
        "Exported PNG"
    );
    Ok(())
}

fn build_description(meta: &ExportMetadata) -> String {
    let v = &meta.view;
    format!(
        "Mandelbrot - Center: {} {}i, Per pixel: {:e}, Iterations: {}",
        v.cx, v.cy, v.per_pixel, v.max_iterations,
    )
}

fn build_metadata_pairs(meta: &ExportMetadata) -> Vec<(String, String)> {
    let v = &meta.view;
    let l = &meta.layout;
    vec![
        ("MandelTile.CenterX".into(), v.cx.to_string()),
        ("MandelTile.CenterY".into(), v.cy.to_string()),
        ("MandelTile.PerPixel".into(), v.per_pixel.to_string()),
        ("MandelTile.MaxIterations".into(), v.max_iterations.to_string()),
        ("MandelTile.Grid".into(), format!("{}x{}", l.rows, l.cols)),
        ("MandelTile.Resolution".into(), format!("{}x{}", l.width, l.height)),
    ]
}
