//! Image encoding: diagram PNG → base64 `data:` URI for the HTML engine.
//!
//! The HTML engine prints a single self-contained page, so diagrams are
//! inlined rather than written next to it. The PNG captured by the browser is
//! embedded as is; re-encoding is only needed when an artifact was built from
//! raw pixels.

use crate::model::DiagramArtifact;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a diagram as a `data:image/png;base64,…` URI.
pub fn diagram_data_uri(diagram: &DiagramArtifact) -> Result<String, image::ImageError> {
    let png = if diagram.png.is_empty() {
        encode_png(&diagram.pixels)?
    } else {
        diagram.png.clone()
    };
    let b64 = STANDARD.encode(&png);
    debug!("Encoded diagram {} → {} bytes base64", diagram.index, b64.len());
    Ok(format!("data:image/png;base64,{b64}"))
}

/// PNG-encode an RGB raster.
pub fn encode_png(pixels: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    pixels.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
