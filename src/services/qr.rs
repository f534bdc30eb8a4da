// QR code rendering
//
// Output depends only on the inputs: the same data, format, scale and
// margin always produce the same bytes.

use image::{ImageBuffer, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;
use thiserror::Error;

pub const DEFAULT_SCALE: i64 = 8;
pub const MAX_SCALE: i64 = 40;
pub const DEFAULT_MARGIN: i64 = 1;
pub const MAX_MARGIN: i64 = 16;

#[derive(Error, Debug)]
pub enum QrError {
    #[error("Data cannot be encoded as a QR code: {0}")]
    Encode(String),

    #[error("Image encoding failed: {0}")]
    Image(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrFormat {
    #[default]
    Png,
    Svg,
}

impl QrFormat {
    /// `svg` selects SVG; anything else falls back to PNG
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "svg" => QrFormat::Svg,
            _ => QrFormat::Png,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            QrFormat::Png => "image/png",
            QrFormat::Svg => "image/svg+xml",
        }
    }
}

/// Module matrix plus quiet zone, in modules
struct Matrix {
    modules: Vec<Color>,
    width: usize,
    margin: usize,
}

impl Matrix {
    fn encode(data: &str, margin: u32) -> Result<Self, QrError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
            .map_err(|e| QrError::Encode(e.to_string()))?;
        Ok(Self {
            width: code.width(),
            modules: code.to_colors(),
            margin: margin as usize,
        })
    }

    fn size(&self) -> usize {
        self.width + 2 * self.margin
    }

    /// Whether the module at (x, y), quiet zone included, is dark
    fn is_dark(&self, x: usize, y: usize) -> bool {
        let (Some(mx), Some(my)) = (x.checked_sub(self.margin), y.checked_sub(self.margin)) else {
            return false;
        };
        if mx >= self.width || my >= self.width {
            return false;
        }
        self.modules[my * self.width + mx] == Color::Dark
    }
}

/// Render `data` as a PNG with `scale` pixels per module
pub fn render_png(data: &str, scale: u32, margin: u32) -> Result<Vec<u8>, QrError> {
    let matrix = Matrix::encode(data, margin)?;
    let scale = scale.max(1);
    let pixels = (matrix.size() as u32) * scale;

    let image = ImageBuffer::from_fn(pixels, pixels, |x, y| {
        if matrix.is_dark((x / scale) as usize, (y / scale) as usize) {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| QrError::Image(e.to_string()))?;
    Ok(bytes)
}

/// Render `data` as an SVG document with one path segment per dark module
pub fn render_svg(data: &str, scale: u32, margin: u32) -> Result<String, QrError> {
    let matrix = Matrix::encode(data, margin)?;
    let scale = scale.max(1) as usize;
    let size = matrix.size();
    let pixels = size * scale;

    let mut svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{p}" height="{p}" viewBox="0 0 {s} {s}" shape-rendering="crispEdges"><rect width="{s}" height="{s}" fill="#ffffff"/><path fill="#000000" d=""##,
        p = pixels,
        s = size
    );
    for y in 0..size {
        for x in 0..size {
            if matrix.is_dark(x, y) {
                svg.push_str(&format!("M{} {}h1v1h-1z", x, y));
            }
        }
    }
    svg.push_str(r#""/></svg>"#);
    Ok(svg)
}

/// Render in `format`, returning bytes and content type
pub fn render(
    data: &str,
    format: QrFormat,
    scale: u32,
    margin: u32,
) -> Result<(Vec<u8>, &'static str), QrError> {
    let bytes = match format {
        QrFormat::Png => render_png(data, scale, margin)?,
        QrFormat::Svg => render_svg(data, scale, margin)?.into_bytes(),
    };
    Ok((bytes, format.content_type()))
}
