//! QR code rendering and bulk ZIP export.

use std::io::{Cursor, Write};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use tagcard_core::Shortid;

pub const DEFAULT_MODULE_SIZE: u32 = 10;
pub const MAX_MODULE_SIZE: u32 = 20;
pub const DEFAULT_BORDER: u32 = 4;
pub const MAX_BORDER: u32 = 10;

/// Attachment name for bulk exports.
pub const BULK_ZIP_NAME: &str = "qr_bulk.zip";

const DARK: u8 = 0;
const LIGHT: u8 = 255;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("could not encode QR payload: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("could not write PNG: {0}")]
    Png(#[from] image::ImageError),

    #[error("could not build archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("could not build archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Rendering parameters, always within bounds once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    /// Pixels per module.
    pub module_size: u32,
    /// Quiet zone width in modules.
    pub border: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            module_size: DEFAULT_MODULE_SIZE,
            border: DEFAULT_BORDER,
        }
    }
}

impl QrOptions {
    /// Clamp requested values; absent values take the defaults.
    #[must_use]
    pub fn clamped(size: Option<i64>, border: Option<i64>) -> Self {
        Self {
            module_size: clamp(size, DEFAULT_MODULE_SIZE, MAX_MODULE_SIZE),
            border: clamp(border, DEFAULT_BORDER, MAX_BORDER),
        }
    }
}

fn clamp(value: Option<i64>, default: u32, max: u32) -> u32 {
    value.map_or(default, |v| {
        u32::try_from(v.clamp(1, i64::from(max))).unwrap_or(default)
    })
}

/// Encode `data` as a black-on-white grayscale PNG.
///
/// # Errors
///
/// Returns `QrError::Encode` if the payload does not fit in a QR code.
pub fn render_png(data: &str, options: QrOptions) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::Q)?;
    let modules = code.width();
    let colors = code.to_colors();

    let scale = options.module_size as usize;
    let quiet = options.border as usize;
    let side = (modules + 2 * quiet) * scale;

    let mut pixels = vec![LIGHT; side * side];
    for (index, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let x0 = (index % modules + quiet) * scale;
        let y0 = (index / modules + quiet) * scale;
        for row in pixels.chunks_exact_mut(side).skip(y0).take(scale) {
            for pixel in row.iter_mut().skip(x0).take(scale) {
                *pixel = DARK;
            }
        }
    }

    let side = u32::try_from(side).map_err(|_| {
        QrError::Io(std::io::Error::other("QR image too large"))
    })?;
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(&pixels, side, side, ExtendedColorType::L8)?;
    Ok(png)
}

/// Split a free-form id list on commas and whitespace.
///
/// Tokens that are not valid shortids are dropped.
#[must_use]
pub fn parse_id_list(raw: &str) -> Vec<Shortid> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|token| Shortid::parse(token).ok())
        .collect()
}

/// File name of a single tag's QR image.
#[must_use]
pub fn png_file_name(shortid: &Shortid) -> String {
    format!("qr_{shortid}.png")
}

/// Build a deflated ZIP with one `qr_{shortid}.png` per id.
///
/// `target` maps a shortid to the URL its code should open.
///
/// # Errors
///
/// Returns `QrError` if any image or the archive fails to build.
pub fn build_zip<F>(shortids: &[Shortid], options: QrOptions, target: F) -> Result<Vec<u8>, QrError>
where
    F: Fn(&Shortid) -> String,
{
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for shortid in shortids {
        let png = render_png(&target(shortid), options)?;
        zip.start_file(png_file_name(shortid), file_options)?;
        zip.write_all(&png)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn test_options_clamp() {
        assert_eq!(QrOptions::clamped(None, None), QrOptions::default());
        assert_eq!(
            QrOptions::clamped(Some(0), Some(99)),
            QrOptions {
                module_size: 1,
                border: 10
            }
        );
        assert_eq!(
            QrOptions::clamped(Some(50), Some(-1)),
            QrOptions {
                module_size: 20,
                border: 1
            }
        );
    }

    #[test]
    fn test_render_png_dimensions() {
        let options = QrOptions {
            module_size: 3,
            border: 2,
        };
        let png = render_png("https://tags.example.com/t/abcd1234", options).unwrap();
        assert!(png.starts_with(PNG_MAGIC));

        let decoded = image::load_from_memory(&png).unwrap();
        let modules = QrCode::with_error_correction_level(
            "https://tags.example.com/t/abcd1234".as_bytes(),
            EcLevel::Q,
        )
        .unwrap()
        .width() as u32;
        assert_eq!(decoded.width(), (modules + 4) * 3);
        assert_eq!(decoded.height(), decoded.width());

        let gray = decoded.to_luma8();
        // Quiet zone is white, finder pattern corner is black.
        assert_eq!(gray.get_pixel(0, 0).0, [LIGHT]);
        assert_eq!(gray.get_pixel(6, 6).0, [DARK]);
    }

    #[test]
    fn test_parse_id_list() {
        let ids = parse_id_list(" aaa111, bbb222\nccc333\t,, ../x ");
        let ids: Vec<&str> = ids.iter().map(Shortid::as_str).collect();
        assert_eq!(ids, vec!["aaa111", "bbb222", "ccc333"]);
        assert!(parse_id_list(" , \n").is_empty());
    }

    #[test]
    fn test_build_zip_entries() {
        let ids = vec![Shortid::parse("aaa111").unwrap(), Shortid::parse("bbb222").unwrap()];
        let bytes = build_zip(&ids, QrOptions::default(), |s| format!("/t/{s}")).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("qr_bbb222.png").unwrap();
        let mut png = Vec::new();
        entry.read_to_end(&mut png).unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }
}
