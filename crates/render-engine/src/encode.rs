//! Final encoding and data URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use stage_design_model::{ExportFormat, ExportOptions};

use crate::error::ExportError;
use crate::surface::RasterSurface;

/// Encode the finished surface. JPEG output is flattened onto opaque
/// black first, the same backdrop a browser canvas uses.
pub fn encode_surface(surface: &RasterSurface, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let (width, height) = surface.dimensions();
    let mut buf = Vec::new();
    match options.format {
        ExportFormat::Png => {
            PngEncoder::new(&mut buf)
                .write_image(surface.image().as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| ExportError::encoding("png", e))?;
        }
        ExportFormat::Jpg => {
            let flat = flatten_onto(surface.image(), [0, 0, 0]);
            JpegEncoder::new_with_quality(&mut buf, options.encoder_quality())
                .write_image(flat.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| ExportError::encoding("jpg", e))?;
        }
    }
    if buf.is_empty() {
        return Err(ExportError::encoding(
            options.format.extension(),
            "encoder produced no data",
        ));
    }
    Ok(buf)
}

/// Composite a straight-alpha image over an opaque backdrop.
pub fn flatten_onto(image: &RgbaImage, backdrop: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = a as u32;
        let mix = |c: u8, bg: u8| ((c as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8;
        image::Rgb([mix(r, backdrop[0]), mix(g, backdrop[1]), mix(b, backdrop[2])])
    })
}

/// `data:<mime>;base64,<payload>`.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// A decoded data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Parse a `data:` URL. Base64 and percent-encoded payloads are accepted.
pub fn decode_data_url(url: &str) -> Result<DataUrl, ExportError> {
    let malformed = |reason: &str| ExportError::MalformedDataUrl {
        reason: reason.to_string(),
    };
    let rest = url
        .get(..5)
        .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .map(|_| &url[5..])
        .ok_or_else(|| malformed("missing data: scheme"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| malformed("missing ',' separator"))?;

    let (mime_type, is_base64) = match meta.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (meta, false),
    };
    let mime_type = if mime_type.is_empty() {
        "text/plain".to_string()
    } else {
        mime_type.to_string()
    };

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| ExportError::MalformedDataUrl {
                reason: e.to_string(),
            })?
    } else {
        percent_decode(payload).ok_or_else(|| malformed("bad percent escape"))?
    };
    Ok(DataUrl { mime_type, bytes })
}

fn percent_decode(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_keeps_alpha() {
        let surface = RasterSurface::from_image(RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40])));
        let options = ExportOptions::new(ExportFormat::Png, 3, 2, 1.0);
        let bytes = encode_surface(&surface, &options).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30, 40]);
    }

    #[test]
    fn test_jpeg_flattens_transparency_onto_black() {
        let surface = RasterSurface::from_image(RgbaImage::new(16, 16));
        let options = ExportOptions {
            quality: 0.9,
            ..ExportOptions::new(ExportFormat::Jpg, 16, 16, 1.0)
        };
        let bytes = encode_surface(&surface, &options).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|c| *c <= 2)));
    }

    #[test]
    fn test_flatten_mixes_with_backdrop() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        assert_eq!(flatten_onto(&img, [0, 0, 0]).get_pixel(0, 0).0, [128, 128, 128]);
    }

    #[test]
    fn test_data_url_round_trip() {
        let url = to_data_url("image/png", b"\x89PNG payload");
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.bytes, b"\x89PNG payload");
    }

    #[test]
    fn test_percent_encoded_data_url() {
        let decoded = decode_data_url("data:,hello%20world").unwrap();
        assert_eq!(decoded.mime_type, "text/plain");
        assert_eq!(decoded.bytes, b"hello world");
    }

    #[test]
    fn test_malformed_data_urls() {
        assert!(matches!(
            decode_data_url("http://example.com/a.png"),
            Err(ExportError::MalformedDataUrl { .. })
        ));
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert!(decode_data_url("data:,bad%zz").is_err());
    }
}
