use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// IMAGE PAYLOADS
// ============================================================================

/// Encoded image bytes plus their MIME type, as uploaded or as sent out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/png")
    }
}

/// MIME types sniffed from file extensions for locally loaded images.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Read an image file into a payload, taking the MIME type from the
/// extension.
pub fn load_payload(path: &Path) -> Result<ImagePayload, String> {
    let mime = mime_for_path(path)
        .ok_or_else(|| format!("'{}' is not a recognised image file", path.display()))?;
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(ImagePayload::new(bytes, mime))
}

// ============================================================================
// DECODE / ENCODE
// ============================================================================

/// Natural size of an encoded image, read from its header only.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
}

/// Decode any supported format to straight-alpha RGBA.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encode RGBA pixels as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(out)
}

/// File name for saving a generated image: `refpaint-<unix millis>.png`.
pub fn download_file_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("refpaint-{}.png", millis)
}
