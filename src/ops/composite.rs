use crate::components::engine::DrawingEngine;
use crate::io::ImagePayload;
use crate::log_warn;

/// Flatten a slot's annotations onto its base image.
///
/// Returns the base payload unchanged when there is no engine, when nothing
/// has been drawn, or when decoding/encoding fails. The result is a PNG at
/// the base image's native size otherwise. Never mutates the engine.
pub fn export_composite(base: &ImagePayload, engine: Option<&DrawingEngine>) -> ImagePayload {
    let engine = match engine {
        Some(e) if !e.paths().is_empty() => e,
        _ => return base.clone(),
    };

    match engine.composite_onto(&base.bytes) {
        Ok(png) => ImagePayload::png(png),
        Err(e) => {
            log_warn!("Composite export failed, sending original image: {}", e);
            base.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::paths::{Point, Primitive, StrokeColor};
    use crate::io;
    use image::{Rgba, RgbaImage};

    fn white_png(w: u32, h: u32) -> ImagePayload {
        ImagePayload::png(io::encode_png(&RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))).unwrap())
    }

    fn red_line() -> Primitive {
        Primitive::Line {
            color: StrokeColor::RED,
            width: 4.0,
            start: Point::new(0.0, 10.0),
            end: Point::new(40.0, 10.0),
        }
    }

    #[test]
    fn no_engine_or_no_paths_returns_base() {
        let base = white_png(40, 20);
        assert_eq!(export_composite(&base, None), base);
        let engine = DrawingEngine::for_image(40, 20);
        assert_eq!(export_composite(&base, Some(&engine)), base);
    }

    #[test]
    fn annotations_are_flattened_at_native_size() {
        let base = white_png(40, 20);
        let mut engine = DrawingEngine::for_image(40, 20);
        engine.trace(&red_line());

        let out = export_composite(&base, Some(&engine));
        assert_eq!(out.mime_type, "image/png");
        let img = io::decode_rgba(&out.bytes).unwrap();
        assert_eq!(img.dimensions(), (40, 20));
        assert_eq!(*img.get_pixel(20, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(20, 2), Rgba([255, 255, 255, 255]));
        assert_eq!(engine.paths().len(), 1);
    }

    #[test]
    fn undecodable_base_falls_back_to_original_bytes() {
        let base = ImagePayload::new(b"not really a jpeg".to_vec(), "image/jpeg");
        let mut engine = DrawingEngine::for_image(40, 20);
        engine.trace(&red_line());
        assert_eq!(export_composite(&base, Some(&engine)), base);
    }

    #[test]
    fn erased_ink_stays_erased_in_export() {
        let base = white_png(40, 20);
        let mut engine = DrawingEngine::for_image(40, 20);
        engine.trace(&red_line());
        engine.trace_eraser(&[Point::new(20.0, 10.0)]);

        let img = io::decode_rgba(&export_composite(&base, Some(&engine)).bytes).unwrap();
        assert_eq!(*img.get_pixel(20, 10), Rgba([255, 255, 255, 255]));
        assert_eq!(*img.get_pixel(35, 10), Rgba([255, 0, 0, 255]));
    }
}
