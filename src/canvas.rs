use image::{Rgba, RgbaImage};

use crate::components::paths::{Point, Primitive};
use crate::io;
use crate::ops::shapes::{CoverageMask, disc_coverage, stroke_coverage};

// ============================================================================
// SURFACE ERRORS
// ============================================================================

/// Errors raised while reading pixels out of a surface or encoding them.
#[derive(Debug)]
pub enum SurfaceError {
    Encode(String),
    Decode(String),
    SizeMismatch { expected: (u32, u32), actual: (u32, u32) },
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::Encode(e) => write!(f, "Failed to encode surface: {}", e),
            SurfaceError::Decode(e) => write!(f, "Failed to decode image: {}", e),
            SurfaceError::SizeMismatch { expected, actual } => write!(
                f,
                "Surface is {}x{} but the image is {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for SurfaceError {}

impl From<image::ImageError> for SurfaceError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Encoding(_) | image::ImageError::Unsupported(_) => {
                SurfaceError::Encode(e.to_string())
            }
            other => SurfaceError::Decode(other.to_string()),
        }
    }
}

// ============================================================================
// DRAWING SURFACE
// ============================================================================

/// Pixel target a drawing engine paints on. One implementation per platform
/// (in-memory raster, browser canvas, GPU texture, ...).
///
/// `stroke` composites source-over; `erase_disc` makes the covered pixels
/// transparent (destination-out) without touching any recorded geometry.
pub trait DrawingSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Make every pixel fully transparent.
    fn clear(&mut self);

    /// Paint one primitive with its own colour and width.
    fn stroke(&mut self, primitive: &Primitive);

    /// Punch a transparent disc of `radius` native pixels at `center`.
    fn erase_disc(&mut self, center: Point, radius: f32);

    /// Current contents as straight-alpha RGBA.
    fn to_rgba(&self) -> Result<RgbaImage, SurfaceError>;

    /// Current contents encoded as PNG.
    fn to_png(&self) -> Result<Vec<u8>, SurfaceError> {
        let img = self.to_rgba()?;
        Ok(io::encode_png(&img)?)
    }
}

/// In-memory RGBA surface rasterized on the CPU.
#[derive(Clone, Debug)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    /// Transparent surface of the given native size. Zero dimensions are
    /// bumped to 1 so the surface always has at least one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    /// True when no pixel has any alpha.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    fn paint_mask(&mut self, mask: &CoverageMask, color: [u8; 4]) {
        for row in 0..mask.height {
            let y = mask.y0 + row;
            for col in 0..mask.width {
                let cov = mask.coverage[(row * mask.width + col) as usize];
                if cov <= 0.001 {
                    continue;
                }
                let x = mask.x0 + col;
                let a = (color[3] as f32 * cov).round().min(255.0) as u8;
                let top = Rgba([color[0], color[1], color[2], a]);
                let base = *self.pixels.get_pixel(x, y);
                self.pixels.put_pixel(x, y, blend_source_over(base, top));
            }
        }
    }

    fn erase_mask(&mut self, mask: &CoverageMask) {
        for row in 0..mask.height {
            let y = mask.y0 + row;
            for col in 0..mask.width {
                let cov = mask.coverage[(row * mask.width + col) as usize];
                if cov <= 0.001 {
                    continue;
                }
                let x = mask.x0 + col;
                let p = self.pixels.get_pixel_mut(x, y);
                let a = (p[3] as f32 * (1.0 - cov)).round() as u8;
                if a == 0 {
                    *p = Rgba([0, 0, 0, 0]);
                } else {
                    p[3] = a;
                }
            }
        }
    }
}

impl DrawingSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn clear(&mut self) {
        self.pixels.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }

    fn stroke(&mut self, primitive: &Primitive) {
        if let Some(mask) = stroke_coverage(primitive, self.width(), self.height()) {
            self.paint_mask(&mask, primitive.color().rgba());
        }
    }

    fn erase_disc(&mut self, center: Point, radius: f32) {
        if let Some(mask) = disc_coverage(center, radius, self.width(), self.height()) {
            self.erase_mask(&mask);
        }
    }

    fn to_rgba(&self) -> Result<RgbaImage, SurfaceError> {
        Ok(self.pixels.clone())
    }
}

// ============================================================================
// BLENDING
// ============================================================================

/// Straight-alpha source-over.
pub fn blend_source_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    // Fully transparent top pixel: nothing to blend
    if top[3] == 0 {
        return base;
    }
    // Opaque top or empty base: overwrite
    if top[3] == 255 || base[3] == 0 {
        return top;
    }

    let top_a = top[3] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    let channel = |t: u8, b: u8| {
        let c = (t as f32 * top_a + b as f32 * base_a * (1.0 - top_a)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Draw `overlay` on top of `base` in place. Both must have the same size.
pub fn composite_over(base: &mut RgbaImage, overlay: &RgbaImage) -> Result<(), SurfaceError> {
    if base.dimensions() != overlay.dimensions() {
        return Err(SurfaceError::SizeMismatch {
            expected: base.dimensions(),
            actual: overlay.dimensions(),
        });
    }
    for (b, t) in base.pixels_mut().zip(overlay.pixels()) {
        *b = blend_source_over(*b, *t);
    }
    Ok(())
}
