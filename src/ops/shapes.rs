use rayon::prelude::*;

use crate::components::paths::{Point, Primitive};

// ============================================================================
// SDF functions: signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// Distance to a line segment. A zero-length segment degrades to the
/// distance to its single point.
#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > f32::EPSILON {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Anti-aliased coverage for a signed band distance (negative = inside).
#[inline]
fn band_coverage(d: f32) -> f32 {
    smoothstep(0.5, -0.5, d)
}

// ============================================================================
// COVERAGE MASK
// ============================================================================

/// Per-pixel coverage (0.0–1.0) over a clamped rectangle of the canvas.
/// `x0`/`y0` place the mask's top-left corner in canvas pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageMask {
    pub coverage: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub x0: u32,
    pub y0: u32,
}

impl CoverageMask {
    /// Allocate an empty mask covering `[min, max]` clamped to the canvas.
    /// Returns `None` when the clamped area is empty.
    fn for_bounds(
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        canvas_w: u32,
        canvas_h: u32,
    ) -> Option<Self> {
        let (x0, y0, x1, y1) = clamp_bounds(min_x, min_y, max_x, max_y, canvas_w, canvas_h)?;
        let width = x1 - x0;
        let height = y1 - y0;
        Some(Self {
            coverage: vec![0.0; width as usize * height as usize],
            width,
            height,
            x0,
            y0,
        })
    }

    /// Merge in the coverage of one band function over a sub-rectangle,
    /// keeping the maximum per pixel so overlapping segments of one stroke
    /// paint once.
    fn accumulate<F>(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32, band: F)
    where
        F: Fn(f32, f32) -> f32 + Sync,
    {
        let Some((sx0, sy0, sx1, sy1)) = clamp_bounds(
            min_x,
            min_y,
            max_x,
            max_y,
            self.x0 + self.width,
            self.y0 + self.height,
        ) else {
            return;
        };
        let sx0 = sx0.max(self.x0);
        let sy0 = sy0.max(self.y0);
        if sx0 >= sx1 || sy0 >= sy1 {
            return;
        }

        let (mx0, my0) = (self.x0, self.y0);
        let row_len = self.width as usize;
        self.coverage
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, row_buf)| {
                let y = my0 + row as u32;
                if y < sy0 || y >= sy1 {
                    return;
                }
                let py = y as f32 + 0.5;
                for x in sx0..sx1 {
                    let px = x as f32 + 0.5;
                    let cov = band_coverage(band(px, py));
                    let idx = (x - mx0) as usize;
                    if cov > row_buf[idx] {
                        row_buf[idx] = cov;
                    }
                }
            });
    }

    /// Coverage at canvas pixel `(x, y)`; zero outside the mask.
    pub fn at(&self, x: u32, y: u32) -> f32 {
        if x < self.x0 || y < self.y0 || x >= self.x0 + self.width || y >= self.y0 + self.height {
            return 0.0;
        }
        self.coverage[((y - self.y0) * self.width + (x - self.x0)) as usize]
    }

    pub fn is_blank(&self) -> bool {
        self.coverage.iter().all(|c| *c <= 0.001)
    }
}

/// Clamp a float rectangle to integer canvas pixels, `None` when empty.
fn clamp_bounds(
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
    canvas_w: u32,
    canvas_h: u32,
) -> Option<(u32, u32, u32, u32)> {
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return None;
    }
    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64).min(canvas_w as i64);
    let y1 = (max_y.ceil() as i64).min(canvas_h as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

// ============================================================================
// PRIMITIVE RASTERIZATION
// ============================================================================

/// Rasterize the stroked outline of a primitive (round caps and joins).
///
/// Returns `None` for primitives that paint nothing (single-point freehand
/// strokes, geometry fully outside the canvas).
pub fn stroke_coverage(primitive: &Primitive, canvas_w: u32, canvas_h: u32) -> Option<CoverageMask> {
    if !primitive.is_visible() {
        return None;
    }
    let half = primitive.width().max(0.0) * 0.5;
    // Padding for half the stroke width plus the AA ramp
    let pad = half + 2.0;
    let (bx0, by0, bx1, by1) = primitive.bounds();
    let mut mask =
        CoverageMask::for_bounds(bx0 - pad, by0 - pad, bx1 + pad, by1 + pad, canvas_w, canvas_h)?;

    match primitive {
        Primitive::Freehand { points, .. } => {
            for seg in points.windows(2) {
                accumulate_segment(&mut mask, seg[0], seg[1], half, pad);
            }
        }
        Primitive::Line { start, end, .. } => {
            accumulate_segment(&mut mask, *start, *end, half, pad);
        }
        Primitive::Rect { start, end, .. } => {
            let cx = (start.x + end.x) * 0.5;
            let cy = (start.y + end.y) * 0.5;
            let hx = (end.x - start.x).abs() * 0.5;
            let hy = (end.y - start.y).abs() * 0.5;
            mask.accumulate(
                bx0 - pad,
                by0 - pad,
                bx1 + pad,
                by1 + pad,
                move |px, py| sdf_box(px - cx, py - cy, hx, hy).abs() - half,
            );
        }
        Primitive::Circle { center, edge, .. } => {
            let r = center.distance_to(*edge);
            let (cx, cy) = (center.x, center.y);
            mask.accumulate(bx0 - pad, by0 - pad, bx1 + pad, by1 + pad, move |px, py| {
                let d = ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt();
                (d - r).abs() - half
            });
        }
    }

    Some(mask)
}

fn accumulate_segment(mask: &mut CoverageMask, a: Point, b: Point, half: f32, pad: f32) {
    mask.accumulate(
        a.x.min(b.x) - pad,
        a.y.min(b.y) - pad,
        a.x.max(b.x) + pad,
        a.y.max(b.y) + pad,
        move |px, py| sdf_line_segment(px, py, a.x, a.y, b.x, b.y) - half,
    );
}

/// Rasterize a filled disc, used by the eraser.
pub fn disc_coverage(center: Point, radius: f32, canvas_w: u32, canvas_h: u32) -> Option<CoverageMask> {
    let r = radius.max(0.0);
    let pad = r + 2.0;
    let mut mask = CoverageMask::for_bounds(
        center.x - pad,
        center.y - pad,
        center.x + pad,
        center.y + pad,
        canvas_w,
        canvas_h,
    )?;
    let (cx, cy) = (center.x, center.y);
    mask.accumulate(
        center.x - pad,
        center.y - pad,
        center.x + pad,
        center.y + pad,
        move |px, py| ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt() - r,
    );
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::paths::StrokeColor;

    fn line(ax: f32, ay: f32, bx: f32, by: f32, width: f32) -> Primitive {
        Primitive::Line {
            color: StrokeColor::RED,
            width,
            start: Point::new(ax, ay),
            end: Point::new(bx, by),
        }
    }

    #[test]
    fn line_covers_its_centerline_only() {
        let mask = stroke_coverage(&line(10.0, 20.0, 90.0, 20.0, 4.0), 100, 100).unwrap();
        assert!(mask.at(50, 20) > 0.99);
        assert!(mask.at(50, 19) > 0.99);
        assert_eq!(mask.at(50, 40), 0.0);
    }

    #[test]
    fn rect_outline_leaves_interior_empty() {
        let rect = Primitive::Rect {
            color: StrokeColor::BLUE,
            width: 2.0,
            start: Point::new(50.0, 50.0),
            end: Point::new(10.0, 10.0),
        };
        let mask = stroke_coverage(&rect, 64, 64).unwrap();
        assert!(mask.at(30, 10) > 0.5);
        assert!(mask.at(10, 30) > 0.5);
        assert_eq!(mask.at(30, 30), 0.0);
    }

    #[test]
    fn circle_ring_sits_at_radius() {
        let circle = Primitive::Circle {
            color: StrokeColor::GREEN,
            width: 2.0,
            center: Point::new(32.0, 32.0),
            edge: Point::new(42.0, 32.0),
        };
        let mask = stroke_coverage(&circle, 64, 64).unwrap();
        assert!(mask.at(42, 32) > 0.5);
        assert_eq!(mask.at(32, 32), 0.0);
    }

    #[test]
    fn zero_length_segment_is_a_dot_not_nan() {
        let mask = stroke_coverage(&line(5.0, 5.0, 5.0, 5.0, 4.0), 16, 16).unwrap();
        assert!(mask.at(5, 5) > 0.5);
        assert!(mask.coverage.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn offscreen_geometry_yields_nothing() {
        assert!(stroke_coverage(&line(-50.0, -50.0, -40.0, -40.0, 2.0), 16, 16).is_none());
        let single = Primitive::Freehand {
            color: StrokeColor::RED,
            width: 3.0,
            points: vec![Point::new(4.0, 4.0)],
        };
        assert!(stroke_coverage(&single, 16, 16).is_none());
    }

    #[test]
    fn disc_is_solid_inside_radius() {
        let mask = disc_coverage(Point::new(8.0, 8.0), 4.0, 16, 16).unwrap();
        assert!(mask.at(8, 8) > 0.99);
        assert_eq!(mask.at(0, 0), 0.0);
    }
}
