use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// GEOMETRY
// ============================================================================

/// A position in native canvas pixels (the source image's natural size).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ============================================================================
// STROKE COLOR
// ============================================================================

/// Straight-alpha RGBA stroke colour, written as `#rrggbb` (or `#rrggbbaa`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StrokeColor(pub [u8; 4]);

impl StrokeColor {
    pub const RED: StrokeColor = StrokeColor([0xff, 0x00, 0x00, 0xff]);
    pub const BLUE: StrokeColor = StrokeColor([0x00, 0x00, 0xff, 0xff]);
    pub const GREEN: StrokeColor = StrokeColor([0x00, 0xff, 0x00, 0xff]);
    pub const YELLOW: StrokeColor = StrokeColor([0xff, 0xff, 0x00, 0xff]);
    pub const BLACK: StrokeColor = StrokeColor([0x00, 0x00, 0x00, 0xff]);

    pub fn rgba(&self) -> [u8; 4] {
        self.0
    }

    /// Lowercase `#rrggbb`; the alpha byte is appended only when not opaque.
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

impl Default for StrokeColor {
    fn default() -> Self {
        StrokeColor::RED
    }
}

impl fmt::Display for StrokeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Returned when a colour string is not `#rgb`, `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid colour '{}': expected #rrggbb", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for StrokeColor {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() {
            return Err(err());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        match hex.len() {
            3 => {
                let mut out = [0u8, 0, 0, 255];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(err)? as u8;
                    out[i] = v * 17;
                }
                Ok(StrokeColor(out))
            }
            6 => Ok(StrokeColor([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Ok(StrokeColor([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for StrokeColor {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrokeColor> for String {
    fn from(c: StrokeColor) -> Self {
        c.to_hex()
    }
}

// ============================================================================
// PRIMITIVES
// ============================================================================

/// One committed drawing shape. Each primitive carries its own colour and
/// width, so replaying it never depends on the engine's current settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Freehand {
        color: StrokeColor,
        width: f32,
        points: Vec<Point>,
    },
    Line {
        color: StrokeColor,
        width: f32,
        start: Point,
        end: Point,
    },
    /// `start` and `end` are opposite corners in either order.
    Rect {
        color: StrokeColor,
        width: f32,
        start: Point,
        end: Point,
    },
    /// Radius is the distance from `center` to `edge`.
    Circle {
        color: StrokeColor,
        width: f32,
        center: Point,
        edge: Point,
    },
}

impl Primitive {
    pub fn color(&self) -> StrokeColor {
        match self {
            Primitive::Freehand { color, .. }
            | Primitive::Line { color, .. }
            | Primitive::Rect { color, .. }
            | Primitive::Circle { color, .. } => *color,
        }
    }

    pub fn width(&self) -> f32 {
        match self {
            Primitive::Freehand { width, .. }
            | Primitive::Line { width, .. }
            | Primitive::Rect { width, .. }
            | Primitive::Circle { width, .. } => *width,
        }
    }

    /// False for a freehand stroke with fewer than two points, which is
    /// accepted into the store but paints nothing.
    pub fn is_visible(&self) -> bool {
        match self {
            Primitive::Freehand { points, .. } => points.len() >= 2,
            _ => true,
        }
    }

    /// Axis-aligned bounds of the geometry `(min_x, min_y, max_x, max_y)`,
    /// not including stroke width.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        fn fold(pts: &[Point]) -> (f32, f32, f32, f32) {
            pts.iter().fold(
                (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
                |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
            )
        }
        match self {
            Primitive::Freehand { points, .. } => fold(points),
            Primitive::Line { start, end, .. } | Primitive::Rect { start, end, .. } => {
                fold(&[*start, *end])
            }
            Primitive::Circle { center, edge, .. } => {
                let r = center.distance_to(*edge);
                (center.x - r, center.y - r, center.x + r, center.y + r)
            }
        }
    }
}

// ============================================================================
// PATH STORE
// ============================================================================

/// Ordered record of committed primitives. Insertion order is draw order:
/// later entries paint over earlier ones. The store only grows, except for
/// [`PathStore::clear`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathStore {
    primitives: Vec<Primitive>,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Primitive> {
        self.primitives.iter()
    }

    pub fn as_slice(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Distinct colours in first-use order.
    pub fn used_colors(&self) -> Vec<StrokeColor> {
        let mut out: Vec<StrokeColor> = Vec::new();
        for p in &self.primitives {
            let c = p.color();
            if !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a PathStore {
    type Item = &'a Primitive;
    type IntoIter = std::slice::Iter<'a, Primitive>;

    fn into_iter(self) -> Self::IntoIter {
        self.primitives.iter()
    }
}
