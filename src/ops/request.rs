use image::{Rgba, RgbaImage};
use std::fmt;
use std::str::FromStr;

use crate::io::{self, ImagePayload};
use crate::log_warn;

// ============================================================================
// SIZE HINT
// ============================================================================

/// Requested output aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SizeHint {
    #[default]
    Square,
    Portrait9x16,
    Landscape16x9,
    Landscape4x3,
    Portrait3x4,
}

impl SizeHint {
    pub fn all() -> &'static [SizeHint] {
        &[
            SizeHint::Square,
            SizeHint::Portrait9x16,
            SizeHint::Landscape16x9,
            SizeHint::Landscape4x3,
            SizeHint::Portrait3x4,
        ]
    }

    pub fn ratio(&self) -> (u32, u32) {
        match self {
            SizeHint::Square => (1, 1),
            SizeHint::Portrait9x16 => (9, 16),
            SizeHint::Landscape16x9 => (16, 9),
            SizeHint::Landscape4x3 => (4, 3),
            SizeHint::Portrait3x4 => (3, 4),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeHint::Square => "1:1",
            SizeHint::Portrait9x16 => "9:16",
            SizeHint::Landscape16x9 => "16:9",
            SizeHint::Landscape4x3 => "4:3",
            SizeHint::Portrait3x4 => "3:4",
        }
    }

    pub fn is_square(&self) -> bool {
        *self == SizeHint::Square
    }

    /// Phrase appended to the prompt text on the wire.
    pub fn prompt_suffix(&self) -> &'static str {
        match self {
            SizeHint::Square => " in square format (1:1 aspect ratio)",
            SizeHint::Portrait9x16 => " in portrait format (9:16 aspect ratio, vertical)",
            SizeHint::Landscape16x9 => " in landscape format (16:9 aspect ratio, horizontal)",
            SizeHint::Landscape4x3 => " in landscape format (4:3 aspect ratio, horizontal)",
            SizeHint::Portrait3x4 => " in portrait format (3:4 aspect ratio, vertical)",
        }
    }

    /// Pixel size with the long edge at `long_edge` and the hint's ratio.
    pub fn dimensions(&self, long_edge: u32) -> (u32, u32) {
        let (w, h) = self.ratio();
        let long_edge = long_edge.max(1);
        if w >= h {
            (long_edge, ((long_edge * h) as f32 / w as f32).round().max(1.0) as u32)
        } else {
            (((long_edge * w) as f32 / h as f32).round().max(1.0) as u32, long_edge)
        }
    }
}

impl fmt::Display for SizeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSizeHint(pub String);

impl fmt::Display for UnknownSizeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown size '{}' (expected one of 1:1, 9:16, 16:9, 4:3, 3:4)",
            self.0
        )
    }
}

impl std::error::Error for UnknownSizeHint {}

impl FromStr for SizeHint {
    type Err = UnknownSizeHint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeHint::all()
            .iter()
            .copied()
            .find(|h| h.label() == s.trim())
            .ok_or_else(|| UnknownSizeHint(s.to_string()))
    }
}

// ============================================================================
// GUIDE POLICY
// ============================================================================

/// When the composer adds a blank image carrying the requested aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GuidePolicy {
    Never,
    /// Only for non-square hints when the user supplied no images.
    #[default]
    WhenEmpty,
}

impl GuidePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            GuidePolicy::Never => "never",
            GuidePolicy::WhenEmpty => "when_empty",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "never" => Some(GuidePolicy::Never),
            "when_empty" => Some(GuidePolicy::WhenEmpty),
            _ => None,
        }
    }
}

// ============================================================================
// COMPOSER
// ============================================================================

/// Everything one generation call sends. Built fresh per call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    pub prompt_text: String,
    pub images: Vec<ImagePayload>,
    pub size_hint: SizeHint,
    /// True when `images[0]` is a synthetic aspect-ratio guide.
    pub has_guide: bool,
}

impl OutboundRequest {
    /// Images the user supplied, without any guide.
    pub fn user_images(&self) -> &[ImagePayload] {
        if self.has_guide {
            &self.images[1..]
        } else {
            &self.images
        }
    }
}

pub const GUIDE_LONG_EDGE: u32 = 1024;

#[derive(Clone, Copy, Debug, Default)]
pub struct RequestComposer {
    pub guide_policy: GuidePolicy,
}

impl RequestComposer {
    pub fn new(guide_policy: GuidePolicy) -> Self {
        Self { guide_policy }
    }

    fn wants_guide(&self, prepared: &[ImagePayload], size_hint: SizeHint) -> bool {
        self.guide_policy == GuidePolicy::WhenEmpty && !size_hint.is_square() && prepared.is_empty()
    }

    /// Assemble the outbound request. The prompt is passed through untouched;
    /// only the image list may gain a leading guide.
    pub fn build(&self, prompt: &str, prepared: Vec<ImagePayload>, size_hint: SizeHint) -> OutboundRequest {
        let mut images = Vec::with_capacity(prepared.len() + 1);
        let mut has_guide = false;
        if self.wants_guide(&prepared, size_hint) {
            match guide_image(size_hint) {
                Ok(guide) => {
                    images.push(guide);
                    has_guide = true;
                }
                Err(e) => {
                    log_warn!("Aspect guide for {} skipped: {}", size_hint, e);
                }
            }
        }
        images.extend(prepared);

        OutboundRequest {
            prompt_text: prompt.to_string(),
            images,
            size_hint,
            has_guide,
        }
    }
}

/// Blank white PNG with the hint's aspect ratio.
pub fn guide_image(size_hint: SizeHint) -> Result<ImagePayload, image::ImageError> {
    let (w, h) = size_hint.dimensions(GUIDE_LONG_EDGE);
    let img = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
    Ok(ImagePayload::png(io::encode_png(&img)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_image() -> ImagePayload {
        ImagePayload::new(vec![1, 2, 3], "image/jpeg")
    }

    #[test]
    fn size_labels_parse() {
        assert_eq!("16:9".parse::<SizeHint>().unwrap(), SizeHint::Landscape16x9);
        assert_eq!(" 3:4 ".parse::<SizeHint>().unwrap(), SizeHint::Portrait3x4);
        assert!("2:1".parse::<SizeHint>().is_err());
    }

    #[test]
    fn guide_dimensions_follow_ratio() {
        assert_eq!(SizeHint::Landscape16x9.dimensions(1024), (1024, 576));
        assert_eq!(SizeHint::Portrait9x16.dimensions(1024), (576, 1024));
        assert_eq!(SizeHint::Landscape4x3.dimensions(1024), (1024, 768));
        assert_eq!(SizeHint::Square.dimensions(1024), (1024, 1024));
    }

    #[test]
    fn guide_only_when_no_user_images() {
        let composer = RequestComposer::default();
        let bare = composer.build("a cat", Vec::new(), SizeHint::Landscape16x9);
        assert!(bare.has_guide);
        assert_eq!(bare.images.len(), 1);
        assert_eq!(io::probe_dimensions(&bare.images[0].bytes).unwrap(), (1024, 576));
        assert!(bare.user_images().is_empty());

        let with_user = composer.build("a cat", vec![user_image()], SizeHint::Landscape16x9);
        assert!(!with_user.has_guide);
        assert_eq!(with_user.images, vec![user_image()]);
    }

    #[test]
    fn square_and_never_skip_guide() {
        let composer = RequestComposer::default();
        assert!(!composer.build("x", Vec::new(), SizeHint::Square).has_guide);
        let never = RequestComposer::new(GuidePolicy::Never);
        assert!(never.build("x", Vec::new(), SizeHint::Portrait3x4).images.is_empty());
    }

    #[test]
    fn prompt_is_passed_through() {
        let req = RequestComposer::default().build("  keep me  ", vec![user_image()], SizeHint::Portrait9x16);
        assert_eq!(req.prompt_text, "  keep me  ");
        assert_eq!(req.size_hint, SizeHint::Portrait9x16);
    }
}
