use uuid::Uuid;

use crate::io::{self, ImagePayload};
use crate::ops::composite::export_composite;
use crate::{log_info, log_warn};

use super::engine::{DEFAULT_ERASER_RADIUS, DEFAULT_STROKE_WIDTH, DrawingEngine};
use super::paths::StrokeColor;

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default ceiling on natural size, checked from the header before any
/// surface is allocated.
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 50_000_000;

/// How many reference images the page offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SlotMode {
    #[default]
    Dual,
    Triple,
}

impl SlotMode {
    pub fn capacity(&self) -> usize {
        match self {
            SlotMode::Dual => 2,
            SlotMode::Triple => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SlotMode::Dual => "dual",
            SlotMode::Triple => "triple",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "dual" | "2" => Some(SlotMode::Dual),
            "triple" | "3" => Some(SlotMode::Triple),
            _ => None,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Rejected slot operation. Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    IndexOutOfRange { index: usize, capacity: usize },
    NotAnImage(String),
    TooLarge { size: usize, limit: usize },
    TooManyPixels { width: u32, height: u32, limit: u64 },
    Undecodable(String),
    Empty(usize),
}

impl std::fmt::Display for SlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotError::IndexOutOfRange { index, capacity } => write!(
                f,
                "Slot {} does not exist (only {} reference images are allowed)",
                index + 1,
                capacity
            ),
            SlotError::NotAnImage(mime) => {
                write!(f, "Please choose an image file (got '{}')", mime)
            }
            SlotError::TooLarge { size, limit } => write!(
                f,
                "Image is {} bytes; the limit is {} bytes",
                size, limit
            ),
            SlotError::TooManyPixels { width, height, limit } => write!(
                f,
                "Image is {}x{} pixels; the limit is {} pixels",
                width, height, limit
            ),
            SlotError::Undecodable(e) => write!(f, "Could not read image: {}", e),
            SlotError::Empty(index) => write!(f, "Slot {} has no image", index + 1),
        }
    }
}

impl std::error::Error for SlotError {}

// ============================================================================
// SLOTS
// ============================================================================

/// An uploaded reference image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotImage {
    pub payload: ImagePayload,
    pub width: u32,
    pub height: u32,
    /// Fresh for every upload, so a host finishing a slow read can tell
    /// whether the slot was re-filled in the meantime.
    pub upload_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct OccupiedSlot {
    pub image: SlotImage,
    engine: Option<DrawingEngine>,
}

impl OccupiedSlot {
    pub fn engine(&self) -> Option<&DrawingEngine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut DrawingEngine> {
        self.engine.as_mut()
    }

    pub fn has_annotations(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| !e.paths().is_empty())
    }

    /// Outbound image for this slot: the flattened composite when annotated,
    /// otherwise the upload as-is.
    pub fn export_composite(&self) -> ImagePayload {
        export_composite(&self.image.payload, self.engine.as_ref())
    }
}

#[derive(Clone, Debug, Default)]
pub enum Slot {
    #[default]
    Empty,
    Occupied(OccupiedSlot),
}

impl Slot {
    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }

    pub fn occupied(&self) -> Option<&OccupiedSlot> {
        match self {
            Slot::Occupied(s) => Some(s),
            Slot::Empty => None,
        }
    }
}

/// Settings new drawing engines start with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineDefaults {
    pub color: StrokeColor,
    pub width: f32,
    pub eraser_radius: f32,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            color: StrokeColor::RED,
            width: DEFAULT_STROKE_WIDTH,
            eraser_radius: DEFAULT_ERASER_RADIUS,
        }
    }
}

/// Fixed, ordered set of reference-image slots. Owns every slot's image and
/// drawing engine; nothing is shared between slots.
#[derive(Clone, Debug)]
pub struct SlotManager {
    slots: Vec<Slot>,
    mode: SlotMode,
    max_upload_bytes: usize,
    max_image_pixels: u64,
    engine_defaults: EngineDefaults,
}

impl SlotManager {
    pub fn new(mode: SlotMode) -> Self {
        Self {
            slots: vec![Slot::Empty; mode.capacity()],
            mode,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
            engine_defaults: EngineDefaults::default(),
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn with_max_image_pixels(mut self, limit: u64) -> Self {
        self.max_image_pixels = limit;
        self
    }

    pub fn with_engine_defaults(mut self, defaults: EngineDefaults) -> Self {
        self.engine_defaults = defaults;
        self
    }

    pub fn mode(&self) -> SlotMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    fn check_index(&self, index: usize) -> Result<(), SlotError> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(SlotError::IndexOutOfRange {
                index,
                capacity: self.slots.len(),
            })
        }
    }

    fn occupied_mut(&mut self, index: usize) -> Result<&mut OccupiedSlot, SlotError> {
        self.check_index(index)?;
        match &mut self.slots[index] {
            Slot::Occupied(s) => Ok(s),
            Slot::Empty => Err(SlotError::Empty(index)),
        }
    }

    /// Put an image into a slot, replacing whatever was there (including its
    /// annotations). Validation happens before anything changes.
    pub fn set_image(
        &mut self,
        index: usize,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<Uuid, SlotError> {
        self.check_index(index)?;
        if !mime_type.starts_with("image/") {
            return Err(SlotError::NotAnImage(mime_type.to_string()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(SlotError::TooLarge {
                size: bytes.len(),
                limit: self.max_upload_bytes,
            });
        }
        let (width, height) =
            io::probe_dimensions(&bytes).map_err(|e| SlotError::Undecodable(e.to_string()))?;
        if u64::from(width) * u64::from(height) > self.max_image_pixels {
            return Err(SlotError::TooManyPixels {
                width,
                height,
                limit: self.max_image_pixels,
            });
        }

        let upload_id = Uuid::new_v4();
        if self.slots[index].is_occupied() {
            log_info!("Reference image {} replaced; annotations discarded", index + 1);
        }
        self.slots[index] = Slot::Occupied(OccupiedSlot {
            image: SlotImage {
                payload: ImagePayload::new(bytes, mime_type),
                width,
                height,
                upload_id,
            },
            engine: None,
        });
        log_info!(
            "Reference image {} set ({}x{}, {}, upload {})",
            index + 1,
            width,
            height,
            mime_type,
            upload_id
        );
        Ok(upload_id)
    }

    /// Empty a slot, dropping its image and annotations. Removing from an
    /// already-empty slot is a no-op.
    pub fn remove_image(&mut self, index: usize) -> Result<(), SlotError> {
        self.check_index(index)?;
        if self.slots[index].is_occupied() {
            log_info!("Reference image {} removed", index + 1);
        }
        self.slots[index] = Slot::Empty;
        Ok(())
    }

    /// The slot's drawing engine, created on first use at the image's
    /// natural size.
    pub fn ensure_drawing_engine(&mut self, index: usize) -> Result<&mut DrawingEngine, SlotError> {
        let defaults = self.engine_defaults;
        let slot = self.occupied_mut(index)?;
        if slot.engine.is_none() {
            let mut engine = DrawingEngine::for_image(slot.image.width, slot.image.height)
                .with_eraser_radius(defaults.eraser_radius);
            engine.select_color(defaults.color);
            engine.select_width(defaults.width);
            log_info!(
                "Drawing layer created for reference image {} ({}x{})",
                index + 1,
                slot.image.width,
                slot.image.height
            );
            slot.engine = Some(engine);
        }
        match slot.engine.as_mut() {
            Some(engine) => Ok(engine),
            None => Err(SlotError::Empty(index)),
        }
    }

    /// Existing engine for a slot, without creating one.
    pub fn drawing_engine(&self, index: usize) -> Option<&DrawingEngine> {
        self.slots.get(index)?.occupied()?.engine()
    }

    pub fn drawing_engine_mut(&mut self, index: usize) -> Option<&mut DrawingEngine> {
        match self.slots.get_mut(index)? {
            Slot::Occupied(s) => s.engine_mut(),
            Slot::Empty => None,
        }
    }

    /// Occupied slots with their indices, in slot order. The iterator is
    /// lazy and cloneable; call again (or clone it) to walk the slots anew.
    pub fn occupied_slots(&self) -> impl Iterator<Item = (usize, &OccupiedSlot)> + Clone + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.occupied().map(|o| (i, o)))
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied_slots().count()
    }

    /// One outbound image per occupied slot, in slot order. Annotated slots
    /// are flattened; the rest pass through untouched.
    pub fn prepared_images_for_request(&self) -> Vec<ImagePayload> {
        self.occupied_slots()
            .map(|(i, slot)| {
                let out = slot.export_composite();
                if slot.has_annotations() && out == slot.image.payload {
                    log_warn!("Reference image {} sent without its annotations", i + 1);
                }
                out
            })
            .collect()
    }
}
