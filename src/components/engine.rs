use crate::canvas::{DrawingSurface, RasterSurface, SurfaceError, composite_over};
use crate::io;

use super::coords::{PointerEvent, ScreenRect, event_to_native};
use super::paths::{PathStore, Point, Primitive, StrokeColor};
use super::tools::{Effect, PointerInput, StrokeState, Tool, ToolContext, UnknownTool, transition};

/// Eraser disc radius in native pixels. It does not scale with the image.
pub const DEFAULT_ERASER_RADIUS: f32 = 10.0;
pub const DEFAULT_STROKE_WIDTH: f32 = 3.0;

/// Annotation layer over one reference image.
///
/// Owns the current tool settings, the [`PathStore`] of committed primitives
/// and the surface they are rendered on. Every redraw clears the surface and
/// replays the whole store, so cost per pointer move is linear in the number
/// of committed primitives.
///
/// The eraser paints transparency straight onto the surface and never edits
/// the store, so any later full redraw brings erased pixels back.
#[derive(Clone, Debug)]
pub struct DrawingEngine<S: DrawingSurface = RasterSurface> {
    tool: Tool,
    color: StrokeColor,
    width: f32,
    eraser_radius: f32,
    paths: PathStore,
    stroke: StrokeState,
    surface: S,
}

impl DrawingEngine<RasterSurface> {
    /// Engine with a CPU raster surface of the image's natural size.
    pub fn for_image(width: u32, height: u32) -> Self {
        Self::new(RasterSurface::new(width, height))
    }
}

impl<S: DrawingSurface> DrawingEngine<S> {
    pub fn new(surface: S) -> Self {
        Self {
            tool: Tool::Pen,
            color: StrokeColor::RED,
            width: DEFAULT_STROKE_WIDTH,
            eraser_radius: DEFAULT_ERASER_RADIUS,
            paths: PathStore::new(),
            stroke: StrokeState::Idle,
            surface,
        }
    }

    pub fn with_eraser_radius(mut self, radius: f32) -> Self {
        self.eraser_radius = radius.max(0.0);
        self
    }

    // ---- settings -----------------------------------------------------------

    pub fn select_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Select a tool by its toolbar name (`pen`, `eraser`, `line`, `rect`,
    /// `circle`).
    pub fn select_tool_by_name(&mut self, name: &str) -> Result<(), UnknownTool> {
        self.tool = name.parse()?;
        Ok(())
    }

    pub fn select_color(&mut self, color: StrokeColor) {
        self.color = color;
    }

    pub fn select_width(&mut self, width: f32) {
        self.width = width.max(0.0);
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn color(&self) -> StrokeColor {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn eraser_radius(&self) -> f32 {
        self.eraser_radius
    }

    pub fn paths(&self) -> &PathStore {
        &self.paths
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_stroking()
    }

    fn context(&self) -> ToolContext {
        ToolContext {
            tool: self.tool,
            color: self.color,
            width: self.width,
        }
    }

    // ---- pointer input ------------------------------------------------------

    /// Feed one native-space pointer input through the stroke state machine
    /// and apply the resulting effects.
    pub fn handle(&mut self, input: PointerInput) {
        let state = std::mem::take(&mut self.stroke);
        let (next, effects) = transition(state, &self.context(), input);
        self.stroke = next;
        for effect in effects {
            self.apply(effect);
        }
    }

    fn native(&self, event: &PointerEvent, rect: &ScreenRect) -> Option<Point> {
        event_to_native(event, rect, self.surface.width(), self.surface.height())
    }

    /// Pointer/touch press. Events without a position are ignored.
    pub fn on_pointer_down(&mut self, event: &PointerEvent, rect: &ScreenRect) {
        if let Some(p) = self.native(event, rect) {
            self.handle(PointerInput::Down(p));
        }
    }

    pub fn on_pointer_move(&mut self, event: &PointerEvent, rect: &ScreenRect) {
        if let Some(p) = self.native(event, rect) {
            self.handle(PointerInput::Move(p));
        }
    }

    /// Release, leave or touch end. A missing event or one without contacts
    /// finishes the stroke at the last known position.
    pub fn on_pointer_up(&mut self, event: Option<&PointerEvent>, rect: &ScreenRect) {
        let at = event.and_then(|e| self.native(e, rect));
        self.handle(PointerInput::Up(at));
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Redraw { preview } => {
                self.redraw_all_paths();
                if let Some(p) = preview {
                    self.surface.stroke(&p);
                }
            }
            Effect::EraseAt(p) => self.surface.erase_disc(p, self.eraser_radius),
            Effect::Commit(p) => self.paths.push(p),
        }
    }

    // ---- replay -------------------------------------------------------------

    /// Clear the surface and draw every committed primitive in order, each
    /// with its own recorded colour and width.
    pub fn redraw_all_paths(&mut self) {
        self.surface.clear();
        for p in self.paths.iter() {
            self.surface.stroke(p);
        }
    }

    /// Empty the path store and the surface. There is no undo.
    pub fn clear(&mut self) {
        self.paths.clear();
        self.stroke = StrokeState::Idle;
        self.surface.clear();
    }

    /// Re-enact a primitive through the pointer state machine, as if a user
    /// had drawn it with the matching tool, colour and width. The engine's
    /// own settings are restored afterwards.
    pub fn trace(&mut self, primitive: &Primitive) {
        let saved = self.context();
        self.color = primitive.color();
        self.width = primitive.width();
        match primitive {
            Primitive::Freehand { points, .. } => {
                self.tool = Tool::Pen;
                if let Some((first, rest)) = points.split_first() {
                    self.handle(PointerInput::Down(*first));
                    for p in rest {
                        self.handle(PointerInput::Move(*p));
                    }
                    self.handle(PointerInput::Up(None));
                }
            }
            Primitive::Line { start, end, .. } => self.drag(Tool::Line, *start, *end),
            Primitive::Rect { start, end, .. } => self.drag(Tool::Rect, *start, *end),
            Primitive::Circle { center, edge, .. } => self.drag(Tool::Circle, *center, *edge),
        }
        self.tool = saved.tool;
        self.color = saved.color;
        self.width = saved.width;
    }

    /// Drag the eraser through `points`.
    pub fn trace_eraser(&mut self, points: &[Point]) {
        let saved = self.tool;
        self.tool = Tool::Eraser;
        if let Some((first, rest)) = points.split_first() {
            self.handle(PointerInput::Down(*first));
            // The press itself does not erase; the first sample is a move too
            self.handle(PointerInput::Move(*first));
            for p in rest {
                self.handle(PointerInput::Move(*p));
            }
            self.handle(PointerInput::Up(None));
        }
        self.tool = saved;
    }

    fn drag(&mut self, tool: Tool, from: Point, to: Point) {
        self.tool = tool;
        self.handle(PointerInput::Down(from));
        self.handle(PointerInput::Move(to));
        self.handle(PointerInput::Up(Some(to)));
    }

    // ---- export -------------------------------------------------------------

    /// Flatten `base` (encoded image bytes) with the current surface on top
    /// and encode the result as PNG.
    pub fn composite_onto(&self, base: &[u8]) -> Result<Vec<u8>, SurfaceError> {
        let mut flat = io::decode_rgba(base)?;
        let overlay = self.surface.to_rgba()?;
        composite_over(&mut flat, &overlay)?;
        Ok(io::encode_png(&flat)?)
    }

    /// Instruction text naming the colours used, for the host to add to the
    /// prompt when annotating finishes. `None` when nothing was drawn.
    pub fn instruction_hint(&self) -> Option<AnnotationHint> {
        let colors = self.paths.used_colors();
        if colors.is_empty() {
            None
        } else {
            Some(AnnotationHint { colors })
        }
    }
}

// ============================================================================
// ANNOTATION HINT
// ============================================================================

/// Prompt wording describing which colours the user marked areas with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationHint {
    pub colors: Vec<StrokeColor>,
}

impl AnnotationHint {
    fn color_name(color: StrokeColor) -> &'static str {
        match color.to_hex().as_str() {
            "#ff0000" => "red lines",
            "#0000ff" => "blue lines",
            "#00ff00" => "green lines",
            "#ffff00" => "yellow lines",
            "#000000" => "black lines",
            _ => "lines",
        }
    }

    /// "the areas circled or marked with red lines and the areas ... blue lines"
    pub fn areas(&self) -> String {
        self.colors
            .iter()
            .map(|c| format!("the areas circled or marked with {}", Self::color_name(*c)))
            .collect::<Vec<_>>()
            .join(" and ")
    }

    /// Extend `prompt` with the hint for reference image `image_number`
    /// (1-based). An empty prompt is replaced by a standalone instruction.
    pub fn apply_to_prompt(&self, prompt: &str, image_number: usize) -> String {
        let current = prompt.trim();
        if current.is_empty() {
            format!(
                "Focus on {} in image {} when generating.",
                self.areas(),
                image_number
            )
        } else {
            format!("{}\n\n[Marked areas]: focus on {}", current, self.areas())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DrawingEngine {
        DrawingEngine::for_image(100, 100)
    }

    #[test]
    fn drawing_defaults_match_toolbar() {
        let e = engine();
        assert_eq!(e.tool(), Tool::Pen);
        assert_eq!(e.color(), StrokeColor::RED);
        assert_eq!(e.width(), 3.0);
        assert_eq!(e.eraser_radius(), 10.0);
    }

    #[test]
    fn pen_stroke_is_visible_while_drawing() {
        let mut e = engine();
        let rect = ScreenRect::identity(100, 100);
        e.on_pointer_down(&PointerEvent::mouse(10.0, 10.0), &rect);
        e.on_pointer_move(&PointerEvent::mouse(50.0, 10.0), &rect);
        assert!(e.is_stroking());
        assert!(e.paths().is_empty());
        assert_eq!(e.surface().pixel(30, 10)[3], 255);
        e.on_pointer_up(None, &rect);
        assert_eq!(e.paths().len(), 1);
    }

    #[test]
    fn pointer_positions_are_scaled_to_native() {
        let mut e = engine();
        // Canvas displayed at half size
        let rect = ScreenRect::new(0.0, 0.0, 50.0, 50.0);
        e.select_tool(Tool::Line);
        e.on_pointer_down(&PointerEvent::touch(5.0, 5.0), &rect);
        e.on_pointer_move(&PointerEvent::touch(45.0, 5.0), &rect);
        e.on_pointer_up(Some(&PointerEvent::Touch { touches: vec![] }), &rect);
        assert_eq!(
            e.paths().as_slice()[0],
            Primitive::Line {
                color: StrokeColor::RED,
                width: 3.0,
                start: Point::new(10.0, 10.0),
                end: Point::new(90.0, 10.0),
            }
        );
    }

    #[test]
    fn shape_preview_is_not_recorded_until_release() {
        let mut e = engine();
        e.select_tool(Tool::Circle);
        e.handle(PointerInput::Down(Point::new(50.0, 50.0)));
        e.handle(PointerInput::Move(Point::new(60.0, 50.0)));
        e.handle(PointerInput::Move(Point::new(70.0, 50.0)));
        assert!(e.paths().is_empty());
        // Only the latest preview is on the surface
        assert_eq!(e.surface().pixel(60, 50)[3], 0);
        assert!(e.surface().pixel(70, 50)[3] > 0);
    }

    #[test]
    fn trace_restores_engine_settings() {
        let mut e = engine();
        e.select_color(StrokeColor::BLACK);
        e.trace(&Primitive::Rect {
            color: StrokeColor::BLUE,
            width: 5.0,
            start: Point::new(0.0, 0.0),
            end: Point::new(20.0, 20.0),
        });
        assert_eq!(e.paths().len(), 1);
        assert_eq!(e.paths().as_slice()[0].color(), StrokeColor::BLUE);
        assert_eq!(e.tool(), Tool::Pen);
        assert_eq!(e.color(), StrokeColor::BLACK);
    }

    #[test]
    fn hint_names_colors_in_first_use_order() {
        let mut e = engine();
        assert!(e.instruction_hint().is_none());
        for color in [StrokeColor::BLUE, StrokeColor::RED, StrokeColor::BLUE] {
            e.trace(&Primitive::Line {
                color,
                width: 2.0,
                start: Point::new(0.0, 0.0),
                end: Point::new(9.0, 9.0),
            });
        }
        let hint = e.instruction_hint().unwrap();
        assert_eq!(
            hint.apply_to_prompt("", 2),
            "Focus on the areas circled or marked with blue lines and the areas circled \
             or marked with red lines in image 2 when generating."
        );
        assert!(
            hint.apply_to_prompt("  a cat  ", 1)
                .starts_with("a cat\n\n[Marked areas]: focus on the areas")
        );
    }

    #[test]
    fn unknown_tool_name_keeps_current_tool() {
        let mut e = engine();
        e.select_tool(Tool::Rect);
        assert!(e.select_tool_by_name("lasso").is_err());
        assert_eq!(e.tool(), Tool::Rect);
        e.select_tool_by_name("eraser").unwrap();
        assert_eq!(e.tool(), Tool::Eraser);
    }
}
