use std::fmt;
use std::str::FromStr;

use super::paths::{Point, Primitive, StrokeColor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
    Line,
    Rect,
    Circle,
}

impl Tool {
    /// Host-facing tool name, as used by toolbar buttons.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Pen => "pen",
            Tool::Eraser => "eraser",
            Tool::Line => "line",
            Tool::Rect => "rect",
            Tool::Circle => "circle",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Pen, Tool::Eraser, Tool::Line, Tool::Rect, Tool::Circle]
    }

    /// Tools that drag out a shape from a start point.
    pub fn is_shape(&self) -> bool {
        matches!(self, Tool::Line | Tool::Rect | Tool::Circle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl fmt::Display for UnknownTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown drawing tool '{}'", self.0)
    }
}

impl std::error::Error for UnknownTool {}

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::all()
            .iter()
            .copied()
            .find(|t| t.name() == s.trim())
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

// ============================================================================
// STROKE STATE MACHINE
// ============================================================================

/// Tool settings captured when a stroke starts. Changing the engine's tool,
/// colour or width mid-stroke only affects the next stroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolContext {
    pub tool: Tool,
    pub color: StrokeColor,
    pub width: f32,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum StrokeState {
    #[default]
    Idle,
    Stroking {
        ctx: ToolContext,
        start: Point,
        last: Point,
        /// Pen samples so far; empty for other tools.
        points: Vec<Point>,
    },
}

impl StrokeState {
    pub fn is_stroking(&self) -> bool {
        matches!(self, StrokeState::Stroking { .. })
    }
}

/// Pointer input already mapped to native canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerInput {
    Down(Point),
    Move(Point),
    /// Release or leave. `None` when the event carried no position (e.g. the
    /// last touch lifted); the last known position is used instead.
    Up(Option<Point>),
}

/// Side effects requested by a transition, applied by the engine in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Clear the surface, replay the path store, then draw `preview` on top
    /// without recording it.
    Redraw { preview: Option<Primitive> },
    /// Destination-out disc at this point, directly on the surface.
    EraseAt(Point),
    /// Append to the path store.
    Commit(Primitive),
}

fn shape_primitive(ctx: &ToolContext, start: Point, end: Point) -> Option<Primitive> {
    let (color, width) = (ctx.color, ctx.width);
    match ctx.tool {
        Tool::Line => Some(Primitive::Line { color, width, start, end }),
        Tool::Rect => Some(Primitive::Rect { color, width, start, end }),
        Tool::Circle => Some(Primitive::Circle {
            color,
            width,
            center: start,
            edge: end,
        }),
        Tool::Pen | Tool::Eraser => None,
    }
}

/// Advance the stroke state machine by one pointer input.
///
/// `ctx` is only read on `Down`; later inputs use the context captured in the
/// `Stroking` state. Moves and releases while idle are ignored.
pub fn transition(
    state: StrokeState,
    ctx: &ToolContext,
    input: PointerInput,
) -> (StrokeState, Vec<Effect>) {
    match (state, input) {
        (StrokeState::Idle, PointerInput::Down(p)) => {
            let points = if ctx.tool == Tool::Pen { vec![p] } else { Vec::new() };
            (
                StrokeState::Stroking {
                    ctx: *ctx,
                    start: p,
                    last: p,
                    points,
                },
                Vec::new(),
            )
        }
        (StrokeState::Idle, _) => (StrokeState::Idle, Vec::new()),

        // A second press without a release restarts the stroke
        (StrokeState::Stroking { .. }, PointerInput::Down(p)) => {
            transition(StrokeState::Idle, ctx, PointerInput::Down(p))
        }

        (
            StrokeState::Stroking {
                ctx: held,
                start,
                mut points,
                ..
            },
            PointerInput::Move(p),
        ) => {
            let effects = match held.tool {
                Tool::Pen => {
                    points.push(p);
                    vec![Effect::Redraw {
                        preview: Some(Primitive::Freehand {
                            color: held.color,
                            width: held.width,
                            points: points.clone(),
                        }),
                    }]
                }
                Tool::Eraser => vec![Effect::EraseAt(p)],
                Tool::Line | Tool::Rect | Tool::Circle => vec![Effect::Redraw {
                    preview: shape_primitive(&held, start, p),
                }],
            };
            (
                StrokeState::Stroking {
                    ctx: held,
                    start,
                    last: p,
                    points,
                },
                effects,
            )
        }

        (
            StrokeState::Stroking {
                ctx: held,
                start,
                last,
                points,
            },
            PointerInput::Up(at),
        ) => {
            let end = at.unwrap_or(last);
            let effects = match held.tool {
                Tool::Pen if !points.is_empty() => vec![Effect::Commit(Primitive::Freehand {
                    color: held.color,
                    width: held.width,
                    points,
                })],
                Tool::Pen | Tool::Eraser => Vec::new(),
                Tool::Line | Tool::Rect | Tool::Circle => {
                    let mut out = Vec::with_capacity(2);
                    if let Some(prim) = shape_primitive(&held, start, end) {
                        out.push(Effect::Commit(prim));
                    }
                    out.push(Effect::Redraw { preview: None });
                    out
                }
            };
            (StrokeState::Idle, effects)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(tool: Tool) -> ToolContext {
        ToolContext {
            tool,
            color: StrokeColor::RED,
            width: 3.0,
        }
    }

    fn run(tool: Tool, inputs: &[PointerInput]) -> (StrokeState, Vec<Effect>) {
        let c = ctx(tool);
        let mut state = StrokeState::Idle;
        let mut all = Vec::new();
        for input in inputs {
            let (next, effects) = transition(state, &c, *input);
            state = next;
            all.extend(effects);
        }
        (state, all)
    }

    #[test]
    fn tool_names_round_trip() {
        for t in Tool::all() {
            assert_eq!(t.name().parse::<Tool>().unwrap(), *t);
        }
        assert!("spray".parse::<Tool>().is_err());
    }

    #[test]
    fn pen_previews_live_and_commits_on_release() {
        let a = Point::new(1.0, 1.0);
        let b = Point::new(5.0, 5.0);
        let (state, effects) = run(
            Tool::Pen,
            &[PointerInput::Down(a), PointerInput::Move(b), PointerInput::Up(None)],
        );
        assert_eq!(state, StrokeState::Idle);
        assert_eq!(effects.len(), 2);
        assert!(matches!(&effects[0], Effect::Redraw { preview: Some(Primitive::Freehand { points, .. }) } if points.len() == 2));
        assert_eq!(
            effects[1],
            Effect::Commit(Primitive::Freehand {
                color: StrokeColor::RED,
                width: 3.0,
                points: vec![a, b],
            })
        );
    }

    #[test]
    fn pen_click_without_move_commits_single_point() {
        let (_, effects) = run(
            Tool::Pen,
            &[PointerInput::Down(Point::new(2.0, 2.0)), PointerInput::Up(None)],
        );
        assert!(matches!(&effects[..], [Effect::Commit(Primitive::Freehand { points, .. })] if points.len() == 1));
    }

    #[test]
    fn shape_commits_from_start_to_release_point() {
        let (_, effects) = run(
            Tool::Rect,
            &[
                PointerInput::Down(Point::new(0.0, 0.0)),
                PointerInput::Move(Point::new(10.0, 10.0)),
                PointerInput::Up(Some(Point::new(50.0, 40.0))),
            ],
        );
        assert_eq!(effects.len(), 3);
        assert_eq!(
            effects[1],
            Effect::Commit(Primitive::Rect {
                color: StrokeColor::RED,
                width: 3.0,
                start: Point::new(0.0, 0.0),
                end: Point::new(50.0, 40.0),
            })
        );
        assert_eq!(effects[2], Effect::Redraw { preview: None });
    }

    #[test]
    fn release_without_position_uses_last_move() {
        let (_, effects) = run(
            Tool::Circle,
            &[
                PointerInput::Down(Point::new(10.0, 10.0)),
                PointerInput::Move(Point::new(20.0, 10.0)),
                PointerInput::Up(None),
            ],
        );
        assert!(effects.contains(&Effect::Commit(Primitive::Circle {
            color: StrokeColor::RED,
            width: 3.0,
            center: Point::new(10.0, 10.0),
            edge: Point::new(20.0, 10.0),
        })));
    }

    #[test]
    fn eraser_never_commits() {
        let (_, effects) = run(
            Tool::Eraser,
            &[
                PointerInput::Down(Point::new(1.0, 1.0)),
                PointerInput::Move(Point::new(2.0, 2.0)),
                PointerInput::Move(Point::new(3.0, 3.0)),
                PointerInput::Up(None),
            ],
        );
        assert_eq!(
            effects,
            vec![
                Effect::EraseAt(Point::new(2.0, 2.0)),
                Effect::EraseAt(Point::new(3.0, 3.0)),
            ]
        );
    }

    #[test]
    fn idle_moves_and_releases_are_ignored() {
        let (state, effects) = run(
            Tool::Pen,
            &[PointerInput::Move(Point::new(1.0, 1.0)), PointerInput::Up(None)],
        );
        assert_eq!(state, StrokeState::Idle);
        assert!(effects.is_empty());
    }

    #[test]
    fn settings_changed_mid_stroke_apply_to_next_stroke() {
        let start = ctx(Tool::Line);
        let (state, _) = transition(StrokeState::Idle, &start, PointerInput::Down(Point::new(0.0, 0.0)));
        let changed = ToolContext {
            tool: Tool::Pen,
            color: StrokeColor::BLUE,
            width: 9.0,
        };
        let (_, effects) = transition(state, &changed, PointerInput::Up(Some(Point::new(4.0, 0.0))));
        assert!(effects.contains(&Effect::Commit(Primitive::Line {
            color: StrokeColor::RED,
            width: 3.0,
            start: Point::new(0.0, 0.0),
            end: Point::new(4.0, 0.0),
        })));
    }
}
