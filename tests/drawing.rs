use image::RgbaImage;

use refpaint::DrawingEngine;
use refpaint::canvas::DrawingSurface;
use refpaint::components::coords::{PointerEvent, ScreenRect};
use refpaint::components::paths::{Point, Primitive, StrokeColor};
use refpaint::components::tools::Tool;

fn primitives() -> Vec<Primitive> {
    vec![
        Primitive::Freehand {
            color: StrokeColor::RED,
            width: 3.0,
            points: vec![Point::new(5.0, 5.0), Point::new(30.0, 40.0), Point::new(60.0, 20.0)],
        },
        Primitive::Line {
            color: StrokeColor::BLUE,
            width: 5.0,
            start: Point::new(0.0, 80.0),
            end: Point::new(99.0, 10.0),
        },
        Primitive::Rect {
            color: StrokeColor::GREEN,
            width: 2.0,
            start: Point::new(70.0, 70.0),
            end: Point::new(20.0, 50.0),
        },
        Primitive::Circle {
            color: StrokeColor::YELLOW,
            width: 4.0,
            center: Point::new(50.0, 50.0),
            edge: Point::new(50.0, 20.0),
        },
    ]
}

fn traced(prims: &[Primitive]) -> DrawingEngine {
    let mut e = DrawingEngine::for_image(100, 100);
    for p in prims {
        e.trace(p);
    }
    e
}

fn snapshot(e: &DrawingEngine) -> RgbaImage {
    e.surface().pixels().clone()
}

#[test]
fn replay_ignores_current_tool_settings() {
    let prims = primitives();
    let mut a = traced(&prims);
    a.redraw_all_paths();
    let reference = snapshot(&a);

    let mut b = traced(&prims);
    b.select_tool(Tool::Circle);
    b.select_color(StrokeColor::BLACK);
    b.select_width(40.0);
    b.redraw_all_paths();
    assert_eq!(snapshot(&b), reference);

    // Replaying twice changes nothing
    b.redraw_all_paths();
    assert_eq!(snapshot(&b), reference);
    assert_eq!(b.paths().as_slice(), prims.as_slice());
}

#[test]
fn replay_respects_insertion_order() {
    let over = Primitive::Line {
        color: StrokeColor::BLUE,
        width: 6.0,
        start: Point::new(0.0, 50.0),
        end: Point::new(99.0, 50.0),
    };
    let under = Primitive::Line {
        color: StrokeColor::RED,
        width: 6.0,
        start: Point::new(50.0, 0.0),
        end: Point::new(50.0, 99.0),
    };
    let mut e = traced(&[under.clone(), over.clone()]);
    e.redraw_all_paths();
    assert_eq!(e.surface().pixel(50, 50).0, [0, 0, 255, 255]);

    let mut e = traced(&[over, under]);
    e.redraw_all_paths();
    assert_eq!(e.surface().pixel(50, 50).0, [255, 0, 0, 255]);
}

#[test]
fn erasing_leaves_path_store_alone_and_redraw_restores_pixels() {
    // Rectangle (0,0)-(50,50), erase through (25,25) and across the right edge
    let rect = Primitive::Rect {
        color: StrokeColor::RED,
        width: 3.0,
        start: Point::new(0.0, 0.0),
        end: Point::new(50.0, 50.0),
    };
    let mut e = traced(std::slice::from_ref(&rect));
    let before = snapshot(&e);
    assert_eq!(e.surface().pixel(50, 25)[3], 255);

    e.trace_eraser(&[Point::new(25.0, 25.0), Point::new(50.0, 25.0)]);
    e.trace_eraser(&[Point::new(0.0, 0.0)]);
    assert_eq!(e.surface().pixel(50, 25)[3], 0);
    assert_eq!(e.surface().pixel(0, 0)[3], 0);
    assert_eq!(e.paths().as_slice(), std::slice::from_ref(&rect));

    e.redraw_all_paths();
    assert_eq!(e.surface().pixel(50, 25)[3], 255);
    assert_eq!(snapshot(&e), before);
}

#[test]
fn eraser_via_pointer_events_only_erases_on_move() {
    let rect = ScreenRect::identity(100, 100);
    let mut e = traced(&[Primitive::Line {
        color: StrokeColor::BLACK,
        width: 4.0,
        start: Point::new(0.0, 50.0),
        end: Point::new(99.0, 50.0),
    }]);
    e.select_tool(Tool::Eraser);
    e.on_pointer_down(&PointerEvent::mouse(20.0, 50.0), &rect);
    assert_eq!(e.surface().pixel(20, 50)[3], 255);
    e.on_pointer_move(&PointerEvent::mouse(80.0, 50.0), &rect);
    e.on_pointer_up(None, &rect);
    assert_eq!(e.surface().pixel(80, 50)[3], 0);
    assert_eq!(e.surface().pixel(20, 50)[3], 255);
    assert_eq!(e.paths().len(), 1);
}

#[test]
fn clear_is_total() {
    let mut e = traced(&primitives());
    for p in primitives() {
        e.trace(&p);
    }
    assert_eq!(e.paths().len(), 8);
    e.clear();
    assert!(e.paths().is_empty());
    assert!(e.surface().is_blank());

    e.redraw_all_paths();
    assert!(e.surface().is_blank());
}

#[test]
fn freehand_stroke_on_fresh_upload() {
    let rect = ScreenRect::identity(100, 100);
    let mut e = DrawingEngine::for_image(100, 100);
    e.on_pointer_down(&PointerEvent::mouse(10.0, 10.0), &rect);
    e.on_pointer_move(&PointerEvent::mouse(50.0, 50.0), &rect);
    e.on_pointer_move(&PointerEvent::mouse(90.0, 90.0), &rect);
    e.on_pointer_up(Some(&PointerEvent::mouse(90.0, 90.0)), &rect);

    assert_eq!(e.paths().len(), 1);
    match &e.paths().as_slice()[0] {
        Primitive::Freehand { color, width, points } => {
            assert_eq!(color.to_hex(), "#ff0000");
            assert_eq!(*width, 3.0);
            assert!(points.len() >= 2);
        }
        other => panic!("expected a freehand stroke, got {:?}", other),
    }
    assert_eq!(e.surface().width(), 100);
}

#[test]
fn screen_scaling_maps_into_native_pixels() {
    // Canvas shown at half size, offset on the page
    let rect = ScreenRect::new(200.0, 100.0, 50.0, 50.0);
    let mut e = DrawingEngine::for_image(100, 100);
    e.select_tool(Tool::Line);
    e.on_pointer_down(&PointerEvent::mouse(205.0, 125.0), &rect);
    e.on_pointer_up(Some(&PointerEvent::mouse(245.0, 125.0)), &rect);
    assert_eq!(
        e.paths().as_slice(),
        &[Primitive::Line {
            color: StrokeColor::RED,
            width: 3.0,
            start: Point::new(10.0, 50.0),
            end: Point::new(90.0, 50.0),
        }]
    );
}
