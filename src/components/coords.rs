use super::paths::Point;

/// On-screen bounding rectangle of the drawing canvas, in client pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect that displays the canvas 1:1 at the origin.
    pub fn identity(native_w: u32, native_h: u32) -> Self {
        Self::new(0.0, 0.0, native_w as f32, native_h as f32)
    }
}

/// One touch contact in client pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Touch {
    pub client_x: f32,
    pub client_y: f32,
}

/// A pointer sample as delivered by the host: a mouse position, or the list
/// of active touch contacts.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerEvent {
    Mouse { client_x: f32, client_y: f32 },
    Touch { touches: Vec<Touch> },
}

impl PointerEvent {
    pub fn mouse(client_x: f32, client_y: f32) -> Self {
        PointerEvent::Mouse { client_x, client_y }
    }

    pub fn touch(client_x: f32, client_y: f32) -> Self {
        PointerEvent::Touch {
            touches: vec![Touch { client_x, client_y }],
        }
    }

    /// Mouse position, or the first touch contact. `None` for a touch event
    /// without contacts (e.g. a `touchend` after the last finger lifted).
    pub fn client_position(&self) -> Option<(f32, f32)> {
        match self {
            PointerEvent::Mouse { client_x, client_y } => Some((*client_x, *client_y)),
            PointerEvent::Touch { touches } => touches.first().map(|t| (t.client_x, t.client_y)),
        }
    }
}

/// Convert a client-space position to native canvas pixels, undoing the
/// display scale between the canvas's natural and on-screen size.
pub fn map_to_native(client: (f32, f32), rect: &ScreenRect, native_w: u32, native_h: u32) -> Point {
    let scale_x = native_w as f32 / rect.width;
    let scale_y = native_h as f32 / rect.height;
    Point::new(
        (client.0 - rect.left) * scale_x,
        (client.1 - rect.top) * scale_y,
    )
}

/// [`map_to_native`] for a whole event; `None` when the event carries no
/// position.
pub fn event_to_native(
    event: &PointerEvent,
    rect: &ScreenRect,
    native_w: u32,
    native_h: u32,
) -> Option<Point> {
    event
        .client_position()
        .map(|client| map_to_native(client, rect, native_w, native_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_displayed_position_to_native_pixels() {
        // 400x200 image shown at 200x100, offset by (50, 20)
        let rect = ScreenRect::new(50.0, 20.0, 200.0, 100.0);
        let p = map_to_native((150.0, 70.0), &rect, 400, 200);
        assert_eq!(p, Point::new(200.0, 100.0));
    }

    #[test]
    fn touch_uses_first_contact() {
        let event = PointerEvent::Touch {
            touches: vec![
                Touch { client_x: 10.0, client_y: 12.0 },
                Touch { client_x: 90.0, client_y: 90.0 },
            ],
        };
        let p = event_to_native(&event, &ScreenRect::identity(100, 100), 100, 100);
        assert_eq!(p, Some(Point::new(10.0, 12.0)));
    }

    #[test]
    fn touch_without_contacts_has_no_position() {
        let event = PointerEvent::Touch { touches: Vec::new() };
        assert_eq!(event.client_position(), None);
    }
}
