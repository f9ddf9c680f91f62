//! Pointer-gesture helpers for window move and drag-resize.
//!
//! A pointer going down near the border of a decorated floating window
//! starts a drag-resize; the drag type depends on which edge or corner was
//! hit. Moves are started explicitly by the application.

use wmlink_ipc::types::{DragType, Rect};

/// Border band, in pixels before scaling, that starts a drag.
pub const WINDOW_FRAME_WIDTH: u32 = 5;
/// Corner size, in pixels before scaling, that starts a corner drag.
pub const WINDOW_FRAME_CORNER_WIDTH: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Cancel,
}

/// Pointer event delivered to a window, in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub pointer_id: i32,
    pub source_type: i32,
    pub display_id: u64,
    pub display_x: i32,
    pub display_y: i32,
}

/// The two inner rects a pointer-down is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragHotZone {
    except_frame: Rect,
    except_corner: Rect,
}

impl DragHotZone {
    pub fn new(window_rect: Rect, pixel_ratio: f32) -> Self {
        let frame = (WINDOW_FRAME_WIDTH as f32 * pixel_ratio) as u32;
        let corner = (WINDOW_FRAME_CORNER_WIDTH as f32 * pixel_ratio) as u32;
        Self {
            except_frame: window_rect.inset(frame),
            except_corner: window_rect.inset(corner),
        }
    }

    /// Drag type for a pointer-down at (`x`, `y`), or `None` when the point
    /// is in the window body.
    pub fn drag_type_at(&self, x: i32, y: i32) -> Option<DragType> {
        if strictly_inside(&self.except_frame, x, y) && inside_except_corner(&self.except_corner, x, y) {
            return None;
        }
        let corner = &self.except_corner;
        let (x, y) = (x as i64, y as i64);
        let (left, top) = (corner.x as i64, corner.y as i64);
        let right = left + corner.width as i64;
        let bottom = top + corner.height as i64;
        let drag_type = if x > left && x < right {
            DragType::BottomOrTop
        } else if y > top && y < bottom {
            DragType::LeftOrRight
        } else if (x <= left && y <= top) || (x >= right && y >= bottom) {
            DragType::LeftTopCorner
        } else {
            DragType::RightTopCorner
        };
        Some(drag_type)
    }
}

// Open interval along one axis, one pixel short of the far edge.
fn within_span(start: i32, len: u32, point: i32) -> bool {
    let start = start as i64;
    let point = point as i64;
    point > start && point < start + len as i64 - 1
}

fn strictly_inside(rect: &Rect, x: i32, y: i32) -> bool {
    within_span(rect.x, rect.width, x) && within_span(rect.y, rect.height, y)
}

// True unless the point sits in one of the four corner squares.
fn inside_except_corner(rect: &Rect, x: i32, y: i32) -> bool {
    within_span(rect.x, rect.width, x) || within_span(rect.y, rect.height, y)
}
