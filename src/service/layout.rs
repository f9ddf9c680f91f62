//! Geometry the reference service derives from its display configuration:
//! window rects per mode, avoid areas, hot zones and tiling.

use tracing::debug;
use wmlink_ipc::types::{AvoidArea, AvoidAreaType, ModeChangeHotZones, Rect, WindowMode};

use crate::config::{DisplayConfig, HotZoneConfig, SizeLimits};

pub fn display_rect(display: &DisplayConfig) -> Rect {
    Rect::new(0, 0, display.width, display.height)
}

/// Display area left after the status bar and the navigation bar.
pub fn work_area(display: &DisplayConfig) -> Rect {
    let top = display.status_bar_height.min(display.height);
    let bottom = display.navigation_bar_height.min(display.height - top);
    Rect::new(0, top as i32, display.width, display.height - top - bottom)
}

pub fn intersect(a: &Rect, b: &Rect) -> Rect {
    let left = (a.x as i64).max(b.x as i64);
    let top = (a.y as i64).max(b.y as i64);
    let right = (a.x as i64 + a.width as i64).min(b.x as i64 + b.width as i64);
    let bottom = (a.y as i64 + a.height as i64).min(b.y as i64 + b.height as i64);
    if right <= left || bottom <= top {
        return Rect::default();
    }
    Rect::new(left as i32, top as i32, (right - left) as u32, (bottom - top) as u32)
}

/// Whether a requested floating size is acceptable. An empty request means
/// "let the service pick".
pub fn size_allowed(limits: &SizeLimits, request: &Rect) -> bool {
    if request.is_empty() {
        return true;
    }
    (limits.min_width..=limits.max_width).contains(&request.width)
        && (limits.min_height..=limits.max_height).contains(&request.height)
}

/// Rect a window in `mode` is laid out at.
pub fn layout_rect(display: &DisplayConfig, mode: WindowMode, request: &Rect) -> Rect {
    let work = work_area(display);
    let half = work.width / 2;
    match mode {
        WindowMode::Fullscreen => display_rect(display),
        WindowMode::SplitPrimary => Rect::new(work.x, work.y, half, work.height),
        WindowMode::SplitSecondary => {
            Rect::new(work.x + half as i32, work.y, work.width - half, work.height)
        }
        WindowMode::Floating | WindowMode::Undefined | WindowMode::Pip => {
            if !request.is_empty() {
                return *request;
            }
            // Centered at two thirds of the work area.
            let width = work.width * 2 / 3;
            let height = work.height * 2 / 3;
            Rect::new(
                work.x + ((work.width - width) / 2) as i32,
                work.y + ((work.height - height) / 2) as i32,
                width,
                height,
            )
        }
    }
}

/// Part of `window` overlapping the region `area_type` describes.
pub fn avoid_area(
    display: &DisplayConfig,
    area_type: AvoidAreaType,
    window: &Rect,
    keyboard_shown: bool,
) -> AvoidArea {
    let full = display_rect(display);
    let mut area = AvoidArea::default();
    match area_type {
        AvoidAreaType::System => {
            area.top = Rect::new(0, 0, full.width, display.status_bar_height);
            let nav = display.navigation_bar_height.min(full.height);
            area.bottom = Rect::new(0, (full.height - nav) as i32, full.width, nav);
        }
        AvoidAreaType::Cutout => {
            area.top = Rect::new(0, 0, full.width, display.cutout_height);
        }
        AvoidAreaType::SystemGesture => {
            let strip = display.gesture_width.min(full.width / 2);
            area.left = Rect::new(0, 0, strip, full.height);
            area.right = Rect::new((full.width - strip) as i32, 0, strip, full.height);
        }
        AvoidAreaType::Keyboard => {
            if keyboard_shown {
                let height = display.keyboard_height.min(full.height);
                area.bottom = Rect::new(0, (full.height - height) as i32, full.width, height);
            }
        }
    }
    AvoidArea {
        top: intersect(&area.top, window),
        left: intersect(&area.left, window),
        right: intersect(&area.right, window),
        bottom: intersect(&area.bottom, window),
    }
}

/// Hot zones of the display, `None` when disabled.
pub fn hot_zones(display: &DisplayConfig, config: &HotZoneConfig) -> Option<ModeChangeHotZones> {
    if config.fullscreen_depth == 0 && config.split_depth == 0 {
        return None;
    }
    let full = display_rect(display);
    let split = config.split_depth.min(full.width / 2);
    Some(ModeChangeHotZones {
        fullscreen: Rect::new(0, 0, full.width, config.fullscreen_depth.min(full.height)),
        primary: Rect::new(0, 0, split, full.height),
        secondary: Rect::new((full.width - split) as i32, 0, split, full.height),
    })
}

/// Grid of `count` cells covering the work area, row by row.
pub fn tile(display: &DisplayConfig, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let work = work_area(display);
    let columns = (count as f64).sqrt().ceil() as u32;
    let rows = (count as u32).div_ceil(columns);
    let cell_width = work.width / columns;
    let cell_height = work.height / rows;
    debug!("tiling {} windows as {}x{}", count, columns, rows);
    (0..count as u32)
        .map(|i| {
            Rect::new(
                work.x + ((i % columns) * cell_width) as i32,
                work.y + ((i / columns) * cell_height) as i32,
                cell_width,
                cell_height,
            )
        })
        .collect()
}

/// Position of the `index`-th window in a cascade.
pub fn cascade(display: &DisplayConfig, index: usize, size: &Rect) -> Rect {
    const STEP: i32 = 32;
    let work = work_area(display);
    let offset = STEP * (index % 10) as i32;
    Rect::new(work.x + offset, work.y + offset, size.width, size.height)
}
