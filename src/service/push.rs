//! Outgoing service pushes.
//!
//! Handlers collect pushes while holding the service lock and deliver them
//! once it is released, so a client reacting to a push can call back in.

use std::sync::Arc;

use tracing::warn;
use wmlink_ipc::info::{
    AccessibilityWindowInfo, FocusChangeInfo, SystemBarRegionTint, WindowUpdateType,
    WindowVisibilityInfo,
};
use wmlink_ipc::types::{AvoidArea, AvoidAreaType, ModeSupport, Rect, WindowMode, WindowSizeChangeReason, WindowState};
use wmlink_ipc::window::WindowCallbackProxy;

use super::agents::AgentTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowPush {
    Rect {
        rect: Rect,
        deco_status: bool,
        reason: WindowSizeChangeReason,
    },
    Mode(WindowMode),
    ModeSupport(ModeSupport),
    Focus(bool),
    AvoidArea(AvoidArea, AvoidAreaType),
    State(WindowState),
}

pub enum Push {
    Window {
        window_id: u32,
        target: WindowCallbackProxy,
        push: WindowPush,
    },
    Focus(FocusChangeInfo, bool),
    SystemBar(u64, Vec<SystemBarRegionTint>),
    WindowUpdate(Vec<Arc<AccessibilityWindowInfo>>, WindowUpdateType),
    Visibility(Vec<Arc<WindowVisibilityInfo>>),
    CameraFloat(u32, bool),
}

/// Pushes queued by one handler, in the order they were raised.
#[derive(Default)]
pub struct Outbox {
    pushes: Vec<Push>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&mut self, window_id: u32, target: &WindowCallbackProxy, push: WindowPush) {
        self.pushes.push(Push::Window {
            window_id,
            target: target.clone(),
            push,
        });
    }

    pub fn push(&mut self, push: Push) {
        self.pushes.push(push);
    }

    pub fn deliver(self, agents: &AgentTable) {
        for push in self.pushes {
            match push {
                Push::Window {
                    window_id,
                    target,
                    push,
                } => {
                    let result = match push {
                        WindowPush::Rect {
                            rect,
                            deco_status,
                            reason,
                        } => target.update_window_rect(rect, deco_status, reason),
                        WindowPush::Mode(mode) => target.update_window_mode(mode),
                        WindowPush::ModeSupport(support) => target.update_window_mode_support(support),
                        WindowPush::Focus(focused) => target.update_focus_status(focused),
                        WindowPush::AvoidArea(area, area_type) => {
                            target.update_avoid_area(&area, area_type)
                        }
                        WindowPush::State(state) => target.update_window_state(state),
                    };
                    if let Err(e) = result {
                        warn!("push {:?} to window {} failed: {}", push, window_id, e);
                    }
                }
                Push::Focus(info, focused) => agents.notify_focus(&info, focused),
                Push::SystemBar(display_id, tints) => agents.notify_system_bar(display_id, &tints),
                Push::WindowUpdate(infos, update_type) => {
                    agents.notify_window_update(&infos, update_type)
                }
                Push::Visibility(infos) => agents.notify_visibility(&infos),
                Push::CameraFloat(token, showing) => agents.notify_camera_float(token, showing),
            }
        }
    }
}
