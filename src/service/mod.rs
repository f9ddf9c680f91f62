//! Reference window-management service.
//!
//! Holds the authoritative copy of every window property, the stacking
//! order and the focus, and pushes changes back to window handles and
//! notification agents. One lock guards all window state; pushes raised by
//! a handler are queued in an `Outbox` and delivered after it is released.

mod agents;
mod layout;
mod node;
mod push;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use wmlink_ipc::info::{
    AccessibilityWindowInfo, MoveDragProperty, SystemBarRegionTint, SystemConfig, WindowUpdateType,
    WindowVisibilityInfo,
};
use wmlink_ipc::transport::calling_identity;
use wmlink_ipc::types::{
    AvoidArea, AvoidAreaType, ModeChangeHotZones, Rect, Snapshot, SurfaceDescriptor, WindowLayoutMode,
    WindowManagerAgentType, WindowMode, WindowSizeChangeReason, WindowState, WindowType,
    INVALID_WINDOW_ID,
};
use wmlink_ipc::{
    PropertyChangeAction, RemoteRef, WindowManagerService, WindowProperty, WmError, WmResult,
};

use crate::config::ServiceConfig;

pub use agents::AgentTable;
use node::WindowNode;
use push::{Outbox, Push, WindowPush};

struct ServerState {
    next_id: u32,
    windows: BTreeMap<u32, WindowNode>,
    /// Shown windows, bottom to top.
    z_order: Vec<u32>,
    focused: Option<u32>,
    layout_mode: WindowLayoutMode,
    animation_controller: Option<RemoteRef>,
    /// App windows hidden by the last toggle, restored by the next one.
    toggled_off: Vec<u32>,
}

pub struct WindowManagerServer {
    config: ServiceConfig,
    state: Mutex<ServerState>,
    agents: AgentTable,
}

impl WindowManagerServer {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ServerState {
                next_id: 1,
                windows: BTreeMap::new(),
                z_order: Vec::new(),
                focused: None,
                layout_mode: WindowLayoutMode::Cascade,
                animation_controller: None,
                toggled_off: Vec::new(),
            }),
            agents: AgentTable::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn agents(&self) -> &AgentTable {
        &self.agents
    }

    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    pub fn focused_window(&self) -> Option<u32> {
        self.state.lock().focused
    }

    /// Authoritative property of `window_id`.
    pub fn property_of(&self, window_id: u32) -> Option<WindowProperty> {
        self.state
            .lock()
            .windows
            .get(&window_id)
            .map(|node| node.property.clone())
    }

    pub fn is_shown(&self, window_id: u32) -> bool {
        self.state
            .lock()
            .windows
            .get(&window_id)
            .is_some_and(|node| node.shown)
    }

    /// Shown windows, bottom to top.
    pub fn z_order(&self) -> Vec<u32> {
        self.state.lock().z_order.clone()
    }

    pub fn has_animation_controller(&self) -> bool {
        self.state.lock().animation_controller.is_some()
    }

    /// Store captured contents for `window_id`, served by `get_snapshot`.
    pub fn attach_snapshot(&self, window_id: u32, snapshot: Snapshot) -> bool {
        match self.state.lock().windows.get_mut(&window_id) {
            Some(node) => {
                node.snapshot = Some(snapshot);
                true
            }
            None => false,
        }
    }

    /// Freeze or unfreeze every shown app window, as a display power-off would.
    pub fn freeze_app_windows(&self, frozen: bool) {
        let mut outbox = Outbox::new();
        {
            let state = self.state.lock();
            let pushed = if frozen {
                WindowState::Frozen
            } else {
                WindowState::Unfrozen
            };
            for id in &state.z_order {
                if let Some(node) = state.windows.get(id) {
                    if node.property.window_type.is_app_window() {
                        outbox.window(*id, &node.callback, WindowPush::State(pushed));
                    }
                }
            }
        }
        info!("app windows {}", if frozen { "frozen" } else { "unfrozen" });
        outbox.deliver(&self.agents);
    }

    /// Run `f` on the locked state and deliver what it queued afterwards.
    fn with_state<T>(&self, f: impl FnOnce(&mut ServerState, &mut Outbox) -> T) -> T {
        let mut outbox = Outbox::new();
        let result = {
            let mut state = self.state.lock();
            self.reap_dead(&mut *state, &mut outbox);
            f(&mut *state, &mut outbox)
        };
        outbox.deliver(&self.agents);
        result
    }

    /// Drop windows whose client went away.
    fn reap_dead(&self, state: &mut ServerState, outbox: &mut Outbox) {
        let dead: Vec<u32> = state
            .windows
            .values()
            .filter(|node| !node.is_alive())
            .map(WindowNode::id)
            .collect();
        for id in dead {
            info!("window {} lost its client, removing", id);
            self.drop_window(state, id, outbox);
        }
    }

    // ------------------------------------------------------------------
    // State transitions shared by several handlers
    // ------------------------------------------------------------------

    fn keyboard_shown(state: &ServerState) -> bool {
        state.z_order.iter().any(|id| {
            state
                .windows
                .get(id)
                .is_some_and(|node| node.property.window_type == WindowType::InputMethodFloat)
        })
    }

    fn accessibility_info(state: &ServerState, id: u32) -> Option<Arc<AccessibilityWindowInfo>> {
        let node = state.windows.get(&id)?;
        let layer = state.z_order.iter().position(|w| *w == id).unwrap_or(0) as u32;
        Some(Arc::new(node.accessibility_info(state.focused == Some(id), layer)))
    }

    fn system_bar_tints(&self, node: &WindowNode) -> Vec<SystemBarRegionTint> {
        let display = &self.config.display;
        let nav = display.navigation_bar_height.min(display.height);
        vec![
            SystemBarRegionTint {
                bar_type: WindowType::StatusBar,
                property: node.property.status_bar,
                region: Rect::new(0, 0, display.width, display.status_bar_height),
            },
            SystemBarRegionTint {
                bar_type: WindowType::NavigationBar,
                property: node.property.navigation_bar,
                region: Rect::new(
                    0,
                    (display.height - nav) as i32,
                    display.width,
                    nav,
                ),
            },
        ]
    }

    fn set_focus(&self, state: &mut ServerState, target: Option<u32>, outbox: &mut Outbox) {
        if state.focused == target {
            return;
        }
        if let Some(old) = state.focused.take() {
            if let Some(node) = state.windows.get(&old) {
                outbox.window(old, &node.callback, WindowPush::Focus(false));
                outbox.push(Push::Focus(node.focus_info(), false));
            }
        }
        state.focused = target;
        let Some(id) = target else {
            debug!("focus cleared");
            return;
        };
        let Some(node) = state.windows.get(&id) else {
            return;
        };
        debug!("focus moved to window {}", id);
        outbox.window(id, &node.callback, WindowPush::Focus(true));
        outbox.push(Push::Focus(node.focus_info(), true));
        if node.property.window_type.is_app_window() {
            outbox.push(Push::SystemBar(
                node.property.display_id,
                self.system_bar_tints(node),
            ));
        }
        if let Some(info) = Self::accessibility_info(state, id) {
            outbox.push(Push::WindowUpdate(vec![info], WindowUpdateType::Focused));
        }
    }

    /// Focus the top-most shown focusable window, if any.
    fn focus_next(&self, state: &mut ServerState, outbox: &mut Outbox) {
        let next = state.z_order.iter().rev().copied().find(|id| {
            state
                .windows
                .get(id)
                .is_some_and(|node| node.property.focusable)
        });
        self.set_focus(state, next, outbox);
    }

    fn raise(state: &mut ServerState, id: u32) {
        state.z_order.retain(|w| *w != id);
        state.z_order.push(id);
    }

    fn push_keyboard_avoid_area(&self, state: &ServerState, outbox: &mut Outbox) {
        let shown = Self::keyboard_shown(state);
        for node in state.windows.values().filter(|n| n.shown && n.avoid_area_listener) {
            let area = layout::avoid_area(
                &self.config.display,
                AvoidAreaType::Keyboard,
                &node.property.window_rect,
                shown,
            );
            outbox.window(
                node.id(),
                &node.callback,
                WindowPush::AvoidArea(area, AvoidAreaType::Keyboard),
            );
        }
    }

    /// Mark a window shown and raise everything that follows from it.
    fn show_node(&self, state: &mut ServerState, id: u32, outbox: &mut Outbox) {
        let Some(node) = state.windows.get_mut(&id) else {
            return;
        };
        node.shown = true;
        let focusable = node.property.focusable;
        let window_type = node.property.window_type;
        let token = node.property.access_token_id;
        let visibility = Arc::new(node.visibility_info());
        Self::raise(state, id);

        outbox.push(Push::Visibility(vec![visibility]));
        if let Some(info) = Self::accessibility_info(state, id) {
            outbox.push(Push::WindowUpdate(vec![info], WindowUpdateType::Added));
        }
        if window_type == WindowType::FloatCamera {
            outbox.push(Push::CameraFloat(token, true));
        }
        if window_type == WindowType::InputMethodFloat {
            self.push_keyboard_avoid_area(state, outbox);
        }
        if focusable {
            self.set_focus(state, Some(id), outbox);
        }
    }

    /// Unmark a shown window and move focus away from it.
    fn hide_node(&self, state: &mut ServerState, id: u32, outbox: &mut Outbox) {
        let Some(node) = state.windows.get_mut(&id) else {
            return;
        };
        if !node.shown {
            return;
        }
        node.shown = false;
        node.move_drag.reset();
        let window_type = node.property.window_type;
        let token = node.property.access_token_id;
        let visibility = Arc::new(node.visibility_info());
        let removed = Self::accessibility_info(state, id);
        state.z_order.retain(|w| *w != id);

        outbox.push(Push::Visibility(vec![visibility]));
        if let Some(info) = removed {
            outbox.push(Push::WindowUpdate(vec![info], WindowUpdateType::Removed));
        }
        if window_type == WindowType::FloatCamera {
            outbox.push(Push::CameraFloat(token, false));
        }
        if window_type == WindowType::InputMethodFloat {
            self.push_keyboard_avoid_area(state, outbox);
        }
        if state.focused == Some(id) {
            self.set_focus(state, None, outbox);
            self.focus_next(state, outbox);
        }
    }

    fn drop_window(&self, state: &mut ServerState, id: u32, outbox: &mut Outbox) {
        self.hide_node(state, id, outbox);
        if state.windows.remove(&id).is_some() {
            state.toggled_off.retain(|w| *w != id);
            debug!("window {} removed", id);
        }
    }

    /// Lay the window out for its mode and push the rect if it moved.
    fn relayout(&self, state: &mut ServerState, id: u32, reason: WindowSizeChangeReason, outbox: &mut Outbox) {
        let keyboard = Self::keyboard_shown(state);
        let Some(node) = state.windows.get_mut(&id) else {
            return;
        };
        let rect = layout::layout_rect(&self.config.display, node.property.mode, &node.property.request_rect);
        if rect == node.property.window_rect {
            return;
        }
        node.property.window_rect = rect;
        outbox.window(
            id,
            &node.callback,
            WindowPush::Rect {
                rect,
                deco_status: node.property.deco_status,
                reason,
            },
        );
        if node.avoid_area_listener {
            let area = layout::avoid_area(&self.config.display, AvoidAreaType::System, &rect, keyboard);
            outbox.window(id, &node.callback, WindowPush::AvoidArea(area, AvoidAreaType::System));
        }
        if node.shown {
            if let Some(info) = Self::accessibility_info(state, id) {
                outbox.push(Push::WindowUpdate(vec![info], WindowUpdateType::Bounds));
            }
        }
    }

    fn check_mode_and_size(&self, property: &WindowProperty) -> WmResult<()> {
        if !property.mode_support.supports(property.mode) {
            warn!(
                "window {}: mode {:?} not in {:?}",
                property.window_id, property.mode, property.mode_support
            );
            return Err(WmError::InvalidWindowModeOrSize);
        }
        if property.mode == WindowMode::Floating
            && !layout::size_allowed(&self.config.limits, &property.request_rect)
        {
            warn!(
                "window {}: size {}x{} outside limits",
                property.window_id, property.request_rect.width, property.request_rect.height
            );
            return Err(WmError::InvalidWindowModeOrSize);
        }
        Ok(())
    }

    fn set_app_windows_shown(&self, state: &mut ServerState, ids: &[u32], shown: bool, outbox: &mut Outbox) {
        for id in ids {
            let Some(node) = state.windows.get(id) else {
                continue;
            };
            let pushed = if shown {
                WindowState::Shown
            } else {
                WindowState::Hidden
            };
            outbox.window(*id, &node.callback, WindowPush::State(pushed));
            if shown {
                self.show_node(state, *id, outbox);
            } else {
                self.hide_node(state, *id, outbox);
            }
        }
    }
}

impl WindowManagerService for WindowManagerServer {
    fn create_window(
        &self,
        window: RemoteRef,
        mut property: WindowProperty,
        surface: SurfaceDescriptor,
        token: Option<RemoteRef>,
    ) -> WmResult<u32> {
        self.with_state(|state, outbox| {
            if property.name.is_empty() {
                warn!("refusing window without a name");
                return Err(WmError::InvalidParam);
            }
            if property.parent_id != INVALID_WINDOW_ID
                && !state.windows.contains_key(&property.parent_id)
            {
                warn!("parent {} of {} does not exist", property.parent_id, property.name);
                return Err(WmError::InvalidParam);
            }
            if property.window_type.is_sub_window() && property.parent_id == INVALID_WINDOW_ID {
                return Err(WmError::InvalidParam);
            }

            let window_id = state.next_id;
            state.next_id += 1;
            property.window_id = window_id;
            let requested_mode = property.mode;
            if property.mode == WindowMode::Undefined && property.window_type.is_main_window() {
                property.set_mode(self.config.system.default_window_mode);
            }
            let node = WindowNode::new(property, window, surface, token, calling_identity());
            if node.property.mode != requested_mode {
                outbox.window(window_id, &node.callback, WindowPush::Mode(node.property.mode));
            }
            info!(
                "created window {} ({}, {:?}) on surface {} for pid {}",
                window_id,
                node.property.name,
                node.property.window_type,
                node.surface.surface_id,
                node.owner.pid
            );
            state.windows.insert(window_id, node);
            Ok(window_id)
        })
    }

    fn add_window(&self, mut property: WindowProperty) -> WmResult<()> {
        self.with_state(|state, outbox| {
            let id = property.window_id;
            let Some(node) = state.windows.get(&id) else {
                warn!("add: unknown window {}", id);
                return Err(WmError::InvalidWindow);
            };
            if node.shown {
                debug!("window {} already shown", id);
                return Ok(());
            }
            if state
                .windows
                .values()
                .any(|other| other.id() != id && other.property.name == property.name)
            {
                warn!("window name {} already in use", property.name);
                return Err(WmError::InvalidParam);
            }
            self.check_mode_and_size(&property)?;

            // The service owns the laid-out rect.
            property.window_rect = node.property.window_rect;
            if let Some(node) = state.windows.get_mut(&id) {
                node.property = property;
            }
            self.relayout(state, id, WindowSizeChangeReason::Undefined, outbox);
            self.show_node(state, id, outbox);
            info!("window {} shown", id);
            Ok(())
        })
    }

    fn remove_window(&self, window_id: u32) -> WmResult<()> {
        self.with_state(|state, outbox| {
            if !state.windows.contains_key(&window_id) {
                return Err(WmError::InvalidWindow);
            }
            self.hide_node(state, window_id, outbox);
            info!("window {} hidden", window_id);
            Ok(())
        })
    }

    fn destroy_window(&self, window_id: u32, only_self: bool) -> WmResult<()> {
        self.with_state(|state, outbox| {
            if !state.windows.contains_key(&window_id) {
                return Err(WmError::InvalidWindow);
            }
            let mut doomed = vec![window_id];
            if !only_self {
                let mut i = 0;
                while i < doomed.len() {
                    let parent = doomed[i];
                    doomed.extend(
                        state
                            .windows
                            .values()
                            .filter(|n| n.property.parent_id == parent)
                            .map(WindowNode::id),
                    );
                    i += 1;
                }
            }
            for id in doomed {
                self.drop_window(state, id, outbox);
                info!("window {} destroyed", id);
            }
            Ok(())
        })
    }

    fn request_focus(&self, window_id: u32) -> WmResult<()> {
        self.with_state(|state, outbox| {
            let Some(node) = state.windows.get(&window_id) else {
                return Err(WmError::InvalidWindow);
            };
            if !node.shown {
                return Err(WmError::InvalidWindow);
            }
            if !node.property.focusable {
                return Err(WmError::InvalidOperation);
            }
            self.set_focus(state, Some(window_id), outbox);
            Ok(())
        })
    }

    fn get_avoid_area_by_type(&self, window_id: u32, area_type: AvoidAreaType) -> AvoidArea {
        let state = self.state.lock();
        let Some(node) = state.windows.get(&window_id) else {
            return AvoidArea::default();
        };
        layout::avoid_area(
            &self.config.display,
            area_type,
            &node.property.window_rect,
            Self::keyboard_shown(&state),
        )
    }

    fn register_window_manager_agent(&self, kind: WindowManagerAgentType, agent: RemoteRef) -> bool {
        self.agents.register(kind, agent)
    }

    fn unregister_window_manager_agent(&self, kind: WindowManagerAgentType, agent: RemoteRef) -> bool {
        self.agents.unregister(kind, &agent)
    }

    fn notify_server_ready_to_move_or_drag(
        &self,
        window_id: u32,
        property: WindowProperty,
        move_drag: MoveDragProperty,
    ) {
        let mut state = self.state.lock();
        let Some(node) = state.windows.get_mut(&window_id) else {
            warn!("move/drag for unknown window {}", window_id);
            return;
        };
        if move_drag.start_drag {
            node.property.drag_type = property.drag_type;
            node.property.origin_rect = move_drag.start_rect;
        }
        node.move_drag = move_drag;
        debug!(
            "window {} ready to {}",
            window_id,
            if move_drag.start_drag { "drag" } else { "move" }
        );
    }

    fn process_point_down(&self, window_id: u32, is_point_down: bool) {
        self.with_state(|state, outbox| {
            let Some(node) = state.windows.get(&window_id) else {
                return;
            };
            if !node.shown || !is_point_down {
                return;
            }
            let focusable = node.property.focusable;
            Self::raise(state, window_id);
            if focusable {
                self.set_focus(state, Some(window_id), outbox);
            }
        })
    }

    fn process_point_up(&self, window_id: u32) {
        self.with_state(|state, outbox| {
            let Some(node) = state.windows.get_mut(&window_id) else {
                return;
            };
            let was_dragging = node.move_drag.start_drag;
            node.move_drag.reset();
            if was_dragging {
                outbox.window(
                    window_id,
                    &node.callback,
                    WindowPush::Rect {
                        rect: node.property.window_rect,
                        deco_status: node.property.deco_status,
                        reason: WindowSizeChangeReason::DragEnd,
                    },
                );
            }
        })
    }

    fn get_top_window_id(&self, main_window_id: u32) -> WmResult<u32> {
        let state = self.state.lock();
        if !state.windows.contains_key(&main_window_id) {
            return Err(WmError::InvalidWindow);
        }
        let top = state
            .z_order
            .iter()
            .rev()
            .copied()
            .find(|id| {
                *id == main_window_id
                    || state
                        .windows
                        .get(id)
                        .is_some_and(|n| n.property.parent_id == main_window_id)
            })
            .unwrap_or(main_window_id);
        Ok(top)
    }

    fn minimize_all_app_windows(&self, display_id: u64) {
        self.with_state(|state, outbox| {
            let ids: Vec<u32> = state
                .z_order
                .iter()
                .copied()
                .filter(|id| {
                    state.windows.get(id).is_some_and(|n| {
                        n.property.window_type.is_main_window() && n.property.display_id == display_id
                    })
                })
                .collect();
            info!("minimizing {} app windows on display {}", ids.len(), display_id);
            self.set_app_windows_shown(state, &ids, false, outbox);
        })
    }

    fn toggle_shown_state_for_all_app_windows(&self) -> WmResult<()> {
        self.with_state(|state, outbox| {
            let shown: Vec<u32> = state
                .z_order
                .iter()
                .copied()
                .filter(|id| {
                    state
                        .windows
                        .get(id)
                        .is_some_and(|n| n.property.window_type.is_main_window())
                })
                .collect();
            if shown.is_empty() {
                let restore = std::mem::take(&mut state.toggled_off);
                debug!("restoring {} app windows", restore.len());
                self.set_app_windows_shown(state, &restore, true, outbox);
            } else {
                debug!("hiding {} app windows", shown.len());
                self.set_app_windows_shown(state, &shown, false, outbox);
                state.toggled_off = shown;
            }
            Ok(())
        })
    }

    fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<()> {
        self.with_state(|state, outbox| {
            state.layout_mode = mode;
            let floating: Vec<u32> = state
                .z_order
                .iter()
                .copied()
                .filter(|id| {
                    state.windows.get(id).is_some_and(|n| {
                        n.property.window_type.is_main_window() && n.property.mode == WindowMode::Floating
                    })
                })
                .collect();
            let rects = match mode {
                WindowLayoutMode::Tile => layout::tile(&self.config.display, floating.len()),
                WindowLayoutMode::Cascade => floating
                    .iter()
                    .enumerate()
                    .filter_map(|(i, id)| {
                        let node = state.windows.get(id)?;
                        Some(layout::cascade(&self.config.display, i, &node.property.window_rect))
                    })
                    .collect(),
            };
            for (id, rect) in floating.iter().zip(rects) {
                if let Some(node) = state.windows.get_mut(id) {
                    node.property.request_rect = rect;
                }
                self.relayout(state, *id, WindowSizeChangeReason::Resize, outbox);
            }
            info!("layout mode {:?} applied to {} windows", mode, floating.len());
            Ok(())
        })
    }

    fn update_property(&self, property: WindowProperty, action: PropertyChangeAction) -> WmResult<()> {
        self.with_state(|state, outbox| {
            let id = property.window_id;
            let Some(node) = state.windows.get(&id) else {
                warn!("update: unknown window {}", id);
                return Err(WmError::InvalidWindow);
            };
            let mut updated = node.property.clone();
            if !updated.apply_changes(&property, action) {
                return Err(WmError::DoNothing);
            }
            if action.intersects(PropertyChangeAction::MODE | PropertyChangeAction::RECT) {
                self.check_mode_and_size(&updated)?;
            }
            let mode_changed = updated.mode != node.property.mode;
            let support_changed = updated.mode_support != node.property.mode_support;
            let shown = node.shown;
            let focused = state.focused == Some(id);
            if let Some(node) = state.windows.get_mut(&id) {
                node.property = updated;
            }
            debug!("window {} updated {:?}", id, action);
            if !shown {
                return Ok(());
            }

            if let Some(node) = state.windows.get(&id) {
                if mode_changed {
                    outbox.window(id, &node.callback, WindowPush::Mode(node.property.mode));
                }
                if support_changed {
                    outbox.window(
                        id,
                        &node.callback,
                        WindowPush::ModeSupport(node.property.mode_support),
                    );
                }
            }
            if action.intersects(PropertyChangeAction::MODE | PropertyChangeAction::RECT) {
                let reason = state
                    .windows
                    .get(&id)
                    .map_or(WindowSizeChangeReason::Undefined, |n| n.property.size_change_reason);
                self.relayout(state, id, reason, outbox);
            }
            if action.contains(PropertyChangeAction::FOCUSABLE)
                && focused
                && state.windows.get(&id).is_some_and(|n| !n.property.focusable)
            {
                self.set_focus(state, None, outbox);
                self.focus_next(state, outbox);
            }
            if action.contains(PropertyChangeAction::OTHER_PROPS) && focused {
                if let Some(node) = state.windows.get(&id) {
                    outbox.push(Push::SystemBar(node.property.display_id, self.system_bar_tints(node)));
                }
            }
            if let Some(info) = Self::accessibility_info(state, id) {
                outbox.push(Push::WindowUpdate(vec![info], WindowUpdateType::Property));
            }
            Ok(())
        })
    }

    fn get_accessibility_window_info(&self) -> WmResult<Vec<Arc<AccessibilityWindowInfo>>> {
        let state = self.state.lock();
        Ok(state
            .z_order
            .iter()
            .filter_map(|id| Self::accessibility_info(&state, *id))
            .collect())
    }

    fn get_visibility_window_info(&self) -> WmResult<Vec<Arc<WindowVisibilityInfo>>> {
        let state = self.state.lock();
        Ok(state
            .windows
            .values()
            .map(|node| Arc::new(node.visibility_info()))
            .collect())
    }

    fn set_window_animation_controller(&self, controller: RemoteRef) -> WmResult<()> {
        let caller = calling_identity();
        info!("animation controller installed by pid {}", caller.pid);
        self.state.lock().animation_controller = Some(controller);
        Ok(())
    }

    fn get_system_config(&self) -> WmResult<SystemConfig> {
        Ok(self.config.system.clone())
    }

    fn get_mode_change_hot_zones(&self, display_id: u64) -> WmResult<ModeChangeHotZones> {
        if display_id != self.config.display.id {
            warn!("hot zones requested for unknown display {}", display_id);
            return Err(WmError::InvalidParam);
        }
        layout::hot_zones(&self.config.display, &self.config.hot_zones).ok_or(WmError::DoNothing)
    }

    fn update_avoid_area_listener(&self, window_id: u32, have_listener: bool) -> WmResult<()> {
        let mut state = self.state.lock();
        let Some(node) = state.windows.get_mut(&window_id) else {
            return Err(WmError::InvalidWindow);
        };
        node.avoid_area_listener = have_listener;
        debug!("window {} avoid area listener: {}", window_id, have_listener);
        Ok(())
    }

    fn get_snapshot(&self, window_id: u32) -> Option<Snapshot> {
        self.state
            .lock()
            .windows
            .get(&window_id)
            .and_then(|node| node.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    use wmlink_ipc::codes::WindowCallbackCode;
    use wmlink_ipc::{CallMode, Parcel, RemoteObject, TransportError};

    use super::*;

    /// Window callback that only records which pushes arrived.
    #[derive(Default)]
    struct Sink {
        codes: Mutex<Vec<WindowCallbackCode>>,
        dead: AtomicBool,
    }

    impl Sink {
        fn count(&self, code: WindowCallbackCode) -> usize {
            self.codes.lock().iter().filter(|c| **c == code).count()
        }
    }

    impl RemoteObject for Sink {
        fn send_request(
            &self,
            code: u32,
            _data: &Parcel,
            _reply: &mut Parcel,
            _mode: CallMode,
        ) -> Result<(), TransportError> {
            if let Ok(code) = WindowCallbackCode::try_from(code) {
                self.codes.lock().push(code);
            }
            Ok(())
        }

        fn is_alive(&self) -> bool {
            !self.dead.load(Ordering::SeqCst)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn create(
        server: &WindowManagerServer,
        property: WindowProperty,
    ) -> (WmResult<u32>, Arc<Sink>) {
        let sink = Arc::new(Sink::default());
        let remote: RemoteRef = sink.clone();
        let result = server.create_window(remote, property, SurfaceDescriptor::default(), None);
        (result, sink)
    }

    fn shown(server: &WindowManagerServer, name: &str, window_type: WindowType) -> (u32, Arc<Sink>) {
        let (result, sink) = create(server, WindowProperty::new(name, window_type));
        let id = result.unwrap();
        server.add_window(server.property_of(id).unwrap()).unwrap();
        (id, sink)
    }

    #[test]
    fn test_create_validation() {
        let server = WindowManagerServer::new(ServiceConfig::default());

        let (result, _) = create(&server, WindowProperty::new("", WindowType::AppMainWindow));
        assert_eq!(result, Err(WmError::InvalidParam));

        let (result, _) = create(&server, WindowProperty::new("orphan", WindowType::AppSubWindow));
        assert_eq!(result, Err(WmError::InvalidParam));

        let mut dangling = WindowProperty::new("dangling", WindowType::AppSubWindow);
        dangling.parent_id = 99;
        let (result, _) = create(&server, dangling);
        assert_eq!(result, Err(WmError::InvalidParam));

        assert_eq!(server.window_count(), 0);
    }

    #[test]
    fn test_create_assigns_ids_and_default_mode() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (first, sink) = create(&server, WindowProperty::new("a", WindowType::AppMainWindow));
        let (second, _) = create(&server, WindowProperty::new("b", WindowType::AppMainWindow));
        let first = first.unwrap();
        let second = second.unwrap();

        assert_ne!(first, INVALID_WINDOW_ID);
        assert!(second > first);
        assert_eq!(
            server.property_of(first).unwrap().mode,
            server.config().system.default_window_mode
        );
        assert_eq!(sink.count(WindowCallbackCode::UpdateWindowMode), 1);
    }

    #[test]
    fn test_duplicate_name_rejected_on_add() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        shown(&server, "same", WindowType::AppMainWindow);
        let (result, _) = create(&server, WindowProperty::new("same", WindowType::AppMainWindow));
        let id = result.unwrap();

        let property = server.property_of(id).unwrap();
        assert_eq!(server.add_window(property), Err(WmError::InvalidParam));
        assert!(!server.is_shown(id));
    }

    #[test]
    fn test_focus_moves_to_next_on_hide() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (below, below_sink) = shown(&server, "below", WindowType::AppMainWindow);
        let (above, _) = shown(&server, "above", WindowType::AppMainWindow);
        assert_eq!(server.focused_window(), Some(above));
        assert_eq!(server.z_order(), vec![below, above]);

        server.remove_window(above).unwrap();
        assert_eq!(server.focused_window(), Some(below));
        assert_eq!(server.z_order(), vec![below]);
        // Focused on show, unfocused by the second window, focused again.
        assert_eq!(below_sink.count(WindowCallbackCode::UpdateFocusStatus), 3);
    }

    #[test]
    fn test_request_focus_rules() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (id, _) = shown(&server, "main", WindowType::AppMainWindow);
        let (result, _) = create(&server, WindowProperty::new("hidden", WindowType::AppMainWindow));
        let hidden = result.unwrap();

        assert_eq!(server.request_focus(hidden), Err(WmError::InvalidWindow));
        assert_eq!(server.request_focus(404), Err(WmError::InvalidWindow));

        let mut property = server.property_of(id).unwrap();
        property.focusable = false;
        server
            .update_property(property, PropertyChangeAction::FOCUSABLE)
            .unwrap();
        assert_eq!(server.focused_window(), None);
        assert_eq!(server.request_focus(id), Err(WmError::InvalidOperation));
    }

    #[test]
    fn test_update_without_change_does_nothing() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (id, _) = shown(&server, "main", WindowType::AppMainWindow);
        let property = server.property_of(id).unwrap();

        assert_eq!(
            server.update_property(property.clone(), PropertyChangeAction::FLAGS),
            Err(WmError::DoNothing)
        );

        let mut unknown = property;
        unknown.window_id = 404;
        assert_eq!(
            server.update_property(unknown, PropertyChangeAction::FLAGS),
            Err(WmError::InvalidWindow)
        );
    }

    #[test]
    fn test_update_rect_checks_limits() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (id, sink) = shown(&server, "main", WindowType::AppMainWindow);
        let mut property = server.property_of(id).unwrap();
        property.set_mode(WindowMode::Floating);
        server
            .update_property(property.clone(), PropertyChangeAction::MODE)
            .unwrap();
        assert_eq!(sink.count(WindowCallbackCode::UpdateWindowMode), 2);

        property.request_rect = Rect::new(0, 0, 10, 10);
        assert_eq!(
            server.update_property(property.clone(), PropertyChangeAction::RECT),
            Err(WmError::InvalidWindowModeOrSize)
        );

        property.request_rect = Rect::new(100, 100, 640, 480);
        server
            .update_property(property, PropertyChangeAction::RECT)
            .unwrap();
        assert_eq!(
            server.property_of(id).unwrap().window_rect,
            Rect::new(100, 100, 640, 480)
        );
    }

    #[test]
    fn test_hot_zones() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        assert!(server.get_mode_change_hot_zones(0).is_ok());
        assert_eq!(
            server.get_mode_change_hot_zones(5),
            Err(WmError::InvalidParam)
        );

        let mut config = ServiceConfig::default();
        config.hot_zones.fullscreen_depth = 0;
        config.hot_zones.split_depth = 0;
        let disabled = WindowManagerServer::new(config);
        assert_eq!(
            disabled.get_mode_change_hot_zones(0),
            Err(WmError::DoNothing)
        );
    }

    #[test]
    fn test_tile_layout() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let mut ids = Vec::new();
        for name in ["a", "b"] {
            let mut property = WindowProperty::new(name, WindowType::AppMainWindow);
            property.set_mode(WindowMode::Floating);
            property.request_rect = Rect::new(10, 10, 300, 200);
            let (result, _) = create(&server, property);
            let id = result.unwrap();
            server.add_window(server.property_of(id).unwrap()).unwrap();
            ids.push(id);
        }

        server.set_window_layout_mode(WindowLayoutMode::Tile).unwrap();

        let display = &server.config().display;
        let first = server.property_of(ids[0]).unwrap().window_rect;
        let second = server.property_of(ids[1]).unwrap().window_rect;
        assert_eq!(first.width, display.width / 2);
        assert_eq!(second.x, first.x + first.width as i32);
        assert_eq!(first.y, display.status_bar_height as i32);
    }

    #[test]
    fn test_keyboard_avoid_area_pushed_to_listeners() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (id, sink) = shown(&server, "main", WindowType::AppMainWindow);
        server.update_avoid_area_listener(id, true).unwrap();

        let before = server.get_avoid_area_by_type(id, AvoidAreaType::Keyboard);
        assert!(before.is_empty());

        let (keyboard, _) = shown(&server, "ime", WindowType::InputMethodFloat);
        assert_eq!(sink.count(WindowCallbackCode::UpdateAvoidArea), 1);
        assert!(!server
            .get_avoid_area_by_type(id, AvoidAreaType::Keyboard)
            .is_empty());

        server.remove_window(keyboard).unwrap();
        assert_eq!(sink.count(WindowCallbackCode::UpdateAvoidArea), 2);
        assert!(server
            .get_avoid_area_by_type(id, AvoidAreaType::Keyboard)
            .is_empty());
    }

    #[test]
    fn test_destroy_with_children() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (parent, _) = shown(&server, "parent", WindowType::AppMainWindow);
        let mut child = WindowProperty::new("child", WindowType::AppSubWindow);
        child.parent_id = parent;
        let (child_id, _) = create(&server, child);
        let child_id = child_id.unwrap();

        server.destroy_window(parent, false).unwrap();
        assert!(server.property_of(child_id).is_none());
        assert_eq!(server.window_count(), 0);
        assert_eq!(server.destroy_window(parent, true), Err(WmError::InvalidWindow));
    }

    #[test]
    fn test_dead_client_windows_reaped() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (gone, sink) = shown(&server, "gone", WindowType::AppMainWindow);
        let (stays, _) = shown(&server, "stays", WindowType::AppMainWindow);
        server.request_focus(gone).unwrap();

        sink.dead.store(true, Ordering::SeqCst);
        server.process_point_down(stays, false);

        assert!(server.property_of(gone).is_none());
        assert_eq!(server.focused_window(), Some(stays));
    }

    #[test]
    fn test_toggle_restores_hidden_app_windows() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (app, sink) = shown(&server, "app", WindowType::AppMainWindow);
        let (bar, _) = shown(&server, "bar", WindowType::StatusBar);

        server.toggle_shown_state_for_all_app_windows().unwrap();
        assert!(!server.is_shown(app));
        assert!(server.is_shown(bar));

        server.toggle_shown_state_for_all_app_windows().unwrap();
        assert!(server.is_shown(app));
        assert_eq!(sink.count(WindowCallbackCode::UpdateWindowState), 2);
    }

    #[test]
    fn test_point_up_ends_drag() {
        let server = WindowManagerServer::new(ServiceConfig::default());
        let (id, sink) = shown(&server, "main", WindowType::AppMainWindow);
        let property = server.property_of(id).unwrap();
        let rects = sink.count(WindowCallbackCode::UpdateWindowRect);

        server.notify_server_ready_to_move_or_drag(
            id,
            property,
            MoveDragProperty {
                start_drag: true,
                ..Default::default()
            },
        );
        server.process_point_up(id);
        assert_eq!(sink.count(WindowCallbackCode::UpdateWindowRect), rects + 1);

        server.process_point_up(id);
        assert_eq!(sink.count(WindowCallbackCode::UpdateWindowRect), rects + 1);
    }
}
