//! Client-side window handle.
//!
//! A `WindowImpl` owns the cached `WindowProperty` of one window and its
//! lifecycle state. Mutations are checked locally first. While the window is
//! shown they are pushed to the service as `UpdateProperty` deltas and the
//! cache only follows once the service accepted them; before that they are
//! cached and travel with the full property on the next show.
//!
//! The inner lock is never held across a remote call, and never while the
//! registry lock is taken.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use wmlink_ipc::info::MoveDragProperty;
use wmlink_ipc::types::{
    AnimationFlag, AvoidArea, AvoidAreaType, ColorSpace, ModeSupport, Orientation, Rect, Snapshot,
    SurfaceDescriptor, SystemBarProperty, Transform, WindowFlags, WindowMode, WindowSizeChangeReason,
    WindowState, WindowStateChangeReason, WindowType, INVALID_WINDOW_ID, MAXIMUM_BRIGHTNESS,
    MINIMUM_BRIGHTNESS, UNDEFINED_BRIGHTNESS,
};
use wmlink_ipc::window::{WindowCallback, WindowCallbackStub};
use wmlink_ipc::{PropertyChangeAction, RemoteRef, StubObject, WindowProperty, WmError, WmResult};

use super::adapter::WindowAdapter;
use super::category::ListenerList;
use super::color::parse_argb;
use super::move_drag::{DragHotZone, PointerAction, PointerEvent};
use super::registry::WindowRegistry;

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

pub trait WindowChangeListener: Send + Sync {
    fn on_size_change(&self, rect: Rect, reason: WindowSizeChangeReason);
    fn on_mode_change(&self, mode: WindowMode);
}

pub trait AvoidAreaChangedListener: Send + Sync {
    fn on_avoid_area_changed(&self, area: AvoidArea, area_type: AvoidAreaType);
}

/// Lifecycle notifications. Implement only what you need.
pub trait LifecycleListener: Send + Sync {
    fn on_shown(&self) {}
    fn on_hidden(&self) {}
    fn on_focused(&self) {}
    fn on_unfocused(&self) {}
    fn on_destroyed(&self) {}
}

/// Told the window name right before the window is torn down.
pub trait WindowDestroyListener: Send + Sync {
    fn on_window_destroyed(&self, name: &str);
}

struct WindowInner {
    property: WindowProperty,
    state: WindowState,
    move_drag: MoveDragProperty,
    surface: SurfaceDescriptor,
    pixel_ratio: f32,
}

pub struct WindowImpl {
    adapter: Arc<WindowAdapter>,
    registry: Arc<WindowRegistry>,
    /// Endpoint the service pushes per-window updates to.
    callback: RemoteRef,
    inner: Mutex<WindowInner>,
    window_change_listeners: ListenerList<dyn WindowChangeListener>,
    avoid_area_listeners: ListenerList<dyn AvoidAreaChangedListener>,
    lifecycle_listeners: ListenerList<dyn LifecycleListener>,
    destroy_listeners: ListenerList<dyn WindowDestroyListener>,
}

/// Forwards service pushes to the handle without keeping it alive.
struct CallbackBridge {
    window: Weak<WindowImpl>,
}

impl WindowImpl {
    pub fn new(
        property: WindowProperty,
        adapter: Arc<WindowAdapter>,
        registry: Arc<WindowRegistry>,
    ) -> Arc<Self> {
        let surface = SurfaceDescriptor {
            surface_id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            name: property.name.clone(),
        };
        Arc::new_cyclic(|weak| {
            let bridge = Arc::new(CallbackBridge {
                window: weak.clone(),
            });
            WindowImpl {
                adapter,
                registry,
                callback: StubObject::into_remote(WindowCallbackStub::new(bridge)),
                inner: Mutex::new(WindowInner {
                    property,
                    state: WindowState::Initial,
                    move_drag: MoveDragProperty::default(),
                    surface,
                    pixel_ratio: 1.0,
                }),
                window_change_listeners: ListenerList::new(),
                avoid_area_listeners: ListenerList::new(),
                lifecycle_listeners: ListenerList::new(),
                destroy_listeners: ListenerList::new(),
            }
        })
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn id(&self) -> u32 {
        self.inner.lock().property.window_id
    }

    pub fn name(&self) -> String {
        self.inner.lock().property.name.clone()
    }

    pub fn state(&self) -> WindowState {
        self.inner.lock().state
    }

    /// Copy of the cached property.
    pub fn property(&self) -> WindowProperty {
        self.inner.lock().property.clone()
    }

    pub fn window_type(&self) -> WindowType {
        self.inner.lock().property.window_type
    }

    pub fn mode(&self) -> WindowMode {
        self.inner.lock().property.mode
    }

    /// Rect the service laid the window out at.
    pub fn rect(&self) -> Rect {
        self.inner.lock().property.window_rect
    }

    pub fn request_rect(&self) -> Rect {
        self.inner.lock().property.request_rect
    }

    pub fn brightness(&self) -> f32 {
        self.inner.lock().property.brightness
    }

    pub fn is_focusable(&self) -> bool {
        self.inner.lock().property.focusable
    }

    pub fn is_touchable(&self) -> bool {
        self.inner.lock().property.touchable
    }

    pub fn flags(&self) -> WindowFlags {
        self.inner.lock().property.flags
    }

    pub fn shadow_color(&self) -> u32 {
        self.inner.lock().property.shadow_color
    }

    pub fn move_drag(&self) -> MoveDragProperty {
        self.inner.lock().move_drag
    }

    pub fn surface(&self) -> SurfaceDescriptor {
        self.inner.lock().surface.clone()
    }

    fn is_main_floating(property: &WindowProperty) -> bool {
        property.window_type.is_main_window() && property.mode == WindowMode::Floating
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Register the window with the service under `parent_id`, or
    /// `INVALID_WINDOW_ID` for a top-level window.
    pub fn create(self: &Arc<Self>, parent_id: u32) -> WmResult<()> {
        let (state, mut property, surface) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.clone(), inner.surface.clone())
        };
        if state != WindowState::Initial {
            warn!("window {} already created", property.name);
            return Err(WmError::InvalidWindow);
        }
        if self.registry.contains_name(&property.name) {
            error!("window name {} already in use", property.name);
            return Err(WmError::InvalidParam);
        }
        if parent_id != INVALID_WINDOW_ID && !self.registry.contains_id(parent_id) {
            error!("parent window {} not found", parent_id);
            return Err(WmError::InvalidParam);
        }
        if property.window_type.is_sub_window() && parent_id == INVALID_WINDOW_ID {
            error!("sub window {} has no parent", property.name);
            return Err(WmError::InvalidParam);
        }
        if property.window_type == WindowType::FloatCamera
            && self.registry.has_window_of_type(WindowType::FloatCamera)
        {
            error!("only one camera float window per process");
            return Err(WmError::InvalidWindow);
        }

        property.parent_id = parent_id;
        let window_id = self
            .adapter
            .create_window(&self.callback, &property, &surface, None)
            .map_err(|e| {
                error!("create window {} failed: {}", property.name, e);
                self.adapter.release_object(&self.callback);
                e
            })?;
        {
            let mut inner = self.inner.lock();
            inner.property.parent_id = parent_id;
            inner.property.window_id = window_id;
            inner.state = WindowState::Created;
        }
        self.registry.insert(&property.name, window_id, parent_id, self);
        info!("created window {} with id {}", property.name, window_id);

        if !self.avoid_area_listeners.is_empty() {
            if let Err(e) = self.adapter.update_avoid_area_listener(window_id, true) {
                warn!("window {}: avoid area listener not enabled: {}", window_id, e);
            }
        }
        Ok(())
    }

    pub fn show(&self, reason: WindowStateChangeReason, with_animation: bool) -> WmResult<()> {
        let (state, mut property) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.clone())
        };
        match state {
            WindowState::Initial | WindowState::Destroyed => return Err(WmError::InvalidWindow),
            WindowState::Shown => {
                debug!("window {} already shown", property.window_id);
                return Ok(());
            }
            WindowState::Frozen => return Err(WmError::InvalidOperation),
            _ => {}
        }
        if !property.mode_support.supports(property.mode) {
            warn!(
                "window {}: mode {:?} not in {:?}",
                property.window_id, property.mode, property.mode_support
            );
            return Err(WmError::InvalidWindowModeOrSize);
        }
        if property.window_type.is_system_window() {
            property.animation_flag = animation_flag(with_animation);
        }

        if let Err(e) = self.adapter.add_window(&property) {
            warn!("show window {} failed: {}", property.window_id, e);
            return Err(e);
        }
        {
            let mut inner = self.inner.lock();
            inner.property.animation_flag = property.animation_flag;
            inner.state = WindowState::Shown;
        }
        debug!("window {} shown ({:?})", property.window_id, reason);
        for listener in self.lifecycle_listeners.snapshot() {
            listener.on_shown();
        }
        Ok(())
    }

    pub fn hide(&self, reason: WindowStateChangeReason, with_animation: bool) -> WmResult<()> {
        let (state, property) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.clone())
        };
        match state {
            WindowState::Initial | WindowState::Destroyed => return Err(WmError::InvalidWindow),
            WindowState::Created | WindowState::Hidden => {
                debug!("window {} already hidden", property.window_id);
                return Ok(());
            }
            _ => {}
        }
        if property.window_type.is_system_window() {
            let mut updated = property.clone();
            updated.animation_flag = animation_flag(with_animation);
            match self
                .adapter
                .update_property(&updated, PropertyChangeAction::ANIMATION_FLAG)
            {
                Ok(()) | Err(WmError::DoNothing) => {
                    self.inner.lock().property.animation_flag = updated.animation_flag;
                }
                Err(e) => {
                    warn!("window {}: animation flag push failed: {}", property.window_id, e);
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.adapter.remove_window(property.window_id) {
            warn!("hide window {} failed: {}", property.window_id, e);
            return Err(e);
        }
        self.mark_hidden();
        debug!("window {} hidden ({:?})", property.window_id, reason);
        Ok(())
    }

    fn mark_hidden(&self) {
        {
            let mut inner = self.inner.lock();
            inner.state = WindowState::Hidden;
            inner.move_drag.reset();
        }
        for listener in self.lifecycle_listeners.snapshot() {
            listener.on_hidden();
        }
    }

    /// Tear the window down together with the children this process created
    /// under it. Calling again after success repeats the remote call.
    pub fn destroy(&self) -> WmResult<()> {
        let (state, name, window_id) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.name.clone(), inner.property.window_id)
        };
        if state == WindowState::Initial {
            debug!("window {} was never created", name);
            return Ok(());
        }

        if let Some(listener) = self.registry.death_listener() {
            listener.on_window_destroyed(&name);
        }
        for listener in self.destroy_listeners.snapshot() {
            listener.on_window_destroyed(&name);
        }

        if let Err(e) = self.adapter.destroy_window(window_id) {
            error!("destroy window {} failed: {}", window_id, e);
            return Err(e);
        }
        self.adapter.release_object(&self.callback);
        self.registry.remove(&name, window_id);
        for child in self.registry.children_of(window_id) {
            if let Err(e) = child.destroy() {
                warn!("destroy child {} of {} failed: {}", child.id(), window_id, e);
            }
        }
        {
            let mut inner = self.inner.lock();
            inner.state = WindowState::Destroyed;
            inner.move_drag.reset();
        }
        info!("destroyed window {} ({})", name, window_id);
        for listener in self.lifecycle_listeners.snapshot() {
            listener.on_destroyed();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Property mutations
    // ------------------------------------------------------------------

    /// Apply `change` to a copy of the property and make it authoritative:
    /// pushed and then cached when shown, cached only before that.
    fn commit(
        &self,
        action: PropertyChangeAction,
        change: impl FnOnce(&mut WindowProperty),
    ) -> WmResult<()> {
        let (state, mut updated) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.clone())
        };
        change(&mut updated);
        match state {
            WindowState::Destroyed => Err(WmError::InvalidWindow),
            WindowState::Frozen => Err(WmError::InvalidOperation),
            WindowState::Shown | WindowState::Unfrozen => {
                let result = self.adapter.update_property(&updated, action);
                match result {
                    Ok(()) | Err(WmError::DoNothing) => {
                        self.inner.lock().property.apply_changes(&updated, action);
                    }
                    Err(e) => warn!(
                        "window {}: update {:?} failed: {}",
                        updated.window_id, action, e
                    ),
                }
                result
            }
            WindowState::Initial | WindowState::Created | WindowState::Hidden => {
                self.inner.lock().property.apply_changes(&updated, action);
                Ok(())
            }
        }
    }

    pub fn set_window_mode(&self, mode: WindowMode) -> WmResult<()> {
        let support = self.inner.lock().property.mode_support;
        if !support.supports(mode) {
            warn!("mode {:?} not in {:?}", mode, support);
            return Err(WmError::InvalidWindowModeOrSize);
        }
        self.commit(PropertyChangeAction::MODE, |p| p.set_mode(mode))
    }

    pub fn set_brightness(&self, brightness: f32) -> WmResult<()> {
        let (state, window_type) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.window_type)
        };
        if !state.is_valid() {
            return Err(WmError::InvalidWindow);
        }
        if !window_type.is_main_window() {
            warn!("brightness only applies to main windows, not {:?}", window_type);
            return Err(WmError::InvalidType);
        }
        if !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&brightness)
            && brightness != UNDEFINED_BRIGHTNESS
        {
            warn!("brightness {} out of range", brightness);
            return Err(WmError::InvalidParam);
        }
        self.commit(PropertyChangeAction::BRIGHTNESS, |p| p.brightness = brightness)
    }

    fn check_input_state(&self) -> WmResult<()> {
        match self.inner.lock().state {
            WindowState::Initial | WindowState::Destroyed | WindowState::Frozen => {
                Err(WmError::InvalidWindow)
            }
            _ => Ok(()),
        }
    }

    pub fn set_focusable(&self, focusable: bool) -> WmResult<()> {
        self.check_input_state()?;
        self.commit(PropertyChangeAction::FOCUSABLE, |p| p.focusable = focusable)
    }

    pub fn set_touchable(&self, touchable: bool) -> WmResult<()> {
        self.check_input_state()?;
        self.commit(PropertyChangeAction::TOUCHABLE, |p| p.touchable = touchable)
    }

    pub fn set_window_flags(&self, flags: WindowFlags) -> WmResult<()> {
        self.commit(PropertyChangeAction::FLAGS, |p| p.flags = flags)
    }

    pub fn add_window_flag(&self, flag: WindowFlags) -> WmResult<()> {
        let flags = self.flags() | flag;
        self.set_window_flags(flags)
    }

    pub fn remove_window_flag(&self, flag: WindowFlags) -> WmResult<()> {
        let flags = self.flags() - flag;
        self.set_window_flags(flags)
    }

    fn check_movable(&self) -> WmResult<()> {
        let inner = self.inner.lock();
        if inner.state == WindowState::Shown && inner.property.mode != WindowMode::Floating {
            warn!(
                "window {} is {:?}, only floating windows move while shown",
                inner.property.window_id, inner.property.mode
            );
            return Err(WmError::InvalidOperation);
        }
        Ok(())
    }

    pub fn move_to(&self, x: i32, y: i32) -> WmResult<()> {
        self.check_movable()?;
        self.commit(PropertyChangeAction::RECT, |p| {
            p.request_rect.x = x;
            p.request_rect.y = y;
            p.size_change_reason = WindowSizeChangeReason::Move;
        })
    }

    pub fn resize(&self, width: u32, height: u32) -> WmResult<()> {
        self.check_movable()?;
        self.commit(PropertyChangeAction::RECT, |p| {
            p.request_rect.width = width;
            p.request_rect.height = height;
            p.size_change_reason = WindowSizeChangeReason::Resize;
        })
    }

    pub fn set_touch_hot_areas(&self, areas: Vec<Rect>) -> WmResult<()> {
        self.commit(PropertyChangeAction::TOUCH_HOT_AREA, |p| p.touch_hot_areas = areas)
    }

    pub fn set_transform(&self, transform: Transform) -> WmResult<()> {
        self.commit(PropertyChangeAction::TRANSFORM, |p| p.transform = transform)
    }

    pub fn set_privacy_mode(&self, enabled: bool) -> WmResult<()> {
        self.commit(PropertyChangeAction::PRIVACY_MODE, |p| p.privacy_mode = enabled)
    }

    pub fn set_keep_screen_on(&self, keep: bool) -> WmResult<()> {
        self.commit(PropertyChangeAction::KEEP_SCREEN_ON, |p| p.keep_screen_on = keep)
    }

    pub fn set_turn_screen_on(&self, turn_on: bool) -> WmResult<()> {
        self.commit(PropertyChangeAction::TURN_SCREEN_ON, |p| p.turn_screen_on = turn_on)
    }

    pub fn set_calling_window(&self, window_id: u32) -> WmResult<()> {
        self.commit(PropertyChangeAction::CALLING_WINDOW, |p| p.calling_window = window_id)
    }

    pub fn set_requested_orientation(&self, orientation: Orientation) -> WmResult<()> {
        self.commit(PropertyChangeAction::ORIENTATION, |p| {
            p.requested_orientation = orientation
        })
    }

    /// `bar` must be the status bar or the navigation bar.
    pub fn set_system_bar_property(
        &self,
        bar: WindowType,
        property: SystemBarProperty,
    ) -> WmResult<()> {
        match bar {
            WindowType::StatusBar => {
                self.commit(PropertyChangeAction::OTHER_PROPS, |p| p.status_bar = property)
            }
            WindowType::NavigationBar => {
                self.commit(PropertyChangeAction::OTHER_PROPS, |p| p.navigation_bar = property)
            }
            other => {
                warn!("{:?} is not a system bar", other);
                Err(WmError::InvalidParam)
            }
        }
    }

    pub fn set_mode_support_info(&self, support: ModeSupport) -> WmResult<()> {
        self.commit(PropertyChangeAction::MODE_SUPPORT_INFO, |p| {
            p.mode_support = support;
            p.request_mode_support = support;
        })
    }

    // ------------------------------------------------------------------
    // Render parameters (client-local)
    // ------------------------------------------------------------------

    fn set_local(&self, change: impl FnOnce(&mut WindowProperty)) -> WmResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == WindowState::Destroyed {
            return Err(WmError::InvalidWindow);
        }
        change(&mut inner.property);
        Ok(())
    }

    pub fn set_corner_radius(&self, radius: f32) -> WmResult<()> {
        if radius.is_nan() || radius < 0.0 {
            return Err(WmError::InvalidParam);
        }
        self.set_local(|p| p.corner_radius = radius)
    }

    pub fn set_shadow_radius(&self, radius: f32) -> WmResult<()> {
        if radius.is_nan() || radius < 0.0 {
            return Err(WmError::InvalidParam);
        }
        self.set_local(|p| p.shadow_radius = radius)
    }

    pub fn set_shadow_color(&self, color: &str) -> WmResult<()> {
        let Some(argb) = parse_argb(color) else {
            warn!("invalid shadow color {:?}", color);
            return Err(WmError::InvalidParam);
        };
        self.set_local(|p| p.shadow_color = argb)
    }

    pub fn set_shadow_offset(&self, offset_x: f32, offset_y: f32) -> WmResult<()> {
        self.set_local(|p| {
            p.shadow_offset_x = offset_x;
            p.shadow_offset_y = offset_y;
        })
    }

    pub fn set_alpha(&self, alpha: f32) -> WmResult<()> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(WmError::InvalidParam);
        }
        self.set_local(|p| p.alpha = alpha)
    }

    pub fn set_color_space(&self, color_space: ColorSpace) -> WmResult<()> {
        self.set_local(|p| p.color_space = color_space)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn request_focus(&self) -> WmResult<()> {
        let (state, window_id) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.window_id)
        };
        if !state.is_valid() {
            return Err(WmError::InvalidWindow);
        }
        self.adapter.request_focus(window_id)
    }

    pub fn get_avoid_area_by_type(&self, area_type: AvoidAreaType) -> AvoidArea {
        let (state, window_id) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.window_id)
        };
        if !state.is_valid() {
            return AvoidArea::default();
        }
        self.adapter.get_avoid_area_by_type(window_id, area_type)
    }

    pub fn get_snapshot(&self) -> Option<Snapshot> {
        let (state, window_id) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.window_id)
        };
        if !state.is_valid() {
            return None;
        }
        self.adapter.get_snapshot(window_id)
    }

    /// Top-most shown window of this window's app, if this process created it.
    pub fn get_top_window(&self) -> Option<Arc<WindowImpl>> {
        let main_id = {
            let inner = self.inner.lock();
            if !inner.state.is_valid() {
                return None;
            }
            if inner.property.window_type.is_main_window() {
                inner.property.window_id
            } else {
                inner.property.parent_id
            }
        };
        match self.adapter.get_top_window_id(main_id) {
            Ok(top_id) => self.registry.find_by_id(top_id),
            Err(e) => {
                warn!("top window of {} unavailable: {}", main_id, e);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn register_window_change_listener(&self, listener: Arc<dyn WindowChangeListener>) -> bool {
        if self.window_change_listeners.add(listener).is_none() {
            debug!("window change listener already registered");
        }
        true
    }

    pub fn unregister_window_change_listener(&self, listener: &Arc<dyn WindowChangeListener>) -> bool {
        self.window_change_listeners.remove(listener);
        true
    }

    pub fn register_avoid_area_listener(&self, listener: Arc<dyn AvoidAreaChangedListener>) -> bool {
        if self.avoid_area_listeners.add(listener) == Some(1) {
            self.toggle_avoid_area_listener(true);
        }
        true
    }

    pub fn unregister_avoid_area_listener(&self, listener: &Arc<dyn AvoidAreaChangedListener>) -> bool {
        if self.avoid_area_listeners.remove(listener) == Some(0) {
            self.toggle_avoid_area_listener(false);
        }
        true
    }

    fn toggle_avoid_area_listener(&self, have_listener: bool) {
        let (state, window_id) = {
            let inner = self.inner.lock();
            (inner.state, inner.property.window_id)
        };
        // Before create the flag is sent once the id is known.
        if !state.is_valid() {
            return;
        }
        if let Err(e) = self.adapter.update_avoid_area_listener(window_id, have_listener) {
            warn!("window {}: avoid area listener toggle failed: {}", window_id, e);
        }
    }

    pub fn register_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) -> bool {
        self.lifecycle_listeners.add(listener);
        true
    }

    pub fn unregister_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) -> bool {
        self.lifecycle_listeners.remove(listener);
        true
    }

    pub fn register_destroy_listener(&self, listener: Arc<dyn WindowDestroyListener>) -> bool {
        self.destroy_listeners.add(listener);
        true
    }

    pub fn unregister_destroy_listener(&self, listener: &Arc<dyn WindowDestroyListener>) -> bool {
        self.destroy_listeners.remove(listener);
        true
    }

    // ------------------------------------------------------------------
    // Move and drag
    // ------------------------------------------------------------------

    /// Scale applied to the drag border widths. Non-finite or non-positive
    /// ratios are ignored.
    pub fn set_virtual_pixel_ratio(&self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.inner.lock().pixel_ratio = ratio;
        }
    }

    /// Feed a pointer event. Returns true when the window consumed it as part
    /// of a move or drag gesture.
    pub fn consume_pointer_event(&self, event: &PointerEvent) -> bool {
        let (state, window_id, gesture_window) = {
            let inner = self.inner.lock();
            let p = &inner.property;
            (
                inner.state,
                p.window_id,
                Self::is_main_floating(p) || p.window_type == WindowType::DockSlice,
            )
        };
        if !state.is_valid() {
            return false;
        }
        match event.action {
            PointerAction::Down => {
                if let Err(e) = self.adapter.process_point_down(window_id, true) {
                    warn!("window {}: point down not delivered: {}", window_id, e);
                }
                if gesture_window {
                    self.ready_to_move_or_drag_window(event);
                }
            }
            PointerAction::Up | PointerAction::Cancel => self.end_move_or_drag_window(
                event.display_x,
                event.display_y,
                event.pointer_id,
                event.source_type,
            ),
            PointerAction::Move => {}
        }
        self.inner.lock().move_drag.is_gesture_active()
    }

    /// Record a pointer-down and start a drag if it landed on the border.
    pub fn ready_to_move_or_drag_window(&self, event: &PointerEvent) {
        let notify = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.move_drag.point_event_started {
                return;
            }
            let rect = inner.property.window_rect;
            let pixel_ratio = inner.pixel_ratio;
            let window_type = inner.property.window_type;
            let md = &mut inner.move_drag;
            md.start_rect = rect;
            md.start_point_x = event.display_x;
            md.start_point_y = event.display_y;
            md.pointer_id = event.pointer_id;
            md.source_type = event.source_type;
            md.target_display_id = event.display_id;
            md.point_event_started = true;

            let started = if window_type == WindowType::DockSlice {
                md.start_move = true;
                true
            } else if let Some(drag_type) =
                DragHotZone::new(rect, pixel_ratio).drag_type_at(event.display_x, event.display_y)
            {
                md.start_drag = true;
                md.drag_type = Some(drag_type);
                inner.property.drag_type = drag_type;
                inner.property.origin_rect = rect;
                true
            } else {
                false
            };
            started.then(|| (inner.property.clone(), inner.move_drag))
        };
        if let Some((property, move_drag)) = notify {
            self.notify_ready_to_move_or_drag(&property, &move_drag);
        }
    }

    /// Start moving after a pointer-down on a main floating window.
    pub fn start_move(&self) {
        let (property, move_drag) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if !Self::is_main_floating(&inner.property) {
                warn!("window {} can not be moved", inner.property.window_id);
                return;
            }
            let md = &mut inner.move_drag;
            if !md.point_event_started || md.start_drag {
                warn!("no pointer down recorded, or already dragging");
                return;
            }
            md.start_move = true;
            (inner.property.clone(), inner.move_drag)
        };
        self.notify_ready_to_move_or_drag(&property, &move_drag);
        debug!("window {} start move", property.window_id);
    }

    fn notify_ready_to_move_or_drag(&self, property: &WindowProperty, move_drag: &MoveDragProperty) {
        if let Err(e) =
            self.adapter
                .notify_server_ready_to_move_or_drag(property.window_id, property, move_drag)
        {
            warn!("window {}: move/drag start not delivered: {}", property.window_id, e);
        }
    }

    /// Pointer released at (`x`, `y`). The service is always told; a move by
    /// the same pointer may snap into another mode through the hot zones.
    pub fn end_move_or_drag_window(&self, x: i32, y: i32, pointer_id: i32, source_type: i32) {
        let (window_id, was_moving) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let window_id = inner.property.window_id;
            let md = &mut inner.move_drag;
            if md.pointer_id == pointer_id && md.source_type == source_type && md.point_event_started {
                let was_moving = md.start_move;
                md.reset();
                (window_id, was_moving)
            } else {
                (window_id, false)
            }
        };
        if let Err(e) = self.adapter.process_point_up(window_id) {
            warn!("window {}: point up not delivered: {}", window_id, e);
        }
        if was_moving {
            self.handle_mode_change_hot_zones(x, y);
        }
    }

    fn handle_mode_change_hot_zones(&self, x: i32, y: i32) {
        let (display_id, window_id) = {
            let inner = self.inner.lock();
            if !Self::is_main_floating(&inner.property) {
                return;
            }
            (inner.property.display_id, inner.property.window_id)
        };
        let zones = match self.adapter.get_mode_change_hot_zones(display_id) {
            Ok(zones) => zones,
            Err(e) => {
                debug!("no hot zones for display {}: {}", display_id, e);
                return;
            }
        };
        if let Some(mode) = zones.mode_at(x, y) {
            debug!("window {} released in {:?} hot zone", window_id, mode);
            if let Err(e) = self.set_window_mode(mode) {
                warn!("window {}: snap to {:?} failed: {}", window_id, mode, e);
            }
        }
    }
}

fn animation_flag(with_animation: bool) -> AnimationFlag {
    if with_animation {
        AnimationFlag::Default
    } else {
        AnimationFlag::None
    }
}

impl WindowCallback for WindowImpl {
    fn update_window_rect(&self, rect: Rect, deco_status: bool, reason: WindowSizeChangeReason) {
        {
            let mut inner = self.inner.lock();
            if inner.state == WindowState::Destroyed {
                return;
            }
            inner.property.window_rect = rect;
            inner.property.deco_status = deco_status;
        }
        for listener in self.window_change_listeners.snapshot() {
            listener.on_size_change(rect, reason);
        }
    }

    fn update_window_mode(&self, mode: WindowMode) {
        {
            let mut inner = self.inner.lock();
            if inner.state == WindowState::Destroyed {
                return;
            }
            inner.property.set_mode(mode);
        }
        for listener in self.window_change_listeners.snapshot() {
            listener.on_mode_change(mode);
        }
    }

    fn update_window_mode_support(&self, support: ModeSupport) {
        self.inner.lock().property.mode_support = support;
    }

    fn update_focus_status(&self, focused: bool) {
        for listener in self.lifecycle_listeners.snapshot() {
            if focused {
                listener.on_focused();
            } else {
                listener.on_unfocused();
            }
        }
    }

    fn update_avoid_area(&self, area: AvoidArea, area_type: AvoidAreaType) {
        for listener in self.avoid_area_listeners.snapshot() {
            listener.on_avoid_area_changed(area, area_type);
        }
    }

    fn update_window_state(&self, state: WindowState) {
        let current = self.state();
        if !current.is_valid() {
            return;
        }
        match state {
            WindowState::Frozen => self.inner.lock().state = WindowState::Frozen,
            WindowState::Unfrozen | WindowState::Shown => {
                self.inner.lock().state = WindowState::Shown;
                if current != WindowState::Shown && current != WindowState::Frozen {
                    for listener in self.lifecycle_listeners.snapshot() {
                        listener.on_shown();
                    }
                }
            }
            WindowState::Hidden => {
                if matches!(current, WindowState::Shown | WindowState::Unfrozen) {
                    self.mark_hidden();
                }
            }
            other => debug!("ignoring pushed state {:?}", other),
        }
    }
}

impl WindowCallback for CallbackBridge {
    fn update_window_rect(&self, rect: Rect, deco_status: bool, reason: WindowSizeChangeReason) {
        if let Some(window) = self.window.upgrade() {
            window.update_window_rect(rect, deco_status, reason);
        }
    }

    fn update_window_mode(&self, mode: WindowMode) {
        if let Some(window) = self.window.upgrade() {
            window.update_window_mode(mode);
        }
    }

    fn update_window_mode_support(&self, support: ModeSupport) {
        if let Some(window) = self.window.upgrade() {
            window.update_window_mode_support(support);
        }
    }

    fn update_focus_status(&self, focused: bool) {
        if let Some(window) = self.window.upgrade() {
            window.update_focus_status(focused);
        }
    }

    fn update_avoid_area(&self, area: AvoidArea, area_type: AvoidAreaType) {
        if let Some(window) = self.window.upgrade() {
            window.update_avoid_area(area, area_type);
        }
    }

    fn update_window_state(&self, state: WindowState) {
        if let Some(window) = self.window.upgrade() {
            window.update_window_state(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Events, Harness};
    use wmlink_ipc::codes::WindowManagerCode;
    use wmlink_ipc::types::{DragType, DEFAULT_DISPLAY_ID};

    const NORMAL: WindowStateChangeReason = WindowStateChangeReason::Normal;

    fn pointer(action: PointerAction, x: i32, y: i32) -> PointerEvent {
        PointerEvent {
            action,
            pointer_id: 1,
            source_type: 1,
            display_id: DEFAULT_DISPLAY_ID,
            display_x: x,
            display_y: y,
        }
    }

    #[test]
    fn test_lifecycle_create_show_hide_destroy() {
        let h = Harness::new();
        let window = h.window("W", WindowType::AppMainWindow);
        window.create(INVALID_WINDOW_ID).unwrap();
        assert_eq!(window.state(), WindowState::Created);
        assert_ne!(window.id(), INVALID_WINDOW_ID);

        window.show(NORMAL, false).unwrap();
        assert_eq!(window.state(), WindowState::Shown);
        assert!(h.server.is_shown(window.id()));

        window.hide(NORMAL, false).unwrap();
        assert_eq!(window.state(), WindowState::Hidden);
        assert!(!h.server.is_shown(window.id()));

        window.destroy().unwrap();
        assert_eq!(window.state(), WindowState::Destroyed);
        assert_eq!(window.show(NORMAL, false), Err(WmError::InvalidWindow));
        assert_eq!(h.server.window_count(), 0);
    }

    #[test]
    fn test_invalid_states_make_no_remote_calls() {
        let h = Harness::new();
        let window = h.window("gated", WindowType::AppMainWindow);

        assert_eq!(window.show(NORMAL, false), Err(WmError::InvalidWindow));
        assert_eq!(window.hide(NORMAL, false), Err(WmError::InvalidWindow));
        assert_eq!(window.set_focusable(false), Err(WmError::InvalidWindow));
        assert_eq!(window.set_touchable(false), Err(WmError::InvalidWindow));
        assert_eq!(window.request_focus(), Err(WmError::InvalidWindow));
        assert_eq!(h.wire.total(), 0);

        window.create(INVALID_WINDOW_ID).unwrap();
        window.destroy().unwrap();
        let before = h.wire.total();
        assert_eq!(window.show(NORMAL, false), Err(WmError::InvalidWindow));
        assert_eq!(window.hide(NORMAL, false), Err(WmError::InvalidWindow));
        assert_eq!(window.set_focusable(false), Err(WmError::InvalidWindow));
        assert_eq!(window.set_touchable(false), Err(WmError::InvalidWindow));
        assert_eq!(window.request_focus(), Err(WmError::InvalidWindow));
        assert_eq!(h.wire.total(), before);
    }

    #[test]
    fn test_rejected_update_leaves_cache_untouched() {
        let h = Harness::new();
        let window = h.floating("cached", Rect::new(200, 150, 800, 600));
        let before = window.property();

        h.wire.fail(WindowManagerCode::UpdateProperty, WmError::InvalidOperation);
        assert_eq!(window.move_to(10, 10), Err(WmError::InvalidOperation));
        assert_eq!(window.set_focusable(false), Err(WmError::InvalidOperation));
        assert_eq!(
            window.add_window_flag(WindowFlags::SHOW_WHEN_LOCKED),
            Err(WmError::InvalidOperation)
        );

        h.wire.fail(WindowManagerCode::UpdateProperty, WmError::IpcFailed);
        assert_eq!(window.set_brightness(0.5), Err(WmError::IpcFailed));
        assert_eq!(window.property(), before);

        h.wire.heal(WindowManagerCode::UpdateProperty);
        window.set_brightness(0.5).unwrap();
        assert_eq!(window.brightness(), 0.5);
    }

    #[test]
    fn test_unsupported_mode_rejected_before_any_transaction() {
        let h = Harness::new();
        let window = h.window("no-split", WindowType::AppMainWindow);
        window.create(INVALID_WINDOW_ID).unwrap();
        window
            .set_mode_support_info(ModeSupport::FULLSCREEN | ModeSupport::FLOATING)
            .unwrap();
        window.show(NORMAL, false).unwrap();
        let mode = window.mode();
        let updates = h.wire.count(WindowManagerCode::UpdateProperty);

        assert_eq!(
            window.set_window_mode(WindowMode::SplitPrimary),
            Err(WmError::InvalidWindowModeOrSize)
        );
        assert_eq!(window.mode(), mode);
        assert_eq!(h.wire.count(WindowManagerCode::UpdateProperty), updates);
    }

    #[test]
    fn test_brightness_range_on_shown_main_window() {
        let h = Harness::new();
        let window = h.window("bright", WindowType::AppMainWindow);
        window.create(INVALID_WINDOW_ID).unwrap();
        window.show(NORMAL, false).unwrap();

        assert_eq!(window.set_brightness(2.0), Err(WmError::InvalidParam));
        window.set_brightness(1.0).unwrap();
        assert_eq!(window.brightness(), 1.0);
        assert_eq!(h.server.property_of(window.id()).unwrap().brightness, 1.0);

        let bar = h.window("bar", WindowType::StatusBar);
        bar.create(INVALID_WINDOW_ID).unwrap();
        assert_eq!(bar.set_brightness(0.5), Err(WmError::InvalidType));
    }

    #[test]
    fn test_shadow_color_accepts_only_hex_rgb_and_argb() {
        let h = Harness::new();
        let window = h.window("shadow", WindowType::AppMainWindow);

        window.set_shadow_color("#FF00ff").unwrap();
        assert_eq!(window.shadow_color(), 0xFFFF_00FF);
        window.set_shadow_color("#80a0b0c0").unwrap();
        assert_eq!(window.shadow_color(), 0x80A0_B0C0);

        for bad in ["FF00FF", "#FF00F", "#FF00FF0", "#GG0000", "#", "", "##FF00FF", "#FF00FF "] {
            assert_eq!(window.set_shadow_color(bad), Err(WmError::InvalidParam), "{:?}", bad);
        }
        assert_eq!(window.shadow_color(), 0x80A0_B0C0);
    }

    #[test]
    fn test_local_render_params_validated() {
        let h = Harness::new();
        let window = h.window("render", WindowType::AppMainWindow);
        assert_eq!(window.set_alpha(1.5), Err(WmError::InvalidParam));
        assert_eq!(window.set_corner_radius(-1.0), Err(WmError::InvalidParam));
        assert_eq!(window.set_shadow_radius(f32::NAN), Err(WmError::InvalidParam));
        window.set_alpha(0.25).unwrap();
        window.set_corner_radius(8.0).unwrap();
        assert_eq!(window.property().alpha, 0.25);
        assert_eq!(h.wire.total(), 0);
    }

    #[test]
    fn test_create_rejects_duplicates_and_orphans() {
        let h = Harness::new();
        let first = h.window("dup", WindowType::AppMainWindow);
        first.create(INVALID_WINDOW_ID).unwrap();

        let second = h.window("dup", WindowType::AppMainWindow);
        assert_eq!(second.create(INVALID_WINDOW_ID), Err(WmError::InvalidParam));
        assert_eq!(first.create(INVALID_WINDOW_ID), Err(WmError::InvalidWindow));

        let orphan = h.window("orphan", WindowType::AppSubWindow);
        assert_eq!(orphan.create(INVALID_WINDOW_ID), Err(WmError::InvalidParam));
        assert_eq!(orphan.create(4242), Err(WmError::InvalidParam));

        let camera = h.window("camera", WindowType::FloatCamera);
        camera.create(INVALID_WINDOW_ID).unwrap();
        let another = h.window("camera-2", WindowType::FloatCamera);
        assert_eq!(another.create(INVALID_WINDOW_ID), Err(WmError::InvalidWindow));
        assert_eq!(h.wire.count(WindowManagerCode::CreateWindow), 2);
    }

    #[test]
    fn test_failed_create_stays_initial() {
        let h = Harness::new();
        h.wire.fail(WindowManagerCode::CreateWindow, WmError::NoMem);
        let window = h.window("refused", WindowType::AppMainWindow);
        assert_eq!(window.create(INVALID_WINDOW_ID), Err(WmError::NoMem));
        assert_eq!(window.state(), WindowState::Initial);
        assert!(!h.registry.contains_name("refused"));
    }

    #[test]
    fn test_layout_and_move_pushes_reach_listeners() {
        let h = Harness::new();
        let events = Events::new();
        let mut property = WindowProperty::new("mover", WindowType::AppMainWindow);
        property.set_mode(WindowMode::Floating);
        property.request_rect = Rect::new(200, 150, 800, 600);
        let window = WindowImpl::new(property, Arc::clone(&h.adapter), Arc::clone(&h.registry));
        window.register_window_change_listener(events.clone());
        window.create(INVALID_WINDOW_ID).unwrap();
        window.show(NORMAL, false).unwrap();

        assert_eq!(window.rect(), Rect::new(200, 150, 800, 600));
        assert_eq!(events.lines(), vec!["size 200 150 800 600 Undefined".to_string()]);

        events.clear();
        window.move_to(300, 200).unwrap();
        assert_eq!(window.rect(), Rect::new(300, 200, 800, 600));
        assert_eq!(events.lines(), vec!["size 300 200 800 600 Move".to_string()]);
        assert_eq!(
            h.server.property_of(window.id()).unwrap().window_rect,
            Rect::new(300, 200, 800, 600)
        );

        assert_eq!(window.resize(10, 10), Err(WmError::InvalidWindowModeOrSize));
        assert_eq!(window.request_rect().width, 800);
    }

    #[test]
    fn test_fullscreen_window_does_not_move_while_shown() {
        let h = Harness::new();
        let window = h.window("fixed", WindowType::AppMainWindow);
        window.create(INVALID_WINDOW_ID).unwrap();
        window.show(NORMAL, false).unwrap();
        assert_eq!(window.mode(), WindowMode::Fullscreen);
        assert_eq!(window.move_to(5, 5), Err(WmError::InvalidOperation));
    }

    #[test]
    fn test_lifecycle_listener_sees_focus_and_visibility() {
        let h = Harness::new();
        let events = Events::new();
        let window = h.window("life", WindowType::AppMainWindow);
        window.register_lifecycle_listener(events.clone());
        window.create(INVALID_WINDOW_ID).unwrap();
        window.show(NORMAL, false).unwrap();
        assert_eq!(events.count("shown"), 1);
        assert_eq!(events.count("focused"), 1);

        window.hide(NORMAL, false).unwrap();
        assert_eq!(events.count("unfocused"), 1);
        assert_eq!(events.count("hidden"), 1);

        let listener: Arc<dyn LifecycleListener> = events.clone();
        window.unregister_lifecycle_listener(&listener);
        window.show(NORMAL, false).unwrap();
        assert_eq!(events.count("shown"), 1);
    }

    #[test]
    fn test_avoid_area_listener_toggles_service_flag() {
        let h = Harness::new();
        let events = Events::new();
        let window = h.window("avoid", WindowType::AppMainWindow);

        // Before create nothing is sent; create sends the flag itself.
        window.register_avoid_area_listener(events.clone());
        assert_eq!(h.wire.count(WindowManagerCode::UpdateAvoidAreaListener), 0);
        window.create(INVALID_WINDOW_ID).unwrap();
        assert_eq!(h.wire.count(WindowManagerCode::UpdateAvoidAreaListener), 1);

        let second = Events::new();
        window.register_avoid_area_listener(second.clone());
        assert_eq!(h.wire.count(WindowManagerCode::UpdateAvoidAreaListener), 1);

        window.show(NORMAL, false).unwrap();
        assert_eq!(events.count("avoid System"), 1);
        assert_eq!(second.count("avoid System"), 1);

        let first: Arc<dyn AvoidAreaChangedListener> = events.clone();
        let other: Arc<dyn AvoidAreaChangedListener> = second.clone();
        window.unregister_avoid_area_listener(&first);
        assert_eq!(h.wire.count(WindowManagerCode::UpdateAvoidAreaListener), 1);
        window.unregister_avoid_area_listener(&other);
        assert_eq!(h.wire.count(WindowManagerCode::UpdateAvoidAreaListener), 2);

        let area = window.get_avoid_area_by_type(AvoidAreaType::System);
        assert_eq!(area.top, Rect::new(0, 0, 1920, 48));
    }

    #[test]
    fn test_destroy_takes_children_and_tells_listeners() {
        let h = Harness::new();
        let events = Events::new();
        let parent = h.window("parent", WindowType::AppMainWindow);
        parent.create(INVALID_WINDOW_ID).unwrap();
        let child = h.window("child", WindowType::AppSubWindow);
        child.create(parent.id()).unwrap();
        parent.register_destroy_listener(events.clone());
        h.registry.set_death_listener(Some(events.clone()));

        parent.destroy().unwrap();
        assert_eq!(child.state(), WindowState::Destroyed);
        assert_eq!(h.server.window_count(), 0);
        assert!(h.registry.is_empty());
        assert_eq!(events.count("dying parent"), 2);
        assert_eq!(events.count("dying child"), 1);
    }

    #[test]
    fn test_top_window_is_shown_child() {
        let h = Harness::new();
        let main = h.window("main", WindowType::AppMainWindow);
        main.create(INVALID_WINDOW_ID).unwrap();
        main.show(NORMAL, false).unwrap();
        assert_eq!(main.get_top_window().unwrap().id(), main.id());

        let child = h.window("popup", WindowType::AppSubWindow);
        child.create(main.id()).unwrap();
        child.show(NORMAL, false).unwrap();
        assert_eq!(main.get_top_window().unwrap().id(), child.id());
        assert_eq!(child.get_top_window().unwrap().id(), child.id());
    }

    #[test]
    fn test_border_press_starts_drag_and_release_ends_it() {
        let h = Harness::new();
        let events = Events::new();
        let window = h.floating("drag", Rect::new(200, 150, 800, 600));
        window.register_window_change_listener(events.clone());

        assert!(window.consume_pointer_event(&pointer(PointerAction::Down, 202, 400)));
        let md = window.move_drag();
        assert!(md.start_drag);
        assert_eq!(md.drag_type, Some(DragType::LeftOrRight));
        assert_eq!(window.property().drag_type, DragType::LeftOrRight);
        assert_eq!(h.wire.count(WindowManagerCode::NotifyReadyMoveOrDrag), 1);

        assert!(!window.consume_pointer_event(&pointer(PointerAction::Up, 150, 400)));
        assert!(!window.move_drag().point_event_started);
        assert_eq!(h.wire.count(WindowManagerCode::ProcessPointUp), 1);
        assert_eq!(events.count("size 200 150 800 600 DragEnd"), 1);
    }

    #[test]
    fn test_pointer_down_on_window_at_coordinate_limit() {
        let h = Harness::new();
        let window = h.floating("edge", Rect::new(i32::MAX - 100, 0, 800, 600));
        assert_eq!(window.rect().x, i32::MAX - 100);

        assert!(!window.consume_pointer_event(&pointer(PointerAction::Down, i32::MAX - 50, 300)));
        assert!(window.move_drag().point_event_started);
        window.consume_pointer_event(&pointer(PointerAction::Up, i32::MAX - 50, 300));

        assert!(window.consume_pointer_event(&pointer(PointerAction::Down, i32::MAX - 98, 300)));
        assert_eq!(window.move_drag().drag_type, Some(DragType::LeftOrRight));
    }

    #[test]
    fn test_extreme_pixel_ratio_keeps_hit_test_sane() {
        let h = Harness::new();
        let window = h.floating("ratio", Rect::new(200, 150, 800, 600));
        window.set_virtual_pixel_ratio(f32::NAN);
        window.set_virtual_pixel_ratio(f32::INFINITY);
        window.set_virtual_pixel_ratio(-2.0);
        assert!(!window.consume_pointer_event(&pointer(PointerAction::Down, 500, 400)));
        window.consume_pointer_event(&pointer(PointerAction::Up, 500, 400));

        // the scaled border swallows the whole window
        window.set_virtual_pixel_ratio(1.0e9);
        assert!(window.consume_pointer_event(&pointer(PointerAction::Down, 500, 400)));
        assert!(window.move_drag().start_drag);
    }

    #[test]
    fn test_move_released_in_hot_zone_snaps_to_fullscreen() {
        let h = Harness::new();
        let window = h.floating("snap", Rect::new(200, 150, 800, 600));

        assert!(!window.consume_pointer_event(&pointer(PointerAction::Down, 500, 400)));
        assert!(window.move_drag().point_event_started);
        assert_eq!(h.wire.count(WindowManagerCode::NotifyReadyMoveOrDrag), 0);

        window.start_move();
        assert!(window.move_drag().start_move);
        assert_eq!(h.wire.count(WindowManagerCode::NotifyReadyMoveOrDrag), 1);

        window.consume_pointer_event(&pointer(PointerAction::Up, 960, 10));
        assert_eq!(window.mode(), WindowMode::Fullscreen);
        assert_eq!(window.rect(), Rect::new(0, 0, 1920, 1080));
        assert_eq!(h.server.property_of(window.id()).unwrap().mode, WindowMode::Fullscreen);
    }

    #[test]
    fn test_release_by_other_pointer_keeps_gesture() {
        let h = Harness::new();
        let window = h.floating("pointers", Rect::new(200, 150, 800, 600));
        window.consume_pointer_event(&pointer(PointerAction::Down, 500, 400));
        window.start_move();

        window.end_move_or_drag_window(960, 10, 2, 1);
        assert!(window.move_drag().start_move);
        assert_eq!(window.mode(), WindowMode::Floating);
        assert_eq!(h.wire.count(WindowManagerCode::ProcessPointUp), 1);
    }

    #[test]
    fn test_frozen_window_refuses_updates() {
        let h = Harness::new();
        let window = h.floating("frozen", Rect::new(200, 150, 800, 600));

        h.server.freeze_app_windows(true);
        assert_eq!(window.state(), WindowState::Frozen);
        assert_eq!(window.move_to(0, 0), Err(WmError::InvalidOperation));
        assert_eq!(window.set_focusable(false), Err(WmError::InvalidWindow));
        assert_eq!(window.show(NORMAL, false), Err(WmError::InvalidOperation));

        h.server.freeze_app_windows(false);
        assert_eq!(window.state(), WindowState::Shown);
        window.move_to(0, 100).unwrap();
    }

    #[test]
    fn test_minimize_and_toggle_follow_service_pushes() {
        let h = Harness::new();
        let a = h.floating("a", Rect::new(0, 100, 640, 480));
        let b = h.floating("b", Rect::new(700, 100, 640, 480));

        h.manager.toggle_shown_state_for_all_app_windows().unwrap();
        assert_eq!(a.state(), WindowState::Hidden);
        assert_eq!(b.state(), WindowState::Hidden);

        h.manager.toggle_shown_state_for_all_app_windows().unwrap();
        assert_eq!(a.state(), WindowState::Shown);
        assert!(h.server.is_shown(b.id()));

        h.manager.minimize_all_app_windows(DEFAULT_DISPLAY_ID).unwrap();
        assert_eq!(a.state(), WindowState::Hidden);
        assert_eq!(b.state(), WindowState::Hidden);
        assert!(h.server.z_order().is_empty());
    }

    #[test]
    fn test_system_window_hide_sends_animation_flag() {
        let h = Harness::new();
        let bar = h.window("status", WindowType::StatusBar);
        bar.create(INVALID_WINDOW_ID).unwrap();
        bar.show(NORMAL, true).unwrap();
        assert_eq!(bar.property().animation_flag, AnimationFlag::Default);

        bar.hide(NORMAL, false).unwrap();
        assert_eq!(h.wire.count(WindowManagerCode::UpdateProperty), 1);
        assert_eq!(bar.property().animation_flag, AnimationFlag::None);

        h.wire.fail(WindowManagerCode::UpdateProperty, WmError::InvalidPermission);
        bar.show(NORMAL, true).unwrap();
        assert_eq!(bar.hide(NORMAL, true), Err(WmError::InvalidPermission));
        assert_eq!(bar.state(), WindowState::Shown);
    }
}
