//! Process-wide window manager client.
//!
//! Holds one listener category per kind of service push. A category
//! registers its notification agent with the service when its first
//! listener arrives and unregisters it when the last one leaves. Pushes are
//! fanned out to a snapshot of the listener list.

use std::sync::{Arc, Weak};

use tracing::{debug, info};
use wmlink_ipc::agent::{WindowManagerAgent, WindowManagerAgentStub};
use wmlink_ipc::info::{
    AccessibilityWindowInfo, FocusChangeInfo, SystemBarRegionTint, WindowUpdateType,
    WindowVisibilityInfo,
};
use wmlink_ipc::types::{WindowLayoutMode, WindowManagerAgentType};
use wmlink_ipc::{RemoteRef, StubObject, WmResult};

use super::adapter::WindowAdapter;
use super::category::ListenerCategory;

pub trait FocusChangedListener: Send + Sync {
    fn on_focused(&self, info: &FocusChangeInfo);
    fn on_unfocused(&self, info: &FocusChangeInfo);
}

pub trait SystemBarChangedListener: Send + Sync {
    fn on_system_bar_property_change(&self, display_id: u64, tints: &[SystemBarRegionTint]);
}

pub trait WindowUpdateListener: Send + Sync {
    fn on_window_update(&self, infos: &[Arc<AccessibilityWindowInfo>], update_type: WindowUpdateType);
}

pub trait VisibilityChangedListener: Send + Sync {
    fn on_window_visibility_changed(&self, infos: &[Arc<WindowVisibilityInfo>]);
}

pub trait CameraFloatWindowChangedListener: Send + Sync {
    fn on_camera_float_window_change(&self, access_token_id: u32, is_showing: bool);
}

/// Window manager client shared by everything in the process.
pub struct WindowManager {
    adapter: Arc<WindowAdapter>,
    weak_self: Weak<WindowManager>,
    focus: ListenerCategory<dyn FocusChangedListener>,
    system_bar: ListenerCategory<dyn SystemBarChangedListener>,
    window_update: ListenerCategory<dyn WindowUpdateListener>,
    visibility: ListenerCategory<dyn VisibilityChangedListener>,
    camera_float: ListenerCategory<dyn CameraFloatWindowChangedListener>,
}

/// Agent object handed to the service. Holds the manager weakly so a
/// registration left at the service does not keep the process state alive.
struct AgentBridge {
    manager: Weak<WindowManager>,
}

impl WindowManager {
    /// Create a new window manager client
    pub fn new(adapter: Arc<WindowAdapter>) -> Arc<Self> {
        Arc::new_cyclic(|weak| WindowManager {
            adapter,
            weak_self: weak.clone(),
            focus: ListenerCategory::new(WindowManagerAgentType::Focus),
            system_bar: ListenerCategory::new(WindowManagerAgentType::SystemBar),
            window_update: ListenerCategory::new(WindowManagerAgentType::WindowUpdate),
            visibility: ListenerCategory::new(WindowManagerAgentType::WindowVisibility),
            camera_float: ListenerCategory::new(WindowManagerAgentType::CameraFloat),
        })
    }

    pub fn adapter(&self) -> &Arc<WindowAdapter> {
        &self.adapter
    }

    fn make_agent(&self) -> RemoteRef {
        let bridge = Arc::new(AgentBridge {
            manager: self.weak_self.clone(),
        });
        StubObject::into_remote(WindowManagerAgentStub::new(bridge))
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn register_focus_changed_listener(&self, listener: Arc<dyn FocusChangedListener>) -> bool {
        self.focus
            .register(listener, &self.adapter, || self.make_agent())
    }

    pub fn unregister_focus_changed_listener(&self, listener: &Arc<dyn FocusChangedListener>) -> bool {
        self.focus.unregister(listener, &self.adapter)
    }

    pub fn register_system_bar_changed_listener(
        &self,
        listener: Arc<dyn SystemBarChangedListener>,
    ) -> bool {
        self.system_bar
            .register(listener, &self.adapter, || self.make_agent())
    }

    pub fn unregister_system_bar_changed_listener(
        &self,
        listener: &Arc<dyn SystemBarChangedListener>,
    ) -> bool {
        self.system_bar.unregister(listener, &self.adapter)
    }

    pub fn register_window_update_listener(&self, listener: Arc<dyn WindowUpdateListener>) -> bool {
        self.window_update
            .register(listener, &self.adapter, || self.make_agent())
    }

    pub fn unregister_window_update_listener(&self, listener: &Arc<dyn WindowUpdateListener>) -> bool {
        self.window_update.unregister(listener, &self.adapter)
    }

    pub fn register_visibility_changed_listener(
        &self,
        listener: Arc<dyn VisibilityChangedListener>,
    ) -> bool {
        self.visibility
            .register(listener, &self.adapter, || self.make_agent())
    }

    pub fn unregister_visibility_changed_listener(
        &self,
        listener: &Arc<dyn VisibilityChangedListener>,
    ) -> bool {
        self.visibility.unregister(listener, &self.adapter)
    }

    pub fn register_camera_float_window_changed_listener(
        &self,
        listener: Arc<dyn CameraFloatWindowChangedListener>,
    ) -> bool {
        self.camera_float
            .register(listener, &self.adapter, || self.make_agent())
    }

    pub fn unregister_camera_float_window_changed_listener(
        &self,
        listener: &Arc<dyn CameraFloatWindowChangedListener>,
    ) -> bool {
        self.camera_float.unregister(listener, &self.adapter)
    }

    /// The service went away. Agents die with it; listeners stay so the
    /// next registration brings them back under a fresh agent.
    pub fn on_remote_died(&self) {
        info!("window manager service died, dropping agents");
        self.focus.reset_agent(&self.adapter);
        self.system_bar.reset_agent(&self.adapter);
        self.window_update.reset_agent(&self.adapter);
        self.visibility.reset_agent(&self.adapter);
        self.camera_float.reset_agent(&self.adapter);
        self.adapter.reset();
    }

    /// Listener count and agent presence of one category, for diagnostics.
    pub fn category_status(&self, kind: WindowManagerAgentType) -> (usize, bool) {
        match kind {
            WindowManagerAgentType::Focus => (self.focus.listener_count(), self.focus.has_agent()),
            WindowManagerAgentType::SystemBar => {
                (self.system_bar.listener_count(), self.system_bar.has_agent())
            }
            WindowManagerAgentType::WindowUpdate => {
                (self.window_update.listener_count(), self.window_update.has_agent())
            }
            WindowManagerAgentType::WindowVisibility => {
                (self.visibility.listener_count(), self.visibility.has_agent())
            }
            WindowManagerAgentType::CameraFloat => {
                (self.camera_float.listener_count(), self.camera_float.has_agent())
            }
        }
    }

    // ------------------------------------------------------------------
    // Service-wide operations
    // ------------------------------------------------------------------

    pub fn minimize_all_app_windows(&self, display_id: u64) -> WmResult<()> {
        self.adapter.minimize_all_app_windows(display_id)
    }

    pub fn toggle_shown_state_for_all_app_windows(&self) -> WmResult<()> {
        self.adapter.toggle_shown_state_for_all_app_windows()
    }

    pub fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<()> {
        self.adapter.set_window_layout_mode(mode)
    }

    pub fn get_accessibility_window_info(&self) -> WmResult<Vec<Arc<AccessibilityWindowInfo>>> {
        self.adapter.get_accessibility_window_info()
    }

    pub fn get_visibility_window_info(&self) -> WmResult<Vec<Arc<WindowVisibilityInfo>>> {
        self.adapter.get_visibility_window_info()
    }

    pub fn set_window_animation_controller(&self, controller: &RemoteRef) -> WmResult<()> {
        self.adapter.set_window_animation_controller(controller)
    }

    // ------------------------------------------------------------------
    // Fan-out
    // ------------------------------------------------------------------

    fn update_focus_change_info(&self, info: &FocusChangeInfo, focused: bool) {
        debug!("focus change: window {} focused={}", info.window_id, focused);
        for listener in self.focus.snapshot() {
            if focused {
                listener.on_focused(info);
            } else {
                listener.on_unfocused(info);
            }
        }
    }

    fn update_system_bar_region_tints(&self, display_id: u64, tints: &[SystemBarRegionTint]) {
        for listener in self.system_bar.snapshot() {
            listener.on_system_bar_property_change(display_id, tints);
        }
    }

    fn notify_accessibility_window_info(
        &self,
        infos: &[Arc<AccessibilityWindowInfo>],
        update_type: WindowUpdateType,
    ) {
        for listener in self.window_update.snapshot() {
            listener.on_window_update(infos, update_type);
        }
    }

    fn update_window_visibility_info(&self, infos: &[Arc<WindowVisibilityInfo>]) {
        for listener in self.visibility.snapshot() {
            listener.on_window_visibility_changed(infos);
        }
    }

    fn update_camera_float_window_status(&self, access_token_id: u32, showing: bool) {
        for listener in self.camera_float.snapshot() {
            listener.on_camera_float_window_change(access_token_id, showing);
        }
    }
}

impl WindowManagerAgent for AgentBridge {
    fn update_focus_change_info(&self, info: FocusChangeInfo, focused: bool) {
        if let Some(manager) = self.manager.upgrade() {
            manager.update_focus_change_info(&info, focused);
        }
    }

    fn update_system_bar_region_tints(&self, display_id: u64, tints: Vec<SystemBarRegionTint>) {
        if let Some(manager) = self.manager.upgrade() {
            manager.update_system_bar_region_tints(display_id, &tints);
        }
    }

    fn notify_accessibility_window_info(
        &self,
        infos: Vec<Arc<AccessibilityWindowInfo>>,
        update_type: WindowUpdateType,
    ) {
        if let Some(manager) = self.manager.upgrade() {
            manager.notify_accessibility_window_info(&infos, update_type);
        }
    }

    fn update_window_visibility_info(&self, infos: Vec<Arc<WindowVisibilityInfo>>) {
        if let Some(manager) = self.manager.upgrade() {
            manager.update_window_visibility_info(&infos);
        }
    }

    fn update_camera_float_window_status(&self, access_token_id: u32, showing: bool) {
        if let Some(manager) = self.manager.upgrade() {
            manager.update_camera_float_window_status(access_token_id, showing);
        }
    }
}

#[cfg(test)]
mod tests {
    use wmlink_ipc::codes::WindowManagerCode;
    use wmlink_ipc::types::{WindowStateChangeReason, WindowType, INVALID_WINDOW_ID};
    use wmlink_ipc::WmError;

    use super::*;
    use crate::testing::{Events, Harness};

    fn focus_info(window_id: u32) -> FocusChangeInfo {
        FocusChangeInfo {
            window_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_register_twice_keeps_one_entry() {
        let h = Harness::new();
        let events = Events::new();

        assert!(h.manager.register_focus_changed_listener(events.clone()));
        assert!(h.manager.register_focus_changed_listener(events.clone()));

        assert_eq!(
            h.manager.category_status(WindowManagerAgentType::Focus),
            (1, true)
        );
        assert_eq!(h.wire.count(WindowManagerCode::RegisterAgent), 1);
    }

    #[test]
    fn test_agent_registered_once_per_category() {
        let h = Harness::new();
        let first = Events::new();
        let second = Events::new();
        let first_dyn: Arc<dyn FocusChangedListener> = first.clone();
        let second_dyn: Arc<dyn FocusChangedListener> = second.clone();

        assert!(h.manager.register_focus_changed_listener(Arc::clone(&first_dyn)));
        assert!(h.manager.register_focus_changed_listener(Arc::clone(&second_dyn)));
        assert_eq!(h.wire.count(WindowManagerCode::RegisterAgent), 1);
        assert_eq!(h.server.agents().count(WindowManagerAgentType::Focus), 1);

        assert!(h.manager.unregister_focus_changed_listener(&first_dyn));
        assert_eq!(h.wire.count(WindowManagerCode::UnregisterAgent), 0);
        assert!(h.manager.unregister_focus_changed_listener(&second_dyn));
        assert_eq!(h.wire.count(WindowManagerCode::UnregisterAgent), 1);

        assert_eq!(h.server.agents().count(WindowManagerAgentType::Focus), 0);
        assert_eq!(
            h.manager.category_status(WindowManagerAgentType::Focus),
            (0, false)
        );
    }

    #[test]
    fn test_focus_push_reaches_every_listener_once() {
        let h = Harness::new();
        let first = Events::new();
        let second = Events::new();
        h.manager.register_focus_changed_listener(first.clone());
        h.manager.register_focus_changed_listener(second.clone());

        h.server.agents().notify_focus(&focus_info(7), true);

        assert_eq!(first.lines(), vec!["focus-in 7"]);
        assert_eq!(second.lines(), vec!["focus-in 7"]);
        assert_eq!(h.server.agents().count(WindowManagerAgentType::Focus), 1);

        h.server.agents().notify_focus(&focus_info(7), false);
        assert_eq!(first.count("focus-out 7"), 1);
        assert_eq!(second.count("focus-out 7"), 1);
    }

    #[test]
    fn test_unregister_unknown_listener_is_noop() {
        let h = Harness::new();
        let registered = Events::new();
        let stranger: Arc<dyn FocusChangedListener> = Events::new();
        h.manager.register_focus_changed_listener(registered.clone());

        assert!(h.manager.unregister_focus_changed_listener(&stranger));
        assert_eq!(h.wire.count(WindowManagerCode::UnregisterAgent), 0);
        assert_eq!(
            h.manager.category_status(WindowManagerAgentType::Focus),
            (1, true)
        );

        let never: Arc<dyn CameraFloatWindowChangedListener> = Events::new();
        assert!(h.manager.unregister_camera_float_window_changed_listener(&never));
        assert_eq!(h.wire.count(WindowManagerCode::UnregisterAgent), 0);
    }

    #[test]
    fn test_failed_agent_registration() {
        let h = Harness::new();
        h.wire.fail(WindowManagerCode::RegisterAgent, WmError::InvalidOperation);
        let events = Events::new();

        assert!(!h.manager.register_visibility_changed_listener(events.clone()));
        assert_eq!(
            h.manager.category_status(WindowManagerAgentType::WindowVisibility),
            (0, false)
        );

        h.wire.heal(WindowManagerCode::RegisterAgent);
        assert!(h.manager.register_visibility_changed_listener(events));
        assert_eq!(
            h.server.agents().count(WindowManagerAgentType::WindowVisibility),
            1
        );
    }

    #[test]
    fn test_window_events_fan_out_by_category() {
        let h = Harness::new();
        let bars = Events::new();
        let updates = Events::new();
        let visibility = Events::new();
        let focus = Events::new();
        h.manager.register_system_bar_changed_listener(bars.clone());
        h.manager.register_window_update_listener(updates.clone());
        h.manager.register_visibility_changed_listener(visibility.clone());
        h.manager.register_focus_changed_listener(focus.clone());

        let window = h.window("main", WindowType::AppMainWindow);
        window.create(INVALID_WINDOW_ID).unwrap();
        window.show(WindowStateChangeReason::Normal, false).unwrap();
        let id = window.id();

        assert_eq!(bars.lines(), vec!["bars 0 2"]);
        assert_eq!(updates.count(&format!("update Added {}", id)), 1);
        assert_eq!(updates.count(&format!("update Focused {}", id)), 1);
        assert_eq!(visibility.lines(), vec![format!("visible {} true", id)]);
        assert_eq!(focus.lines(), vec![format!("focus-in {}", id)]);

        window.hide(WindowStateChangeReason::Normal, false).unwrap();
        assert_eq!(updates.count(&format!("update Removed {}", id)), 1);
        assert_eq!(visibility.count(&format!("visible {} false", id)), 1);
        assert_eq!(focus.count(&format!("focus-out {}", id)), 1);
    }

    #[test]
    fn test_camera_float_push() {
        let h = Harness::new();
        let events = Events::new();
        h.manager.register_camera_float_window_changed_listener(events.clone());

        let camera = h.window("camera", WindowType::FloatCamera);
        camera.create(INVALID_WINDOW_ID).unwrap();
        camera.show(WindowStateChangeReason::Normal, false).unwrap();
        camera.hide(WindowStateChangeReason::Normal, false).unwrap();

        assert_eq!(events.lines(), vec!["camera 0 true", "camera 0 false"]);
    }

    #[test]
    fn test_listener_without_agent_hears_nothing_after_unregister() {
        let h = Harness::new();
        let events = Events::new();
        let listener: Arc<dyn FocusChangedListener> = events.clone();
        h.manager.register_focus_changed_listener(Arc::clone(&listener));
        h.manager.unregister_focus_changed_listener(&listener);

        h.server.agents().notify_focus(&focus_info(3), true);
        assert!(events.lines().is_empty());
    }

    #[test]
    fn test_remote_death_drops_agents_keeps_listeners() {
        let h = Harness::new();
        let events = Events::new();
        h.manager.register_focus_changed_listener(events.clone());
        h.manager.register_system_bar_changed_listener(events.clone());

        h.manager.on_remote_died();

        assert_eq!(
            h.manager.category_status(WindowManagerAgentType::Focus),
            (1, false)
        );
        assert_eq!(
            h.manager.category_status(WindowManagerAgentType::SystemBar),
            (1, false)
        );

        // A fresh listener brings the agent back.
        let other = Events::new();
        assert!(h.manager.register_focus_changed_listener(other));
        assert_eq!(
            h.manager.category_status(WindowManagerAgentType::Focus),
            (2, true)
        );
        assert_eq!(h.wire.count(WindowManagerCode::RegisterAgent), 3);
    }

    #[test]
    fn test_service_wide_operations() {
        let h = Harness::new();
        let window = h.window("main", WindowType::AppMainWindow);
        window.create(INVALID_WINDOW_ID).unwrap();
        window.show(WindowStateChangeReason::Normal, false).unwrap();

        let infos = h.manager.get_accessibility_window_info().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].window_id, window.id());
        assert!(infos[0].focused);

        let visible = h.manager.get_visibility_window_info().unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].visible);

        h.manager.minimize_all_app_windows(0).unwrap();
        assert!(!h.server.is_shown(window.id()));
    }
}
