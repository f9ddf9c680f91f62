//! The window-management service interface.
//!
//! `WindowManagerService` is what a service implements; `WindowManagerStub`
//! exposes it to the transport and `WindowManagerProxy` calls it from a
//! client.

use std::sync::Arc;

use crate::error::WmResult;
use crate::info::{AccessibilityWindowInfo, MoveDragProperty, SystemConfig, WindowVisibilityInfo};
use crate::property::{PropertyChangeAction, WindowProperty};
use crate::transport::RemoteRef;
use crate::types::{
    AvoidArea, AvoidAreaType, ModeChangeHotZones, Snapshot, SurfaceDescriptor, WindowLayoutMode,
    WindowManagerAgentType,
};

pub const WINDOW_MANAGER_DESCRIPTOR: &str = "wmlink.IWindowManager";

pub trait WindowManagerService: Send + Sync {
    /// Register a window. `window` receives per-window pushes. Returns the
    /// assigned id.
    fn create_window(
        &self,
        window: RemoteRef,
        property: WindowProperty,
        surface: SurfaceDescriptor,
        token: Option<RemoteRef>,
    ) -> WmResult<u32>;

    fn add_window(&self, property: WindowProperty) -> WmResult<()>;

    fn remove_window(&self, window_id: u32) -> WmResult<()>;

    fn destroy_window(&self, window_id: u32, only_self: bool) -> WmResult<()>;

    fn request_focus(&self, window_id: u32) -> WmResult<()>;

    fn get_avoid_area_by_type(&self, window_id: u32, area_type: AvoidAreaType) -> AvoidArea;

    fn register_window_manager_agent(&self, kind: WindowManagerAgentType, agent: RemoteRef) -> bool;

    fn unregister_window_manager_agent(&self, kind: WindowManagerAgentType, agent: RemoteRef)
        -> bool;

    fn notify_server_ready_to_move_or_drag(
        &self,
        window_id: u32,
        property: WindowProperty,
        move_drag: MoveDragProperty,
    );

    fn process_point_down(&self, window_id: u32, is_point_down: bool);

    fn process_point_up(&self, window_id: u32);

    /// Top-most visible window of the app that owns `main_window_id`.
    fn get_top_window_id(&self, main_window_id: u32) -> WmResult<u32>;

    fn minimize_all_app_windows(&self, display_id: u64);

    fn toggle_shown_state_for_all_app_windows(&self) -> WmResult<()>;

    fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<()>;

    fn update_property(&self, property: WindowProperty, action: PropertyChangeAction)
        -> WmResult<()>;

    fn get_accessibility_window_info(&self) -> WmResult<Vec<Arc<AccessibilityWindowInfo>>>;

    fn get_visibility_window_info(&self) -> WmResult<Vec<Arc<WindowVisibilityInfo>>>;

    fn set_window_animation_controller(&self, controller: RemoteRef) -> WmResult<()>;

    fn get_system_config(&self) -> WmResult<SystemConfig>;

    fn get_mode_change_hot_zones(&self, display_id: u64) -> WmResult<ModeChangeHotZones>;

    fn update_avoid_area_listener(&self, window_id: u32, have_listener: bool) -> WmResult<()>;

    fn get_snapshot(&self, window_id: u32) -> Option<Snapshot>;
}
