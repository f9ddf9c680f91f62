//! Client entry point to the window-management service.
//!
//! The adapter resolves the service lazily through a `ServiceLocator`,
//! caches the proxy, and drops it again once the transport reports the peer
//! dead so the next call re-resolves.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use wmlink_ipc::info::{AccessibilityWindowInfo, MoveDragProperty, SystemConfig, WindowVisibilityInfo};
use wmlink_ipc::types::{
    AvoidArea, AvoidAreaType, ModeChangeHotZones, Snapshot, SurfaceDescriptor, WindowLayoutMode,
    WindowManagerAgentType,
};
use wmlink_ipc::{PropertyChangeAction, RemoteRef, WindowManagerProxy, WindowProperty, WmError, WmResult};

/// Finds the service endpoint. `None` means it is not reachable right now.
pub trait ServiceLocator: Send + Sync {
    fn locate(&self) -> Option<RemoteRef>;

    /// The service no longer references `object`; transports that export
    /// local objects drop their copy here.
    fn release(&self, _object: &RemoteRef) {}
}

impl<F> ServiceLocator for F
where
    F: Fn() -> Option<RemoteRef> + Send + Sync,
{
    fn locate(&self) -> Option<RemoteRef> {
        self()
    }
}

pub struct WindowAdapter {
    locator: Box<dyn ServiceLocator>,
    proxy: Mutex<Option<Arc<WindowManagerProxy>>>,
}

impl WindowAdapter {
    pub fn new(locator: impl ServiceLocator + 'static) -> Self {
        Self {
            locator: Box::new(locator),
            proxy: Mutex::new(None),
        }
    }

    /// Adapter bound to an already resolved endpoint.
    pub fn with_remote(remote: RemoteRef) -> Self {
        Self::new(move || Some(Arc::clone(&remote)))
    }

    fn proxy(&self) -> Option<Arc<WindowManagerProxy>> {
        let mut slot = self.proxy.lock();
        if let Some(proxy) = slot.as_ref() {
            if proxy.is_alive() {
                return Some(Arc::clone(proxy));
            }
            warn!("window manager service died, re-resolving");
            *slot = None;
        }
        let remote = self.locator.locate()?;
        info!("resolved window manager service");
        let proxy = Arc::new(WindowManagerProxy::new(remote));
        *slot = Some(Arc::clone(&proxy));
        Some(proxy)
    }

    /// Tell the transport a callback or agent handed to the service is done.
    pub fn release_object(&self, object: &RemoteRef) {
        self.locator.release(object);
    }

    /// Forget the cached proxy so the next call resolves the service again.
    pub fn reset(&self) {
        if self.proxy.lock().take().is_some() {
            debug!("dropped cached window manager proxy");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.proxy
            .lock()
            .as_ref()
            .is_some_and(|proxy| proxy.is_alive())
    }

    fn with_proxy<T>(&self, f: impl FnOnce(&WindowManagerProxy) -> WmResult<T>) -> WmResult<T> {
        let Some(proxy) = self.proxy() else {
            error!("window manager service unavailable");
            return Err(WmError::Samgr);
        };
        let result = f(&proxy);
        if matches!(result, Err(WmError::IpcFailed)) && !proxy.is_alive() {
            self.forget(&proxy);
        }
        result
    }

    /// Variant for calls that degrade to a value instead of failing.
    fn degrade<T>(&self, fallback: T, f: impl FnOnce(&WindowManagerProxy) -> T) -> T {
        let Some(proxy) = self.proxy() else {
            error!("window manager service unavailable");
            return fallback;
        };
        let value = f(&proxy);
        if !proxy.is_alive() {
            self.forget(&proxy);
        }
        value
    }

    fn forget(&self, dead: &Arc<WindowManagerProxy>) {
        let mut slot = self.proxy.lock();
        if slot.as_ref().is_some_and(|proxy| Arc::ptr_eq(proxy, dead)) {
            warn!("window manager transport is dead, dropping proxy");
            *slot = None;
        }
    }

    pub fn create_window(
        &self,
        window: &RemoteRef,
        property: &WindowProperty,
        surface: &SurfaceDescriptor,
        token: Option<&RemoteRef>,
    ) -> WmResult<u32> {
        self.with_proxy(|proxy| proxy.create_window(window, property, surface, token))
    }

    pub fn add_window(&self, property: &WindowProperty) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.add_window(property))
    }

    pub fn remove_window(&self, window_id: u32) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.remove_window(window_id))
    }

    /// Tear down one window; its children are torn down by their own handles.
    pub fn destroy_window(&self, window_id: u32) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.destroy_window(window_id, true))
    }

    pub fn request_focus(&self, window_id: u32) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.request_focus(window_id))
    }

    pub fn get_avoid_area_by_type(&self, window_id: u32, area_type: AvoidAreaType) -> AvoidArea {
        self.degrade(AvoidArea::default(), |proxy| {
            proxy.get_avoid_area_by_type(window_id, area_type)
        })
    }

    pub fn register_window_manager_agent(
        &self,
        kind: WindowManagerAgentType,
        agent: &RemoteRef,
    ) -> bool {
        self.degrade(false, |proxy| proxy.register_window_manager_agent(kind, agent))
    }

    pub fn unregister_window_manager_agent(
        &self,
        kind: WindowManagerAgentType,
        agent: &RemoteRef,
    ) -> bool {
        self.degrade(false, |proxy| {
            proxy.unregister_window_manager_agent(kind, agent)
        })
    }

    pub fn notify_server_ready_to_move_or_drag(
        &self,
        window_id: u32,
        property: &WindowProperty,
        move_drag: &MoveDragProperty,
    ) -> WmResult<()> {
        self.with_proxy(|proxy| {
            proxy.notify_server_ready_to_move_or_drag(window_id, property, move_drag)
        })
    }

    pub fn process_point_down(&self, window_id: u32, is_point_down: bool) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.process_point_down(window_id, is_point_down))
    }

    pub fn process_point_up(&self, window_id: u32) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.process_point_up(window_id))
    }

    pub fn get_top_window_id(&self, main_window_id: u32) -> WmResult<u32> {
        self.with_proxy(|proxy| proxy.get_top_window_id(main_window_id))
    }

    pub fn minimize_all_app_windows(&self, display_id: u64) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.minimize_all_app_windows(display_id))
    }

    pub fn toggle_shown_state_for_all_app_windows(&self) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.toggle_shown_state_for_all_app_windows())
    }

    pub fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.set_window_layout_mode(mode))
    }

    pub fn update_property(
        &self,
        property: &WindowProperty,
        action: PropertyChangeAction,
    ) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.update_property(property, action))
    }

    pub fn get_accessibility_window_info(&self) -> WmResult<Vec<Arc<AccessibilityWindowInfo>>> {
        self.with_proxy(|proxy| proxy.get_accessibility_window_info())
    }

    pub fn get_visibility_window_info(&self) -> WmResult<Vec<Arc<WindowVisibilityInfo>>> {
        self.with_proxy(|proxy| proxy.get_visibility_window_info())
    }

    pub fn set_window_animation_controller(&self, controller: &RemoteRef) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.set_window_animation_controller(controller))
    }

    pub fn get_system_config(&self) -> WmResult<SystemConfig> {
        self.with_proxy(|proxy| proxy.get_system_config())
    }

    pub fn get_mode_change_hot_zones(&self, display_id: u64) -> WmResult<ModeChangeHotZones> {
        self.with_proxy(|proxy| proxy.get_mode_change_hot_zones(display_id))
    }

    pub fn update_avoid_area_listener(&self, window_id: u32, have_listener: bool) -> WmResult<()> {
        self.with_proxy(|proxy| proxy.update_avoid_area_listener(window_id, have_listener))
    }

    pub fn get_snapshot(&self, window_id: u32) -> Option<Snapshot> {
        self.degrade(None, |proxy| proxy.get_snapshot(window_id))
    }
}
