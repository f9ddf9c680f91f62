//! Client-side caller for `WindowManagerService`.

use std::sync::Arc;

use tracing::{error, warn};

use crate::codes::WindowManagerCode;
use crate::error::{status_from_code, ParcelError, WmError, WmResult};
use crate::info::{AccessibilityWindowInfo, MoveDragProperty, SystemConfig, WindowVisibilityInfo};
use crate::parcel::{unmarshal_shared_vec, Parcel, Parcelable};
use crate::property::{PropertyChangeAction, WindowProperty};
use crate::service::WINDOW_MANAGER_DESCRIPTOR;
use crate::transport::{CallMode, RemoteRef};
use crate::types::{
    AvoidArea, AvoidAreaType, ModeChangeHotZones, Snapshot, SurfaceDescriptor, WindowLayoutMode,
    WindowManagerAgentType,
};

pub struct WindowManagerProxy {
    remote: RemoteRef,
}

fn encode_failed(code: WindowManagerCode, e: ParcelError) -> WmError {
    error!("failed to write {:?} arguments: {}", code, e);
    WmError::IpcFailed
}

fn decode_failed(code: WindowManagerCode, e: ParcelError) -> WmError {
    error!("failed to read {:?} reply: {}", code, e);
    WmError::IpcFailed
}

impl WindowManagerProxy {
    pub fn new(remote: RemoteRef) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    pub fn is_alive(&self) -> bool {
        self.remote.is_alive()
    }

    /// Start a request: every transaction leads with the interface token.
    fn request(code: WindowManagerCode) -> WmResult<Parcel> {
        let mut data = Parcel::new();
        data.write_string(WINDOW_MANAGER_DESCRIPTOR)
            .map_err(|e| encode_failed(code, e))?;
        Ok(data)
    }

    fn transact(&self, code: WindowManagerCode, data: &Parcel, mode: CallMode) -> WmResult<Parcel> {
        let mut reply = Parcel::new();
        self.remote
            .send_request(code as u32, data, &mut reply, mode)
            .map_err(|e| {
                warn!("{:?} transaction failed: {}", code, e);
                WmError::IpcFailed
            })?;
        Ok(reply)
    }

    fn call(&self, code: WindowManagerCode, data: &Parcel) -> WmResult<Parcel> {
        self.transact(code, data, CallMode::Sync)
    }

    fn post(&self, code: WindowManagerCode, data: &Parcel) -> WmResult<()> {
        self.transact(code, data, CallMode::OneWay).map(|_| ())
    }

    fn read_status(code: WindowManagerCode, reply: &mut Parcel) -> WmResult<()> {
        let status = reply.read_i32().map_err(|e| decode_failed(code, e))?;
        status_from_code(status)
    }

    /// Call that replies with a bare status.
    fn call_status(&self, code: WindowManagerCode, data: &Parcel) -> WmResult<()> {
        let mut reply = self.call(code, data)?;
        Self::read_status(code, &mut reply)
    }

    pub fn create_window(
        &self,
        window: &RemoteRef,
        property: &WindowProperty,
        surface: &SurfaceDescriptor,
        token: Option<&RemoteRef>,
    ) -> WmResult<u32> {
        let code = WindowManagerCode::CreateWindow;
        let mut data = Self::request(code)?;
        data.write_remote_object(window);
        property.marshal(&mut data).map_err(|e| encode_failed(code, e))?;
        surface.marshal(&mut data).map_err(|e| encode_failed(code, e))?;
        data.write_optional_remote_object(token);

        let mut reply = self.call(code, &data)?;
        let window_id = reply.read_u32().map_err(|e| decode_failed(code, e))?;
        Self::read_status(code, &mut reply)?;
        Ok(window_id)
    }

    pub fn add_window(&self, property: &WindowProperty) -> WmResult<()> {
        let code = WindowManagerCode::AddWindow;
        let mut data = Self::request(code)?;
        property.marshal(&mut data).map_err(|e| encode_failed(code, e))?;
        self.call_status(code, &data)
    }

    pub fn remove_window(&self, window_id: u32) -> WmResult<()> {
        let code = WindowManagerCode::RemoveWindow;
        let mut data = Self::request(code)?;
        data.write_u32(window_id);
        self.call_status(code, &data)
    }

    pub fn destroy_window(&self, window_id: u32, only_self: bool) -> WmResult<()> {
        let code = WindowManagerCode::DestroyWindow;
        let mut data = Self::request(code)?;
        data.write_u32(window_id);
        data.write_bool(only_self);
        self.call_status(code, &data)
    }

    pub fn request_focus(&self, window_id: u32) -> WmResult<()> {
        let code = WindowManagerCode::RequestFocus;
        let mut data = Self::request(code)?;
        data.write_u32(window_id);
        self.call_status(code, &data)
    }

    /// Never fails: any problem yields an empty area.
    pub fn get_avoid_area_by_type(&self, window_id: u32, area_type: AvoidAreaType) -> AvoidArea {
        let code = WindowManagerCode::GetAvoidArea;
        let result = (|| -> WmResult<AvoidArea> {
            let mut data = Self::request(code)?;
            data.write_u32(window_id);
            data.write_u32(area_type as u32);
            let mut reply = self.call(code, &data)?;
            AvoidArea::unmarshal(&mut reply).map_err(|e| decode_failed(code, e))
        })();
        result.unwrap_or_default()
    }

    pub fn register_window_manager_agent(
        &self,
        kind: WindowManagerAgentType,
        agent: &RemoteRef,
    ) -> bool {
        self.agent_call(WindowManagerCode::RegisterAgent, kind, agent)
    }

    pub fn unregister_window_manager_agent(
        &self,
        kind: WindowManagerAgentType,
        agent: &RemoteRef,
    ) -> bool {
        self.agent_call(WindowManagerCode::UnregisterAgent, kind, agent)
    }

    fn agent_call(&self, code: WindowManagerCode, kind: WindowManagerAgentType, agent: &RemoteRef) -> bool {
        let result = (|| -> WmResult<bool> {
            let mut data = Self::request(code)?;
            data.write_u32(kind as u32);
            data.write_remote_object(agent);
            let mut reply = self.call(code, &data)?;
            reply.read_bool().map_err(|e| decode_failed(code, e))
        })();
        result.unwrap_or(false)
    }

    pub fn notify_server_ready_to_move_or_drag(
        &self,
        window_id: u32,
        property: &WindowProperty,
        move_drag: &MoveDragProperty,
    ) -> WmResult<()> {
        let code = WindowManagerCode::NotifyReadyMoveOrDrag;
        let mut data = Self::request(code)?;
        data.write_u32(window_id);
        property.marshal(&mut data).map_err(|e| encode_failed(code, e))?;
        move_drag.marshal(&mut data).map_err(|e| encode_failed(code, e))?;
        self.post(code, &data)
    }

    pub fn process_point_down(&self, window_id: u32, is_point_down: bool) -> WmResult<()> {
        let code = WindowManagerCode::ProcessPointDown;
        let mut data = Self::request(code)?;
        data.write_u32(window_id);
        data.write_bool(is_point_down);
        self.post(code, &data)
    }

    pub fn process_point_up(&self, window_id: u32) -> WmResult<()> {
        let code = WindowManagerCode::ProcessPointUp;
        let mut data = Self::request(code)?;
        data.write_u32(window_id);
        self.post(code, &data)
    }

    pub fn get_top_window_id(&self, main_window_id: u32) -> WmResult<u32> {
        let code = WindowManagerCode::GetTopWindowId;
        let mut data = Self::request(code)?;
        data.write_u32(main_window_id);
        let mut reply = self.call(code, &data)?;
        let top = reply.read_u32().map_err(|e| decode_failed(code, e))?;
        Self::read_status(code, &mut reply)?;
        Ok(top)
    }

    pub fn minimize_all_app_windows(&self, display_id: u64) -> WmResult<()> {
        let code = WindowManagerCode::MinimizeAllAppWindows;
        let mut data = Self::request(code)?;
        data.write_u64(display_id);
        self.post(code, &data)
    }

    pub fn toggle_shown_state_for_all_app_windows(&self) -> WmResult<()> {
        let code = WindowManagerCode::ToggleShownStateForAllAppWindows;
        let data = Self::request(code)?;
        self.call_status(code, &data)
    }

    pub fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<()> {
        let code = WindowManagerCode::UpdateLayoutMode;
        let mut data = Self::request(code)?;
        data.write_u32(mode as u32);
        self.call_status(code, &data)
    }

    pub fn update_property(
        &self,
        property: &WindowProperty,
        action: PropertyChangeAction,
    ) -> WmResult<()> {
        let code = WindowManagerCode::UpdateProperty;
        let mut data = Self::request(code)?;
        data.write_u32(action.bits());
        property
            .write_changes(&mut data, action)
            .map_err(|e| encode_failed(code, e))?;
        self.call_status(code, &data)
    }

    pub fn get_accessibility_window_info(&self) -> WmResult<Vec<Arc<AccessibilityWindowInfo>>> {
        let code = WindowManagerCode::GetAccessibilityWindowInfo;
        let data = Self::request(code)?;
        let mut reply = self.call(code, &data)?;
        let infos = unmarshal_shared_vec(&mut reply).map_err(|e| decode_failed(code, e))?;
        Self::read_status(code, &mut reply)?;
        Ok(infos)
    }

    pub fn get_visibility_window_info(&self) -> WmResult<Vec<Arc<WindowVisibilityInfo>>> {
        let code = WindowManagerCode::GetVisibilityWindowInfo;
        let data = Self::request(code)?;
        let mut reply = self.call(code, &data)?;
        let infos = unmarshal_shared_vec(&mut reply).map_err(|e| decode_failed(code, e))?;
        Self::read_status(code, &mut reply)?;
        Ok(infos)
    }

    pub fn set_window_animation_controller(&self, controller: &RemoteRef) -> WmResult<()> {
        let code = WindowManagerCode::AnimationSetController;
        let mut data = Self::request(code)?;
        data.write_remote_object(controller);
        self.call_status(code, &data)
    }

    pub fn get_system_config(&self) -> WmResult<SystemConfig> {
        let code = WindowManagerCode::GetSystemConfig;
        let data = Self::request(code)?;
        let mut reply = self.call(code, &data)?;
        let config = SystemConfig::unmarshal(&mut reply).map_err(|e| decode_failed(code, e))?;
        Self::read_status(code, &mut reply)?;
        Ok(config)
    }

    /// Check the result before trusting the zones.
    pub fn get_mode_change_hot_zones(&self, display_id: u64) -> WmResult<ModeChangeHotZones> {
        let code = WindowManagerCode::GetModeChangeHotZones;
        let mut data = Self::request(code)?;
        data.write_u64(display_id);
        let mut reply = self.call(code, &data)?;
        Self::read_status(code, &mut reply)?;
        ModeChangeHotZones::unmarshal(&mut reply).map_err(|e| decode_failed(code, e))
    }

    pub fn update_avoid_area_listener(&self, window_id: u32, have_listener: bool) -> WmResult<()> {
        let code = WindowManagerCode::UpdateAvoidAreaListener;
        let mut data = Self::request(code)?;
        data.write_u32(window_id);
        data.write_bool(have_listener);
        self.call_status(code, &data)
    }

    /// `None` when the service has nothing to give or the call fails.
    pub fn get_snapshot(&self, window_id: u32) -> Option<Snapshot> {
        let code = WindowManagerCode::GetSnapshot;
        let result = (|| -> WmResult<Option<Snapshot>> {
            let mut data = Self::request(code)?;
            data.write_u32(window_id);
            let mut reply = self.call(code, &data)?;
            if !reply.read_bool().map_err(|e| decode_failed(code, e))? {
                return Ok(None);
            }
            Snapshot::unmarshal(&mut reply)
                .map(Some)
                .map_err(|e| decode_failed(code, e))
        })();
        result.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::stub::WindowManagerStub;
    use crate::transport::{RemoteObject, StubObject};
    use crate::types::{Rect, WindowMode, WindowType};
    use std::any::Any;
    use std::sync::Mutex;

    /// Records what reached the service and answers from fixed values.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        last_property: Mutex<Option<(WindowProperty, PropertyChangeAction)>>,
    }

    impl Recorder {
        fn log(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl crate::service::WindowManagerService for Recorder {
        fn create_window(
            &self,
            _window: RemoteRef,
            property: WindowProperty,
            _surface: SurfaceDescriptor,
            _token: Option<RemoteRef>,
        ) -> WmResult<u32> {
            self.log("create");
            if property.name.is_empty() {
                Err(WmError::InvalidParam)
            } else {
                Ok(17)
            }
        }
        fn add_window(&self, _property: WindowProperty) -> WmResult<()> {
            self.log("add");
            Err(WmError::InvalidWindowModeOrSize)
        }
        fn remove_window(&self, _window_id: u32) -> WmResult<()> {
            Ok(())
        }
        fn destroy_window(&self, _window_id: u32, _only_self: bool) -> WmResult<()> {
            Ok(())
        }
        fn request_focus(&self, _window_id: u32) -> WmResult<()> {
            Err(WmError::DoNothing)
        }
        fn get_avoid_area_by_type(&self, _window_id: u32, _area_type: AvoidAreaType) -> AvoidArea {
            AvoidArea {
                top: Rect::new(0, 0, 1920, 48),
                ..Default::default()
            }
        }
        fn register_window_manager_agent(&self, _kind: WindowManagerAgentType, _agent: RemoteRef) -> bool {
            self.log("register");
            true
        }
        fn unregister_window_manager_agent(&self, _kind: WindowManagerAgentType, _agent: RemoteRef) -> bool {
            true
        }
        fn notify_server_ready_to_move_or_drag(&self, _id: u32, _p: WindowProperty, _m: MoveDragProperty) {}
        fn process_point_down(&self, _window_id: u32, _is_point_down: bool) {
            self.log("point_down");
        }
        fn process_point_up(&self, _window_id: u32) {}
        fn get_top_window_id(&self, main_window_id: u32) -> WmResult<u32> {
            Ok(main_window_id + 1)
        }
        fn minimize_all_app_windows(&self, _display_id: u64) {}
        fn toggle_shown_state_for_all_app_windows(&self) -> WmResult<()> {
            Ok(())
        }
        fn set_window_layout_mode(&self, _mode: WindowLayoutMode) -> WmResult<()> {
            Ok(())
        }
        fn update_property(&self, property: WindowProperty, action: PropertyChangeAction) -> WmResult<()> {
            *self.last_property.lock().unwrap() = Some((property, action));
            Ok(())
        }
        fn get_accessibility_window_info(&self) -> WmResult<Vec<Arc<AccessibilityWindowInfo>>> {
            Ok(vec![Arc::new(AccessibilityWindowInfo {
                window_id: 5,
                ..Default::default()
            })])
        }
        fn get_visibility_window_info(&self) -> WmResult<Vec<Arc<WindowVisibilityInfo>>> {
            Err(WmError::NoMem)
        }
        fn set_window_animation_controller(&self, _controller: RemoteRef) -> WmResult<()> {
            Ok(())
        }
        fn get_system_config(&self) -> WmResult<SystemConfig> {
            Ok(SystemConfig::default())
        }
        fn get_mode_change_hot_zones(&self, display_id: u64) -> WmResult<ModeChangeHotZones> {
            if display_id == 0 {
                Ok(ModeChangeHotZones {
                    fullscreen: Rect::new(0, 0, 100, 10),
                    ..Default::default()
                })
            } else {
                Err(WmError::DoNothing)
            }
        }
        fn update_avoid_area_listener(&self, _window_id: u32, _have_listener: bool) -> WmResult<()> {
            Ok(())
        }
        fn get_snapshot(&self, _window_id: u32) -> Option<Snapshot> {
            None
        }
    }

    /// A remote whose peer is gone.
    struct Dead;

    impl RemoteObject for Dead {
        fn send_request(&self, _: u32, _: &Parcel, _: &mut Parcel, _: CallMode) -> Result<(), TransportError> {
            Err(TransportError::DeadObject)
        }
        fn is_alive(&self) -> bool {
            false
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn connected() -> (Arc<Recorder>, WindowManagerProxy) {
        let service = Arc::new(Recorder::default());
        let remote = StubObject::into_remote(WindowManagerStub::new(Arc::clone(&service)));
        (service, WindowManagerProxy::new(remote))
    }

    fn window_object() -> RemoteRef {
        Arc::new(Dead)
    }

    #[test]
    fn test_create_window_returns_id() {
        let (_service, proxy) = connected();
        let property = WindowProperty::new("W", WindowType::AppMainWindow);
        let id = proxy
            .create_window(&window_object(), &property, &SurfaceDescriptor::default(), None)
            .unwrap();
        assert_eq!(id, 17);

        let unnamed = WindowProperty::default();
        assert_eq!(
            proxy.create_window(&window_object(), &unnamed, &SurfaceDescriptor::default(), None),
            Err(WmError::InvalidParam)
        );
    }

    #[test]
    fn test_service_error_passes_through_verbatim() {
        let (_service, proxy) = connected();
        let property = WindowProperty::new("W", WindowType::AppMainWindow);
        assert_eq!(proxy.add_window(&property), Err(WmError::InvalidWindowModeOrSize));
        assert_eq!(proxy.request_focus(1), Err(WmError::DoNothing));
    }

    #[test]
    fn test_update_property_carries_only_selected_fields() {
        let (service, proxy) = connected();
        let mut property = WindowProperty::new("W", WindowType::AppMainWindow);
        property.window_id = 3;
        property.mode = WindowMode::Floating;
        property.brightness = 0.8;

        proxy
            .update_property(&property, PropertyChangeAction::MODE)
            .unwrap();
        let (received, action) = service.last_property.lock().unwrap().clone().unwrap();
        assert_eq!(action, PropertyChangeAction::MODE);
        assert_eq!(received.window_id, 3);
        assert_eq!(received.mode, WindowMode::Floating);
        assert_eq!(received.name, "");
        assert_ne!(received.brightness, 0.8);
    }

    #[test]
    fn test_dead_transport_is_ipc_failed() {
        let proxy = WindowManagerProxy::new(Arc::new(Dead));
        assert!(!proxy.is_alive());
        assert_eq!(proxy.remove_window(1), Err(WmError::IpcFailed));
        assert_eq!(proxy.process_point_up(1), Err(WmError::IpcFailed));
        assert!(!proxy.register_window_manager_agent(WindowManagerAgentType::Focus, &window_object()));
    }

    #[test]
    fn test_degraded_queries_return_defaults() {
        let proxy = WindowManagerProxy::new(Arc::new(Dead));
        assert_eq!(
            proxy.get_avoid_area_by_type(1, AvoidAreaType::System),
            AvoidArea::default()
        );
        assert!(proxy.get_snapshot(1).is_none());

        let (_service, proxy) = connected();
        assert_eq!(
            proxy.get_avoid_area_by_type(1, AvoidAreaType::System).top,
            Rect::new(0, 0, 1920, 48)
        );
    }

    #[test]
    fn test_hot_zones_status_first() {
        let (_service, proxy) = connected();
        let zones = proxy.get_mode_change_hot_zones(0).unwrap();
        assert_eq!(zones.fullscreen, Rect::new(0, 0, 100, 10));
        assert_eq!(proxy.get_mode_change_hot_zones(1), Err(WmError::DoNothing));
    }

    #[test]
    fn test_vector_replies() {
        let (_service, proxy) = connected();
        let infos = proxy.get_accessibility_window_info().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].window_id, 5);
        assert_eq!(proxy.get_visibility_window_info(), Err(WmError::NoMem));
        assert_eq!(proxy.get_top_window_id(4), Ok(5));
    }

    #[test]
    fn test_one_way_reaches_service() {
        let (service, proxy) = connected();
        proxy.process_point_down(2, true).unwrap();
        assert_eq!(*service.calls.lock().unwrap(), vec!["point_down".to_string()]);
    }

    #[test]
    fn test_wrong_token_never_reaches_service() {
        let (service, proxy) = connected();
        let mut data = Parcel::new();
        data.write_string("wmlink.ISomethingElse").unwrap();
        data.write_u32(1);
        let mut reply = Parcel::new();
        let result = proxy.remote().send_request(
            WindowManagerCode::RemoveWindow as u32,
            &data,
            &mut reply,
            CallMode::Sync,
        );
        assert_eq!(result, Err(TransportError::Rejected));
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_opcode_uses_fallback() {
        let (service, proxy) = connected();
        let mut data = Parcel::new();
        data.write_string(WINDOW_MANAGER_DESCRIPTOR).unwrap();
        let mut reply = Parcel::new();
        let result = proxy
            .remote()
            .send_request(999, &data, &mut reply, CallMode::Sync);
        assert_eq!(result, Err(TransportError::Rejected));

        let mut reply = Parcel::new();
        proxy
            .remote()
            .send_request(crate::transport::INTERFACE_TRANSACTION, &data, &mut reply, CallMode::Sync)
            .unwrap();
        assert_eq!(reply.read_string().unwrap(), WINDOW_MANAGER_DESCRIPTOR);
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_action_bits_rejected() {
        let (service, proxy) = connected();
        let mut data = Parcel::new();
        data.write_string(WINDOW_MANAGER_DESCRIPTOR).unwrap();
        data.write_u32(1 << 30);
        data.write_u32(3);
        let mut reply = Parcel::new();
        let result = proxy.remote().send_request(
            WindowManagerCode::UpdateProperty as u32,
            &data,
            &mut reply,
            CallMode::Sync,
        );
        assert_eq!(result, Err(TransportError::Rejected));
        assert!(service.last_property.lock().unwrap().is_none());
    }
}
