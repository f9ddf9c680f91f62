//! Service-side dispatcher for `WindowManagerService`.
//!
//! Every opcode decodes into one `Request` variant before the service is
//! touched, so a malformed transaction never reaches it half-read.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codes::WindowManagerCode;
use crate::error::{status_code, ParcelError, TransportError};
use crate::info::{MoveDragProperty, SystemConfig};
use crate::parcel::{marshal_shared_vec, Parcel, Parcelable};
use crate::property::{PropertyChangeAction, WindowProperty};
use crate::service::{WindowManagerService, WINDOW_MANAGER_DESCRIPTOR};
use crate::transport::{check_interface_token, CallMode, RemoteRef, RemoteStub};
use crate::types::{AvoidAreaType, SurfaceDescriptor, WindowLayoutMode, WindowManagerAgentType};

/// One decoded transaction.
pub enum Request {
    CreateWindow {
        window: RemoteRef,
        property: WindowProperty,
        surface: SurfaceDescriptor,
        token: Option<RemoteRef>,
    },
    AddWindow(WindowProperty),
    RemoveWindow(u32),
    DestroyWindow {
        window_id: u32,
        only_self: bool,
    },
    RequestFocus(u32),
    GetAvoidArea {
        window_id: u32,
        area_type: AvoidAreaType,
    },
    RegisterAgent {
        kind: WindowManagerAgentType,
        agent: RemoteRef,
    },
    UnregisterAgent {
        kind: WindowManagerAgentType,
        agent: RemoteRef,
    },
    NotifyReadyMoveOrDrag {
        window_id: u32,
        property: WindowProperty,
        move_drag: MoveDragProperty,
    },
    ProcessPointDown {
        window_id: u32,
        is_point_down: bool,
    },
    ProcessPointUp(u32),
    GetTopWindowId(u32),
    MinimizeAllAppWindows(u64),
    ToggleShownState,
    UpdateLayoutMode(WindowLayoutMode),
    UpdateProperty {
        property: WindowProperty,
        action: PropertyChangeAction,
    },
    GetAccessibilityWindowInfo,
    GetVisibilityWindowInfo,
    AnimationSetController(RemoteRef),
    GetSystemConfig,
    GetModeChangeHotZones(u64),
    UpdateAvoidAreaListener {
        window_id: u32,
        have_listener: bool,
    },
    GetSnapshot(u32),
}

impl Request {
    pub fn decode(code: WindowManagerCode, data: &mut Parcel) -> Result<Self, ParcelError> {
        use WindowManagerCode as C;

        let request = match code {
            C::CreateWindow => Request::CreateWindow {
                window: data.read_remote_object()?,
                property: WindowProperty::unmarshal(data)?,
                surface: SurfaceDescriptor::unmarshal(data)?,
                token: data.read_optional_remote_object()?,
            },
            C::AddWindow => Request::AddWindow(WindowProperty::unmarshal(data)?),
            C::RemoveWindow => Request::RemoveWindow(data.read_u32()?),
            C::DestroyWindow => Request::DestroyWindow {
                window_id: data.read_u32()?,
                only_self: data.read_bool()?,
            },
            C::RequestFocus => Request::RequestFocus(data.read_u32()?),
            C::GetAvoidArea => Request::GetAvoidArea {
                window_id: data.read_u32()?,
                area_type: AvoidAreaType::unmarshal(data)?,
            },
            C::RegisterAgent => Request::RegisterAgent {
                kind: WindowManagerAgentType::unmarshal(data)?,
                agent: data.read_remote_object()?,
            },
            C::UnregisterAgent => Request::UnregisterAgent {
                kind: WindowManagerAgentType::unmarshal(data)?,
                agent: data.read_remote_object()?,
            },
            C::NotifyReadyMoveOrDrag => Request::NotifyReadyMoveOrDrag {
                window_id: data.read_u32()?,
                property: WindowProperty::unmarshal(data)?,
                move_drag: MoveDragProperty::unmarshal(data)?,
            },
            C::ProcessPointDown => Request::ProcessPointDown {
                window_id: data.read_u32()?,
                is_point_down: data.read_bool()?,
            },
            C::ProcessPointUp => Request::ProcessPointUp(data.read_u32()?),
            C::GetTopWindowId => Request::GetTopWindowId(data.read_u32()?),
            C::MinimizeAllAppWindows => Request::MinimizeAllAppWindows(data.read_u64()?),
            C::ToggleShownStateForAllAppWindows => Request::ToggleShownState,
            C::UpdateLayoutMode => Request::UpdateLayoutMode(WindowLayoutMode::unmarshal(data)?),
            C::UpdateProperty => {
                let bits = data.read_u32()?;
                let action = PropertyChangeAction::from_bits(bits).ok_or(
                    ParcelError::InvalidValue {
                        field: "PropertyChangeAction",
                        value: bits,
                    },
                )?;
                let mut property = WindowProperty::default();
                property.read_changes(data, action)?;
                Request::UpdateProperty { property, action }
            }
            C::GetAccessibilityWindowInfo => Request::GetAccessibilityWindowInfo,
            C::GetVisibilityWindowInfo => Request::GetVisibilityWindowInfo,
            C::AnimationSetController => Request::AnimationSetController(data.read_remote_object()?),
            C::GetSystemConfig => Request::GetSystemConfig,
            C::GetModeChangeHotZones => Request::GetModeChangeHotZones(data.read_u64()?),
            C::UpdateAvoidAreaListener => Request::UpdateAvoidAreaListener {
                window_id: data.read_u32()?,
                have_listener: data.read_bool()?,
            },
            C::GetSnapshot => Request::GetSnapshot(data.read_u32()?),
        };
        Ok(request)
    }
}

pub struct WindowManagerStub<S: ?Sized> {
    service: Arc<S>,
}

impl<S: WindowManagerService + ?Sized> WindowManagerStub<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    fn handle(&self, request: Request, reply: &mut Parcel) -> Result<(), ParcelError> {
        let service = &self.service;
        match request {
            Request::CreateWindow {
                window,
                property,
                surface,
                token,
            } => {
                let result = service.create_window(window, property, surface, token);
                let (window_id, status) = match result {
                    Ok(id) => (id, Ok(())),
                    Err(e) => (0, Err(e)),
                };
                reply.write_u32(window_id);
                reply.write_i32(status_code(&status));
            }
            Request::AddWindow(property) => {
                reply.write_i32(status_code(&service.add_window(property)));
            }
            Request::RemoveWindow(window_id) => {
                reply.write_i32(status_code(&service.remove_window(window_id)));
            }
            Request::DestroyWindow {
                window_id,
                only_self,
            } => {
                reply.write_i32(status_code(&service.destroy_window(window_id, only_self)));
            }
            Request::RequestFocus(window_id) => {
                reply.write_i32(status_code(&service.request_focus(window_id)));
            }
            Request::GetAvoidArea {
                window_id,
                area_type,
            } => {
                service
                    .get_avoid_area_by_type(window_id, area_type)
                    .marshal(reply)?;
            }
            Request::RegisterAgent { kind, agent } => {
                reply.write_bool(service.register_window_manager_agent(kind, agent));
            }
            Request::UnregisterAgent { kind, agent } => {
                reply.write_bool(service.unregister_window_manager_agent(kind, agent));
            }
            Request::NotifyReadyMoveOrDrag {
                window_id,
                property,
                move_drag,
            } => {
                service.notify_server_ready_to_move_or_drag(window_id, property, move_drag);
            }
            Request::ProcessPointDown {
                window_id,
                is_point_down,
            } => service.process_point_down(window_id, is_point_down),
            Request::ProcessPointUp(window_id) => service.process_point_up(window_id),
            Request::GetTopWindowId(main_window_id) => {
                let result = service.get_top_window_id(main_window_id);
                reply.write_u32(*result.as_ref().unwrap_or(&0));
                reply.write_i32(status_code(&result.map(|_| ())));
            }
            Request::MinimizeAllAppWindows(display_id) => {
                service.minimize_all_app_windows(display_id);
            }
            Request::ToggleShownState => {
                reply.write_i32(status_code(&service.toggle_shown_state_for_all_app_windows()));
            }
            Request::UpdateLayoutMode(mode) => {
                reply.write_i32(status_code(&service.set_window_layout_mode(mode)));
            }
            Request::UpdateProperty { property, action } => {
                reply.write_i32(status_code(&service.update_property(property, action)));
            }
            Request::GetAccessibilityWindowInfo => {
                let result = service.get_accessibility_window_info();
                marshal_shared_vec(reply, result.as_deref().unwrap_or_default())?;
                reply.write_i32(status_code(&result.map(|_| ())));
            }
            Request::GetVisibilityWindowInfo => {
                let result = service.get_visibility_window_info();
                marshal_shared_vec(reply, result.as_deref().unwrap_or_default())?;
                reply.write_i32(status_code(&result.map(|_| ())));
            }
            Request::AnimationSetController(controller) => {
                reply.write_i32(status_code(&service.set_window_animation_controller(controller)));
            }
            Request::GetSystemConfig => {
                let result = service.get_system_config();
                match &result {
                    Ok(config) => config.marshal(reply)?,
                    Err(_) => SystemConfig::default().marshal(reply)?,
                }
                reply.write_i32(status_code(&result.map(|_| ())));
            }
            Request::GetModeChangeHotZones(display_id) => {
                let result = service.get_mode_change_hot_zones(display_id);
                let zones = result.unwrap_or_default();
                reply.write_i32(status_code(&result.map(|_| ())));
                zones.marshal(reply)?;
            }
            Request::UpdateAvoidAreaListener {
                window_id,
                have_listener,
            } => {
                reply.write_i32(status_code(
                    &service.update_avoid_area_listener(window_id, have_listener),
                ));
            }
            Request::GetSnapshot(window_id) => match service.get_snapshot(window_id) {
                Some(snapshot) => {
                    reply.write_bool(true);
                    snapshot.marshal(reply)?;
                }
                None => reply.write_bool(false),
            },
        }
        Ok(())
    }
}

impl<S: WindowManagerService + ?Sized + 'static> RemoteStub for WindowManagerStub<S> {
    fn descriptor(&self) -> &'static str {
        WINDOW_MANAGER_DESCRIPTOR
    }

    fn on_remote_request(
        &self,
        code: u32,
        data: &mut Parcel,
        reply: &mut Parcel,
        mode: CallMode,
    ) -> Result<(), TransportError> {
        if !check_interface_token(self, data) {
            return Err(TransportError::Rejected);
        }
        let Ok(opcode) = WindowManagerCode::try_from(code) else {
            return self.on_unknown_request(code, data, reply, mode);
        };
        let request = Request::decode(opcode, data).map_err(|e| {
            warn!("failed to decode {:?}: {}", opcode, e);
            TransportError::Rejected
        })?;
        debug!("dispatching {:?}", opcode);
        self.handle(request, reply)?;
        Ok(())
    }
}
