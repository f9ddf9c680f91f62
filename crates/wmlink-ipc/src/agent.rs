//! Notification agent interface: the service pushes category events to
//! whichever agents registered for that category.

use std::sync::Arc;

use tracing::warn;

use crate::codes::AgentCode;
use crate::error::{ParcelError, TransportError};
use crate::info::{AccessibilityWindowInfo, FocusChangeInfo, SystemBarRegionTint, WindowUpdateType, WindowVisibilityInfo};
use crate::parcel::{marshal_shared_vec, marshal_vec, unmarshal_shared_vec, unmarshal_vec, Parcel, Parcelable};
use crate::transport::{check_interface_token, CallMode, RemoteRef, RemoteStub};

pub const AGENT_DESCRIPTOR: &str = "wmlink.IWindowManagerAgent";

/// Receiver of server pushes. All calls are one-way.
pub trait WindowManagerAgent: Send + Sync {
    fn update_focus_change_info(&self, info: FocusChangeInfo, focused: bool);

    fn update_system_bar_region_tints(&self, display_id: u64, tints: Vec<SystemBarRegionTint>);

    fn notify_accessibility_window_info(
        &self,
        infos: Vec<Arc<AccessibilityWindowInfo>>,
        update_type: WindowUpdateType,
    );

    fn update_window_visibility_info(&self, infos: Vec<Arc<WindowVisibilityInfo>>);

    fn update_camera_float_window_status(&self, access_token_id: u32, showing: bool);
}

/// Service-side handle used to push to one registered agent.
#[derive(Clone)]
pub struct WindowManagerAgentProxy {
    remote: RemoteRef,
}

impl WindowManagerAgentProxy {
    pub fn new(remote: RemoteRef) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    fn post(
        &self,
        code: AgentCode,
        write: impl FnOnce(&mut Parcel) -> Result<(), ParcelError>,
    ) -> Result<(), TransportError> {
        let mut data = Parcel::new();
        data.write_string(AGENT_DESCRIPTOR)?;
        write(&mut data)?;
        let mut reply = Parcel::new();
        self.remote
            .send_request(code as u32, &data, &mut reply, CallMode::OneWay)
    }

    pub fn update_focus_change_info(&self, info: &FocusChangeInfo, focused: bool) -> Result<(), TransportError> {
        self.post(AgentCode::UpdateFocus, |data| {
            info.marshal(data)?;
            data.write_bool(focused);
            Ok(())
        })
    }

    pub fn update_system_bar_region_tints(
        &self,
        display_id: u64,
        tints: &[SystemBarRegionTint],
    ) -> Result<(), TransportError> {
        self.post(AgentCode::UpdateSystemBarProps, |data| {
            data.write_u64(display_id);
            marshal_vec(data, tints)
        })
    }

    pub fn notify_accessibility_window_info(
        &self,
        infos: &[Arc<AccessibilityWindowInfo>],
        update_type: WindowUpdateType,
    ) -> Result<(), TransportError> {
        self.post(AgentCode::UpdateWindowStatus, |data| {
            marshal_shared_vec(data, infos)?;
            update_type.marshal(data)
        })
    }

    pub fn update_window_visibility_info(
        &self,
        infos: &[Arc<WindowVisibilityInfo>],
    ) -> Result<(), TransportError> {
        self.post(AgentCode::UpdateWindowVisibility, |data| marshal_shared_vec(data, infos))
    }

    pub fn update_camera_float_window_status(
        &self,
        access_token_id: u32,
        showing: bool,
    ) -> Result<(), TransportError> {
        self.post(AgentCode::UpdateCameraFloat, |data| {
            data.write_u32(access_token_id);
            data.write_bool(showing);
            Ok(())
        })
    }
}

pub struct WindowManagerAgentStub<A: ?Sized> {
    agent: Arc<A>,
}

impl<A: WindowManagerAgent + ?Sized> WindowManagerAgentStub<A> {
    pub fn new(agent: Arc<A>) -> Self {
        Self { agent }
    }

    fn dispatch(&self, code: AgentCode, data: &mut Parcel) -> Result<(), ParcelError> {
        match code {
            AgentCode::UpdateFocus => {
                let info = FocusChangeInfo::unmarshal(data)?;
                let focused = data.read_bool()?;
                self.agent.update_focus_change_info(info, focused);
            }
            AgentCode::UpdateSystemBarProps => {
                let display_id = data.read_u64()?;
                let tints = unmarshal_vec(data)?;
                self.agent.update_system_bar_region_tints(display_id, tints);
            }
            AgentCode::UpdateWindowStatus => {
                let infos = unmarshal_shared_vec(data)?;
                let update_type = WindowUpdateType::unmarshal(data)?;
                self.agent.notify_accessibility_window_info(infos, update_type);
            }
            AgentCode::UpdateWindowVisibility => {
                let infos = unmarshal_shared_vec(data)?;
                self.agent.update_window_visibility_info(infos);
            }
            AgentCode::UpdateCameraFloat => {
                let access_token_id = data.read_u32()?;
                let showing = data.read_bool()?;
                self.agent
                    .update_camera_float_window_status(access_token_id, showing);
            }
        }
        Ok(())
    }
}

impl<A: WindowManagerAgent + ?Sized + 'static> RemoteStub for WindowManagerAgentStub<A> {
    fn descriptor(&self) -> &'static str {
        AGENT_DESCRIPTOR
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
        let Ok(opcode) = AgentCode::try_from(code) else {
            return self.on_unknown_request(code, data, reply, mode);
        };
        self.dispatch(opcode, data).map_err(|e| {
            warn!("dropping malformed agent push {:?}: {}", opcode, e);
            TransportError::Rejected
        })
    }
}
