//! Per-window callback interface, service to client.

use std::sync::Arc;

use tracing::warn;

use crate::codes::WindowCallbackCode;
use crate::error::{ParcelError, TransportError};
use crate::parcel::{Parcel, Parcelable};
use crate::transport::{check_interface_token, CallMode, RemoteRef, RemoteStub};
use crate::types::{AvoidArea, AvoidAreaType, ModeSupport, Rect, WindowMode, WindowSizeChangeReason, WindowState};

pub const WINDOW_DESCRIPTOR: &str = "wmlink.IWindow";

pub trait WindowCallback: Send + Sync {
    fn update_window_rect(&self, rect: Rect, deco_status: bool, reason: WindowSizeChangeReason);

    fn update_window_mode(&self, mode: WindowMode);

    fn update_window_mode_support(&self, support: ModeSupport);

    fn update_focus_status(&self, focused: bool);

    fn update_avoid_area(&self, area: AvoidArea, area_type: AvoidAreaType);

    fn update_window_state(&self, state: WindowState);
}

#[derive(Clone)]
pub struct WindowCallbackProxy {
    remote: RemoteRef,
}

impl WindowCallbackProxy {
    pub fn new(remote: RemoteRef) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    fn post(
        &self,
        code: WindowCallbackCode,
        write: impl FnOnce(&mut Parcel) -> Result<(), ParcelError>,
    ) -> Result<(), TransportError> {
        let mut data = Parcel::new();
        data.write_string(WINDOW_DESCRIPTOR)?;
        write(&mut data)?;
        let mut reply = Parcel::new();
        self.remote
            .send_request(code as u32, &data, &mut reply, CallMode::OneWay)
    }

    pub fn update_window_rect(
        &self,
        rect: Rect,
        deco_status: bool,
        reason: WindowSizeChangeReason,
    ) -> Result<(), TransportError> {
        self.post(WindowCallbackCode::UpdateWindowRect, |data| {
            rect.marshal(data)?;
            data.write_bool(deco_status);
            reason.marshal(data)
        })
    }

    pub fn update_window_mode(&self, mode: WindowMode) -> Result<(), TransportError> {
        self.post(WindowCallbackCode::UpdateWindowMode, |data| mode.marshal(data))
    }

    pub fn update_window_mode_support(&self, support: ModeSupport) -> Result<(), TransportError> {
        self.post(WindowCallbackCode::UpdateModeSupportInfo, |data| {
            data.write_u32(support.bits());
            Ok(())
        })
    }

    pub fn update_focus_status(&self, focused: bool) -> Result<(), TransportError> {
        self.post(WindowCallbackCode::UpdateFocusStatus, |data| {
            data.write_bool(focused);
            Ok(())
        })
    }

    pub fn update_avoid_area(&self, area: &AvoidArea, area_type: AvoidAreaType) -> Result<(), TransportError> {
        self.post(WindowCallbackCode::UpdateAvoidArea, |data| {
            area.marshal(data)?;
            area_type.marshal(data)
        })
    }

    pub fn update_window_state(&self, state: WindowState) -> Result<(), TransportError> {
        self.post(WindowCallbackCode::UpdateWindowState, |data| state.marshal(data))
    }
}

pub struct WindowCallbackStub<W: ?Sized> {
    window: Arc<W>,
}

impl<W: WindowCallback + ?Sized> WindowCallbackStub<W> {
    pub fn new(window: Arc<W>) -> Self {
        Self { window }
    }

    fn dispatch(&self, code: WindowCallbackCode, data: &mut Parcel) -> Result<(), ParcelError> {
        match code {
            WindowCallbackCode::UpdateWindowRect => {
                let rect = Rect::unmarshal(data)?;
                let deco_status = data.read_bool()?;
                let reason = WindowSizeChangeReason::unmarshal(data)?;
                self.window.update_window_rect(rect, deco_status, reason);
            }
            WindowCallbackCode::UpdateWindowMode => {
                self.window.update_window_mode(WindowMode::unmarshal(data)?);
            }
            WindowCallbackCode::UpdateModeSupportInfo => {
                let support = ModeSupport::from_bits_truncate(data.read_u32()?);
                self.window.update_window_mode_support(support);
            }
            WindowCallbackCode::UpdateFocusStatus => {
                self.window.update_focus_status(data.read_bool()?);
            }
            WindowCallbackCode::UpdateAvoidArea => {
                let area = AvoidArea::unmarshal(data)?;
                let area_type = AvoidAreaType::unmarshal(data)?;
                self.window.update_avoid_area(area, area_type);
            }
            WindowCallbackCode::UpdateWindowState => {
                self.window.update_window_state(WindowState::unmarshal(data)?);
            }
        }
        Ok(())
    }
}

impl<W: WindowCallback + ?Sized + 'static> RemoteStub for WindowCallbackStub<W> {
    fn descriptor(&self) -> &'static str {
        WINDOW_DESCRIPTOR
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
        let Ok(opcode) = WindowCallbackCode::try_from(code) else {
            return self.on_unknown_request(code, data, reply, mode);
        };
        self.dispatch(opcode, data).map_err(|e| {
            warn!("dropping malformed window push {:?}: {}", opcode, e);
            TransportError::Rejected
        })
    }
}
