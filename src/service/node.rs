//! Service-side record of one client window.

use wmlink_ipc::info::{AccessibilityWindowInfo, FocusChangeInfo, MoveDragProperty, WindowVisibilityInfo};
use wmlink_ipc::transport::CallerIdentity;
use wmlink_ipc::types::{Snapshot, SurfaceDescriptor};
use wmlink_ipc::window::WindowCallbackProxy;
use wmlink_ipc::{RemoteRef, WindowProperty};

pub struct WindowNode {
    /// Authoritative property.
    pub property: WindowProperty,
    pub callback: WindowCallbackProxy,
    pub surface: SurfaceDescriptor,
    pub token: Option<RemoteRef>,
    pub shown: bool,
    pub owner: CallerIdentity,
    pub avoid_area_listener: bool,
    pub move_drag: MoveDragProperty,
    pub snapshot: Option<Snapshot>,
}

impl WindowNode {
    pub fn new(
        property: WindowProperty,
        callback: RemoteRef,
        surface: SurfaceDescriptor,
        token: Option<RemoteRef>,
        owner: CallerIdentity,
    ) -> Self {
        Self {
            property,
            callback: WindowCallbackProxy::new(callback),
            surface,
            token,
            shown: false,
            owner,
            avoid_area_listener: false,
            move_drag: MoveDragProperty::default(),
            snapshot: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.property.window_id
    }

    /// False once the owning client disconnected.
    pub fn is_alive(&self) -> bool {
        self.callback.remote().is_alive()
    }

    pub fn focus_info(&self) -> FocusChangeInfo {
        FocusChangeInfo {
            window_id: self.id(),
            display_id: self.property.display_id,
            pid: self.owner.pid,
            uid: self.owner.uid,
            window_type: self.property.window_type,
        }
    }

    pub fn visibility_info(&self) -> WindowVisibilityInfo {
        WindowVisibilityInfo {
            window_id: self.id(),
            pid: self.owner.pid,
            uid: self.owner.uid,
            visible: self.shown,
            window_type: self.property.window_type,
        }
    }

    pub fn accessibility_info(&self, focused: bool, layer: u32) -> AccessibilityWindowInfo {
        AccessibilityWindowInfo {
            window_id: self.id(),
            rect: self.property.window_rect,
            focused,
            decor_enabled: self.property.deco_status,
            display_id: self.property.display_id,
            layer,
            mode: self.property.mode,
            window_type: self.property.window_type,
        }
    }
}
