//! Payloads pushed from the service to notification agents, plus the
//! move/drag and system configuration records.

use serde::{Deserialize, Serialize};

use crate::error::ParcelError;
use crate::parcel::{Parcel, Parcelable};
use crate::types::{wire_enum, DragType, Rect, SystemBarProperty, WindowMode, WindowType};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FocusChangeInfo {
    pub window_id: u32,
    pub display_id: u64,
    pub pid: i32,
    pub uid: i32,
    pub window_type: WindowType,
}

impl Parcelable for FocusChangeInfo {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_u32(self.window_id);
        parcel.write_u64(self.display_id);
        parcel.write_i32(self.pid);
        parcel.write_i32(self.uid);
        self.window_type.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(FocusChangeInfo {
            window_id: parcel.read_u32()?,
            display_id: parcel.read_u64()?,
            pid: parcel.read_i32()?,
            uid: parcel.read_i32()?,
            window_type: WindowType::unmarshal(parcel)?,
        })
    }
}

/// Tint of one system bar together with the screen region it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemBarRegionTint {
    pub bar_type: WindowType,
    pub property: SystemBarProperty,
    pub region: Rect,
}

impl Parcelable for SystemBarRegionTint {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        self.bar_type.marshal(parcel)?;
        self.property.marshal(parcel)?;
        self.region.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(SystemBarRegionTint {
            bar_type: WindowType::unmarshal(parcel)?,
            property: SystemBarProperty::unmarshal(parcel)?,
            region: Rect::unmarshal(parcel)?,
        })
    }
}

wire_enum! {
    pub enum WindowUpdateType {
        Added = 1,
        Removed = 2,
        Focused = 3,
        Bounds = 4,
        Active = 5,
        Property = 6,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessibilityWindowInfo {
    pub window_id: u32,
    pub rect: Rect,
    pub focused: bool,
    pub decor_enabled: bool,
    pub display_id: u64,
    pub layer: u32,
    pub mode: WindowMode,
    pub window_type: WindowType,
}

impl Parcelable for AccessibilityWindowInfo {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_u32(self.window_id);
        self.rect.marshal(parcel)?;
        parcel.write_bool(self.focused);
        parcel.write_bool(self.decor_enabled);
        parcel.write_u64(self.display_id);
        parcel.write_u32(self.layer);
        self.mode.marshal(parcel)?;
        self.window_type.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(AccessibilityWindowInfo {
            window_id: parcel.read_u32()?,
            rect: Rect::unmarshal(parcel)?,
            focused: parcel.read_bool()?,
            decor_enabled: parcel.read_bool()?,
            display_id: parcel.read_u64()?,
            layer: parcel.read_u32()?,
            mode: WindowMode::unmarshal(parcel)?,
            window_type: WindowType::unmarshal(parcel)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowVisibilityInfo {
    pub window_id: u32,
    pub pid: i32,
    pub uid: i32,
    pub visible: bool,
    pub window_type: WindowType,
}

impl Parcelable for WindowVisibilityInfo {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_u32(self.window_id);
        parcel.write_i32(self.pid);
        parcel.write_i32(self.uid);
        parcel.write_bool(self.visible);
        self.window_type.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(WindowVisibilityInfo {
            window_id: parcel.read_u32()?,
            pid: parcel.read_i32()?,
            uid: parcel.read_i32()?,
            visible: parcel.read_bool()?,
            window_type: WindowType::unmarshal(parcel)?,
        })
    }
}

/// Transient pointer-gesture state of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveDragProperty {
    pub start_point_x: i32,
    pub start_point_y: i32,
    pub pointer_id: i32,
    pub source_type: i32,
    pub target_display_id: u64,
    pub drag_type: Option<DragType>,
    /// A pointer-down was recorded for this window.
    pub point_event_started: bool,
    pub start_drag: bool,
    pub start_move: bool,
    /// Window rect when the pointer went down.
    pub start_rect: Rect,
}

impl MoveDragProperty {
    pub fn is_gesture_active(&self) -> bool {
        self.start_drag || self.start_move
    }

    pub fn reset(&mut self) {
        *self = MoveDragProperty::default();
    }
}

impl Parcelable for MoveDragProperty {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_i32(self.start_point_x);
        parcel.write_i32(self.start_point_y);
        parcel.write_i32(self.pointer_id);
        parcel.write_i32(self.source_type);
        parcel.write_u64(self.target_display_id);
        self.drag_type.unwrap_or(DragType::Undefined).marshal(parcel)?;
        parcel.write_bool(self.point_event_started);
        parcel.write_bool(self.start_drag);
        parcel.write_bool(self.start_move);
        self.start_rect.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        let start_point_x = parcel.read_i32()?;
        let start_point_y = parcel.read_i32()?;
        let pointer_id = parcel.read_i32()?;
        let source_type = parcel.read_i32()?;
        let target_display_id = parcel.read_u64()?;
        let drag_type = match DragType::unmarshal(parcel)? {
            DragType::Undefined => None,
            other => Some(other),
        };
        Ok(MoveDragProperty {
            start_point_x,
            start_point_y,
            pointer_id,
            source_type,
            target_display_id,
            drag_type,
            point_event_started: parcel.read_bool()?,
            start_drag: parcel.read_bool()?,
            start_move: parcel.read_bool()?,
            start_rect: Rect::unmarshal(parcel)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    pub elevation: f32,
    /// `#RRGGBB` or `#AARRGGBB`.
    pub color: String,
    pub offset_x: f32,
    pub offset_y: f32,
    pub alpha: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            elevation: 0.0,
            color: "#000000".to_string(),
            offset_x: 0.0,
            offset_y: 0.0,
            alpha: 0.0,
        }
    }
}

impl Parcelable for ShadowConfig {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_f32(self.elevation);
        parcel.write_string(&self.color)?;
        parcel.write_f32(self.offset_x);
        parcel.write_f32(self.offset_y);
        parcel.write_f32(self.alpha);
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(ShadowConfig {
            elevation: parcel.read_f32()?,
            color: parcel.read_string()?,
            offset_x: parcel.read_f32()?,
            offset_y: parcel.read_f32()?,
            alpha: parcel.read_f32()?,
        })
    }
}

/// Service-wide window decoration defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub system_decor_enabled: bool,
    pub stretchable: bool,
    pub default_window_mode: WindowMode,
    pub corner_radius: f32,
    pub focused_shadow: ShadowConfig,
    pub unfocused_shadow: ShadowConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system_decor_enabled: true,
            stretchable: false,
            default_window_mode: WindowMode::Fullscreen,
            corner_radius: 0.0,
            focused_shadow: ShadowConfig::default(),
            unfocused_shadow: ShadowConfig::default(),
        }
    }
}

impl Parcelable for SystemConfig {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_bool(self.system_decor_enabled);
        parcel.write_bool(self.stretchable);
        self.default_window_mode.marshal(parcel)?;
        parcel.write_f32(self.corner_radius);
        self.focused_shadow.marshal(parcel)?;
        self.unfocused_shadow.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(SystemConfig {
            system_decor_enabled: parcel.read_bool()?,
            stretchable: parcel.read_bool()?,
            default_window_mode: WindowMode::unmarshal(parcel)?,
            corner_radius: parcel.read_f32()?,
            focused_shadow: ShadowConfig::unmarshal(parcel)?,
            unfocused_shadow: ShadowConfig::unmarshal(parcel)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcel::{marshal_shared_vec, unmarshal_shared_vec};
    use std::sync::Arc;

    #[test]
    fn test_accessibility_list_through_helpers() {
        let infos = vec![
            Arc::new(AccessibilityWindowInfo {
                window_id: 3,
                rect: Rect::new(0, 0, 800, 600),
                focused: true,
                mode: WindowMode::Floating,
                ..Default::default()
            }),
            Arc::new(AccessibilityWindowInfo {
                window_id: 4,
                window_type: WindowType::StatusBar,
                ..Default::default()
            }),
        ];
        let mut parcel = Parcel::new();
        marshal_shared_vec(&mut parcel, &infos).unwrap();

        let decoded = unmarshal_shared_vec::<AccessibilityWindowInfo>(&mut parcel).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(*decoded[0], *infos[0]);
        assert_eq!(decoded[1].window_type, WindowType::StatusBar);
    }

    #[test]
    fn test_undefined_drag_type_reads_as_none() {
        let property = MoveDragProperty {
            pointer_id: 2,
            start_drag: true,
            ..Default::default()
        };
        let mut parcel = Parcel::new();
        property.marshal(&mut parcel).unwrap();
        let decoded = MoveDragProperty::unmarshal(&mut parcel).unwrap();
        assert_eq!(decoded.drag_type, None);
        assert!(decoded.is_gesture_active());
    }

    #[test]
    fn test_truncated_focus_info_fails() {
        let mut parcel = Parcel::new();
        parcel.write_u32(7);
        assert!(FocusChangeInfo::unmarshal(&mut parcel).is_err());
    }
}
