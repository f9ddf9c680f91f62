//! Window property snapshot and its per-field change marshalling.
//!
//! A full property travels on create/add. Afterwards only deltas travel:
//! `UpdateProperty` carries a `PropertyChangeAction` bit-set and the writer
//! emits the window id followed by the fields of each set bit, in bit
//! order. The reader walks the same bits, so both sides stay in lock-step
//! as long as they share this file.

use bitflags::bitflags;

use crate::error::ParcelError;
use crate::parcel::{marshal_vec, unmarshal_vec, Parcel, Parcelable};
use crate::types::{
    AnimationFlag, ColorSpace, DragType, ModeSupport, Orientation, Rect, SystemBarProperty,
    Transform, WindowFlags, WindowMode, WindowSizeChangeReason, WindowType, DEFAULT_DISPLAY_ID,
    INVALID_WINDOW_ID, UNDEFINED_BRIGHTNESS,
};

bitflags! {
    /// Property sub-fields carried by one `UpdateProperty` transaction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyChangeAction: u32 {
        const RECT = 1 << 0;
        const MODE = 1 << 1;
        const FLAGS = 1 << 2;
        /// System bar properties.
        const OTHER_PROPS = 1 << 3;
        const FOCUSABLE = 1 << 4;
        const TOUCHABLE = 1 << 5;
        const CALLING_WINDOW = 1 << 6;
        const ORIENTATION = 1 << 7;
        const TURN_SCREEN_ON = 1 << 8;
        const KEEP_SCREEN_ON = 1 << 9;
        const BRIGHTNESS = 1 << 10;
        const MODE_SUPPORT_INFO = 1 << 11;
        const TOUCH_HOT_AREA = 1 << 12;
        const TRANSFORM = 1 << 13;
        const ANIMATION_FLAG = 1 << 14;
        const PRIVACY_MODE = 1 << 15;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowProperty {
    pub name: String,
    pub window_id: u32,
    pub parent_id: u32,
    pub display_id: u64,
    pub window_type: WindowType,
    pub mode: WindowMode,
    pub last_mode: WindowMode,
    pub flags: WindowFlags,
    /// Rect the client asked for.
    pub request_rect: Rect,
    /// Rect the service actually laid out.
    pub window_rect: Rect,
    /// Rect at the start of the current drag.
    pub origin_rect: Rect,
    pub deco_status: bool,
    pub drag_type: DragType,
    pub size_change_reason: WindowSizeChangeReason,
    pub focusable: bool,
    pub touchable: bool,
    pub full_screen: bool,
    pub transparent: bool,
    pub brightness: f32,
    pub transform: Transform,
    pub privacy_mode: bool,
    pub system_privacy_mode: bool,
    pub touch_hot_areas: Vec<Rect>,
    pub calling_window: u32,
    pub requested_orientation: Orientation,
    pub turn_screen_on: bool,
    pub keep_screen_on: bool,
    pub animation_flag: AnimationFlag,
    pub mode_support: ModeSupport,
    pub request_mode_support: ModeSupport,
    pub status_bar: SystemBarProperty,
    pub navigation_bar: SystemBarProperty,
    pub access_token_id: u32,

    // Render parameters. These stay in the client process.
    pub corner_radius: f32,
    pub shadow_radius: f32,
    pub shadow_color: u32,
    pub shadow_offset_x: f32,
    pub shadow_offset_y: f32,
    pub alpha: f32,
    pub color_space: ColorSpace,
}

impl Default for WindowProperty {
    fn default() -> Self {
        Self {
            name: String::new(),
            window_id: INVALID_WINDOW_ID,
            parent_id: INVALID_WINDOW_ID,
            display_id: DEFAULT_DISPLAY_ID,
            window_type: WindowType::AppMainWindow,
            mode: WindowMode::Undefined,
            last_mode: WindowMode::Undefined,
            flags: WindowFlags::empty(),
            request_rect: Rect::default(),
            window_rect: Rect::default(),
            origin_rect: Rect::default(),
            deco_status: false,
            drag_type: DragType::Undefined,
            size_change_reason: WindowSizeChangeReason::Undefined,
            focusable: true,
            touchable: true,
            full_screen: true,
            transparent: false,
            brightness: UNDEFINED_BRIGHTNESS,
            transform: Transform::default(),
            privacy_mode: false,
            system_privacy_mode: false,
            touch_hot_areas: Vec::new(),
            calling_window: INVALID_WINDOW_ID,
            requested_orientation: Orientation::Unspecified,
            turn_screen_on: false,
            keep_screen_on: false,
            animation_flag: AnimationFlag::Default,
            mode_support: ModeSupport::ALL,
            request_mode_support: ModeSupport::ALL,
            status_bar: SystemBarProperty::default(),
            navigation_bar: SystemBarProperty::default(),
            access_token_id: 0,
            corner_radius: 0.0,
            shadow_radius: 0.0,
            shadow_color: 0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            alpha: 1.0,
            color_space: ColorSpace::Default,
        }
    }
}

impl WindowProperty {
    pub fn new(name: impl Into<String>, window_type: WindowType) -> Self {
        Self {
            name: name.into(),
            window_type,
            ..Default::default()
        }
    }

    pub fn set_mode(&mut self, mode: WindowMode) {
        if self.mode != mode {
            self.last_mode = self.mode;
            self.mode = mode;
        }
    }

    /// Write the window id and the fields selected by `action`.
    pub fn write_changes(
        &self,
        parcel: &mut Parcel,
        action: PropertyChangeAction,
    ) -> Result<(), ParcelError> {
        parcel.write_u32(self.window_id);
        for flag in action.iter() {
            self.write_field(parcel, flag)?;
        }
        Ok(())
    }

    fn write_field(&self, parcel: &mut Parcel, flag: PropertyChangeAction) -> Result<(), ParcelError> {
        match flag {
            PropertyChangeAction::RECT => {
                parcel.write_bool(self.deco_status);
                self.drag_type.marshal(parcel)?;
                self.origin_rect.marshal(parcel)?;
                self.request_rect.marshal(parcel)?;
                self.size_change_reason.marshal(parcel)?;
            }
            PropertyChangeAction::MODE => self.mode.marshal(parcel)?,
            PropertyChangeAction::FLAGS => parcel.write_u32(self.flags.bits()),
            PropertyChangeAction::OTHER_PROPS => {
                self.status_bar.marshal(parcel)?;
                self.navigation_bar.marshal(parcel)?;
            }
            PropertyChangeAction::FOCUSABLE => parcel.write_bool(self.focusable),
            PropertyChangeAction::TOUCHABLE => parcel.write_bool(self.touchable),
            PropertyChangeAction::CALLING_WINDOW => parcel.write_u32(self.calling_window),
            PropertyChangeAction::ORIENTATION => self.requested_orientation.marshal(parcel)?,
            PropertyChangeAction::TURN_SCREEN_ON => parcel.write_bool(self.turn_screen_on),
            PropertyChangeAction::KEEP_SCREEN_ON => parcel.write_bool(self.keep_screen_on),
            PropertyChangeAction::BRIGHTNESS => parcel.write_f32(self.brightness),
            PropertyChangeAction::MODE_SUPPORT_INFO => parcel.write_u32(self.mode_support.bits()),
            PropertyChangeAction::TOUCH_HOT_AREA => marshal_vec(parcel, &self.touch_hot_areas)?,
            PropertyChangeAction::TRANSFORM => self.transform.marshal(parcel)?,
            PropertyChangeAction::ANIMATION_FLAG => self.animation_flag.marshal(parcel)?,
            PropertyChangeAction::PRIVACY_MODE => parcel.write_bool(self.privacy_mode),
            _ => {}
        }
        Ok(())
    }

    /// Mirror of `write_changes`: set the window id and the selected fields.
    pub fn read_changes(
        &mut self,
        parcel: &mut Parcel,
        action: PropertyChangeAction,
    ) -> Result<(), ParcelError> {
        self.window_id = parcel.read_u32()?;
        for flag in action.iter() {
            self.read_field(parcel, flag)?;
        }
        Ok(())
    }

    fn read_field(&mut self, parcel: &mut Parcel, flag: PropertyChangeAction) -> Result<(), ParcelError> {
        match flag {
            PropertyChangeAction::RECT => {
                self.deco_status = parcel.read_bool()?;
                self.drag_type = DragType::unmarshal(parcel)?;
                self.origin_rect = Rect::unmarshal(parcel)?;
                self.request_rect = Rect::unmarshal(parcel)?;
                self.size_change_reason = WindowSizeChangeReason::unmarshal(parcel)?;
            }
            PropertyChangeAction::MODE => self.mode = WindowMode::unmarshal(parcel)?,
            PropertyChangeAction::FLAGS => {
                self.flags = WindowFlags::from_bits_truncate(parcel.read_u32()?)
            }
            PropertyChangeAction::OTHER_PROPS => {
                self.status_bar = SystemBarProperty::unmarshal(parcel)?;
                self.navigation_bar = SystemBarProperty::unmarshal(parcel)?;
            }
            PropertyChangeAction::FOCUSABLE => self.focusable = parcel.read_bool()?,
            PropertyChangeAction::TOUCHABLE => self.touchable = parcel.read_bool()?,
            PropertyChangeAction::CALLING_WINDOW => self.calling_window = parcel.read_u32()?,
            PropertyChangeAction::ORIENTATION => {
                self.requested_orientation = Orientation::unmarshal(parcel)?
            }
            PropertyChangeAction::TURN_SCREEN_ON => self.turn_screen_on = parcel.read_bool()?,
            PropertyChangeAction::KEEP_SCREEN_ON => self.keep_screen_on = parcel.read_bool()?,
            PropertyChangeAction::BRIGHTNESS => self.brightness = parcel.read_f32()?,
            PropertyChangeAction::MODE_SUPPORT_INFO => {
                self.mode_support = ModeSupport::from_bits_truncate(parcel.read_u32()?)
            }
            PropertyChangeAction::TOUCH_HOT_AREA => self.touch_hot_areas = unmarshal_vec(parcel)?,
            PropertyChangeAction::TRANSFORM => self.transform = Transform::unmarshal(parcel)?,
            PropertyChangeAction::ANIMATION_FLAG => {
                self.animation_flag = AnimationFlag::unmarshal(parcel)?
            }
            PropertyChangeAction::PRIVACY_MODE => self.privacy_mode = parcel.read_bool()?,
            _ => {}
        }
        Ok(())
    }

    /// Copy the fields selected by `action` from `other`. Returns whether
    /// anything changed.
    pub fn apply_changes(&mut self, other: &WindowProperty, action: PropertyChangeAction) -> bool {
        let before = self.clone();
        for flag in action.iter() {
            match flag {
                PropertyChangeAction::RECT => {
                    self.deco_status = other.deco_status;
                    self.drag_type = other.drag_type;
                    self.origin_rect = other.origin_rect;
                    self.request_rect = other.request_rect;
                    self.size_change_reason = other.size_change_reason;
                }
                PropertyChangeAction::MODE => self.set_mode(other.mode),
                PropertyChangeAction::FLAGS => self.flags = other.flags,
                PropertyChangeAction::OTHER_PROPS => {
                    self.status_bar = other.status_bar;
                    self.navigation_bar = other.navigation_bar;
                }
                PropertyChangeAction::FOCUSABLE => self.focusable = other.focusable,
                PropertyChangeAction::TOUCHABLE => self.touchable = other.touchable,
                PropertyChangeAction::CALLING_WINDOW => self.calling_window = other.calling_window,
                PropertyChangeAction::ORIENTATION => {
                    self.requested_orientation = other.requested_orientation
                }
                PropertyChangeAction::TURN_SCREEN_ON => self.turn_screen_on = other.turn_screen_on,
                PropertyChangeAction::KEEP_SCREEN_ON => self.keep_screen_on = other.keep_screen_on,
                PropertyChangeAction::BRIGHTNESS => self.brightness = other.brightness,
                PropertyChangeAction::MODE_SUPPORT_INFO => self.mode_support = other.mode_support,
                PropertyChangeAction::TOUCH_HOT_AREA => {
                    self.touch_hot_areas = other.touch_hot_areas.clone()
                }
                PropertyChangeAction::TRANSFORM => self.transform = other.transform,
                PropertyChangeAction::ANIMATION_FLAG => self.animation_flag = other.animation_flag,
                PropertyChangeAction::PRIVACY_MODE => self.privacy_mode = other.privacy_mode,
                _ => {}
            }
        }
        *self != before
    }
}

/// Full snapshot, used on create and add. Render parameters are not sent.
impl Parcelable for WindowProperty {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_string(&self.name)?;
        parcel.write_u32(self.window_id);
        parcel.write_u32(self.parent_id);
        parcel.write_u64(self.display_id);
        self.window_type.marshal(parcel)?;
        self.mode.marshal(parcel)?;
        self.last_mode.marshal(parcel)?;
        parcel.write_u32(self.flags.bits());
        self.request_rect.marshal(parcel)?;
        self.window_rect.marshal(parcel)?;
        self.origin_rect.marshal(parcel)?;
        parcel.write_bool(self.deco_status);
        self.drag_type.marshal(parcel)?;
        self.size_change_reason.marshal(parcel)?;
        parcel.write_bool(self.focusable);
        parcel.write_bool(self.touchable);
        parcel.write_bool(self.full_screen);
        parcel.write_bool(self.transparent);
        parcel.write_f32(self.brightness);
        self.transform.marshal(parcel)?;
        parcel.write_bool(self.privacy_mode);
        parcel.write_bool(self.system_privacy_mode);
        marshal_vec(parcel, &self.touch_hot_areas)?;
        parcel.write_u32(self.calling_window);
        self.requested_orientation.marshal(parcel)?;
        parcel.write_bool(self.turn_screen_on);
        parcel.write_bool(self.keep_screen_on);
        self.animation_flag.marshal(parcel)?;
        parcel.write_u32(self.mode_support.bits());
        parcel.write_u32(self.request_mode_support.bits());
        self.status_bar.marshal(parcel)?;
        self.navigation_bar.marshal(parcel)?;
        parcel.write_u32(self.access_token_id);
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(WindowProperty {
            name: parcel.read_string()?,
            window_id: parcel.read_u32()?,
            parent_id: parcel.read_u32()?,
            display_id: parcel.read_u64()?,
            window_type: WindowType::unmarshal(parcel)?,
            mode: WindowMode::unmarshal(parcel)?,
            last_mode: WindowMode::unmarshal(parcel)?,
            flags: WindowFlags::from_bits_truncate(parcel.read_u32()?),
            request_rect: Rect::unmarshal(parcel)?,
            window_rect: Rect::unmarshal(parcel)?,
            origin_rect: Rect::unmarshal(parcel)?,
            deco_status: parcel.read_bool()?,
            drag_type: DragType::unmarshal(parcel)?,
            size_change_reason: WindowSizeChangeReason::unmarshal(parcel)?,
            focusable: parcel.read_bool()?,
            touchable: parcel.read_bool()?,
            full_screen: parcel.read_bool()?,
            transparent: parcel.read_bool()?,
            brightness: parcel.read_f32()?,
            transform: Transform::unmarshal(parcel)?,
            privacy_mode: parcel.read_bool()?,
            system_privacy_mode: parcel.read_bool()?,
            touch_hot_areas: unmarshal_vec(parcel)?,
            calling_window: parcel.read_u32()?,
            requested_orientation: Orientation::unmarshal(parcel)?,
            turn_screen_on: parcel.read_bool()?,
            keep_screen_on: parcel.read_bool()?,
            animation_flag: AnimationFlag::unmarshal(parcel)?,
            mode_support: ModeSupport::from_bits_truncate(parcel.read_u32()?),
            request_mode_support: ModeSupport::from_bits_truncate(parcel.read_u32()?),
            status_bar: SystemBarProperty::unmarshal(parcel)?,
            navigation_bar: SystemBarProperty::unmarshal(parcel)?,
            access_token_id: parcel.read_u32()?,
            ..Default::default()
        })
    }
}
