//! Value types that travel over the window-management protocol.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::ParcelError;
use crate::parcel::{Parcel, Parcelable};

/// Sentinel window id meaning "no window".
pub const INVALID_WINDOW_ID: u32 = 0;
pub const DEFAULT_DISPLAY_ID: u64 = 0;

/// Brightness value meaning "follow the system".
pub const UNDEFINED_BRIGHTNESS: f32 = -1.0;
pub const MINIMUM_BRIGHTNESS: f32 = 0.0;
pub const MAXIMUM_BRIGHTNESS: f32 = 1.0;

/// Declares a `u32`-backed enum that marshals as its discriminant and
/// rejects unknown values on read.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl TryFrom<u32> for $name {
            type Error = ParcelError;

            fn try_from(value: u32) -> Result<Self, ParcelError> {
                match value {
                    $( v if v == $value => Ok($name::$variant), )+
                    other => Err(ParcelError::InvalidValue {
                        field: stringify!($name),
                        value: other,
                    }),
                }
            }
        }

        impl Parcelable for $name {
            fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
                parcel.write_u32(*self as u32);
                Ok(())
            }

            fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
                Self::try_from(parcel.read_u32()?)
            }
        }
    };
}

pub(crate) use wire_enum;

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Half-open containment: left/top edges inside, right/bottom outside.
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        let right = self.x as i64 + self.width as i64;
        let bottom = self.y as i64 + self.height as i64;
        (px as i64) >= self.x as i64
            && (px as i64) < right
            && (py as i64) >= self.y as i64
            && (py as i64) < bottom
    }

    /// Shrink by `inset` on every side, saturating at zero size.
    pub fn inset(&self, inset: u32) -> Rect {
        let offset = i32::try_from(inset).unwrap_or(i32::MAX);
        let shrink = inset.saturating_mul(2);
        Rect {
            x: self.x.saturating_add(offset),
            y: self.y.saturating_add(offset),
            width: self.width.saturating_sub(shrink),
            height: self.height.saturating_sub(shrink),
        }
    }
}

impl Parcelable for Rect {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_i32(self.x);
        parcel.write_i32(self.y);
        parcel.write_u32(self.width);
        parcel.write_u32(self.height);
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(Rect {
            x: parcel.read_i32()?,
            y: parcel.read_i32()?,
            width: parcel.read_u32()?,
            height: parcel.read_u32()?,
        })
    }
}

/// Pivot plus scale, rotation and translation applied to a window surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub pivot_x: f32,
    pub pivot_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub rotation_z: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub translate_z: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pivot_x: 0.5,
            pivot_y: 0.5,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            rotation_z: 0.0,
            translate_x: 0.0,
            translate_y: 0.0,
            translate_z: 0.0,
        }
    }
}

impl Parcelable for Transform {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        for value in [
            self.pivot_x,
            self.pivot_y,
            self.scale_x,
            self.scale_y,
            self.rotation_x,
            self.rotation_y,
            self.rotation_z,
            self.translate_x,
            self.translate_y,
            self.translate_z,
        ] {
            parcel.write_f32(value);
        }
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(Transform {
            pivot_x: parcel.read_f32()?,
            pivot_y: parcel.read_f32()?,
            scale_x: parcel.read_f32()?,
            scale_y: parcel.read_f32()?,
            rotation_x: parcel.read_f32()?,
            rotation_y: parcel.read_f32()?,
            rotation_z: parcel.read_f32()?,
            translate_x: parcel.read_f32()?,
            translate_y: parcel.read_f32()?,
            translate_z: parcel.read_f32()?,
        })
    }
}

// ============================================================================
// Window classification
// ============================================================================

wire_enum! {
    pub enum WindowType {
        AppMainWindow = 1,
        Media = 1000,
        AppSubWindow = 1001,
        AppComponent = 1002,
        AppLaunching = 2000,
        DockSlice = 2001,
        IncomingCall = 2002,
        SearchingBar = 2003,
        SystemAlarmWindow = 2004,
        InputMethodFloat = 2005,
        Float = 2006,
        Toast = 2007,
        StatusBar = 2008,
        Panel = 2009,
        Keyguard = 2010,
        VolumeOverlay = 2011,
        NavigationBar = 2012,
        DraggingEffect = 2013,
        Pointer = 2014,
        LauncherRecent = 2015,
        LauncherDock = 2016,
        BootAnimation = 2017,
        FreezeDisplay = 2018,
        VoiceInteraction = 2019,
        FloatCamera = 2020,
        Placeholder = 2021,
        Dialog = 2022,
        Screenshot = 2023,
    }
}

impl Default for WindowType {
    fn default() -> Self {
        WindowType::AppMainWindow
    }
}

impl WindowType {
    pub fn is_main_window(self) -> bool {
        self == WindowType::AppMainWindow
    }

    pub fn is_sub_window(self) -> bool {
        (1000..2000).contains(&(self as u32))
    }

    pub fn is_app_window(self) -> bool {
        self.is_main_window() || self.is_sub_window()
    }

    pub fn is_system_window(self) -> bool {
        (self as u32) >= 2000
    }
}

wire_enum! {
    pub enum WindowMode {
        Undefined = 0,
        Fullscreen = 1,
        SplitPrimary = 2,
        SplitSecondary = 3,
        Floating = 4,
        Pip = 5,
    }
}

impl Default for WindowMode {
    fn default() -> Self {
        WindowMode::Undefined
    }
}

impl WindowMode {
    pub fn is_split(self) -> bool {
        matches!(self, WindowMode::SplitPrimary | WindowMode::SplitSecondary)
    }
}

bitflags! {
    /// Modes a window may enter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModeSupport: u32 {
        const FULLSCREEN = 1 << 0;
        const FLOATING = 1 << 1;
        const SPLIT_PRIMARY = 1 << 2;
        const SPLIT_SECONDARY = 1 << 3;
        const PIP = 1 << 4;
        const ALL = Self::FULLSCREEN.bits()
            | Self::FLOATING.bits()
            | Self::SPLIT_PRIMARY.bits()
            | Self::SPLIT_SECONDARY.bits()
            | Self::PIP.bits();
    }
}

impl Default for ModeSupport {
    fn default() -> Self {
        ModeSupport::ALL
    }
}

impl ModeSupport {
    /// `Undefined` is not a mode a window enters, so it is always allowed.
    pub fn supports(self, mode: WindowMode) -> bool {
        let bit = match mode {
            WindowMode::Fullscreen => ModeSupport::FULLSCREEN,
            WindowMode::Floating => ModeSupport::FLOATING,
            WindowMode::SplitPrimary => ModeSupport::SPLIT_PRIMARY,
            WindowMode::SplitSecondary => ModeSupport::SPLIT_SECONDARY,
            WindowMode::Pip => ModeSupport::PIP,
            WindowMode::Undefined => return true,
        };
        self.contains(bit)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WindowFlags: u32 {
        const NEED_AVOID = 1 << 0;
        const PARENT_LIMIT = 1 << 1;
        const SHOW_WHEN_LOCKED = 1 << 2;
        const FORBID_SPLIT_MOVE = 1 << 3;
        const WATER_MARK = 1 << 4;
    }
}

wire_enum! {
    /// Lifecycle stage of a window handle.
    pub enum WindowState {
        Initial = 0,
        Created = 1,
        Shown = 2,
        Hidden = 3,
        Frozen = 4,
        Unfrozen = 5,
        Destroyed = 6,
    }
}

impl WindowState {
    /// Registered and not torn down.
    pub fn is_valid(self) -> bool {
        !matches!(self, WindowState::Initial | WindowState::Destroyed)
    }
}

wire_enum! {
    pub enum WindowStateChangeReason {
        Normal = 0,
        Keyguard = 1,
        Toggling = 2,
    }
}

wire_enum! {
    pub enum AvoidAreaType {
        System = 0,
        Cutout = 1,
        SystemGesture = 2,
        Keyboard = 3,
    }
}

wire_enum! {
    pub enum Orientation {
        Unspecified = 0,
        Vertical = 1,
        Horizontal = 2,
        ReverseVertical = 3,
        ReverseHorizontal = 4,
        Sensor = 5,
        SensorVertical = 6,
        SensorHorizontal = 7,
    }
}

wire_enum! {
    pub enum WindowSizeChangeReason {
        Undefined = 0,
        Maximize = 1,
        Recover = 2,
        Rotation = 3,
        Drag = 4,
        DragStart = 5,
        DragEnd = 6,
        Resize = 7,
        Move = 8,
        Hide = 9,
        Transform = 10,
        FullToSplit = 11,
        SplitToFull = 12,
    }
}

wire_enum! {
    pub enum DragType {
        Undefined = 0,
        LeftOrRight = 1,
        BottomOrTop = 2,
        LeftTopCorner = 3,
        RightTopCorner = 4,
    }
}

wire_enum! {
    pub enum ColorSpace {
        Default = 0,
        WideGamut = 1,
    }
}

wire_enum! {
    pub enum WindowLayoutMode {
        Cascade = 0,
        Tile = 1,
    }
}

wire_enum! {
    pub enum AnimationFlag {
        None = 0,
        Default = 1,
        Custom = 2,
    }
}

wire_enum! {
    /// Which listener category a notification agent serves.
    pub enum WindowManagerAgentType {
        Focus = 1,
        SystemBar = 2,
        WindowUpdate = 3,
        WindowVisibility = 4,
        CameraFloat = 5,
    }
}

// ============================================================================
// Avoid areas and hot zones
// ============================================================================

/// Regions along each screen edge that content should stay clear of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvoidArea {
    pub top: Rect,
    pub left: Rect,
    pub right: Rect,
    pub bottom: Rect,
}

impl AvoidArea {
    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.left.is_empty() && self.right.is_empty() && self.bottom.is_empty()
    }
}

impl Parcelable for AvoidArea {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        self.top.marshal(parcel)?;
        self.left.marshal(parcel)?;
        self.right.marshal(parcel)?;
        self.bottom.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(AvoidArea {
            top: Rect::unmarshal(parcel)?,
            left: Rect::unmarshal(parcel)?,
            right: Rect::unmarshal(parcel)?,
            bottom: Rect::unmarshal(parcel)?,
        })
    }
}

/// Screen regions that snap a dragged window into another mode on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeChangeHotZones {
    pub fullscreen: Rect,
    pub primary: Rect,
    pub secondary: Rect,
}

impl ModeChangeHotZones {
    /// Mode a release at (`x`, `y`) snaps into, if any.
    pub fn mode_at(&self, x: i32, y: i32) -> Option<WindowMode> {
        if self.fullscreen.contains_point(x, y) {
            Some(WindowMode::Fullscreen)
        } else if self.primary.contains_point(x, y) {
            Some(WindowMode::SplitPrimary)
        } else if self.secondary.contains_point(x, y) {
            Some(WindowMode::SplitSecondary)
        } else {
            None
        }
    }
}

impl Parcelable for ModeChangeHotZones {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        self.fullscreen.marshal(parcel)?;
        self.primary.marshal(parcel)?;
        self.secondary.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(ModeChangeHotZones {
            fullscreen: Rect::unmarshal(parcel)?,
            primary: Rect::unmarshal(parcel)?,
            secondary: Rect::unmarshal(parcel)?,
        })
    }
}

// ============================================================================
// System bars
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemBarProperty {
    pub enable: bool,
    pub background_color: u32,
    pub content_color: u32,
}

impl Default for SystemBarProperty {
    fn default() -> Self {
        Self {
            enable: true,
            background_color: 0x6600_0000,
            content_color: 0xffff_ffff,
        }
    }
}

impl Parcelable for SystemBarProperty {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_bool(self.enable);
        parcel.write_u32(self.background_color);
        parcel.write_u32(self.content_color);
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(SystemBarProperty {
            enable: parcel.read_bool()?,
            background_color: parcel.read_u32()?,
            content_color: parcel.read_u32()?,
        })
    }
}

// ============================================================================
// Creation-time collaborators
// ============================================================================

/// Opaque handle to the backing surface a window renders into.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    pub surface_id: u64,
    pub name: String,
}

impl Parcelable for SurfaceDescriptor {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_u64(self.surface_id);
        parcel.write_string(&self.name)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(SurfaceDescriptor {
            surface_id: parcel.read_u64()?,
            name: parcel.read_string()?,
        })
    }
}

/// Captured window contents, RGBA8 row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Parcelable for Snapshot {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_u32(self.width);
        parcel.write_u32(self.height);
        parcel.write_bytes(&self.pixels)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        Ok(Snapshot {
            width: parcel.read_u32()?,
            height: parcel.read_u32()?,
            pixels: parcel.read_bytes()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains_point_half_open() {
        let rect = Rect::new(10, 20, 100, 50);
        assert!(rect.contains_point(10, 20));
        assert!(rect.contains_point(109, 69));
        assert!(!rect.contains_point(110, 30));
        assert!(!rect.contains_point(50, 70));
        assert!(!rect.contains_point(9, 30));
    }

    #[test]
    fn test_empty_rect_contains_nothing() {
        let rect = Rect::new(0, 0, 0, 10);
        assert!(rect.is_empty());
        assert!(!rect.contains_point(0, 0));
    }

    #[test]
    fn test_inset_saturates() {
        assert_eq!(Rect::new(10, 10, 100, 50).inset(5), Rect::new(15, 15, 90, 40));

        let gone = Rect::new(0, 0, 800, 600).inset(u32::MAX);
        assert!(gone.is_empty());
        assert_eq!(gone.x, i32::MAX);

        let edge = Rect::new(i32::MAX - 2, 0, 800, 600).inset(16);
        assert_eq!(edge.x, i32::MAX);
        assert_eq!(edge.width, 768);
    }

    #[test]
    fn test_mode_support() {
        let no_split = ModeSupport::FULLSCREEN | ModeSupport::FLOATING;
        assert!(no_split.supports(WindowMode::Floating));
        assert!(!no_split.supports(WindowMode::SplitPrimary));
        assert!(!no_split.supports(WindowMode::SplitSecondary));
        assert!(no_split.supports(WindowMode::Undefined));
        assert!(ModeSupport::ALL.supports(WindowMode::Pip));
    }

    #[test]
    fn test_window_type_classes() {
        assert!(WindowType::AppMainWindow.is_app_window());
        assert!(WindowType::AppSubWindow.is_sub_window());
        assert!(!WindowType::AppSubWindow.is_main_window());
        assert!(WindowType::StatusBar.is_system_window());
        assert!(!WindowType::FloatCamera.is_app_window());
    }

    #[test]
    fn test_unknown_enum_value_rejected() {
        let mut parcel = Parcel::new();
        parcel.write_u32(42);
        assert!(matches!(
            WindowMode::unmarshal(&mut parcel),
            Err(ParcelError::InvalidValue { field: "WindowMode", value: 42 })
        ));
    }

    #[test]
    fn test_hot_zone_priority() {
        let zones = ModeChangeHotZones {
            fullscreen: Rect::new(0, 0, 1920, 50),
            primary: Rect::new(0, 0, 50, 1080),
            secondary: Rect::new(1870, 0, 50, 1080),
        };
        assert_eq!(zones.mode_at(10, 10), Some(WindowMode::Fullscreen));
        assert_eq!(zones.mode_at(10, 500), Some(WindowMode::SplitPrimary));
        assert_eq!(zones.mode_at(1900, 500), Some(WindowMode::SplitSecondary));
        assert_eq!(zones.mode_at(900, 500), None);
    }

    #[test]
    fn test_state_validity() {
        assert!(!WindowState::Initial.is_valid());
        assert!(!WindowState::Destroyed.is_valid());
        assert!(WindowState::Frozen.is_valid());
    }
}
