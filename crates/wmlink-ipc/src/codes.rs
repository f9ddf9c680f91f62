//! Transaction opcode tables.
//!
//! Each interface has its own closed table. Numbers are part of the wire
//! protocol: append new codes, never renumber.

use serde::{Deserialize, Serialize};

use crate::error::ParcelError;
use crate::parcel::{Parcel, Parcelable};
use crate::types::wire_enum;

wire_enum! {
    /// Client to service.
    pub enum WindowManagerCode {
        CreateWindow = 1,
        AddWindow = 2,
        RemoveWindow = 3,
        DestroyWindow = 4,
        RequestFocus = 5,
        GetAvoidArea = 6,
        RegisterAgent = 7,
        UnregisterAgent = 8,
        NotifyReadyMoveOrDrag = 9,
        ProcessPointDown = 10,
        ProcessPointUp = 11,
        GetTopWindowId = 12,
        MinimizeAllAppWindows = 13,
        ToggleShownStateForAllAppWindows = 14,
        UpdateLayoutMode = 15,
        UpdateProperty = 16,
        GetAccessibilityWindowInfo = 17,
        GetVisibilityWindowInfo = 18,
        AnimationSetController = 19,
        GetSystemConfig = 20,
        GetModeChangeHotZones = 21,
        UpdateAvoidAreaListener = 22,
        GetSnapshot = 23,
    }
}

wire_enum! {
    /// Service to notification agent. All one-way.
    pub enum AgentCode {
        UpdateFocus = 1,
        UpdateSystemBarProps = 2,
        UpdateWindowStatus = 3,
        UpdateWindowVisibility = 4,
        UpdateCameraFloat = 5,
    }
}

wire_enum! {
    /// Service to window callback. All one-way.
    pub enum WindowCallbackCode {
        UpdateWindowRect = 1,
        UpdateWindowMode = 2,
        UpdateModeSupportInfo = 3,
        UpdateFocusStatus = 4,
        UpdateAvoidArea = 5,
        UpdateWindowState = 6,
    }
}
