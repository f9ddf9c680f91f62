//! Error types shared by both ends of the window-management protocol.
//!
//! `WmError` is the closed status enumeration carried on the wire as an
//! `i32`. Success is `Ok(())`, so code 0 has no variant. Transport and
//! decoding problems have their own types and are folded into
//! `WmError::IpcFailed` at the proxy boundary.

use thiserror::Error;

/// Status codes returned by every fallible protocol operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WmError {
    /// The service decided no state change was needed.
    #[error("no change required")]
    DoNothing,

    #[error("out of memory")]
    NoMem,

    #[error("object already destroyed")]
    DestroyedObject,

    /// The handle is in a state that does not accept this operation.
    #[error("invalid window")]
    InvalidWindow,

    #[error("window mode or size not supported")]
    InvalidWindowModeOrSize,

    #[error("operation not applicable in the current state")]
    InvalidOperation,

    #[error("permission denied")]
    InvalidPermission,

    /// The service endpoint could not be located at all.
    #[error("window manager service unavailable")]
    Samgr,

    /// Serialization failed locally or the transport could not complete the call.
    #[error("ipc failed")]
    IpcFailed,

    #[error("operation not applicable to this window type")]
    InvalidType,

    #[error("required collaborator is missing")]
    Nullptr,

    #[error("invalid parameter")]
    InvalidParam,

    /// A status code this build does not know about.
    #[error("unknown status code {0}")]
    Unknown(i32),
}

pub type WmResult<T> = Result<T, WmError>;

impl WmError {
    pub const fn code(self) -> i32 {
        match self {
            WmError::DoNothing => 1,
            WmError::NoMem => 2,
            WmError::DestroyedObject => 3,
            WmError::InvalidWindow => 4,
            WmError::InvalidWindowModeOrSize => 5,
            WmError::InvalidOperation => 6,
            WmError::InvalidPermission => 7,
            WmError::Samgr => 100,
            WmError::IpcFailed => 101,
            WmError::InvalidType => 110,
            WmError::Nullptr => 120,
            WmError::InvalidParam => 130,
            WmError::Unknown(code) => code,
        }
    }

    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => WmError::DoNothing,
            2 => WmError::NoMem,
            3 => WmError::DestroyedObject,
            4 => WmError::InvalidWindow,
            5 => WmError::InvalidWindowModeOrSize,
            6 => WmError::InvalidOperation,
            7 => WmError::InvalidPermission,
            100 => WmError::Samgr,
            101 => WmError::IpcFailed,
            110 => WmError::InvalidType,
            120 => WmError::Nullptr,
            130 => WmError::InvalidParam,
            other => WmError::Unknown(other),
        }
    }

    /// Whether the service considers the requested state already in place.
    pub const fn is_converged(self) -> bool {
        matches!(self, WmError::DoNothing)
    }
}

/// Encode a status for the wire. `Ok` is 0.
pub fn status_code(result: &WmResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// Decode a wire status.
pub fn status_from_code(code: i32) -> WmResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(WmError::from_code(code))
    }
}

/// Treat `DoNothing` as success, for callers that only care about convergence.
pub fn converged(result: WmResult<()>) -> WmResult<()> {
    match result {
        Err(e) if e.is_converged() => Ok(()),
        other => other,
    }
}

/// Failures while reading a transaction buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParcelError {
    #[error("read of {wanted} bytes at offset {offset} overruns buffer of {len}")]
    ShortRead {
        offset: usize,
        wanted: usize,
        len: usize,
    },

    #[error("invalid bool byte {0:#x}")]
    InvalidBool(u8),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("sequence length {0} exceeds limit")]
    SequenceTooLong(u32),

    #[error("no remote object at index {0}")]
    MissingObject(u32),

    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u32 },
}

/// Failures reported by a channel when a transaction cannot complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is gone; the handle will never work again.
    #[error("remote object is dead")]
    DeadObject,

    #[error("unknown handle {0}")]
    UnknownHandle(u64),

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("i/o error: {0}")]
    Io(String),

    /// This direction of the channel only carries one-way calls.
    #[error("synchronous call not supported on this handle")]
    Unsupported,

    /// The stub rejected the request (token mismatch or undecodable arguments).
    #[error("transaction rejected by stub")]
    Rejected,
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

impl From<ParcelError> for TransportError {
    fn from(e: ParcelError) -> Self {
        TransportError::Malformed(e.to_string())
    }
}
