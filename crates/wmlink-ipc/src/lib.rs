//! wmlink IPC protocol
//!
//! Wire types, marshalling and the three interfaces spoken between window
//! clients and the window-management service:
//!
//! - `IWindowManager` (client to service): `service`, `proxy`, `stub`
//! - `IWindowManagerAgent` (service to client pushes): `agent`
//! - `IWindow` (service to one client window): `window`
//!
//! `transport` abstracts over where a remote object lives; `framing` is the
//! byte layout used when it lives across a Unix socket.

pub mod agent;
pub mod codes;
pub mod error;
pub mod framing;
pub mod info;
pub mod parcel;
pub mod property;
pub mod proxy;
pub mod service;
pub mod stub;
pub mod transport;
pub mod types;
pub mod window;

pub use error::{ParcelError, TransportError, WmError, WmResult};
pub use parcel::{Parcel, Parcelable};
pub use property::{PropertyChangeAction, WindowProperty};
pub use proxy::WindowManagerProxy;
pub use service::WindowManagerService;
pub use stub::WindowManagerStub;
pub use transport::{CallMode, RemoteObject, RemoteRef, RemoteStub, StubObject};

/// Socket path for IPC communication
pub fn socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    std::path::PathBuf::from(runtime_dir).join("wmlink.sock")
}
