//! Remote object abstraction.
//!
//! Anything that can receive a transaction implements `RemoteObject`: a
//! local stub wrapped in `StubObject`, or a connection-backed handle owned by
//! a transport. Proxies only ever hold a `RemoteRef`, so the same proxy code
//! runs in-process and across a socket.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::parcel::Parcel;

pub type RemoteRef = Arc<dyn RemoteObject>;

/// Code answered by every stub's fallback handler.
pub const PING_TRANSACTION: u32 = 0x5f50_4e47;
/// Fallback code that replies with the interface descriptor.
pub const INTERFACE_TRANSACTION: u32 = 0x5f4e_5446;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    /// Block until the reply parcel is filled.
    #[default]
    Sync,
    /// Fire and forget; the reply parcel stays empty.
    OneWay,
}

impl CallMode {
    pub const fn flags(self) -> u32 {
        match self {
            CallMode::Sync => 0,
            CallMode::OneWay => 1,
        }
    }

    pub const fn from_flags(flags: u32) -> Self {
        if flags & 1 == 1 {
            CallMode::OneWay
        } else {
            CallMode::Sync
        }
    }
}

pub trait RemoteObject: Send + Sync {
    fn send_request(
        &self,
        code: u32,
        data: &Parcel,
        reply: &mut Parcel,
        mode: CallMode,
    ) -> Result<(), TransportError>;

    /// False once the owning peer has gone away.
    fn is_alive(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;
}

/// Identity comparison for remote references.
pub fn same_object(a: &RemoteRef, b: &RemoteRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Server side of an interface.
pub trait RemoteStub: Send + Sync {
    /// Interface-identity token expected at the head of every request.
    fn descriptor(&self) -> &'static str;

    fn on_remote_request(
        &self,
        code: u32,
        data: &mut Parcel,
        reply: &mut Parcel,
        mode: CallMode,
    ) -> Result<(), TransportError>;

    /// Handles codes the interface does not define.
    fn on_unknown_request(
        &self,
        code: u32,
        _data: &mut Parcel,
        reply: &mut Parcel,
        _mode: CallMode,
    ) -> Result<(), TransportError> {
        match code {
            PING_TRANSACTION => {
                reply.write_i32(0);
                Ok(())
            }
            INTERFACE_TRANSACTION => {
                reply.write_string(self.descriptor())?;
                Ok(())
            }
            _ => {
                warn!("{}: unknown transaction code {}", self.descriptor(), code);
                Err(TransportError::Rejected)
            }
        }
    }
}

/// Read the interface token and compare it to the stub's descriptor.
pub fn check_interface_token(stub: &dyn RemoteStub, data: &mut Parcel) -> bool {
    match data.read_string() {
        Ok(token) if token == stub.descriptor() => true,
        Ok(token) => {
            warn!(
                "interface token mismatch: expected {}, got {}",
                stub.descriptor(),
                token
            );
            false
        }
        Err(e) => {
            warn!("missing interface token: {}", e);
            false
        }
    }
}

/// Makes a local stub addressable as a remote object.
pub struct StubObject<S> {
    stub: S,
}

impl<S: RemoteStub + 'static> StubObject<S> {
    pub fn new(stub: S) -> Self {
        Self { stub }
    }

    pub fn into_remote(stub: S) -> RemoteRef {
        Arc::new(Self::new(stub))
    }

    pub fn stub(&self) -> &S {
        &self.stub
    }
}

impl<S: RemoteStub + 'static> RemoteObject for StubObject<S> {
    fn send_request(
        &self,
        code: u32,
        data: &Parcel,
        reply: &mut Parcel,
        mode: CallMode,
    ) -> Result<(), TransportError> {
        let mut data = data.clone();
        data.rewind();
        let mut scratch = Parcel::new();
        let out = match mode {
            CallMode::Sync => &mut *reply,
            CallMode::OneWay => &mut scratch,
        };
        self.stub.on_remote_request(code, &mut data, out, mode)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Objects one side of a connection has exported, keyed by handle id.
///
/// Handle 0 is reserved for the service root. An object keeps its id until
/// it is released, so the peer sees a stable identity. Ids are never reused.
#[derive(Default)]
pub struct HandleTable {
    next_id: u64,
    by_id: HashMap<u64, RemoteRef>,
    by_ptr: HashMap<usize, u64>,
}

pub const ROOT_HANDLE: u64 = 0;

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next_id: ROOT_HANDLE + 1,
            ..Default::default()
        }
    }

    pub fn with_root(root: RemoteRef) -> Self {
        let mut table = Self::new();
        table.by_ptr.insert(ptr_key(&root), ROOT_HANDLE);
        table.by_id.insert(ROOT_HANDLE, root);
        table
    }

    /// Id for `object`, allocating one on first export.
    pub fn export(&mut self, object: &RemoteRef) -> u64 {
        let key = ptr_key(object);
        if let Some(id) = self.by_ptr.get(&key) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_ptr.insert(key, id);
        self.by_id.insert(id, Arc::clone(object));
        debug!("exported local object as handle {}", id);
        id
    }

    pub fn get(&self, id: u64) -> Option<RemoteRef> {
        self.by_id.get(&id).cloned()
    }

    /// Drop the table's reference to `object`. The root is never released.
    pub fn release(&mut self, object: &RemoteRef) -> bool {
        let key = ptr_key(object);
        match self.by_ptr.get(&key) {
            Some(&ROOT_HANDLE) | None => false,
            Some(&id) => {
                self.by_ptr.remove(&key);
                self.by_id.remove(&id);
                debug!("released handle {}", id);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn ptr_key(object: &RemoteRef) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

/// Process credentials of whoever issued the transaction being handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub pid: i32,
    pub uid: i32,
}

impl CallerIdentity {
    pub fn current_process() -> Self {
        Self {
            pid: std::process::id() as i32,
            uid: unsafe { libc::getuid() } as i32,
        }
    }
}

thread_local! {
    static CALLING_IDENTITY: Cell<Option<CallerIdentity>> = const { Cell::new(None) };
}

/// Identity of the current caller. Outside a transport dispatch this is
/// the local process.
pub fn calling_identity() -> CallerIdentity {
    CALLING_IDENTITY
        .with(Cell::get)
        .unwrap_or_else(CallerIdentity::current_process)
}

/// Run `f` with `identity` reported as the caller.
pub fn with_calling_identity<R>(identity: CallerIdentity, f: impl FnOnce() -> R) -> R {
    let _restore = IdentityGuard {
        previous: CALLING_IDENTITY.with(|cell| cell.replace(Some(identity))),
    };
    f()
}

// Puts the outer identity back even when the handler unwinds.
struct IdentityGuard {
    previous: Option<CallerIdentity>,
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        CALLING_IDENTITY.with(|cell| cell.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl RemoteStub for Echo {
        fn descriptor(&self) -> &'static str {
            "test.Echo"
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
            match code {
                1 => {
                    let value = data.read_u32()?;
                    reply.write_u32(value + 1);
                    Ok(())
                }
                _ => self.on_unknown_request(code, data, reply, mode),
            }
        }
    }

    fn request(token: &str, value: u32) -> Parcel {
        let mut data = Parcel::new();
        data.write_string(token).unwrap();
        data.write_u32(value);
        data
    }

    #[test]
    fn test_stub_object_dispatches_sync() {
        let echo = StubObject::into_remote(Echo);
        let mut reply = Parcel::new();
        echo.send_request(1, &request("test.Echo", 41), &mut reply, CallMode::Sync)
            .unwrap();
        assert_eq!(reply.read_u32().unwrap(), 42);
    }

    #[test]
    fn test_one_way_leaves_reply_empty() {
        let echo = StubObject::into_remote(Echo);
        let mut reply = Parcel::new();
        echo.send_request(1, &request("test.Echo", 1), &mut reply, CallMode::OneWay)
            .unwrap();
        assert!(reply.is_empty());
    }

    #[test]
    fn test_token_mismatch_rejected() {
        let echo = StubObject::into_remote(Echo);
        let mut reply = Parcel::new();
        let result = echo.send_request(1, &request("test.Other", 1), &mut reply, CallMode::Sync);
        assert_eq!(result, Err(TransportError::Rejected));
        assert!(reply.is_empty());
    }

    #[test]
    fn test_unknown_code_goes_to_fallback() {
        let echo = StubObject::into_remote(Echo);
        let mut reply = Parcel::new();
        echo.send_request(PING_TRANSACTION, &request("test.Echo", 0), &mut reply, CallMode::Sync)
            .unwrap();
        assert_eq!(reply.read_i32().unwrap(), 0);

        let mut reply = Parcel::new();
        echo.send_request(INTERFACE_TRANSACTION, &request("test.Echo", 0), &mut reply, CallMode::Sync)
            .unwrap();
        assert_eq!(reply.read_string().unwrap(), "test.Echo");
    }

    #[test]
    fn test_handle_table_stable_ids() {
        let a = StubObject::into_remote(Echo);
        let b = StubObject::into_remote(Echo);
        let mut table = HandleTable::new();
        let id_a = table.export(&a);
        let id_b = table.export(&b);
        assert_ne!(id_a, id_b);
        assert_eq!(table.export(&a), id_a);
        assert!(same_object(&table.get(id_a).unwrap(), &a));
        assert!(table.get(ROOT_HANDLE).is_none());
    }

    #[test]
    fn test_handle_table_release() {
        let root = StubObject::into_remote(Echo);
        let a = StubObject::into_remote(Echo);
        let mut table = HandleTable::with_root(Arc::clone(&root));
        let id_a = table.export(&a);
        assert_eq!(table.len(), 2);

        assert!(table.release(&a));
        assert!(!table.release(&a));
        assert!(table.get(id_a).is_none());
        assert_eq!(table.len(), 1);

        assert!(!table.release(&root));
        assert!(same_object(&table.get(ROOT_HANDLE).unwrap(), &root));

        // a re-export gets a fresh id
        assert_ne!(table.export(&a), id_a);
        assert_eq!(Arc::strong_count(&a), 2);
    }

    #[test]
    fn test_calling_identity_scoped() {
        let own = calling_identity();
        let remote = CallerIdentity { pid: 4242, uid: 7 };
        let seen = with_calling_identity(remote, calling_identity);
        assert_eq!(seen, remote);
        assert_eq!(calling_identity(), own);
    }

    #[test]
    fn test_calling_identity_restored_after_panic() {
        let own = calling_identity();
        let remote = CallerIdentity { pid: 4242, uid: 7 };
        let result = std::panic::catch_unwind(|| {
            with_calling_identity(remote, || -> i32 { panic!("handler failed") })
        });
        assert!(result.is_err());
        assert_eq!(calling_identity(), own);

        let nested = with_calling_identity(remote, || {
            let _ = std::panic::catch_unwind(|| {
                with_calling_identity(CallerIdentity { pid: 1, uid: 1 }, || -> i32 { panic!("inner") })
            });
            calling_identity()
        });
        assert_eq!(nested, remote);
    }

    #[test]
    fn test_same_object_identity() {
        let a = StubObject::into_remote(Echo);
        let a2 = Arc::clone(&a);
        let b = StubObject::into_remote(Echo);
        assert!(same_object(&a, &a2));
        assert!(!same_object(&a, &b));
    }
}
