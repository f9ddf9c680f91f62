//! Connection state shared by both ends of a socket.
//!
//! A `Link` owns the handle tables for one connection. Local objects sent to
//! the peer are exported and travel as `ObjectRef::Sender`; objects the peer
//! exported come back as `PeerObject`s that turn `send_request` into frames.
//! Frames leave through an unbounded queue drained by whichever writer the
//! owner runs, so calls can be issued from any thread.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wmlink_ipc::framing::{Frame, ObjectRef, ReplyStatus};
use wmlink_ipc::transport::{with_calling_identity, CallerIdentity, HandleTable};
use wmlink_ipc::{CallMode, Parcel, RemoteObject, RemoteRef, TransportError};

type DeathRecipient = Box<dyn Fn() + Send + Sync>;

pub struct Link {
    label: String,
    peer: CallerIdentity,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    next_seq: AtomicU64,
    pending: Mutex<HashMap<u64, std_mpsc::SyncSender<Frame>>>,
    exports: Mutex<HandleTable>,
    imports: Mutex<HashMap<u64, Weak<PeerObject>>>,
    alive: AtomicBool,
    death_recipients: Mutex<Vec<DeathRecipient>>,
}

impl Link {
    pub fn new(
        label: impl Into<String>,
        peer: CallerIdentity,
        exports: HandleTable,
        outgoing: mpsc::UnboundedSender<Frame>,
    ) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            peer,
            outgoing: Mutex::new(Some(outgoing)),
            next_seq: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            exports: Mutex::new(exports),
            imports: Mutex::new(HashMap::new()),
            alive: AtomicBool::new(true),
            death_recipients: Mutex::new(Vec::new()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Credentials of the process on the other end.
    pub fn peer(&self) -> CallerIdentity {
        self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn exported_count(&self) -> usize {
        self.exports.lock().len()
    }

    /// Stop exporting a local object once the peer has no further use for
    /// it. Later requests aimed at its handle fail with `UnknownHandle`.
    pub fn release(&self, object: &RemoteRef) -> bool {
        let released = self.exports.lock().release(object);
        if released {
            debug!("{}: released exported object", self.label);
        }
        released
    }

    /// Run `recipient` once when the connection drops. Runs immediately if
    /// it already has.
    pub fn add_death_recipient(&self, recipient: impl Fn() + Send + Sync + 'static) {
        if !self.is_alive() {
            recipient();
            return;
        }
        self.death_recipients.lock().push(Box::new(recipient));
    }

    /// Proxy for a handle the peer exported. The same handle always maps to
    /// the same object while anyone holds it.
    pub fn import(self: &Arc<Self>, handle: u64) -> RemoteRef {
        let mut imports = self.imports.lock();
        if let Some(existing) = imports.get(&handle).and_then(Weak::upgrade) {
            return existing;
        }
        let object = Arc::new(PeerObject {
            link: Arc::clone(self),
            handle,
        });
        imports.insert(handle, Arc::downgrade(&object));
        imports.retain(|_, weak| weak.strong_count() > 0);
        object
    }

    /// Tear the connection down: fail pending calls and notify recipients.
    pub fn mark_dead(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("{}: connection closed", self.label);
        self.outgoing.lock().take();
        self.pending.lock().clear();
        let recipients = std::mem::take(&mut *self.death_recipients.lock());
        for recipient in recipients {
            recipient();
        }
    }

    fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        let outgoing = self.outgoing.lock();
        let Some(tx) = outgoing.as_ref() else {
            return Err(TransportError::DeadObject);
        };
        tx.send(frame).map_err(|_| TransportError::DeadObject)
    }

    fn encode_objects(&self, objects: &[RemoteRef]) -> Vec<ObjectRef> {
        objects
            .iter()
            .map(|object| match object.as_any().downcast_ref::<PeerObject>() {
                Some(peer) if std::ptr::eq(Arc::as_ptr(&peer.link), self) => {
                    ObjectRef::Receiver(peer.handle)
                }
                _ => ObjectRef::Sender(self.exports.lock().export(object)),
            })
            .collect()
    }

    fn decode_objects(self: &Arc<Self>, refs: &[ObjectRef]) -> Result<Vec<RemoteRef>, TransportError> {
        refs.iter()
            .map(|object| match *object {
                ObjectRef::Sender(handle) => Ok(self.import(handle)),
                ObjectRef::Receiver(handle) => self
                    .exports
                    .lock()
                    .get(handle)
                    .ok_or(TransportError::UnknownHandle(handle)),
            })
            .collect()
    }

    fn call(
        self: &Arc<Self>,
        target: u64,
        code: u32,
        data: &Parcel,
        reply: &mut Parcel,
        mode: CallMode,
    ) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::DeadObject);
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let objects = self.encode_objects(data.objects());
        let frame = Frame::request(seq, target, code, mode, data.data().to_vec(), objects);

        if mode == CallMode::OneWay {
            return self.send_frame(frame);
        }

        let (tx, rx) = std_mpsc::sync_channel(1);
        self.pending.lock().insert(seq, tx);
        if let Err(e) = self.send_frame(frame) {
            self.pending.lock().remove(&seq);
            return Err(e);
        }
        // A closed channel means the link died while waiting.
        let answer = rx.recv().map_err(|_| TransportError::DeadObject)?;
        ReplyStatus::from_code(answer.code).into_result(target)?;
        let objects = self.decode_objects(&answer.objects)?;
        *reply = Parcel::from_parts(answer.data, objects);
        Ok(())
    }

    /// Hand a reply frame to the caller waiting on it.
    pub fn complete(&self, frame: Frame) {
        match self.pending.lock().remove(&frame.seq) {
            Some(tx) => {
                let _ = tx.send(frame);
            }
            None => warn!("{}: reply for unknown call {}", self.label, frame.seq),
        }
    }

    /// Run an incoming request against the exported object it targets.
    /// Blocks for as long as the handler does.
    pub fn dispatch(self: &Arc<Self>, frame: Frame) {
        let mode = frame.mode();
        let target = self.exports.lock().get(frame.target);
        let mut reply = Parcel::new();
        let result = match target {
            None => Err(TransportError::UnknownHandle(frame.target)),
            Some(object) => self.decode_objects(&frame.objects).and_then(|objects| {
                let data = Parcel::from_parts(frame.data, objects);
                with_calling_identity(self.peer, || {
                    object.send_request(frame.code, &data, &mut reply, mode)
                })
            }),
        };

        if mode == CallMode::OneWay {
            if let Err(e) = result {
                warn!(
                    "{}: one-way call {} on handle {} failed: {}",
                    self.label, frame.code, frame.target, e
                );
            }
            return;
        }

        if let Err(e) = &result {
            debug!("{}: call {} failed: {}", self.label, frame.code, e);
        }
        let (data, objects) = if result.is_ok() {
            reply.into_parts()
        } else {
            (Vec::new(), Vec::new())
        };
        let objects = self.encode_objects(&objects);
        let answer = Frame::reply(frame.seq, ReplyStatus::from_result(&result), data, objects);
        if let Err(e) = self.send_frame(answer) {
            debug!("{}: reply to {} dropped: {}", self.label, frame.seq, e);
        }
    }
}

/// Object exported by the peer.
pub struct PeerObject {
    link: Arc<Link>,
    handle: u64,
}

impl RemoteObject for PeerObject {
    fn send_request(
        &self,
        code: u32,
        data: &Parcel,
        reply: &mut Parcel,
        mode: CallMode,
    ) -> Result<(), TransportError> {
        self.link.call(self.handle, code, data, reply, mode)
    }

    fn is_alive(&self) -> bool {
        self.link.is_alive()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
