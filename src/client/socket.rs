//! Client end of the service socket.
//!
//! Runs on plain threads so window handles can be driven from synchronous
//! code: a reader thread routes replies to waiting callers and queues
//! incoming pushes, a dispatcher thread runs those pushes in arrival order,
//! and a writer thread drains the outgoing queue.

use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc, Weak};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wmlink_ipc::framing::{read_frame, Frame, FrameKind};
use wmlink_ipc::transport::{CallerIdentity, HandleTable, ROOT_HANDLE};
use wmlink_ipc::RemoteRef;

use super::adapter::ServiceLocator;
use crate::link::Link;

pub struct SocketChannel {
    link: Arc<Link>,
    stream: UnixStream,
    path: PathBuf,
}

impl SocketChannel {
    /// Connect to the service listening on `path`
    pub fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("Failed to connect to {:?}", path))?;
        let reader = stream.try_clone().context("Failed to clone socket")?;
        let writer = stream.try_clone().context("Failed to clone socket")?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let link = Link::new("client", peer_identity(&stream), HandleTable::new(), out_tx);
        let (push_tx, push_rx) = std_mpsc::channel();

        spawn_writer(writer, out_rx, Arc::clone(&link))?;
        spawn_reader(reader, push_tx, Arc::clone(&link))?;
        spawn_dispatcher(push_rx, Arc::clone(&link))?;

        info!("Connected to window manager at {:?}", path);
        Ok(Self {
            link,
            stream,
            path: path.to_path_buf(),
        })
    }

    /// Wait for the socket to appear, then connect.
    pub fn connect_with_retry(path: &Path, retries: u32, delay: Duration) -> Result<Self> {
        let mut retries = retries;
        while !path.exists() && retries > 0 {
            thread::sleep(delay);
            retries -= 1;
        }
        if !path.exists() {
            return Err(anyhow::anyhow!("Service socket not found: {:?}", path));
        }
        Self::connect(path)
    }

    /// The service root object.
    pub fn root(&self) -> RemoteRef {
        self.link.import(ROOT_HANDLE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_alive(&self) -> bool {
        self.link.is_alive()
    }

    /// Register `recipient` to run once when the service goes away.
    pub fn add_death_recipient(&self, recipient: impl Fn() + Send + Sync + 'static) {
        self.link.add_death_recipient(recipient);
    }

    /// Local objects the service can currently reach.
    pub fn exported_count(&self) -> usize {
        self.link.exported_count()
    }

    pub fn release(&self, object: &RemoteRef) -> bool {
        self.link.release(object)
    }
}

/// Resolves the service root through a channel owned elsewhere.
pub struct ChannelLocator(Weak<SocketChannel>);

impl ChannelLocator {
    pub fn new(channel: &Arc<SocketChannel>) -> Self {
        Self(Arc::downgrade(channel))
    }
}

impl ServiceLocator for ChannelLocator {
    fn locate(&self) -> Option<RemoteRef> {
        let channel = self.0.upgrade()?;
        channel.is_alive().then(|| channel.root())
    }

    fn release(&self, object: &RemoteRef) {
        if let Some(channel) = self.0.upgrade() {
            channel.release(object);
        }
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        // Unblocks the reader, which tears the link down.
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

fn spawn_writer(
    mut writer: UnixStream,
    mut out_rx: mpsc::UnboundedReceiver<Frame>,
    link: Arc<Link>,
) -> Result<()> {
    thread::Builder::new()
        .name("wmlink-writer".into())
        .spawn(move || {
            while let Some(frame) = out_rx.blocking_recv() {
                let encoded = match frame.encode() {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!("Failed to encode frame {}: {}", frame.seq, e);
                        continue;
                    }
                };
                if writer.write_all(&encoded).is_err() {
                    link.mark_dead();
                    break;
                }
            }
            debug!("Writer thread ended");
        })
        .context("Failed to spawn writer thread")?;
    Ok(())
}

fn spawn_reader(
    mut reader: UnixStream,
    push_tx: std_mpsc::Sender<Frame>,
    link: Arc<Link>,
) -> Result<()> {
    thread::Builder::new()
        .name("wmlink-reader".into())
        .spawn(move || {
            loop {
                match read_frame(&mut reader) {
                    Ok(Some(frame)) => match frame.kind {
                        FrameKind::Reply => link.complete(frame),
                        FrameKind::Request => {
                            if push_tx.send(frame).is_err() {
                                break;
                            }
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read frame: {}", e);
                        break;
                    }
                }
            }
            link.mark_dead();
            debug!("Reader thread ended");
        })
        .context("Failed to spawn reader thread")?;
    Ok(())
}

fn spawn_dispatcher(push_rx: std_mpsc::Receiver<Frame>, link: Arc<Link>) -> Result<()> {
    thread::Builder::new()
        .name("wmlink-dispatch".into())
        .spawn(move || {
            for frame in push_rx {
                link.dispatch(frame);
            }
            debug!("Dispatcher thread ended");
        })
        .context("Failed to spawn dispatcher thread")?;
    Ok(())
}

fn peer_identity(stream: &UnixStream) -> CallerIdentity {
    let mut cred = libc::ucred {
        pid: 0,
        uid: 0,
        gid: 0,
    };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut cred as *mut libc::ucred as *mut libc::c_void,
            &mut len,
        )
    };
    if rc != 0 {
        warn!("SO_PEERCRED failed: {}", std::io::Error::last_os_error());
        return CallerIdentity { pid: 0, uid: 0 };
    }
    CallerIdentity {
        pid: cred.pid,
        uid: cred.uid as i32,
    }
}
