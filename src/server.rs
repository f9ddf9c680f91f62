//! Socket host for the window-management service.
//!
//! Every connection gets a reader task, a writer task and one blocking
//! dispatcher that runs the connection's requests in order. Requests run
//! with the peer's credentials as the calling identity.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wmlink_ipc::framing::{Frame, FrameKind};
use wmlink_ipc::transport::{CallerIdentity, HandleTable};
use wmlink_ipc::{RemoteRef, StubObject, WindowManagerStub};

use crate::link::Link;
use crate::service::WindowManagerServer;

pub struct ServiceHost {
    server: Arc<WindowManagerServer>,
    root: RemoteRef,
    listener: UnixListener,
    path: PathBuf,
}

impl ServiceHost {
    /// Bind the service socket, replacing a stale one.
    pub fn bind(server: Arc<WindowManagerServer>, path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {:?}", path))?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind {:?}", path))?;
        info!("Window manager listening on {:?}", path);

        let root = StubObject::into_remote(WindowManagerStub::new(Arc::clone(&server)));
        Ok(Self {
            server,
            root,
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn server(&self) -> &Arc<WindowManagerServer> {
        &self.server
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let identity = match stream.peer_cred() {
                        Ok(cred) => CallerIdentity {
                            pid: cred.pid().unwrap_or(0),
                            uid: cred.uid() as i32,
                        },
                        Err(e) => {
                            warn!("Rejecting client without credentials: {}", e);
                            continue;
                        }
                    };
                    info!("Client connected (pid {})", identity.pid);
                    tokio::spawn(handle_client(stream, identity, Arc::clone(&self.root)));
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

impl Drop for ServiceHost {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Handle a connected client
async fn handle_client(stream: UnixStream, identity: CallerIdentity, root: RemoteRef) {
    let (mut reader, mut writer) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
    let (req_tx, mut req_rx) = mpsc::unbounded_channel::<Frame>();
    let link = Link::new(
        format!("client {}", identity.pid),
        identity,
        HandleTable::with_root(root),
        out_tx,
    );

    // Requests run in arrival order on a blocking thread; handlers may wait
    // on replies that the reader task delivers.
    let dispatch_link = Arc::clone(&link);
    let dispatcher = tokio::task::spawn_blocking(move || {
        while let Some(frame) = req_rx.blocking_recv() {
            dispatch_link.dispatch(frame);
        }
        debug!("Dispatcher ended");
    });

    let reader_link = Arc::clone(&link);
    let mut reader_task = tokio::spawn(async move {
        let mut len_buf = [0u8; 4];
        loop {
            if reader.read_exact(&mut len_buf).await.is_err() {
                break;
            }
            let len = match Frame::check_len(len_buf) {
                Ok(len) => len,
                Err(e) => {
                    warn!("{}", e);
                    break;
                }
            };

            let mut body = vec![0u8; len];
            if reader.read_exact(&mut body).await.is_err() {
                break;
            }

            match Frame::decode(&body) {
                Ok(frame) if frame.kind == FrameKind::Reply => reader_link.complete(frame),
                Ok(frame) => {
                    if req_tx.send(frame).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to decode frame: {}", e);
                }
            }
        }
        debug!("Reader task ended");
    });

    let mut writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match frame.encode() {
                Ok(encoded) => {
                    if writer.write_all(&encoded).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to encode frame: {}", e);
                }
            }
        }
        debug!("Writer task ended");
    });

    tokio::select! {
        _ = &mut reader_task => {}
        _ = &mut writer_task => {}
    }
    reader_task.abort();
    writer_task.abort();

    // Window nodes owned by this client notice on their next liveness check.
    link.mark_dead();
    let _ = dispatcher.await;
    info!(
        "{} disconnected (uid {}, {} objects exported)",
        link.label(),
        link.peer().uid,
        link.exported_count()
    );
}
