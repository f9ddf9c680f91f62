//! Client side: window handles, the process-wide window manager and the
//! socket they talk through.

pub mod adapter;
pub mod category;
pub mod color;
pub mod manager;
pub mod move_drag;
pub mod registry;
pub mod socket;
pub mod window;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use wmlink_ipc::{WindowProperty, WmResult};

pub use adapter::{ServiceLocator, WindowAdapter};
pub use manager::WindowManager;
pub use move_drag::{PointerAction, PointerEvent};
pub use registry::WindowRegistry;
pub use socket::{ChannelLocator, SocketChannel};
pub use window::WindowImpl;

use crate::config::Config;

/// Everything one client process needs, wired to a service socket.
pub struct Session {
    channel: Arc<SocketChannel>,
    adapter: Arc<WindowAdapter>,
    registry: Arc<WindowRegistry>,
    manager: Arc<WindowManager>,
}

impl Session {
    pub fn connect(config: &Config) -> Result<Self> {
        let path = config.socket_path();
        let channel = Arc::new(SocketChannel::connect_with_retry(
            &path,
            config.client.connect_retries,
            Duration::from_millis(config.client.connect_delay_ms),
        )?);

        let adapter = Arc::new(WindowAdapter::new(ChannelLocator::new(&channel)));
        let registry = Arc::new(WindowRegistry::new());
        let manager = WindowManager::new(Arc::clone(&adapter));

        let on_death = Arc::downgrade(&manager);
        channel.add_death_recipient(move || {
            if let Some(manager) = on_death.upgrade() {
                manager.on_remote_died();
            }
        });

        info!("Session ready");
        Ok(Self {
            channel,
            adapter,
            registry,
            manager,
        })
    }

    /// Create a window handle and register it with the service.
    pub fn create_window(&self, property: WindowProperty, parent_id: u32) -> WmResult<Arc<WindowImpl>> {
        let window = WindowImpl::new(property, Arc::clone(&self.adapter), Arc::clone(&self.registry));
        window.create(parent_id)?;
        Ok(window)
    }

    pub fn channel(&self) -> &Arc<SocketChannel> {
        &self.channel
    }

    pub fn adapter(&self) -> &Arc<WindowAdapter> {
        &self.adapter
    }

    pub fn registry(&self) -> &Arc<WindowRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<WindowManager> {
        &self.manager
    }
}
