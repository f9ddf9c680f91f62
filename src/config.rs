//! Configuration for the wmlink service host and client
//!
//! Loads configuration from TOML file at `~/.config/wmlink/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use wmlink_ipc::info::SystemConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub client: ClientConfig,
    pub log: LogConfig,
}

impl Config {
    /// Read `path`, or `~/.config/wmlink/config.toml` when `None`. A missing
    /// file yields the defaults and is written out for later editing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => dirs::config_dir()
                .context("Failed to get config directory")?
                .join("wmlink")
                .join("config.toml"),
        };

        let config = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {:?}", path))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {:?}, writing defaults", path);
                if let Err(e) = Self::write_defaults(&path) {
                    warn!("Failed to create default config file: {}", e);
                }
                Self::default()
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
        };
        config.validate()?;
        debug!("Config from {:?}: {:?}", path, config);
        Ok(config)
    }

    fn write_defaults(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let toml_string =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize default config")?;
        fs::write(path, toml_string).context("Failed to write default config file")?;
        Ok(())
    }

    /// Reject geometry the reference service can not lay windows out in.
    pub fn validate(&self) -> Result<()> {
        let display = &self.service.display;
        if display.width == 0 || display.height == 0 {
            bail!("display size {}x{} is empty", display.width, display.height);
        }
        let bars = display.status_bar_height as u64 + display.navigation_bar_height as u64;
        if bars >= display.height as u64 {
            bail!("status and navigation bars leave no room on a {}px display", display.height);
        }
        let limits = &self.service.limits;
        if limits.min_width > limits.max_width || limits.min_height > limits.max_height {
            bail!("floating size limits have min above max");
        }
        Ok(())
    }

    /// Socket the service listens on and clients connect to.
    pub fn socket_path(&self) -> PathBuf {
        self.service
            .socket_path
            .clone()
            .unwrap_or_else(wmlink_ipc::socket_path)
    }
}

/// Service host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Overrides `$XDG_RUNTIME_DIR/wmlink.sock`
    pub socket_path: Option<PathBuf>,
    pub display: DisplayConfig,
    pub hot_zones: HotZoneConfig,
    pub limits: SizeLimits,
    /// Decoration and default-mode settings handed to clients
    pub system: SystemConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            display: DisplayConfig::default(),
            hot_zones: HotZoneConfig::default(),
            limits: SizeLimits::default(),
            system: SystemConfig::default(),
        }
    }
}

/// Geometry of the single display the reference service manages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    /// Status bar height in pixels (top edge)
    pub status_bar_height: u32,
    /// Navigation bar height in pixels (bottom edge)
    pub navigation_bar_height: u32,
    /// Height of the cutout area at the top edge, 0 for none
    pub cutout_height: u32,
    /// Width of the gesture strips along the left and right edges
    pub gesture_width: u32,
    /// Keyboard height when one is shown
    pub keyboard_height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            id: 0,
            width: 1920,
            height: 1080,
            status_bar_height: 48,
            navigation_bar_height: 48,
            cutout_height: 0,
            gesture_width: 24,
            keyboard_height: 360,
        }
    }
}

/// Depth of the screen-edge regions that snap a moved window into a mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotZoneConfig {
    /// Strip along the top edge that snaps into fullscreen, 0 disables hot zones
    pub fullscreen_depth: u32,
    /// Strips along the left/right edges that snap into split modes
    pub split_depth: u32,
}

impl Default for HotZoneConfig {
    fn default() -> Self {
        Self {
            fullscreen_depth: 40,
            split_depth: 40,
        }
    }
}

/// Floating window size limits in pixels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeLimits {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            min_width: 48,
            min_height: 48,
            max_width: 3840,
            max_height: 2160,
        }
    }
}

/// Client connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How many times to wait for the socket to appear
    pub connect_retries: u32,
    /// Delay between attempts in milliseconds
    pub connect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_retries: 100,
            connect_delay_ms: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
}
