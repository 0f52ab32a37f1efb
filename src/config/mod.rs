//! Configuration module for fzlink
//!
//! The configuration covers which serial endpoint to
//! use (or how to find one), the timing constants of the connection
//! supervisor, the input cooldown and how screen frames are rendered and
//! handed off.
//!
//! # File Location
//!
//! The configuration is stored as TOML in the platform config directory:
//! - **Linux**: `~/.config/fzlink/config.toml`
//! - **macOS**: `~/Library/Application Support/fzlink/config.toml`
//! - **Windows**: `%APPDATA%\fzlink\config.toml`
//!
//! The `FZLINK_CONFIG` environment variable overrides the path.
//!
//! # Example
//!
//! ```ignore
//! use fzlink::config::AppConfig;
//!
//! let config = AppConfig::load_or_default();
//! println!("watchdog every {:?}", config.connection.watchdog_interval());
//! ```

use crate::error::{LinkError, Result};
use crate::serial::{EndpointIdentity, MultipleMatchPolicy};
use crate::screen::DropPolicy;
use crate::types::{Rgb, ScreenshotResolution};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "fzlink";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "FZLINK_CONFIG";

/// Default vendor id of the reference device (STMicroelectronics)
pub const DEFAULT_VENDOR_ID: u16 = 0x0483;

/// Default product id of the reference device (virtual COM port)
pub const DEFAULT_PRODUCT_ID: u16 = 0x5740;

/// Default baud rate; the device ignores it on its USB CDC port
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default interval between watchdog probes in milliseconds
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 2_000;

/// Default delay between reconnect attempts in milliseconds
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Default timeout for the RPC session to come up in milliseconds
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

/// Default serial read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Default minimum spacing between accepted input events in milliseconds
pub const DEFAULT_INPUT_COOLDOWN_MS: u64 = 10;

/// Default number of decoded frames that may wait for the consumer
pub const DEFAULT_SCREEN_QUEUE_DEPTH: usize = 2;

/// Get the default config file path
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Which device to talk to and how to find it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Explicit serial endpoint; autodetected when absent
    pub port: Option<String>,
    /// USB vendor id used for autodetection
    pub vendor_id: u16,
    /// USB product id used for autodetection
    pub product_id: u16,
    /// Baud rate passed to the serial driver
    pub baud_rate: u32,
    /// What to do when several endpoints match
    pub multiple_match: MultipleMatchPolicy,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            baud_rate: DEFAULT_BAUD_RATE,
            multiple_match: MultipleMatchPolicy::default(),
        }
    }
}

impl DeviceConfig {
    /// Hardware identity used by the endpoint locator
    pub fn identity(&self) -> EndpointIdentity {
        EndpointIdentity::new(self.vendor_id, self.product_id)
    }
}

/// Timing of the connection supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub watchdog_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub rpc_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: DEFAULT_WATCHDOG_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl ConnectionConfig {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Input dispatch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Events closer together than this are dropped
    pub cooldown_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_INPUT_COOLDOWN_MS,
        }
    }
}

impl InputConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Screen rendering and hand-off settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Colour of set pixels
    pub fg_color: Rgb,
    /// Colour of clear pixels
    pub bg_color: Rgb,
    /// Size of exported screenshots
    pub screenshot_resolution: ScreenshotResolution,
    /// Frames that may queue up for a slow consumer
    pub queue_depth: usize,
    /// Which frame to discard when the queue is full
    pub drop_policy: DropPolicy,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            fg_color: Rgb::new(0x00, 0x00, 0x00),
            bg_color: Rgb::new(0xFF, 0x8C, 0x00),
            screenshot_resolution: ScreenshotResolution::default(),
            queue_depth: DEFAULT_SCREEN_QUEUE_DEPTH,
            drop_policy: DropPolicy::default(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub connection: ConnectionConfig,
    pub input: InputConfig,
    pub screen: ScreenConfig,
}

impl AppConfig {
    /// Load the configuration from the default location
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            LinkError::Config("Could not determine config directory".to_string())
        })?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load and validate a configuration file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LinkError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            LinkError::Config(format!("Failed to parse config {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration as TOML, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LinkError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| {
            LinkError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| LinkError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Reject values that would stall or spin the supervisor
    pub fn validate(&self) -> Result<()> {
        let c = &self.connection;
        if c.watchdog_interval_ms == 0 {
            return Err(LinkError::Config("watchdog_interval_ms must be > 0".into()));
        }
        if c.reconnect_delay_ms == 0 {
            return Err(LinkError::Config("reconnect_delay_ms must be > 0".into()));
        }
        if c.read_timeout_ms == 0 {
            return Err(LinkError::Config("read_timeout_ms must be > 0".into()));
        }
        if self.screen.queue_depth == 0 {
            return Err(LinkError::Config("screen.queue_depth must be > 0".into()));
        }
        if let Some(port) = &self.device.port {
            if port.trim().is_empty() {
                return Err(LinkError::Config("device.port must not be blank".into()));
            }
        }
        Ok(())
    }

    /// Override the serial endpoint, e.g. from a command-line flag
    pub fn with_port(mut self, port: Option<String>) -> Self {
        if port.is_some() {
            self.device.port = port;
        }
        self
    }
}
