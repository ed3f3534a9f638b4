//! Configuration module.
//!
//! TOML-based per-instance configuration: one `serial-bridge.toml` in the
//! installation directory, one `[instances.N]` section per leased slot.
//! Values are resolved once at startup and immutable afterwards.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_or_create_for_instance, ConfigFile, CONFIG_FILE_NAME};
pub use schema::{
    resolve_instance_path, BridgeConfig, DeviceSelectConfig, LoggingConfig, ReconnectConfig,
    SerialConfig, TcpConfig,
};
