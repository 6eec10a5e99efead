pub mod config_manager;

pub use config_manager::{AdapterConfig, AppConfig, ConfigError, ConfigManager, ConfigSource, FileConfigSource};
