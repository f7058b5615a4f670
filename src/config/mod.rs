pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_path, save_config_to_path};
pub use types::{ApiConfig, LoggingConfig, MindForgeConfig};
