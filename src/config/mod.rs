// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{apply_legacy_env, default_config_path, load_config, write_default_config};
pub use settings::{
    Config, GenerativeSettings, NotificationSettings, RecommendationSettings, ServerSettings,
    StorageSettings,
};
