//! Shared configuration and identifier types for the postvault workspace.

pub mod app_config;
pub mod config;
pub mod ids;

pub use app_config::{AppConfig, Environment};
pub use config::{
    load_app_config, load_app_config_from_env, ConfigError, DEFAULT_MEDIA_USER_AGENT,
};
pub use ids::{
    generate_entity_id, is_valid_entity_id, ID_HEX_LEN, PREFIX_ASSET, PREFIX_POST, PREFIX_RUN,
    PREFIX_SNAPSHOT,
};
