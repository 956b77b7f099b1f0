pub mod app_config;
pub mod business;
pub mod config;
pub mod request;

pub use app_config::{AppConfig, Environment};
pub use business::{Business, ResultCollection};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use request::{RequestError, SearchRequest, Target};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
