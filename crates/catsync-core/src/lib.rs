pub mod app_config;
pub mod categories;
pub mod config;
pub mod products;
pub mod settings;
pub mod snapshot;

pub use app_config::{AppConfig, Environment};
pub use categories::{load_categories, CategoriesFile, CategoryConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{CatalogSnapshot, CategoryCompletion, ProductRecord};
pub use settings::{
    BatchSettings, BreakerSettings, HarvestSettings, PaginationSettings, RemoteSettings,
    RetrySettings,
};
pub use snapshot::{MemorySnapshotStore, SnapshotStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read categories file {path}: {source}")]
    CategoriesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse categories file: {0}")]
    CategoriesFileParse(#[source] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
