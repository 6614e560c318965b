//! JSON configuration, schema-validated before deserialization.

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    BrokerConfig, CdnConfig, Config, DatabaseConfig, PathsConfig, StagesConfig,
};
