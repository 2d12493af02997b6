pub mod config;
pub mod observability;
pub mod server;

pub use config::{
    AppConfig, LogFormat, LoggingConfig, PostgresStorageConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
pub use observability::init_tracing;
pub use server::{NviServer, ServerBuilder, build_app, build_state, router};
