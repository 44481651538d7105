pub mod loader;
pub mod types;

pub use loader::{load_app_config, parse_app_config, parse_duration, ConfigError};
pub use types::{AppConfig, ConnectionContext, SourceMetadata, WorkflowConfig};
