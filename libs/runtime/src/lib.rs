//! Host plumbing shared by repokit binaries: layered config and logging.

pub mod config;
pub mod logging;

pub use config::{AppConfig, CliArgs, LoggingConfig, PagingConfig, Section};
pub use logging::init_logging_from_config;
