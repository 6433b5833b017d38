//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! framework.toml (./, ./conf/, ../conf/, ../../conf/ or --config)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MeshConfig (validated, immutable)
//!     → handed to subsystems at startup
//!
//! On file change:
//!     watcher.rs sees the file change in its directory (debounced)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new log level applied through LogHandle
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; only the log level follows reloads
//! - All fields have defaults to allow minimal configs
//! - Startup errors are values; `main` decides to abort

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{discover_config, load_config, ConfigError};
pub use schema::{DiscoveryConfig, HttpConfig, LogFormat, LogRotation, MeshConfig, ObservabilityConfig, RpcConfig, ServiceConfig};
pub use validation::ValidationError;
