//! # VaultSync Runtime
//!
//! Ambient infrastructure shared by every VaultSync crate.
//!
//! ## Components
//!
//! - **Events** (`events`): Typed event bus for sync progress and job updates
//! - **Logging** (`logging`): `tracing` subscriber setup, configured once at startup
//! - **Config** (`config`): Validated runtime configuration with fail-fast construction

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{Result, RuntimeError};
pub use events::{CoreEvent, EventBus, EventStream, JobEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
