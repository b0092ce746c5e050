//! Bridge configuration
//!
//! Optional JSON file read by the command-line tool. Every field has a
//! default, so an empty object (or no file at all) is a valid config.

mod schema;
mod store;

pub use schema::{BridgeConfig, EngineKind, Limits};
pub use store::{ConfigError, ConfigStore};
