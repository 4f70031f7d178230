//! Core types and record keeping for the zone-based macroevolution engine.

pub mod types;
pub mod config;
pub mod error;
pub mod record;
pub mod summary;

pub use error::{Error, ErrorKind, Result};
pub use types::*;
pub use config::*;
pub use record::*;
pub use summary::*;
