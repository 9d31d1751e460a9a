//! Core functionality for the Tessera credential service.
//!
//! This crate provides the configuration model, logging initialization,
//! time source and shared error type used by every other Tessera crate.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    Config, HashingConfig, IssuerConfig, LoggingConfig, NotifierConfig, ServerConfig, StoreBackend,
    StoreConfig, MAX_TTL_SECS,
};
pub use error::{CoreError, Result};
