//! rtnsim-common - Shared types for the rtnsim DVB-RCS2 NCC simulator
//!
//! This crate provides the pieces shared by every other rtnsim crate:
//!
//! - Identifier newtypes and capacity categories (`types`)
//! - The YAML configuration model (`config`)
//! - Logging setup and control-message logging helpers (`logging`)
//! - The common error type (`error`)

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use error::Error;
pub use types::{CapacityCategory, CarrierId, FrameId, SuperframeCounter, TerminalId, WaveformId};

/// Result type alias using the common error.
pub type Result<T> = std::result::Result<T, Error>;
