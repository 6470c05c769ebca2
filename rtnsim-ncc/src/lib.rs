//! rtnsim-ncc - NCC Beam Scheduler
//!
//! This crate provides the Network Control Centre application for the
//! rtnsim DVB-RCS2 return-link simulator. It drives the periodic DAMA
//! allocation cycle and broadcasts the resulting Terminal Burst Time Plan.
//!
//! # Architecture
//!
//! The NCC uses an actor-based task model where each component runs as an
//! independent async task communicating via typed message channels.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          NCC                             │
//! │   ┌────────────────┐          ┌────────────────┐         │
//! │   │   Scheduler    │  plans   │   Publisher    │         │
//! │   │     Task       ├─────────►│     Task       │         │
//! │   └───────▲────────┘          └───────┬────────┘         │
//! │           │ requests, C/N0,           │ TBTP broadcast   │
//! │           │ logon/logoff              │                  │
//! └───────────┼──────────────────────────┼───────────────────┘
//!             │                          ▼
//!         terminals                  terminals
//! ```
//!
//! The scheduler task owns all allocation state and runs one cycle per
//! superframe (`CollectingRequests -> Allocating -> Publishing`); the
//! publisher enforces the transmission deadline and keeps the prior plan
//! in force when a cycle misses it.

pub mod app;
pub mod publisher;
pub mod scheduler;
pub mod tasks;

// Re-export app module types
pub use app::{
    load_and_validate_ncc_config, load_ncc_config, load_ncc_config_from_str, validate_ncc_config,
    ConfigError, ConfigValidationError,
};

// Re-export task types
pub use publisher::PublisherTask;
pub use scheduler::{BeamSchedulerTask, CycleState, CycleStateMachine};
pub use tasks::{
    NccTaskBase, PublisherMessage, SchedulerMessage, Task, TaskHandle, TaskMessage,
    DEFAULT_CHANNEL_CAPACITY,
};
