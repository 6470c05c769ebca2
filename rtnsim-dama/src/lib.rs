//! rtnsim-dama - Return-link DAMA capacity allocation
//!
//! This crate implements the core of the NCC beam scheduler: converting
//! per-terminal capacity requests (CRA/RBDC/VBDC/FCA) into concrete
//! time-slot grants on the carriers of a superframe.
//!
//! # Architecture
//!
//! The allocation pipeline is pure and synchronous; it runs once per
//! superframe over a frozen snapshot of the request state:
//!
//! ```text
//! CapacityRequest ──► aggregate ──► TerminalDemand ──► SuperframeAllocator
//!        │                │                                   │
//!        ▼                ▼                                   ▼
//!   DamaEntry        RBDC decay                      per-carrier
//!   (persistent)     VBDC backlog                  FrameAllocator ──► SlotPlan
//! ```
//!
//! - [`waveform`] - the burst waveform table and link-quality selection
//! - [`frame`] - superframe/carrier geometry and symbol capacities
//! - [`cno`] - C/N0 estimation from link-quality samples
//! - [`entry`] - persistent per-terminal allocation state
//! - [`request`] - capacity requests and demand aggregation
//! - [`frame_allocator`] - the two-pass per-carrier allocator
//! - [`superframe_allocator`] - carrier orchestration, re-homing and
//!   random-access windows

pub mod cno;
pub mod entry;
pub mod frame;
pub mod frame_allocator;
pub mod request;
pub mod superframe_allocator;
pub mod waveform;

pub use cno::CnoEstimator;
pub use entry::{DamaEntry, TerminalArena};
pub use frame::{Carrier, SuperframeConf};
pub use frame_allocator::{
    AllocationError, CarrierAllocation, FrameAllocator, TerminalGrant, TimeSlot,
};
pub use request::{aggregate, CapacityRequest, RequestAmount, TerminalDemand};
pub use superframe_allocator::{RaWindow, SlotPlan, SuperframeAllocator};
pub use waveform::{NoFeasibleWaveform, Waveform, WaveformConf};
