//! Capacity requests and demand aggregation
//!
//! Terminals submit capacity requests per DAMA category; the aggregator
//! folds them into the persistent allocation state and produces the frozen
//! per-terminal demand snapshot the allocators consume. Requests are
//! transient: each is consumed within the cycle it arrives in.

use std::time::Duration;

use tracing::warn;

use rtnsim_common::config::DamaConfig;
use rtnsim_common::{CapacityCategory, TerminalId};

use crate::entry::TerminalArena;

/// Amount carried by a capacity request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestAmount {
    /// A rate request in kbps (RBDC).
    RateKbps(u32),
    /// A volume request in bytes (VBDC).
    VolumeBytes(u64),
}

/// One capacity request record from the request-manager collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityRequest {
    /// Requesting terminal.
    pub terminal: TerminalId,
    /// DAMA category requested.
    pub category: CapacityCategory,
    /// Requested amount.
    pub amount: RequestAmount,
    /// Submission time in milliseconds.
    pub timestamp_ms: u64,
}

/// Normalized per-terminal demand for one allocation cycle, in bytes.
///
/// Byte demand is converted to symbols by the frame allocator once the
/// terminal's waveform is known.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalDemand {
    /// Terminal this demand belongs to.
    pub terminal: TerminalId,
    /// Guaranteed constant-rate bytes for the superframe.
    pub cra_bytes: u64,
    /// Rate-based dynamic bytes for the superframe, decay applied.
    pub rbdc_bytes: u64,
    /// Volume backlog bytes.
    pub vbdc_bytes: u64,
    /// Whether the terminal takes part in free capacity allocation.
    pub fca_eligible: bool,
    /// C/N0 estimate driving waveform selection, if any.
    pub cno_dbhz: Option<f64>,
}

impl TerminalDemand {
    /// Total requested bytes across categories.
    pub fn total_bytes(&self) -> u64 {
        self.cra_bytes + self.rbdc_bytes + self.vbdc_bytes
    }
}

/// Folds a cycle's capacity requests into the allocation state.
///
/// RBDC requests replace the pending value; VBDC requests accumulate.
/// CRA is configured and FCA derived, so requests in those categories are
/// rejected. Requests from unknown terminals are dropped.
pub fn apply_requests(requests: &[CapacityRequest], arena: &mut TerminalArena) {
    for request in requests {
        let Some(entry) = arena.get_mut(request.terminal) else {
            warn!(terminal = %request.terminal, "capacity request from unknown terminal");
            continue;
        };
        match (request.category, request.amount) {
            (CapacityCategory::Rbdc, RequestAmount::RateKbps(kbps)) => {
                entry.update_rbdc(request.timestamp_ms, f64::from(kbps));
            }
            (CapacityCategory::Vbdc, RequestAmount::VolumeBytes(bytes)) => {
                entry.push_vbdc(bytes);
            }
            (category, amount) => {
                warn!(
                    terminal = %request.terminal,
                    %category,
                    ?amount,
                    "unsupported capacity request dropped"
                );
            }
        }
    }
}

/// Produces the frozen demand snapshot for one allocation cycle.
///
/// Applies the given requests to the persistent state first, then converts
/// each terminal's rates into bytes over the superframe duration. This is
/// the only place RBDC decay is evaluated.
pub fn aggregate(
    requests: &[CapacityRequest],
    arena: &mut TerminalArena,
    superframe_duration: Duration,
    dama: &DamaConfig,
    now_ms: u64,
) -> Vec<TerminalDemand> {
    apply_requests(requests, arena);

    arena
        .iter_mut()
        .map(|(terminal, entry)| {
            let cra_bytes = kbps_to_bytes(f64::from(entry.cra_kbps()), superframe_duration);
            let rbdc_bytes = kbps_to_bytes(
                entry.effective_rbdc_kbps(now_ms, dama.rbdc_decay_ms),
                superframe_duration,
            );
            TerminalDemand {
                terminal,
                cra_bytes,
                rbdc_bytes,
                vbdc_bytes: entry.vbdc_backlog_bytes(),
                fca_eligible: entry.service().fca_eligible,
                cno_dbhz: entry.cno_estimate(now_ms),
            }
        })
        .collect()
}

/// Converts a rate in kbps into bytes transferred over `duration`.
fn kbps_to_bytes(kbps: f64, duration: Duration) -> u64 {
    (kbps * 1000.0 * duration.as_secs_f64() / 8.0).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::DamaEntry;
    use rtnsim_common::config::TerminalServiceConfig;

    fn arena_with(ids: &[u16]) -> TerminalArena {
        let mut arena = TerminalArena::new();
        for &id in ids {
            arena.insert(DamaEntry::new(
                TerminalServiceConfig {
                    id: TerminalId(id),
                    cra_kbps: 64,
                    min_rbdc_kbps: 0,
                    max_rbdc_kbps: 2048,
                    max_vbdc_backlog_bytes: 1_000_000,
                    fca_eligible: false,
                },
                &DamaConfig::default(),
            ));
        }
        arena
    }

    fn rbdc(terminal: u16, kbps: u32, ts: u64) -> CapacityRequest {
        CapacityRequest {
            terminal: TerminalId(terminal),
            category: CapacityCategory::Rbdc,
            amount: RequestAmount::RateKbps(kbps),
            timestamp_ms: ts,
        }
    }

    fn vbdc(terminal: u16, bytes: u64, ts: u64) -> CapacityRequest {
        CapacityRequest {
            terminal: TerminalId(terminal),
            category: CapacityCategory::Vbdc,
            amount: RequestAmount::VolumeBytes(bytes),
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_kbps_to_bytes() {
        // 64 kbps over 100 ms = 800 bytes
        assert_eq!(kbps_to_bytes(64.0, Duration::from_millis(100)), 800);
    }

    #[test]
    fn test_cra_always_present() {
        let mut arena = arena_with(&[1]);
        let demand = aggregate(
            &[],
            &mut arena,
            Duration::from_millis(100),
            &DamaConfig::default(),
            0,
        );
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].cra_bytes, 800);
        assert_eq!(demand[0].rbdc_bytes, 0);
        assert_eq!(demand[0].vbdc_bytes, 0);
    }

    #[test]
    fn test_rbdc_replaces_pending_value() {
        let mut arena = arena_with(&[1]);
        let dama = DamaConfig::default();
        let demand = aggregate(
            &[rbdc(1, 100, 0), rbdc(1, 400, 0)],
            &mut arena,
            Duration::from_millis(100),
            &dama,
            0,
        );
        // 400 kbps over 100 ms = 5000 bytes; the 100 kbps request is gone
        assert_eq!(demand[0].rbdc_bytes, 5_000);
    }

    #[test]
    fn test_vbdc_accumulates_across_cycles() {
        let mut arena = arena_with(&[1]);
        let dama = DamaConfig::default();
        let duration = Duration::from_millis(100);

        let demand = aggregate(&[vbdc(1, 3_000, 0)], &mut arena, duration, &dama, 0);
        assert_eq!(demand[0].vbdc_bytes, 3_000);

        let demand = aggregate(&[vbdc(1, 2_000, 100)], &mut arena, duration, &dama, 100);
        assert_eq!(demand[0].vbdc_bytes, 5_000);
    }

    #[test]
    fn test_rbdc_decays_between_cycles() {
        let mut arena = arena_with(&[1]);
        let dama = DamaConfig::default(); // decay over 1000 ms
        let duration = Duration::from_millis(100);

        let demand = aggregate(&[rbdc(1, 400, 0)], &mut arena, duration, &dama, 0);
        assert_eq!(demand[0].rbdc_bytes, 5_000);

        // half the horizon elapsed, no refresh: half the demand
        let demand = aggregate(&[], &mut arena, duration, &dama, 500);
        assert_eq!(demand[0].rbdc_bytes, 2_500);

        // past the horizon: zero
        let demand = aggregate(&[], &mut arena, duration, &dama, 1500);
        assert_eq!(demand[0].rbdc_bytes, 0);
    }

    #[test]
    fn test_unknown_terminal_dropped() {
        let mut arena = arena_with(&[1]);
        let demand = aggregate(
            &[rbdc(9, 100, 0)],
            &mut arena,
            Duration::from_millis(100),
            &DamaConfig::default(),
            0,
        );
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].rbdc_bytes, 0);
    }

    #[test]
    fn test_demand_in_terminal_id_order() {
        let mut arena = arena_with(&[3, 1, 2]);
        let demand = aggregate(
            &[],
            &mut arena,
            Duration::from_millis(100),
            &DamaConfig::default(),
            0,
        );
        let ids: Vec<_> = demand.iter().map(|d| d.terminal).collect();
        assert_eq!(ids, vec![TerminalId(1), TerminalId(2), TerminalId(3)]);
    }
}
