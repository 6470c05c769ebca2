//! Persistent per-terminal allocation state
//!
//! A [`DamaEntry`] holds everything the scheduler remembers about one
//! terminal between allocation cycles: the provisioned service parameters,
//! the pending RBDC request with its refresh time, the VBDC volume backlog,
//! the C/N0 estimator and the last assignment. Entries live in a
//! [`TerminalArena`] keyed by terminal id and are created at logon and
//! destroyed at logoff, both applied only at cycle boundaries.

use std::collections::BTreeMap;

use tracing::debug;

use rtnsim_common::config::{DamaConfig, TerminalServiceConfig};
use rtnsim_common::{CarrierId, TerminalId, WaveformId};

use crate::cno::CnoEstimator;

/// Per-terminal DAMA state, mutated once per allocation cycle.
#[derive(Debug, Clone)]
pub struct DamaEntry {
    service: TerminalServiceConfig,
    rbdc_kbps: f64,
    rbdc_refreshed_ms: Option<u64>,
    vbdc_backlog_bytes: u64,
    last_carrier: Option<CarrierId>,
    last_waveform: Option<WaveformId>,
    estimator: CnoEstimator,
    pending_cno: Vec<(u64, f64)>,
}

impl DamaEntry {
    /// Creates the entry for a newly logged-on terminal.
    pub fn new(service: TerminalServiceConfig, dama: &DamaConfig) -> Self {
        Self {
            service,
            rbdc_kbps: 0.0,
            rbdc_refreshed_ms: None,
            vbdc_backlog_bytes: 0,
            last_carrier: None,
            last_waveform: None,
            estimator: CnoEstimator::new(dama.cno_mode, dama.cno_window_ms),
            pending_cno: Vec::new(),
        }
    }

    /// The provisioned service parameters.
    pub fn service(&self) -> &TerminalServiceConfig {
        &self.service
    }

    /// Constant rate assignment in kbps.
    pub fn cra_kbps(&self) -> u32 {
        self.service.cra_kbps
    }

    /// Replaces the pending RBDC request with a fresh one.
    ///
    /// The request is clamped against the service bounds: CRA plus RBDC is
    /// kept within `[min_rbdc_kbps, max_rbdc_kbps]`.
    pub fn update_rbdc(&mut self, now_ms: u64, requested_kbps: f64) {
        let cra = f64::from(self.service.cra_kbps);
        let min = f64::from(self.service.min_rbdc_kbps);
        let max = f64::from(self.service.max_rbdc_kbps);
        let sum = cra + requested_kbps;

        self.rbdc_kbps = if sum < min {
            (min - cra).max(0.0)
        } else if sum > max {
            (max - cra).max(0.0)
        } else {
            requested_kbps
        };
        self.rbdc_refreshed_ms = Some(now_ms);
    }

    /// The RBDC rate after linear decay toward zero over `decay_ms`.
    ///
    /// Absent a refresh the pending rate shrinks proportionally to the time
    /// elapsed and reaches zero at the decay horizon, bounding stale demand
    /// inflation.
    pub fn effective_rbdc_kbps(&self, now_ms: u64, decay_ms: u64) -> f64 {
        let Some(refreshed) = self.rbdc_refreshed_ms else {
            return 0.0;
        };
        let elapsed = now_ms.saturating_sub(refreshed);
        if elapsed >= decay_ms {
            return 0.0;
        }
        self.rbdc_kbps * (1.0 - elapsed as f64 / decay_ms as f64)
    }

    /// Adds volume to the VBDC backlog, capped at the provisioned maximum.
    pub fn push_vbdc(&mut self, bytes: u64) {
        let cap = self.service.max_vbdc_backlog_bytes;
        let updated = self.vbdc_backlog_bytes.saturating_add(bytes);
        if updated > cap {
            debug!(
                terminal = %self.service.id,
                backlog = updated,
                cap,
                "VBDC backlog capped"
            );
        }
        self.vbdc_backlog_bytes = updated.min(cap);
    }

    /// Current VBDC backlog in bytes.
    pub fn vbdc_backlog_bytes(&self) -> u64 {
        self.vbdc_backlog_bytes
    }

    /// Subtracts granted volume from the backlog.
    pub fn satisfy_vbdc(&mut self, granted_bytes: u64) {
        self.vbdc_backlog_bytes = self.vbdc_backlog_bytes.saturating_sub(granted_bytes);
    }

    /// Queues a C/N0 sample; it takes effect at the next cycle boundary.
    pub fn record_cno(&mut self, now_ms: u64, cno_dbhz: f64) {
        self.pending_cno.push((now_ms, cno_dbhz));
    }

    /// Applies queued C/N0 samples. Called at cycle boundaries only so that
    /// an estimate arriving mid-cycle never changes the cycle's waveform
    /// selection.
    pub fn apply_pending_cno(&mut self) {
        for (ts, cno) in self.pending_cno.drain(..) {
            self.estimator.add_sample(ts, cno);
        }
    }

    /// The current C/N0 estimate.
    pub fn cno_estimate(&mut self, now_ms: u64) -> Option<f64> {
        self.estimator.estimate(now_ms)
    }

    /// Records the carrier and waveform granted this cycle.
    pub fn set_last_assignment(&mut self, carrier: CarrierId, waveform: WaveformId) {
        self.last_carrier = Some(carrier);
        self.last_waveform = Some(waveform);
    }

    /// Carrier granted in the previous cycle, if any.
    pub fn last_carrier(&self) -> Option<CarrierId> {
        self.last_carrier
    }

    /// Waveform granted in the previous cycle, if any.
    pub fn last_waveform(&self) -> Option<WaveformId> {
        self.last_waveform
    }
}

/// Arena of terminal allocation state, keyed by terminal id.
#[derive(Debug, Clone, Default)]
pub struct TerminalArena {
    entries: BTreeMap<TerminalId, DamaEntry>,
}

impl TerminalArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the entry for a logged-on terminal, replacing any stale one.
    pub fn insert(&mut self, entry: DamaEntry) {
        self.entries.insert(entry.service.id, entry);
    }

    /// Removes a logged-off terminal's entry.
    pub fn remove(&mut self, id: TerminalId) -> Option<DamaEntry> {
        self.entries.remove(&id)
    }

    /// Looks up a terminal's entry.
    pub fn get(&self, id: TerminalId) -> Option<&DamaEntry> {
        self.entries.get(&id)
    }

    /// Looks up a terminal's entry mutably.
    pub fn get_mut(&mut self, id: TerminalId) -> Option<&mut DamaEntry> {
        self.entries.get_mut(&id)
    }

    /// True when the terminal is logged on.
    pub fn contains(&self, id: TerminalId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Iterates entries in terminal-id order.
    pub fn iter(&self) -> impl Iterator<Item = (TerminalId, &DamaEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Iterates entries mutably in terminal-id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TerminalId, &mut DamaEntry)> {
        self.entries.iter_mut().map(|(id, entry)| (*id, entry))
    }

    /// Number of logged-on terminals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no terminal is logged on.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(id: u16) -> TerminalServiceConfig {
        TerminalServiceConfig {
            id: TerminalId(id),
            cra_kbps: 64,
            min_rbdc_kbps: 0,
            max_rbdc_kbps: 512,
            max_vbdc_backlog_bytes: 10_000,
            fca_eligible: false,
        }
    }

    fn entry(id: u16) -> DamaEntry {
        DamaEntry::new(service(id), &DamaConfig::default())
    }

    #[test]
    fn test_rbdc_update_and_clamp() {
        let mut e = entry(1);
        e.update_rbdc(0, 100.0);
        assert_eq!(e.effective_rbdc_kbps(0, 1000), 100.0);

        // CRA 64 + 500 exceeds max 512: clamp to 512 - 64
        e.update_rbdc(0, 500.0);
        assert_eq!(e.effective_rbdc_kbps(0, 1000), 448.0);
    }

    #[test]
    fn test_rbdc_minimum_rate_floor() {
        let mut svc = service(1);
        svc.min_rbdc_kbps = 128;
        let mut e = DamaEntry::new(svc, &DamaConfig::default());
        // CRA 64 + 10 below min 128: floor to 128 - 64
        e.update_rbdc(0, 10.0);
        assert_eq!(e.effective_rbdc_kbps(0, 1000), 64.0);
    }

    #[test]
    fn test_rbdc_linear_decay() {
        let mut e = entry(1);
        e.update_rbdc(0, 100.0);
        assert_eq!(e.effective_rbdc_kbps(500, 1000), 50.0);
        assert_eq!(e.effective_rbdc_kbps(750, 1000), 25.0);
        assert_eq!(e.effective_rbdc_kbps(1000, 1000), 0.0);
        assert_eq!(e.effective_rbdc_kbps(5000, 1000), 0.0);
    }

    #[test]
    fn test_rbdc_refresh_resets_decay() {
        let mut e = entry(1);
        e.update_rbdc(0, 100.0);
        e.update_rbdc(900, 80.0);
        assert_eq!(e.effective_rbdc_kbps(900, 1000), 80.0);
    }

    #[test]
    fn test_rbdc_without_request_is_zero() {
        let e = entry(1);
        assert_eq!(e.effective_rbdc_kbps(1234, 1000), 0.0);
    }

    #[test]
    fn test_vbdc_accumulates_and_caps() {
        let mut e = entry(1);
        e.push_vbdc(4_000);
        e.push_vbdc(4_000);
        assert_eq!(e.vbdc_backlog_bytes(), 8_000);
        e.push_vbdc(4_000);
        assert_eq!(e.vbdc_backlog_bytes(), 10_000);
    }

    #[test]
    fn test_vbdc_satisfy() {
        let mut e = entry(1);
        e.push_vbdc(5_000);
        e.satisfy_vbdc(2_000);
        assert_eq!(e.vbdc_backlog_bytes(), 3_000);
        e.satisfy_vbdc(9_999);
        assert_eq!(e.vbdc_backlog_bytes(), 0);
    }

    #[test]
    fn test_cno_deferred_until_applied() {
        let mut e = entry(1);
        e.record_cno(10, 65.0);
        // not applied yet: mid-cycle estimates must not take effect
        assert_eq!(e.cno_estimate(20), None);
        e.apply_pending_cno();
        assert_eq!(e.cno_estimate(20), Some(65.0));
    }

    #[test]
    fn test_arena_ordering_and_lifecycle() {
        let mut arena = TerminalArena::new();
        arena.insert(entry(3));
        arena.insert(entry(1));
        arena.insert(entry(2));
        let ids: Vec<_> = arena.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![TerminalId(1), TerminalId(2), TerminalId(3)]);

        assert!(arena.contains(TerminalId(2)));
        arena.remove(TerminalId(2));
        assert!(!arena.contains(TerminalId(2)));
        assert_eq!(arena.len(), 2);
    }
}
