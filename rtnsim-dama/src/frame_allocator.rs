//! Per-carrier frame allocation
//!
//! The frame allocator turns one carrier's worth of per-terminal demand
//! into concrete time-slot grants. Allocation is two-pass:
//!
//! 1. **Guaranteed pass** - CRA is granted in full, in terminal-id order.
//!    CRA oversubscription is a configuration fault, not a degradation:
//!    the cycle is aborted and the prior plan stays in force.
//! 2. **Dynamic pass** - the remaining capacity (bounded by the target
//!    load) is distributed over RBDC, then VBDC, then FCA, each category
//!    split by the configured fair-share policy.
//!
//! Granted symbol amounts are then quantized into whole waveform bursts;
//! the VBDC residual below one burst stays in the terminal's backlog while
//! RBDC residual is discarded, being an instantaneous rate.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, trace};

use rtnsim_common::config::{DamaConfig, FairSharePolicy};
use rtnsim_common::{CarrierId, TerminalId, WaveformId};

use crate::frame::Carrier;
use crate::request::TerminalDemand;
use crate::waveform::{Waveform, WaveformConf};

/// Fatal allocation faults. Anything recoverable (an infeasible waveform,
/// an unfillable request) shows up as a reduced or deferred grant instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    /// The guaranteed CRA demand does not fit the carrier. A contractual
    /// guarantee cannot be silently degraded, so the cycle is aborted.
    #[error(
        "CRA demand of {required_symbols:.0} symbols exceeds the \
         {capacity_symbols:.0} symbol capacity of {carrier}"
    )]
    CapacityExceeded {
        /// Oversubscribed carrier.
        carrier: CarrierId,
        /// Total guaranteed symbols demanded.
        required_symbols: f64,
        /// Carrier symbol capacity.
        capacity_symbols: f64,
    },
}

/// One granted burst opportunity on a carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlot {
    /// Slot identifier, unique within the carrier for the cycle.
    pub slot_id: u16,
    /// Carrier the slot lives on.
    pub carrier: CarrierId,
    /// Offset of the burst start from the superframe start.
    pub start_offset: Duration,
    /// Burst duration.
    pub duration: Duration,
    /// Waveform the burst must use.
    pub waveform: WaveformId,
    /// Terminal the slot is assigned to.
    pub terminal: TerminalId,
}

/// Per-terminal outcome of one carrier allocation.
///
/// The symbol fields carry the continuous shares before burst quantization;
/// `bursts`/`granted_bytes` carry the quantized result that reaches the
/// TBTP.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalGrant {
    /// Terminal this grant belongs to.
    pub terminal: TerminalId,
    /// Carrier the grant is on.
    pub carrier: CarrierId,
    /// Waveform selected for the terminal this cycle.
    pub waveform: WaveformId,
    /// Guaranteed symbols granted.
    pub cra_symbols: f64,
    /// Rate-based dynamic symbols granted.
    pub rbdc_symbols: f64,
    /// Volume-based dynamic symbols granted.
    pub vbdc_symbols: f64,
    /// Free-capacity symbols granted.
    pub fca_symbols: f64,
    /// Whole bursts the grant was quantized into.
    pub bursts: u32,
    /// Payload bytes the bursts carry.
    pub granted_bytes: u64,
    /// Portion of `granted_bytes` attributable to VBDC; subtracted from
    /// the terminal's backlog by the scheduler.
    pub vbdc_granted_bytes: u64,
}

impl TerminalGrant {
    /// Total granted symbols across categories, before quantization.
    pub fn total_symbols(&self) -> f64 {
        self.cra_symbols + self.rbdc_symbols + self.vbdc_symbols + self.fca_symbols
    }
}

/// Result of allocating one carrier for one superframe.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierAllocation {
    /// The carrier allocated.
    pub carrier: CarrierId,
    /// Generated time slots in transmission order.
    pub slots: Vec<TimeSlot>,
    /// Per-terminal grants, in terminal-id order.
    pub grants: Vec<TerminalGrant>,
    /// Burst symbols placed on the carrier, guard times excluded.
    pub used_symbols: f64,
}

/// The two-pass per-carrier allocator.
///
/// Pure given a frozen demand snapshot: identical inputs (including the
/// placement seed) produce an identical allocation.
pub struct FrameAllocator<'a> {
    waveforms: &'a WaveformConf,
    dama: &'a DamaConfig,
}

struct Candidate<'w> {
    terminal: TerminalId,
    waveform: &'w Waveform,
    cra_symbols: f64,
    rbdc_request: f64,
    vbdc_request: f64,
    fca_eligible: bool,
}

impl<'a> FrameAllocator<'a> {
    /// Creates an allocator over the given waveform table and DAMA policy.
    pub fn new(waveforms: &'a WaveformConf, dama: &'a DamaConfig) -> Self {
        Self { waveforms, dama }
    }

    /// Allocates one carrier for one superframe.
    ///
    /// `seed` keys the slot placement order; the scheduler passes the
    /// superframe counter so that re-running over the same frozen snapshot
    /// reproduces the same plan.
    pub fn allocate(
        &self,
        carrier: &Carrier,
        demands: &[TerminalDemand],
        seed: u64,
    ) -> Result<CarrierAllocation, AllocationError> {
        let candidates = self.admit(demands);
        let capacity = carrier.capacity_symbols();

        // Guaranteed pass: CRA in full or the cycle dies.
        let total_cra: f64 = candidates.iter().map(|c| c.cra_symbols).sum();
        if total_cra > capacity {
            return Err(AllocationError::CapacityExceeded {
                carrier: carrier.id(),
                required_symbols: total_cra,
                capacity_symbols: capacity,
            });
        }

        // Dynamic pass: RBDC, then VBDC, then FCA out of what the target
        // load leaves above the guaranteed share.
        let mut pool = (capacity * self.dama.target_load - total_cra).max(0.0);

        let rbdc_grants = fair_share(
            pool,
            candidates
                .iter()
                .map(|c| (c.terminal, c.rbdc_request))
                .collect(),
            self.dama.fair_share,
        );
        pool -= rbdc_grants.values().sum::<f64>();

        let vbdc_grants = fair_share(
            pool,
            candidates
                .iter()
                .map(|c| (c.terminal, c.vbdc_request))
                .collect(),
            self.dama.fair_share,
        );
        pool -= vbdc_grants.values().sum::<f64>();

        let fca_grants = self.share_free_capacity(pool, &candidates);

        trace!(
            carrier = %carrier.id(),
            cra = total_cra,
            leftover = pool,
            "dynamic pass complete"
        );

        Ok(self.generate_time_slots(
            carrier,
            &candidates,
            &rbdc_grants,
            &vbdc_grants,
            &fca_grants,
            seed,
        ))
    }

    /// Selects a waveform per terminal and converts byte demand into
    /// symbols. Terminals without a feasible waveform are excluded for the
    /// cycle (their requests persist) unless the robust fallback is on.
    fn admit(&self, demands: &[TerminalDemand]) -> Vec<Candidate<'a>> {
        let mut sorted: Vec<&TerminalDemand> = demands.iter().collect();
        sorted.sort_by_key(|d| d.terminal);

        let mut candidates = Vec::with_capacity(sorted.len());
        for demand in sorted {
            let waveform = match self.waveforms.select_best(demand.cno_dbhz) {
                Ok(waveform) => waveform,
                Err(err) if self.dama.fallback_most_robust => {
                    let waveform = self.waveforms.most_robust();
                    debug!(
                        terminal = %demand.terminal,
                        waveform = %waveform.id(),
                        "{err}; falling back to most robust waveform"
                    );
                    waveform
                }
                Err(err) => {
                    debug!(terminal = %demand.terminal, "{err}; excluded this cycle");
                    continue;
                }
            };
            let spb = waveform.symbols_per_byte();
            candidates.push(Candidate {
                terminal: demand.terminal,
                waveform,
                cra_symbols: demand.cra_bytes as f64 * spb,
                rbdc_request: demand.rbdc_bytes as f64 * spb,
                vbdc_request: demand.vbdc_bytes as f64 * spb,
                fca_eligible: demand.fca_eligible,
            });
        }
        candidates
    }

    /// Splits leftover capacity equally among FCA-eligible terminals.
    fn share_free_capacity(
        &self,
        pool: f64,
        candidates: &[Candidate<'_>],
    ) -> BTreeMap<TerminalId, f64> {
        if !self.dama.fca_enabled || pool <= 0.0 {
            return BTreeMap::new();
        }
        let eligible: Vec<TerminalId> = candidates
            .iter()
            .filter(|c| c.fca_eligible)
            .map(|c| c.terminal)
            .collect();
        if eligible.is_empty() {
            return BTreeMap::new();
        }
        let share = pool / eligible.len() as f64;
        eligible.into_iter().map(|t| (t, share)).collect()
    }

    /// Quantizes symbol grants into whole bursts and lays them out on the
    /// carrier timeline. The placement order is shuffled so no terminal
    /// systematically transmits first, keyed by the seed for
    /// reproducibility.
    fn generate_time_slots(
        &self,
        carrier: &Carrier,
        candidates: &[Candidate<'_>],
        rbdc_grants: &BTreeMap<TerminalId, f64>,
        vbdc_grants: &BTreeMap<TerminalId, f64>,
        fca_grants: &BTreeMap<TerminalId, f64>,
        seed: u64,
    ) -> CarrierAllocation {
        let capacity = carrier.capacity_symbols();
        let guard = f64::from(carrier.guard_time_symbols());
        let symbol_rate = carrier.symbol_rate_baud();

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed ^ (u64::from(carrier.id().0) << 32));
        order.shuffle(&mut rng);

        let mut slots = Vec::new();
        let mut grants = Vec::new();
        let mut used_symbols = 0.0;
        let mut cursor = 0.0; // symbols from superframe start, guard included
        let mut next_slot_id: u16 = 0;

        for index in order {
            let candidate = &candidates[index];
            let rbdc = rbdc_grants
                .get(&candidate.terminal)
                .copied()
                .unwrap_or(0.0);
            let vbdc = vbdc_grants
                .get(&candidate.terminal)
                .copied()
                .unwrap_or(0.0);
            let fca = fca_grants.get(&candidate.terminal).copied().unwrap_or(0.0);
            let granted = candidate.cra_symbols + rbdc + vbdc + fca;
            if granted <= 0.0 {
                continue;
            }

            let burst_len = f64::from(candidate.waveform.burst_length_symbols());
            let unit = burst_len + guard;
            let fit = ((capacity - cursor) / unit).floor().max(0.0) as u32;
            let bursts = ((granted / burst_len).floor() as u32).min(fit);

            // Attribute placed symbols to categories in priority order so
            // the VBDC share can be returned to the backlog accounting.
            let placed_symbols = f64::from(bursts) * burst_len;
            let mut rest = placed_symbols - candidate.cra_symbols.min(placed_symbols);
            rest -= rbdc.min(rest);
            let vbdc_taken = vbdc.min(rest);
            let vbdc_granted_bytes =
                (vbdc_taken / candidate.waveform.symbols_per_byte()).floor() as u64;

            for _ in 0..bursts {
                slots.push(TimeSlot {
                    slot_id: next_slot_id,
                    carrier: carrier.id(),
                    start_offset: Duration::from_secs_f64(cursor / symbol_rate),
                    duration: candidate.waveform.burst_duration(symbol_rate),
                    waveform: candidate.waveform.id(),
                    terminal: candidate.terminal,
                });
                next_slot_id += 1;
                cursor += unit;
            }
            used_symbols += placed_symbols;

            grants.push(TerminalGrant {
                terminal: candidate.terminal,
                carrier: carrier.id(),
                waveform: candidate.waveform.id(),
                cra_symbols: candidate.cra_symbols,
                rbdc_symbols: rbdc,
                vbdc_symbols: vbdc,
                fca_symbols: fca,
                bursts,
                granted_bytes: u64::from(bursts) * u64::from(candidate.waveform.payload_bytes()),
                vbdc_granted_bytes,
            });
        }

        grants.sort_by_key(|g| g.terminal);

        CarrierAllocation {
            carrier: carrier.id(),
            slots,
            grants,
            used_symbols,
        }
    }
}

/// Splits `pool` symbols between the positive requests according to the
/// policy.
///
/// Max-min: requests are visited in ascending order (ties by terminal id)
/// and each receives the smaller of its request and the per-round fair
/// share `remaining / claimants`. A terminal with a smaller request is
/// therefore never left with a larger shortfall than one requesting more.
fn fair_share(
    pool: f64,
    requests: Vec<(TerminalId, f64)>,
    policy: FairSharePolicy,
) -> BTreeMap<TerminalId, f64> {
    let mut requests: Vec<(TerminalId, f64)> =
        requests.into_iter().filter(|(_, r)| *r > 0.0).collect();
    if requests.is_empty() || pool <= 0.0 {
        return BTreeMap::new();
    }

    match policy {
        FairSharePolicy::MaxMin => {
            requests.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            let count = requests.len();
            let mut remaining = pool;
            let mut grants = BTreeMap::new();
            for (round, (terminal, request)) in requests.into_iter().enumerate() {
                let share = remaining / (count - round) as f64;
                let grant = request.min(share);
                remaining -= grant;
                grants.insert(terminal, grant);
            }
            grants
        }
        FairSharePolicy::Proportional => {
            let total: f64 = requests.iter().map(|(_, r)| r).sum();
            let scale = (pool / total).min(1.0);
            requests
                .into_iter()
                .map(|(terminal, request)| (terminal, request * scale))
                .collect()
        }
    }
}
