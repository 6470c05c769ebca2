//! Superframe-wide allocation orchestration
//!
//! The superframe allocator drives the per-carrier frame allocator across
//! every DAMA carrier, owns the terminal-to-carrier homing and publishes
//! contention windows for the random-access carriers. Terminals are only
//! moved between carriers at re-homing epoch boundaries to keep the slot
//! plan stable from cycle to cycle.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

use rtnsim_common::config::{DamaConfig, RandomAccessConfig, RandomAccessScheme};
use rtnsim_common::{CarrierId, SuperframeCounter, TerminalId};

use crate::frame::{Carrier, SuperframeConf};
use crate::frame_allocator::{AllocationError, CarrierAllocation, FrameAllocator, TerminalGrant, TimeSlot};
use crate::request::TerminalDemand;
use crate::waveform::WaveformConf;

/// A contention window on a random-access carrier.
///
/// Random-access capacity is published as windows plus the applicable
/// scheme; individual transmissions are the terminals' business and
/// collisions a PHY-layer outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RaWindow {
    /// Carrier the window lives on.
    pub carrier: CarrierId,
    /// Window start relative to the superframe start.
    pub start_offset: Duration,
    /// Window length.
    pub duration: Duration,
    /// Contention scheme in force.
    pub scheme: RandomAccessScheme,
    /// Burst replicas per unique payload (1 for slotted ALOHA).
    pub replicas: u8,
}

/// The consolidated allocation outcome of one superframe.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPlan {
    /// Superframe this plan is for.
    pub superframe: SuperframeCounter,
    /// Per-carrier DAMA allocations.
    pub carriers: Vec<CarrierAllocation>,
    /// Random-access contention windows.
    pub ra_windows: Vec<RaWindow>,
}

impl SlotPlan {
    /// Iterates all time slots of the plan.
    pub fn slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.carriers.iter().flat_map(|c| c.slots.iter())
    }

    /// Iterates all per-terminal grants of the plan.
    pub fn grants(&self) -> impl Iterator<Item = &TerminalGrant> {
        self.carriers.iter().flat_map(|c| c.grants.iter())
    }

    /// Total number of assigned time slots.
    pub fn slot_count(&self) -> usize {
        self.carriers.iter().map(|c| c.slots.len()).sum()
    }
}

/// Orchestrates per-carrier allocation across a superframe.
pub struct SuperframeAllocator {
    conf: SuperframeConf,
    waveforms: WaveformConf,
    dama: DamaConfig,
    random_access: RandomAccessConfig,
    assignments: BTreeMap<TerminalId, CarrierId>,
}

impl SuperframeAllocator {
    /// Creates the allocator over a fixed superframe geometry.
    pub fn new(
        conf: SuperframeConf,
        waveforms: WaveformConf,
        dama: DamaConfig,
        random_access: RandomAccessConfig,
    ) -> Self {
        Self {
            conf,
            waveforms,
            dama,
            random_access,
            assignments: BTreeMap::new(),
        }
    }

    /// The superframe geometry this allocator runs over.
    pub fn superframe(&self) -> &SuperframeConf {
        &self.conf
    }

    /// The carrier a terminal is currently homed on, if any.
    pub fn assignment(&self, terminal: TerminalId) -> Option<CarrierId> {
        self.assignments.get(&terminal).copied()
    }

    /// Homes a terminal on a specific carrier, overriding the automatic
    /// least-loaded placement.
    pub fn assign(&mut self, terminal: TerminalId, carrier: CarrierId) {
        self.assignments.insert(terminal, carrier);
    }

    /// Forgets a logged-off terminal's carrier assignment.
    pub fn remove_terminal(&mut self, terminal: TerminalId) {
        self.assignments.remove(&terminal);
    }

    /// Runs one superframe's allocation over a frozen demand snapshot.
    ///
    /// A `CapacityExceeded` on any carrier aborts the whole cycle; the
    /// caller keeps the prior plan in force.
    pub fn allocate(
        &mut self,
        demands: &[TerminalDemand],
        counter: SuperframeCounter,
    ) -> Result<SlotPlan, AllocationError> {
        self.home_terminals(demands);
        if counter.is_epoch_boundary(self.dama.rehoming_epoch_superframes) {
            self.rehome(demands);
        }

        let allocator = FrameAllocator::new(&self.waveforms, &self.dama);
        let mut carriers = Vec::new();
        for carrier in self.conf.dama_carriers() {
            let subset: Vec<TerminalDemand> = demands
                .iter()
                .filter(|d| self.assignments.get(&d.terminal) == Some(&carrier.id()))
                .cloned()
                .collect();
            carriers.push(allocator.allocate(carrier, &subset, u64::from(counter.value()))?);
        }

        Ok(SlotPlan {
            superframe: counter,
            carriers,
            ra_windows: self.random_access_windows(),
        })
    }

    /// Assigns every demanding terminal without a valid home to the least
    /// loaded DAMA carrier.
    fn home_terminals(&mut self, demands: &[TerminalDemand]) {
        let conf = &self.conf;
        self.assignments
            .retain(|_, carrier| conf.carrier(*carrier).is_some_and(Carrier::is_dama));

        let mut loads = self.carrier_loads(demands);
        for demand in demands {
            if self.assignments.contains_key(&demand.terminal) {
                continue;
            }
            let Some(target) = least_loaded(&loads) else {
                break;
            };
            debug!(terminal = %demand.terminal, carrier = %target, "terminal homed");
            self.assignments.insert(demand.terminal, target);
            if let Some(load) = loads.get_mut(&target) {
                *load += demand.total_bytes();
            }
        }
    }

    /// Moves terminals off saturated carriers onto ones with spare
    /// capacity. Runs at epoch boundaries only, never mid-cycle.
    fn rehome(&mut self, demands: &[TerminalDemand]) {
        let capacity: BTreeMap<CarrierId, u64> = self
            .conf
            .dama_carriers()
            .map(|c| (c.id(), self.carrier_capacity_bytes(c)))
            .collect();
        let mut loads = self.carrier_loads(demands);

        let mut per_carrier: BTreeMap<CarrierId, Vec<(TerminalId, u64)>> = BTreeMap::new();
        for demand in demands {
            if let Some(carrier) = self.assignments.get(&demand.terminal) {
                per_carrier
                    .entry(*carrier)
                    .or_default()
                    .push((demand.terminal, demand.total_bytes()));
            }
        }

        for (carrier, mut terminals) in per_carrier {
            if loads.get(&carrier).copied().unwrap_or(0) <= capacity[&carrier] {
                continue;
            }
            // move the smallest demands first to minimize plan churn
            terminals.sort_by_key(|(terminal, bytes)| (*bytes, *terminal));
            for (terminal, bytes) in terminals {
                if loads[&carrier] <= capacity[&carrier] || bytes == 0 {
                    continue;
                }
                let target = loads
                    .iter()
                    .filter(|(id, load)| **id != carrier && **load + bytes <= capacity[*id])
                    .min_by_key(|(id, load)| (**load, **id))
                    .map(|(id, _)| *id);
                let Some(target) = target else {
                    break;
                };
                info!(%terminal, from = %carrier, to = %target, "terminal re-homed");
                self.assignments.insert(terminal, target);
                if let Some(load) = loads.get_mut(&carrier) {
                    *load -= bytes;
                }
                if let Some(load) = loads.get_mut(&target) {
                    *load += bytes;
                }
            }
        }
    }

    /// Demand bytes currently homed on each DAMA carrier.
    fn carrier_loads(&self, demands: &[TerminalDemand]) -> BTreeMap<CarrierId, u64> {
        let mut loads: BTreeMap<CarrierId, u64> =
            self.conf.dama_carriers().map(|c| (c.id(), 0)).collect();
        for demand in demands {
            if let Some(carrier) = self.assignments.get(&demand.terminal) {
                if let Some(load) = loads.get_mut(carrier) {
                    *load += demand.total_bytes();
                }
            }
        }
        loads
    }

    /// Rough byte capacity of a carrier, using the default waveform's
    /// symbol cost. Only a homing heuristic; the frame allocator enforces
    /// the real symbol budget.
    fn carrier_capacity_bytes(&self, carrier: &Carrier) -> u64 {
        (carrier.capacity_symbols() / self.waveforms.default_waveform().symbols_per_byte()) as u64
    }

    /// Publishes one contention window per random-access carrier covering
    /// the whole superframe.
    fn random_access_windows(&self) -> Vec<RaWindow> {
        let replicas = match self.random_access.scheme {
            RandomAccessScheme::SlottedAloha => 1,
            RandomAccessScheme::Crdsa => self.random_access.crdsa.replicas,
        };
        self.conf
            .random_access_carriers()
            .map(|carrier| RaWindow {
                carrier: carrier.id(),
                start_offset: Duration::ZERO,
                duration: self.conf.duration(),
                scheme: self.random_access.scheme,
                replicas,
            })
            .collect()
    }
}

fn least_loaded(loads: &BTreeMap<CarrierId, u64>) -> Option<CarrierId> {
    loads
        .iter()
        .min_by_key(|(id, load)| (**load, **id))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtnsim_common::config::{
        CarrierTrafficType, CrdsaConfig, FrameConfig, SuperframeConfig, WaveformConfig,
        WaveformTableConfig,
    };
    use rtnsim_common::{FrameId, WaveformId};

    fn unit_waveforms() -> WaveformConf {
        WaveformConf::from_config(&WaveformTableConfig {
            acm_enabled: true,
            default_waveform: WaveformId(1),
            waveforms: vec![WaveformConfig {
                id: WaveformId(1),
                modulated_bits: 2,
                coding_rate: 0.5,
                payload_bytes: 10,
                burst_length_symbols: 10,
                required_cno_dbhz: 60.0,
            }],
        })
        .unwrap()
    }

    /// Two DAMA carriers of 100 symbols each plus one RA carrier.
    fn superframe() -> SuperframeConf {
        SuperframeConf::from_config(&SuperframeConfig {
            duration_ms: 100,
            frames: vec![
                FrameConfig {
                    frame_id: FrameId(0),
                    carrier_count: 2,
                    symbol_rate_baud: 1000.0,
                    guard_time_symbols: 0,
                    traffic: CarrierTrafficType::Dama,
                },
                FrameConfig {
                    frame_id: FrameId(1),
                    carrier_count: 1,
                    symbol_rate_baud: 1000.0,
                    guard_time_symbols: 0,
                    traffic: CarrierTrafficType::RandomAccess,
                },
            ],
        })
        .unwrap()
    }

    fn allocator(dama: DamaConfig) -> SuperframeAllocator {
        SuperframeAllocator::new(
            superframe(),
            unit_waveforms(),
            dama,
            RandomAccessConfig {
                scheme: RandomAccessScheme::Crdsa,
                crdsa: CrdsaConfig::default(),
            },
        )
    }

    fn demand(terminal: u16, cra: u64, rbdc: u64) -> TerminalDemand {
        TerminalDemand {
            terminal: TerminalId(terminal),
            cra_bytes: cra,
            rbdc_bytes: rbdc,
            vbdc_bytes: 0,
            fca_eligible: false,
            cno_dbhz: Some(70.0),
        }
    }

    #[test]
    fn test_homing_spreads_terminals() {
        let mut alloc = allocator(DamaConfig::default());
        let demands = vec![demand(1, 40, 0), demand(2, 40, 0)];
        alloc.allocate(&demands, SuperframeCounter::new(1)).unwrap();

        // least-loaded homing puts the terminals on different carriers
        let a = alloc.assignment(TerminalId(1)).unwrap();
        let b = alloc.assignment(TerminalId(2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_assignment_is_sticky_between_cycles() {
        let mut alloc = allocator(DamaConfig::default());
        let demands = vec![demand(1, 40, 0), demand(2, 40, 0)];
        alloc.allocate(&demands, SuperframeCounter::new(1)).unwrap();
        let before: Vec<_> = [1, 2]
            .iter()
            .map(|&t| alloc.assignment(TerminalId(t)).unwrap())
            .collect();

        alloc.allocate(&demands, SuperframeCounter::new(2)).unwrap();
        let after: Vec<_> = [1, 2]
            .iter()
            .map(|&t| alloc.assignment(TerminalId(t)).unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_per_carrier_capacity_bound() {
        let mut alloc = allocator(DamaConfig::default());
        let demands = vec![
            demand(1, 40, 200),
            demand(2, 40, 200),
            demand(3, 20, 200),
            demand(4, 20, 200),
        ];
        let plan = alloc.allocate(&demands, SuperframeCounter::new(1)).unwrap();

        for carrier_alloc in &plan.carriers {
            let granted: f64 = carrier_alloc
                .grants
                .iter()
                .map(TerminalGrant::total_symbols)
                .sum();
            assert!(granted <= 100.0 + 1e-9);
        }
    }

    #[test]
    fn test_cra_oversubscription_aborts_cycle() {
        let mut alloc = allocator(DamaConfig::default());
        // both forced onto carrier 0 with 110 CRA symbols total
        alloc.assign(TerminalId(1), CarrierId(0));
        alloc.assign(TerminalId(2), CarrierId(0));
        let demands = vec![demand(1, 40, 0), demand(2, 70, 0)];
        // counter 1 is not an epoch boundary, so no re-homing rescue
        let err = alloc
            .allocate(&demands, SuperframeCounter::new(1))
            .unwrap_err();
        assert!(matches!(err, AllocationError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_rehoming_only_at_epoch_boundary() {
        let dama = DamaConfig {
            rehoming_epoch_superframes: 10,
            ..DamaConfig::default()
        };
        let mut alloc = allocator(dama);
        // overload carrier 0: 150 bytes demanded against ~100 capacity
        alloc.assign(TerminalId(1), CarrierId(0));
        alloc.assign(TerminalId(2), CarrierId(0));
        let demands = vec![demand(1, 40, 60), demand(2, 30, 20)];

        // mid-epoch: the saturated carrier keeps both terminals
        alloc.allocate(&demands, SuperframeCounter::new(3)).unwrap();
        assert_eq!(alloc.assignment(TerminalId(1)), Some(CarrierId(0)));
        assert_eq!(alloc.assignment(TerminalId(2)), Some(CarrierId(0)));

        // epoch boundary: the smaller terminal moves to the spare carrier
        alloc.allocate(&demands, SuperframeCounter::new(10)).unwrap();
        assert_eq!(alloc.assignment(TerminalId(1)), Some(CarrierId(0)));
        assert_eq!(alloc.assignment(TerminalId(2)), Some(CarrierId(1)));
    }

    #[test]
    fn test_random_access_windows_published() {
        let mut alloc = allocator(DamaConfig::default());
        let plan = alloc.allocate(&[], SuperframeCounter::new(1)).unwrap();

        assert_eq!(plan.ra_windows.len(), 1);
        let window = &plan.ra_windows[0];
        assert_eq!(window.carrier, CarrierId(2));
        assert_eq!(window.start_offset, Duration::ZERO);
        assert_eq!(window.duration, Duration::from_millis(100));
        assert_eq!(window.scheme, RandomAccessScheme::Crdsa);
        assert_eq!(window.replicas, 3);
    }

    #[test]
    fn test_ra_carriers_never_get_dama_slots() {
        let mut alloc = allocator(DamaConfig::default());
        let demands = vec![demand(1, 40, 100), demand(2, 40, 100)];
        let plan = alloc.allocate(&demands, SuperframeCounter::new(1)).unwrap();

        for slot in plan.slots() {
            assert_ne!(slot.carrier, CarrierId(2));
        }
    }

    #[test]
    fn test_logoff_forgets_assignment() {
        let mut alloc = allocator(DamaConfig::default());
        let demands = vec![demand(1, 40, 0)];
        alloc.allocate(&demands, SuperframeCounter::new(1)).unwrap();
        assert!(alloc.assignment(TerminalId(1)).is_some());

        alloc.remove_terminal(TerminalId(1));
        assert!(alloc.assignment(TerminalId(1)).is_none());
    }
}
