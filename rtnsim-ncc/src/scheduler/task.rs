//! Beam scheduler task
//!
//! Drives the periodic allocation cycle: collects capacity requests until
//! the superframe timer fires, runs the superframe allocator over the
//! frozen snapshot, applies the grants to the persistent terminal state and
//! hands the plan to the publisher with its transmission deadline.
//!
//! The task owns every piece of mutable allocation state (terminal arena,
//! carrier assignments, cycle counter), so no locking is needed: one
//! logical owner per cycle, by construction.

use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use rtnsim_common::config::{RandomAccessScheme, TerminalServiceConfig};
use rtnsim_common::{Result, SuperframeCounter, TerminalId};
use rtnsim_dama::{
    aggregate, CapacityRequest, DamaEntry, SlotPlan, SuperframeAllocator, SuperframeConf,
    TerminalArena, WaveformConf,
};
use rtnsim_tbtp::{RaSchemeCode, RaWindowEntry, SlotAssignment, TbtpMessage};

use crate::scheduler::CycleStateMachine;
use crate::tasks::{NccTaskBase, PublisherMessage, SchedulerMessage, Task, TaskMessage};

/// The beam scheduler actor.
pub struct BeamSchedulerTask {
    task_base: NccTaskBase,
    arena: TerminalArena,
    allocator: SuperframeAllocator,
    cycle: CycleStateMachine,
    counter: SuperframeCounter,
    pending_requests: Vec<CapacityRequest>,
    pending_logons: Vec<TerminalServiceConfig>,
    pending_logoffs: Vec<TerminalId>,
    epoch: Instant,
}

impl BeamSchedulerTask {
    /// Builds the scheduler from the loaded configuration. Configuration
    /// faults (bad geometry, bad waveform table) are fatal here, at
    /// startup.
    pub fn new(task_base: NccTaskBase) -> Result<Self> {
        let config = task_base.config.clone();
        let superframe = SuperframeConf::from_config(&config.superframe)?;
        let waveforms = WaveformConf::from_config(&config.waveform_table)?;
        let allocator = SuperframeAllocator::new(
            superframe,
            waveforms,
            config.dama.clone(),
            config.random_access.clone(),
        );

        Ok(Self {
            task_base,
            arena: TerminalArena::new(),
            allocator,
            cycle: CycleStateMachine::new(),
            counter: SuperframeCounter::initial(),
            pending_requests: Vec::new(),
            pending_logons: config.terminals.clone(),
            pending_logoffs: Vec::new(),
            epoch: Instant::now(),
        })
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Queues an incoming message. Everything that would touch allocation
    /// state is deferred to the next cycle boundary to preserve snapshot
    /// consistency.
    fn handle_message(&mut self, msg: SchedulerMessage) {
        match msg {
            SchedulerMessage::CapacityRequest(request) => {
                debug!(
                    terminal = %request.terminal,
                    category = %request.category,
                    "capacity request queued"
                );
                self.pending_requests.push(request);
            }
            SchedulerMessage::CnoReport {
                terminal,
                cno_dbhz,
                timestamp_ms,
            } => {
                // queued inside the entry; takes effect at the boundary
                match self.arena.get_mut(terminal) {
                    Some(entry) => entry.record_cno(timestamp_ms, cno_dbhz),
                    None => warn!(%terminal, "C/N0 report for unknown terminal"),
                }
            }
            SchedulerMessage::TerminalLogon { service } => {
                info!(terminal = %service.id, "terminal logon queued");
                self.pending_logons.push(service);
            }
            SchedulerMessage::TerminalLogoff { terminal } => {
                info!(%terminal, "terminal logoff queued");
                self.pending_logoffs.push(terminal);
            }
        }
    }

    /// Applies deferred logon/logoff and C/N0 updates. Runs only at the
    /// cycle boundary, inside `Allocating`.
    fn apply_deferred(&mut self) {
        for terminal in self.pending_logoffs.drain(..) {
            self.arena.remove(terminal);
            self.allocator.remove_terminal(terminal);
        }
        for service in self.pending_logons.drain(..) {
            self.arena
                .insert(DamaEntry::new(service, &self.task_base.config.dama));
        }
        for (_, entry) in self.arena.iter_mut() {
            entry.apply_pending_cno();
        }
    }

    /// Runs one allocation cycle at a superframe boundary.
    async fn run_cycle(&mut self, cycle_start: Instant) -> Result<()> {
        self.cycle.begin_allocating()?;
        self.apply_deferred();

        let now_ms = self.now_ms();
        let requests = std::mem::take(&mut self.pending_requests);
        let duration = self.allocator.superframe().duration();
        let demands = aggregate(
            &requests,
            &mut self.arena,
            duration,
            &self.task_base.config.dama,
            now_ms,
        );

        match self.allocator.allocate(&demands, self.counter) {
            Ok(plan) => {
                self.apply_grants(&plan);
                self.cycle.begin_publishing()?;

                let message = build_tbtp(self.task_base.config.beam_id, &plan);
                let deadline = cycle_start + duration
                    - Duration::from_millis(self.task_base.config.publish_guard_ms);
                info!(
                    superframe = %self.counter,
                    slots = plan.slot_count(),
                    ra_windows = plan.ra_windows.len(),
                    "plan allocated"
                );
                if self
                    .task_base
                    .publisher_tx
                    .send(PublisherMessage::PublishPlan { message, deadline })
                    .await
                    .is_err()
                {
                    warn!("publisher task gone; plan dropped");
                }
                self.cycle.complete()?;
            }
            Err(err) => {
                // fatal for the cycle only: the prior plan stays in force
                error!(superframe = %self.counter, "allocation aborted: {err}");
                self.cycle.abort()?;
            }
        }

        self.counter.advance();
        self.cycle.begin_collecting()?;
        Ok(())
    }

    /// Feeds the grants back into the persistent terminal state: VBDC
    /// backlog shrinks by exactly the granted volume, and the last
    /// carrier/waveform assignment is remembered.
    fn apply_grants(&mut self, plan: &SlotPlan) {
        for grant in plan.grants() {
            if let Some(entry) = self.arena.get_mut(grant.terminal) {
                entry.satisfy_vbdc(grant.vbdc_granted_bytes);
                if grant.bursts > 0 {
                    entry.set_last_assignment(grant.carrier, grant.waveform);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for BeamSchedulerTask {
    type Message = SchedulerMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        let duration = self.allocator.superframe().duration();
        let mut ticker = interval_at(Instant::now() + duration, duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            beam = self.task_base.config.beam_id,
            superframe_ms = duration.as_millis() as u64,
            "beam scheduler task started"
        );
        if let Err(err) = self.cycle.begin_collecting() {
            error!("scheduler failed to start collecting: {err}");
            return;
        }

        loop {
            tokio::select! {
                maybe_msg = rx.recv() => match maybe_msg {
                    Some(TaskMessage::Message(msg)) => self.handle_message(msg),
                    Some(TaskMessage::Shutdown) | None => break,
                },
                tick = ticker.tick() => {
                    // the tick is the boundary: the superframe that just
                    // elapsed gets its plan allocated and published now
                    let cycle_start = tick;
                    if let Err(err) = self.run_cycle(cycle_start).await {
                        error!("allocation cycle failed: {err}");
                    }
                }
            }
        }

        info!(
            superframes = self.counter.value(),
            terminals = self.arena.len(),
            "beam scheduler task stopped"
        );
    }
}

/// Converts a slot plan into the wire-level TBTP message.
fn build_tbtp(beam_id: u32, plan: &SlotPlan) -> TbtpMessage {
    let mut message = TbtpMessage::new(beam_id, plan.superframe.value());

    for slot in plan.slots() {
        message.assignments.push(SlotAssignment {
            terminal: slot.terminal.0,
            carrier: slot.carrier.0,
            slot_id: slot.slot_id,
            waveform: slot.waveform.0,
            start_offset_us: slot.start_offset.as_micros() as u32,
            duration_us: slot.duration.as_micros() as u32,
        });
    }

    for window in &plan.ra_windows {
        message.ra_windows.push(RaWindowEntry {
            carrier: window.carrier.0,
            start_offset_us: window.start_offset.as_micros() as u32,
            duration_us: window.duration.as_micros() as u32,
            scheme: match window.scheme {
                RandomAccessScheme::SlottedAloha => RaSchemeCode::SlottedAloha,
                RandomAccessScheme::Crdsa => RaSchemeCode::Crdsa,
            },
            replicas: window.replicas,
        });
    }

    message
}
