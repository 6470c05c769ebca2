//! TBTP publisher task
//!
//! Serializes each cycle's slot plan and broadcasts it to every terminal
//! in the beam. Publication is fail-safe, not fail-stop: a plan that
//! cannot make its transmission deadline is dropped with a warning and the
//! previously broadcast plan simply remains in force at the terminals.

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{info, warn};

use rtnsim_common::logging::{log_control_message, Direction};
use rtnsim_tbtp::TbtpMessage;

use crate::tasks::{NccTaskBase, PublisherMessage, Task, TaskMessage};

/// Capacity of the terminal-facing broadcast channel.
const BROADCAST_CAPACITY: usize = 16;

/// The TBTP publisher actor.
pub struct PublisherTask {
    _task_base: NccTaskBase,
    tbtp_tx: broadcast::Sender<Bytes>,
    active_plan: Option<Bytes>,
    missed_deadlines: u64,
}

impl PublisherTask {
    /// Creates the publisher with its terminal-facing broadcast channel.
    pub fn new(task_base: NccTaskBase) -> Self {
        let (tbtp_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            _task_base: task_base,
            tbtp_tx,
            active_plan: None,
            missed_deadlines: 0,
        }
    }

    /// Subscribes a terminal-side listener to the TBTP broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tbtp_tx.subscribe()
    }

    /// The last successfully published plan, if any.
    pub fn active_plan(&self) -> Option<&Bytes> {
        self.active_plan.as_ref()
    }

    /// Number of plans dropped for missing their deadline.
    pub fn missed_deadlines(&self) -> u64 {
        self.missed_deadlines
    }

    fn handle_publish(&mut self, message: TbtpMessage, deadline: Instant) {
        if Instant::now() > deadline {
            // recoverable: terminals keep following the stale plan
            self.missed_deadlines += 1;
            warn!(
                superframe = message.superframe,
                missed = self.missed_deadlines,
                "publish deadline missed; prior plan remains in force"
            );
            return;
        }

        let encoded = match rtnsim_tbtp::encode(&message) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(superframe = message.superframe, "TBTP encoding failed: {err}");
                return;
            }
        };

        log_control_message("TBTP", Direction::Tx, "burst time plan", &encoded);
        info!(
            superframe = message.superframe,
            slots = message.assignment_count(),
            bytes = encoded.len(),
            "TBTP broadcast"
        );

        self.active_plan = Some(encoded.clone());
        // no subscribers is fine; the broadcast is best-effort
        let _ = self.tbtp_tx.send(encoded);
    }
}

#[async_trait::async_trait]
impl Task for PublisherTask {
    type Message = PublisherMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("TBTP publisher task started");
        loop {
            match rx.recv().await {
                Some(TaskMessage::Message(PublisherMessage::PublishPlan {
                    message,
                    deadline,
                })) => self.handle_publish(message, deadline),
                Some(TaskMessage::Shutdown) | None => break,
            }
        }
        info!(
            missed_deadlines = self.missed_deadlines,
            "TBTP publisher task stopped"
        );
    }
}
