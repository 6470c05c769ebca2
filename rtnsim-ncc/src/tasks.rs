//! NCC Task Framework
//!
//! This module implements the actor-based task model with message passing
//! for the NCC. Each task runs as an independent async task and
//! communicates via typed message channels.
//!
//! # Architecture
//!
//! The NCC runs two tasks:
//! - **Scheduler Task**: the beam scheduler driving the allocation cycle
//! - **Publisher Task**: TBTP serialization and broadcast with deadline
//!   enforcement
//!
//! Capacity requests, C/N0 reports and logon/logoff events arrive
//! asynchronously in the scheduler's mailbox; the superframe timer decides
//! when a cycle's snapshot freezes. The single-owner rule falls out of the
//! actor structure: only the scheduler task touches allocation state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use rtnsim_common::config::{NccConfig, TerminalServiceConfig};
use rtnsim_common::TerminalId;
use rtnsim_dama::CapacityRequest;
use rtnsim_tbtp::TbtpMessage;

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    /// Creates a new message envelope containing the given payload.
    pub fn message(msg: T) -> Self {
        TaskMessage::Message(msg)
    }

    /// Creates a shutdown signal.
    pub fn shutdown() -> Self {
        TaskMessage::Shutdown
    }

    /// Returns true if this is a shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }

    /// Returns the message payload if present, or None for shutdown.
    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

/// Handle for sending messages to a task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    /// Creates a new task handle from a sender.
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Sends a message to the task.
    ///
    /// Returns an error if the task has been dropped.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Sends a message to the task without waiting.
    pub fn try_send(&self, msg: T) -> Result<(), mpsc::error::TrySendError<TaskMessage<T>>> {
        self.tx.try_send(TaskMessage::Message(msg))
    }

    /// Sends a shutdown signal to the task.
    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    /// Returns true if the task channel is closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Base trait for all NCC tasks.
///
/// Tasks are async actors that process messages from their receive channel.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    /// The message type this task processes.
    type Message: Send;

    /// Runs the task's main loop, processing messages until shutdown.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

/// Messages for the beam scheduler task.
#[derive(Debug)]
pub enum SchedulerMessage {
    /// Capacity request from the request-manager collaborator.
    CapacityRequest(CapacityRequest),
    /// Fresh link-quality estimate from the channel-estimation
    /// collaborator. Takes effect at the next cycle boundary.
    CnoReport {
        /// Reported terminal.
        terminal: TerminalId,
        /// Estimated C/N0 in dBHz.
        cno_dbhz: f64,
        /// Measurement time in milliseconds.
        timestamp_ms: u64,
    },
    /// Terminal logon; the allocation context is created at the next cycle
    /// boundary.
    TerminalLogon {
        /// Service parameters of the terminal.
        service: TerminalServiceConfig,
    },
    /// Terminal logoff; the allocation context is destroyed at the next
    /// cycle boundary.
    TerminalLogoff {
        /// Terminal logging off.
        terminal: TerminalId,
    },
}

/// Messages for the publisher task.
#[derive(Debug)]
pub enum PublisherMessage {
    /// A freshly allocated plan to serialize and broadcast.
    PublishPlan {
        /// The TBTP to broadcast.
        message: TbtpMessage,
        /// Latest instant the plan may still be handed to transmission;
        /// past it the plan is dropped and the prior one stays in force.
        deadline: Instant,
    },
}

/// Base structure containing all task handles for the NCC.
///
/// Each task receives a clone of this structure and can send messages to
/// any other task through the appropriate handle.
#[derive(Clone)]
pub struct NccTaskBase {
    /// NCC configuration
    pub config: Arc<NccConfig>,
    /// Handle to the scheduler task
    pub scheduler_tx: TaskHandle<SchedulerMessage>,
    /// Handle to the publisher task
    pub publisher_tx: TaskHandle<PublisherMessage>,
}

impl NccTaskBase {
    /// Creates a new `NccTaskBase` with the given configuration and channel
    /// capacity.
    ///
    /// Returns the task base along with receivers for each task.
    pub fn new(
        config: NccConfig,
        channel_capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<TaskMessage<SchedulerMessage>>,
        mpsc::Receiver<TaskMessage<PublisherMessage>>,
    ) {
        let (scheduler_tx, scheduler_rx) = mpsc::channel(channel_capacity);
        let (publisher_tx, publisher_rx) = mpsc::channel(channel_capacity);

        let base = Self {
            config: Arc::new(config),
            scheduler_tx: TaskHandle::new(scheduler_tx),
            publisher_tx: TaskHandle::new(publisher_tx),
        };

        (base, scheduler_rx, publisher_rx)
    }

    /// Sends shutdown signals to all tasks.
    pub async fn shutdown_all(&self) {
        // Ignore errors - tasks may already be shut down
        let _ = self.scheduler_tx.shutdown().await;
        let _ = self.publisher_tx.shutdown().await;
    }
}

/// Default channel capacity for task message queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;
    use rtnsim_common::config::{
        CarrierTrafficType, FrameConfig, RandomAccessConfig, RandomAccessScheme, SuperframeConfig,
        WaveformConfig, WaveformTableConfig,
    };
    use rtnsim_common::{FrameId, WaveformId};

    fn test_config() -> NccConfig {
        NccConfig {
            beam_id: 1,
            superframe: SuperframeConfig {
                duration_ms: 20,
                frames: vec![
                    FrameConfig {
                        frame_id: FrameId(0),
                        carrier_count: 1,
                        symbol_rate_baud: 5000.0,
                        guard_time_symbols: 0,
                        traffic: CarrierTrafficType::Dama,
                    },
                    FrameConfig {
                        frame_id: FrameId(1),
                        carrier_count: 1,
                        symbol_rate_baud: 5000.0,
                        guard_time_symbols: 0,
                        traffic: CarrierTrafficType::RandomAccess,
                    },
                ],
            },
            waveform_table: WaveformTableConfig {
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
            },
            dama: Default::default(),
            random_access: RandomAccessConfig {
                scheme: RandomAccessScheme::Crdsa,
                crdsa: Default::default(),
            },
            terminals: vec![],
            publish_guard_ms: 2,
        }
    }

    #[test]
    fn test_task_message_variants() {
        let msg: TaskMessage<i32> = TaskMessage::message(42);
        assert!(!msg.is_shutdown());
        assert_eq!(msg.into_message(), Some(42));

        let shutdown: TaskMessage<i32> = TaskMessage::shutdown();
        assert!(shutdown.is_shutdown());
        assert!(shutdown.into_message().is_none());
    }

    #[tokio::test]
    async fn test_task_handle_send_and_shutdown() {
        let (tx, mut rx) = mpsc::channel::<TaskMessage<i32>>(10);
        let handle = TaskHandle::new(tx);

        handle.send(42).await.unwrap();
        match rx.recv().await {
            Some(TaskMessage::Message(val)) => assert_eq!(val, 42),
            _ => panic!("expected message"),
        }

        handle.shutdown().await.unwrap();
        match rx.recv().await {
            Some(TaskMessage::Shutdown) => {}
            _ => panic!("expected shutdown"),
        }
    }

    #[tokio::test]
    async fn test_task_base_creation() {
        let (base, scheduler_rx, publisher_rx) =
            NccTaskBase::new(test_config(), DEFAULT_CHANNEL_CAPACITY);

        assert!(!base.scheduler_tx.is_closed());
        assert!(!base.publisher_tx.is_closed());

        drop(scheduler_rx);
        drop(publisher_rx);

        assert!(base.scheduler_tx.is_closed());
        assert!(base.publisher_tx.is_closed());
    }

    #[tokio::test]
    async fn test_inter_task_communication() {
        let (base, mut scheduler_rx, _publisher_rx) =
            NccTaskBase::new(test_config(), DEFAULT_CHANNEL_CAPACITY);

        base.scheduler_tx
            .send(SchedulerMessage::TerminalLogoff {
                terminal: TerminalId(4),
            })
            .await
            .unwrap();

        match scheduler_rx.recv().await {
            Some(TaskMessage::Message(SchedulerMessage::TerminalLogoff { terminal })) => {
                assert_eq!(terminal, TerminalId(4));
            }
            _ => panic!("expected TerminalLogoff"),
        }
    }
}
