// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The sequencer: total order, promotion, emission.
//!
//! Commands decoded off the command group are published on the in-process
//! bus; each registered pipeline enqueues a task onto one unbounded FIFO
//! channel. A single worker drains it, so emission order is enqueue
//! order:
//!
//! ```text
//! bus.publish(cmd, sid) -> task queue -> worker:
//!     seq  = next_seq.fetch_add(1)         (first event = 1)
//!     ts   = max(prev_ts, unix_micros())   (non-decreasing)
//!     event = adapter.make_event(cmd, seq, sid, ts)
//!     send(encode(event)); notify in-process subscribers
//! ```
//!
//! A send failure burns the sequence number: the counter never rewinds,
//! so the emitted stream may gap on sender failure but never reorders.

pub mod adapters;
pub mod clock;

pub use adapters::{EventAdapter, TextAdapter, TopOfBookAdapter};

use crate::bus::{CommandBus, CommandReceiver};
use crate::identity::InstanceId;
use crate::transport::DatagramSender;
use crate::wire::{Command, Event, WireMessage};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

enum Task {
    Run(Box<dyn FnOnce() + Send>),
    Shutdown,
}

/// Ordering-core counters.
#[derive(Debug, Default)]
pub struct SequencerMetrics {
    pub commands_accepted: AtomicU64,
    pub events_emitted: AtomicU64,
    pub send_failures: AtomicU64,
}

impl SequencerMetrics {
    /// `(accepted, emitted, send_failures)` snapshot.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.commands_accepted.load(Ordering::Relaxed),
            self.events_emitted.load(Ordering::Relaxed),
            self.send_failures.load(Ordering::Relaxed),
        )
    }
}

type ErasedEventHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// In-process subscribers notified after each event hits the wire.
#[derive(Default)]
struct EventFanout {
    handlers: Mutex<HashMap<TypeId, Vec<ErasedEventHandler>>>,
}

impl EventFanout {
    fn subscribe<E: Event>(&self, handler: impl Fn(&E) + Send + Sync + 'static) {
        let erased: ErasedEventHandler = Arc::new(move |any| {
            if let Some(event) = any.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(erased);
    }

    fn notify<E: Event>(&self, event: &E) {
        let snapshot = {
            let handlers = self.handlers.lock();
            handlers.get(&TypeId::of::<E>()).cloned().unwrap_or_default()
        };
        for handler in &snapshot {
            handler(event);
        }
    }
}

/// Single-process total-order sequencer.
///
/// Owns the command receiver and one ordering worker. `start`/`stop` are
/// idempotent; a stopped sequencer cannot be restarted (its queue is
/// drained and closed).
pub struct Sequencer {
    command_rx: CommandReceiver,
    sender: Arc<dyn DatagramSender>,
    next_seq: Arc<AtomicU64>,
    last_ts: Arc<AtomicU64>,
    task_tx: Sender<Task>,
    task_rx: Option<Receiver<Task>>,
    fanout: Arc<EventFanout>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    metrics: Arc<SequencerMetrics>,
}

impl Sequencer {
    #[must_use]
    pub fn new(sender: Arc<dyn DatagramSender>, command_rx: CommandReceiver) -> Self {
        let (task_tx, task_rx) = unbounded();
        Self {
            command_rx,
            sender,
            next_seq: Arc::new(AtomicU64::new(1)),
            last_ts: Arc::new(AtomicU64::new(0)),
            task_tx,
            task_rx: Some(task_rx),
            fanout: Arc::new(EventFanout::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            metrics: Arc::new(SequencerMetrics::default()),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<SequencerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// In-process command bus shared with the command receiver. Producers
    /// co-located with the sequencer publish here directly.
    #[must_use]
    pub fn bus(&self) -> Arc<CommandBus> {
        self.command_rx.bus()
    }

    /// Feed a raw command datagram through the receive path (in-process
    /// wiring, tests).
    pub fn deliver_command(&self, data: &[u8]) {
        self.command_rx.deliver(data);
    }

    /// Register the promotion pipeline for one command type: wire
    /// subscription, bus subscription, and the ordering task.
    pub fn register_pipeline<C, A>(&self, adapter: A)
    where
        C: Command,
        A: EventAdapter<C>,
    {
        self.command_rx.subscribe::<C>();

        let adapter = Arc::new(adapter);
        let task_tx = self.task_tx.clone();
        let sender = Arc::clone(&self.sender);
        let next_seq = Arc::clone(&self.next_seq);
        let last_ts = Arc::clone(&self.last_ts);
        let fanout = Arc::clone(&self.fanout);
        let metrics = Arc::clone(&self.metrics);

        self.bus().subscribe::<C>(move |command, sender_id| {
            metrics.commands_accepted.fetch_add(1, Ordering::Relaxed);

            let command = command.clone();
            let adapter = Arc::clone(&adapter);
            let sender = Arc::clone(&sender);
            let next_seq = Arc::clone(&next_seq);
            let last_ts = Arc::clone(&last_ts);
            let fanout = Arc::clone(&fanout);
            let metrics = Arc::clone(&metrics);

            let task = Box::new(move || {
                order_and_emit(
                    &*adapter, &command, sender_id, &next_seq, &last_ts, &*sender, &fanout,
                    &metrics,
                );
            });
            if task_tx.send(Task::Run(task)).is_err() {
                log::warn!("[SEQ] dropping command: ordering worker is stopped");
            }
        });
    }

    /// Subscribe an in-process callback invoked after each `E` is emitted
    /// on the wire (local sinks, tests).
    pub fn subscribe_to_events<E: Event>(&self, handler: impl Fn(&E) + Send + Sync + 'static) {
        self.fanout.subscribe(handler);
    }

    /// Spawn the ordering worker and start the command receiver.
    pub fn start(&mut self) -> io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = self.spawn_worker() {
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        if let Err(err) = self.command_rx.start() {
            let _ = self.task_tx.send(Task::Shutdown);
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        log::info!("[SEQ] sequencer started");
        Ok(())
    }

    /// Start the ordering worker without opening the command socket.
    ///
    /// Commands then arrive through [`deliver_command`](Self::deliver_command)
    /// or the in-process bus. For embedded/intra-process deployments and
    /// tests.
    pub fn start_detached(&mut self) -> io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = self.spawn_worker() {
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }
        log::info!("[SEQ] sequencer started (detached from the wire)");
        Ok(())
    }

    fn spawn_worker(&mut self) -> io::Result<()> {
        let Some(task_rx) = self.task_rx.take() else {
            return Err(io::Error::other("sequencer cannot be restarted after stop"));
        };
        let handle = std::thread::Builder::new()
            .name("seqbus-order".to_string())
            .spawn(move || worker_loop(&task_rx))?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Stop the command receiver, drain already-queued work, join the
    /// worker. Idempotent.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.command_rx.stop();
        let _ = self.task_tx.send(Task::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        log::info!("[SEQ] sequencer stopped");
    }

    /// Retransmission hook for future use; this build only records the
    /// request.
    pub fn retransmit(&self, from_seq: u64, to_seq: u64) {
        log::info!(
            "[SEQ] retransmit requested for seq {}..={}: no retained event log in this build",
            from_seq,
            to_seq
        );
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(task_rx: &Receiver<Task>) {
    for task in task_rx.iter() {
        match task {
            Task::Run(task) => task(),
            Task::Shutdown => break,
        }
    }
}

/// The ordering step: runs on the single worker, so sequence assignment
/// order equals queue order.
#[allow(clippy::too_many_arguments)]
fn order_and_emit<C: Command>(
    adapter: &dyn EventAdapter<C>,
    command: &C,
    sender_id: InstanceId,
    next_seq: &AtomicU64,
    last_ts: &AtomicU64,
    sender: &dyn DatagramSender,
    fanout: &EventFanout,
    metrics: &SequencerMetrics,
) {
    let seq = next_seq.fetch_add(1, Ordering::SeqCst);

    // The worker is the only writer; the clamp keeps timestamps
    // non-decreasing across wall-clock steps.
    let now = clock::unix_micros();
    let prev = last_ts.load(Ordering::Relaxed);
    let ts = now.max(prev);
    last_ts.store(ts, Ordering::Relaxed);

    let event = adapter.make_event(command, seq, sender_id, ts);
    let bytes = event.encode();
    match sender.send(&bytes) {
        Ok(()) => {
            metrics.events_emitted.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "[SEQ] emitted seq={} sid={} tin={} len={}",
                seq,
                sender_id,
                event.tin(),
                bytes.len()
            );
        }
        Err(err) => {
            // seq is burned; the stream gaps rather than reorders
            metrics.send_failures.fetch_add(1, Ordering::Relaxed);
            log::error!("[SEQ] failed to send event seq={}: {}", seq, err);
        }
    }

    fanout.notify(&event);
}
