//! Thread boundary between the processing thread and its observers.
//!
//! Events flow out of the engine through a bounded crossbeam channel and are
//! sent with `try_send`, so a stalled consumer loses events instead of
//! stalling the flowgraph. Frequency selections flow the other way, from a
//! spectrum display into the control surface.

use crate::demod::Mode;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;

/// Lifecycle and control notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Sample flow started.
    Started,
    /// Sample flow stopped and the processing thread joined.
    Stopped,
    /// A mode switch completed.
    ModeChanged {
        mode: Mode,
        carrier_offset: i64,
        device_frequency: i64,
    },
    /// The hardware was retuned.
    Retuned { device_frequency: i64 },
    /// The flowgraph stopped because of an error.
    Fault(String),
}

/// Snapshot of a single flowgraph node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: u32,
    pub name: String,
    /// Whether the node ran in the last compiled plan
    pub active: bool,
}

/// Snapshot of a single connected edge, with resolved names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSnapshot {
    pub id: u32,
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

/// Complete topology snapshot of the flowgraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySnapshot {
    pub generation: u64,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl TopologySnapshot {
    /// Whether `from_node.from_port -> to_node.to_port` is connected.
    pub fn contains(&self, from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> bool {
        self.edges.iter().any(|e| {
            e.from_node == from_node
                && e.from_port == from_port
                && e.to_node == to_node
                && e.to_port == to_port
        })
    }

    /// Edges with `node` at either end.
    pub fn edges_touching<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a EdgeSnapshot> {
        self.edges
            .iter()
            .filter(move |e| e.from_node == node || e.to_node == node)
    }
}

/// Channel capacity for engine events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Send on a bounded channel, evicting the oldest queued item when full.
///
/// Returns `false` only when every receiver is gone.
fn send_evicting<T>(tx: &Sender<T>, rx: &Receiver<T>, item: T) -> bool {
    let mut item = item;
    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Full(rejected)) => {
                // A concurrent consumer may have freed the slot already.
                let _ = rx.try_recv();
                item = rejected;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

/// Producer side of the engine event stream.
///
/// When observers fall behind, the oldest events are discarded so the most
/// recent ones (a fault in particular) are always delivered.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        Self { tx, rx }
    }

    /// Publish without blocking.
    pub fn publish(&self, event: EngineEvent) -> bool {
        if self.tx.is_full() {
            tracing::trace!("Event channel full, evicting oldest event");
        }
        send_evicting(&self.tx, &self.rx, event)
    }

    /// A receiver for observers. All receivers share one queue.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.rx.clone()
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.rx.try_iter().collect()
    }
}

/// Handle a spectrum display uses to report a clicked frequency.
///
/// A burst of clicks never hides the latest one: when the queue is full the
/// oldest selection is dropped.
#[derive(Debug, Clone)]
pub struct FrequencySelector {
    tx: Sender<i64>,
    rx: Receiver<i64>,
}

impl FrequencySelector {
    /// Report a selected frequency in Hz.
    pub fn select(&self, hz: i64) -> bool {
        send_evicting(&self.tx, &self.rx, hz)
    }
}

/// Bounded selection channel: `(selector_for_display, receiver_for_engine)`.
pub fn frequency_channel(capacity: usize) -> (FrequencySelector, Receiver<i64>) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        FrequencySelector {
            tx,
            rx: rx.clone(),
        },
        rx,
    )
}
