//! Telemetry observer hooks.
//!
//! The engine reports every base-value change, converted value, state change
//! and dispatch pass to one observer. The default [`NullObserver`] compiles
//! down to nothing; [`LogObserver`] forwards to the `log` facade and
//! [`ChannelObserver`] ships events to another thread for a profiler.

use crossbeam_channel::{Receiver, Sender};
use rtpc_types::{ParamId, RtpcKey, SubscriberId};

/// Receives engine events. Every hook is a no-op by default.
pub trait RtpcObserver: Send {
    /// A base value was written to a parameter's store.
    fn log_base_value(&mut self, _param: ParamId, _key: &RtpcKey, _value: f32) {}

    /// A subscription produced a converted value for its targets.
    fn log_rtpc(&mut self, _subscriber: SubscriberId, _param: ParamId, _key: &RtpcKey, _value: f32) {}

    /// A discrete (switch-like) parameter changed.
    fn log_state(&mut self, _param: ParamId, _key: &RtpcKey, _value: f32) {}

    /// One dispatch pass finished for a subscriber.
    fn log_dispatch(&mut self, _subscriber: SubscriberId, _param: ParamId, _targets: usize) {}

    fn log_transition_done(&mut self, _param: ParamId, _key: &RtpcKey, _value: f32) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RtpcObserver for NullObserver {}

/// Forwards events to `log::trace!` under the `rtpc::telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RtpcObserver for LogObserver {
    fn log_base_value(&mut self, param: ParamId, key: &RtpcKey, value: f32) {
        log::trace!(target: "rtpc::telemetry", "base {} {} = {}", param, key, value);
    }

    fn log_rtpc(&mut self, subscriber: SubscriberId, param: ParamId, key: &RtpcKey, value: f32) {
        log::trace!(target: "rtpc::telemetry", "rtpc sub {} {} {} = {}", subscriber, param, key, value);
    }

    fn log_state(&mut self, param: ParamId, key: &RtpcKey, value: f32) {
        log::trace!(target: "rtpc::telemetry", "state {} {} = {}", param, key, value);
    }

    fn log_dispatch(&mut self, subscriber: SubscriberId, param: ParamId, targets: usize) {
        log::trace!(target: "rtpc::telemetry", "dispatch sub {} {} -> {} targets", subscriber, param, targets);
    }

    fn log_transition_done(&mut self, param: ParamId, key: &RtpcKey, value: f32) {
        log::trace!(target: "rtpc::telemetry", "ramp done {} {} = {}", param, key, value);
    }
}

/// One recorded engine event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryEvent {
    BaseValue { param: ParamId, key: RtpcKey, value: f32 },
    Rtpc { subscriber: SubscriberId, param: ParamId, key: RtpcKey, value: f32 },
    State { param: ParamId, key: RtpcKey, value: f32 },
    Dispatch { subscriber: SubscriberId, param: ParamId, targets: usize },
    TransitionDone { param: ParamId, key: RtpcKey, value: f32 },
}

/// Maximum number of retained events before trimming.
const DEFAULT_HISTORY_CAPACITY: usize = 4096;

/// Sequenced event as sent over the channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryEntry {
    pub seq: u64,
    pub event: TelemetryEvent,
}

/// Sends every event to a receiver on another thread and keeps a bounded
/// local history for debugging.
pub struct ChannelObserver {
    tx: Sender<TelemetryEntry>,
    history: Vec<TelemetryEntry>,
    next_seq: u64,
    history_capacity: usize,
}

impl ChannelObserver {
    /// Create a paired (observer, receiver).
    pub fn new() -> (Self, Receiver<TelemetryEntry>) {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(history_capacity: usize) -> (Self, Receiver<TelemetryEntry>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let observer = Self {
            tx,
            history: Vec::new(),
            next_seq: 0,
            history_capacity,
        };
        (observer, rx)
    }

    /// Retained history, oldest first.
    pub fn history(&self) -> &[TelemetryEntry] {
        &self.history
    }

    fn record(&mut self, event: TelemetryEvent) {
        let entry = TelemetryEntry {
            seq: self.next_seq,
            event,
        };
        self.next_seq += 1;

        if let Err(e) = self.tx.send(entry) {
            log::debug!(target: "rtpc::telemetry", "telemetry entry dropped (seq {}): {}", entry.seq, e);
        }

        self.history.push(entry);
        if self.history.len() > self.history_capacity {
            let excess = self.history.len() - self.history_capacity;
            self.history.drain(..excess);
        }
    }
}

impl RtpcObserver for ChannelObserver {
    fn log_base_value(&mut self, param: ParamId, key: &RtpcKey, value: f32) {
        self.record(TelemetryEvent::BaseValue { param, key: *key, value });
    }

    fn log_rtpc(&mut self, subscriber: SubscriberId, param: ParamId, key: &RtpcKey, value: f32) {
        self.record(TelemetryEvent::Rtpc {
            subscriber,
            param,
            key: *key,
            value,
        });
    }

    fn log_state(&mut self, param: ParamId, key: &RtpcKey, value: f32) {
        self.record(TelemetryEvent::State { param, key: *key, value });
    }

    fn log_dispatch(&mut self, subscriber: SubscriberId, param: ParamId, targets: usize) {
        self.record(TelemetryEvent::Dispatch {
            subscriber,
            param,
            targets,
        });
    }

    fn log_transition_done(&mut self, param: ParamId, key: &RtpcKey, value: f32) {
        self.record(TelemetryEvent::TransitionDone { param, key: *key, value });
    }
}
