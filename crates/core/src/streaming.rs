//! Streaming progress contract.
//!
//! The engine itself owns no concurrency primitive for progress reporting;
//! a [`ProgressSink`] is a plain trait object the trace processor calls
//! once per source event. The CLI's `--stream` flag wires a line-printing
//! sink; tests can wire a `Vec`-collecting one instead.

use serde::Serialize;

/// Per-event outcome handed to a [`ProgressSink`] after one trace event has
/// been fully dispatched (all of its line-sized sub-accesses applied).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResult {
    /// Whether any sub-access of this event hit in L1.
    pub l1_hit: bool,
    /// Whether any sub-access of this event hit in L2.
    pub l2_hit: bool,
    /// Whether any sub-access of this event hit in L3.
    pub l3_hit: bool,
    /// The event's original (unsplit) address.
    pub address: u64,
    /// The event's original size in bytes.
    pub size: u32,
    /// Source file, if the trace line carried one.
    pub file: String,
    /// Source line number, if the trace line carried one.
    pub line: u32,
}

/// A callback invoked once per processed trace event.
///
/// No semantic contract beyond ordering: events arrive in the
/// order they were applied to the hierarchy.
pub trait ProgressSink {
    /// Called after one trace event has been fully dispatched.
    fn on_event(&mut self, event: EventResult);
}

/// A [`ProgressSink`] that does nothing, used when streaming isn't
/// requested so the processor doesn't need an `Option` at every call site.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&mut self, _event: EventResult) {}
}

/// A [`ProgressSink`] that collects every event, useful for tests and for
/// embedding the engine in another process without a line-oriented writer.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    /// Every event seen so far, in arrival order.
    pub events: Vec<EventResult>,
}

impl ProgressSink for CollectingSink {
    fn on_event(&mut self, event: EventResult) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventResult {
        EventResult {
            l1_hit: true,
            l2_hit: false,
            l3_hit: false,
            address: 0x1000,
            size: 8,
            file: "a.c".to_string(),
            line: 42,
        }
    }

    #[test]
    fn null_sink_drops_everything() {
        let mut sink = NullSink;
        sink.on_event(sample());
    }

    #[test]
    fn collecting_sink_preserves_order() {
        let mut sink = CollectingSink::default();
        sink.on_event(sample());
        let mut second = sample();
        second.address = 0x2000;
        sink.on_event(second);
        assert_eq!(sink.events.len(), 2);
        assert_eq!(sink.events[0].address, 0x1000);
        assert_eq!(sink.events[1].address, 0x2000);
    }
}
