//! Scheduled event definitions and queue ordering.
//!
//! This module defines the units of work the core's priority queue holds. It provides:
//! 1. **Event Variants:** A closed set of event kinds (input edges, output commits).
//! 2. **Grouping:** The tie-breaking key that co-schedules same-time events per element.
//! 3. **Queue Ordering:** A wrapper whose reversed `Ord` turns `BinaryHeap` into a min-heap.
//!
//! Ordering contract: events are processed in non-decreasing `when` order,
//! and for equal `when` in non-decreasing `group` order. The insertion
//! sequence number is an implementation tie-breaker only; callers must not
//! rely on it.

use crate::common::{ElementId, PortIndex, SimTime};

/// Group key for output-side commits.
///
/// Negative so that every `OutEdge` at a timestamp sorts and fires before
/// any input-side `Edge` at the same timestamp. An output commit both
/// updates the driver's cached output state and synthesizes the downstream
/// edge at the same instant; delivering it first prevents a one-tick race
/// against other same-time input edges.
pub const OUT_EDGE_GROUP: i64 = -1;

/// A unit of scheduled work that mutates kernel state when processed.
///
/// The set is closed: every variant carries the data needed to mutate an
/// element, and processing an event produces zero or more follow-up events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// Delivers a signal transition to one input port.
    ///
    /// Processing applies `element.edge(input, state)` immediately; only
    /// the chronologically last edge of the group additionally fires the
    /// element's `clock` callback and returns its follow-up events.
    Edge {
        /// Receiving element.
        element: ElementId,
        /// Input port on the receiving element.
        input: PortIndex,
        /// New signal value carried by the transition.
        state: bool,
    },

    /// Commits an output flip on a combinational element.
    ///
    /// Processing updates the driver's cached `output_states` and
    /// synthesizes the downstream [`SimEvent::Edge`] toward whatever sink
    /// is connected at that output.
    OutEdge {
        /// Driving element.
        element: ElementId,
        /// Output port whose value flips.
        output: PortIndex,
        /// New value of the output.
        state: bool,
    },
}

impl SimEvent {
    /// Returns the grouping key for this event.
    ///
    /// Input edges group by receiving element so that an element's `clock`
    /// fires only after all same-timestamp edges addressed to it have been
    /// applied. Output commits share the distinguished negative group.
    pub const fn group(&self) -> i64 {
        match self {
            Self::Edge { element, .. } => element.val() as i64,
            Self::OutEdge { .. } => OUT_EDGE_GROUP,
        }
    }
}

/// An event paired with its scheduled timestamp, as returned by element
/// callbacks for the core to enqueue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheduled {
    /// Timestamp at which the event must be processed.
    pub when: SimTime,
    /// The event payload.
    pub event: SimEvent,
}

impl Scheduled {
    /// Pairs an event with a timestamp.
    pub const fn at(when: SimTime, event: SimEvent) -> Self {
        Self { when, event }
    }
}

/// Queue entry: an event plus its ordering key.
///
/// `seq` is assigned from the core's insertion counter and keeps the heap
/// deterministic; it is not part of the ordering contract.
#[derive(Clone, Debug)]
pub struct QueuedEvent {
    /// Timestamp at which the event fires.
    pub when: SimTime,
    /// Grouping and tie-breaking key (see [`SimEvent::group`]).
    pub group: i64,
    /// Insertion sequence number.
    pub seq: u64,
    /// The event payload.
    pub event: SimEvent,
}

impl QueuedEvent {
    /// Returns `true` if `next` belongs to the same `(when, group)` bucket.
    pub fn same_bucket(&self, next: &Self) -> bool {
        self.when == next.when && self.group == next.group
    }
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.group == other.group && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.when, self.group, self.seq).cmp(&(other.when, other.group, other.seq))
    }
}
