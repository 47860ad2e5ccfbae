//! Event scheduler ("Core"): authoritative clock plus the pending-event set.
//!
//! Uses a `BinaryHeap` of `Reverse`-wrapped entries as a min-heap keyed by
//! `(when, group, seq)`. The insertion counter keeps the heap deterministic;
//! only `(when, group)` ordering is contractual.
//!
//! The core never invents events: it pops, determines whether the popped
//! event is the last of its `(when, group)` bucket, delivers it to the
//! circuit, and schedules whatever follow-ups come back. Processing is
//! bounded both by a simulated-time target and a wall-clock deadline so the
//! controller regains control at a steady cadence.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use tracing::trace;

use crate::circuit::Circuit;
use crate::common::{KernelError, SimTime};
use crate::controller::Controller;
use crate::event::{QueuedEvent, Scheduled};
use crate::stats::CoreStats;

/// The simulation core owning the clock and the event queue.
#[derive(Debug, Default)]
pub struct Core {
    queue: BinaryHeap<Reverse<QueuedEvent>>,
    clock: SimTime,
    seq: u64,
    stats: CoreStats,
}

impl Core {
    /// Creates a core at simulated time zero with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current simulated time.
    pub const fn clock(&self) -> SimTime {
        self.clock
    }

    /// Returns the number of pending events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns the kernel counters.
    pub const fn stats(&self) -> &CoreStats {
        &self.stats
    }

    /// Returns the kernel counters mutably (controller bookkeeping).
    pub const fn stats_mut(&mut self) -> &mut CoreStats {
        &mut self.stats
    }

    /// Inserts an event into the queue.
    ///
    /// # Panics
    ///
    /// Panics if the event is scheduled before the current clock. The
    /// simulation cannot schedule into the past; such a request is a logic
    /// bug, not a recoverable condition.
    pub fn schedule(&mut self, scheduled: Scheduled) {
        assert!(
            scheduled.when >= self.clock,
            "scheduled into the past: {} < {}",
            scheduled.when,
            self.clock
        );
        let entry = QueuedEvent {
            when: scheduled.when,
            group: scheduled.event.group(),
            seq: self.seq,
            event: scheduled.event,
        };
        self.seq += 1;
        self.queue.push(Reverse(entry));
    }

    /// Processes events until the earliest pending event would exceed
    /// `target` or the wall-clock `deadline` passes.
    ///
    /// When the queue empties (or its head lies beyond `target`), the clock
    /// advances to `target`: the circuit is momentarily steady and idle
    /// periods move the clock smoothly instead of jumping discontinuously.
    ///
    /// # Panics
    ///
    /// Panics on an event from the past (queue head `when` below the
    /// clock), which indicates a corrupted queue.
    pub fn process_until(&mut self, circuit: &mut Circuit, target: SimTime, deadline: Instant) {
        loop {
            let head_when = match self.queue.peek() {
                Some(Reverse(head)) => head.when,
                None => {
                    self.clock = self.clock.max(target);
                    return;
                }
            };
            if head_when > target {
                self.clock = self.clock.max(target);
                return;
            }
            if Instant::now() >= deadline {
                return;
            }

            let Some(Reverse(entry)) = self.queue.pop() else {
                return;
            };
            assert!(
                entry.when >= self.clock,
                "event from the past: {} < {}",
                entry.when,
                self.clock
            );
            self.clock = entry.when;

            let is_last = self
                .queue
                .peek()
                .is_none_or(|Reverse(next)| !entry.same_bucket(next));

            trace!(when = %entry.when, group = entry.group, is_last, "processing event");
            let followups = circuit.deliver(entry.event, self.clock, is_last);
            self.stats.retired_events += 1;
            for followup in followups {
                self.schedule(followup);
            }
        }
    }

    /// Drives the simulation loop until the controller reports quit.
    ///
    /// Each iteration asks the controller to drain its command queue and
    /// hand back a pacing window, then processes events inside that window.
    ///
    /// # Errors
    ///
    /// Propagates a boundary failure (outbound channel closed).
    pub fn run(&mut self, controller: &mut Controller) -> Result<(), KernelError> {
        loop {
            let pacing = controller.process(self)?;
            if pacing.quit {
                return Ok(());
            }
            self.process_until(
                controller.circuit_mut(),
                pacing.target_clock,
                pacing.deadline,
            );
        }
    }
}
