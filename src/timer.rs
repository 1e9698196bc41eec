//! One-shot timed events.
//!
//! [`Scheduler`] keeps future actions ordered by `(trigger time,
//! registration sequence)`, so two events with identical trigger times and
//! identical actions are still distinct — the registration *is* the
//! identity. Cancellation removes an event without invoking it.
//!
//! Draining is pull-based: the owner repeatedly calls
//! [`Scheduler::pop_due`] and runs each event against its context. Because
//! the popped event is owned, an action is free to register new events on
//! the same scheduler; events registered with an already-past trigger time
//! are picked up by the same drain loop. Drain loops must cap iterations at
//! [`MAX_DRAIN_PER_TICK`] so a self-rescheduling action cannot starve the
//! tick.

use std::collections::BTreeMap;

use tokio::time::Instant;

use crate::error::{EventError, ScheduleError};

/// Upper bound on events invoked by a single drain pass.
///
/// Anything still due after the cap drains on the next tick.
pub const MAX_DRAIN_PER_TICK: usize = 1024;

/// Identity of a scheduled event.
///
/// Obtained from [`Scheduler::register`]; pass it back to
/// [`Scheduler::cancel`]. Handles are never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    at: Instant,
    id: u64,
}

impl EventHandle {
    /// Absolute trigger time.
    #[must_use]
    pub const fn trigger_time(&self) -> Instant {
        self.at
    }
}

/// Action invoked when an event comes due.
///
/// Receives the owner's context so it can announce, mutate session state,
/// or register further events. A returned error is logged by the drain loop
/// and never aborts the drain.
pub type Action<C> = Box<dyn FnOnce(&mut C) -> Result<(), EventError> + Send>;

/// A due event popped off the scheduler, ready to run.
pub struct DueEvent<C> {
    handle: EventHandle,
    label: String,
    action: Action<C>,
}

impl<C> DueEvent<C> {
    /// Label the event was registered under.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The event's identity.
    #[must_use]
    pub const fn handle(&self) -> EventHandle {
        self.handle
    }

    /// Consumes the event and invokes its action.
    ///
    /// # Errors
    ///
    /// Propagates whatever the action returns; callers log and continue.
    pub fn run(self, ctx: &mut C) -> Result<(), EventError> {
        (self.action)(ctx)
    }
}

impl<C> std::fmt::Debug for DueEvent<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DueEvent")
            .field("label", &self.label)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

struct Entry<C> {
    label: String,
    action: Action<C>,
}

/// Ordered collection of future one-shot actions.
pub struct Scheduler<C> {
    entries: BTreeMap<(Instant, u64), Entry<C>>,
    next_id: u64,
    epoch: Instant,
}

impl<C> Scheduler<C> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
            epoch: Instant::now(),
        }
    }

    /// Schedules `action` to run at `at`.
    ///
    /// Events sharing a trigger time run in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::DuplicateEvent`] if the `(time, identity)`
    /// key is already occupied. Identities are allocated from a monotonic
    /// counter, so this is unreachable through normal use and exists to make
    /// an internal misuse fail loudly instead of silently dropping an event.
    pub fn register(
        &mut self,
        at: Instant,
        label: impl Into<String>,
        action: Action<C>,
    ) -> Result<EventHandle, ScheduleError> {
        let id = self.next_id;
        let key = (at, id);
        if self.entries.contains_key(&key) {
            return Err(ScheduleError::DuplicateEvent {
                at_ms: at.saturating_duration_since(self.epoch).as_millis(),
            });
        }
        self.next_id += 1;
        self.entries.insert(
            key,
            Entry {
                label: label.into(),
                action,
            },
        );
        Ok(EventHandle { at, id })
    }

    /// Removes the event without invoking it. Returns whether it was found.
    pub fn cancel(&mut self, handle: &EventHandle) -> bool {
        self.entries.remove(&(handle.at, handle.id)).is_some()
    }

    /// Pops the earliest event whose trigger time is at or before `now`.
    ///
    /// Returns `None` when the earliest event is still in the future or the
    /// scheduler is empty.
    pub fn pop_due(&mut self, now: Instant) -> Option<DueEvent<C>> {
        let (&(at, id), _) = self.entries.first_key_value()?;
        if at > now {
            return None;
        }
        let entry = self
            .entries
            .remove(&(at, id))
            .expect("first key vanished between peek and remove");
        Some(DueEvent {
            handle: EventHandle { at, id },
            label: entry.label,
            action: entry.action,
        })
    }

    /// Trigger time of the earliest pending event.
    #[must_use]
    pub fn next_trigger(&self) -> Option<Instant> {
        self.entries.first_key_value().map(|(&(at, _), _)| at)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all pending events without invoking them.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
