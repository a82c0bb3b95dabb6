//! Single-threaded delayed-callback scheduler.
//!
//! Callers submit "run this no earlier than `delay` from now" entries and
//! drive a logical clock forward with [`Scheduler::advance`], which fires every
//! entry whose due time has strictly passed.
//!
//! # Invariants
//!
//! - **bounded:** pending entries (stored plus in-flight) never exceed capacity
//! - **ordered:** due entries fire by ascending due time, ties in submission order
//! - **strict:** an entry due exactly at the current time is not yet due
//! - **remove before invoke:** an entry leaves the pending set before its
//!   callback runs, so it fires at most once
//! - **snapshot:** the due set is fixed when an advance starts; entries
//!   submitted by callbacks wait for a later advance even if already due
//! - **silent teardown:** dropping the scheduler discards unfired entries
//!   without running them
//!
//! # Reentrancy
//!
//! State lives behind `Rc<RefCell<_>>` and no borrow is held while user code
//! runs. Callbacks submit follow-up work through a [`SchedulerHandle`], which
//! holds a `Weak` reference so a callback never keeps its scheduler alive.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::clock::{LogicalClock, Ticks};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::store::{Entry, EntryStore, Job, Seq};

/// Point-in-time view of scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerTelemetry {
    pub now: Ticks,
    pub pending: usize,
    pub in_flight: usize,
    pub capacity: usize,
    pub max_pending_seen: usize,
    pub submitted_total: u64,
    pub rejected_total: u64,
    pub fired_total: u64,
    pub advances_total: u64,
}

impl SchedulerTelemetry {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

type Rejected = (Error, Job);

struct State {
    clock: LogicalClock,
    seq: Seq,
    store: EntryStore,
    /// Entries removed from the store by the current (or an interrupted)
    /// advance that have not fired yet. They still occupy capacity.
    in_flight: VecDeque<Entry>,
    max_pending_seen: usize,
    submitted_total: u64,
    rejected_total: u64,
    fired_total: u64,
    advances_total: u64,
}

impl State {
    fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_argument("capacity must be > 0"));
        }
        let store = EntryStore::with_capacity(capacity)?;
        let mut in_flight = VecDeque::new();
        in_flight.try_reserve_exact(capacity)?;
        Ok(Self {
            clock: LogicalClock::new(),
            seq: Seq::default(),
            store,
            in_flight,
            max_pending_seen: 0,
            submitted_total: 0,
            rejected_total: 0,
            fired_total: 0,
            advances_total: 0,
        })
    }

    fn pending(&self) -> usize {
        self.store.len() + self.in_flight.len()
    }

    const fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Store a new entry. On rejection the action is handed back so it can be
    /// dropped after the borrow is released.
    fn submit(&mut self, delay: Ticks, action: Job) -> std::result::Result<Seq, Rejected> {
        let now = self.clock.now();
        let base = self.clock.submission_base();
        let Some(due_at) = base.and_then(|base| base.checked_add(delay)) else {
            return Err((Error::ClockOverflow, action));
        };

        let capacity = self.capacity();
        if self.pending() >= capacity {
            self.rejected_total = self.rejected_total.saturating_add(1);
            tracing::trace!(
                event = "scheduler.entry.reject",
                capacity,
                in_flight = self.in_flight.len(),
                %now,
                "Entry rejected at capacity"
            );
            return Err((Error::CapacityExceeded { capacity }, action));
        }

        let seq = self.seq.bump();
        let position = match self.store.insert(Entry::new(due_at, seq, action)) {
            Ok(position) => position,
            Err(entry) => panic!(
                "internal consistency: store full at {} with only {} pending ({})",
                self.store.len(),
                self.pending(),
                entry.seq
            ),
        };
        self.submitted_total = self.submitted_total.saturating_add(1);
        self.max_pending_seen = self.max_pending_seen.max(self.pending());

        tracing::trace!(
            event = "scheduler.entry.submit",
            %seq,
            %delay,
            %due_at,
            %now,
            position,
            pending = self.pending(),
            "Entry scheduled"
        );
        Ok(seq)
    }

    /// Steps 1 and 2 of an advance: move the clock, then snapshot the due set
    /// into the in-flight queue.
    fn begin_advance(&mut self, elapsed: f64) -> Result<(Ticks, usize)> {
        let now = self.clock.advance(elapsed)?;
        self.advances_total = self.advances_total.saturating_add(1);
        let horizon = self.clock.due_horizon();
        let due = self.store.take_due(horizon, &mut self.in_flight);
        Ok((now, due))
    }

    fn pop_in_flight(&mut self) -> Option<Entry> {
        let entry = self.in_flight.pop_front()?;
        self.fired_total = self.fired_total.saturating_add(1);
        Some(entry)
    }

    fn drain_pending(&mut self) -> (VecDeque<Entry>, VecDeque<Entry>) {
        (
            std::mem::take(&mut self.in_flight),
            self.store.drain_all(),
        )
    }

    fn snapshot(&self) -> SchedulerTelemetry {
        SchedulerTelemetry {
            now: self.clock.now(),
            pending: self.pending(),
            in_flight: self.in_flight.len(),
            capacity: self.capacity(),
            max_pending_seen: self.max_pending_seen,
            submitted_total: self.submitted_total,
            rejected_total: self.rejected_total,
            fired_total: self.fired_total,
            advances_total: self.advances_total,
        }
    }
}

fn submit_into(state: &RefCell<State>, delay: f64, action: Job) -> Result<()> {
    let delay = Ticks::from_delay(delay)?;
    let outcome = state.borrow_mut().submit(delay, action);
    match outcome {
        Ok(_) => Ok(()),
        Err((err, action)) => {
            // Runs the closure's destructor (never the closure) with no borrow held.
            drop(action);
            Err(err)
        }
    }
}

/// Map a submission result onto the boolean contract: `false` only for a full
/// store (or a dead scheduler), panic on caller misuse.
fn accepted(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(Error::CapacityExceeded { .. } | Error::SchedulerGone) => false,
        Err(err) => panic!("invalid submission: {err}"),
    }
}

/// Capacity-bounded delayed-callback scheduler.
///
/// Not `Send`: everything runs on the caller's thread.
pub struct Scheduler {
    state: Rc<RefCell<State>>,
}

impl Scheduler {
    /// Create a scheduler holding at most `capacity` pending entries.
    ///
    /// Storage is reserved up front; failure to reserve it is reported as
    /// [`Error::Allocation`] rather than aborting.
    pub fn new(capacity: usize) -> Result<Self> {
        let state = State::new(capacity)?;
        tracing::debug!(event = "scheduler.create", capacity, "Scheduler created");
        Ok(Self {
            state: Rc::new(RefCell::new(state)),
        })
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        Self::new(config.capacity)
    }

    /// A weak handle callbacks can capture to submit follow-up work.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            state: Rc::downgrade(&self.state),
        }
    }

    /// Schedule `action` to run once the clock has passed `now + delay`.
    ///
    /// The due time is `ceil(now) + delay`, with `delay` rounded up to the
    /// clock's resolution, so the delay is a minimum and never shortened.
    /// `now` here is the true time: a clock carrying a fraction of a sub-unit
    /// past a whole unit rounds up to the next one.
    pub fn try_submit(&self, delay: f64, action: impl FnOnce() + 'static) -> Result<()> {
        submit_into(&self.state, delay, Box::new(action))
    }

    /// Like [`Self::try_submit`], returning `false` iff the store is full.
    ///
    /// # Panics
    ///
    /// If `delay` is negative, NaN or infinite, or the due time overflows.
    pub fn submit(&self, delay: f64, action: impl FnOnce() + 'static) -> bool {
        accepted(self.try_submit(delay, action))
    }

    /// Move the clock forward by `elapsed` and fire every entry now due.
    ///
    /// Returns how many callbacks ran. Entries submitted by those callbacks are
    /// not considered until the next advance. If a callback panics, the rest
    /// of this advance's due entries stay pending and run first on the next
    /// advance.
    pub fn try_advance(&mut self, elapsed: f64) -> Result<usize> {
        let (now, due) = self.state.borrow_mut().begin_advance(elapsed)?;

        let mut fired = 0_usize;
        loop {
            // The borrow must end before the callback runs.
            let next = self.state.borrow_mut().pop_in_flight();
            let Some(entry) = next else {
                break;
            };
            tracing::trace!(
                event = "scheduler.entry.fire",
                seq = %entry.seq,
                due_at = %entry.due_at,
                %now,
                "Entry fired"
            );
            entry.fire();
            fired += 1;
        }

        let state = self.state.borrow();
        state.store.check_invariants();
        tracing::debug!(
            event = "scheduler.advance",
            elapsed,
            %now,
            due,
            fired,
            pending = state.pending(),
            "Advanced clock"
        );
        Ok(fired)
    }

    /// Like [`Self::try_advance`].
    ///
    /// # Panics
    ///
    /// If `elapsed` is negative, NaN or infinite, or the clock would overflow:
    /// the clock only ever moves forward.
    pub fn advance(&mut self, elapsed: f64) -> usize {
        match self.try_advance(elapsed) {
            Ok(fired) => fired,
            Err(err) => panic!("invalid advance: {err}"),
        }
    }

    /// Entries not yet fired. O(1).
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        let state = self.state.borrow();
        state.pending() >= state.capacity()
    }

    /// Current time on the sub-unit grid, rounded down.
    #[must_use]
    pub fn now(&self) -> Ticks {
        self.state.borrow().clock.now()
    }

    /// Current time in units, including any fraction of a sub-unit carried
    /// over from earlier advances.
    #[must_use]
    pub fn now_units(&self) -> f64 {
        self.state.borrow().clock.now_units()
    }

    /// Due time of the earliest pending entry.
    #[must_use]
    pub fn next_due(&self) -> Option<Ticks> {
        let state = self.state.borrow();
        state
            .in_flight
            .front()
            .map(|entry| entry.due_at)
            .or_else(|| state.store.next_due())
    }

    /// How far the committed clock must move before the next entry is due,
    /// saturating at zero. Because due is strict, an entry fires once the
    /// clock moves strictly past this amount.
    #[must_use]
    pub fn time_until_next_due(&self) -> Option<Ticks> {
        let now = self.now();
        self.next_due().map(|due| due.saturating_sub(now))
    }

    #[must_use]
    pub fn snapshot(&self) -> SchedulerTelemetry {
        self.state.borrow().snapshot()
    }

    /// Tear down, discarding every pending entry without running it.
    ///
    /// Returns how many entries were discarded. Dropping the scheduler does
    /// the same silently.
    pub fn shutdown(self) -> usize {
        self.discard_pending()
    }

    fn discard_pending(&self) -> usize {
        let (in_flight, stored) = self.state.borrow_mut().drain_pending();
        let discarded = in_flight.len() + stored.len();
        if discarded > 0 {
            tracing::debug!(
                event = "scheduler.shutdown",
                discarded,
                now = %self.now(),
                "Discarded pending entries"
            );
        }
        // Callback destructors may touch a handle; no borrow is held here.
        drop(in_flight);
        drop(stored);
        discarded
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.discard_pending();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("now", &state.clock.now())
            .field("seq", &state.seq)
            .field("pending", &state.pending())
            .field("in_flight", &state.in_flight.len())
            .field("capacity", &state.capacity())
            .finish_non_exhaustive()
    }
}

/// Weak, cloneable submission handle for use inside callbacks.
#[derive(Clone)]
pub struct SchedulerHandle {
    state: Weak<RefCell<State>>,
}

impl SchedulerHandle {
    /// Submit through the handle. Fails with [`Error::SchedulerGone`] once the
    /// scheduler has been dropped; the action is then discarded unrun.
    pub fn try_submit(&self, delay: f64, action: impl FnOnce() + 'static) -> Result<()> {
        let Some(state) = self.state.upgrade() else {
            return Err(Error::SchedulerGone);
        };
        submit_into(&state, delay, Box::new(action))
    }

    /// Returns `false` if the store is full or the scheduler is gone.
    ///
    /// # Panics
    ///
    /// If `delay` is negative, NaN or infinite, or the due time overflows.
    pub fn submit(&self, delay: f64, action: impl FnOnce() + 'static) -> bool {
        accepted(self.try_submit(delay, action))
    }

    /// Pending entries, or 0 once the scheduler is gone.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state
            .upgrade()
            .map_or(0, |state| state.borrow().pending())
    }

    #[must_use]
    pub fn now(&self) -> Option<Ticks> {
        self.state.upgrade().map(|state| state.borrow().clock.now())
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
