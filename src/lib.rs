//! In-process, single-threaded delayed-callback scheduler.
//!
//! A [`Scheduler`] holds a fixed number of "run this callback no earlier than
//! time T" entries and a caller-driven logical clock. Each
//! [`Scheduler::advance`] moves the clock and fires the entries whose due time
//! has strictly passed, in due order with ties broken first-in-first-out.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use jobqueue::Scheduler;
//!
//! let fired = Rc::new(Cell::new(0));
//! let mut sched = Scheduler::new(10).expect("scheduler storage");
//!
//! let count = Rc::clone(&fired);
//! assert!(sched.submit(5.0, move || count.set(count.get() + 1)));
//!
//! sched.advance(5.0); // due exactly now: not yet
//! assert_eq!(fired.get(), 0);
//! sched.advance(1.0);
//! assert_eq!(fired.get(), 1);
//! assert_eq!(sched.pending_count(), 0);
//! ```

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod store;

pub use clock::{LogicalClock, SUBUNITS_PER_UNIT, Ticks};
pub use config::SchedulerConfig;
pub use error::{Error, Result};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerTelemetry};
