use std::cell::{Cell, RefCell};
use std::rc::Rc;

use jobqueue::{Error, Scheduler, SchedulerConfig, Ticks};
use pretty_assertions::assert_eq;

type Trace = Rc<RefCell<Vec<String>>>;

fn record(trace: &Trace, label: impl Into<String>) -> impl FnOnce() + 'static {
    let trace = Rc::clone(trace);
    let label = label.into();
    move || trace.borrow_mut().push(label)
}

#[test]
fn two_job_walkthrough_matches_expected_counts_and_order() {
    let trace: Trace = Rc::default();
    let mut sched = Scheduler::new(10).unwrap();

    assert!(sched.submit(10.0, record(&trace, "f1")));
    assert!(sched.submit(5.0, record(&trace, "f2")));
    assert_eq!(sched.pending_count(), 2);

    // Clock = 5: f2 is due exactly now, which is not yet due.
    assert_eq!(sched.advance(5.0), 0);
    assert!(trace.borrow().is_empty());

    // Clock = 11: both have strictly passed.
    assert_eq!(sched.advance(6.0), 2);
    assert_eq!(*trace.borrow(), vec!["f2", "f1"]);
    assert_eq!(sched.pending_count(), 0);
}

#[test]
fn capacity_plus_one_submission_is_rejected() {
    let sched = Scheduler::new(3).unwrap();
    for delay in [1.0, 2.0, 3.0] {
        assert!(sched.submit(delay, || {}));
    }
    assert!(!sched.submit(4.0, || {}));
    assert_eq!(sched.pending_count(), 3);
    assert!(matches!(
        sched.try_submit(4.0, || {}),
        Err(Error::CapacityExceeded { capacity: 3 })
    ));
}

#[test]
fn slots_free_up_after_firing() {
    let mut sched = Scheduler::new(1).unwrap();
    assert!(sched.submit(1.0, || {}));
    assert!(!sched.submit(1.0, || {}));
    sched.advance(2.0);
    assert!(sched.submit(1.0, || {}));
}

#[test]
fn fires_in_due_order_regardless_of_submission_order() {
    let trace: Trace = Rc::default();
    let mut sched = Scheduler::new(8).unwrap();
    sched.submit(30.0, record(&trace, "t3"));
    sched.submit(10.0, record(&trace, "t1"));
    sched.submit(20.0, record(&trace, "t2"));

    sched.advance(31.0);
    assert_eq!(*trace.borrow(), vec!["t1", "t2", "t3"]);
}

#[test]
fn equal_due_times_fire_first_in_first_out() {
    let trace: Trace = Rc::default();
    let mut sched = Scheduler::new(8).unwrap();
    for label in ["a", "b", "c", "d"] {
        sched.submit(10.0, record(&trace, label));
    }
    sched.submit(5.0, record(&trace, "early"));

    sched.advance(11.0);
    assert_eq!(*trace.borrow(), vec!["early", "a", "b", "c", "d"]);
}

#[test]
fn delay_is_a_minimum_not_exact() {
    let fired = Rc::new(Cell::new(false));
    let mut sched = Scheduler::new(2).unwrap();
    sched.advance(3.0);

    let flag = Rc::clone(&fired);
    sched.submit(4.0, move || flag.set(true));
    sched.advance(4.0);
    assert!(!fired.get(), "exactly-at-boundary must not fire");

    sched.advance(0.25);
    assert!(fired.get());
}

#[test]
fn fractional_delay_rounds_up() {
    let fired = Rc::new(Cell::new(false));
    let mut sched = Scheduler::new(2).unwrap();
    let flag = Rc::clone(&fired);
    sched.submit(1.0005, move || flag.set(true));
    // Due at 1.001 after rounding up to the clock's resolution.
    assert_eq!(sched.next_due(), Some(Ticks::from_raw(1_001)));

    sched.advance(1.001);
    assert!(!fired.get());
    sched.advance(0.001);
    assert!(fired.get());
}

#[test]
fn reentrant_submissions_are_deferred_and_counted() {
    let trace: Trace = Rc::default();
    let mut sched = Scheduler::new(4).unwrap();
    let handle = sched.handle();

    let chain = Rc::clone(&trace);
    sched.submit(1.0, move || {
        chain.borrow_mut().push("first".to_string());
        let next = Rc::clone(&chain);
        let inner = handle.clone();
        handle.submit(0.0, move || {
            next.borrow_mut().push("second".to_string());
            let last = Rc::clone(&next);
            inner.submit(2.0, move || last.borrow_mut().push("third".to_string()));
        });
    });

    assert_eq!(sched.advance(100.0), 1);
    assert_eq!(sched.pending_count(), 1);
    assert_eq!(sched.advance(1.0), 1);
    assert_eq!(sched.pending_count(), 1);
    assert_eq!(sched.advance(2.0), 0);
    assert_eq!(sched.advance(1.0), 1);
    assert_eq!(*trace.borrow(), vec!["first", "second", "third"]);
    assert_eq!(sched.pending_count(), 0);
}

#[test]
fn every_entry_fires_exactly_once() {
    let counts = Rc::new(RefCell::new(vec![0_u32; 20]));
    let mut sched = Scheduler::new(20).unwrap();
    for i in 0..20_u32 {
        let counts = Rc::clone(&counts);
        let delay = f64::from((i * 7) % 13);
        assert!(sched.submit(delay, move || counts.borrow_mut()[i as usize] += 1));
    }

    for _ in 0..30 {
        sched.advance(0.5);
    }
    assert!(counts.borrow().iter().all(|count| *count == 1));
    assert_eq!(sched.snapshot().fired_total, 20);
    assert!(sched.is_empty());
}

#[test]
fn teardown_is_silent() {
    let invoked = Rc::new(Cell::new(0_u32));
    let mut sched = Scheduler::new(5).unwrap();
    for delay in [1.0, 10.0, 20.0, 30.0] {
        let invoked = Rc::clone(&invoked);
        sched.submit(delay, move || invoked.set(invoked.get() + 1));
    }
    sched.advance(5.0);
    assert_eq!(invoked.get(), 1);

    assert_eq!(sched.shutdown(), 3);
    assert_eq!(invoked.get(), 1);
    assert_eq!(Rc::strong_count(&invoked), 1);
}

#[test]
fn config_builds_scheduler_with_its_capacity() {
    let sched = Scheduler::from_config(&SchedulerConfig::with_capacity(7)).unwrap();
    assert_eq!(sched.capacity(), 7);
    assert!(matches!(
        Scheduler::from_config(&SchedulerConfig::with_capacity(0)),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn long_runs_do_not_drift() {
    let fired = Rc::new(Cell::new(false));
    let mut sched = Scheduler::new(1).unwrap();
    // 90 minutes of 16ms frames, then a fractional step.
    for _ in 0..5_400_000 / 16 {
        sched.advance(16.0);
    }
    sched.advance(0.5);
    let flag = Rc::clone(&fired);
    sched.submit(1.0, move || flag.set(true));
    assert_eq!(sched.next_due(), Ticks::from_units(5_400_000 / 16 * 16 + 2));

    sched.advance(1.5);
    assert!(!fired.get());
    sched.advance(0.001);
    assert!(fired.get());
}

#[test]
fn overshoot_smaller_than_clock_resolution_fires() {
    let fired = Rc::new(Cell::new(false));
    let mut sched = Scheduler::new(1).unwrap();
    let flag = Rc::clone(&fired);
    sched.submit(5.0, move || flag.set(true));

    assert_eq!(sched.advance(5.0001), 1);
    assert!(fired.get());
}

#[test]
fn fractional_steps_accumulate_exactly() {
    let fired = Rc::new(Cell::new(0_u32));
    let mut sched = Scheduler::new(4).unwrap();
    for delay in [0.002, 1.0] {
        let fired = Rc::clone(&fired);
        sched.submit(delay, move || fired.set(fired.get() + 1));
    }

    // Three steps of 0.0006 stay short of 0.002; a fourth passes it.
    for _ in 0..3 {
        sched.advance(0.0006);
    }
    assert_eq!(fired.get(), 0);
    sched.advance(0.0006);
    assert_eq!(fired.get(), 1);

    // 2,500 steps of 0.0004 add a full unit.
    for _ in 0..2_500 {
        sched.advance(0.0004);
    }
    assert_eq!(fired.get(), 2);
    assert!((sched.now_units() - 1.0024).abs() < 1e-9);
}
