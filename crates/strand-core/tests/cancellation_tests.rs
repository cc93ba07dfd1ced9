//! Cancellation and shutdown tests

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use strand_core::{job, Scheduler, Step, StepContext, SuspendReason, TaskError, TaskState};

/// Counts resumptions into `counter`, sleeping `secs` on the first step
fn counted_sleeper(counter: &Rc<Cell<u32>>, secs: u64) -> impl strand_core::Job<i32> {
    let counter = counter.clone();
    job::from_fn(move |cx: &mut StepContext<'_, i32>| {
        counter.set(counter.get() + 1);
        if cx.resumption() == 1 {
            Step::sleep(Duration::from_secs(secs))
        } else {
            Step::Done(secs as i32)
        }
    })
}

// ============================================================================
// Cancelling from outside
// ============================================================================

#[test]
fn test_cancel_sleeping_task() {
    let resumed = Rc::new(Cell::new(0));
    let mut scheduler = Scheduler::virtual_time();

    let long = scheduler.submit(counted_sleeper(&resumed, 10));
    let short = scheduler.submit(job::sleep_then(Duration::from_secs(1), || Ok(1)));

    scheduler.run_until_first(&[short]).unwrap();
    assert_eq!(scheduler.state(long), Some(TaskState::Suspended));
    assert!(scheduler.is_sleeping(long));

    assert!(scheduler.cancel(long));
    assert!(!scheduler.is_sleeping(long));
    assert_eq!(scheduler.timer_len(), 0);
    assert_eq!(scheduler.state(long), Some(TaskState::Failed));

    // Exactly one Cancelled result, and the task never runs again
    assert_eq!(scheduler.take_result(long), Some(Err(TaskError::Cancelled)));
    assert_eq!(scheduler.take_result(long), None);
    scheduler.run_until_idle();
    assert_eq!(resumed.get(), 1);

    assert!(!scheduler.cancel(long));
    assert_eq!(scheduler.stats().tasks_cancelled, 1);
}

#[test]
fn test_cancel_pending_task() {
    let resumed = Rc::new(Cell::new(0));
    let mut scheduler = Scheduler::virtual_time();
    let handle = scheduler.submit(counted_sleeper(&resumed, 1));

    assert!(scheduler.cancel(handle));
    assert_eq!(scheduler.ready_len(), 0);

    let results = scheduler.run_until_complete(&[handle]).unwrap();
    assert_eq!(results, vec![Err(TaskError::Cancelled)]);
    assert_eq!(resumed.get(), 0);
}

#[test]
fn test_cancel_finished_task_is_noop() {
    let mut scheduler = Scheduler::virtual_time();
    let handle = scheduler.submit(job::ready(1));
    scheduler.run_until_idle();

    assert!(!scheduler.cancel(handle));
    assert_eq!(scheduler.take_result(handle), Some(Ok(1)));
}

#[test]
fn test_cancel_awaiting_task() {
    let mut scheduler = Scheduler::virtual_time();
    let target = scheduler.submit(job::sleep_then(Duration::from_secs(5), || Ok(5)));
    let waiter = scheduler.submit(job::from_iter(vec![
        Step::Suspend(SuspendReason::Await(target.task_id())),
        Step::Done(0),
    ]));
    let marker = scheduler.submit(job::sleep_then(Duration::from_secs(1), || Ok(1)));

    scheduler.run_until_first(&[marker]).unwrap();
    assert_eq!(
        scheduler.suspend_reason(waiter),
        Some(SuspendReason::Await(target.task_id()))
    );

    assert!(scheduler.cancel(waiter));

    // The target finishes normally and does not resurrect the waiter
    assert_eq!(scheduler.run_until_complete(&[target]).unwrap(), vec![Ok(5)]);
    assert_eq!(scheduler.take_result(waiter), Some(Err(TaskError::Cancelled)));
}

#[test]
fn test_waiters_see_cancelled_target() {
    let mut scheduler = Scheduler::virtual_time();
    let target = scheduler.submit(job::sleep_then(Duration::from_secs(5), || Ok(5)));

    let mut awaiting = false;
    let waiter = scheduler.submit(job::from_fn(move |cx: &mut StepContext<'_, i32>| {
        if !awaiting {
            awaiting = true;
            return Step::Suspend(SuspendReason::Await(target.task_id()));
        }
        match cx.outcome_of(target) {
            Some(Err(err)) if err.is_cancelled() => Step::Done(-1),
            _ => Step::Done(0),
        }
    }));
    let marker = scheduler.submit(job::ready(1));

    scheduler.run_until_first(&[marker]).unwrap();
    assert!(scheduler.cancel(target));

    assert_eq!(scheduler.run_until_complete(&[waiter]).unwrap(), vec![Ok(-1)]);
}

// ============================================================================
// Cancelling from inside a step
// ============================================================================

#[test]
fn test_task_cancels_sibling() {
    let resumed = Rc::new(Cell::new(0));
    let mut scheduler = Scheduler::virtual_time();

    let victim = scheduler.submit(counted_sleeper(&resumed, 5));
    let killer = scheduler.submit(job::from_fn(move |cx: &mut StepContext<'_, i32>| {
        if cx.resumption() == 1 {
            return Step::sleep(Duration::from_secs(1));
        }
        cx.cancel(victim);
        Step::Done(1)
    }));

    let results = scheduler.run_until_complete(&[victim, killer]).unwrap();
    assert_eq!(results, vec![Err(TaskError::Cancelled), Ok(1)]);
    assert_eq!(resumed.get(), 1);
}

#[test]
fn test_self_cancel_lands_at_suspension() {
    let mut scheduler: Scheduler<i32> = Scheduler::virtual_time();
    let handle = scheduler.submit(job::from_fn(|cx: &mut StepContext<'_, i32>| {
        let me = cx.handle();
        cx.cancel(me);
        Step::sleep(Duration::from_secs(1))
    }));

    let results = scheduler.run_until_complete(&[handle]).unwrap();
    assert_eq!(results, vec![Err(TaskError::Cancelled)]);
    assert_eq!(scheduler.timer_len(), 0);
    assert_eq!(scheduler.stats().resumptions, 1);
}

#[test]
fn test_self_cancel_on_final_step_keeps_result() {
    let mut scheduler = Scheduler::virtual_time();
    let handle = scheduler.submit(job::from_fn(|cx: &mut StepContext<'_, i32>| {
        let me = cx.handle();
        cx.cancel(me);
        Step::Done(7)
    }));

    assert_eq!(scheduler.run_until_complete(&[handle]).unwrap(), vec![Ok(7)]);
    assert_eq!(scheduler.stats().tasks_cancelled, 0);
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn test_shutdown_fails_outstanding_tasks() {
    let mut scheduler = Scheduler::virtual_time();
    let done = scheduler.submit(job::ready(1));
    scheduler.run_until_idle();

    let sleeping = scheduler.submit(job::sleep_then(Duration::from_secs(60), || Ok(2)));
    let pending = scheduler.submit(job::ready(3));
    scheduler.run_until_first(&[pending]).unwrap();
    assert_eq!(scheduler.state(sleeping), Some(TaskState::Suspended));

    scheduler.shutdown();
    assert!(scheduler.is_shut_down());
    assert_eq!(scheduler.timer_len(), 0);
    assert_eq!(scheduler.ready_len(), 0);

    // Results recorded before shutdown survive
    assert_eq!(scheduler.take_result(done), Some(Ok(1)));
    assert_eq!(scheduler.take_result(pending), Some(Ok(3)));
    assert_eq!(
        scheduler.take_result(sleeping),
        Some(Err(TaskError::SchedulerShutdown))
    );

    // Idempotent
    scheduler.shutdown();
    assert_eq!(scheduler.stats().tasks_failed, 1);
}

#[test]
fn test_submit_after_shutdown_fails_immediately() {
    let mut scheduler = Scheduler::virtual_time();
    scheduler.shutdown();

    let handle = scheduler.submit(job::ready(1));
    assert_eq!(scheduler.state(handle), Some(TaskState::Failed));
    assert_eq!(
        scheduler.run_until_complete(&[handle]).unwrap(),
        vec![Err(TaskError::SchedulerShutdown)]
    );
}
