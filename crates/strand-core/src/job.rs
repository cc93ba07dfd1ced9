//! Ready-made jobs.
//!
//! Most tasks are small state machines. These helpers cover the common
//! shapes without writing a `Job` impl by hand.

use crate::error::{Outcome, TaskError};
use crate::scheduler::{Job, Step, StepContext};
use std::time::Duration;

/// Job backed by a closure called once per resumption
pub struct FnJob<F>(F);

/// Wrap a closure as a job.
///
/// The closure is called on every resumption; use
/// [`StepContext::resumption`] or captured state to tell steps apart.
pub fn from_fn<T, F>(f: F) -> FnJob<F>
where
    F: FnMut(&mut StepContext<'_, T>) -> Step<T>,
{
    FnJob(f)
}

impl<T, F> Job<T> for FnJob<F>
where
    F: FnMut(&mut StepContext<'_, T>) -> Step<T>,
{
    fn resume(&mut self, cx: &mut StepContext<'_, T>) -> Step<T> {
        (self.0)(cx)
    }
}

/// Job that finishes immediately with a value
pub struct Ready<T>(Option<T>);

/// Finish on the first step with `value`.
pub fn ready<T>(value: T) -> Ready<T> {
    Ready(Some(value))
}

impl<T> Job<T> for Ready<T> {
    fn resume(&mut self, _cx: &mut StepContext<'_, T>) -> Step<T> {
        match self.0.take() {
            Some(value) => Step::Done(value),
            None => Step::raise("StateError", "job resumed after completion"),
        }
    }
}

/// Job that fails immediately
pub struct Fail(Option<TaskError>);

/// Fail on the first step with `err`.
pub fn fail(err: TaskError) -> Fail {
    Fail(Some(err))
}

impl<T> Job<T> for Fail {
    fn resume(&mut self, _cx: &mut StepContext<'_, T>) -> Step<T> {
        Step::Failed(
            self.0
                .take()
                .unwrap_or_else(|| TaskError::raised("StateError", "job resumed after completion")),
        )
    }
}

/// Job that sleeps once, then computes its result
pub struct SleepThen<F> {
    delay: Duration,
    finish: Option<F>,
    slept: bool,
}

/// Sleep for `delay`, then finish with `f()`.
pub fn sleep_then<T, F>(delay: Duration, f: F) -> SleepThen<F>
where
    F: FnOnce() -> Outcome<T>,
{
    SleepThen {
        delay,
        finish: Some(f),
        slept: false,
    }
}

impl<T, F> Job<T> for SleepThen<F>
where
    F: FnOnce() -> Outcome<T>,
{
    fn resume(&mut self, _cx: &mut StepContext<'_, T>) -> Step<T> {
        if !self.slept {
            self.slept = true;
            return Step::sleep(self.delay);
        }
        match self.finish.take() {
            Some(f) => Step::from_outcome(f()),
            None => Step::raise("StateError", "job resumed after completion"),
        }
    }
}

/// Job driven by an iterator of steps
pub struct IterJob<I>(I);

/// Drive a task from an iterator: each resumption yields the next step.
///
/// The iterator is expected to end with a terminal step; running dry
/// first fails the task with a `StopIteration` error.
pub fn from_iter<T, I>(steps: I) -> IterJob<I::IntoIter>
where
    I: IntoIterator<Item = Step<T>>,
{
    IterJob(steps.into_iter())
}

impl<T, I> Job<T> for IterJob<I>
where
    I: Iterator<Item = Step<T>>,
{
    fn resume(&mut self, _cx: &mut StepContext<'_, T>) -> Step<T> {
        self.0.next().unwrap_or_else(|| {
            Step::raise("StopIteration", "job ran out of steps without a result")
        })
    }
}
