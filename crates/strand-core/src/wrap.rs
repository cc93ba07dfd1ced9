//! Job wrappers
//!
//! Composable layers around a job: step logging, step timing and
//! repetition. Each wrapper is itself a [`Job`], so they stack:
//!
//! ```text
//! job.timed(stats.clone()).logged("fetch")
//! ```

use crate::scheduler::{Job, Step, StepContext};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Logs each resumption of the wrapped job
pub struct Logged<J> {
    name: String,
    inner: J,
}

impl<J> Logged<J> {
    /// Wrap `inner`, naming it `name` in log events
    pub fn new(name: impl Into<String>, inner: J) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// Name used in log events
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T, J: Job<T>> Job<T> for Logged<J> {
    fn resume(&mut self, cx: &mut StepContext<'_, T>) -> Step<T> {
        tracing::debug!(
            job = %self.name,
            task = %cx.id(),
            wakeup = ?cx.wakeup(),
            resumption = cx.resumption(),
            "calling job"
        );

        let step = self.inner.resume(cx);

        match &step {
            Step::Done(_) => tracing::debug!(job = %self.name, task = %cx.id(), "job returned"),
            Step::Failed(err) => {
                tracing::debug!(job = %self.name, task = %cx.id(), %err, "job failed")
            }
            Step::Suspend(reason) => {
                tracing::debug!(job = %self.name, task = %cx.id(), ?reason, "job suspended")
            }
        }
        step
    }
}

#[derive(Debug, Default)]
struct TimingInner {
    steps: u64,
    busy: Duration,
    slowest: Duration,
}

/// Shared counters filled in by [`Timed`]
///
/// Cloning shares the same counters, so one handle can be kept by the
/// caller while another is moved into the job.
#[derive(Debug, Clone, Default)]
pub struct TimingStats {
    inner: Arc<Mutex<TimingInner>>,
}

impl TimingStats {
    /// Create empty counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of measured steps
    pub fn steps(&self) -> u64 {
        self.inner.lock().steps
    }

    /// Total time spent inside measured steps
    pub fn busy(&self) -> Duration {
        self.inner.lock().busy
    }

    /// Longest single step
    pub fn slowest(&self) -> Duration {
        self.inner.lock().slowest
    }

    fn record(&self, elapsed: Duration) {
        let mut inner = self.inner.lock();
        inner.steps += 1;
        inner.busy += elapsed;
        inner.slowest = inner.slowest.max(elapsed);
    }
}

/// Measures the wall time of each resumption of the wrapped job.
///
/// Time spent suspended is not counted, only time spent running.
pub struct Timed<J> {
    stats: TimingStats,
    inner: J,
}

impl<J> Timed<J> {
    /// Wrap `inner`, recording into `stats`
    pub fn new(stats: TimingStats, inner: J) -> Self {
        Self { stats, inner }
    }
}

impl<T, J: Job<T>> Job<T> for Timed<J> {
    fn resume(&mut self, cx: &mut StepContext<'_, T>) -> Step<T> {
        let start = Instant::now();
        let step = self.inner.resume(cx);
        self.stats.record(start.elapsed());
        step
    }
}

/// Runs a freshly built job `times` times in a row inside one task.
///
/// Rounds are separated by a yield. The task finishes with the last round's
/// value, or with the first round's error.
pub struct Repeat<F, J> {
    factory: F,
    times: u32,
    round: u32,
    current: Option<J>,
}

impl<F, J> Repeat<F, J>
where
    F: FnMut() -> J,
{
    /// Repeat jobs built by `factory`; `times` is clamped to at least 1
    pub fn new(times: u32, factory: F) -> Self {
        Self {
            factory,
            times: times.max(1),
            round: 0,
            current: None,
        }
    }

    /// Rounds finished so far
    pub fn completed_rounds(&self) -> u32 {
        self.round
    }
}

impl<T, F, J> Job<T> for Repeat<F, J>
where
    F: FnMut() -> J,
    J: Job<T>,
{
    fn resume(&mut self, cx: &mut StepContext<'_, T>) -> Step<T> {
        let factory = &mut self.factory;
        let job = self.current.get_or_insert_with(|| factory());

        match job.resume(cx) {
            Step::Done(value) => {
                self.current = None;
                self.round += 1;
                if self.round >= self.times {
                    Step::Done(value)
                } else {
                    tracing::trace!(round = self.round, times = self.times, "repeating job");
                    Step::yield_now()
                }
            }
            other => other,
        }
    }
}

/// Wrapper combinators for any job
pub trait JobExt<T>: Job<T> + Sized {
    /// Log every resumption under `name`
    fn logged(self, name: impl Into<String>) -> Logged<Self> {
        Logged::new(name, self)
    }

    /// Record step timings into `stats`
    fn timed(self, stats: TimingStats) -> Timed<Self> {
        Timed::new(stats, self)
    }
}

impl<T, J: Job<T>> JobExt<T> for J {}
