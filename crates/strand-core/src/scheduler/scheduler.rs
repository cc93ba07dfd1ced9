//! Single-threaded cooperative scheduler
//!
//! One control loop owns every task. Each iteration:
//!
//! 1. drains external events (notifier calls, blocking-pool completions),
//! 2. moves due timers to the back of the ready queue,
//! 3. resumes the task at the front of the ready queue for one step,
//! 4. otherwise waits for the next timer or external event.
//!
//! A step's error or panic fails only that task. Nothing a task does can
//! unwind out of the loop.

use crate::clock::{Clock, SystemClock, VirtualClock};
use crate::config::{ClockKind, RunPolicy, SchedulerConfig};
use crate::error::{AggregateError, Outcome, SchedulerError, SchedulerResult, TaskError};
use crate::scheduler::context::{Effects, OffloadFn};
use crate::scheduler::pool::BlockingPool;
use crate::scheduler::task::Task;
use crate::scheduler::{
    Job, Step, StepContext, SuspendReason, TaskHandle, TaskId, TaskState, TimerQueue, Wakeup,
};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total tasks submitted (including children spawned by tasks)
    pub tasks_spawned: u64,

    /// Tasks that reached Done
    pub tasks_completed: u64,

    /// Tasks that reached Failed (including cancelled and shut down)
    pub tasks_failed: u64,

    /// Tasks that failed with `TaskError::Cancelled`
    pub tasks_cancelled: u64,

    /// Total steps executed
    pub resumptions: u64,

    /// Tasks not yet terminal
    pub active_tasks: usize,
}

/// Message delivered to the control loop from outside it
enum Event<T> {
    /// A notifier call addressed to a task
    Notify { task: TaskId, value: T },
    /// A blocking-pool closure finished (Err carries the panic message)
    Offloaded { task: TaskId, result: Result<T, String> },
}

/// `Send` handle for waking tasks suspended on [`SuspendReason::Notify`]
/// from other threads.
pub struct Notifier<T> {
    tx: Sender<Event<T>>,
    _alive: Arc<()>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            _alive: self._alive.clone(),
        }
    }
}

impl<T> Notifier<T> {
    /// Deliver `value` to `handle`'s task. Returns false if the scheduler is gone.
    ///
    /// If the task is not currently waiting, the value is kept until it next
    /// suspends on `Notify`.
    pub fn notify(&self, handle: TaskHandle, value: T) -> bool {
        self.tx
            .send(Event::Notify {
                task: handle.task_id(),
                value,
            })
            .is_ok()
    }
}

/// How the control loop stopped
enum DriveExit {
    /// The caller's condition holds
    Satisfied,
    /// Nothing can make progress any more
    Idle,
}

/// Main task scheduler
pub struct Scheduler<T> {
    /// Every task not yet removed, keyed by ID
    tasks: FxHashMap<TaskId, Task<T>>,

    /// Tasks eligible to run now, in FIFO order
    ready: VecDeque<TaskId>,

    /// Sleeping tasks
    timers: TimerQueue,

    clock: Box<dyn Clock>,
    config: SchedulerConfig,

    /// Started on first offload
    pool: Option<BlockingPool>,

    /// External event channel
    event_tx: Sender<Event<T>>,
    event_rx: Receiver<Event<T>>,

    /// Shared with every `Notifier`; strong count > 1 means one is alive
    notifier_alive: Arc<()>,

    /// Closures sent to the pool whose completion has not arrived yet
    outstanding_offloads: usize,

    stats: SchedulerStats,
    shut_down: bool,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Create a scheduler on the system clock with default settings
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler from a configuration
    pub fn with_config(config: SchedulerConfig) -> Self {
        let clock: Box<dyn Clock> = match config.clock {
            ClockKind::System => Box::new(SystemClock),
            ClockKind::Virtual => Box::new(VirtualClock::new()),
        };
        Self::with_clock(config, clock)
    }

    /// Create a scheduler with an explicit clock (overrides `config.clock`)
    pub fn with_clock(config: SchedulerConfig, clock: Box<dyn Clock>) -> Self {
        let (event_tx, event_rx) = channel::unbounded();
        Self {
            tasks: FxHashMap::default(),
            ready: VecDeque::new(),
            timers: TimerQueue::new(),
            clock,
            config,
            pool: None,
            event_tx,
            event_rx,
            notifier_alive: Arc::new(()),
            outstanding_offloads: 0,
            stats: SchedulerStats::default(),
            shut_down: false,
        }
    }

    /// Create a scheduler on a virtual clock (timers fire without waiting)
    pub fn virtual_time() -> Self {
        Self::with_config(SchedulerConfig {
            clock: ClockKind::Virtual,
            ..SchedulerConfig::default()
        })
    }

    // ========================================================================
    // Submission and queries
    // ========================================================================

    /// Submit a job as a new Pending task
    pub fn submit(&mut self, job: impl Job<T> + 'static) -> TaskHandle {
        self.insert_task(TaskId::new(), None, Box::new(job))
    }

    /// Submit a job under a name used in logs
    pub fn submit_named(
        &mut self,
        name: impl Into<String>,
        job: impl Job<T> + 'static,
    ) -> TaskHandle {
        self.insert_task(TaskId::new(), Some(name.into()), Box::new(job))
    }

    fn insert_task(
        &mut self,
        id: TaskId,
        name: Option<String>,
        job: Box<dyn Job<T>>,
    ) -> TaskHandle {
        let mut task = Task::new(id, name, job);
        self.stats.tasks_spawned += 1;

        if self.shut_down {
            tracing::warn!(task = %id, "task submitted after shutdown");
            task.finish(Err(TaskError::SchedulerShutdown));
            self.stats.tasks_failed += 1;
        } else {
            tracing::trace!(task = %id, name = task.name().unwrap_or(""), "task submitted");
            self.ready.push_back(id);
        }

        self.tasks.insert(id, task);
        TaskHandle::new(id)
    }

    /// Current state of a task
    pub fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.tasks.get(&handle.task_id()).map(|task| task.state())
    }

    /// Whether the task is Done or Failed
    pub fn is_finished(&self, handle: TaskHandle) -> bool {
        self.state(handle).is_some_and(TaskState::is_terminal)
    }

    /// Why a suspended task is waiting
    pub fn suspend_reason(&self, handle: TaskHandle) -> Option<SuspendReason> {
        self.tasks
            .get(&handle.task_id())
            .and_then(|task| task.suspend_reason())
    }

    /// Move a finished task's result out of the scheduler.
    ///
    /// Returns the result once; later calls (and calls for unfinished or
    /// unknown tasks) return `None`.
    pub fn take_result(&mut self, handle: TaskHandle) -> Option<Outcome<T>> {
        self.tasks
            .get_mut(&handle.task_id())
            .and_then(|task| task.take_outcome())
    }

    /// Number of tracked tasks (terminal ones included)
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tasks in the ready queue
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Number of tasks in the timer queue
    pub fn timer_len(&self) -> usize {
        self.timers.len()
    }

    /// Whether the task currently has a timer entry
    pub fn is_sleeping(&self, handle: TaskHandle) -> bool {
        self.timers.contains(handle.task_id())
    }

    /// Whether the task is currently in the ready queue
    pub fn is_ready(&self, handle: TaskHandle) -> bool {
        self.ready.contains(&handle.task_id())
    }

    /// Current reading of the scheduler's clock
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let active_tasks = self
            .tasks
            .values()
            .filter(|task| !task.state().is_terminal())
            .count();
        SchedulerStats {
            active_tasks,
            ..self.stats.clone()
        }
    }

    /// The active configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether `shutdown` has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Create a handle for delivering events from other threads
    pub fn notifier(&self) -> Notifier<T> {
        Notifier {
            tx: self.event_tx.clone(),
            _alive: self.notifier_alive.clone(),
        }
    }

    /// Forget terminal tasks whose results were taken. Returns how many.
    pub fn prune(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|_, task| !(task.state().is_terminal() && task.result_taken()));
        before - self.tasks.len()
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Run until every handle is terminal, using the configured policy.
    pub fn run_until_complete(
        &mut self,
        handles: &[TaskHandle],
    ) -> SchedulerResult<Vec<Outcome<T>>> {
        let policy = self.config.policy;
        self.run_until_complete_with(handles, policy)
    }

    /// Run until every handle is terminal.
    ///
    /// With `CollectAll`, returns one result per handle in the order given.
    /// With `FailFast`, stops as soon as any handle fails and returns the
    /// failures as an `AggregateError`; the remaining tasks stay scheduled
    /// and the failed tasks' results are moved into the error.
    ///
    /// A request naming the same handle twice, or a handle whose result was
    /// already taken, is rejected before anything runs and leaves every
    /// result slot untouched.
    pub fn run_until_complete_with(
        &mut self,
        handles: &[TaskHandle],
        policy: RunPolicy,
    ) -> SchedulerResult<Vec<Outcome<T>>> {
        self.check_collectable(handles)?;
        if handles.is_empty() {
            return Ok(Vec::new());
        }

        let fail_fast = policy == RunPolicy::FailFast;
        let exit = self.drive(|sched| {
            let mut all_done = true;
            for &handle in handles {
                match sched.state(handle) {
                    Some(TaskState::Failed) if fail_fast => return true,
                    Some(state) if state.is_terminal() => {}
                    _ => all_done = false,
                }
            }
            all_done
        });

        if fail_fast {
            let failed: Vec<TaskHandle> = handles
                .iter()
                .copied()
                .filter(|&h| self.state(h) == Some(TaskState::Failed))
                .collect();
            if !failed.is_empty() {
                let mut aggregate = AggregateError::default();
                for handle in failed {
                    if let Some(Err(err)) = self.take_result(handle) {
                        aggregate.errors.push((handle.task_id(), err));
                    }
                }
                return Err(aggregate.into());
            }
        }

        if let DriveExit::Idle = exit {
            let waiting = handles.iter().filter(|&&h| !self.is_finished(h)).count();
            if waiting > 0 {
                return Err(SchedulerError::Stalled { waiting });
            }
        }

        // Every handle is terminal, distinct and uncollected here, so each
        // slot still holds its result
        let mut results = Vec::with_capacity(handles.len());
        for &handle in handles {
            match self.take_result(handle) {
                Some(outcome) => results.push(outcome),
                None => return Err(SchedulerError::ResultTaken(handle.task_id())),
            }
        }
        Ok(results)
    }

    /// Run until at least one handle is terminal.
    ///
    /// Returns `(done, pending)`; pending tasks stay scheduled and can be
    /// driven by a later call.
    pub fn run_until_first(
        &mut self,
        handles: &[TaskHandle],
    ) -> SchedulerResult<(Vec<TaskHandle>, Vec<TaskHandle>)> {
        self.check_known(handles)?;
        if handles.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let exit = self.drive(|sched| handles.iter().any(|&h| sched.is_finished(h)));

        let (done, pending): (Vec<TaskHandle>, Vec<TaskHandle>) =
            handles.iter().partition(|&&h| self.is_finished(h));
        if done.is_empty() {
            if let DriveExit::Idle = exit {
                return Err(SchedulerError::Stalled {
                    waiting: pending.len(),
                });
            }
        }
        Ok((done, pending))
    }

    /// Run until nothing is ready, no timer is armed and no external event
    /// can arrive. Tasks still suspended on events or on each other are
    /// left as they are.
    pub fn run_until_idle(&mut self) {
        self.drive(|_| false);
    }

    fn check_known(&self, handles: &[TaskHandle]) -> SchedulerResult<()> {
        match handles.iter().find(|h| !self.tasks.contains_key(&h.task_id())) {
            Some(handle) => Err(SchedulerError::UnknownTask(handle.task_id())),
            None => Ok(()),
        }
    }

    /// Known, distinct handles whose results have not been taken
    fn check_collectable(&self, handles: &[TaskHandle]) -> SchedulerResult<()> {
        self.check_known(handles)?;
        let mut seen = FxHashSet::default();
        for handle in handles {
            let id = handle.task_id();
            if !seen.insert(id) {
                return Err(SchedulerError::DuplicateHandle(id));
            }
            if self.tasks.get(&id).is_some_and(|task| task.result_taken()) {
                return Err(SchedulerError::ResultTaken(id));
            }
        }
        Ok(())
    }

    /// Control loop
    fn drive(&mut self, mut done: impl FnMut(&Self) -> bool) -> DriveExit {
        loop {
            if done(self) {
                return DriveExit::Satisfied;
            }

            // === STEP 1: Drain external events ===
            self.drain_events();

            // === STEP 2: Move due timers to the ready queue ===
            self.fire_timers();

            // === STEP 3: Run one ready task ===
            if let Some(id) = self.ready.pop_front() {
                self.resume(id);
                continue;
            }

            // === STEP 4: Wait for the next timer or external event ===
            let external = self.external_possible();
            match self.timers.next_wake() {
                Some(wake_at) if self.clock.is_virtual() || !external => {
                    self.clock.wait_until(wake_at);
                }
                Some(wake_at) => {
                    let until_timer = wake_at.saturating_duration_since(self.clock.now());
                    self.wait_for_event(until_timer.min(self.config.max_idle_wait()));
                }
                None if external => {
                    self.wait_for_event(self.config.max_idle_wait());
                }
                None => {
                    return if done(self) {
                        DriveExit::Satisfied
                    } else {
                        tracing::debug!(tasks = self.tasks.len(), "scheduler idle");
                        DriveExit::Idle
                    };
                }
            }
        }
    }

    /// Whether an event can still arrive on the channel
    fn external_possible(&self) -> bool {
        self.outstanding_offloads > 0 || Arc::strong_count(&self.notifier_alive) > 1
    }

    fn wait_for_event(&mut self, timeout: Duration) {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => self.handle_event(event),
            Err(RecvTimeoutError::Timeout) => {}
            // The scheduler holds a sender, so this cannot happen
            Err(RecvTimeoutError::Disconnected) => {}
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn handle_event(&mut self, event: Event<T>) {
        let (id, delivered) = match event {
            Event::Notify { task, value } => (task, Ok(value)),
            Event::Offloaded { task, result } => {
                self.outstanding_offloads = self.outstanding_offloads.saturating_sub(1);
                (task, result.map_err(TaskError::Panicked))
            }
        };

        let Some(task) = self.tasks.get_mut(&id) else {
            tracing::debug!(task = %id, "event for unknown task dropped");
            return;
        };
        if task.state().is_terminal() {
            tracing::debug!(task = %id, "event for finished task dropped");
            return;
        }

        let waiting = task.suspend_reason() == Some(SuspendReason::Notify);
        if task.state() == TaskState::Suspended && waiting {
            self.deliver(id, delivered);
        } else {
            task.push_mail(delivered);
        }
    }

    /// Wake a task waiting on `Notify` with an event, or fail it if the
    /// event carries an error.
    fn deliver(&mut self, id: TaskId, event: Outcome<T>) {
        match event {
            Ok(value) => {
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.set_wakeup(Wakeup::Notified, Some(value));
                    self.ready.push_back(id);
                }
            }
            Err(err) => self.finish(id, Err(err)),
        }
    }

    fn fire_timers(&mut self) {
        if self.timers.is_empty() {
            return;
        }
        let now = self.clock.now();
        for id in self.timers.pop_due(now) {
            if let Some(task) = self.tasks.get_mut(&id) {
                if task.state() == TaskState::Suspended {
                    task.set_wakeup(Wakeup::TimerElapsed, None);
                    self.ready.push_back(id);
                }
            }
        }
    }

    /// Run one step of task `id`
    fn resume(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if task.state().is_terminal() || !task.start_step() {
            return;
        }
        let Some(mut job) = task.take_job() else {
            self.finish(id, Err(TaskError::raised("StateError", "task has no continuation")));
            return;
        };
        let (wakeup, notification) = task.take_wakeup();
        let resumption = task.resumptions();
        self.stats.resumptions += 1;

        tracing::trace!(task = %id, ?wakeup, resumption, "resuming task");

        let now = self.clock.now();
        let mut effects = Effects::default();
        let result = {
            let mut cx = StepContext::new(
                id,
                now,
                wakeup,
                notification,
                resumption,
                &self.tasks,
                &mut effects,
            );
            panic::catch_unwind(AssertUnwindSafe(|| job.resume(&mut cx)))
        };

        let step = match result {
            Ok(step) => step,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(task = %id, %message, "task panicked");
                Step::Failed(TaskError::Panicked(message))
            }
        };

        let Effects {
            spawns,
            cancels,
            offloads,
        } = effects;

        // Children first, so the step's own suspension can await them
        for (child, name, child_job) in spawns {
            self.insert_task(child, name, child_job);
        }

        if cancels.contains(&id) {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.request_cancel();
            }
        }

        self.apply_step(id, job, step, now);

        for target in cancels.into_iter().filter(|&target| target != id) {
            self.cancel_id(target);
        }
        for work in offloads {
            self.offload(id, work);
        }
    }

    fn apply_step(&mut self, id: TaskId, job: Box<dyn Job<T>>, step: Step<T>, now: Instant) {
        let reason = match step {
            Step::Done(value) => return self.finish(id, Ok(value)),
            Step::Failed(err) => return self.finish(id, Err(err)),
            Step::Suspend(reason) => reason,
        };

        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };

        // Deferred cancellation lands at the suspension point
        if task.cancel_requested() {
            return self.finish(id, Err(TaskError::Cancelled));
        }

        task.restore_job(job);
        task.suspend(reason);
        tracing::trace!(task = %id, ?reason, "task suspended");

        match reason {
            SuspendReason::Yield => {
                task.set_wakeup(Wakeup::Yielded, None);
                self.ready.push_back(id);
            }
            SuspendReason::Sleep(delay) => match now.checked_add(delay) {
                Some(wake_at) => self.timers.insert(wake_at, id),
                None => {
                    tracing::warn!(task = %id, ?delay, "sleep deadline out of range");
                    let err = TaskError::raised("OverflowError", "sleep deadline out of range");
                    self.finish(id, Err(err));
                }
            },
            SuspendReason::Until(wake_at) => {
                self.timers.insert(wake_at, id);
            }
            SuspendReason::Notify => {
                if let Some(event) = task.pop_mail() {
                    self.deliver(id, event);
                }
            }
            SuspendReason::Await(target) => {
                if target == id {
                    let err = TaskError::raised("AwaitError", "task cannot await itself");
                    self.finish(id, Err(err));
                    return;
                }
                match self.tasks.get_mut(&target) {
                    Some(other) if !other.state().is_terminal() => other.add_waiter(id),
                    _ => {
                        // Already finished or unknown: resume right away
                        if let Some(task) = self.tasks.get_mut(&id) {
                            task.set_wakeup(Wakeup::TaskFinished(target), None);
                        }
                        self.ready.push_back(id);
                    }
                }
            }
        }
    }

    fn offload(&mut self, id: TaskId, work: OffloadFn<T>) {
        if self.pool.is_none() {
            match BlockingPool::new(self.config.resolved_blocking_threads()) {
                Ok(pool) => self.pool = Some(pool),
                Err(err) => {
                    tracing::warn!(task = %id, %err, "failed to start blocking pool");
                    return self.finish(id, Err(TaskError::raised("IoError", err.to_string())));
                }
            }
        }
        let Some(pool) = &self.pool else {
            return;
        };

        let tx = self.event_tx.clone();
        let accepted = pool.execute(Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(work))
                .map_err(|payload| panic_message(payload.as_ref()));
            let _ = tx.send(Event::Offloaded { task: id, result });
        }));

        if accepted {
            self.outstanding_offloads += 1;
            tracing::trace!(task = %id, "work offloaded to blocking pool");
        } else {
            self.finish(id, Err(TaskError::SchedulerShutdown));
        }
    }

    // ========================================================================
    // Cancellation and shutdown
    // ========================================================================

    /// Cancel a task.
    ///
    /// A Pending or Suspended task is removed from whichever queue holds it
    /// and fails with `TaskError::Cancelled`. Returns false if the task is
    /// unknown or already terminal.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.cancel_id(handle.task_id())
    }

    fn cancel_id(&mut self, id: TaskId) -> bool {
        let (state, reason) = match self.tasks.get(&id) {
            Some(task) => (task.state(), task.suspend_reason()),
            None => return false,
        };

        match state {
            TaskState::Done | TaskState::Failed => false,
            TaskState::Running => {
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.request_cancel();
                }
                true
            }
            TaskState::Pending | TaskState::Suspended => {
                self.unschedule(id, reason);
                tracing::debug!(task = %id, "task cancelled");
                self.finish(id, Err(TaskError::Cancelled));
                true
            }
        }
    }

    /// Take a task out of the ready queue, the timer queue and any waiter list.
    fn unschedule(&mut self, id: TaskId, reason: Option<SuspendReason>) {
        self.ready.retain(|&queued| queued != id);
        self.timers.remove(id);
        if let Some(SuspendReason::Await(target)) = reason {
            if let Some(other) = self.tasks.get_mut(&target) {
                other.remove_waiter(id);
            }
        }
    }
}

impl<T> Scheduler<T> {
    /// Tear the scheduler down.
    ///
    /// Every non-terminal task fails with `TaskError::SchedulerShutdown`;
    /// results stay retrievable. Later submissions fail immediately.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let outstanding: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|task| !task.state().is_terminal())
            .map(|task| task.id())
            .collect();

        self.ready.clear();
        self.timers.clear();
        for id in &outstanding {
            self.finish(*id, Err(TaskError::SchedulerShutdown));
        }
        // Waiters were all failed above
        self.ready.clear();

        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
        self.outstanding_offloads = 0;

        if outstanding.is_empty() {
            tracing::debug!("scheduler shut down");
        } else {
            tracing::info!(
                failed = outstanding.len(),
                "scheduler shut down with outstanding tasks"
            );
        }
    }

    /// Record a terminal outcome and wake tasks awaiting this one.
    fn finish(&mut self, id: TaskId, outcome: Outcome<T>) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };

        let name = task.name().unwrap_or("");
        match &outcome {
            Ok(_) => tracing::debug!(task = %id, name, "task completed"),
            Err(err) => tracing::debug!(task = %id, name, %err, "task failed"),
        }

        let cancelled = matches!(outcome, Err(TaskError::Cancelled));
        let ok = outcome.is_ok();
        if !task.finish(outcome) {
            return;
        }
        if ok {
            self.stats.tasks_completed += 1;
        } else {
            self.stats.tasks_failed += 1;
        }
        if cancelled {
            self.stats.tasks_cancelled += 1;
        }

        self.wake_waiters(id);
    }

    /// Wake tasks waiting for a completed/failed task.
    fn wake_waiters(&mut self, id: TaskId) {
        let waiters = match self.tasks.get_mut(&id) {
            Some(task) => task.take_waiters(),
            None => return,
        };
        for waiter in waiters {
            if let Some(task) = self.tasks.get_mut(&waiter) {
                if task.state() == TaskState::Suspended {
                    task.set_wakeup(Wakeup::TaskFinished(id), None);
                    self.ready.push_back(waiter);
                }
            }
        }
    }
}

impl<T: Send + 'static> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Scheduler<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Best-effort text of a panic payload
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
