//! What a job sees while one of its steps runs.
//!
//! Jobs cannot touch the scheduler directly: the scheduler is busy running
//! them. Requests made through the context (spawn, cancel, offload) are
//! recorded and applied by the scheduler as soon as the step returns.

use crate::error::TaskError;
use crate::scheduler::task::Task;
use crate::scheduler::{Job, TaskHandle, TaskId, TaskState, Wakeup};
use rustc_hash::FxHashMap;
use std::time::Instant;

/// Closure run on the blocking pool on behalf of a task
pub(crate) type OffloadFn<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Requests recorded during one step
pub(crate) struct Effects<T> {
    pub(crate) spawns: Vec<(TaskId, Option<String>, Box<dyn Job<T>>)>,
    pub(crate) cancels: Vec<TaskId>,
    pub(crate) offloads: Vec<OffloadFn<T>>,
}

impl<T> Default for Effects<T> {
    fn default() -> Self {
        Self {
            spawns: Vec::new(),
            cancels: Vec::new(),
            offloads: Vec::new(),
        }
    }
}

/// Context passed to [`Job::resume`]
pub struct StepContext<'a, T> {
    id: TaskId,
    now: Instant,
    wakeup: Wakeup,
    notification: Option<T>,
    resumption: u64,
    tasks: &'a FxHashMap<TaskId, Task<T>>,
    effects: &'a mut Effects<T>,
}

impl<'a, T> StepContext<'a, T> {
    pub(crate) fn new(
        id: TaskId,
        now: Instant,
        wakeup: Wakeup,
        notification: Option<T>,
        resumption: u64,
        tasks: &'a FxHashMap<TaskId, Task<T>>,
        effects: &'a mut Effects<T>,
    ) -> Self {
        Self {
            id,
            now,
            wakeup,
            notification,
            resumption,
            tasks,
            effects,
        }
    }

    /// ID of the running task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Handle of the running task
    pub fn handle(&self) -> TaskHandle {
        TaskHandle::new(self.id)
    }

    /// Scheduler clock reading taken just before this step
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Why this step is running
    pub fn wakeup(&self) -> Wakeup {
        self.wakeup
    }

    /// 1 for the first step, then incremented on every resumption
    pub fn resumption(&self) -> u64 {
        self.resumption
    }

    /// Payload of the external event that woke this step, if any
    pub fn take_notification(&mut self) -> Option<T> {
        self.notification.take()
    }

    /// Submit a child task; it is queued as soon as this step returns.
    pub fn spawn(&mut self, job: impl Job<T> + 'static) -> TaskHandle {
        self.spawn_inner(None, Box::new(job))
    }

    /// Submit a named child task.
    pub fn spawn_named(
        &mut self,
        name: impl Into<String>,
        job: impl Job<T> + 'static,
    ) -> TaskHandle {
        self.spawn_inner(Some(name.into()), Box::new(job))
    }

    fn spawn_inner(&mut self, name: Option<String>, job: Box<dyn Job<T>>) -> TaskHandle {
        let id = TaskId::new();
        self.effects.spawns.push((id, name, job));
        TaskHandle::new(id)
    }

    /// Cancel a task once this step returns.
    ///
    /// Cancelling the running task itself takes effect at its next
    /// suspension point; if this step finishes the task, the result stands.
    pub fn cancel(&mut self, handle: TaskHandle) {
        self.effects.cancels.push(handle.task_id());
    }

    /// Run `work` on the blocking pool.
    ///
    /// The returned value arrives as an external event for this task; return
    /// `Step::Suspend(SuspendReason::Notify)` to wait for it.
    pub fn offload<F>(&mut self, work: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.effects.offloads.push(Box::new(work));
    }

    /// Current state of another task (children spawned in this step are not
    /// visible until it returns)
    pub fn state_of(&self, handle: TaskHandle) -> Option<TaskState> {
        self.tasks.get(&handle.task_id()).map(|task| task.state())
    }

    /// Peek at a finished task's result without taking it
    pub fn outcome_of(&self, handle: TaskHandle) -> Option<Result<&T, &TaskError>> {
        self.tasks
            .get(&handle.task_id())
            .and_then(|task| task.outcome())
            .map(|outcome| outcome.as_ref())
    }
}
