//! Task structure and execution state

use crate::error::{Outcome, TaskError};
use crate::scheduler::StepContext;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Reason why a task is suspended
///
/// A step that cannot finish yet returns a suspension request telling the
/// scheduler what must happen before the task is resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// Go to the back of the ready queue
    Yield,

    /// Sleep for at least this long
    Sleep(Duration),

    /// Sleep until a specific time
    Until(Instant),

    /// Wait for an external event addressed to this task
    /// (a [`Notifier`](crate::Notifier) call or an offloaded closure)
    Notify,

    /// Wait until another task reaches a terminal state
    Await(TaskId),
}

/// Why a task is being resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// First resumption
    Started,
    /// Resumed after [`SuspendReason::Yield`]
    Yielded,
    /// A sleep elapsed
    TimerElapsed,
    /// An external event arrived; the payload is in
    /// [`StepContext::take_notification`]
    Notified,
    /// The awaited task finished (or did not exist)
    TaskFinished(TaskId),
}

/// What a single resumption of a job produced
#[derive(Debug)]
pub enum Step<T> {
    /// Finished with a value
    Done(T),
    /// Finished with an error
    Failed(TaskError),
    /// Not finished; resume when the condition holds
    Suspend(SuspendReason),
}

impl<T> Step<T> {
    /// Shorthand for `Step::Suspend(SuspendReason::Sleep(delay))`.
    pub fn sleep(delay: Duration) -> Self {
        Step::Suspend(SuspendReason::Sleep(delay))
    }

    /// Shorthand for `Step::Suspend(SuspendReason::Yield)`.
    pub fn yield_now() -> Self {
        Step::Suspend(SuspendReason::Yield)
    }

    /// Shorthand for `Step::Failed(TaskError::raised(kind, message))`.
    pub fn raise(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Step::Failed(TaskError::raised(kind, message))
    }

    /// Build a terminal step from an outcome.
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        match outcome {
            Ok(value) => Step::Done(value),
            Err(err) => Step::Failed(err),
        }
    }

    /// Whether the step ends the task.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Step::Suspend(_))
    }
}

/// A resumable computation.
///
/// The scheduler calls [`Job::resume`] each time the task is picked from the
/// ready queue. A job keeps whatever state it needs between resumptions.
pub trait Job<T> {
    /// Run until the next suspension point or until finished.
    fn resume(&mut self, cx: &mut StepContext<'_, T>) -> Step<T>;
}

impl<T> Job<T> for Box<dyn Job<T>> {
    fn resume(&mut self, cx: &mut StepContext<'_, T>) -> Step<T> {
        (**self).resume(cx)
    }
}

/// Unique identifier for a Task
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    /// Generate a new unique TaskId
    pub fn new() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Create a TaskId from a u64 value
    pub fn from_u64(id: u64) -> Self {
        TaskId(id)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a Task
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted, never resumed
    Pending,
    /// Currently executing a step
    Running,
    /// Waiting for its resume condition (or queued after it was met)
    Suspended,
    /// Completed with a value
    Done,
    /// Completed with an error
    Failed,
}

impl TaskState {
    /// Done or Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Pending and Suspended tasks may also go straight to Failed
    /// (cancellation, shutdown).
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Done)
                | (Running, Failed)
                | (Running, Suspended)
                | (Suspended, Running)
                | (Suspended, Failed)
        )
    }
}

/// Handle returned by `submit`, used to query, cancel or collect a task
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    task_id: TaskId,
}

impl TaskHandle {
    /// Create a new TaskHandle
    pub fn new(task_id: TaskId) -> Self {
        Self { task_id }
    }

    /// Get the task ID
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

/// Scheduler-owned record of one task
pub(crate) struct Task<T> {
    id: TaskId,
    name: Option<String>,
    state: TaskState,

    /// The continuation; taken out while a step runs, dropped once terminal
    job: Option<Box<dyn Job<T>>>,

    /// Result slot, moved out by `take_result`
    outcome: Option<Outcome<T>>,
    result_taken: bool,

    suspend_reason: Option<SuspendReason>,

    /// Why the next resumption happens, and its payload if any
    wakeup: Wakeup,
    notification: Option<T>,

    /// External events that arrived while the task was not waiting for one
    mailbox: VecDeque<Outcome<T>>,

    /// Tasks suspended on `Await(self.id)`
    waiters: Vec<TaskId>,

    /// Cancellation requested while Running; honoured at the next suspension
    cancel_requested: bool,

    resumptions: u64,
}

impl<T> Task<T> {
    pub(crate) fn new(id: TaskId, name: Option<String>, job: Box<dyn Job<T>>) -> Self {
        Self {
            id,
            name,
            state: TaskState::Pending,
            job: Some(job),
            outcome: None,
            result_taken: false,
            suspend_reason: None,
            wakeup: Wakeup::Started,
            notification: None,
            mailbox: VecDeque::new(),
            waiters: Vec::new(),
            cancel_requested: false,
            resumptions: 0,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn state(&self) -> TaskState {
        self.state
    }

    /// Move to `next` if the state machine allows it.
    pub(crate) fn transition(&mut self, next: TaskState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            tracing::warn!(
                task = %self.id,
                from = ?self.state,
                to = ?next,
                "rejected illegal task state transition"
            );
            false
        }
    }

    pub(crate) fn take_job(&mut self) -> Option<Box<dyn Job<T>>> {
        self.job.take()
    }

    pub(crate) fn restore_job(&mut self, job: Box<dyn Job<T>>) {
        self.job = Some(job);
    }

    pub(crate) fn suspend(&mut self, reason: SuspendReason) {
        if self.transition(TaskState::Suspended) {
            self.suspend_reason = Some(reason);
        }
    }

    pub(crate) fn suspend_reason(&self) -> Option<SuspendReason> {
        self.suspend_reason
    }

    /// Record why the next resumption happens and clear the suspension.
    pub(crate) fn set_wakeup(&mut self, wakeup: Wakeup, notification: Option<T>) {
        self.wakeup = wakeup;
        self.notification = notification;
        self.suspend_reason = None;
    }

    pub(crate) fn take_wakeup(&mut self) -> (Wakeup, Option<T>) {
        let wakeup = std::mem::replace(&mut self.wakeup, Wakeup::Started);
        (wakeup, self.notification.take())
    }

    /// Enter Running for one step.
    pub(crate) fn start_step(&mut self) -> bool {
        if self.transition(TaskState::Running) {
            self.resumptions += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn resumptions(&self) -> u64 {
        self.resumptions
    }

    /// Record the terminal outcome. Returns false if already terminal.
    pub(crate) fn finish(&mut self, outcome: Outcome<T>) -> bool {
        let next = if outcome.is_ok() {
            TaskState::Done
        } else {
            TaskState::Failed
        };
        if !self.transition(next) {
            return false;
        }
        self.outcome = Some(outcome);
        self.job = None;
        self.suspend_reason = None;
        self.notification = None;
        self.mailbox.clear();
        true
    }

    pub(crate) fn outcome(&self) -> Option<&Outcome<T>> {
        self.outcome.as_ref()
    }

    pub(crate) fn take_outcome(&mut self) -> Option<Outcome<T>> {
        let outcome = self.outcome.take();
        if outcome.is_some() {
            self.result_taken = true;
        }
        outcome
    }

    pub(crate) fn result_taken(&self) -> bool {
        self.result_taken
    }

    pub(crate) fn push_mail(&mut self, event: Outcome<T>) {
        self.mailbox.push_back(event);
    }

    pub(crate) fn pop_mail(&mut self) -> Option<Outcome<T>> {
        self.mailbox.pop_front()
    }

    pub(crate) fn add_waiter(&mut self, waiter: TaskId) {
        self.waiters.push(waiter);
    }

    pub(crate) fn remove_waiter(&mut self, waiter: TaskId) {
        self.waiters.retain(|&id| id != waiter);
    }

    pub(crate) fn take_waiters(&mut self) -> Vec<TaskId> {
        std::mem::take(&mut self.waiters)
    }

    pub(crate) fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job;

    fn create_test_task() -> Task<i32> {
        Task::new(TaskId::new(), None, Box::new(job::ready(42)))
    }

    #[test]
    fn test_task_id_uniqueness() {
        let id1 = TaskId::new();
        let id2 = TaskId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId::from_u64(12).to_string(), "12");
    }

    #[test]
    fn test_task_creation() {
        let task = create_test_task();
        assert_eq!(task.state(), TaskState::Pending);
        assert_eq!(task.resumptions(), 0);
        assert!(task.outcome().is_none());
        assert!(task.suspend_reason().is_none());
    }

    #[test]
    fn test_task_state_transitions() {
        let mut task = create_test_task();

        assert!(task.start_step());
        assert_eq!(task.state(), TaskState::Running);

        task.suspend(SuspendReason::Sleep(Duration::from_secs(1)));
        assert_eq!(task.state(), TaskState::Suspended);
        assert_eq!(
            task.suspend_reason(),
            Some(SuspendReason::Sleep(Duration::from_secs(1)))
        );

        task.set_wakeup(Wakeup::TimerElapsed, None);
        assert!(task.suspend_reason().is_none());

        assert!(task.start_step());
        assert_eq!(task.resumptions(), 2);
        assert!(task.finish(Ok(7)));
        assert_eq!(task.state(), TaskState::Done);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut task = create_test_task();
        task.start_step();
        task.finish(Err(TaskError::raised("ValueError", "nope")));

        assert_eq!(task.state(), TaskState::Failed);
        assert!(!task.start_step());
        assert!(!task.finish(Ok(1)));
        assert!(!task.transition(TaskState::Suspended));
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let mut task = create_test_task();
        assert!(task.finish(Err(TaskError::Cancelled)));
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[test]
    fn test_pending_cannot_complete_without_running() {
        let mut task = create_test_task();
        assert!(!task.finish(Ok(1)));
        assert_eq!(task.state(), TaskState::Pending);
    }

    #[test]
    fn test_take_outcome_once() {
        let mut task = create_test_task();
        task.start_step();
        task.finish(Ok(5));

        assert_eq!(task.take_outcome(), Some(Ok(5)));
        assert!(task.result_taken());
        assert_eq!(task.take_outcome(), None);
        assert_eq!(task.take_outcome(), None);
    }

    #[test]
    fn test_task_waiters() {
        let mut task = create_test_task();
        let waiter1 = TaskId::new();
        let waiter2 = TaskId::new();

        task.add_waiter(waiter1);
        task.add_waiter(waiter2);
        task.remove_waiter(waiter1);

        assert_eq!(task.take_waiters(), vec![waiter2]);
        assert!(task.take_waiters().is_empty());
    }

    #[test]
    fn test_mailbox_fifo() {
        let mut task = create_test_task();
        task.push_mail(Ok(1));
        task.push_mail(Ok(2));
        assert_eq!(task.pop_mail(), Some(Ok(1)));
        assert_eq!(task.pop_mail(), Some(Ok(2)));
        assert_eq!(task.pop_mail(), None);
    }

    #[test]
    fn test_can_transition_table() {
        use TaskState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Suspended.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Suspended));
        assert!(!Done.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Failed));
        assert!(Done.is_terminal());
        assert!(!Suspended.is_terminal());
    }

    #[test]
    fn test_task_handle() {
        let id = TaskId::new();
        let handle = TaskHandle::new(id);
        let copy = handle;
        assert_eq!(copy.task_id(), id);
    }
}
