//! Task scheduler: single control thread, cooperative tasks
//!
//! The scheduler owns every task and runs one step at a time. Tasks suspend
//! only at explicit points (sleep, yield, external event, await). Blocking
//! work goes to a separate pool whose completions come back as events.

mod context;
mod pool;
#[allow(clippy::module_inception)]
mod scheduler;
mod task;
mod timer;

pub use context::StepContext;
pub use pool::{BlockingPool, BlockingWork};
pub use scheduler::{Notifier, Scheduler, SchedulerStats};
pub use task::{Job, Step, SuspendReason, TaskHandle, TaskId, TaskState, Wakeup};
pub use timer::TimerQueue;
