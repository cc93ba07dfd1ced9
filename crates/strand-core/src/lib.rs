//! Strand: a single-threaded cooperative task scheduler
//!
//! This crate provides:
//! - **Scheduler**: ready queue, timer queue and control loop (`scheduler` module)
//! - **Jobs**: the resumable unit of work and ready-made helpers (`job` module)
//! - **Wrappers**: logging, timing and repetition around any job (`wrap` module)
//! - **Registry**: name → job factory lookup (`registry` module)
//! - **Config**: TOML-loadable scheduler settings (`config` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_core::{job, Scheduler};
//! use std::time::Duration;
//!
//! let mut scheduler = Scheduler::new();
//! let slow = scheduler.submit(job::sleep_then(Duration::from_millis(20), || Ok("slow")));
//! let fast = scheduler.submit(job::sleep_then(Duration::from_millis(10), || Ok("fast")));
//!
//! let results = scheduler.run_until_complete(&[slow, fast])?;
//! assert_eq!(results, vec![Ok("slow"), Ok("fast")]);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod registry;
pub mod scheduler;
pub mod wrap;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use config::{ClockKind, RunPolicy, SchedulerConfig};
pub use error::{
    AggregateError, ConfigError, Outcome, RegistryError, SchedulerError, SchedulerResult, TaskError,
};
pub use registry::JobRegistry;
pub use scheduler::{
    BlockingPool, BlockingWork, Job, Notifier, Scheduler, SchedulerStats, Step, StepContext,
    SuspendReason, TaskHandle, TaskId, TaskState, TimerQueue, Wakeup,
};
pub use wrap::{JobExt, Logged, Repeat, Timed, TimingStats};
