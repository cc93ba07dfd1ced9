//! Built-in jobs runnable by name from the command line.
//!
//! Several jobs together reproduce a classic async walkthrough, e.g.
//! `strand run worker-a worker-b worker-c` or
//! `strand run --first fetch-google fetch-bing fetch-yahoo`.

use std::iter;
use std::time::Duration;
use strand_core::{
    job, Job, JobExt, JobRegistry, RegistryError, Repeat, Step, StepContext, SuspendReason,
    TaskError, TimingStats,
};

/// Build the registry of demo jobs.
///
/// Every job is wrapped so that its steps are logged under the job's name
/// and timed into `stats`.
pub fn registry(stats: &TimingStats) -> Result<JobRegistry<String>, RegistryError> {
    let mut registry = JobRegistry::new();

    for (name, who, secs) in [("greet-bob", "Bob", 2_000), ("greet-charlie", "Charlie", 1_000)] {
        let stats = stats.clone();
        registry.register(name, format!("Greet {who} after {}s", secs / 1000), move || {
            greet(who, Duration::from_millis(secs)).timed(stats.clone()).logged(name)
        })?;
    }

    for (name, label, secs) in [("worker-a", "A", 3), ("worker-b", "B", 1), ("worker-c", "C", 2)] {
        let stats = stats.clone();
        registry.register(name, format!("Worker {label}: {secs}s of simulated work"), move || {
            worker(label, Duration::from_secs(secs)).timed(stats.clone()).logged(name)
        })?;
    }

    for (name, url, secs) in [
        ("fetch-google", "google.com", 2),
        ("fetch-bing", "bing.com", 1),
        ("fetch-yahoo", "yahoo.com", 3),
    ] {
        let stats = stats.clone();
        registry.register(name, format!("Fetch {url} ({secs}s)"), move || {
            fetch(url, Duration::from_secs(secs)).timed(stats.clone()).logged(name)
        })?;
    }

    let timing = stats.clone();
    registry.register("db-resource", "Acquire, use and release a resource", move || {
        resource("DB_Connection").timed(timing.clone()).logged("db-resource")
    })?;

    let timing = stats.clone();
    let description = "Sum of squares below one million, on the blocking pool";
    registry.register("cpu-task", description, move || {
        cpu_task().timed(timing.clone()).logged("cpu-task")
    })?;

    let timing = stats.clone();
    registry.register("say-hello", "Say hello three times in a row", move || {
        Repeat::new(3, say_hello).timed(timing.clone()).logged("say-hello")
    })?;

    let timing = stats.clone();
    registry.register("chained", "Walk two sub-sequences, then finish", move || {
        chained().timed(timing.clone()).logged("chained")
    })?;

    let timing = stats.clone();
    registry.register("failing", "Raise a ValueError after one second", move || {
        job::sleep_then(Duration::from_secs(1), || -> Result<String, TaskError> {
            Err(TaskError::raised("ValueError", "Simulated error"))
        })
        .timed(timing.clone())
        .logged("failing")
    })?;

    Ok(registry)
}

fn greet(who: &'static str, delay: Duration) -> impl Job<String> {
    job::from_fn(move |cx: &mut StepContext<'_, String>| {
        if cx.resumption() == 1 {
            tracing::info!("Start greeting {}...", who);
            return Step::sleep(delay);
        }
        tracing::info!("Hello, {} after {:?}!", who, delay);
        Step::Done(format!("Greeting for {who} completed."))
    })
}

fn worker(label: &'static str, delay: Duration) -> impl Job<String> {
    job::from_fn(move |cx: &mut StepContext<'_, String>| {
        if cx.resumption() == 1 {
            tracing::info!("Worker {}: Starting work...", label);
            return Step::sleep(delay);
        }
        tracing::info!("Worker {}: Finished work after {:?}.", label, delay);
        Step::Done(format!("Worker {label} result"))
    })
}

fn fetch(url: &'static str, delay: Duration) -> impl Job<String> {
    job::from_fn(move |cx: &mut StepContext<'_, String>| {
        if cx.resumption() == 1 {
            tracing::info!("Fetching {}...", url);
            return Step::sleep(delay);
        }
        tracing::info!("Finished fetching {}.", url);
        Step::Done(format!("Data from {url}"))
    })
}

/// Resource lifecycle: setup, use, teardown, each taking some time
#[derive(Debug, Clone, Copy)]
enum Phase {
    Enter,
    Use,
    Exit,
    Closed,
}

fn resource(name: &'static str) -> impl Job<String> {
    let mut phase = Phase::Enter;
    let mut outcome = None;
    job::from_fn(move |_cx: &mut StepContext<'_, String>| match phase {
        Phase::Enter => {
            tracing::info!("Entering resource: {}", name);
            phase = Phase::Use;
            Step::sleep(Duration::from_millis(100))
        }
        Phase::Use => {
            tracing::info!("Using resource: {}", name);
            outcome = Some("Resource used successfully".to_string());
            phase = Phase::Exit;
            Step::sleep(Duration::from_millis(200))
        }
        Phase::Exit => {
            tracing::info!("Exiting resource: {}", name);
            phase = Phase::Closed;
            Step::sleep(Duration::from_millis(100))
        }
        Phase::Closed => match outcome.take() {
            Some(value) => Step::Done(value),
            None => Step::raise("StateError", "resource closed without being used"),
        },
    })
}

fn cpu_task() -> impl Job<String> {
    job::from_fn(|cx: &mut StepContext<'_, String>| {
        if cx.resumption() == 1 {
            tracing::info!("CPU task: Starting...");
            cx.offload(|| (0..1_000_000u64).map(|i| i * i).sum::<u64>().to_string());
            return Step::Suspend(SuspendReason::Notify);
        }
        match cx.take_notification() {
            Some(sum) => {
                tracing::info!("CPU task: Finished.");
                Step::Done(sum)
            }
            None => Step::raise("StateError", "woken without a result"),
        }
    })
}

fn say_hello() -> impl Job<String> {
    job::from_fn(|_cx: &mut StepContext<'_, String>| {
        tracing::info!("Hello!");
        Step::Done("Hello!".to_string())
    })
}

fn chained() -> impl Job<String> {
    let values = ["A1", "A2", "B1", "B2"];
    let steps = values
        .into_iter()
        .map(|value| {
            tracing::info!("Yielded {}", value);
            Step::yield_now()
        })
        .chain(iter::once_with(move || {
            tracing::info!("Yielded C1");
            Step::Done(format!("{} C1", values.join(" ")))
        }));
    job::from_iter(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::Scheduler;

    fn run(name: &str) -> Result<String, TaskError> {
        let stats = TimingStats::new();
        let registry = registry(&stats).unwrap();
        let mut scheduler = Scheduler::virtual_time();
        let handle = registry.spawn(name, &mut scheduler).unwrap();
        scheduler.run_until_complete(&[handle]).unwrap().remove(0)
    }

    #[test]
    fn test_registry_names_sorted() {
        let registry = registry(&TimingStats::new()).unwrap();
        let names: Vec<&str> = registry.names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"worker-a"));
        assert_eq!(registry.len(), 13);
    }

    #[test]
    fn test_worker_result() {
        assert_eq!(run("worker-b"), Ok("Worker B result".to_string()));
    }

    #[test]
    fn test_resource_lifecycle() {
        assert_eq!(run("db-resource"), Ok("Resource used successfully".to_string()));
    }

    #[test]
    fn test_say_hello_repeats() {
        assert_eq!(run("say-hello"), Ok("Hello!".to_string()));
    }

    #[test]
    fn test_chained_sequence() {
        assert_eq!(run("chained"), Ok("A1 A2 B1 B2 C1".to_string()));
    }

    #[test]
    fn test_failing_job() {
        let err = run("failing").unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn test_cpu_task_on_pool() {
        assert_eq!(run("cpu-task"), Ok("333332833333500000".to_string()));
    }

    #[test]
    fn test_jobs_are_timed() {
        let stats = TimingStats::new();
        let registry = registry(&stats).unwrap();
        let mut scheduler = Scheduler::virtual_time();
        let handle = registry.spawn("greet-charlie", &mut scheduler).unwrap();
        scheduler.run_until_complete(&[handle]).unwrap();
        assert_eq!(stats.steps(), 2);
    }
}
