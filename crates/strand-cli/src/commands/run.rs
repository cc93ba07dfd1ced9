//! `strand run`: spawn jobs by name and drive them to completion.

use crate::demos;
use anyhow::Context;
use std::path::{Path, PathBuf};
use strand_core::{
    ClockKind, Outcome, RunPolicy, Scheduler, SchedulerConfig, TaskHandle, TimingStats,
};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "strand.toml";

/// Options for `strand run`
pub struct RunArgs {
    pub jobs: Vec<String>,
    pub config: Option<PathBuf>,
    pub virtual_time: bool,
    pub fail_fast: bool,
    pub first: bool,
    pub json: bool,
}

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.virtual_time {
        config.clock = ClockKind::Virtual;
    }
    if args.fail_fast {
        config.policy = RunPolicy::FailFast;
    }
    tracing::debug!(?config, "scheduler config");

    let stats = TimingStats::new();
    let registry = demos::registry(&stats)?;
    let mut scheduler = Scheduler::with_config(config);

    let mut spawned: Vec<(&str, TaskHandle)> = Vec::with_capacity(args.jobs.len());
    for name in &args.jobs {
        let handle = registry.spawn(name, &mut scheduler)?;
        spawned.push((name.as_str(), handle));
    }
    let handles: Vec<TaskHandle> = spawned.iter().map(|&(_, handle)| handle).collect();

    let (finished, pending) = if args.first {
        let (done, pending) = scheduler.run_until_first(&handles)?;
        let finished = done
            .into_iter()
            .filter_map(|handle| Some((handle, scheduler.take_result(handle)?)))
            .collect::<Vec<_>>();
        (finished, pending)
    } else {
        let results = scheduler
            .run_until_complete(&handles)
            .context("run aborted")?;
        (handles.iter().copied().zip(results).collect(), Vec::new())
    };

    let name_of = |handle: TaskHandle| {
        spawned
            .iter()
            .find(|&&(_, h)| h == handle)
            .map(|&(name, _)| name)
            .unwrap_or("?")
    };

    let scheduler_stats = scheduler.stats();
    if args.json {
        let results: Vec<serde_json::Value> = finished
            .iter()
            .map(|(handle, outcome)| report_json(name_of(*handle), *handle, outcome))
            .collect();
        let pending: Vec<&str> = pending.iter().map(|&handle| name_of(handle)).collect();
        let summary = serde_json::json!({
            "results": results,
            "pending": pending,
            "steps": scheduler_stats.resumptions,
            "busy_us": stats.busy().as_micros() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let width = args.jobs.iter().map(String::len).max().unwrap_or(0);
        for (handle, outcome) in &finished {
            let name = name_of(*handle);
            match outcome {
                Ok(value) => println!("{:width$}  ok      {}", name, value, width = width),
                Err(err) => println!("{:width$}  failed  {}", name, err, width = width),
            }
        }
        if !pending.is_empty() {
            let names: Vec<&str> = pending.iter().map(|&handle| name_of(handle)).collect();
            println!("pending: {}", names.join(", "));
        }
        println!(
            "{} task(s), {} step(s), busy {:?}",
            scheduler_stats.tasks_spawned,
            scheduler_stats.resumptions,
            stats.busy()
        );
    }

    scheduler.shutdown();
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SchedulerConfig> {
    match path {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                tracing::debug!(path = DEFAULT_CONFIG, "using default config file");
                SchedulerConfig::from_file(default)
                    .with_context(|| format!("failed to load config from {}", DEFAULT_CONFIG))
            } else {
                Ok(SchedulerConfig::default())
            }
        }
    }
}

fn report_json(name: &str, handle: TaskHandle, outcome: &Outcome<String>) -> serde_json::Value {
    match outcome {
        Ok(value) => serde_json::json!({
            "job": name,
            "task": handle.task_id().as_u64(),
            "status": "ok",
            "value": value,
        }),
        Err(err) => serde_json::json!({
            "job": name,
            "task": handle.task_id().as_u64(),
            "status": "failed",
            "kind": err.kind(),
            "error": err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "clock = \"virtual\"").unwrap();
        writeln!(file, "blocking-threads = 1").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.clock, ClockKind::Virtual);
        assert_eq!(config.blocking_threads, 1);
    }

    #[test]
    fn test_load_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max-idle-wait-ms = 0").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn test_report_json_failed() {
        let handle = TaskHandle::new(strand_core::TaskId::from_u64(3));
        let outcome: Outcome<String> = Err(strand_core::TaskError::raised("ValueError", "bad"));
        let value = report_json("failing", handle, &outcome);
        assert_eq!(value["status"], "failed");
        assert_eq!(value["kind"], "ValueError");
        assert_eq!(value["task"], 3);
    }
}
