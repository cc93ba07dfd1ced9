//! Named job registry
//!
//! Maps names to factories that build a fresh job on every spawn. Used by
//! front-ends that pick jobs by name (e.g. the CLI's demo runner).

use crate::error::RegistryError;
use crate::scheduler::{Job, Scheduler, TaskHandle};
use std::collections::BTreeMap;

type Factory<T> = Box<dyn Fn() -> Box<dyn Job<T>>>;

struct Entry<T> {
    description: String,
    factory: Factory<T>,
}

/// Registry of job factories, keyed by name
pub struct JobRegistry<T> {
    entries: BTreeMap<String, Entry<T>>,
}

impl<T> Default for JobRegistry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> JobRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`.
    ///
    /// Fails if the name is already taken; the existing entry is kept.
    pub fn register<J, F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        J: Job<T> + 'static,
        F: Fn() -> J + 'static,
    {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        tracing::trace!(job = %name, "job registered");
        self.entries.insert(
            name,
            Entry {
                description: description.into(),
                factory: Box::new(move || Box::new(factory()) as Box<dyn Job<T>>),
            },
        );
        Ok(())
    }

    /// Build a fresh job for `name`
    pub fn build(&self, name: &str) -> Result<Box<dyn Job<T>>, RegistryError> {
        self.entries
            .get(name)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Description given at registration
    pub fn description(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.description.as_str())
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Send + 'static> JobRegistry<T> {
    /// Build the job registered as `name` and submit it, named after it
    pub fn spawn(
        &self,
        name: &str,
        scheduler: &mut Scheduler<T>,
    ) -> Result<TaskHandle, RegistryError> {
        let job = self.build(name)?;
        Ok(scheduler.submit_named(name, job))
    }
}
