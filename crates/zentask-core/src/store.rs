use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, instrument};

use crate::datastore::DataStore;
use crate::task::{Priority, Task};

/// Owns the task collection and writes it back after every mutation.
///
/// Order is most-recent-first by creation; derived views sort on their own.
/// Unknown ids are never an error: the mutation is skipped and `false`
/// (or `None`) is returned.
#[derive(Debug)]
pub struct TaskStore {
    datastore: DataStore,
    tasks: Vec<Task>,
}

impl TaskStore {
    /// Hydrates from the datastore; invalid persisted data starts empty.
    #[instrument(skip(datastore))]
    pub fn open(datastore: DataStore) -> Self {
        let tasks = datastore.load_tasks();
        info!(count = tasks.len(), "hydrated task store");
        Self { datastore, tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn datastore(&self) -> &DataStore {
        &self.datastore
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_pending()).count()
    }

    pub fn create(&mut self, text: &str, due_date: NaiveDate, priority: Priority) -> Option<Task> {
        self.create_at(text, due_date, priority, Utc::now())
    }

    /// Blank `text` creates nothing.
    #[instrument(skip(self, text, now))]
    pub fn create_at(
        &mut self,
        text: &str,
        due_date: NaiveDate,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Option<Task> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring create with blank text");
            return None;
        }

        let task = Task::new_pending(text.to_string(), due_date, priority, now);
        self.tasks.insert(0, task.clone());
        debug!(id = %task.id, count = self.tasks.len(), "task created");
        self.persist();
        Some(task)
    }

    pub fn toggle_completed(&mut self, id: &str) -> bool {
        self.toggle_completed_at(id, Utc::now())
    }

    #[instrument(skip(self, now))]
    pub fn toggle_completed_at(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("toggle ignored, no such task");
            return false;
        };

        task.completed = !task.completed;
        task.completed_at = task.completed.then(|| now.timestamp_millis());
        debug!(completed = task.completed, "task toggled");
        self.persist();
        true
    }

    #[instrument(skip(self))]
    pub fn mark_synced(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("mark synced ignored, no such task");
            return false;
        };
        if task.is_synced {
            return false;
        }

        task.is_synced = true;
        self.persist();
        true
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            debug!("delete ignored, no such task");
            return false;
        }

        self.persist();
        true
    }

    /// Finds the single task whose id starts with `prefix`.
    /// `Ok(None)` when nothing matches; an error when the prefix is ambiguous.
    pub fn resolve_prefix(&self, prefix: &str) -> anyhow::Result<Option<&Task>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(anyhow!("task id cannot be empty"));
        }
        if let Some(exact) = self.get(prefix) {
            return Ok(Some(exact));
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(prefix));
        let first = matches.next();
        if matches.next().is_some() {
            return Err(anyhow!("task id prefix is ambiguous: {prefix}"));
        }
        Ok(first)
    }

    fn persist(&self) {
        if let Err(err) = self.datastore.save_tasks(&self.tasks) {
            error!(error = %format!("{err:#}"), "failed to persist tasks");
        }
    }
}
