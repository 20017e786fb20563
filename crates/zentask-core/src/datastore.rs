use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::Task;

/// Name of the single durable key holding the task collection.
pub const TASKS_KEY: &str = "zentask-tasks";

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(format!("{TASKS_KEY}.json"));

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    /// Reads the persisted collection. A missing, unreadable or invalid
    /// value yields an empty collection; this never fails.
    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> Vec<Task> {
        match self.read_tasks() {
            Ok(Some(tasks)) => tasks,
            Ok(None) => {
                debug!(file = %self.tasks_path.display(), "no persisted tasks, starting empty");
                Vec::new()
            }
            Err(err) => {
                warn!(
                    file = %self.tasks_path.display(),
                    error = %format!("{err:#}"),
                    "persisted tasks are invalid, starting empty"
                );
                Vec::new()
            }
        }
    }

    /// Overwrites the persisted collection with `tasks`.
    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_json_atomic(&self.tasks_path, tasks)
            .with_context(|| format!("failed to save {TASKS_KEY}"))
    }

    /// The stored text as-is, if any.
    pub fn read_raw(&self) -> anyhow::Result<Option<String>> {
        if !self.tasks_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.tasks_path)
            .with_context(|| format!("failed reading {}", self.tasks_path.display()))?;
        Ok(Some(raw))
    }

    fn read_tasks(&self) -> anyhow::Result<Option<Vec<Task>>> {
        let Some(raw) = self.read_raw()? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let tasks = parse_tasks(&raw)
            .with_context(|| format!("failed parsing {}", self.tasks_path.display()))?;
        debug!(count = tasks.len(), "loaded tasks");
        Ok(Some(tasks))
    }
}

/// Deserializes and validates a stored collection.
pub fn parse_tasks(raw: &str) -> anyhow::Result<Vec<Task>> {
    let tasks: Vec<Task> = serde_json::from_str(raw)?;
    validate_tasks(&tasks)?;
    Ok(tasks)
}

fn validate_tasks(tasks: &[Task]) -> anyhow::Result<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for (idx, task) in tasks.iter().enumerate() {
        if task.id.trim().is_empty() {
            bail!("task {idx} has an empty id");
        }
        if task.text.trim().is_empty() {
            bail!("task {} has empty text", task.id);
        }
        if !seen.insert(task.id.as_str()) {
            bail!("duplicate task id: {}", task.id);
        }
    }
    Ok(())
}

#[tracing::instrument(skip(path, tasks))]
fn save_json_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving tasks atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string(tasks)?;
    temp.write_all(serialized.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
