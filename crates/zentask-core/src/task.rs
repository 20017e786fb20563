use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::due_date_serde;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow!("invalid priority: {other} (expected low, medium or high)")),
        }
    }
}

/// One persisted task record. Field names follow the stored JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub text: String,

    pub completed: bool,

    pub priority: Priority,

    /// Milliseconds since the Unix epoch.
    pub created_at: i64,

    #[serde(with = "due_date_serde")]
    pub due_date: NaiveDate,

    #[serde(default)]
    pub is_synced: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Task {
    /// Builds a pending task. `text` must already be trimmed and non-empty.
    pub fn new_pending(text: String, due_date: NaiveDate, priority: Priority, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            completed: false,
            priority,
            created_at: now.timestamp_millis(),
            due_date,
            is_synced: false,
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.completed
    }

    /// First characters of the id, as shown in listings.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}
