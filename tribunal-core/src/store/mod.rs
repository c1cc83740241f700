//! Task Store abstraction
//!
//! The Task Store is the external issue tracker that holds proposal tasks,
//! review tasks and their comments. Tribunal only talks to it through this
//! trait; backends wrap a tracker CLI, the GitHub API, or process memory.

mod cli;
mod memory;

pub use cli::{CliTaskStore, CommandTemplates};
pub use memory::MemoryTaskStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Opaque task identifier assigned by the Task Store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap a tracker-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Operations Tribunal needs from the external task tracker
///
/// Every failure of the tracker itself must surface as
/// [`Error::TaskStoreUnavailable`](crate::Error::TaskStoreUnavailable).
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a task and return its identifier
    async fn create_task(&self, title: &str, body: &str) -> Result<TaskId>;

    /// Fetch the content of a task
    async fn show_task(&self, id: &TaskId) -> Result<String>;

    /// Append a comment to a task
    async fn add_comment(&self, id: &TaskId, text: &str) -> Result<()>;

    /// List the comments of a task, oldest first
    async fn list_comments(&self, id: &TaskId) -> Result<Vec<String>>;

    /// Find a task by exact title
    async fn find_task(&self, title: &str) -> Result<Option<TaskId>>;
}
