//! In-process task store

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{TaskId, TaskStore};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Task {
    title: String,
    body: String,
    comments: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    tasks: Vec<(TaskId, Task)>,
    offline: bool,
    create_budget: Option<usize>,
}

/// Task store held in memory
///
/// Used for dry runs and tests. Ids are assigned sequentially as `T1`, `T2`,
/// and so on. The store can be switched offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

impl MemoryTaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Allow `n` more task creations, after which creation fails
    pub fn fail_creates_after(&self, n: usize) {
        self.lock().create_budget = Some(n);
    }

    /// Titles of all tasks, in creation order
    pub fn titles(&self) -> Vec<String> {
        self.lock().tasks.iter().map(|(_, t)| t.title.clone()).collect()
    }

    /// Insert a task directly, bypassing the offline switch
    pub fn seed(&self, title: &str, body: &str) -> TaskId {
        let mut inner = self.lock();
        Self::insert(&mut inner, title, body)
    }

    fn insert(inner: &mut Inner, title: &str, body: &str) -> TaskId {
        inner.next_id += 1;
        let id = TaskId::new(format!("T{}", inner.next_id));
        inner.tasks.push((
            id.clone(),
            Task {
                title: title.to_string(),
                body: body.to_string(),
                comments: Vec::new(),
            },
        ));
        id
    }

    fn task<'a>(inner: &'a mut Inner, id: &TaskId) -> Result<&'a mut Task> {
        inner
            .tasks
            .iter_mut()
            .find(|(task_id, _)| task_id == id)
            .map(|(_, task)| task)
            .ok_or_else(|| not_found(id))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-call; the tasks are still intact
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn online(&self) -> Result<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if inner.offline {
            return Err(Error::TaskStoreUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(inner)
    }
}

fn not_found(id: &TaskId) -> Error {
    Error::TaskStoreUnavailable(format!("task {} not found", id))
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_task(&self, title: &str, body: &str) -> Result<TaskId> {
        let mut inner = self.online()?;
        match inner.create_budget {
            Some(0) => {
                return Err(Error::TaskStoreUnavailable(format!(
                    "refused to create {}",
                    title
                )))
            }
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        Ok(Self::insert(&mut inner, title, body))
    }

    async fn show_task(&self, id: &TaskId) -> Result<String> {
        let mut inner = self.online()?;
        let task = Self::task(&mut inner, id)?;
        Ok(task.body.clone())
    }

    async fn add_comment(&self, id: &TaskId, text: &str) -> Result<()> {
        let mut inner = self.online()?;
        let task = Self::task(&mut inner, id)?;
        task.comments.push(text.to_string());
        Ok(())
    }

    async fn list_comments(&self, id: &TaskId) -> Result<Vec<String>> {
        let mut inner = self.online()?;
        let task = Self::task(&mut inner, id)?;
        Ok(task.comments.clone())
    }

    async fn find_task(&self, title: &str) -> Result<Option<TaskId>> {
        let inner = self.online()?;
        Ok(inner
            .tasks
            .iter()
            .find(|(_, task)| task.title == title)
            .map(|(id, _)| id.clone()))
    }
}
