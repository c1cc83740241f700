//! Task Store over GitHub Issues

use std::future::Future;

use async_trait::async_trait;
use tracing::debug;
use tribunal_core::store::{TaskId, TaskStore};

use crate::{Error, GitHubClient, Result};

const PER_PAGE: u8 = 100;

/// Task Store keeping proposal and review tasks as labelled GitHub issues
#[derive(Debug)]
pub struct GitHubTaskStore {
    client: GitHubClient,
    label: String,
}

impl GitHubTaskStore {
    /// Store over `client`, tagging created issues with `label`
    pub fn new(client: GitHubClient, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
        }
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<u64> {
        debug!(title, label = %self.label, "Creating issue");

        let issue = self
            .client
            .client()
            .issues(self.client.owner(), self.client.repo())
            .create(title)
            .body(body)
            .labels(vec![self.label.clone()])
            .send()
            .await?;

        Ok(issue.number)
    }

    async fn issue_body(&self, number: u64) -> Result<String> {
        let issue = self
            .client
            .client()
            .issues(self.client.owner(), self.client.repo())
            .get(number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found") => {
                    Error::IssueNotFound(number)
                }
                _ => Error::Api(e),
            })?;

        Ok(issue.body.unwrap_or_default())
    }

    async fn comment(&self, number: u64, text: &str) -> Result<()> {
        self.client
            .client()
            .issues(self.client.owner(), self.client.repo())
            .create_comment(number, text)
            .await?;
        Ok(())
    }

    async fn comments(&self, number: u64) -> Result<Vec<String>> {
        let mut bodies = Vec::new();
        walk_pages(
            |page| self.comment_page(number, page),
            |comments: Vec<Option<String>>| {
                bodies.extend(comments.into_iter().flatten());
                None::<()>
            },
        )
        .await?;
        Ok(bodies)
    }

    async fn comment_page(&self, number: u64, page: u32) -> Result<Vec<Option<String>>> {
        let page = self
            .client
            .client()
            .issues(self.client.owner(), self.client.repo())
            .list_comments(number)
            .per_page(PER_PAGE)
            .page(page)
            .send()
            .await?;
        Ok(page.items.into_iter().map(|c| c.body).collect())
    }

    async fn find_issue(&self, title: &str) -> Result<Option<u64>> {
        walk_pages(
            |page| self.issue_page(page),
            |issues| find_titled(&issues, title),
        )
        .await
    }

    async fn issue_page(&self, page: u32) -> Result<Vec<Listed>> {
        let labels = vec![self.label.clone()];
        let issues_handler = self
            .client
            .client()
            .issues(self.client.owner(), self.client.repo());
        let page = issues_handler
            .list()
            .labels(&labels)
            .state(octocrab::params::State::All)
            .per_page(PER_PAGE)
            .page(page)
            .send()
            .await?;
        Ok(page.items.into_iter().map(Listed::from).collect())
    }
}

/// An issue as seen by title lookups
#[derive(Debug, Clone, PartialEq, Eq)]
struct Listed {
    number: u64,
    title: String,
    is_pull_request: bool,
}

impl From<octocrab::models::issues::Issue> for Listed {
    fn from(issue: octocrab::models::issues::Issue) -> Self {
        Self {
            number: issue.number,
            is_pull_request: issue.pull_request.is_some(),
            title: issue.title,
        }
    }
}

/// Number of the first real issue titled exactly `title`
fn find_titled(issues: &[Listed], title: &str) -> Option<u64> {
    issues
        .iter()
        .find(|i| !i.is_pull_request && i.title == title)
        .map(|i| i.number)
}

/// Fetch pages from 1 on until `visit` returns a value or a page comes back
/// short of [`PER_PAGE`]
async fn walk_pages<T, R, F, Fut, V>(mut fetch: F, mut visit: V) -> Result<Option<R>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
    V: FnMut(Vec<T>) -> Option<R>,
{
    let mut page = 1u32;
    loop {
        let items = fetch(page).await?;
        let full = items.len() >= usize::from(PER_PAGE);
        if let Some(found) = visit(items) {
            return Ok(Some(found));
        }
        if !full {
            return Ok(None);
        }
        page += 1;
    }
}

/// Issue number of a task id, accepting an optional leading `#`
fn issue_number(id: &TaskId) -> Result<u64> {
    id.as_str()
        .trim_start_matches('#')
        .parse()
        .map_err(|_| Error::Parse(format!("{} is not an issue number", id)))
}

#[async_trait]
impl TaskStore for GitHubTaskStore {
    async fn create_task(&self, title: &str, body: &str) -> tribunal_core::Result<TaskId> {
        let number = self.create_issue(title, body).await?;
        Ok(TaskId::new(number.to_string()))
    }

    async fn show_task(&self, id: &TaskId) -> tribunal_core::Result<String> {
        Ok(self.issue_body(issue_number(id)?).await?)
    }

    async fn add_comment(&self, id: &TaskId, text: &str) -> tribunal_core::Result<()> {
        Ok(self.comment(issue_number(id)?, text).await?)
    }

    async fn list_comments(&self, id: &TaskId) -> tribunal_core::Result<Vec<String>> {
        Ok(self.comments(issue_number(id)?).await?)
    }

    async fn find_task(&self, title: &str) -> tribunal_core::Result<Option<TaskId>> {
        Ok(self
            .find_issue(title)
            .await?
            .map(|number| TaskId::new(number.to_string())))
    }
}
