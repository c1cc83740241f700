//! Task store backed by an issue-tracker command line tool
//!
//! Each operation runs the configured executable with an argument template.
//! Placeholders `{title}`, `{body}`, `{id}` and `{text}` are substituted per
//! argument; no shell is involved, so values are passed through verbatim.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{TaskId, TaskStore};
use crate::{Error, Result};

/// Argument templates for each tracker operation
///
/// Output contract:
/// - `create` prints the new task id as the last non-empty stdout line
/// - `show` prints the task content
/// - `list_comments` prints a JSON array of strings or of objects carrying
///   `text`, `body` or `content`
/// - `list` prints a JSON array of objects carrying `id` and `title`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandTemplates {
    pub create: Vec<String>,
    pub show: Vec<String>,
    pub comment: Vec<String>,
    pub list_comments: Vec<String>,
    pub list: Vec<String>,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        let args = |a: &[&str]| a.iter().map(|s| s.to_string()).collect();
        Self {
            create: args(&["create", "--title", "{title}", "--body", "{body}"]),
            show: args(&["show", "{id}"]),
            comment: args(&["comment", "{id}", "{text}"]),
            list_comments: args(&["comments", "{id}", "--json"]),
            list: args(&["list", "--json"]),
        }
    }
}

/// Task store that shells out to a tracker executable
#[derive(Debug, Clone)]
pub struct CliTaskStore {
    program: String,
    templates: CommandTemplates,
    timeout: Duration,
}

impl CliTaskStore {
    /// Create a store running `program` with the default templates
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            templates: CommandTemplates::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Use custom argument templates
    pub fn with_templates(mut self, templates: CommandTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Bound every invocation by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The executable being invoked
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run one templated invocation and return its stdout
    async fn run(&self, template: &[String], vars: &[(&str, &str)]) -> Result<String> {
        let args = render_args(template, vars);
        debug!(program = %self.program, ?args, "Invoking task tracker");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::TaskStoreUnavailable(format!(
                    "'{}' did not finish within {:?}",
                    self.program, self.timeout
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::TaskStoreUnavailable(format!(
                        "tracker executable '{}' not found",
                        self.program
                    ))
                } else {
                    Error::TaskStoreUnavailable(format!("failed to run '{}': {}", self.program, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                program = %self.program,
                status = ?output.status.code(),
                stderr = %stderr.trim(),
                "Task tracker command failed"
            );
            return Err(Error::TaskStoreUnavailable(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TaskStore for CliTaskStore {
    async fn create_task(&self, title: &str, body: &str) -> Result<TaskId> {
        let stdout = self
            .run(&self.templates.create, &[("title", title), ("body", body)])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(TaskId::from)
            .ok_or_else(|| {
                Error::TaskStoreUnavailable(format!("'{}' printed no task id", self.program))
            })
    }

    async fn show_task(&self, id: &TaskId) -> Result<String> {
        self.run(&self.templates.show, &[("id", id.as_str())]).await
    }

    async fn add_comment(&self, id: &TaskId, text: &str) -> Result<()> {
        self.run(&self.templates.comment, &[("id", id.as_str()), ("text", text)])
            .await?;
        Ok(())
    }

    async fn list_comments(&self, id: &TaskId) -> Result<Vec<String>> {
        let stdout = self
            .run(&self.templates.list_comments, &[("id", id.as_str())])
            .await?;
        parse_comments(&stdout)
    }

    async fn find_task(&self, title: &str) -> Result<Option<TaskId>> {
        let stdout = self.run(&self.templates.list, &[]).await?;
        find_in_listing(&stdout, title)
    }
}

/// Substitute `{name}` placeholders in every argument
fn render_args(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect()
}

fn malformed(what: &str, e: serde_json::Error) -> Error {
    Error::TaskStoreUnavailable(format!("unreadable {} output: {}", what, e))
}

/// Parse a JSON comment listing into comment texts
fn parse_comments(stdout: &str) -> Result<Vec<String>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(stdout).map_err(|e| malformed("comment", e))?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            serde_json::Value::String(text) => Some(text),
            serde_json::Value::Object(map) => ["text", "body", "content"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string),
            _ => None,
        })
        .collect())
}

/// Find the id of the task with exactly `title` in a JSON task listing
fn find_in_listing(stdout: &str, title: &str) -> Result<Option<TaskId>> {
    if stdout.trim().is_empty() {
        return Ok(None);
    }

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(stdout).map_err(|e| malformed("task listing", e))?;

    Ok(entries.iter().find_map(|entry| {
        if entry.get("title").and_then(|t| t.as_str()) != Some(title) {
            return None;
        }
        match entry.get("id")? {
            serde_json::Value::String(id) => Some(TaskId::new(id.clone())),
            serde_json::Value::Number(n) => Some(TaskId::new(n.to_string())),
            _ => None,
        }
    }))
}
