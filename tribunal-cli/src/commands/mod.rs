//! CLI command implementations

pub mod advance;
pub mod name;
pub mod request;
pub mod status;
pub mod sync;
pub mod vote;

pub use advance::AdvanceArgs;
pub use name::NameArgs;
pub use request::RequestArgs;
pub use status::StatusArgs;
pub use sync::SyncArgs;
pub use vote::VoteArgs;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tribunal_core::{
    CliTaskStore, Config, MemoryStateStore, MemoryTaskStore, ReviewCoordinator, StateStore,
    StoreBackend, TaskStore,
};
use tribunal_db::Database;
use tribunal_github::{GitHubClient, GitHubTaskStore};

/// Coordinator wired to the configured backends
pub struct Session {
    pub coordinator: ReviewCoordinator,
    /// Set for the memory backend, where every run starts from scratch
    pub dry_run: Option<Arc<MemoryTaskStore>>,
}

impl Session {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let mut dry_run = None;

        let tasks: Arc<dyn TaskStore> = match config.store.backend {
            StoreBackend::Cli => Arc::new(
                CliTaskStore::new(&config.store.cli.program)
                    .with_templates(config.store.cli.templates.clone())
                    .with_timeout(config.store.timeout),
            ),
            StoreBackend::Github => {
                let repo = config
                    .store
                    .github
                    .repo
                    .as_deref()
                    .context("The github backend needs a repository (--repo or TRIBUNAL_GITHUB_REPO)")?;
                let client = GitHubClient::from_url(repo)?;
                Arc::new(GitHubTaskStore::new(client, &config.store.github.label))
            }
            StoreBackend::Memory => {
                let store = Arc::new(MemoryTaskStore::new());
                dry_run = Some(store.clone());
                store
            }
        };

        let states: Arc<dyn StateStore> = if dry_run.is_some() {
            Arc::new(MemoryStateStore::new())
        } else {
            let path = database_path(config)?;
            let db = Database::new(&path)
                .await
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            Arc::new(db.state_store())
        };

        let coordinator = ReviewCoordinator::new(tasks, states)
            .with_config(config.review.clone())
            .with_call_timeout(config.store.timeout);

        Ok(Self {
            coordinator,
            dry_run,
        })
    }
}

/// Review state database in use
pub fn database_path(config: &Config) -> anyhow::Result<PathBuf> {
    match config.state.database {
        Some(ref path) => Ok(path.clone()),
        None => Ok(Database::default_path()?),
    }
}
