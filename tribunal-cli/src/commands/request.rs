//! Request command - spawn reviewers for a proposal

use clap::Args;
use tribunal_core::{ProposalId, TaskId};

use super::Session;

/// Spawn one reviewer per axis for the next round of a proposal
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Proposal name, e.g. PROPOSAL-3 or FOLLOWUP_PROPOSAL-1
    pub proposal: ProposalId,

    /// Task Store id of the proposal task
    #[arg(short, long)]
    pub task: Option<String>,
}

impl RequestArgs {
    pub async fn execute(&self, config: &tribunal_core::Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;

        let task = match (&self.task, &session.dry_run) {
            (Some(task), _) => TaskId::new(task.clone()),
            (None, Some(memory)) => {
                memory.seed(&self.proposal.to_string(), "Dry run proposal")
            }
            (None, None) => anyhow::bail!("--task is required unless --store memory is used"),
        };

        let requests = match session.coordinator.request_review(&self.proposal, &task).await {
            Ok(requests) => requests,
            Err(e) if e.is_benign() => {
                eprintln!("Warning: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let round = requests.first().map(|r| r.round()).unwrap_or_default();
        println!("Review requested for {} (round {}):", self.proposal, round);
        for request in &requests {
            println!(
                "  {}  {:<13} task {}",
                request.name,
                request.axis().label(),
                request.task_id
            );
        }

        Ok(())
    }
}
