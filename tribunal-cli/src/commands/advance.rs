//! Advance command - start the next round after a revision request

use clap::Args;
use tribunal_core::{Advance, ProposalId};

use super::Session;

/// Open the next round if the latest one asked for revision
#[derive(Args, Debug)]
pub struct AdvanceArgs {
    /// Proposal name
    pub proposal: ProposalId,
}

impl AdvanceArgs {
    pub async fn execute(&self, config: &tribunal_core::Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;

        match session.coordinator.advance(&self.proposal).await? {
            Advance::Requested { round, requests } => {
                println!("Round {} requested for {}:", round, self.proposal);
                for request in &requests {
                    println!("  {}  task {}", request.name, request.task_id);
                }
            }
            Advance::ForceAccepted { round } => {
                println!(
                    "{} ran out of review rounds and was accepted after round {}",
                    self.proposal, round
                );
            }
            Advance::Unchanged(consensus) => {
                println!("Nothing to advance. {}: {}", self.proposal, consensus);
            }
        }

        Ok(())
    }
}
