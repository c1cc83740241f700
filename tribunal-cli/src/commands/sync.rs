//! Sync command - pick up votes posted on review tasks

use clap::Args;
use tribunal_core::ProposalId;

use super::Session;

/// Read tagged votes from the comments of pending review tasks
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Proposal name
    pub proposal: ProposalId,
}

impl SyncArgs {
    pub async fn execute(&self, config: &tribunal_core::Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;

        let votes = session.coordinator.sync_votes(&self.proposal).await?;
        if votes.is_empty() {
            println!("No new votes.");
        }
        for vote in &votes {
            match vote.reviewer {
                Some(ref reviewer) => {
                    println!("Recorded {} on {} by {}", vote.value, vote.request, reviewer)
                }
                None => println!("Recorded {} on {}", vote.value, vote.request),
            }
        }

        let consensus = session.coordinator.check_consensus(&self.proposal).await?;
        println!("{}: {}", self.proposal, consensus);
        Ok(())
    }
}
