//! Vote command - record a reviewer's verdict

use clap::Args;
use tribunal_core::{ReviewTaskName, Vote, VoteValue};

use super::Session;

/// Record the vote of one reviewer
#[derive(Args, Debug)]
pub struct VoteArgs {
    /// Review task name, e.g. PROPOSAL-3-REVIEW-B-2
    pub review: ReviewTaskName,

    /// ACCEPT or REVISE
    pub value: VoteValue,

    /// Who cast the vote
    #[arg(short, long)]
    pub reviewer: Option<String>,

    /// Short reason
    #[arg(short, long)]
    pub note: Option<String>,
}

impl VoteArgs {
    pub async fn execute(&self, config: &tribunal_core::Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;

        let mut vote = Vote::new(self.review.clone(), self.value);
        vote.reviewer = self.reviewer.clone();
        vote.note = self.note.clone();

        match session.coordinator.cast(vote).await {
            Ok(vote) => println!("Recorded {} on {}", vote.value, vote.request),
            Err(e) if e.is_benign() => {
                eprintln!("Warning: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let consensus = session
            .coordinator
            .check_consensus(self.review.proposal())
            .await?;
        println!("{}: {}", self.review.proposal(), consensus);

        Ok(())
    }
}
