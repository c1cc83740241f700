//! Name command - build and take apart review task names

use clap::{Args, Subcommand};
use tribunal_core::{Axis, ProposalId, ReviewTaskName};

/// Format or parse review task names
#[derive(Args, Debug)]
pub struct NameArgs {
    #[command(subcommand)]
    pub command: NameCommand,
}

#[derive(Subcommand, Debug)]
pub enum NameCommand {
    /// Print the review task name for a proposal, axis and round
    Format {
        /// Proposal name
        proposal: ProposalId,

        /// Axis letter (A, B or C)
        axis: Axis,

        /// Review round, starting at 1
        round: u32,
    },

    /// Split a review task name into its parts
    Parse {
        /// Review task name
        name: ReviewTaskName,
    },
}

impl NameArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            NameCommand::Format {
                proposal,
                axis,
                round,
            } => {
                println!("{}", proposal.review_name(*axis, *round)?);
            }
            NameCommand::Parse { name } => {
                println!("proposal: {}", name.proposal());
                println!("kind:     {}", name.proposal().kind().prefix());
                println!("number:   {}", name.proposal().number());
                println!("axis:     {} ({})", name.axis(), name.axis().label());
                println!("round:    {}", name.round());
            }
        }
        Ok(())
    }
}
