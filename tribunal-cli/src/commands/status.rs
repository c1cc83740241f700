//! Status command - show review rounds, votes and consensus

use chrono::Utc;
use clap::Args;
use tribunal_core::{Axis, ProposalId, ProposalReviewState};

use super::Session;

/// Show review state of one proposal, or a summary of all
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Proposal name (all proposals when omitted)
    pub proposal: Option<ProposalId>,
}

impl StatusArgs {
    pub async fn execute(&self, config: &tribunal_core::Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;
        let coordinator = &session.coordinator;

        let Some(ref proposal) = self.proposal else {
            let proposals = coordinator.proposals().await?;
            if proposals.is_empty() {
                println!("No proposals under review.");
            }
            for proposal in proposals {
                if let Some(state) = coordinator.status(&proposal).await? {
                    println!(
                        "{:<24} {:<28} {}",
                        proposal.to_string(),
                        state.status().to_string(),
                        state.consensus()
                    );
                }
            }
            return Ok(());
        };

        let Some(state) = coordinator.status(proposal).await? else {
            println!("{}: not requested", proposal);
            return Ok(());
        };

        print_state(&state);

        let overdue = coordinator.overdue(proposal, Utc::now()).await?;
        if !overdue.is_empty() {
            println!();
            println!(
                "Overdue (no vote after {}):",
                humantime::format_duration(coordinator.config().reviewer_timeout)
            );
            for request in &overdue {
                println!("  {} (task {})", request.name, request.task_id);
            }
        }

        Ok(())
    }
}

fn print_state(state: &ProposalReviewState) {
    println!("{} (task {})", state.proposal, state.proposal_task);
    println!("  Status:    {}", state.status());
    println!("  Consensus: {}", state.consensus());

    let Some(latest) = state.latest_round() else {
        return;
    };

    for round in 1..=latest {
        println!();
        println!("  Round {}:", round);
        for request in state.round_requests(round) {
            let verdict = match state.vote(&request.name) {
                Some(vote) => match vote.reviewer {
                    Some(ref reviewer) => format!("{} by {}", vote.value, reviewer),
                    None => vote.value.to_string(),
                },
                None => "pending".to_string(),
            };
            println!(
                "    {} {:<13} {:<8} {}",
                request.axis(),
                request.axis().label(),
                verdict,
                request.name
            );
        }
    }

    println!();
    let current: Vec<String> = Axis::ALL
        .iter()
        .map(|axis| match state.current_round(*axis) {
            Some(round) => format!("{}={}", axis, round),
            None => format!("{}=-", axis),
        })
        .collect();
    println!("  Current round per axis: {}", current.join(" "));
}
