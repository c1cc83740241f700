//! Tribunal GitHub - GitHub Issues as a Task Store
//!
//! Proposal tasks and review tasks are GitHub issues; votes and
//! announcements are issue comments. Task ids are issue numbers.

mod client;
mod error;
mod store;

pub use client::GitHubClient;
pub use error::{Error, Result};
pub use store::GitHubTaskStore;
