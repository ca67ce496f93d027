//! # OctoEB
//!
//! OctoEB automates a Gitflow-style branching and release workflow by
//! orchestrating the source host, the issue tracker, and an optional chat
//! service. One command starts feature/hotfix/release branches, moves
//! tickets through QA, and cuts releases, instead of manual git and web-UI
//! steps.
//!
//! ## Configuration
//!
//! The tool reads an ini-style `.octoebrc` from the current directory, the
//! platform config directory, or the home directory:
//!
//! ```ini
//! [repo]
//! OWNER=repo-owner
//! FORK=fork-repo-owner
//! REPO=repo-name
//! TOKEN=oauth-token
//! USER=email@test.com
//!
//! [bugtracker]
//! BASE_URL=https://tracker.example.com
//! USER=email@test.com
//! TOKEN=api-token
//! TICKET_FILTER_ID=10101
//! ```
//!
//! ## Usage
//!
//! The major commands are `start`, `review`, `qa`, and `release`; run
//! `octoeb <command> --help` for details.

#![forbid(unsafe_code)]

pub mod core;
pub mod git;
pub mod integrations;
pub mod workflow;

pub use crate::core::config::{Config, ConfigError};
pub use integrations::{
    chat_notifier, ChatError, ChatNotifier, HostClient, HostError, Ticket, TicketKind,
    TrackerClient, TrackerError,
};
pub use workflow::{FixKind, Services, WorkflowError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "octoeb";
