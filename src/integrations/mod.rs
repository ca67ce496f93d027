//! External service integrations.
//!
//! REST clients for the issue tracker, the source host, and the optional
//! chat notification service.

pub mod chat;
pub mod host;
pub mod tracker;

pub use chat::{chat_notifier, ChatError, ChatNotifier, ChatResult, NoopNotifier, SlackNotifier};
pub use host::{
    Branch, BranchRef, Comparison, CreatedBranch, HostClient, HostError, HostResult, PullRequest,
    Release, TaggedRelease,
};
pub use tracker::{Ticket, TicketKind, TrackerClient, TrackerError, TrackerResult};
