//! Workflow orchestration.
//!
//! Each top-level command is a short fixed sequence of tracker, host, chat,
//! and local git calls. Sequences run strictly in order; the first failing
//! required step aborts the command and nothing already done is rolled back
//! - completed side effects are reported so the user can finish manually.
//! Remote-mutating steps are upsert-like where the API allows, so re-running
//! a partially completed command is safe.

pub mod local;
pub mod qa;
pub mod release;
pub mod review;
pub mod start;

use crate::core::config::Config;
use crate::core::version::{is_valid_version, release_branch_version, release_name};
use crate::git::GitError;
use crate::integrations::chat::{chat_notifier, ChatNotifier};
use crate::integrations::host::{HostClient, HostError};
use crate::integrations::tracker::{TicketKind, TrackerClient, TrackerError};

/// Ticket status a started branch moves its ticket to.
pub const STATUS_IN_PROGRESS: &str = "In Progress";
/// Ticket status a reviewed branch moves its ticket to.
pub const STATUS_IN_REVIEW: &str = "In Review";
/// Ticket status a published release moves its release ticket to.
pub const STATUS_DONE: &str = "Done";

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Error types for workflow orchestration.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("ticket {key} is a {actual} ticket, expected a {expected} ticket")]
    TicketTypeMismatch { key: String, expected: &'static str, actual: String },

    #[error("invalid ticket format: {0}")]
    InvalidTicket(String),

    #[error("invalid version format: {0}")]
    InvalidVersion(String),

    #[error("ticket id is required; pass -t or check out the ticket's branch")]
    TicketRequired,

    #[error("version is required and none could be derived from the latest release")]
    VersionRequired,

    #[error("could not determine the base branch, supply --base to continue")]
    UnknownBase,

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("method {0} requires an argument")]
    MissingArgument(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// The branch families `start` and `review` operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixKind {
    Feature,
    Hotfix,
    Releasefix,
}

impl FixKind {
    /// Branch name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Hotfix => "hotfix",
            Self::Releasefix => "releasefix",
        }
    }

    /// Display name used in pull request titles and error messages.
    pub fn display(self) -> &'static str {
        match self {
            Self::Feature => "Feature",
            Self::Hotfix => "Hotfix",
            Self::Releasefix => "ReleaseFix",
        }
    }

    /// The tracker ticket kind this branch family requires.
    pub fn expected_kind(self) -> TicketKind {
        match self {
            Self::Feature => TicketKind::Feature,
            Self::Hotfix => TicketKind::Hotfix,
            Self::Releasefix => TicketKind::Releasefix,
        }
    }
}

/// Host client targets for the `method` escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTarget {
    Mainline,
    Fork,
}

/// The clients a command orchestrates, built once per invocation from the
/// loaded configuration.
pub struct Services {
    pub config: Config,
    /// Host client for the upstream repository.
    pub mainline: HostClient,
    /// Host client for the contributor's fork.
    pub fork: HostClient,
    pub tracker: TrackerClient,
    pub chat: Box<dyn ChatNotifier>,
}

impl Services {
    /// Wire up all clients from the configuration.
    pub fn new(config: Config) -> Self {
        let mainline = HostClient::new(
            config.repo.token.as_str(),
            config.repo.owner.as_str(),
            config.repo.repo.as_str(),
        );
        let fork = HostClient::new(
            config.repo.token.as_str(),
            config.repo.fork.as_str(),
            config.repo.repo.as_str(),
        );
        let tracker = TrackerClient::new(
            config.tracker.base_url.as_str(),
            config.tracker.user.as_str(),
            config.tracker.token.as_str(),
        );
        let chat = chat_notifier(config.chat.as_ref());

        Self { config, mainline, fork, tracker, chat }
    }

    /// Release branch name for a full version number.
    pub fn release_branch(&self, version: &str) -> String {
        release_name(&self.config.release, &release_branch_version(version))
    }
}

/// Validate a version argument, or derive one from the latest pre-release
/// when it was omitted.
pub async fn resolve_release_version(
    services: &Services,
    version: Option<&str>,
) -> WorkflowResult<String> {
    match version {
        Some(v) if is_valid_version(v) => Ok(v.to_string()),
        Some(v) => Err(WorkflowError::InvalidVersion(v.to_string())),
        None => {
            tracing::debug!("version not provided, pulling the latest pre-release");
            let prerelease = services.mainline.latest_prerelease().await?;
            prerelease.map(|r| r.tag_name).ok_or(WorkflowError::VersionRequired)
        }
    }
}

/// Direct tracker method invocation, the escape hatch behind `octoeb jira`.
///
/// Shell tab-completion calls `get_my_ticket_ids` through this.
pub async fn call_tracker_method(
    services: &Services,
    method: &str,
    args: &[String],
) -> WorkflowResult<String> {
    let required = |index: usize| {
        args.get(index)
            .map(String::as_str)
            .ok_or_else(|| WorkflowError::MissingArgument(method.to_string()))
    };

    match method {
        "get_my_ticket_ids" | "my_ticket_ids" => {
            let filter = args
                .first()
                .map(String::as_str)
                .unwrap_or(services.config.tracker.ticket_filter_id.as_str());
            Ok(services.tracker.my_ticket_ids(filter).await?)
        }
        "get_my_tickets" | "my_tickets" => {
            let filter = args
                .first()
                .map(String::as_str)
                .unwrap_or(services.config.tracker.ticket_filter_id.as_str());
            let tickets = services.tracker.my_tickets(filter).await?;
            Ok(tickets
                .iter()
                .map(|t| qa::format_ticket(t, true))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "get_ticket" | "get_issue" => {
            let ticket = services.tracker.get_ticket(required(0)?).await?;
            Ok(qa::format_ticket(&ticket, true))
        }
        "get_issue_slug" => {
            let ticket = services.tracker.get_ticket(required(0)?).await?;
            Ok(ticket.slug())
        }
        other => Err(WorkflowError::UnknownMethod(other.to_string())),
    }
}

/// Direct host method invocation, the escape hatch behind `octoeb method`.
pub async fn call_host_method(
    services: &Services,
    target: HostTarget,
    method: &str,
    args: &[String],
) -> WorkflowResult<String> {
    let api = match target {
        HostTarget::Mainline => &services.mainline,
        HostTarget::Fork => &services.fork,
    };

    let required = |index: usize| {
        args.get(index)
            .map(String::as_str)
            .ok_or_else(|| WorkflowError::MissingArgument(method.to_string()))
    };

    match method {
        "get_branch" => {
            let branch = api.get_branch(required(0)?).await?;
            Ok(format!("{} {}", branch.ref_name, branch.object.sha))
        }
        "list_branches" => {
            let branches = api.list_branches(args.first().map(String::as_str)).await?;
            Ok(branches.iter().map(|b| b.name.as_str()).collect::<Vec<_>>().join("\n"))
        }
        "latest_release" => {
            let release = api.latest_release().await?;
            Ok(release.tag_name)
        }
        "latest_prerelease" => {
            let prerelease = api.latest_prerelease().await?;
            Ok(prerelease.map(|r| r.tag_name).unwrap_or_else(|| "none".to_string()))
        }
        "release_by_tag" | "get_release" => {
            let release = api.release_by_tag(required(0)?).await?;
            Ok(release
                .map(|r| format!("{} prerelease={}", r.tag_name, r.prerelease))
                .unwrap_or_else(|| "none".to_string()))
        }
        "compare" => {
            let comparison = api.compare(required(0)?, required(1)?).await?;
            Ok(format!(
                "{} (ahead {}, behind {})",
                comparison.status, comparison.ahead_by, comparison.behind_by
            ))
        }
        other => Err(WorkflowError::UnknownMethod(other.to_string())),
    }
}
