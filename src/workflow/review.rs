//! `review` commands: open a pull request for a fix branch.

use crate::core::version::{is_valid_ticket_key, ticket_key_from_branch};
use crate::git;

use super::{
    resolve_release_version, FixKind, Services, WorkflowError, WorkflowResult, STATUS_IN_REVIEW,
};

/// Open a pull request from a fix branch on the fork to its target base and
/// move the ticket to "In Review".
///
/// Without `-t` the ticket key is read from the current branch name. The
/// base is `develop` for features, `master` for hotfixes, and the release
/// branch (from `version` or the latest pre-release) for releasefixes.
pub async fn review_fix(
    services: &Services,
    kind: FixKind,
    ticket: Option<&str>,
    version: Option<&str>,
) -> WorkflowResult<()> {
    let key = resolve_ticket_key(ticket)?;

    let ticket = services.tracker.get_ticket(&key).await?;
    let branch = format!("{}-{}", kind.prefix(), ticket.slug());

    let base = match kind {
        FixKind::Feature => "develop".to_string(),
        FixKind::Hotfix => "master".to_string(),
        FixKind::Releasefix => {
            let version = resolve_release_version(services, version).await?;
            services.release_branch(&version)
        }
    };

    let title = format!("{} {}: {}", kind.display(), key, ticket.summary);

    // The local merge log makes a useful body but the review works without
    // a local checkout.
    let body = git::log_messages(&base).ok();

    let head = format!("{}:{}", services.config.repo.fork, branch);
    let pull = services.mainline.open_pull_request(&head, &base, &title, body.as_deref()).await?;

    println!("Pull request: {}", pull.html_url);

    services.tracker.transition_ticket(&key, STATUS_IN_REVIEW).await?;

    Ok(())
}

fn resolve_ticket_key(ticket: Option<&str>) -> WorkflowResult<String> {
    match ticket {
        Some(key) if is_valid_ticket_key(key) => Ok(key.to_string()),
        Some(key) => Err(WorkflowError::InvalidTicket(key.to_string())),
        None => {
            tracing::debug!("ticket not provided, searching the current branch");
            git::current_branch()
                .ok()
                .and_then(|branch| ticket_key_from_branch(&branch))
                .ok_or(WorkflowError::TicketRequired)
        }
    }
}
