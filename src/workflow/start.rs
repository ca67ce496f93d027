//! `start` commands: cut a feature, hotfix, releasefix, or release branch.

use crate::core::version::{
    chat_channel_name, is_valid_ticket_key, is_valid_version, next_version,
    release_branch_version,
};
use crate::git;
use crate::integrations::host::CreatedBranch;

use super::{
    resolve_release_version, FixKind, Services, WorkflowError, WorkflowResult, STATUS_IN_PROGRESS,
};

/// Start a fix branch for a ticket.
///
/// The ticket is fetched and its type validated before anything is created;
/// a type mismatch aborts with no side effects. The branch lands on the
/// fork, cut from the base the branch family calls for, and the ticket
/// moves to "In Progress". Re-running after the branch exists reports it
/// and leaves the ticket alone.
pub async fn start_fix(services: &Services, kind: FixKind, ticket_key: &str) -> WorkflowResult<()> {
    if !is_valid_ticket_key(ticket_key) {
        return Err(WorkflowError::InvalidTicket(ticket_key.to_string()));
    }

    let ticket = services.tracker.get_ticket(ticket_key).await?;
    if ticket.kind != kind.expected_kind() {
        return Err(WorkflowError::TicketTypeMismatch {
            key: ticket.key,
            expected: kind.prefix(),
            actual: ticket.type_name,
        });
    }

    let name = format!("{}-{}", kind.prefix(), ticket.slug());
    let outcome = create_fix_branch(services, kind, &name).await?;

    if outcome.created {
        println!("Branch: {name} created");
        println!("{}", outcome.branch.url);
        services.tracker.transition_ticket(ticket_key, STATUS_IN_PROGRESS).await?;
    } else {
        println!("Branch already started");
    }

    git::fetch("origin")?;
    git::checkout(&name)?;

    Ok(())
}

/// Create the branch on the fork from the base its family calls for:
/// `develop` for features, the latest release tag for hotfixes, and the
/// current release branch for releasefixes.
async fn create_fix_branch(
    services: &Services,
    kind: FixKind,
    name: &str,
) -> WorkflowResult<CreatedBranch> {
    match kind {
        FixKind::Feature => Ok(services.fork.create_branch(name, "develop").await?),
        FixKind::Hotfix => {
            let latest = services.mainline.latest_release().await?;
            tracing::debug!(tag = %latest.tag_name, "hotfix base");
            let sha = services.mainline.tag_sha(&latest.tag_name).await?;
            Ok(services.fork.create_branch_from_sha(name, &sha).await?)
        }
        FixKind::Releasefix => {
            let version = resolve_release_version(services, None).await?;
            let release_branch = services.release_branch(&version);
            let base = services.mainline.get_branch(&release_branch).await?;

            // Mirror the release branch onto the fork so the fix branch has
            // a base the contributor can push against.
            let mirrored = services
                .fork
                .create_branch_from_sha(&release_branch, &base.object.sha)
                .await?;
            if !mirrored.created {
                services.fork.update_branch(&release_branch, &base.object.sha).await?;
            }

            Ok(services.fork.create_branch_from_sha(name, &base.object.sha).await?)
        }
    }
}

/// Start a release: cut the release branch from `develop`, open the release
/// ticket, and announce the release channel.
///
/// With no version argument the next version is derived from the latest
/// release tag. A re-run that finds the branch already cut stops after
/// reporting it, so no duplicate release ticket is created.
pub async fn start_release(services: &Services, version: Option<&str>) -> WorkflowResult<()> {
    let version = match version {
        Some(v) if is_valid_version(v) => v.to_string(),
        Some(v) => return Err(WorkflowError::InvalidVersion(v.to_string())),
        None => {
            let latest = services.mainline.latest_release().await?;
            tracing::debug!(tag = %latest.tag_name, "deriving next version");
            next_version(&latest.tag_name).ok_or(WorkflowError::VersionRequired)?
        }
    };

    let branch_version = release_branch_version(&version);
    let name = services.release_branch(&version);

    let outcome = services.mainline.create_branch(&name, "develop").await?;

    if outcome.created {
        println!("Branch: {name} created");
    } else {
        println!("Branch: {name} already exists");
    }
    println!("{}", outcome.branch.url);
    println!("\tgit fetch --all && git checkout {name}");

    if !outcome.created {
        println!("Release already started; skipping the release ticket");
        return Ok(());
    }

    let changes = {
        git::fetch("mainline")?;
        let log = git::merge_log("mainline/master", &format!("mainline/{name}"))?;
        git::changelog(&log)
    };

    println!("Changelog:");
    println!("{}", changes.text);

    let (_, ticket_key) = services
        .tracker
        .create_release_ticket(
            &services.config.tracker.release_ticket_project,
            &services.config.tracker.release_ticket_type,
            &format!("Release {branch_version}"),
            &changes.text,
        )
        .await?;
    println!("Release ticket: {ticket_key}");

    for change in &changes.ticket_ids {
        if let Err(err) = services.tracker.link_tickets(change, &ticket_key).await {
            tracing::warn!(%err, "could not link {change} to {ticket_key}");
        }
    }

    announce_release(services, &name, &ticket_key, &changes.text).await;

    Ok(())
}

/// Best-effort release announcement: create the channel, invite the
/// configured group, and post the topic. Failures warn and never abort.
async fn announce_release(
    services: &Services,
    release_name: &str,
    ticket_key: &str,
    changelog_text: &str,
) {
    let channel_name = chat_channel_name(release_name);

    let channel = match services.chat.create_channel(&channel_name).await {
        // Notifications disabled: the no-op notifier reports no channel.
        Ok(id) if id.is_empty() => return,
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(%err, "could not create chat channel {channel_name}");
            eprintln!("warning: chat channel was not created: {err}");
            return;
        }
    };

    println!("Chat channel: #{channel_name}");

    let chat_config = services.config.chat.as_ref();
    let topic = chat_config
        .map(|c| c.topic_str.replace("{}", ticket_key))
        .unwrap_or_else(|| format!("Release Ticket: {ticket_key}"));

    if let Some(group_id) = chat_config.and_then(|c| c.group_id.as_deref()) {
        if let Err(err) = services.chat.invite(&channel, group_id).await {
            tracing::warn!(%err, "could not invite group {group_id} to {channel_name}");
            eprintln!("warning: chat invites were not sent: {err}");
        }
    }

    let text = format!("{topic}\n```\n{changelog_text}\n```");
    if let Err(err) = services.chat.post_topic(&channel, &topic, &text).await {
        tracing::warn!(%err, "could not post the release topic to {channel_name}");
        eprintln!("warning: release topic was not posted: {err}");
    }
}
