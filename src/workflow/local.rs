//! Local git bookkeeping commands: `sync`, `update`, and `changelog`.

use crate::git;

use super::{WorkflowError, WorkflowResult};

/// Sync the fork with the mainline: checkout each core branch, pull from
/// `mainline`, push to `origin`, then restore the original branch and any
/// stashed changes.
pub fn sync() -> WorkflowResult<()> {
    let original = git::current_branch()?;

    let stash = git::stash_create()?;
    if let Some(ref stash_ref) = stash {
        git::stash_store(stash_ref)?;
        git::reset_hard()?;
    }

    let result = (|| {
        for branch in ["master", "develop"] {
            tracing::debug!(branch, "syncing");
            git::checkout(branch)?;
            git::pull("mainline", branch)?;
            git::push("origin", branch, false)?;
        }
        git::checkout(&original)
    })();

    if stash.is_some() {
        if let Err(err) = git::stash_pop() {
            tracing::warn!(%err, "could not pop stashed changes");
        }
    }

    result.map_err(Into::into)
}

/// Rebase the current branch on the upstream copy of its base branch and
/// force-push the result to `origin`.
///
/// The base is inferred from the branch prefix (`feature` -> `develop`,
/// `hotfix` -> `master`); anything else needs an explicit `--base`. A
/// failed rebase is aborted and the original branch restored; stashed
/// changes are always popped.
pub fn update(base: Option<&str>) -> WorkflowResult<()> {
    let current = git::current_branch()?;

    let inferred = match current.split('-').next().unwrap_or_default() {
        "hotfix" => Some("master"),
        "feature" => Some("develop"),
        _ => None,
    };
    let base = base.or(inferred).ok_or(WorkflowError::UnknownBase)?;
    tracing::debug!(base, "updating from");

    let stash = git::stash_create()?;
    if let Some(ref stash_ref) = stash {
        git::stash_store(stash_ref)?;
        git::reset_hard()?;
    }

    let result = match git::pull_rebase("mainline", base) {
        Ok(()) => git::push("origin", &current, true),
        Err(err) => {
            // Leave the tree the way we found it before surfacing the error.
            if let Err(abort_err) = git::rebase_abort() {
                tracing::debug!(%abort_err, "no rebase to abort");
            }
            let _ = git::checkout(&current);
            Err(err)
        }
    };

    if stash.is_some() {
        if let Err(err) = git::stash_pop() {
            tracing::warn!(%err, "could not pop stashed changes");
        }
    }

    result.map_err(Into::into)
}

/// Print the changelog between `base` and `head` (the current branch when
/// `head` is empty).
pub fn changelog(base: &str, head: Option<&str>) -> WorkflowResult<()> {
    let log = git::merge_log(base, head.unwrap_or(""))?;
    let changes = git::changelog(&log);

    println!("Changelog:");
    println!("{}", changes.text);

    if !changes.ticket_ids.is_empty() {
        let ids: Vec<&str> = changes.ticket_ids.iter().map(String::as_str).collect();
        println!();
        println!("Tickets: {}", ids.join(" "));
    }

    Ok(())
}
