//! Local git operations.
//!
//! Everything here shells out to the system `git` in the current working
//! directory; the orchestrator assumes exclusive use of the checkout for
//! the duration of a command.

use std::collections::BTreeSet;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Error types for git operations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("`git {args}` failed with {code}: {stderr}")]
    Command { args: String, code: i32, stderr: String },

    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Run a git command and capture its trimmed stdout.
fn run(args: &[&str]) -> GitResult<String> {
    tracing::debug!(?args, "running git");

    let output = Command::new("git").args(args).output()?;

    if !output.status.success() {
        return Err(GitError::Command {
            args: args.join(" "),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn fetch(remote: &str) -> GitResult<()> {
    run(&["fetch", remote]).map(|_| ())
}

pub fn checkout(branch: &str) -> GitResult<()> {
    run(&["checkout", "-q", branch]).map(|_| ())
}

pub fn pull(remote: &str, branch: &str) -> GitResult<()> {
    run(&["pull", "-q", remote, branch]).map(|_| ())
}

pub fn pull_rebase(remote: &str, branch: &str) -> GitResult<()> {
    run(&["pull", "-r", remote, branch]).map(|_| ())
}

pub fn push(remote: &str, branch: &str, force: bool) -> GitResult<()> {
    if force {
        run(&["push", "-f", remote, branch]).map(|_| ())
    } else {
        run(&["push", remote, branch]).map(|_| ())
    }
}

pub fn rebase_abort() -> GitResult<()> {
    run(&["rebase", "--abort"]).map(|_| ())
}

pub fn reset_hard() -> GitResult<()> {
    run(&["reset", "--hard"]).map(|_| ())
}

/// Name of the currently checked out branch.
pub fn current_branch() -> GitResult<String> {
    run(&["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Create a stash commit without modifying the working tree; `None` when
/// there is nothing to stash.
pub fn stash_create() -> GitResult<Option<String>> {
    let stash_ref = run(&["stash", "create"])?;
    if stash_ref.is_empty() {
        Ok(None)
    } else {
        Ok(Some(stash_ref))
    }
}

pub fn stash_store(stash_ref: &str) -> GitResult<()> {
    run(&["stash", "store", "-q", stash_ref]).map(|_| ())
}

pub fn stash_pop() -> GitResult<()> {
    run(&["stash", "pop", "-q"]).map(|_| ())
}

/// Merge-only oneline log between `base` and `head`, the input for
/// changelog extraction.
pub fn merge_log(base: &str, head: &str) -> GitResult<String> {
    run(&["log", "--oneline", "--merges", &format!("{base}..{head}")])
}

/// Full commit messages on the current branch since `base`, used as pull
/// request bodies.
pub fn log_messages(base: &str) -> GitResult<String> {
    run(&["log", "--format=%B", &format!("{base}...")])
}

/// A changelog extracted from a merge log.
#[derive(Debug, Clone, Default)]
pub struct Changelog {
    /// Ticket keys referenced by the merged pull requests.
    pub ticket_ids: BTreeSet<String>,
    /// Rendered `* KEY : Title` lines, sorted and deduplicated.
    pub text: String,
}

static ISSUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)merge pull request #\d+ from [\w/]*(?:[/-]([a-z]+-\d+))").unwrap()
});

static CHANGELOG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)merge pull request #\d+ from [\w/]*(?:[/-]([a-z]{2,4}-\d+)-(.*))").unwrap()
});

/// Extract ticket keys and changelog lines from a merge log.
///
/// Merge subjects are expected to look like
/// `Merge pull request #17 from fork/feature-EB-123-some-slug`; the slug is
/// re-titled for display.
pub fn changelog(log: &str) -> Changelog {
    let ticket_ids: BTreeSet<String> =
        ISSUE_RE.captures_iter(log).map(|caps| caps[1].to_uppercase()).collect();

    let lines: BTreeSet<String> = CHANGELOG_RE
        .captures_iter(log)
        .map(|caps| {
            format!("* {} : {}", caps[1].to_uppercase(), title_case(&caps[2]))
        })
        .collect();

    let text = lines.into_iter().collect::<Vec<_>>().join("\n");

    Changelog { ticket_ids, text }
}

fn title_case(slug: &str) -> String {
    slug.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `work` with `name` checked out, then restore the original branch and
/// any stashed changes.
///
/// The current branch state, including staged and unstaged changes, is
/// stashed first; the named branch is checked out and updated from the
/// remote before `work` runs.
pub fn with_branch<T>(
    name: &str,
    remote: &str,
    work: impl FnOnce() -> GitResult<T>,
) -> GitResult<T> {
    let original = current_branch()?;

    let stash_ref = stash_create()?;
    if let Some(ref stash) = stash_ref {
        stash_store(stash)?;
        reset_hard()?;
    }

    let result = checkout(name).and_then(|()| {
        // The remote may be unreachable; working from the local tip is
        // still useful.
        if let Err(err) = pull(remote, name) {
            tracing::warn!(%err, "could not update {name} from {remote}");
        }
        work()
    });

    if let Err(err) = checkout(&original) {
        tracing::warn!(%err, "could not restore branch {original}");
    }
    if stash_ref.is_some() {
        if let Err(err) = stash_pop() {
            tracing::warn!(%err, "could not pop stashed changes");
        }
    }

    result
}
