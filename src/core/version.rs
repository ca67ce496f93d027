//! Version and name formatting helpers.
//!
//! Branch, release, and channel names are pure string derivations from the
//! configuration template and a version or ticket; nothing here talks to a
//! remote service.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::config::ReleaseConfig;

/// Versions are four or five dot-separated numeric components.
static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\.?\d+){4,5}$").unwrap());

/// Ticket keys look like `EB-123`.
static TICKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z]+-\d+$").unwrap());

/// Extracts the ticket key from branch names like `feature-EB-123-some-slug`.
static BRANCH_TICKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]+-?/?([a-zA-Z]+-\d+).*").unwrap());

/// Check a full version number, e.g. `2024.31.5.02`.
pub fn is_valid_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

/// Check a ticket key, e.g. `EB-123`.
pub fn is_valid_ticket_key(key: &str) -> bool {
    TICKET_RE.is_match(key)
}

/// The version a release branch is named after: the first four components
/// with the last forced to `01`, so every fix release of a version maps to
/// the same branch.
pub fn release_branch_version(version: &str) -> String {
    let mut parts: Vec<&str> = version.split('.').take(4).collect();
    if let Some(last) = parts.last_mut() {
        *last = "01";
    }

    parts.join(".")
}

/// Release branch/channel base name from the configured template:
/// `prefix-main-version`.
pub fn release_name(release: &ReleaseConfig, version: &str) -> String {
    format!("{}-{}-{}", release.prefix, release.main, version)
}

/// Chat channel name for a release: lowercased, dots become dashes, and
/// truncated to the 21 characters channel names allow.
pub fn chat_channel_name(release_name: &str) -> String {
    let name: String = release_name.to_lowercase().replace('.', "-");
    name.chars().take(21).collect()
}

/// The next version to cut given the latest released tag: the third
/// component is bumped and the build component reset to `01`.
pub fn next_version(latest_tag: &str) -> Option<String> {
    if !is_valid_version(latest_tag) {
        return None;
    }

    let mut parts: Vec<String> = latest_tag.split('.').take(4).map(str::to_string).collect();
    let bump: u64 = parts.get(2)?.parse().ok()?;
    parts[2] = (bump + 1).to_string();
    parts[3] = "01".to_string();

    Some(parts.join("."))
}

/// Lowercase ASCII slug of a ticket summary, for branch names.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Branch slug for a ticket: `<KEY>-<slugified summary>`.
pub fn ticket_slug(key: &str, summary: &str) -> String {
    let slug = slugify(summary);
    if slug.is_empty() {
        key.to_string()
    } else {
        format!("{key}-{slug}")
    }
}

/// Pull the ticket key out of the current branch name, if it carries one.
pub fn ticket_key_from_branch(branch: &str) -> Option<String> {
    BRANCH_TICKET_RE.captures(branch).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release_config() -> ReleaseConfig {
        ReleaseConfig { prefix: "release".to_string(), main: "eb".to_string() }
    }

    #[test]
    fn version_validation() {
        assert!(is_valid_version("2024.31.5.02"));
        assert!(is_valid_version("1.2.3.4.5"));
        assert!(!is_valid_version("1.2.3"));
        assert!(!is_valid_version("1.2.3.4.5.6"));
        assert!(!is_valid_version("v1.2.3.4"));
        assert!(!is_valid_version(""));
    }

    #[test]
    fn ticket_key_validation() {
        assert!(is_valid_ticket_key("EB-123"));
        assert!(is_valid_ticket_key("man-7"));
        assert!(!is_valid_ticket_key("EB123"));
        assert!(!is_valid_ticket_key("123-EB"));
    }

    #[test]
    fn release_branch_version_forces_build_component() {
        assert_eq!(release_branch_version("2024.31.5.02"), "2024.31.5.01");
        assert_eq!(release_branch_version("2024.31.5.02.9"), "2024.31.5.01");
        assert_eq!(release_branch_version("1.2.3.4"), "1.2.3.01");
    }

    #[test]
    fn release_name_uses_template() {
        assert_eq!(release_name(&release_config(), "2024.31.5.01"), "release-eb-2024.31.5.01");
    }

    #[test]
    fn channel_name_is_lowercased_and_truncated() {
        let name = chat_channel_name("Release-EB-2024.31.5.01");
        assert_eq!(name, "release-eb-2024-31-5-");
        assert!(name.len() <= 21);
    }

    #[test]
    fn next_version_bumps_and_resets_build() {
        assert_eq!(next_version("2024.31.5.03").as_deref(), Some("2024.31.6.01"));
        assert_eq!(next_version("1.2.3.4.5").as_deref(), Some("1.2.4.01"));
        assert_eq!(next_version("not-a-version"), None);
    }

    #[test]
    fn slugify_summaries() {
        assert_eq!(slugify("Fix the Login Flow"), "fix-the-login-flow");
        assert_eq!(slugify("  weird -- punctuation!! "), "weird-punctuation");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn ticket_slug_includes_key() {
        assert_eq!(ticket_slug("EB-123", "Fix the Login Flow"), "EB-123-fix-the-login-flow");
        assert_eq!(ticket_slug("EB-123", "!!"), "EB-123");
    }

    #[test]
    fn ticket_key_from_branch_names() {
        assert_eq!(ticket_key_from_branch("feature-EB-123-fix-login").as_deref(), Some("EB-123"));
        assert_eq!(ticket_key_from_branch("hotfix/EB-9").as_deref(), Some("EB-9"));
        assert_eq!(ticket_key_from_branch("develop"), None);
    }
}
