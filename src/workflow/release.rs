//! Release publishing: pre-release tags for QA, the final release, and the
//! `versions` report.

use crate::core::version::{is_valid_version, release_branch_version};
use crate::git;
use crate::git::Changelog;

use super::{resolve_release_version, Services, WorkflowError, WorkflowResult, STATUS_DONE};

/// Publish a pre-release tag of the release branch for QA.
///
/// The tag body carries the changelog since `master`; when the release
/// ticket can be located, the body references it and the changelog tickets
/// are linked to it (best-effort per link).
pub async fn qa_tag(services: &Services, version: &str) -> WorkflowResult<()> {
    if !is_valid_version(version) {
        return Err(WorkflowError::InvalidVersion(version.to_string()));
    }

    let branch_version = release_branch_version(version);
    let name = services.release_branch(version);

    let changes = git::with_branch(&name, "mainline", || git::merge_log("master", &name))
        .map(|log| git::changelog(&log))?;

    let mut body = format!("**Changes:**\n{}", changes.text);

    let release_ticket = services
        .tracker
        .find_release_ticket(&services.config.tracker.release_ticket_project, &branch_version)
        .await
        .ok()
        .flatten();

    if let Some(ticket) = release_ticket {
        body.push_str(&format!("\n\nRelease ticket id: {}", ticket.key));

        println!("Linking changelog tickets to {}", ticket.key);
        for change in &changes.ticket_ids {
            if let Err(err) = services.tracker.link_tickets(change, &ticket.key).await {
                tracing::warn!(%err, "could not link {change} to {}", ticket.key);
            }
        }
    }

    let target = services.mainline.get_branch(&name).await?;
    let outcome = services
        .mainline
        .create_tag(version, &target.object.sha, &name, &body, true)
        .await?;

    if outcome.created {
        println!("Pre-release {version} published");
    } else {
        println!("Pre-release {version} already published");
    }

    Ok(())
}

/// Publish the final release: merge the release branch into `master`, tag
/// it, and close the release ticket.
///
/// With no version argument the latest pre-release (the QA'd candidate) is
/// released. An existing final tag is treated as success, so the command
/// can be re-run after a partial failure.
pub async fn publish_release(
    services: &Services,
    version: Option<&str>,
    verbose: bool,
) -> WorkflowResult<()> {
    let version = resolve_release_version(services, version).await?;
    let branch_version = release_branch_version(&version);
    let name = services.release_branch(&version);

    merge_release_branch(services, &name, &branch_version).await?;

    let changes = previous_release_changelog(services).await;
    let body = format!("**Changes:**\n{}", changes.text);
    if verbose {
        println!("{body}");
    }

    let master = services.mainline.get_branch("master").await?;
    let outcome = services
        .mainline
        .create_tag(&version, &master.object.sha, &name, &body, false)
        .await?;

    if outcome.created {
        println!("Release {version} published");
    } else {
        println!("Release {version} already published");
    }

    let release_ticket = services
        .tracker
        .find_release_ticket(&services.config.tracker.release_ticket_project, &branch_version)
        .await?;

    match release_ticket {
        Some(ticket) => {
            services.tracker.transition_ticket(&ticket.key, STATUS_DONE).await?;
            println!("Release ticket {} moved to {STATUS_DONE}", ticket.key);
        }
        None => println!("Release ticket not found; transition skipped"),
    }

    Ok(())
}

/// Merge the release branch into `master` unless it already is; a missing
/// release branch means a hotfix-style release that tags `master` directly.
async fn merge_release_branch(
    services: &Services,
    name: &str,
    branch_version: &str,
) -> WorkflowResult<()> {
    use crate::integrations::host::HostError;

    match services.mainline.compare("master", name).await {
        Ok(comparison) if matches!(comparison.status.as_str(), "identical" | "behind") => {
            println!("Release branch {name} already merged");
            Ok(())
        }
        Ok(_) => {
            let pull = services
                .mainline
                .open_pull_request(name, "master", &format!("Release {branch_version}"), None)
                .await?;
            services.mainline.merge_pull_request(pull.number).await?;
            println!("Merged {name} into master ({})", pull.html_url);
            Ok(())
        }
        Err(HostError::Api { status: 404, .. }) => {
            println!("No release branch {name}; tagging master directly");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Changelog between the previous release tag and `master`, best-effort:
/// a missing previous release or an unusable local checkout only costs the
/// release body its changes section.
async fn previous_release_changelog(services: &Services) -> Changelog {
    let previous = match services.mainline.latest_release().await {
        Ok(release) => release.tag_name,
        Err(err) => {
            tracing::warn!(%err, "no previous release for the changelog");
            return Changelog::default();
        }
    };

    let log = git::with_branch("master", "mainline", || git::merge_log(&previous, "master"));
    match log {
        Ok(log) => git::changelog(&log),
        Err(err) => {
            tracing::warn!(%err, "could not read the local merge log");
            Changelog::default()
        }
    }
}

/// Print the current release and pre-release versions on the host.
pub async fn versions(services: &Services) -> WorkflowResult<()> {
    let release = services.mainline.latest_release().await?;
    println!("Release: {}", release.tag_name);

    let prerelease = services.mainline.latest_prerelease().await?;
    match prerelease {
        Some(release) => println!("Pre-Release: {}", release.tag_name),
        None => println!("Pre-Release: none"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::config::{Config, ReleaseConfig, RepoConfig, TrackerConfig};
    use crate::integrations::chat::NoopNotifier;
    use crate::integrations::host::HostClient;
    use crate::integrations::tracker::TrackerClient;

    use super::*;

    fn mock_services(host: &mockito::Server, tracker: &mockito::Server) -> Services {
        let config = Config {
            repo: RepoConfig {
                owner: "enderlabs".to_string(),
                fork: "contributor".to_string(),
                repo: "eb".to_string(),
                token: "token".to_string(),
                user: "dev@example.com".to_string(),
            },
            tracker: TrackerConfig {
                base_url: tracker.url(),
                user: "dev@example.com".to_string(),
                token: "secret".to_string(),
                ticket_filter_id: "10101".to_string(),
                release_ticket_project: "MAN".to_string(),
                release_ticket_type: "RELEASE".to_string(),
            },
            chat: None,
            release: ReleaseConfig { prefix: "release".to_string(), main: "eb".to_string() },
        };

        Services {
            mainline: HostClient::new("token", "enderlabs", "eb").with_api_root(host.url()),
            fork: HostClient::new("token", "contributor", "eb").with_api_root(host.url()),
            tracker: TrackerClient::new(tracker.url(), "dev@example.com", "secret"),
            chat: Box::new(NoopNotifier),
            config,
        }
    }

    #[tokio::test]
    async fn qa_tag_rejects_a_malformed_version() {
        let host = mockito::Server::new_async().await;
        let tracker = mockito::Server::new_async().await;

        let services = mock_services(&host, &tracker);
        let err = qa_tag(&services, "not-a-version").await.unwrap_err();

        assert!(matches!(err, WorkflowError::InvalidVersion(_)));
    }

    #[tokio::test]
    async fn publish_release_tags_master_and_closes_the_ticket() {
        let mut host = mockito::Server::new_async().await;
        // The release branch is already merged, so no pull request is
        // opened.
        host.mock(
            "GET",
            "/repos/enderlabs/eb/compare/master...release-eb-2024.31.5.01",
        )
        .with_status(200)
        .with_body(r#"{ "status": "identical", "ahead_by": 0, "behind_by": 0 }"#)
        .create_async()
        .await;
        // No previous release: the changelog section stays empty.
        host.mock("GET", "/repos/enderlabs/eb/releases/latest")
            .with_status(404)
            .create_async()
            .await;
        host.mock("GET", "/repos/enderlabs/eb/git/refs/heads/master")
            .with_status(200)
            .with_body(
                r#"{ "ref": "refs/heads/master",
                     "url": "https://example.com/refs/heads/master",
                     "object": { "sha": "abc123" } }"#,
            )
            .create_async()
            .await;
        host.mock("GET", "/repos/enderlabs/eb/releases/tags/2024.31.5.02")
            .with_status(404)
            .create_async()
            .await;
        let tag = host
            .mock("POST", "/repos/enderlabs/eb/releases")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{ "tag_name": "2024.31.5.02",
                     "target_commitish": "abc123",
                     "prerelease": false }"#
                    .to_string(),
            ))
            .with_status(201)
            .with_body(r#"{ "tag_name": "2024.31.5.02", "prerelease": false }"#)
            .create_async()
            .await;

        let mut tracker = mockito::Server::new_async().await;
        tracker
            .mock("GET", "/rest/api/latest/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{ "issues": [{ "key": "MAN-42", "fields": {
                    "summary": "Release 2024.31.5.01",
                    "status": { "name": "Open" },
                    "issuetype": { "name": "RELEASE" }
                } }] }"#,
            )
            .create_async()
            .await;
        tracker
            .mock("GET", "/rest/api/latest/issue/MAN-42/transitions")
            .with_status(200)
            .with_body(r#"{ "transitions": [{ "id": "41", "to": { "name": "Done" } }] }"#)
            .create_async()
            .await;
        let transition = tracker
            .mock("POST", "/rest/api/latest/issue/MAN-42/transitions")
            .with_status(204)
            .create_async()
            .await;

        let services = mock_services(&host, &tracker);
        publish_release(&services, Some("2024.31.5.02"), false).await.unwrap();

        tag.assert_async().await;
        transition.assert_async().await;
    }

    #[tokio::test]
    async fn versions_reports_release_and_prerelease() {
        let mut host = mockito::Server::new_async().await;
        host.mock("GET", "/repos/enderlabs/eb/releases/latest")
            .with_status(200)
            .with_body(r#"{ "tag_name": "2024.31.5.02", "prerelease": false }"#)
            .create_async()
            .await;
        host.mock("GET", "/repos/enderlabs/eb/releases")
            .with_status(200)
            .with_body(r#"[{ "tag_name": "2024.31.6.01", "prerelease": true }]"#)
            .create_async()
            .await;

        let tracker = mockito::Server::new_async().await;

        let services = mock_services(&host, &tracker);
        versions(&services).await.unwrap();
    }
}
