//! Issue tracker integration.
//!
//! Wraps the tracker's REST API (Jira-compatible, `rest/api/latest`) for
//! fetching tickets, searching saved filters, transitioning statuses, and
//! creating release tickets.

use serde::Deserialize;

use crate::core::version::ticket_slug;

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Error types for tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("tracker API error (status: {status}): {body}")]
    Api { status: u16, body: String },

    #[error("no transition to '{target}' available for {key}")]
    NoTransition { key: String, target: String },
}

/// The ticket categories the workflow branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Feature,
    Hotfix,
    Release,
    Releasefix,
    Other,
}

impl TicketKind {
    /// Map a tracker issue type name onto a workflow category.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "feature" => Self::Feature,
            "hotfix" => Self::Hotfix,
            "release" => Self::Release,
            "releasefix" => Self::Releasefix,
            _ => Self::Other,
        }
    }
}

/// A tracker ticket, as much of it as the workflow needs.
#[derive(Debug, Clone)]
pub struct Ticket {
    /// Ticket key, e.g. `EB-123`.
    pub key: String,
    /// One-line summary.
    pub summary: String,
    /// Current status name, e.g. `In Progress`.
    pub status: String,
    /// Workflow category parsed from the issue type.
    pub kind: TicketKind,
    /// Raw issue type name as the tracker reports it.
    pub type_name: String,
    /// Assignee display name, when assigned.
    pub assignee: Option<String>,
}

impl Ticket {
    /// Branch slug for this ticket: `<KEY>-<slugified summary>`.
    pub fn slug(&self) -> String {
        ticket_slug(&self.key, &self.summary)
    }
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
}

#[derive(Debug, Deserialize)]
struct RawFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<RawNamed>,
    #[serde(default)]
    issuetype: Option<RawNamed>,
    #[serde(default)]
    assignee: Option<RawAssignee>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawAssignee {
    #[serde(rename = "displayName")]
    display_name: String,
}

impl From<RawIssue> for Ticket {
    fn from(raw: RawIssue) -> Self {
        let type_name = raw.fields.issuetype.map(|t| t.name).unwrap_or_default();
        Self {
            key: raw.key,
            summary: raw.fields.summary.unwrap_or_default(),
            status: raw.fields.status.map(|s| s.name).unwrap_or_default(),
            kind: TicketKind::from_name(&type_name),
            type_name,
            assignee: raw.fields.assignee.map(|a| a.display_name),
        }
    }
}

/// Issue tracker API client.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    /// Instance base URL, without a trailing slash
    base: String,
    /// Login user for basic auth
    user: String,
    /// API token
    token: String,
    /// HTTP client
    client: reqwest::Client,
}

impl TrackerClient {
    /// Create a new tracker client.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        Self { base, user: user.into(), token: token.into(), client: reqwest::Client::new() }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api/latest/{}", self.base, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.token))
            .header("Accept", "application/json")
    }

    async fn check(&self, response: reqwest::Response) -> TrackerResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TrackerError::Api { status: status.as_u16(), body })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> TrackerResult<T> {
        let url = self.api_url(path);
        tracing::debug!(%url, "tracker GET");

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> TrackerResult<Option<serde_json::Value>> {
        let url = self.api_url(path);
        tracing::debug!(%url, "tracker POST");

        let response = self.request(reqwest::Method::POST, &url).json(body).send().await?;
        let response = self.check(response).await?;

        // Some endpoints (transitions) reply 204 with no body.
        Ok(response.json().await.ok())
    }

    /// Fetch a single ticket by key.
    pub async fn get_ticket(&self, key: &str) -> TrackerResult<Ticket> {
        let raw: RawIssue = self.get_json(&format!("issue/{key}")).await?;
        Ok(raw.into())
    }

    /// Tickets matched by the user's saved filter.
    ///
    /// The filter's stored JQL is fetched first, then executed through the
    /// search endpoint.
    pub async fn my_tickets(&self, filter_id: &str) -> TrackerResult<Vec<Ticket>> {
        #[derive(Deserialize)]
        struct Filter {
            jql: String,
        }

        #[derive(Deserialize)]
        struct SearchResults {
            issues: Vec<RawIssue>,
        }

        let filter: Filter = self.get_json(&format!("filter/{filter_id}")).await?;
        let results: SearchResults =
            self.get_json(&format!("search?jql={}", urlencoding::encode(&filter.jql))).await?;

        Ok(results.issues.into_iter().map(Ticket::from).collect())
    }

    /// Space-joined ticket keys from the saved filter, for shell completion.
    pub async fn my_ticket_ids(&self, filter_id: &str) -> TrackerResult<String> {
        let tickets = self.my_tickets(filter_id).await?;
        Ok(tickets.iter().map(|t| t.key.as_str()).collect::<Vec<_>>().join(" "))
    }

    /// Move a ticket to the named target status.
    ///
    /// The available transitions are listed first and the one leading to
    /// `target_status` is applied; matching is case-insensitive on the
    /// target status name.
    pub async fn transition_ticket(&self, key: &str, target_status: &str) -> TrackerResult<()> {
        #[derive(Deserialize)]
        struct Transitions {
            transitions: Vec<Transition>,
        }

        #[derive(Deserialize)]
        struct Transition {
            id: String,
            to: RawNamed,
        }

        let available: Transitions = self.get_json(&format!("issue/{key}/transitions")).await?;

        let transition = available
            .transitions
            .into_iter()
            .find(|t| t.to.name.eq_ignore_ascii_case(target_status))
            .ok_or_else(|| TrackerError::NoTransition {
                key: key.to_string(),
                target: target_status.to_string(),
            })?;

        let payload = serde_json::json!({ "transition": { "id": transition.id } });
        self.post_json(&format!("issue/{key}/transitions"), &payload).await?;

        Ok(())
    }

    /// Create a release ticket; returns `(id, key)`.
    pub async fn create_release_ticket(
        &self,
        project: &str,
        type_name: &str,
        summary: &str,
        description: &str,
    ) -> TrackerResult<(String, String)> {
        let payload = serde_json::json!({
            "fields": {
                "project": { "key": project },
                "summary": summary,
                "description": description,
                "issuetype": { "name": type_name },
            }
        });

        let response = self
            .post_json("issue", &payload)
            .await?
            .unwrap_or(serde_json::Value::Null);

        let id = response.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let key = response.get("key").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        Ok((id, key))
    }

    /// Link `source` as blocking `target`.
    pub async fn link_tickets(&self, source: &str, target: &str) -> TrackerResult<()> {
        let payload = serde_json::json!({
            "type": { "name": "Blocks" },
            "inwardIssue": { "key": source },
            "outwardIssue": { "key": target },
        });

        self.post_json("issueLink", &payload).await?;
        Ok(())
    }

    /// Locate the release ticket for a version by its conventional summary.
    pub async fn find_release_ticket(
        &self,
        project: &str,
        version: &str,
    ) -> TrackerResult<Option<Ticket>> {
        #[derive(Deserialize)]
        struct SearchResults {
            issues: Vec<RawIssue>,
        }

        let jql = format!("project = {project} AND summary ~ \"Release {version}\"");
        let results: SearchResults =
            self.get_json(&format!("search?jql={}", urlencoding::encode(&jql))).await?;

        Ok(results.issues.into_iter().next().map(Ticket::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUE_JSON: &str = r#"{
        "key": "EB-123",
        "fields": {
            "summary": "Fix the Login Flow",
            "status": { "name": "Open" },
            "issuetype": { "name": "Feature" },
            "assignee": { "displayName": "Dev Eloper" }
        }
    }"#;

    #[test]
    fn ticket_kind_from_names() {
        assert_eq!(TicketKind::from_name("Feature"), TicketKind::Feature);
        assert_eq!(TicketKind::from_name("HOTFIX"), TicketKind::Hotfix);
        assert_eq!(TicketKind::from_name("releasefix"), TicketKind::Releasefix);
        assert_eq!(TicketKind::from_name("Task"), TicketKind::Other);
    }

    #[tokio::test]
    async fn get_ticket_parses_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/latest/issue/EB-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ISSUE_JSON)
            .create_async()
            .await;

        let tracker = TrackerClient::new(server.url(), "dev@example.com", "secret");
        let ticket = tracker.get_ticket("EB-123").await.unwrap();

        assert_eq!(ticket.key, "EB-123");
        assert_eq!(ticket.kind, TicketKind::Feature);
        assert_eq!(ticket.status, "Open");
        assert_eq!(ticket.assignee.as_deref(), Some("Dev Eloper"));
        assert_eq!(ticket.slug(), "EB-123-fix-the-login-flow");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/latest/issue/EB-404")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let tracker = TrackerClient::new(server.url(), "dev@example.com", "secret");
        let err = tracker.get_ticket("EB-404").await.unwrap_err();

        match err {
            TrackerError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn my_tickets_follows_the_saved_filter() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/latest/filter/10101")
            .with_status(200)
            .with_body(r#"{ "jql": "assignee = currentUser()" }"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/latest/search")
            .match_query(mockito::Matcher::UrlEncoded(
                "jql".into(),
                "assignee = currentUser()".into(),
            ))
            .with_status(200)
            .with_body(format!(r#"{{ "issues": [{ISSUE_JSON}] }}"#))
            .create_async()
            .await;

        let tracker = TrackerClient::new(server.url(), "dev@example.com", "secret");
        let tickets = tracker.my_tickets("10101").await.unwrap();

        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].key, "EB-123");

        let ids = tracker.my_ticket_ids("10101").await.unwrap();
        assert_eq!(ids, "EB-123");
    }

    #[tokio::test]
    async fn transition_picks_the_matching_target() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/latest/issue/EB-123/transitions")
            .with_status(200)
            .with_body(
                r#"{ "transitions": [
                    { "id": "11", "to": { "name": "To Do" } },
                    { "id": "21", "to": { "name": "In Progress" } }
                ] }"#,
            )
            .create_async()
            .await;
        let post = server
            .mock("POST", "/rest/api/latest/issue/EB-123/transitions")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{ "transition": { "id": "21" } }"#.to_string(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let tracker = TrackerClient::new(server.url(), "dev@example.com", "secret");
        tracker.transition_ticket("EB-123", "in progress").await.unwrap();

        post.assert_async().await;
    }

    #[tokio::test]
    async fn transition_without_target_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/latest/issue/EB-123/transitions")
            .with_status(200)
            .with_body(r#"{ "transitions": [] }"#)
            .create_async()
            .await;

        let tracker = TrackerClient::new(server.url(), "dev@example.com", "secret");
        let err = tracker.transition_ticket("EB-123", "Done").await.unwrap_err();

        assert!(matches!(err, TrackerError::NoTransition { .. }));
    }

    #[tokio::test]
    async fn create_release_ticket_returns_id_and_key() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/api/latest/issue")
            .with_status(201)
            .with_body(r#"{ "id": "5000", "key": "MAN-42" }"#)
            .create_async()
            .await;

        let tracker = TrackerClient::new(server.url(), "dev@example.com", "secret");
        let (id, key) = tracker
            .create_release_ticket("MAN", "RELEASE", "Release 2024.31.5.01", "changes")
            .await
            .unwrap();

        assert_eq!(id, "5000");
        assert_eq!(key, "MAN-42");
    }
}
