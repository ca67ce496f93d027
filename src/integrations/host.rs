//! Source host integration.
//!
//! Wraps the hosting service's REST API (GitHub-compatible) for branches,
//! pull requests, tags, and releases. A client instance targets one
//! `owner/repo` pair; the workflow holds one for the mainline owner and one
//! for the contributor's fork, since contributors may not have push access
//! upstream.

use serde::Deserialize;

/// Result type for source host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Error types for source host operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("host request failed: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("host API error (status: {status}): {body}")]
    Api { status: u16, body: String },
}

/// A git ref as returned by the refs endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub url: String,
    pub object: RefObject,
}

/// Target object of a ref.
#[derive(Debug, Clone, Deserialize)]
pub struct RefObject {
    pub sha: String,
}

/// A branch listing entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: RefObject,
}

/// A pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub title: String,
}

/// A tagged release (pre-release or final).
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Result of a branch upsert.
#[derive(Debug, Clone)]
pub struct CreatedBranch {
    pub branch: BranchRef,
    /// False when the branch already existed and was left untouched.
    pub created: bool,
}

/// Result of a tag upsert.
#[derive(Debug, Clone)]
pub struct TaggedRelease {
    pub release: Release,
    /// False when the tag already existed and was left untouched.
    pub created: bool,
}

/// Divergence of `head` relative to `base`.
#[derive(Debug, Clone, Deserialize)]
pub struct Comparison {
    /// One of `identical`, `ahead`, `behind`, `diverged`.
    pub status: String,
    #[serde(default)]
    pub ahead_by: u64,
    #[serde(default)]
    pub behind_by: u64,
}

/// Source host API client for one repository.
#[derive(Debug, Clone)]
pub struct HostClient {
    /// Repository owner
    owner: String,
    /// Repository name
    repo: String,
    /// API token
    token: String,
    /// API root, overridable for tests
    api_root: String,
    /// HTTP client
    client: reqwest::Client,
}

impl HostClient {
    /// Default API root of the hosting service.
    pub const DEFAULT_API_ROOT: &'static str = "https://api.github.com";

    /// Create a new client for `owner/repo`.
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            api_root: Self::DEFAULT_API_ROOT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different API root.
    #[must_use]
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into().trim_end_matches('/').to_string();
        self
    }

    /// Owner this client operates on.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_root, self.owner, self.repo, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("octoeb/", env!("CARGO_PKG_VERSION")))
    }

    async fn check(&self, response: reqwest::Response) -> HostResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(HostError::Api { status: status.as_u16(), body })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> HostResult<T> {
        let url = self.api_url(path);
        tracing::debug!(%url, "host GET");

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    /// GET that maps a 404 onto `None`.
    async fn get_optional<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> HostResult<Option<T>> {
        let url = self.api_url(path);
        tracing::debug!(%url, "host GET");

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(self.check(response).await?.json().await?))
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &serde_json::Value,
    ) -> HostResult<T> {
        let url = self.api_url(path);
        tracing::debug!(%url, %method, "host request");

        let response = self.request(method, &url).json(body).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    /// Fetch a branch ref.
    pub async fn get_branch(&self, name: &str) -> HostResult<BranchRef> {
        self.get_json(&format!("git/refs/heads/{name}")).await
    }

    /// Fetch a branch ref, `None` when it does not exist.
    pub async fn branch_exists(&self, name: &str) -> HostResult<Option<BranchRef>> {
        self.get_optional(&format!("git/refs/heads/{name}")).await
    }

    /// Commit sha a tag points at.
    pub async fn tag_sha(&self, tag: &str) -> HostResult<String> {
        let tag_ref: BranchRef = self.get_json(&format!("git/refs/tags/{tag}")).await?;
        Ok(tag_ref.object.sha)
    }

    /// Create `name` from the head of `base`, treating an existing branch
    /// as success rather than error.
    pub async fn create_branch(&self, name: &str, base: &str) -> HostResult<CreatedBranch> {
        let base_sha = self.get_branch(base).await?.object.sha;
        self.create_branch_from_sha(name, &base_sha).await
    }

    /// Create `name` pointing at `sha`, treating an existing branch as
    /// success rather than error.
    pub async fn create_branch_from_sha(&self, name: &str, sha: &str) -> HostResult<CreatedBranch> {
        if let Some(existing) = self.branch_exists(name).await? {
            tracing::debug!(branch = name, "branch already exists");
            return Ok(CreatedBranch { branch: existing, created: false });
        }

        let payload = serde_json::json!({
            "ref": format!("refs/heads/{name}"),
            "sha": sha,
        });

        let branch = self.send_json(reqwest::Method::POST, "git/refs", &payload).await?;
        Ok(CreatedBranch { branch, created: true })
    }

    /// Force a branch ref to a new sha.
    pub async fn update_branch(&self, name: &str, sha: &str) -> HostResult<BranchRef> {
        let payload = serde_json::json!({ "sha": sha, "force": true });
        self.send_json(reqwest::Method::PATCH, &format!("git/refs/heads/{name}"), &payload).await
    }

    /// Open a pull request; `head` may be namespaced `owner:branch` for
    /// cross-repository requests.
    pub async fn open_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
    ) -> HostResult<PullRequest> {
        let mut payload = serde_json::json!({
            "title": title,
            "head": head,
            "base": base,
        });
        if let Some(text) = body {
            payload["body"] = serde_json::Value::String(text.to_string());
        }

        self.send_json(reqwest::Method::POST, "pulls", &payload).await
    }

    /// Merge a pull request by number.
    pub async fn merge_pull_request(&self, number: u64) -> HostResult<()> {
        #[derive(Deserialize)]
        struct MergeResult {
            #[serde(default)]
            merged: bool,
            #[serde(default)]
            message: String,
        }

        let result: MergeResult = self
            .send_json(
                reqwest::Method::PUT,
                &format!("pulls/{number}/merge"),
                &serde_json::json!({}),
            )
            .await?;

        if !result.merged {
            return Err(HostError::Api { status: 405, body: result.message });
        }

        Ok(())
    }

    /// The release a tag belongs to, `None` when the tag is unused.
    pub async fn release_by_tag(&self, tag: &str) -> HostResult<Option<Release>> {
        self.get_optional(&format!("releases/tags/{tag}")).await
    }

    /// The latest published (non-pre) release.
    pub async fn latest_release(&self) -> HostResult<Release> {
        self.get_json("releases/latest").await
    }

    /// The most recent pre-release, `None` when there is none.
    pub async fn latest_prerelease(&self) -> HostResult<Option<Release>> {
        let releases: Vec<Release> = self.get_json("releases").await?;
        Ok(releases.into_iter().find(|r| r.prerelease))
    }

    /// Create a tagged release on `target`, treating an existing tag as
    /// success rather than error.
    pub async fn create_tag(
        &self,
        tag: &str,
        target: &str,
        title: &str,
        body: &str,
        prerelease: bool,
    ) -> HostResult<TaggedRelease> {
        if let Some(existing) = self.release_by_tag(tag).await? {
            tracing::debug!(tag, "tag already exists");
            return Ok(TaggedRelease { release: existing, created: false });
        }

        let payload = serde_json::json!({
            "tag_name": tag,
            "target_commitish": target,
            "name": title,
            "body": body,
            "draft": false,
            "prerelease": prerelease,
        });

        let release = self.send_json(reqwest::Method::POST, "releases", &payload).await?;
        Ok(TaggedRelease { release, created: true })
    }

    /// Branches on the repository, optionally filtered by name prefix.
    pub async fn list_branches(&self, prefix: Option<&str>) -> HostResult<Vec<Branch>> {
        let branches: Vec<Branch> = self.get_json("branches?per_page=100").await?;

        Ok(match prefix {
            Some(p) => branches.into_iter().filter(|b| b.name.starts_with(p)).collect(),
            None => branches,
        })
    }

    /// Compare `head` against `base`.
    pub async fn compare(&self, base: &str, head: &str) -> HostResult<Comparison> {
        self.get_json(&format!("compare/{base}...{head}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &mockito::Server) -> HostClient {
        HostClient::new("token", "enderlabs", "eb").with_api_root(server.url())
    }

    const REF_JSON: &str = r#"{
        "ref": "refs/heads/develop",
        "url": "https://example.com/refs/heads/develop",
        "object": { "sha": "abc123" }
    }"#;

    #[tokio::test]
    async fn create_branch_posts_base_sha() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/enderlabs/eb/git/refs/heads/develop")
            .with_status(200)
            .with_body(REF_JSON)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/enderlabs/eb/git/refs/heads/feature-EB-1-x")
            .with_status(404)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/repos/enderlabs/eb/git/refs")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{ "ref": "refs/heads/feature-EB-1-x", "sha": "abc123" }"#.to_string(),
            ))
            .with_status(201)
            .with_body(REF_JSON.replace("develop", "feature-EB-1-x"))
            .create_async()
            .await;

        let outcome = client(&server).create_branch("feature-EB-1-x", "develop").await.unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.branch.object.sha, "abc123");
        post.assert_async().await;
    }

    #[tokio::test]
    async fn create_branch_is_an_upsert() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/enderlabs/eb/git/refs/heads/develop")
            .with_status(200)
            .with_body(REF_JSON)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/enderlabs/eb/git/refs/heads/release-eb-1")
            .with_status(200)
            .with_body(REF_JSON.replace("develop", "release-eb-1"))
            .create_async()
            .await;
        // No POST mock: creating again must not hit the refs endpoint.

        let outcome = client(&server).create_branch("release-eb-1", "develop").await.unwrap();

        assert!(!outcome.created);
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/enderlabs/eb/git/refs/heads/develop")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let err = client(&server).get_branch("develop").await.unwrap_err();

        match err {
            HostError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn latest_prerelease_picks_first_prerelease() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/enderlabs/eb/releases")
            .with_status(200)
            .with_body(
                r#"[
                    { "tag_name": "2024.31.5.02", "prerelease": false },
                    { "tag_name": "2024.31.6.01", "prerelease": true },
                    { "tag_name": "2024.31.5.01", "prerelease": true }
                ]"#,
            )
            .create_async()
            .await;

        let prerelease = client(&server).latest_prerelease().await.unwrap().unwrap();

        assert_eq!(prerelease.tag_name, "2024.31.6.01");
    }

    #[tokio::test]
    async fn list_branches_filters_by_prefix() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/enderlabs/eb/branches")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[
                    { "name": "develop", "commit": { "sha": "a" } },
                    { "name": "release-eb-2024.31.5.01", "commit": { "sha": "b" } },
                    { "name": "feature-EB-1-x", "commit": { "sha": "c" } }
                ]"#,
            )
            .create_async()
            .await;

        let branches = client(&server).list_branches(Some("release-eb-")).await.unwrap();

        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "release-eb-2024.31.5.01");
    }

    #[tokio::test]
    async fn create_tag_is_an_upsert() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/enderlabs/eb/releases/tags/2024.31.5.01")
            .with_status(200)
            .with_body(r#"{ "tag_name": "2024.31.5.01", "prerelease": true }"#)
            .create_async()
            .await;

        let outcome = client(&server)
            .create_tag("2024.31.5.01", "abc123", "release-eb-2024.31.5.01", "", true)
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.release.tag_name, "2024.31.5.01");
    }

    #[tokio::test]
    async fn merge_failure_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/repos/enderlabs/eb/pulls/7/merge")
            .with_status(200)
            .with_body(r#"{ "merged": false, "message": "not mergeable" }"#)
            .create_async()
            .await;

        let err = client(&server).merge_pull_request(7).await.unwrap_err();

        assert!(matches!(err, HostError::Api { .. }));
    }
}
