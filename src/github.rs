use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::Settings;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("diffsentry/", env!("CARGO_PKG_VERSION"));

/// Immutable snapshot of the target pull request, valid for one run.
#[derive(Debug, Clone)]
pub struct PullRequestRef {
    pub number: u64,
    pub state: PullState,
    pub locked: bool,
    pub labels: HashSet<String>,
    pub base_sha: String,
    pub head_sha: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    #[serde(other)]
    Other,
}

/// One file in the base..head comparison. `patch` is absent for binary files.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: FileStatus,
    #[serde(default)]
    pub patch: Option<String>,
}

impl ChangedFile {
    pub fn is_reviewable(&self) -> bool {
        matches!(self.status, FileStatus::Added | FileStatus::Modified)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub files: Vec<ChangedFile>,
    #[serde(default)]
    pub commits: Vec<CommitRef>,
}

impl Comparison {
    /// The anchor commit for review comments is the head-side end of the
    /// chain; it may be stale relative to the PR's current head.
    pub fn anchor_commit(&self) -> Option<&str> {
        self.commits.last().map(|c| c.sha.as_str())
    }
}

#[derive(Deserialize)]
struct PullWire {
    number: u64,
    state: PullState,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    labels: Vec<LabelWire>,
    base: CommitPointer,
    head: CommitPointer,
}

#[derive(Deserialize)]
struct LabelWire {
    name: String,
}

#[derive(Deserialize)]
struct CommitPointer {
    sha: String,
}

#[derive(Serialize)]
struct ReviewCommentRequest<'a> {
    commit_id: &'a str,
    path: &'a str,
    line: u64,
    side: &'static str,
    body: &'a str,
}

#[derive(Serialize)]
struct ReviewRequest<'a> {
    commit_id: &'a str,
    event: &'static str,
    body: &'a str,
}

/// Thin typed client over the GitHub REST surface the agent needs. Calls are
/// single-shot; rate-limit and permission failures surface to the caller.
pub struct GithubClient {
    client: Client,
    base_url: String,
    token: String,
    owner: String,
    repo: String,
    number: u64,
}

impl GithubClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build GitHub HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.github_api_url.trim_end_matches('/').to_string(),
            token: settings.github_token.clone(),
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
            number: settings.pr_number,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    pub async fn get_pull_request(&self) -> Result<PullRequestRef> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base_url, self.owner, self.repo, self.number
        );
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .context("failed to reach GitHub")?;
        let response = check(response, "fetching pull request").await?;

        let wire: PullWire = response
            .json()
            .await
            .context("failed to decode pull request")?;

        Ok(PullRequestRef {
            number: wire.number,
            state: wire.state,
            locked: wire.locked,
            labels: wire.labels.into_iter().map(|l| l.name).collect(),
            base_sha: wire.base.sha,
            head_sha: wire.head.sha,
        })
    }

    pub async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison> {
        let url = format!(
            "{}/repos/{}/{}/compare/{}...{}",
            self.base_url, self.owner, self.repo, base, head
        );
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .context("failed to reach GitHub")?;
        let response = check(response, "comparing commits").await?;

        response.json().await.context("failed to decode comparison")
    }

    pub async fn create_review_comment(
        &self,
        commit_id: &str,
        path: &str,
        line: u64,
        body: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_url, self.owner, self.repo, self.number
        );
        let request = ReviewCommentRequest {
            commit_id,
            path,
            line,
            side: "RIGHT",
            body,
        };
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&request)
            .send()
            .await
            .context("failed to reach GitHub")?;
        check(response, "creating review comment").await?;
        Ok(())
    }

    pub async fn approve(&self, commit_id: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/reviews",
            self.base_url, self.owner, self.repo, self.number
        );
        let request = ReviewRequest {
            commit_id,
            event: "APPROVE",
            body,
        };
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&request)
            .send()
            .await
            .context("failed to reach GitHub")?;
        check(response, "creating approving review").await?;
        Ok(())
    }

    pub async fn remove_label(&self, label: &str) -> Result<()> {
        // Labels may contain '/' and spaces; encode them as one path segment.
        let mut url = reqwest::Url::parse(&format!(
            "{}/repos/{}/{}/issues/{}/labels",
            self.base_url, self.owner, self.repo, self.number
        ))
        .context("invalid GitHub API URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("invalid GitHub API URL"))?
            .push(label);

        let response = self
            .request(reqwest::Method::DELETE, url.to_string())
            .send()
            .await
            .context("failed to reach GitHub")?;
        check(response, "removing label").await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("GitHub API error while {} ({}): {}", action, status, body)
}
