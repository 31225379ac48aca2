use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::adapters::llm::ReviewBackend;
use crate::config::Settings;
use crate::core::parser;
use crate::core::prompt;
use crate::core::publisher::CommentPublisher;
use crate::github::{ChangedFile, GithubClient, PullState};

const APPROVAL_BODY: &str = "Automated review complete.";

/// Explicit per-file result; errors never cross a file boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Reviewed { posted: usize, dropped: usize },
    NothingToFlag,
    Skipped(&'static str),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub filename: String,
    pub outcome: FileOutcome,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub eligible: bool,
    pub files: Vec<FileReport>,
    pub approved: bool,
    pub label_removed: bool,
}

impl RunReport {
    pub fn posted_total(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Reviewed { posted, .. } => posted,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed(_)))
            .count()
    }
}

/// Sequences the whole run: eligibility gate, per-file review fan-out with
/// failure isolation, and best-effort finalization.
pub struct Orchestrator<'a> {
    settings: &'a Settings,
    github: &'a GithubClient,
    backend: &'a dyn ReviewBackend,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        settings: &'a Settings,
        github: &'a GithubClient,
        backend: &'a dyn ReviewBackend,
    ) -> Self {
        Self {
            settings,
            github,
            backend,
        }
    }

    /// Fails only when the run as a whole is meaningless: the PR or its diff
    /// cannot be fetched. Everything past that point degrades per file.
    pub async fn run(&self) -> Result<RunReport> {
        let pr = self
            .github
            .get_pull_request()
            .await
            .context("failed to fetch the target pull request")?;

        if !pr.labels.contains(&self.settings.trigger_label) {
            info!(
                pr = pr.number,
                label = %self.settings.trigger_label,
                "trigger label not present, skipping run"
            );
            return Ok(RunReport::default());
        }
        if pr.state != PullState::Open || pr.locked {
            info!(pr = pr.number, "pull request closed or locked, skipping run");
            return Ok(RunReport::default());
        }

        let comparison = self
            .github
            .compare_commits(&pr.base_sha, &pr.head_sha)
            .await
            .context("failed to fetch the pull request diff")?;

        // Anchor on the head-side end of the commit chain; it may already be
        // stale if new commits landed, which the platform tolerates.
        let commit_id = comparison
            .anchor_commit()
            .unwrap_or(&pr.head_sha)
            .to_string();

        let mut report = RunReport {
            eligible: true,
            ..Default::default()
        };
        let publisher = CommentPublisher::new(self.github);

        for file in &comparison.files {
            let outcome = self.review_file(file, &publisher, &commit_id).await;
            match &outcome {
                FileOutcome::Reviewed { posted, dropped } => {
                    info!(file = %file.filename, posted, dropped, "review comments posted");
                }
                FileOutcome::NothingToFlag => {
                    info!(file = %file.filename, "nothing to flag");
                }
                FileOutcome::Skipped(reason) => {
                    info!(file = %file.filename, reason, "file skipped");
                }
                FileOutcome::Failed(message) => {
                    warn!(file = %file.filename, error = %message, "file review failed");
                }
            }
            report.files.push(FileReport {
                filename: file.filename.clone(),
                outcome,
            });
        }

        // Finalization always runs, whatever happened per file, and its own
        // failures end the run successfully anyway.
        match self.github.approve(&commit_id, APPROVAL_BODY).await {
            Ok(()) => report.approved = true,
            Err(err) => warn!(error = %format!("{err:#}"), "failed to post approving review"),
        }
        match self.github.remove_label(&self.settings.trigger_label).await {
            Ok(()) => report.label_removed = true,
            Err(err) => warn!(error = %format!("{err:#}"), "failed to remove trigger label"),
        }

        info!(
            files = report.files.len(),
            posted = report.posted_total(),
            failed = report.failed_files(),
            approved = report.approved,
            label_removed = report.label_removed,
            "run complete"
        );

        Ok(report)
    }

    async fn review_file(
        &self,
        file: &ChangedFile,
        publisher: &CommentPublisher<'_>,
        commit_id: &str,
    ) -> FileOutcome {
        if !file.is_reviewable() {
            return FileOutcome::Skipped("status not reviewable");
        }
        let Some(patch) = file.patch.as_deref() else {
            return FileOutcome::Skipped("no text patch");
        };

        let prompt = prompt::build_review_prompt(patch, &file.filename);
        let raw = match self.backend.submit_prompt(&prompt).await {
            Ok(raw) => raw,
            Err(err) => return FileOutcome::Failed(err.to_string()),
        };

        let result = parser::parse(&raw);
        if !result.has_review {
            return FileOutcome::NothingToFlag;
        }

        let stats = publisher.publish(&result, file, commit_id).await;
        FileOutcome::Reviewed {
            posted: stats.posted,
            dropped: stats.dropped,
        }
    }
}
