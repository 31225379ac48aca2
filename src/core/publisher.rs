use tracing::warn;

use crate::core::parser::{ReviewItem, ReviewResult};
use crate::core::patch;
use crate::github::{ChangedFile, GithubClient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub posted: usize,
    pub dropped: usize,
}

/// Maps review items onto anchored review-comment calls. Items with line
/// numbers outside the file's diff are dropped, and a failed POST for one
/// item never blocks the remaining items.
pub struct CommentPublisher<'a> {
    github: &'a GithubClient,
}

impl<'a> CommentPublisher<'a> {
    pub fn new(github: &'a GithubClient) -> Self {
        Self { github }
    }

    pub async fn publish(
        &self,
        result: &ReviewResult,
        file: &ChangedFile,
        commit_id: &str,
    ) -> PublishStats {
        let anchors = file
            .patch
            .as_deref()
            .map(patch::right_side_lines)
            .unwrap_or_default();

        let mut stats = PublishStats::default();

        for item in &result.reviews {
            if !anchors.contains(&item.line_number) {
                warn!(
                    file = %file.filename,
                    line = item.line_number,
                    "dropping review item anchored outside the diff"
                );
                stats.dropped += 1;
                continue;
            }

            let body = format_comment_body(item);
            match self
                .github
                .create_review_comment(commit_id, &file.filename, item.line_number, &body)
                .await
            {
                Ok(()) => stats.posted += 1,
                Err(err) => {
                    warn!(
                        file = %file.filename,
                        line = item.line_number,
                        error = %format!("{err:#}"),
                        "failed to post review comment"
                    );
                    stats.dropped += 1;
                }
            }
        }

        stats
    }
}

fn format_comment_body(item: &ReviewItem) -> String {
    let mut body = format!(
        "**{} ({})**\n\n{}",
        item.category, item.severity, item.comment
    );

    if let Some(suggestion) = &item.suggestion {
        let language = item.suggestion_language.as_deref().unwrap_or("");
        body.push_str(&format!("\n\n```{language}\n{suggestion}\n```"));
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn settings(base_url: &str) -> Settings {
        Settings {
            github_token: "token".to_string(),
            ai_api_key: "key".to_string(),
            provider: "anthropic".to_string(),
            model: None,
            max_tokens: 4000,
            temperature: 0.2,
            trigger_label: "ai-review".to_string(),
            owner: "octo".to_string(),
            repo: "demo".to_string(),
            pr_number: 42,
            github_api_url: base_url.to_string(),
            ai_base_url: None,
        }
    }

    fn item(line: u64, comment: &str) -> ReviewItem {
        ReviewItem {
            category: "bug".to_string(),
            severity: "high".to_string(),
            comment: comment.to_string(),
            suggestion: None,
            suggestion_language: None,
            line_number: line,
        }
    }

    fn changed_file(patch: &str) -> ChangedFile {
        serde_json::from_value(serde_json::json!({
            "filename": "a.js",
            "status": "modified",
            "patch": patch,
        }))
        .unwrap()
    }

    #[test]
    fn body_combines_category_severity_and_comment() {
        let body = format_comment_body(&item(3, "off by one"));
        assert!(body.starts_with("**bug (high)**"));
        assert!(body.contains("off by one"));
        assert!(!body.contains("```"));
    }

    #[test]
    fn body_fences_suggestion_with_language() {
        let mut with_suggestion = item(3, "rename this");
        with_suggestion.suggestion = Some("let total = 0;".to_string());
        with_suggestion.suggestion_language = Some("rust".to_string());
        let body = format_comment_body(&with_suggestion);
        assert!(body.contains("```rust\nlet total = 0;\n```"));
    }

    #[tokio::test]
    async fn posts_anchored_items_and_drops_out_of_diff_lines() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/demo/pulls/42/comments")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "commit_id": "c2",
                "path": "a.js",
                "line": 2,
                "side": "RIGHT",
            })))
            .with_status(201)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let client = GithubClient::new(&settings(&server.url())).unwrap();
        let publisher = CommentPublisher::new(&client);

        let result = ReviewResult {
            has_review: true,
            reviews: vec![item(2, "anchored"), item(99, "outside the diff")],
        };
        let file = changed_file("@@ -1,2 +1,2 @@\n context\n+changed");

        let stats = publisher.publish(&result, &file, "c2").await;
        assert_eq!(stats, PublishStats { posted: 1, dropped: 1 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn one_failed_post_does_not_block_siblings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/demo/pulls/42/comments")
            .with_status(422)
            .with_body(r#"{"message": "unprocessable"}"#)
            .expect(2)
            .create_async()
            .await;

        let client = GithubClient::new(&settings(&server.url())).unwrap();
        let publisher = CommentPublisher::new(&client);

        let result = ReviewResult {
            has_review: true,
            reviews: vec![item(1, "first"), item(2, "second")],
        };
        let file = changed_file("@@ -1,2 +1,2 @@\n context\n+changed");

        let stats = publisher.publish(&result, &file, "c2").await;
        assert_eq!(stats, PublishStats { posted: 0, dropped: 2 });
        mock.assert_async().await;
    }
}
