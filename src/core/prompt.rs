/// Builds the per-file review prompt. Pure and deterministic: the same
/// `(patch, filename)` pair always yields the same string.
///
/// The JSON field names spelled out here are the sole coupling with
/// [`crate::core::parser`]; change them in both places or not at all.
pub fn build_review_prompt(patch: &str, filename: &str) -> String {
    format!(
        r#"You are reviewing a code change. Below is the unified diff patch for the file `{filename}`. Review only this patch; do not speculate about code you cannot see.

Identify bug risks, security problems, and concrete improvement suggestions. Respond with a single JSON object and nothing else: no prose, no code fences. A strict JSON parser must accept your entire response. Use exactly this shape:

{{
  "hasReview": true,
  "reviews": [
    {{
      "category": "short issue category, e.g. bug, security, performance",
      "severity": "low, medium, or high",
      "comment": "your review comment",
      "suggestion": "replacement code, optional",
      "suggestionLanguage": "language of the suggestion, optional",
      "lineNumber": 12
    }}
  ]
}}

Rules:
- `lineNumber` must be a line number on the new side of the patch below.
- Omit `suggestion` and `suggestionLanguage` when you have no concrete replacement code.
- If the patch has nothing worth flagging, respond with {{"hasReview": false, "reviews": []}}.

Patch for `{filename}`:

{patch}
"#
    )
}
