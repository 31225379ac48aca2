use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// One actionable comment for a specific line. Category and severity are
/// opaque display strings taken from the model as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub category: String,
    pub severity: String,
    pub comment: String,
    pub suggestion: Option<String>,
    pub suggestion_language: Option<String>,
    pub line_number: u64,
}

/// Parsed, validated output of one model call. `has_review == false` means
/// "nothing to flag", which covers malformed model output as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewResult {
    pub has_review: bool,
    pub reviews: Vec<ReviewItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReview {
    #[serde(default)]
    has_review: bool,
    // Decoded entry by entry so one mistyped entry cannot sink its siblings.
    #[serde(default)]
    reviews: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntry {
    category: Option<String>,
    severity: Option<String>,
    comment: Option<String>,
    suggestion: Option<String>,
    suggestion_language: Option<String>,
    line_number: Option<Value>,
}

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// Total over arbitrary input: prose, code fences, truncated JSON, or no
/// JSON at all produce an empty result, never an error.
pub fn parse(raw: &str) -> ReviewResult {
    for candidate in candidates(raw) {
        match serde_json::from_str::<WireReview>(candidate) {
            Ok(wire) => return convert(wire),
            Err(err) => debug!(error = %err, "candidate JSON did not decode as a review"),
        }
    }

    debug!("no parseable review object in model output");
    ReviewResult::default()
}

fn candidates(raw: &str) -> Vec<&str> {
    let mut found = Vec::new();
    if let Some(caps) = FENCED_JSON.captures(raw) {
        if let Some(fenced) = caps.get(1) {
            found.push(fenced.as_str());
        }
    }
    if let Some(balanced) = first_balanced_object(raw) {
        if !found.contains(&balanced) {
            found.push(balanced);
        }
    }
    found
}

/// First balanced `{..}` in the text, tracking strings and escapes so braces
/// inside JSON string values do not confuse the depth count.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

fn convert(wire: WireReview) -> ReviewResult {
    if !wire.has_review {
        return ReviewResult::default();
    }

    let total = wire.reviews.len();
    let reviews: Vec<ReviewItem> = wire
        .reviews
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<WireEntry>(entry).ok())
        .filter_map(validate)
        .collect();
    if reviews.len() < total {
        debug!(
            dropped = total - reviews.len(),
            kept = reviews.len(),
            "dropped review entries missing required fields"
        );
    }

    ReviewResult {
        has_review: true,
        reviews,
    }
}

/// Entries without a usable `comment` or `lineNumber` are dropped one by one;
/// their siblings survive. Missing category/severity fall back to defaults.
fn validate(entry: WireEntry) -> Option<ReviewItem> {
    let comment = entry.comment.map(|c| c.trim().to_string())?;
    if comment.is_empty() {
        return None;
    }
    let line_number = line_number_of(entry.line_number.as_ref())?;

    Some(ReviewItem {
        category: entry
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "general".to_string()),
        severity: entry
            .severity
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string()),
        comment,
        suggestion: entry.suggestion.filter(|s| !s.trim().is_empty()),
        suggestion_language: entry.suggestion_language.filter(|s| !s.trim().is_empty()),
        line_number,
    })
}

/// Models emit line numbers both as JSON numbers and as numeric strings.
fn line_number_of(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "hasReview": true,
        "reviews": [
            {"category": "bug", "severity": "high", "comment": "off by one", "lineNumber": 2},
            {"category": "style", "severity": "low", "comment": "rename", "suggestion": "let total = 0;", "suggestionLanguage": "rust", "lineNumber": 7}
        ]
    }"#;

    #[test]
    fn parses_well_formed_response() {
        let result = parse(VALID);
        assert!(result.has_review);
        assert_eq!(result.reviews.len(), 2);
        assert_eq!(result.reviews[0].line_number, 2);
        assert_eq!(result.reviews[1].suggestion.as_deref(), Some("let total = 0;"));
        assert_eq!(result.reviews[1].suggestion_language.as_deref(), Some("rust"));
    }

    #[test]
    fn empty_input_yields_empty_result() {
        assert_eq!(parse(""), ReviewResult::default());
    }

    #[test]
    fn plain_prose_yields_empty_result() {
        assert_eq!(parse("The code looks fine to me."), ReviewResult::default());
    }

    #[test]
    fn truncated_json_yields_empty_result() {
        let truncated = r#"{"hasReview": true, "reviews": [{"comment": "cut of"#;
        assert_eq!(parse(truncated), ReviewResult::default());
    }

    #[test]
    fn json_wrapped_in_prose_is_found() {
        let wrapped = format!("Here is my review:\n{VALID}\nLet me know if helpful.");
        let result = parse(&wrapped);
        assert!(result.has_review);
        assert_eq!(result.reviews.len(), 2);
    }

    #[test]
    fn json_inside_code_fence_is_found() {
        let fenced = format!("Sure!\n```json\n{VALID}\n```\n");
        let result = parse(&fenced);
        assert!(result.has_review);
        assert_eq!(result.reviews.len(), 2);
    }

    #[test]
    fn braces_inside_string_values_do_not_break_extraction() {
        let tricky = r#"{"hasReview": true, "reviews": [{"comment": "use {:?} here", "lineNumber": 3}]} trailing"#;
        let result = parse(tricky);
        assert_eq!(result.reviews.len(), 1);
        assert_eq!(result.reviews[0].comment, "use {:?} here");
    }

    #[test]
    fn has_review_false_means_nothing_to_flag() {
        let result = parse(r#"{"hasReview": false, "reviews": []}"#);
        assert!(!result.has_review);
        assert!(result.reviews.is_empty());
    }

    #[test]
    fn entry_missing_line_number_is_dropped_alone() {
        let partial = r#"{
            "hasReview": true,
            "reviews": [
                {"category": "bug", "severity": "high", "comment": "first", "lineNumber": 1},
                {"category": "bug", "severity": "high", "comment": "no line"},
                {"category": "bug", "severity": "high", "comment": "third", "lineNumber": 3}
            ]
        }"#;
        let result = parse(partial);
        assert!(result.has_review);
        assert_eq!(result.reviews.len(), 2);
        assert_eq!(result.reviews[0].comment, "first");
        assert_eq!(result.reviews[1].comment, "third");
    }

    #[test]
    fn entry_missing_comment_is_dropped() {
        let partial = r#"{"hasReview": true, "reviews": [{"lineNumber": 1}, {"comment": "  ", "lineNumber": 2}]}"#;
        let result = parse(partial);
        assert!(result.has_review);
        assert!(result.reviews.is_empty());
    }

    #[test]
    fn mistyped_entry_is_dropped_without_sinking_siblings() {
        let mixed = r#"{
            "hasReview": true,
            "reviews": [
                {"category": "bug", "severity": "high", "comment": "first", "lineNumber": 1},
                {"comment": "bad suggestion type", "suggestion": 3, "lineNumber": 2},
                "not even an object",
                {"category": "bug", "severity": "low", "comment": "last", "lineNumber": 4}
            ]
        }"#;
        let result = parse(mixed);
        assert!(result.has_review);
        assert_eq!(result.reviews.len(), 2);
        assert_eq!(result.reviews[0].comment, "first");
        assert_eq!(result.reviews[1].comment, "last");
    }

    #[test]
    fn numeric_string_line_number_is_accepted() {
        let result = parse(r#"{"hasReview": true, "reviews": [{"comment": "x", "lineNumber": "12"}]}"#);
        assert_eq!(result.reviews[0].line_number, 12);
    }

    #[test]
    fn missing_category_and_severity_get_defaults() {
        let result = parse(r#"{"hasReview": true, "reviews": [{"comment": "x", "lineNumber": 1}]}"#);
        assert_eq!(result.reviews[0].category, "general");
        assert_eq!(result.reviews[0].severity, "info");
    }

    #[test]
    fn unrelated_json_object_is_an_empty_result() {
        assert_eq!(parse(r#"{"answer": 42}"#), ReviewResult::default());
    }

    #[test]
    fn missing_has_review_defaults_to_false() {
        let result = parse(r#"{"reviews": [{"comment": "x", "lineNumber": 1}]}"#);
        assert!(!result.has_review);
        assert!(result.reviews.is_empty());
    }
}
