use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@@ -(\d+),?(\d*) \+(\d+),?(\d*) @@").unwrap());

/// Line numbers that exist on the new (RIGHT) side of a unified patch:
/// added and context lines. Review comments may only anchor to these.
pub fn right_side_lines(patch: &str) -> HashSet<u64> {
    let mut lines = HashSet::new();
    let mut new_line: Option<u64> = None;

    for line in patch.lines() {
        if let Some(caps) = HUNK_HEADER.captures(line) {
            new_line = caps.get(3).and_then(|m| m.as_str().parse().ok());
            continue;
        }

        let Some(current) = new_line.as_mut() else {
            continue;
        };

        match line.chars().next() {
            Some('-') => {}
            // "\ No newline at end of file"
            Some('\\') => {}
            // '+', ' ', or a malformed line treated as context
            _ => {
                lines.insert(*current);
                *current += 1;
            }
        }
    }

    lines
}
