use anyhow::Result;
use ignore::WalkBuilder;
use std::path::Path;
use tracing::debug;

const SKIP_DIRS: &[&str] = &[".git", ".github", "node_modules", "target", "vendor", ".idea"];

const SKIP_FILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Gemfile.lock",
    ".gitlab-ci.yml",
];

/// Depth-first dump of the repository's text files, minified for token
/// budget, bounded by `max_chars`. Skips VCS metadata, CI configuration,
/// dependency directories, and lock files on top of gitignore rules.
pub fn collect_repo_context(root: &Path, max_chars: usize) -> Result<String> {
    let mut output = String::new();

    for entry in WalkBuilder::new(root).hidden(false).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().map_or(false, |t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        if is_skipped(path, root) {
            continue;
        }

        // Non-UTF-8 content is treated as binary and left out.
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };

        let relative = path.strip_prefix(root).unwrap_or(path);
        let block = format!("// file: {}\n{}\n", relative.display(), minify(&content));

        if max_chars > 0 && output.len().saturating_add(block.len()) > max_chars {
            output.push_str("// context truncated\n");
            break;
        }
        output.push_str(&block);
    }

    Ok(output)
}

fn is_skipped(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);

    if relative
        .components()
        .any(|c| SKIP_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
    {
        return true;
    }

    relative
        .file_name()
        .map_or(false, |name| SKIP_FILES.contains(&name.to_string_lossy().as_ref()))
}

/// Collapses runs of whitespace to single spaces and drops blank lines.
pub fn minify(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for line in text.lines() {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            continue;
        };
        output.push_str(first);
        for word in words {
            output.push(' ');
            output.push_str(word);
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn minify_collapses_whitespace_and_blank_lines() {
        let text = "fn   main()    {\n\n\n    let x\t=\t1;\n}\n";
        assert_eq!(minify(text), "fn main() {\nlet x = 1;\n}\n");
    }

    #[test]
    fn skips_dependency_dirs_and_lock_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".github/workflows")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "ignored\n").unwrap();
        fs::write(root.join(".github/workflows/ci.yml"), "ignored\n").unwrap();
        fs::write(root.join("package-lock.json"), "{}\n").unwrap();

        let context = collect_repo_context(root, 0).unwrap();

        assert!(context.contains("fn main() {}"));
        assert!(!context.contains("ignored"));
        assert!(!context.contains("package-lock.json"));
    }

    #[test]
    fn respects_character_budget() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "x".repeat(500)).unwrap();
        fs::write(root.join("b.txt"), "y".repeat(500)).unwrap();

        let context = collect_repo_context(root, 600).unwrap();

        assert!(context.len() < 700);
        assert!(context.contains("// context truncated"));
    }
}
