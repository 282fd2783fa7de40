//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layering between
//! domain, application and infrastructure code holds.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Non-comment lines outside `#[cfg(test)]` blocks.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    let mut depth = 0i32;
    let mut test_depth: Option<i32> = None;
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") {
            test_depth = Some(depth);
        }
        let skip = test_depth.is_some()
            || trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*');
        if !skip {
            lines.push((i + 1, line.to_string()));
        }
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if test_depth.is_some_and(|d| depth <= d) {
                        test_depth = None;
                    }
                }
                _ => {}
            }
        }
    }
    lines
}

fn violations(layer: &str, forbidden: &[&str]) -> Vec<String> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut found = Vec::new();
    for file in collect_rs_files(&root.join("src").join(layer)) {
        let rel = file.strip_prefix(root).unwrap_or(&file).display().to_string();
        for (lineno, line) in production_lines(&file) {
            for pattern in forbidden {
                if line.contains(pattern) {
                    found.push(format!("{rel}:{lineno}: `{pattern}` in: {}", line.trim()));
                }
            }
        }
    }
    found
}

// ── Domain purity ─────────────────────────────────────────────────────────────

#[test]
fn domain_has_no_io_or_outer_layer_imports() {
    let found = violations(
        "domain",
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio",
            "std::fs",
            "std::process",
        ],
    );
    assert!(
        found.is_empty(),
        "domain/ must stay pure:\n{}",
        found.join("\n")
    );
}

// ── Application boundaries ────────────────────────────────────────────────────

#[test]
fn application_does_not_reach_into_infra() {
    let found = violations(
        "application",
        &[
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio::process",
            "std::fs",
        ],
    );
    assert!(
        found.is_empty(),
        "application/ must go through ports:\n{}",
        found.join("\n")
    );
}

#[test]
fn process_spawning_lives_in_infra() {
    let found = [
        violations("application", &["Command::new"]),
        violations("commands", &["Command::new"]),
        violations("domain", &["Command::new"]),
    ]
    .concat();
    assert!(
        found.is_empty(),
        "spawn processes through the CommandRunner port:\n{}",
        found.join("\n")
    );
}
