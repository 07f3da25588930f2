//! CLI output formatting for `build` and `check`.
//!
//! # Information-First Display
//!
//! Every post leads with its positional index and identity; paths and
//! findings follow as indented context lines.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Posts
//! 001 como-utilizar-hooks → post/como-utilizar-hooks/index.html (written)
//! 002 criando-um-app-cra-do-zero → post/criando-um-app-cra-do-zero/index.html (fresh)
//!
//! Fallback → fallback.html
//! Not found → 404.html
//!
//! Generated 2 posts: 1 fresh, 0 unchanged, 1 written (2 total)
//! ```
//!
//! ## Check
//!
//! ```text
//! Posts
//! 001 Como utilizar Hooks (4 min)
//!     Slug: como-utilizar-hooks
//! 002 Criando um app CRA do zero (3 min)
//!     Slug: criando-um-app-cra-do-zero
//!     Problem: missing required field: data.author
//!
//! 2 posts, 1 problem
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::generate::{CheckReport, FALLBACK_FILE, GenerateReport, NOT_FOUND_FILE};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

// ============================================================================
// Build output
// ============================================================================

pub fn format_generate_output(report: &GenerateReport) -> Vec<String> {
    let mut lines = vec!["Posts".to_string()];

    for (i, page) in report.pages.iter().enumerate() {
        lines.push(format!(
            "{} {} \u{2192} {} ({})",
            format_index(i + 1),
            page.slug,
            page.path,
            page.status.label()
        ));
    }
    for slug in &report.skipped {
        lines.push(format!("    Skipped: {} (not a valid path component)", slug));
    }

    lines.push(String::new());
    lines.push(format!("Fallback \u{2192} {}", FALLBACK_FILE));
    lines.push(format!("Not found \u{2192} {}", NOT_FOUND_FILE));
    lines.push(String::new());
    lines.push(format!(
        "Generated {}: {}",
        plural(report.pages.len(), "post"),
        report.stats
    ));

    lines
}

pub fn print_generate_output(report: &GenerateReport) {
    for line in format_generate_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines = vec!["Posts".to_string()];

    for (i, post) in report.posts.iter().enumerate() {
        let title = if post.title.is_empty() {
            "(untitled)"
        } else {
            post.title.as_str()
        };
        lines.push(format!(
            "{} {} ({} min)",
            format_index(i + 1),
            title,
            post.reading_time
        ));
        lines.push(format!("    Slug: {}", post.slug));
        for problem in &post.problems {
            lines.push(format!("    Problem: {}", problem));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{}, {}",
        plural(report.posts.len(), "post"),
        plural(report.problem_count(), "problem")
    ));
    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BuildStats;
    use crate::generate::{CheckedPost, ExportedPage, PageStatus};

    fn page(slug: &str, status: PageStatus) -> ExportedPage {
        ExportedPage {
            slug: slug.to_string(),
            path: crate::generate::page_path(slug),
            status,
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn generate_output_lists_posts_with_status() {
        let report = GenerateReport {
            pages: vec![page("a", PageStatus::Written), page("b", PageStatus::Fresh)],
            skipped: vec![],
            stats: BuildStats {
                fresh: 1,
                unchanged: 0,
                written: 1,
            },
        };
        let lines = format_generate_output(&report);

        assert_eq!(lines[0], "Posts");
        assert_eq!(lines[1], "001 a \u{2192} post/a/index.html (written)");
        assert_eq!(lines[2], "002 b \u{2192} post/b/index.html (fresh)");
        assert!(lines.contains(&"Fallback \u{2192} fallback.html".to_string()));
        assert!(lines.contains(&"Not found \u{2192} 404.html".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "Generated 2 posts: 1 fresh, 0 unchanged, 1 written (2 total)"
        );
    }

    #[test]
    fn generate_output_shows_skipped() {
        let report = GenerateReport {
            skipped: vec!["..".to_string()],
            ..GenerateReport::default()
        };
        let lines = format_generate_output(&report);
        assert!(lines.contains(&"    Skipped: .. (not a valid path component)".to_string()));
        assert_eq!(lines.last().unwrap(), "Generated 0 posts: 0 written");
    }

    #[test]
    fn check_output_lists_problems() {
        let report = CheckReport {
            posts: vec![
                CheckedPost {
                    slug: "a".to_string(),
                    title: "Post a".to_string(),
                    reading_time: 2,
                    problems: vec![],
                },
                CheckedPost {
                    slug: "b".to_string(),
                    title: String::new(),
                    reading_time: 0,
                    problems: vec!["missing required field: data.title".to_string()],
                },
            ],
        };
        let lines = format_check_output(&report);

        assert_eq!(lines[1], "001 Post a (2 min)");
        assert_eq!(lines[2], "    Slug: a");
        assert_eq!(lines[3], "002 (untitled) (0 min)");
        assert_eq!(lines[5], "    Problem: missing required field: data.title");
        assert_eq!(lines.last().unwrap(), "2 posts, 1 problem");
    }
}
