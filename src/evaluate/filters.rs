use chrono::{DateTime, Utc};

/// Toggleable strictness variants. Both default to off; the baseline policy
/// only requires a real review cycle (close duration above one hour) and a
/// non-empty change set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterPolicy {
    /// Reject pull requests with zero formal reviews.
    pub require_review: bool,
    /// Reject pull requests whose changed files are all documentation.
    pub skip_docs_only: bool,
}

/// Close durations at or below this are treated as automated or trivial
/// merges rather than a genuine review cycle.
pub const MIN_REVIEW_HOURS: f64 = 1.0;

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "rst", "adoc", "asciidoc", "txt"];
const DOC_PREFIXES: &[&str] = &["docs/", "doc/"];

pub fn close_duration_hours(created: DateTime<Utc>, ended: DateTime<Utc>) -> f64 {
    (ended - created).num_seconds() as f64 / 3600.0
}

pub fn is_doc_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if DOC_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return true;
    }
    match lower.rsplit_once('.') {
        Some((_, extension)) => DOC_EXTENSIONS.contains(&extension),
        None => false,
    }
}

/// True when every path is documentation. An empty iterator is not
/// docs-only: an unknown change set must not disqualify a pull request.
pub fn docs_only<'a>(paths: impl IntoIterator<Item = &'a str>) -> bool {
    let mut saw_any = false;
    for path in paths {
        saw_any = true;
        if !is_doc_path(path) {
            return false;
        }
    }
    saw_any
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_close_duration_in_hours() {
        assert_eq!(close_duration_hours(at(0, 0), at(12, 0)), 12.0);
        assert_eq!(close_duration_hours(at(0, 0), at(0, 30)), 0.5);
    }

    #[test]
    fn test_one_hour_boundary_is_not_a_review_cycle() {
        // Exactly one hour still counts as automated.
        let hours = close_duration_hours(at(0, 0), at(1, 0));
        assert!(hours <= MIN_REVIEW_HOURS);

        let hours = close_duration_hours(at(0, 0), at(1, 1));
        assert!(hours > MIN_REVIEW_HOURS);
    }

    #[test]
    fn test_doc_paths_by_extension() {
        assert!(is_doc_path("README.md"));
        assert!(is_doc_path("CHANGELOG.RST"));
        assert!(is_doc_path("notes.txt"));
        assert!(!is_doc_path("src/lib.rs"));
        assert!(!is_doc_path("Makefile"));
    }

    #[test]
    fn test_doc_paths_by_prefix() {
        assert!(is_doc_path("docs/guide/setup.html"));
        assert!(is_doc_path("doc/man/tool.1"));
        assert!(!is_doc_path("dochandler/parse.rs"));
    }

    #[test]
    fn test_docs_only() {
        assert!(docs_only(["README.md", "docs/intro.md"]));
        assert!(!docs_only(["README.md", "src/main.rs"]));
        assert!(!docs_only([]));
    }
}
