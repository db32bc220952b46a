//! Small free functions shared across the crate: natural sort, percent
//! change, and duration formatting. Byte-size formatting is left to the
//! `humansize` crate at the call site rather than reimplemented here.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").unwrap())
}

/// A sort key that compares digit runs numerically and everything else
/// lexicographically, so `"page2" < "page10"`.
fn natural_key(s: &str) -> Vec<NaturalChunk> {
    let re = digit_run_re();
    let mut chunks = Vec::new();
    let mut last = 0;
    for m in re.find_iter(s) {
        if m.start() > last {
            chunks.push(NaturalChunk::Text(s[last..m.start()].to_string()));
        }
        chunks.push(NaturalChunk::Number(m.as_str().parse().unwrap_or(u128::MAX)));
        last = m.end();
    }
    if last < s.len() {
        chunks.push(NaturalChunk::Text(s[last..].to_string()));
    }
    chunks
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Number(u128),
    Text(String),
}

/// Sort paths the way a human expects: `page2.jpg` before `page10.jpg`.
/// Sorting is mandatory for archive extraction since zip entry order is not
/// reliable across platforms.
pub fn human_sort_paths(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort_by(|a, b| {
        natural_key(&a.to_string_lossy()).cmp(&natural_key(&b.to_string_lossy()))
    });
    paths
}

/// Same ordering rule over plain strings, used by tests and by the
/// pre-EPUB-write re-sort.
pub fn human_sort_strings(mut items: Vec<String>) -> Vec<String> {
    items.sort_by(|a, b| natural_key(a).cmp(&natural_key(b)));
    items
}

/// `+x.xx%` for growth, `-x.xx%` for shrinkage.
pub fn pct_change(base: f64, new: f64) -> String {
    if base == 0.0 {
        return "+0.00%".to_string();
    }
    let diff = new - base;
    let pct = diff / base * 100.0;
    if pct >= 0.0 {
        format!("+{pct:.2}%")
    } else {
        format!("{pct:.2}%")
    }
}

pub fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();
    if total_seconds < 60 {
        format!("{total_seconds}s")
    } else if total_seconds < 3600 {
        format!("{}m {}s", total_seconds / 60, total_seconds % 60)
    } else {
        format!("{}h {}m", total_seconds / 3600, (total_seconds % 3600) / 60)
    }
}

/// Matches the double-suffix pattern `^.*(?=\.kepub\.epub$)` used to detect
/// and preserve a Kobo EPUB stem when it already carries the nested
/// extension.
pub fn strip_known_double_suffix(stem: &str) -> &str {
    stem.strip_suffix(".kepub").unwrap_or(stem)
}

pub fn file_stem_str(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_sort_orders_digit_runs_numerically() {
        let input = vec!["a2".to_string(), "a10".to_string(), "a1".to_string()];
        assert_eq!(
            human_sort_strings(input),
            vec!["a1".to_string(), "a2".to_string(), "a10".to_string()]
        );
    }

    #[test]
    fn natural_sort_paths_matches_string_rule() {
        let input = vec![
            PathBuf::from("page10.jpg"),
            PathBuf::from("page2.jpg"),
            PathBuf::from("page1.jpg"),
        ];
        let sorted = human_sort_paths(input);
        assert_eq!(
            sorted,
            vec![
                PathBuf::from("page1.jpg"),
                PathBuf::from("page2.jpg"),
                PathBuf::from("page10.jpg"),
            ]
        );
    }

    #[test]
    fn pct_change_negative_for_shrinkage() {
        let s = pct_change(100.0, 50.0);
        assert!(s.starts_with('-'));
    }

    #[test]
    fn pct_change_positive_for_growth() {
        let s = pct_change(100.0, 150.0);
        assert!(s.starts_with('+'));
    }

    #[test]
    fn double_suffix_is_stripped() {
        assert_eq!(strip_known_double_suffix("foo.kepub"), "foo");
        assert_eq!(strip_known_double_suffix("foo"), "foo");
    }
}
