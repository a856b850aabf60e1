//! Query expansion for legal documents.
//!
//! Statutes are cited both as "Chapter N" and "Article N" depending on the
//! source, so each reference is echoed under the other name.

use regex::Regex;
use std::sync::LazyLock;

static CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter\s+(\d+)").expect("chapter pattern is valid"));
static ARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)article\s+(\d+)").expect("article pattern is valid"));

/// Append chapter/article cross-references to `query`.
///
/// Matching runs against the original query only, so appended terms never
/// expand again.
pub fn expand_query(query: &str) -> String {
    let mut expanded = query.to_string();

    for caps in CHAPTER.captures_iter(query) {
        expanded.push_str(" Article ");
        expanded.push_str(&caps[1]);
    }
    for caps in ARTICLE.captures_iter(query) {
        expanded.push_str(" Chapter ");
        expanded.push_str(&caps[1]);
    }

    expanded
}
