//! Glob-to-`LIKE` filter translation.
//!
//! Filters use `.*` as the multi-character wildcard; SQL `LIKE` uses `%`.

/// Wildcard token accepted in user filters.
const GLOB_WILDCARD: &str = ".*";

/// SQL `LIKE` any-sequence wildcard.
const LIKE_WILDCARD: char = '%';

/// Rewrites a `.*` glob into a substring-matching SQL `LIKE` pattern.
///
/// Every `.*` becomes `%`, then a `%` is added at either end unless one is
/// already there. Existing `%` and `_` in the input are passed through
/// unescaped, so they keep their `LIKE` meaning.
///
/// ```
/// use common::utils::build_like_filter;
///
/// assert_eq!(build_like_filter("abc.*def"), "%abc%def%");
/// ```
pub fn build_like_filter(filter: &str) -> String {
    let replaced = filter.replace(GLOB_WILDCARD, "%");

    let mut pattern = String::with_capacity(replaced.len() + 2);
    if !replaced.starts_with(LIKE_WILDCARD) {
        pattern.push(LIKE_WILDCARD);
    }
    pattern.push_str(&replaced);
    if !pattern.ends_with(LIKE_WILDCARD) {
        pattern.push(LIKE_WILDCARD);
    }
    pattern
}
