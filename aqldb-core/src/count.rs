//! Count derivation: rewrite a composed scan into a row-counting query.
//!
//! The rewrite works on the query text, not on a parse tree, and assumes the
//! shape `FOR ... [FILTER ...] [SORT ...] [LIMIT a, b] RETURN <projection>`.
//! Every `FILTER`/`SEARCH` clause of the original is preserved verbatim, so
//! the derived query scans exactly the same candidate set minus pagination
//! and projection.
//!
//! Known limitation, inherited by design: a projection whose text contains
//! the substring `RETURN` inside a string literal is mis-rewritten. Queries
//! composed by this layer never do; callers handing in arbitrary AQL must
//! keep their projections free of it.

use regex::Regex;
use std::sync::LazyLock;

static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+LIMIT\s+[0-9]+,\s*[0-9]+").unwrap());

static RETURN_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+RETURN\s+.*").unwrap());

/// Derives the counting variant of an already-composed query.
///
/// Steps, in order: strip the `LIMIT skip, rows` clause (pagination must not
/// affect totals), collapse line breaks to spaces, drop everything from the
/// `RETURN` keyword on, then append the count aggregation.
pub fn derive_count_query(query: &str) -> String {
    let stripped = LIMIT_CLAUSE.replace(query, "");
    let flat = stripped.replace(['\n', '\r'], " ");
    let head = RETURN_TAIL.replace(&flat, "");

    format!("{head} COLLECT WITH COUNT INTO length RETURN length")
}

/// Whether the text already encodes a `LIMIT skip, rows` clause.
pub(crate) fn has_limit_clause(query: &str) -> bool {
    LIMIT_CLAUSE.is_match(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_limit_and_projection() {
        let query = "\n  FOR o IN users\n  FILTER o.name == @name LIMIT 10, 25 \n  RETURN o";
        let derived = derive_count_query(query);

        assert_eq!(
            derived,
            "   FOR o IN users   FILTER o.name == @name COLLECT WITH COUNT INTO length RETURN length"
        );
    }

    #[test]
    fn limit_strip_is_case_insensitive() {
        let derived = derive_count_query("FOR o IN users limit 0, 5 RETURN o");
        assert!(!derived.to_uppercase().contains("LIMIT"));
    }

    #[test]
    fn filters_survive_verbatim() {
        let query = "FOR o IN docs\n    FILTER o.a == @a\n    FILTER 'x' IN o.tags\nRETURN o";
        let derived = derive_count_query(query);

        assert!(derived.contains("FILTER o.a == @a"));
        assert!(derived.contains("FILTER 'x' IN o.tags"));
        assert!(derived.ends_with("COLLECT WITH COUNT INTO length RETURN length"));
    }

    #[test]
    fn object_projections_are_dropped_entirely() {
        let query = "FOR u IN users FOR p IN profiles FILTER u.id == p.id_user RETURN { name: u.name }";
        let derived = derive_count_query(query);

        assert!(!derived.contains("{ name"));
        assert!(derived.contains("FILTER u.id == p.id_user"));
    }

    #[test]
    fn detects_existing_limit_clauses() {
        assert!(has_limit_clause("FOR o IN c LIMIT 0, 10 RETURN o"));
        assert!(has_limit_clause("FOR o IN c limit 3,4 RETURN o"));
        assert!(!has_limit_clause("FOR o IN c RETURN o"));
    }
}
