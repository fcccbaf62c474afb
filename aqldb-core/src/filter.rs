//! Filter compilation: declarative filter specs to AQL predicate text.
//!
//! A [`FilterSpec`] maps logical field names to comparison terms. Compiling a
//! spec with [`prepare_filters`] yields the `SEARCH`/`FILTER` clause text and
//! the bound parameter map, ready to be spliced into a `FOR ... RETURN`
//! query.
//!
//! # Comparison modes
//!
//! Modes are a closed enum rather than free-form operator strings, so a
//! backend translator can match exhaustively:
//!
//! - relational (`==`, `!=`, `<`, `<=`, `>`, `>=`) - bound parameter
//! - [`CompareMode::In`] - the list is inlined as a JSON array, no parameter
//! - [`CompareMode::Null`] - emits `field == null`, no parameter
//! - [`CompareMode::Fulltext`] - emits a `SEARCH` clause for view queries
//! - [`CompareMode::ContainsAll`] - one `FILTER 'v' IN field` per element,
//!   so the document's array field must contain every given value
//!
//! # Example
//!
//! ```ignore
//! use aqldb_core::filter::{FilterSpec, prepare_filters};
//!
//! let spec = FilterSpec::new()
//!     .field("status", "active")
//!     .field("tags", vec!["rust", "db"])
//!     .rows(20);
//! let compiled = prepare_filters("o", &spec, None);
//! ```

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Comparison mode for a single filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Ge,
    /// Field value is one of the given list (list inlined, not bound).
    In,
    /// Field is null.
    Null,
    /// Full-text search through the collection's search view.
    Fulltext,
    /// Array field contains every one of the given elements.
    ContainsAll,
}

impl CompareMode {
    /// Parses the wire-level mode tags accepted in filter descriptors.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "==" => Some(CompareMode::Eq),
            "!=" => Some(CompareMode::Ne),
            "<" => Some(CompareMode::Lt),
            "<=" => Some(CompareMode::Le),
            ">" => Some(CompareMode::Gt),
            ">=" => Some(CompareMode::Ge),
            "m" | "multi" | "in" => Some(CompareMode::In),
            "null" => Some(CompareMode::Null),
            "ft" | "fulltext" => Some(CompareMode::Fulltext),
            "a" => Some(CompareMode::ContainsAll),
            _ => None,
        }
    }

    /// The AQL operator for relational modes.
    fn operator(&self) -> Option<&'static str> {
        match self {
            CompareMode::Eq => Some("=="),
            CompareMode::Ne => Some("!="),
            CompareMode::Lt => Some("<"),
            CompareMode::Le => Some("<="),
            CompareMode::Gt => Some(">"),
            CompareMode::Ge => Some(">="),
            _ => None,
        }
    }
}

/// A single comparison term inside a [`FilterSpec`].
#[derive(Debug, Clone)]
pub struct FilterTerm {
    /// Value to compare against. `None` skips the term entirely.
    pub value: Option<Value>,
    /// How to compare.
    pub mode: CompareMode,
    /// Overrides the document field the predicate targets; defaults to the
    /// spec key (which also names the bound parameter).
    pub target: Option<String>,
}

impl FilterTerm {
    /// An equality term.
    pub fn eq(value: impl Into<Value>) -> Self {
        FilterTerm { value: Some(value.into()), mode: CompareMode::Eq, target: None }
    }

    /// A term with an explicit comparison mode.
    pub fn with_mode(mode: CompareMode, value: impl Into<Value>) -> Self {
        FilterTerm { value: Some(value.into()), mode, target: None }
    }

    /// Redirects the predicate to another document field.
    pub fn target(mut self, field: impl Into<String>) -> Self {
        self.target = Some(field.into());
        self
    }
}

/// A declarative filter over one collection scan.
///
/// `skip` and `rows` are pagination, never compiled into predicates;
/// `rows == -1` (the default) means unbounded.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    terms: Vec<(String, FilterTerm)>,
    skip: Option<i64>,
    rows: Option<i64>,
}

impl FilterSpec {
    /// Creates an empty filter spec.
    pub fn new() -> Self {
        FilterSpec::default()
    }

    /// Adds a field term. A list value selects [`CompareMode::ContainsAll`]
    /// (blank elements dropped), anything else is an equality match.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let term = match value {
            Value::Array(items) => FilterTerm {
                value: Some(Value::Array(clean_elements(items))),
                mode: CompareMode::ContainsAll,
                target: None,
            },
            other => FilterTerm::eq(other),
        };
        self.terms.push((name.into(), term));
        self
    }

    /// Adds a field term with an explicit comparison mode.
    pub fn term(mut self, name: impl Into<String>, mode: CompareMode, value: impl Into<Value>) -> Self {
        self.terms.push((name.into(), FilterTerm::with_mode(mode, value)));
        self
    }

    /// Adds an explicit term, giving full control over target/value.
    pub fn push(mut self, name: impl Into<String>, term: FilterTerm) -> Self {
        self.terms.push((name.into(), term));
        self
    }

    /// Requires the field to be null.
    pub fn is_null(mut self, name: impl Into<String>) -> Self {
        self.terms.push((
            name.into(),
            FilterTerm { value: None, mode: CompareMode::Null, target: None },
        ));
        self
    }

    /// Adds a full-text search term (only meaningful against a search view).
    pub fn fulltext(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.terms.push((
            name.into(),
            FilterTerm { value: Some(Value::String(text.into())), mode: CompareMode::Fulltext, target: None },
        ));
        self
    }

    /// Pagination offset.
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Pagination row bound; `-1` for unbounded.
    pub fn rows(mut self, rows: i64) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Whether the spec carries no terms at all.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Builds a spec from a plain JSON object, the way request handlers pass
    /// filters in.
    ///
    /// The reserved keys `skip` and `rows` are extracted and never become
    /// predicates. A `null` value skips the field (use a `{"mode": "null"}`
    /// descriptor for an is-null predicate). An object value carrying a
    /// `mode` key is a descriptor: `{ "val" | "value", "mode", "name" }`.
    /// A bare list selects the contains-all mode.
    pub fn from_value(data: &Value) -> StoreResult<Self> {
        let obj = data
            .as_object()
            .ok_or_else(|| StoreError::InvalidDocument("filter spec must be an object".into()))?;

        let mut spec = FilterSpec::new();

        for (key, value) in obj {
            match key.as_str() {
                "skip" => {
                    spec.skip = value.as_i64();
                    continue;
                }
                "rows" => {
                    spec.rows = value.as_i64();
                    continue;
                }
                _ => {}
            }

            if value.is_null() {
                continue;
            }

            let term = match value {
                Value::Object(desc) if desc.contains_key("mode") => {
                    let tag = desc
                        .get("mode")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let mode = CompareMode::parse(tag).ok_or_else(|| {
                        StoreError::Query(format!("unknown filter mode '{tag}' for field '{key}'"))
                    })?;
                    FilterTerm {
                        value: desc
                            .get("val")
                            .or_else(|| desc.get("value"))
                            .cloned(),
                        mode,
                        target: desc
                            .get("name")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    }
                }
                Value::Array(items) => FilterTerm {
                    value: Some(Value::Array(clean_elements(items.clone()))),
                    mode: CompareMode::ContainsAll,
                    target: None,
                },
                other => FilterTerm::eq(other.clone()),
            };

            spec.terms.push((key.clone(), term));
        }

        Ok(spec)
    }
}

/// The output of filter compilation: predicate text plus bound parameters.
///
/// The text is the `SEARCH` clauses followed by the `FILTER` clauses, joined
/// with a newline-indented separator, with the pagination `LIMIT` appended as
/// a suffix when the spec bounds its rows.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    text: String,
    params: Map<String, Value>,
    predicates: usize,
}

impl CompiledFilter {
    /// The compiled clause text (may carry a trailing `LIMIT` suffix).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bound parameter map.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// True when at least one predicate or search clause was emitted.
    pub fn has_predicates(&self) -> bool {
        self.predicates > 0
    }

    /// Decomposes into `(text, params)`.
    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.text, self.params)
    }
}

/// Compiles a filter spec against the scan bound to `alias`.
///
/// `extra_params` are merged into the returned parameter map untouched, for
/// callers that splice the compiled text into a larger hand-written query.
pub fn prepare_filters(
    alias: &str,
    spec: &FilterSpec,
    extra_params: Option<Map<String, Value>>,
) -> CompiledFilter {
    compile_filters(alias, spec, extra_params, None)
}

/// Like [`prepare_filters`], but parameter names are prefixed with
/// `{prefix}_` so that several compiled sets can share one query without
/// parameter collisions. Used by the join compiler.
pub(crate) fn compile_filters(
    alias: &str,
    spec: &FilterSpec,
    extra_params: Option<Map<String, Value>>,
    param_prefix: Option<&str>,
) -> CompiledFilter {
    let mut params = extra_params.unwrap_or_default();
    let mut searchers: Vec<String> = Vec::new();
    let mut filters: Vec<String> = Vec::new();

    let skip = spec.skip.unwrap_or(0);
    let rows = spec.rows.unwrap_or(-1);
    let limit = if rows != -1 {
        format!(" LIMIT {skip}, {rows}")
    } else {
        String::new()
    };

    for (key, term) in &spec.terms {
        let name = term.target.as_deref().unwrap_or(key);
        let param = match param_prefix {
            Some(prefix) => format!("{prefix}_{key}"),
            None => key.clone(),
        };

        match term.mode {
            CompareMode::In => {
                let Some(Value::Array(items)) = &term.value else {
                    continue;
                };
                // The list is inlined rather than bound: it is small and
                // caller-controlled.
                let inline = serde_json::to_string(items).unwrap_or_else(|_| "[]".into());
                filters.push(format!("FILTER {alias}.{name} IN {inline}"));
            }
            CompareMode::Null => {
                filters.push(format!("FILTER {alias}.{name} == null"));
            }
            CompareMode::Fulltext => {
                let Some(Value::String(text)) = &term.value else {
                    continue;
                };
                if text.is_empty() {
                    continue;
                }
                searchers.push(format!(
                    "SEARCH ANALYZER(LIKE({alias}.{name}, \"%{text}%\") OR LIKE({alias}.{name}, \"%{text}%\"), \"norm_it\")"
                ));
            }
            CompareMode::ContainsAll => {
                let Some(Value::Array(items)) = &term.value else {
                    continue;
                };
                for item in items {
                    let Some(element) = item.as_str() else { continue };
                    if element.is_empty() {
                        continue;
                    }
                    filters.push(format!("FILTER '{element}' IN {alias}.{name}"));
                }
            }
            _ => {
                let Some(value) = &term.value else { continue };
                let op = term.mode.operator().unwrap_or("==");
                filters.push(format!("FILTER {alias}.{name} {op} @{param}"));
                params.insert(param, value.clone());
            }
        }
    }

    let predicates = searchers.len() + filters.len();
    let mut text = searchers
        .into_iter()
        .chain(filters)
        .collect::<Vec<_>>()
        .join("\n    ");
    text.push_str(&limit);

    CompiledFilter { text, params, predicates }
}

/// Drops blank and null elements from a contains-all list.
fn clean_elements(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| matches!(item, Value::String(s) if !s.is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_binds_a_parameter() {
        let spec = FilterSpec::new().field("name", "Alice");
        let compiled = prepare_filters("o", &spec, None);

        assert_eq!(compiled.text(), "FILTER o.name == @name");
        assert_eq!(compiled.params().get("name"), Some(&json!("Alice")));
        assert!(compiled.has_predicates());
    }

    #[test]
    fn relational_modes_emit_their_operator() {
        let spec = FilterSpec::new()
            .term("age", CompareMode::Ge, 18)
            .term("score", CompareMode::Lt, 100);
        let compiled = prepare_filters("o", &spec, None);

        assert_eq!(
            compiled.text(),
            "FILTER o.age >= @age\n    FILTER o.score < @score"
        );
        assert_eq!(compiled.params().len(), 2);
    }

    #[test]
    fn membership_inlines_the_list_without_binding() {
        let spec = FilterSpec::new().term("tag", CompareMode::In, vec!["a", "b"]);
        let compiled = prepare_filters("o", &spec, None);

        assert_eq!(compiled.text(), r#"FILTER o.tag IN ["a","b"]"#);
        assert!(compiled.params().is_empty());
    }

    #[test]
    fn null_mode_emits_is_null_without_binding() {
        let spec = FilterSpec::new().is_null("deleted");
        let compiled = prepare_filters("o", &spec, None);

        assert_eq!(compiled.text(), "FILTER o.deleted == null");
        assert!(compiled.params().is_empty());
    }

    #[test]
    fn bare_list_compiles_one_clause_per_element() {
        let spec = FilterSpec::new().field("tags", vec!["x", "y"]);
        let compiled = prepare_filters("o", &spec, None);

        assert_eq!(
            compiled.text(),
            "FILTER 'x' IN o.tags\n    FILTER 'y' IN o.tags"
        );
    }

    #[test]
    fn blank_elements_contribute_no_predicate() {
        let spec = FilterSpec::new().field("tags", vec!["", ""]);
        let compiled = prepare_filters("o", &spec, None);

        assert_eq!(compiled.text(), "");
        assert!(!compiled.has_predicates());
    }

    #[test]
    fn empty_fulltext_is_dropped_and_search_sorts_first() {
        let spec = FilterSpec::new()
            .field("status", "open")
            .fulltext("title", "rust")
            .fulltext("body", "");
        let compiled = prepare_filters("d", &spec, None);

        assert!(compiled.text().starts_with("SEARCH ANALYZER(LIKE(d.title"));
        assert!(compiled.text().contains("FILTER d.status == @status"));
        assert!(!compiled.text().contains("d.body"));
    }

    #[test]
    fn rows_bounds_append_a_limit_suffix() {
        let spec = FilterSpec::new().field("a", 1).skip(10).rows(5);
        let compiled = prepare_filters("o", &spec, None);

        assert!(compiled.text().ends_with(" LIMIT 10, 5"));

        let unbounded = FilterSpec::new().field("a", 1).skip(10).rows(-1);
        let compiled = prepare_filters("o", &unbounded, None);
        assert!(!compiled.text().contains("LIMIT"));
    }

    #[test]
    fn from_value_extracts_reserved_keys_and_descriptors() {
        let spec = FilterSpec::from_value(&json!({
            "skip": 5,
            "rows": 10,
            "name": "Mario",
            "missing": null,
            "id_agent": { "mode": "m", "name": "id_agent", "val": ["u1", "u2"] },
            "deleted": { "mode": "null" },
        }))
        .unwrap();
        let compiled = prepare_filters("c", &spec, None);

        assert!(compiled.text().contains("FILTER c.name == @name"));
        assert!(compiled.text().contains(r#"FILTER c.id_agent IN ["u1","u2"]"#));
        assert!(compiled.text().contains("FILTER c.deleted == null"));
        assert!(!compiled.text().contains("missing"));
        assert!(compiled.text().ends_with(" LIMIT 5, 10"));
    }

    #[test]
    fn from_value_rejects_unknown_modes() {
        let err = FilterSpec::from_value(&json!({
            "x": { "mode": "regex", "val": ".*" },
        }));
        assert!(err.is_err());
    }

    #[test]
    fn namespaced_parameters_carry_the_prefix() {
        let spec = FilterSpec::new().field("enabled", true);
        let compiled = compile_filters("p", &spec, None, Some("p"));

        assert_eq!(compiled.text(), "FILTER p.enabled == @p_enabled");
        assert_eq!(compiled.params().get("p_enabled"), Some(&json!(true)));
    }

    #[test]
    fn extra_params_are_merged_untouched() {
        let mut extra = Map::new();
        extra.insert("limit_to".into(), json!(3));
        let spec = FilterSpec::new().field("a", 1);
        let compiled = prepare_filters("o", &spec, Some(extra));

        assert_eq!(compiled.params().len(), 2);
        assert_eq!(compiled.params().get("limit_to"), Some(&json!(3)));
    }
}
