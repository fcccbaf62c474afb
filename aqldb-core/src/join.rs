//! Multi-collection join query composition.
//!
//! A join is an ordered list of [`JoinStep`]s, each contributing one nested
//! scan. The first step anchors the query; every later step is glued to the
//! earlier ones by its `join_condition`, a predicate that may only reference
//! aliases introduced before it. Steps with no matching row drop the whole
//! row (inner-join semantics).
//!
//! Per-step filters go through the same compilation as single-collection
//! lookups, with their bound parameters namespaced by the step alias so two
//! steps filtering on the same field name cannot collide.

use serde_json::{Map, Value};

use crate::{
    backend::StoreBackend,
    filter::{FilterSpec, compile_filters},
    store::AqlStore,
};

/// One aliased collection scan inside a join.
#[derive(Debug, Clone, Default)]
pub struct JoinStep {
    /// Collection to scan.
    pub collection: String,
    /// Alias the scan is bound to; must be unique within the join.
    pub alias: String,
    /// Predicates on this step's own documents.
    pub filter: FilterSpec,
    /// Predicate linking this step to earlier aliases. Absent on the first
    /// step, required on every other.
    pub join_condition: Option<String>,
    /// Fields this step contributes to the projection, as `source` or
    /// `source:renamed`.
    pub fields: Vec<String>,
    /// Field names dropped from this step's default projection.
    pub exclude: Vec<String>,
}

impl JoinStep {
    /// A new step scanning `collection` under `alias`.
    pub fn new(collection: impl Into<String>, alias: impl Into<String>) -> Self {
        JoinStep {
            collection: collection.into(),
            alias: alias.into(),
            ..JoinStep::default()
        }
    }

    /// Sets the step's own filter.
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the predicate joining this step to earlier aliases.
    pub fn join_condition(mut self, condition: impl Into<String>) -> Self {
        self.join_condition = Some(condition.into());
        self
    }

    /// Declares the fields this step projects, as `source` or
    /// `source:renamed`.
    pub fn fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declares fields dropped from this step's default projection.
    pub fn exclude(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Compiles an ordered list of join steps into one query plus its bound
/// parameters.
pub fn compile_join_query(steps: &[JoinStep]) -> (String, Map<String, Value>) {
    let mut lines: Vec<String> = Vec::new();
    let mut params = Map::new();

    for (depth, step) in steps.iter().enumerate() {
        let indent = "  ".repeat(depth);
        lines.push(format!("{indent}FOR {} IN {}", step.alias, step.collection));

        if let Some(condition) = &step.join_condition {
            lines.push(format!("{indent}    FILTER {condition}"));
        }

        let compiled = compile_filters(&step.alias, &step.filter, None, Some(&step.alias));
        let (text, step_params) = compiled.into_parts();
        if !text.is_empty() {
            lines.push(format!("{indent}    {text}"));
        }
        params.extend(step_params);
    }

    lines.push(format!("  RETURN {}", projection(steps)));

    (lines.join("\n"), params)
}

/// Builds the final projection expression.
///
/// When any step declares `fields`, the result is an object literal of the
/// renamed fields from every declaring step, minus excluded names. With no
/// declared fields the last step's full document is returned, `UNSET` of its
/// excluded fields.
fn projection(steps: &[JoinStep]) -> String {
    let mut entries: Vec<String> = Vec::new();

    for step in steps {
        for field in &step.fields {
            let (source, renamed) = match field.split_once(':') {
                Some((source, renamed)) => (source, renamed),
                None => (field.as_str(), field.as_str()),
            };
            if step.exclude.iter().any(|e| e == source || e == renamed) {
                continue;
            }
            entries.push(format!("{renamed}: {}.{source}", step.alias));
        }
    }

    if !entries.is_empty() {
        return format!("{{ {} }}", entries.join(", "));
    }

    match steps.last() {
        Some(last) if !last.exclude.is_empty() => {
            let excluded = last
                .exclude
                .iter()
                .map(|field| format!("\"{field}\""))
                .collect::<Vec<_>>()
                .join(", ");
            format!("UNSET({}, [{excluded}])", last.alias)
        }
        Some(last) => last.alias.clone(),
        None => "null".to_string(),
    }
}

impl<B: StoreBackend> AqlStore<B> {
    /// Runs a join across the given steps and returns the projected rows.
    ///
    /// An empty step list is answered with an empty result, never a scan.
    pub async fn find_with_joins(&self, steps: &[JoinStep]) -> Vec<Value> {
        if steps.is_empty() {
            tracing::warn!("join requested with no steps");
            return Vec::new();
        }

        let (query, params) = compile_join_query(steps);
        self.query_all(&query, params, None, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompareMode;
    use serde_json::json;

    #[test]
    fn nested_scans_follow_step_order() {
        let steps = [
            JoinStep::new("users", "u"),
            JoinStep::new("profiles", "p").join_condition("u.id == p.id_user"),
        ];
        let (query, params) = compile_join_query(&steps);

        assert!(query.starts_with("FOR u IN users"));
        let users = query.find("FOR u IN users").unwrap();
        let profiles = query.find("FOR p IN profiles").unwrap();
        assert!(users < profiles);
        assert!(query.contains("FILTER u.id == p.id_user"));
        assert!(params.is_empty());
    }

    #[test]
    fn step_parameters_are_namespaced_by_alias() {
        let steps = [
            JoinStep::new("users", "u").filter(FilterSpec::new().field("name", "Mario")),
            JoinStep::new("profiles", "p")
                .join_condition("u.id == p.id_user")
                .filter(FilterSpec::new().field("enabled", true)),
        ];
        let (query, params) = compile_join_query(&steps);

        assert!(query.contains("FILTER u.name == @u_name"));
        assert!(query.contains("FILTER p.enabled == @p_enabled"));
        assert_eq!(params.get("u_name"), Some(&json!("Mario")));
        assert_eq!(params.get("p_enabled"), Some(&json!(true)));
    }

    #[test]
    fn declared_fields_build_a_renamed_projection() {
        let steps = [
            JoinStep::new("customers", "c")
                .fields(["name:cust_name", "lastname:cust_lastname"]),
            JoinStep::new("users", "u").join_condition("c.id_agent == u.id"),
        ];
        let (query, _) = compile_join_query(&steps);

        assert!(query.ends_with("RETURN { cust_name: c.name, cust_lastname: c.lastname }"));
    }

    #[test]
    fn default_projection_is_the_last_step() {
        let steps = [
            JoinStep::new("users", "u"),
            JoinStep::new("profiles", "p").join_condition("u.id == p.id_user"),
        ];
        let (query, _) = compile_join_query(&steps);
        assert!(query.ends_with("RETURN p"));
    }

    #[test]
    fn excluded_fields_are_unset_from_the_default_projection() {
        let steps = [
            JoinStep::new("users", "u"),
            JoinStep::new("profiles", "p")
                .join_condition("u.id == p.id_user")
                .exclude(["_id", "_key", "_rev"]),
        ];
        let (query, _) = compile_join_query(&steps);
        assert!(query.ends_with("RETURN UNSET(p, [\"_id\", \"_key\", \"_rev\"])"));
    }

    #[test]
    fn membership_filters_inline_their_list() {
        let agents = json!(["u1", "u2"]);
        let steps = [
            JoinStep::new("customers", "c")
                .filter(FilterSpec::new().term("id_agent", CompareMode::In, agents)),
        ];
        let (query, params) = compile_join_query(&steps);

        assert!(query.contains("FILTER c.id_agent IN [\"u1\",\"u2\"]"));
        assert!(params.is_empty());
    }
}
