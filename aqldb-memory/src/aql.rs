//! Query interpretation for the in-memory backend.
//!
//! This is not a general AQL engine. It covers exactly the query shapes the
//! access layer composes: aliased `FOR ... IN` scans (nested for joins),
//! `FILTER`/`SEARCH` predicates with bound parameters, `SORT`, `LIMIT`,
//! `COLLECT WITH COUNT INTO`, `REMOVE` truncation, and `RETURN` projections
//! (alias, object literal, `UNSET`). Anything outside that grammar is a
//! query error.

use std::{cmp::Ordering, collections::HashMap};

use serde_json::{Map, Value};

use aqldb_core::error::{StoreError, StoreResult};

/// Top-level query keywords that open a new segment.
const KEYWORDS: &[&str] = &[
    "FOR", "FILTER", "SEARCH", "SORT", "LIMIT", "COLLECT", "REMOVE", "RETURN",
];

/// One `FOR alias IN collection` scan.
#[derive(Debug)]
pub(crate) struct Scan {
    pub alias: String,
    pub collection: String,
}

/// A value position inside a predicate or projection.
#[derive(Debug)]
pub(crate) enum Operand {
    /// `@name` bound parameter.
    Param(String),
    /// `alias.path` document field, path possibly dotted.
    Field { alias: String, path: String },
    /// Inline literal (string, number, bool, null, array).
    Const(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug)]
pub(crate) enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// `LIKE(field, "%text%")` as emitted inside `SEARCH ANALYZER(...)`;
    /// matched as a case-insensitive substring.
    Like { field: Operand, pattern: String },
}

#[derive(Debug)]
pub(crate) struct SortKey {
    pub alias: String,
    pub path: String,
    pub desc: bool,
}

#[derive(Debug)]
pub(crate) enum Projection {
    /// `RETURN alias` - the bound document.
    Document(String),
    /// `RETURN { key: alias.field, ... }`.
    Object(Vec<(String, Operand)>),
    /// `RETURN UNSET(alias, ["f", ...])`.
    Unset { alias: String, fields: Vec<String> },
    /// The single row count of a `COLLECT WITH COUNT INTO` query.
    Count,
    /// Mutation queries return nothing.
    None,
}

/// A parsed query, ready to run against the collection map.
#[derive(Debug)]
pub(crate) struct Program {
    pub scans: Vec<Scan>,
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub limit: Option<(usize, usize)>,
    /// `REMOVE` target collection; the whole scan result is removed.
    pub remove: Option<String>,
    pub projection: Projection,
}

/// Parses a composed query into a [`Program`].
pub(crate) fn parse(query: &str) -> StoreResult<Program> {
    let mut program = Program {
        scans: Vec::new(),
        predicates: Vec::new(),
        sort: Vec::new(),
        limit: None,
        remove: None,
        projection: Projection::None,
    };
    let mut counting = false;

    for (keyword, body) in segment(query) {
        match keyword {
            "FOR" => program.scans.push(parse_scan(&body)?),
            "FILTER" => program.predicates.push(parse_predicate(&body)?),
            "SEARCH" => program.predicates.push(parse_search(&body)?),
            "SORT" => program.sort = parse_sort(&body)?,
            "LIMIT" => program.limit = Some(parse_limit(&body)?),
            "COLLECT" => {
                if !body.starts_with("WITH COUNT INTO") {
                    return Err(StoreError::Query(format!(
                        "unsupported COLLECT clause: {body}"
                    )));
                }
                counting = true;
            }
            "REMOVE" => {
                let scan = parse_scan(&body)?;
                program.remove = Some(scan.collection);
            }
            "RETURN" => {
                program.projection = if counting {
                    Projection::Count
                } else {
                    parse_projection(&body)?
                };
            }
            _ => unreachable!(),
        }
    }

    if program.scans.is_empty() {
        return Err(StoreError::Query(format!("query has no FOR scan: {query}")));
    }
    if program.remove.is_none() && matches!(program.projection, Projection::None) {
        return Err(StoreError::Query(format!("query has no RETURN: {query}")));
    }

    Ok(program)
}

/// Splits the query into `(keyword, body)` segments, honoring quotes and
/// bracket nesting so keywords inside strings or function calls do not open
/// segments.
fn segment(query: &str) -> Vec<(&'static str, String)> {
    let bytes = query.as_bytes();
    let mut segments: Vec<(&'static str, String)> = Vec::new();
    let mut current: Option<(&'static str, usize)> = None;
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'\'' | b'"' => {
                quote = Some(c);
                i += 1;
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }

        let boundary = i == 0 || bytes[i - 1].is_ascii_whitespace();
        if depth == 0 && boundary {
            let rest = &query[i..];
            let matched = KEYWORDS.iter().copied().find(|kw| {
                rest.starts_with(kw)
                    && rest[kw.len()..]
                        .chars()
                        .next()
                        .is_none_or(char::is_whitespace)
            });
            if let Some(keyword) = matched {
                if let Some((prev, start)) = current.take() {
                    segments.push((prev, query[start..i].trim().to_string()));
                }
                current = Some((keyword, i + keyword.len()));
                i += keyword.len();
                continue;
            }
        }
        i += 1;
    }
    if let Some((prev, start)) = current {
        segments.push((prev, query[start..].trim().to_string()));
    }

    segments
}

fn parse_scan(body: &str) -> StoreResult<Scan> {
    let parts: Vec<&str> = body.split_whitespace().collect();
    match parts.as_slice() {
        [alias, "IN", collection] => Ok(Scan {
            alias: alias.to_string(),
            collection: collection.to_string(),
        }),
        _ => Err(StoreError::Query(format!("malformed scan: {body}"))),
    }
}

fn parse_predicate(body: &str) -> StoreResult<Predicate> {
    const OPS: &[(&str, CompareOp)] = &[
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];

    for (tag, op) in OPS {
        if let Some(pos) = find_top_level(body, tag) {
            return Ok(Predicate::Compare {
                left: parse_operand(&body[..pos])?,
                op: *op,
                right: parse_operand(&body[pos + tag.len()..])?,
            });
        }
    }
    if let Some(pos) = find_top_level(body, " IN ") {
        return Ok(Predicate::Compare {
            left: parse_operand(&body[..pos])?,
            op: CompareOp::In,
            right: parse_operand(&body[pos + 4..])?,
        });
    }

    Err(StoreError::Query(format!("unsupported predicate: {body}")))
}

/// Parses a `SEARCH ANALYZER(LIKE(field, "%text%") ..., "...")` clause down
/// to its first `LIKE` condition.
fn parse_search(body: &str) -> StoreResult<Predicate> {
    let malformed = || StoreError::Query(format!("unsupported search clause: {body}"));

    let start = body.find("LIKE(").ok_or_else(malformed)? + 5;
    let end = body[start..].find(')').ok_or_else(malformed)? + start;
    let (field, pattern) = body[start..end].split_once(',').ok_or_else(malformed)?;

    Ok(Predicate::Like {
        field: parse_operand(field)?,
        pattern: pattern.trim().trim_matches('"').to_string(),
    })
}

fn parse_sort(body: &str) -> StoreResult<Vec<SortKey>> {
    body.split(',')
        .map(|part| {
            let mut tokens = part.split_whitespace();
            let field = tokens
                .next()
                .ok_or_else(|| StoreError::Query(format!("malformed sort: {body}")))?;
            let desc = tokens.next() == Some("DESC");

            match parse_operand(field)? {
                Operand::Field { alias, path } => Ok(SortKey { alias, path, desc }),
                _ => Err(StoreError::Query(format!("malformed sort: {body}"))),
            }
        })
        .collect()
}

fn parse_limit(body: &str) -> StoreResult<(usize, usize)> {
    let malformed = || StoreError::Query(format!("malformed limit: {body}"));

    let (skip, rows) = body.split_once(',').ok_or_else(malformed)?;
    let skip = skip.trim().parse::<usize>().map_err(|_| malformed())?;
    let rows = rows.trim().parse::<usize>().map_err(|_| malformed())?;
    Ok((skip, rows))
}

fn parse_projection(body: &str) -> StoreResult<Projection> {
    let malformed = || StoreError::Query(format!("unsupported projection: {body}"));

    if let Some(inner) = body.strip_prefix('{') {
        let inner = inner.strip_suffix('}').ok_or_else(malformed)?;
        let mut entries = Vec::new();
        for entry in split_top_level(inner, ',') {
            let (key, operand) = entry.split_once(':').ok_or_else(malformed)?;
            entries.push((key.trim().to_string(), parse_operand(operand)?));
        }
        return Ok(Projection::Object(entries));
    }

    if let Some(inner) = body.strip_prefix("UNSET(") {
        let inner = inner.strip_suffix(')').ok_or_else(malformed)?;
        let (alias, fields) = inner.split_once(',').ok_or_else(malformed)?;
        let fields: Vec<String> =
            serde_json::from_str(fields.trim()).map_err(|_| malformed())?;
        return Ok(Projection::Unset {
            alias: alias.trim().to_string(),
            fields,
        });
    }

    if body.contains(|c: char| c.is_whitespace()) {
        return Err(malformed());
    }
    Ok(Projection::Document(body.to_string()))
}

fn parse_operand(text: &str) -> StoreResult<Operand> {
    let text = text.trim();

    if let Some(name) = text.strip_prefix('@') {
        return Ok(Operand::Param(name.to_string()));
    }
    if (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
        || (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
    {
        return Ok(Operand::Const(Value::String(
            text[1..text.len() - 1].to_string(),
        )));
    }
    if text == "null" {
        return Ok(Operand::Const(Value::Null));
    }
    if text == "true" || text == "false" {
        return Ok(Operand::Const(Value::Bool(text == "true")));
    }
    if text.starts_with('[') {
        let items: Value = serde_json::from_str(text)
            .map_err(|_| StoreError::Query(format!("malformed list operand: {text}")))?;
        return Ok(Operand::Const(items));
    }
    if let Ok(number) = text.parse::<i64>() {
        return Ok(Operand::Const(Value::from(number)));
    }
    if let Ok(number) = text.parse::<f64>() {
        return Ok(Operand::Const(Value::from(number)));
    }
    if let Some((alias, path)) = text.split_once('.') {
        return Ok(Operand::Field {
            alias: alias.to_string(),
            path: path.to_string(),
        });
    }

    Err(StoreError::Query(format!("unsupported operand: {text}")))
}

fn find_top_level(haystack: &str, needle: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;

    for i in 0..bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {
                if depth == 0 && haystack[i..].starts_with(needle) {
                    return Some(i);
                }
            }
        }
    }
    None
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;

    for i in 0..bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {
                if depth == 0 && c == separator as u8 {
                    parts.push(&text[start..i]);
                    start = i + 1;
                }
            }
        }
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }

    parts
}

/// One cross-product row: alias to bound document.
type Row = HashMap<String, Value>;

/// Runs a parsed program against the collection map.
pub(crate) fn run(
    program: &Program,
    collections: &HashMap<String, Vec<Value>>,
    params: &Map<String, Value>,
) -> StoreResult<Vec<Value>> {
    let mut rows: Vec<Row> = vec![Row::new()];
    for scan in &program.scans {
        let docs = collections
            .get(&scan.collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut next = Vec::with_capacity(rows.len() * docs.len());
        for row in &rows {
            for doc in docs {
                let mut extended = row.clone();
                extended.insert(scan.alias.clone(), doc.clone());
                next.push(extended);
            }
        }
        rows = next;
    }

    rows.retain(|row| {
        program
            .predicates
            .iter()
            .all(|predicate| matches(predicate, row, params))
    });

    if !program.sort.is_empty() {
        rows.sort_by(|a, b| {
            for key in &program.sort {
                let left = lookup(a, &key.alias, &key.path);
                let right = lookup(b, &key.alias, &key.path);
                let mut order = compare(&left, &right).unwrap_or(Ordering::Equal);
                if key.desc {
                    order = order.reverse();
                }
                if order != Ordering::Equal {
                    return order;
                }
            }
            Ordering::Equal
        });
    }

    if let Some((skip, take)) = program.limit {
        rows = rows.into_iter().skip(skip).take(take).collect();
    }

    if matches!(program.projection, Projection::Count) {
        return Ok(vec![Value::from(rows.len() as u64)]);
    }

    rows.iter()
        .map(|row| project(&program.projection, row, params))
        .collect()
}

fn matches(predicate: &Predicate, row: &Row, params: &Map<String, Value>) -> bool {
    match predicate {
        Predicate::Compare { left, op, right } => {
            let left = resolve(left, row, params);
            let right = resolve(right, row, params);
            match op {
                CompareOp::Eq => left == right,
                CompareOp::Ne => left != right,
                CompareOp::Lt => compare(&left, &right) == Some(Ordering::Less),
                CompareOp::Le => matches!(
                    compare(&left, &right),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                CompareOp::Gt => compare(&left, &right) == Some(Ordering::Greater),
                CompareOp::Ge => matches!(
                    compare(&left, &right),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                CompareOp::In => match right {
                    Value::Array(items) => items.contains(&left),
                    _ => false,
                },
            }
        }
        Predicate::Like { field, pattern } => {
            let Value::String(value) = resolve(field, row, params) else {
                return false;
            };
            let needle = pattern.trim_matches('%').to_lowercase();
            value.to_lowercase().contains(&needle)
        }
    }
}

fn resolve(operand: &Operand, row: &Row, params: &Map<String, Value>) -> Value {
    match operand {
        Operand::Param(name) => params.get(name).cloned().unwrap_or(Value::Null),
        Operand::Const(value) => value.clone(),
        Operand::Field { alias, path } => lookup(row, alias, path),
    }
}

fn lookup(row: &Row, alias: &str, path: &str) -> Value {
    let mut value = match row.get(alias) {
        Some(value) => value,
        None => return Value::Null,
    };
    for part in path.split('.') {
        value = match value.get(part) {
            Some(value) => value,
            None => return Value::Null,
        };
    }
    value.clone()
}

/// Orders two scalar values; mixed or non-scalar types do not order.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.partial_cmp(y),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn project(
    projection: &Projection,
    row: &Row,
    params: &Map<String, Value>,
) -> StoreResult<Value> {
    match projection {
        Projection::Document(alias) => Ok(row.get(alias).cloned().unwrap_or(Value::Null)),
        Projection::Object(entries) => {
            let mut object = Map::new();
            for (key, operand) in entries {
                object.insert(key.clone(), resolve(operand, row, params));
            }
            Ok(Value::Object(object))
        }
        Projection::Unset { alias, fields } => {
            let mut document = row.get(alias).cloned().unwrap_or(Value::Null);
            if let Value::Object(object) = &mut document {
                for field in fields {
                    object.remove(field);
                }
            }
            Ok(document)
        }
        // Count rows are produced before projection in `run`.
        Projection::Count | Projection::None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collections(name: &str, docs: Vec<Value>) -> HashMap<String, Vec<Value>> {
        HashMap::from([(name.to_string(), docs)])
    }

    #[test]
    fn scans_and_filters_with_bound_parameters() {
        let program = parse("FOR o IN users FILTER o.name == @name RETURN o").unwrap();
        let store = collections(
            "users",
            vec![json!({"name": "Mario"}), json!({"name": "Luigi"})],
        );
        let mut params = Map::new();
        params.insert("name".into(), json!("Mario"));

        let rows = run(&program, &store, &params).unwrap();
        assert_eq!(rows, vec![json!({"name": "Mario"})]);
    }

    #[test]
    fn sort_and_limit_shape_the_result_window() {
        let program =
            parse("FOR o IN nums SORT o.n DESC LIMIT 1, 2 RETURN o").unwrap();
        let store = collections(
            "nums",
            vec![json!({"n": 1}), json!({"n": 3}), json!({"n": 2}), json!({"n": 4})],
        );

        let rows = run(&program, &store, &Map::new()).unwrap();
        assert_eq!(rows, vec![json!({"n": 3}), json!({"n": 2})]);
    }

    #[test]
    fn collect_with_count_returns_one_number() {
        let program = parse(
            "FOR o IN users FILTER o.role == @role COLLECT WITH COUNT INTO length RETURN length",
        )
        .unwrap();
        let store = collections(
            "users",
            vec![
                json!({"role": "admin"}),
                json!({"role": "user"}),
                json!({"role": "admin"}),
            ],
        );
        let mut params = Map::new();
        params.insert("role".into(), json!("admin"));

        let rows = run(&program, &store, &params).unwrap();
        assert_eq!(rows, vec![json!(2)]);
    }

    #[test]
    fn inline_membership_lists_are_honored() {
        let program = parse("FOR o IN users FILTER o.id IN [\"a\",\"c\"] RETURN o").unwrap();
        let store = collections(
            "users",
            vec![json!({"id": "a"}), json!({"id": "b"}), json!({"id": "c"})],
        );

        let rows = run(&program, &store, &Map::new()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn element_membership_checks_array_fields() {
        let program = parse("FOR o IN posts FILTER 'rust' IN o.tags RETURN o").unwrap();
        let store = collections(
            "posts",
            vec![
                json!({"tags": ["rust", "db"]}),
                json!({"tags": ["go"]}),
            ],
        );

        let rows = run(&program, &store, &Map::new()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn search_clauses_match_substrings_case_insensitively() {
        let program = parse(
            "FOR o IN users SEARCH ANALYZER(LIKE(o.name, \"%mar%\") OR LIKE(o.name, \"%mar%\"), \"norm_it\") RETURN o",
        )
        .unwrap();
        let store = collections(
            "users",
            vec![json!({"name": "MARIO"}), json!({"name": "Luigi"})],
        );

        let rows = run(&program, &store, &Map::new()).unwrap();
        assert_eq!(rows, vec![json!({"name": "MARIO"})]);
    }

    #[test]
    fn nested_scans_cross_join_on_their_condition() {
        let program = parse(
            "FOR u IN users\n  FOR p IN profiles\n    FILTER u.id == p.id_user\n  RETURN p",
        )
        .unwrap();
        let mut store = HashMap::new();
        store.insert(
            "users".to_string(),
            vec![json!({"id": "u1"}), json!({"id": "u2"})],
        );
        store.insert(
            "profiles".to_string(),
            vec![json!({"id_user": "u1", "role": "admin"})],
        );

        let rows = run(&program, &store, &Map::new()).unwrap();
        assert_eq!(rows, vec![json!({"id_user": "u1", "role": "admin"})]);
    }

    #[test]
    fn object_projections_rename_fields() {
        let program =
            parse("FOR c IN customers RETURN { cust_name: c.name }").unwrap();
        let store = collections("customers", vec![json!({"name": "Anna"})]);

        let rows = run(&program, &store, &Map::new()).unwrap();
        assert_eq!(rows, vec![json!({"cust_name": "Anna"})]);
    }

    #[test]
    fn unset_projections_drop_fields() {
        let program = parse("FOR o IN users RETURN UNSET(o, [\"_key\"])").unwrap();
        let store = collections("users", vec![json!({"_key": "k", "name": "Anna"})]);

        let rows = run(&program, &store, &Map::new()).unwrap();
        assert_eq!(rows, vec![json!({"name": "Anna"})]);
    }

    #[test]
    fn unknown_collections_scan_empty() {
        let program = parse("FOR o IN missing RETURN o").unwrap();
        let rows = run(&program, &HashMap::new(), &Map::new()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn garbage_queries_are_rejected() {
        assert!(parse("RETURN 1").is_err());
        assert!(parse("FOR o IN users").is_err());
        assert!(parse("FOR o IN users FILTER o.name LIKE 2 RETURN o").is_err());
    }
}
