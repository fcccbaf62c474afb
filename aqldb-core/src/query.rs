//! Query options: pagination, sorting, and count projection.
//!
//! [`QueryOptions`] travels with every repository read. The composer renders
//! the `SORT` and `LIMIT` clauses as text fragments the executor splices
//! into composed queries.
//!
//! # Example
//!
//! ```ignore
//! use aqldb_core::query::QueryOptions;
//!
//! let options = QueryOptions::new()
//!     .sort("created", true)
//!     .skip(20)
//!     .rows(10)
//!     .count(true);
//! ```

/// One sort key: field name plus direction.
#[derive(Debug, Clone)]
pub struct SortField {
    /// The field name to sort by.
    pub field: String,
    /// Descending when true.
    pub desc: bool,
}

/// Options applied around a composed query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Pagination starting point.
    pub skip: Option<i64>,
    /// Number of rows to return.
    pub rows: Option<i64>,
    /// Sort keys, applied in declared order. No default tiebreaker is added.
    pub sort: Vec<SortField>,
    /// When true, every returned row also carries the total match count
    /// in a `__count` field.
    pub count: bool,
}

impl QueryOptions {
    /// Creates empty options: no pagination, no sort, no count.
    pub fn new() -> Self {
        QueryOptions::default()
    }

    /// Sets the pagination starting point.
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the number of rows to return.
    pub fn rows(mut self, rows: i64) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.sort.push(SortField { field: field.into(), desc });
        self
    }

    /// Requests the total match count on every row.
    pub fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    /// Whether any pagination bound was supplied.
    pub fn has_paging(&self) -> bool {
        self.skip.is_some() || self.rows.is_some()
    }

    /// Renders the `SORT` clause against `alias`, or an empty string when no
    /// sort keys were declared.
    pub fn sort_clause(&self, alias: &str) -> String {
        if self.sort.is_empty() {
            return String::new();
        }

        let keys = self
            .sort
            .iter()
            .map(|key| {
                if key.desc {
                    format!("{alias}.{} DESC", key.field)
                } else {
                    format!("{alias}.{}", key.field)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("SORT {keys}")
    }

    /// Renders the `LIMIT` clause, or an empty string when unbounded.
    ///
    /// A `skip` without `rows` keeps "everything after N" semantics: the row
    /// bound defaults to a very large value instead of zero.
    pub fn limit_clause(&self) -> String {
        let skip = self.skip.unwrap_or(0);
        let mut rows = self.rows.unwrap_or(0);

        if skip > 0 && rows == 0 {
            rows = skip + 9_999_999;
        }

        if rows > 0 {
            format!("LIMIT {skip}, {rows}")
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_clause_keeps_declared_order() {
        let options = QueryOptions::new()
            .sort("created", true)
            .sort("name", false);

        assert_eq!(options.sort_clause("o"), "SORT o.created DESC, o.name");
    }

    #[test]
    fn no_sort_keys_render_nothing() {
        assert_eq!(QueryOptions::new().sort_clause("o"), "");
    }

    #[test]
    fn limit_clause_renders_skip_and_rows() {
        let options = QueryOptions::new().skip(10).rows(25);
        assert_eq!(options.limit_clause(), "LIMIT 10, 25");
    }

    #[test]
    fn skip_without_rows_means_rest_of_collection() {
        let options = QueryOptions::new().skip(40);
        assert_eq!(options.limit_clause(), "LIMIT 40, 10000039");
    }

    #[test]
    fn no_paging_renders_nothing() {
        assert_eq!(QueryOptions::new().limit_clause(), "");
        assert!(!QueryOptions::new().has_paging());
    }
}
