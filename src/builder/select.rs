use crate::condition::Conditions;
use crate::error::PgAccessError;

use super::Statement;

/// Fluent builder for SELECT statements.
///
/// Clause order is fixed (WHERE, GROUP BY, HAVING, ORDER BY, OFFSET, LIMIT)
/// and clauses are omitted when their input is absent or zero.
///
/// ```rust
/// use pg_access::{Conditions, Select, SqlValue};
///
/// let stmt = Select::new("accounts", &["id", "name"])
///     .filter(Conditions::new().push("balance > %s", SqlValue::Int(100)))
///     .order_by("name")
///     .limit(10)
///     .build()
///     .unwrap();
/// assert_eq!(
///     stmt.sql,
///     "SELECT id, name FROM accounts WHERE (balance > $1) ORDER BY name LIMIT 10;"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    filter: Conditions,
    group_by: Option<String>,
    having: Conditions,
    order_by: Option<String>,
    offset: u64,
    limit: u64,
}

impl Select {
    #[must_use]
    pub fn new(table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            filter: Conditions::new(),
            group_by: None,
            having: Conditions::new(),
            order_by: None,
            offset: 0,
            limit: 0,
        }
    }

    /// WHERE conditions; an empty set omits the clause.
    #[must_use]
    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.filter = conditions;
        self
    }

    #[must_use]
    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    /// HAVING conditions; an empty set omits the clause.
    #[must_use]
    pub fn having(mut self, conditions: Conditions) -> Self {
        self.having = conditions;
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// OFFSET; zero omits the clause.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// LIMIT; zero omits the clause.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Assemble the statement.
    ///
    /// # Errors
    /// Returns `ValidationError` if no columns were given or a condition
    /// fragment is malformed.
    pub fn build(self) -> Result<Statement, PgAccessError> {
        if self.columns.is_empty() {
            return Err(PgAccessError::ValidationError(
                "select requires at least one column".to_string(),
            ));
        }

        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);
        let mut params = Vec::new();

        if !self.filter.is_empty() {
            let rendered = self.filter.render(params.len())?;
            sql.push_str(&format!(" WHERE ({})", rendered.sql));
            params.extend(rendered.params);
        }
        if let Some(group_by) = &self.group_by {
            sql.push_str(&format!(" GROUP BY {group_by}"));
        }
        if !self.having.is_empty() {
            let rendered = self.having.render(params.len())?;
            sql.push_str(&format!(" HAVING ({})", rendered.sql));
            params.extend(rendered.params);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {order_by}"));
        }
        if self.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", self.offset));
        }
        if self.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", self.limit));
        }
        sql.push(';');

        Ok(Statement { sql, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlValue;

    #[test]
    fn bare_select_has_no_optional_clauses() {
        let stmt = Select::new("t", &["a", "b"]).build().unwrap();
        assert_eq!(stmt.sql, "SELECT a, b FROM t;");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn all_clauses_appear_in_fixed_order() {
        let stmt = Select::new("t", &["a", "count(*)"])
            .filter(Conditions::new().push("a > %s", SqlValue::Int(1)))
            .group_by("a")
            .having(Conditions::new().push("count(*) > %s", SqlValue::Int(2)))
            .order_by("a DESC")
            .offset(5)
            .limit(10)
            .build()
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT a, count(*) FROM t WHERE (a > $1) GROUP BY a \
             HAVING (count(*) > $2) ORDER BY a DESC OFFSET 5 LIMIT 10;"
        );
        assert_eq!(stmt.params, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn zero_offset_and_limit_are_omitted() {
        let stmt = Select::new("t", &["a"]).offset(0).limit(0).build().unwrap();
        assert_eq!(stmt.sql, "SELECT a FROM t;");
    }

    #[test]
    fn having_placeholders_continue_where_numbering() {
        let stmt = Select::new("t", &["a"])
            .filter(
                Conditions::new()
                    .push("a = %s", SqlValue::Int(1))
                    .push("b = %s", SqlValue::Int(2)),
            )
            .group_by("a")
            .having(Conditions::new().push("sum(c) > %s", SqlValue::Int(3)))
            .build()
            .unwrap();
        assert!(stmt.sql.contains("HAVING (sum(c) > $3)"));
    }

    #[test]
    fn no_columns_rejected() {
        assert!(matches!(
            Select::new("t", &[]).build(),
            Err(PgAccessError::ValidationError(_))
        ));
    }
}
