//! Condition assembly for WHERE and HAVING clauses.
//!
//! Conditions are ordered `fragment -> value` pairs. A fragment holds at most
//! one `%s` placeholder; a fragment paired with an empty value is taken
//! verbatim as a complete boolean expression. Multiple fragments are joined
//! with `" AND "` in insertion order.

use crate::error::PgAccessError;
use crate::types::SqlValue;

/// Placeholder marker inside a condition fragment.
pub const PLACEHOLDER: &str = "%s";

/// An ordered set of condition fragments, each optionally carrying one value.
///
/// ```rust
/// use pg_access::{Conditions, SqlValue};
///
/// let where_ = Conditions::new()
///     .push("amount > %s", SqlValue::Int(50))
///     .push_verbatim("active");
/// let rendered = where_.render(0).unwrap();
/// assert_eq!(rendered.sql, "amount > $1 AND active");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    entries: Vec<(String, Option<SqlValue>)>,
}

/// A rendered condition: predicate text plus the values to bind.
#[derive(Debug, Clone)]
pub struct RenderedCondition {
    /// The SQL predicate, empty when the condition set was empty.
    pub sql: String,
    /// Values bound to the placeholders, in fragment order.
    pub params: Vec<SqlValue>,
}

impl Conditions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment with a value substituted for its `%s` placeholder.
    #[must_use]
    pub fn push(mut self, fragment: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.entries.push((fragment.into(), Some(value.into())));
        self
    }

    /// Add a fragment used verbatim (it must already be a complete boolean
    /// expression, e.g. `"deleted_at IS NULL"`).
    #[must_use]
    pub fn push_verbatim(mut self, fragment: impl Into<String>) -> Self {
        self.entries.push((fragment.into(), None));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate the fragments with their optional values, in insertion order.
    pub fn fragments(&self) -> impl Iterator<Item = (&str, Option<&SqlValue>)> {
        self.entries
            .iter()
            .map(|(fragment, value)| (fragment.as_str(), value.as_ref()))
    }

    /// Render the conditions with positional placeholders.
    ///
    /// Each `%s` becomes the next `$n`, with numbering starting after
    /// `param_offset` existing statement parameters. An empty set renders to
    /// an empty string so the caller can omit the clause entirely.
    ///
    /// # Errors
    /// Returns `ValidationError` if a fragment holds more than one
    /// placeholder, or a valued fragment holds none.
    pub fn render(&self, param_offset: usize) -> Result<RenderedCondition, PgAccessError> {
        let mut pieces = Vec::with_capacity(self.entries.len());
        let mut params = Vec::new();
        let mut next_index = param_offset + 1;

        for (fragment, value) in &self.entries {
            validate_fragment(fragment, value.is_some())?;
            match value {
                Some(value) => {
                    pieces.push(fragment.replacen(PLACEHOLDER, &format!("${next_index}"), 1));
                    params.push(value.clone());
                    next_index += 1;
                }
                None => pieces.push(fragment.clone()),
            }
        }

        Ok(RenderedCondition {
            sql: pieces.join(" AND "),
            params,
        })
    }

    /// Render the conditions with values interpolated directly into the text.
    ///
    /// This reproduces the historical printf-style substitution and is an
    /// injection risk: values are not escaped or bound. It exists only so
    /// callers that require byte-identical query text can keep it; everything
    /// else should use [`Conditions::render`].
    ///
    /// # Errors
    /// Returns `ValidationError` for the same fragment shapes as `render`.
    pub fn render_literal(&self) -> Result<String, PgAccessError> {
        let mut pieces = Vec::with_capacity(self.entries.len());
        for (fragment, value) in &self.entries {
            validate_fragment(fragment, value.is_some())?;
            match value {
                Some(value) => {
                    pieces.push(fragment.replacen(PLACEHOLDER, &value.to_sql_literal(), 1));
                }
                None => pieces.push(fragment.clone()),
            }
        }
        Ok(pieces.join(" AND "))
    }
}

impl<F, V> FromIterator<(F, V)> for Conditions
where
    F: Into<String>,
    V: Into<SqlValue>,
{
    fn from_iter<T: IntoIterator<Item = (F, V)>>(iter: T) -> Self {
        let mut conditions = Conditions::new();
        for (fragment, value) in iter {
            conditions = conditions.push(fragment, value);
        }
        conditions
    }
}

fn validate_fragment(fragment: &str, has_value: bool) -> Result<(), PgAccessError> {
    let placeholder_count = fragment.matches(PLACEHOLDER).count();
    if placeholder_count > 1 {
        return Err(PgAccessError::ValidationError(format!(
            "condition fragment `{fragment}` has {placeholder_count} placeholders, at most 1 allowed"
        )));
    }
    if has_value && placeholder_count == 0 {
        return Err(PgAccessError::ValidationError(format!(
            "condition fragment `{fragment}` carries a value but no `%s` placeholder"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_renders_empty_string() {
        let rendered = Conditions::new().render(0).unwrap();
        assert!(rendered.sql.is_empty());
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn single_verbatim_fragment_used_unchanged() {
        let rendered = Conditions::new().push_verbatim("active").render(0).unwrap();
        assert_eq!(rendered.sql, "active");
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn fragments_join_with_and_in_insertion_order() {
        let rendered = Conditions::new()
            .push("name > %s", "cip")
            .push("amount = %s", SqlValue::Int(50))
            .push_verbatim("deleted_at IS NULL")
            .render(0)
            .unwrap();
        assert_eq!(
            rendered.sql,
            "name > $1 AND amount = $2 AND deleted_at IS NULL"
        );
        assert_eq!(
            rendered.params,
            vec![SqlValue::Text("cip".into()), SqlValue::Int(50)]
        );
    }

    #[test]
    fn placeholder_numbering_continues_from_offset() {
        let rendered = Conditions::new()
            .push("id = %s", SqlValue::Int(7))
            .render(3)
            .unwrap();
        assert_eq!(rendered.sql, "id = $4");
    }

    #[test]
    fn literal_rendering_matches_historical_substitution() {
        let conditions = Conditions::new()
            .push("id = %s", SqlValue::Int(7))
            .push("name = '%s'", "cip");
        assert_eq!(
            conditions.render_literal().unwrap(),
            "id = 7 AND name = 'cip'"
        );
    }

    #[test]
    fn two_placeholders_in_one_fragment_rejected() {
        let result = Conditions::new()
            .push("a = %s OR b = %s", SqlValue::Int(1))
            .render(0);
        assert!(matches!(result, Err(PgAccessError::ValidationError(_))));
    }

    #[test]
    fn valued_fragment_without_placeholder_rejected() {
        let result = Conditions::new().push("active", SqlValue::Bool(true)).render(0);
        assert!(matches!(result, Err(PgAccessError::ValidationError(_))));
    }
}
