use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::libs::engine::RowSet;
use crate::libs::error::{Result, StatementError};
use crate::libs::handle::{TableHandle, render_literal};

const OPERATORS: &[&str] = &["=", "!=", "<>", "<", "<=", ">", ">="];

enum Condition {
    Compare {
        column: String,
        op: String,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
    },
}

/// SELECT text over one table, checked against its schema before rendering.
///
/// Builder calls never fail; bad columns, operators or literal types are
/// reported by [`build`](Self::build).
pub struct SelectBuilder<'a> {
    handle: &'a TableHandle,
    selects: Vec<String>,
    wheres: Vec<Condition>,
    order_clause: Option<(String, String)>,
    limit_clause: Option<u64>,
    offset_clause: Option<u64>,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(handle: &'a TableHandle) -> Self {
        Self {
            handle,
            selects: Vec::new(),
            wheres: Vec::new(),
            order_clause: None,
            limit_clause: None,
            offset_clause: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.selects = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn r#where(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        self.wheres.push(Condition::Compare {
            column: column.to_string(),
            op: op.to_string(),
            value: value.into(),
        });
        self
    }

    /// Substring match. `%` and `_` in `pattern` match themselves.
    pub fn like(mut self, column: &str, pattern: &str) -> Self {
        self.wheres.push(Condition::Like {
            column: column.to_string(),
            pattern: format!("%{}%", escape_like(pattern)),
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        self.order_clause = Some((column.to_string(), direction.to_string()));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit_clause = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset_clause = Some(n);
        self
    }

    pub fn build(&self) -> Result<String, StatementError> {
        let dialect = self.handle.dialect();
        let quote = |name: &str| -> Result<String, StatementError> {
            let field = self.handle.column(name)?;
            Ok(dialect.quote_identifier(field.name()))
        };

        let selects = if self.selects.is_empty() {
            "*".to_string()
        } else {
            self.selects
                .iter()
                .map(|c| quote(c))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ")
        };
        let mut sql = format!(
            "SELECT {} FROM {}",
            selects,
            dialect.quote_identifier(self.handle.name())
        );

        if !self.wheres.is_empty() {
            let mut conds = Vec::with_capacity(self.wheres.len());
            for cond in &self.wheres {
                match cond {
                    Condition::Compare { column, op, value } => {
                        if !OPERATORS.contains(&op.as_str()) {
                            return Err(StatementError::UnsupportedOperator(op.clone()));
                        }
                        let field = self.handle.column(column)?;
                        let ident = dialect.quote_identifier(field.name());
                        if value.is_null() {
                            conds.push(match op.as_str() {
                                "=" => format!("{} IS NULL", ident),
                                "!=" | "<>" => format!("{} IS NOT NULL", ident),
                                _ => {
                                    return Err(StatementError::NullComparison {
                                        column: field.name().to_string(),
                                        op: op.clone(),
                                    });
                                }
                            });
                            continue;
                        }
                        conds.push(format!(
                            "{} {} {}",
                            ident,
                            op,
                            render_literal(dialect, field, value)?
                        ));
                    }
                    Condition::Like { column, pattern } => {
                        conds.push(format!(
                            "{} LIKE {} ESCAPE '\\'",
                            quote(column)?,
                            dialect.string_literal(pattern)
                        ));
                    }
                }
            }
            sql += &format!(" WHERE {}", conds.join(" AND "));
        }
        if let Some((column, direction)) = &self.order_clause {
            let direction = direction.to_ascii_uppercase();
            if direction != "ASC" && direction != "DESC" {
                return Err(StatementError::UnsupportedDirection(direction));
            }
            sql += &format!(" ORDER BY {} {}", quote(column)?, direction);
        }
        if let Some(limit) = self.limit_clause {
            sql += &format!(" LIMIT {}", limit);
        }
        if let Some(offset) = self.offset_clause {
            sql += &format!(" OFFSET {}", offset);
        }
        Ok(sql)
    }

    pub async fn fetch(&self) -> Result<RowSet> {
        let sql = self.build()?;
        Ok(self.handle.execute(&sql).await?)
    }

    pub async fn fetch_all<T>(&self) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let rows = self.fetch().await?;
        Ok(rows.into_typed().map_err(StatementError::from)?)
    }

    pub async fn fetch_one<T>(&self) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut all = self.fetch_all::<T>().await?;
        Ok(if all.is_empty() { None } else { Some(all.remove(0)) })
    }
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::dialect::{Dialect, GenericDialect};
    use crate::libs::engine::Engine;
    use crate::libs::error::EngineError;
    use crate::libs::field::{FieldDescriptor, FieldKind};
    use crate::libs::registry::SchemaRegistry;
    use crate::libs::schema::TableSchema;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoEngine;

    #[async_trait]
    impl Engine for NoEngine {
        async fn execute(&self, _sql: &str) -> Result<RowSet, EngineError> {
            Ok(RowSet::default())
        }
    }

    fn movies() -> TableHandle {
        let registry = SchemaRegistry::new();
        TableSchema::create(
            "Movie",
            vec![
                FieldDescriptor::plain("title", FieldKind::TEXT).unwrap(),
                FieldDescriptor::plain("releaseDate", FieldKind::DATE).unwrap(),
                FieldDescriptor::plain("movieId", FieldKind::INTEGER | FieldKind::PRIMARY_KEY).unwrap(),
            ],
            &registry,
        )
        .unwrap();
        let dialect: Arc<dyn Dialect> = Arc::new(GenericDialect);
        TableHandle::bind(&registry, "Movie", Arc::new(NoEngine), dialect).unwrap()
    }

    #[test]
    fn renders_full_select() {
        let handle = movies();
        let sql = handle
            .select()
            .columns(&["title", "movieid"])
            .r#where("releaseDate", ">=", "1979-01-01")
            .r#where("movieId", "<>", 3)
            .like("title", "Ali")
            .order_by("title", "desc")
            .limit(10)
            .offset(5)
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT title, movieId FROM Movie WHERE releaseDate >= '1979-01-01' \
             AND movieId <> 3 AND title LIKE '%Ali%' ESCAPE '\\' ORDER BY title DESC LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn like_matches_wildcards_literally() {
        let handle = movies();
        let sql = handle.select().like("title", r"100%_a\b").build().unwrap();
        assert_eq!(
            sql,
            r"SELECT * FROM Movie WHERE title LIKE '%100\%\_a\\b%' ESCAPE '\'"
        );
    }

    #[test]
    fn null_comparisons_render_is_null() {
        let handle = movies();
        let sql = handle
            .select()
            .r#where("releaseDate", "=", Value::Null)
            .r#where("title", "<>", Value::Null)
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM Movie WHERE releaseDate IS NULL AND title IS NOT NULL"
        );

        let err = handle
            .select()
            .r#where("movieId", ">", Value::Null)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            StatementError::NullComparison { column, op } if column == "movieId" && op == ">"
        ));
    }

    #[test]
    fn plain_select_uses_star() {
        let handle = movies();
        assert_eq!(handle.select().build().unwrap(), "SELECT * FROM Movie");
    }

    #[test]
    fn build_reports_bad_input() {
        let handle = movies();

        let err = handle.select().r#where("movieId", "; DROP", 1).build().unwrap_err();
        assert!(matches!(err, StatementError::UnsupportedOperator(_)));

        let err = handle.select().columns(&["budget"]).build().unwrap_err();
        assert!(matches!(err, StatementError::UnknownColumn { .. }));

        let err = handle.select().order_by("title", "sideways").build().unwrap_err();
        assert!(matches!(err, StatementError::UnsupportedDirection(_)));

        let err = handle.select().r#where("movieId", "=", "one").build().unwrap_err();
        assert!(matches!(err, StatementError::TypeMismatch { .. }));
    }
}
