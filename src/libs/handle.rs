use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::libs::dialect::Dialect;
use crate::libs::engine::{Engine, RowSet};
use crate::libs::error::{EngineError, Result, StatementError};
use crate::libs::field::{BaseType, FieldDescriptor};
use crate::libs::query_builder::SelectBuilder;
use crate::libs::registry::SchemaRegistry;
use crate::libs::schema::TableSchema;

/// A handle to one registered table.
///
/// Renders statements from the table's schema and forwards statement text
/// to the engine. The schema is the registry's own instance, shared rather
/// than copied.
#[derive(Clone)]
pub struct TableHandle {
    schema: Arc<TableSchema>,
    engine: Arc<dyn Engine>,
    dialect: Arc<dyn Dialect>,
    if_not_exists: bool,
}

impl TableHandle {
    /// Bind to the table registered as `name`, if there is one.
    ///
    /// # Example
    /// ```ignore
    /// let movies = TableHandle::bind(&registry, "Movie", engine, Arc::new(SqliteDialect))
    ///     .expect("Movie is registered");
    /// ```
    pub fn bind(
        registry: &SchemaRegistry,
        name: &str,
        engine: Arc<dyn Engine>,
        dialect: Arc<dyn Dialect>,
    ) -> Option<Self> {
        registry
            .lookup(name)
            .map(|schema| Self::new(schema, engine, dialect))
    }

    pub(crate) fn new(
        schema: Arc<TableSchema>,
        engine: Arc<dyn Engine>,
        dialect: Arc<dyn Dialect>,
    ) -> Self {
        Self {
            schema,
            engine,
            dialect,
            if_not_exists: false,
        }
    }

    /// Render `CREATE TABLE IF NOT EXISTS` instead of `CREATE TABLE`.
    pub fn if_not_exists(mut self, yes: bool) -> Self {
        self.if_not_exists = yes;
        self
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Canonical create statement, fields in declaration order.
    pub fn render_create_statement(&self) -> String {
        self.dialect.create_table(&self.schema, self.if_not_exists)
    }

    /// One line per field, e.g. `movieId INTEGER PRIMARY KEY`.
    pub fn describe(&self) -> Vec<String> {
        self.schema.describe()
    }

    /// Send `sql` to the engine unmodified.
    pub async fn execute(&self, sql: &str) -> Result<RowSet, EngineError> {
        self.engine.execute(sql).await
    }

    /// Create the table in the engine.
    pub async fn create_table(&self) -> Result<RowSet, EngineError> {
        let sql = self.render_create_statement();
        self.execute(&sql).await
    }

    /// Render an INSERT for `item`, which must serialize to an object whose
    /// keys are columns of this table.
    ///
    /// # Example
    /// ```ignore
    /// let sql = movies.render_insert(&json!({"title": "Alien", "movieId": 1}))?;
    /// ```
    pub fn render_insert<T: Serialize>(&self, item: &T) -> Result<String, StatementError> {
        let table = self.schema.name();
        let Value::Object(map) = serde_json::to_value(item)? else {
            return Err(StatementError::NotAnObject {
                table: table.to_string(),
            });
        };

        let mut row = HashMap::with_capacity(map.len());
        for (key, value) in &map {
            let field = self.column(key)?;
            if row.insert(field.name().to_ascii_lowercase(), value).is_some() {
                return Err(StatementError::DuplicateColumn {
                    table: table.to_string(),
                    column: field.name().to_string(),
                });
            }
        }

        let mut cols = Vec::new();
        let mut values = Vec::new();
        for field in self.schema.fields() {
            let Some(value) = row.get(&field.name().to_ascii_lowercase()) else {
                continue;
            };
            cols.push(self.dialect.quote_identifier(field.name()));
            values.push(render_literal(self.dialect.as_ref(), field, value)?);
        }
        if cols.is_empty() {
            return Err(StatementError::EmptyRow {
                table: table.to_string(),
            });
        }

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote_identifier(table),
            cols.join(", "),
            values.join(", ")
        ))
    }

    pub async fn insert<T: Serialize>(&self, item: &T) -> Result<RowSet> {
        let sql = self.render_insert(item)?;
        Ok(self.execute(&sql).await?)
    }

    /// Start a SELECT against this table.
    ///
    /// # Example
    /// ```ignore
    /// let rows = movies
    ///     .select()
    ///     .r#where("releaseDate", ">=", "1980-01-01")
    ///     .order_by("title", "ASC")
    ///     .limit(10)
    ///     .fetch()
    ///     .await?;
    /// ```
    pub fn select(&self) -> SelectBuilder<'_> {
        SelectBuilder::new(self)
    }

    pub(crate) fn column(&self, name: &str) -> Result<&FieldDescriptor, StatementError> {
        self.schema
            .field(name)
            .ok_or_else(|| StatementError::UnknownColumn {
                table: self.schema.name().to_string(),
                column: name.to_string(),
            })
    }
}

impl fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle")
            .field("table", &self.schema.name())
            .field("dialect", &self.dialect.name())
            .field("if_not_exists", &self.if_not_exists)
            .finish()
    }
}

/// SQL literal for `value` stored in `field`.
pub(crate) fn render_literal(
    dialect: &dyn Dialect,
    field: &FieldDescriptor,
    value: &Value,
) -> Result<String, StatementError> {
    let mismatch = |got| StatementError::TypeMismatch {
        column: field.name().to_string(),
        expected: field.base_type(),
        got,
    };

    match (field.base_type(), value) {
        (_, Value::Null) => Ok("NULL".to_string()),
        (BaseType::Text | BaseType::Date, Value::String(s)) => Ok(dialect.string_literal(s)),
        (BaseType::Integer, Value::Number(n)) => match n.as_i64() {
            Some(n) => Ok(n.to_string()),
            None if n.is_u64() => Err(mismatch("an integer out of range")),
            None => Err(mismatch("a non-integer number")),
        },
        (BaseType::Integer, Value::Bool(b)) => Ok(if *b { "1" } else { "0" }.to_string()),
        (_, Value::String(_)) => Err(mismatch("a string")),
        (_, Value::Number(_)) => Err(mismatch("a number")),
        (_, Value::Bool(_)) => Err(mismatch("a boolean")),
        (_, Value::Array(_)) => Err(mismatch("an array")),
        (_, Value::Object(_)) => Err(mismatch("an object")),
    }
}
