use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::libs::field::{BaseType, FieldDescriptor, ForeignKeyRef};
use crate::libs::schema::TableSchema;

/// Translates field metadata into one SQL engine's vocabulary.
///
/// Only the type names and identifier quoting differ between the bundled
/// dialects; statement shape comes from the default methods.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn type_name(&self, base: BaseType) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String {
        ident.to_string()
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn references_clause(&self, target: &ForeignKeyRef) -> String {
        format!(
            "REFERENCES {} ({})",
            self.quote_identifier(&target.table),
            self.quote_identifier(&target.field)
        )
    }

    fn column_definition(&self, field: &FieldDescriptor) -> String {
        let mut col_def = format!(
            "{} {}",
            self.quote_identifier(field.name()),
            self.type_name(field.base_type())
        );
        if field.is_primary_key() {
            col_def.push_str(" PRIMARY KEY");
        }
        if let Some(target) = field.references() {
            col_def.push(' ');
            col_def.push_str(&self.references_clause(target));
        }
        col_def
    }

    fn create_table(&self, schema: &TableSchema, if_not_exists: bool) -> String {
        let mut sql = String::from("CREATE TABLE ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.quote_identifier(schema.name()));
        sql.push_str(" (");
        let cols: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| self.column_definition(f))
            .collect();
        sql.push_str(&cols.join(", "));
        sql.push(')');
        sql
    }
}

/// Field kinds rendered under their own names.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn type_name(&self, base: BaseType) -> &'static str {
        base.as_str()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    // DATE has numeric affinity in SQLite; ISO-8601 text keeps dates comparable.
    fn type_name(&self, base: BaseType) -> &'static str {
        match base {
            BaseType::Text | BaseType::Date => "TEXT",
            BaseType::Integer => "INTEGER",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    // Rows come back through the Any driver, which cannot decode a Postgres
    // DATE column; ISO-8601 text round-trips and still orders correctly.
    fn type_name(&self, base: BaseType) -> &'static str {
        match base {
            BaseType::Text | BaseType::Date => "TEXT",
            BaseType::Integer => "BIGINT",
        }
    }

    // Postgres folds unquoted names to lower case.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Dialect selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Generic,
    Sqlite,
    Postgres,
}

impl DialectKind {
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Generic => Arc::new(GenericDialect),
            DialectKind::Sqlite => Arc::new(SqliteDialect),
            DialectKind::Postgres => Arc::new(PostgresDialect),
        }
    }

    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("sqlite:") {
            DialectKind::Sqlite
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            DialectKind::Postgres
        } else {
            DialectKind::Generic
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Some(DialectKind::Generic),
            "sqlite" => Some(DialectKind::Sqlite),
            "postgres" | "postgresql" => Some(DialectKind::Postgres),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::field::FieldKind;
    use crate::libs::registry::SchemaRegistry;

    fn movie(registry: &SchemaRegistry) -> Arc<TableSchema> {
        TableSchema::create(
            "Director",
            vec![FieldDescriptor::plain("directorId", FieldKind::INTEGER | FieldKind::PRIMARY_KEY).unwrap()],
            registry,
        )
        .unwrap();
        TableSchema::create(
            "Movie",
            vec![
                FieldDescriptor::plain("title", FieldKind::TEXT).unwrap(),
                FieldDescriptor::plain("releaseDate", FieldKind::DATE).unwrap(),
                FieldDescriptor::foreign(
                    "directorId",
                    FieldKind::INTEGER,
                    ForeignKeyRef::new("Director", "directorId"),
                )
                .unwrap(),
                FieldDescriptor::plain("movieId", FieldKind::INTEGER | FieldKind::PRIMARY_KEY).unwrap(),
            ],
            registry,
        )
        .unwrap()
    }

    #[test]
    fn generic_uses_field_kind_names() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            GenericDialect.create_table(&movie(&registry), false),
            "CREATE TABLE Movie (title TEXT, releaseDate DATE, \
             directorId INTEGER REFERENCES Director (directorId), movieId INTEGER PRIMARY KEY)"
        );
    }

    #[test]
    fn sqlite_stores_dates_as_text() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            SqliteDialect.create_table(&movie(&registry), true),
            "CREATE TABLE IF NOT EXISTS Movie (title TEXT, releaseDate TEXT, \
             directorId INTEGER REFERENCES Director (directorId), movieId INTEGER PRIMARY KEY)"
        );
    }

    #[test]
    fn postgres_quotes_identifiers_and_stores_dates_as_text() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            PostgresDialect.create_table(&movie(&registry), false),
            "CREATE TABLE \"Movie\" (\"title\" TEXT, \"releaseDate\" TEXT, \
             \"directorId\" BIGINT REFERENCES \"Director\" (\"directorId\"), \
             \"movieId\" BIGINT PRIMARY KEY)"
        );
    }

    #[test]
    fn kind_from_url_and_name() {
        assert_eq!(DialectKind::from_url("sqlite::memory:"), DialectKind::Sqlite);
        assert_eq!(
            DialectKind::from_url("postgres://postgres@localhost:5432/postgres"),
            DialectKind::Postgres
        );
        assert_eq!(DialectKind::from_url("mysql://localhost"), DialectKind::Generic);
        assert_eq!(DialectKind::parse("PostgreSQL"), Some(DialectKind::Postgres));
        assert_eq!(DialectKind::parse("oracle"), None);
    }
}
