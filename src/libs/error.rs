use std::fmt;

use thiserror::Error;

use crate::libs::field::{BaseType, ForeignKeyRef};

/// Why a single field declaration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidFieldReason {
    #[error("field name is empty")]
    EmptyName,
    #[error("field name is not a SQL identifier")]
    NotAnIdentifier,
    #[error("no base type (TEXT, DATE or INTEGER) is set")]
    MissingBaseType,
    #[error("more than one base type is set")]
    MultipleBaseTypes,
    #[error("unknown flag bits {0:#x}")]
    UnknownFlags(u32),
    #[error("FOREIGN_KEY is set but no reference target was given")]
    MissingReference,
    #[error("a reference target was given without FOREIGN_KEY")]
    UnexpectedReference,
    #[error("malformed reference target `{0}`, expected `table.field`")]
    MalformedReference(String),
}

/// One relational integrity rule broken by a table declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        field: String,
        reason: InvalidFieldReason,
    },

    #[error("invalid table name `{name}`")]
    InvalidTableName { name: String },

    #[error("table declares no fields")]
    EmptyTable,

    #[error("field `{field}` is declared more than once")]
    DuplicateFieldName { field: String },

    #[error("more than one primary key: {}", .fields.join(", "))]
    MultiplePrimaryKeys { fields: Vec<String> },

    #[error("field `{field}` references unknown table `{}`", .target.table)]
    UnknownReferencedTable { field: String, target: ForeignKeyRef },

    #[error("field `{field}` references `{target}`, which is {problem}")]
    InvalidForeignKeyTarget {
        field: String,
        target: ForeignKeyRef,
        problem: ForeignKeyProblem,
    },

    #[error("table `{table}` is already registered")]
    DuplicateTable { table: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyProblem {
    MissingField,
    NotPrimaryKey,
    TypeMismatch,
}

impl fmt::Display for ForeignKeyProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignKeyProblem::MissingField => f.write_str("not a field of that table"),
            ForeignKeyProblem::NotPrimaryKey => f.write_str("not that table's primary key"),
            ForeignKeyProblem::TypeMismatch => f.write_str("of a different base type"),
        }
    }
}

/// Aggregate failure of a table declaration.
///
/// Carries every violation found in one validation pass; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("table `{table}` rejected: {}", render_violations(.violations))]
pub struct SchemaError {
    table: String,
    violations: Vec<SchemaViolation>,
}

impl SchemaError {
    pub(crate) fn new(table: impl Into<String>, violations: Vec<SchemaViolation>) -> Self {
        debug_assert!(!violations.is_empty());
        Self {
            table: table.into(),
            violations,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<SchemaViolation> {
        self.violations
    }

    /// True when at least one violation satisfies `pred`.
    pub fn any(&self, pred: impl Fn(&SchemaViolation) -> bool) -> bool {
        self.violations.iter().any(pred)
    }
}

fn render_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while rendering DML text from a bound schema.
#[derive(Debug, Error)]
pub enum StatementError {
    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },

    #[error("column `{column}` expects {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: BaseType,
        got: &'static str,
    },

    #[error("row for table `{table}` must serialize to an object")]
    NotAnObject { table: String },

    #[error("row for table `{table}` has no columns")]
    EmptyRow { table: String },

    #[error("row for table `{table}` sets column `{column}` more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("column `{column}` cannot be compared to NULL with `{op}`")]
    NullComparison { column: String, op: String },

    #[error("unsupported comparison operator `{0}`")]
    UnsupportedOperator(String),

    #[error("unsupported sort direction `{0}`")]
    UnsupportedDirection(String),

    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by the external SQL engine, surfaced unmodified.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Engine(EngineError::Sqlx(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
