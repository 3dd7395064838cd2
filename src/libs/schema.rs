use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::libs::error::{ForeignKeyProblem, SchemaError, SchemaViolation};
use crate::libs::field::{FieldDescriptor, is_identifier};
use crate::libs::registry::{Catalog, SchemaRegistry, fold};

/// Validated, immutable description of one table.
///
/// The only way to obtain one is [`TableSchema::create`] (or `declare`), which
/// registers it, so every `TableSchema` in circulation satisfies these rules:
///
/// - the table name is an identifier and unique in its registry
/// - field names are unique (case-insensitively)
/// - at most one field is a primary key
/// - every foreign key points at the primary key of an already registered table
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl TableSchema {
    /// Validate `fields` as table `name` and register the result in `registry`.
    ///
    /// Every violation found is reported in the returned [`SchemaError`]. On
    /// failure the registry is left untouched.
    pub fn create(
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
        registry: &SchemaRegistry,
    ) -> Result<Arc<TableSchema>, SchemaError> {
        Self::register_validated(name.into(), fields, Vec::new(), registry)
    }

    /// Like [`create`](Self::create), for field declarations that have not
    /// been checked yet.
    ///
    /// Malformed fields are reported as `InvalidField` next to every other
    /// violation found among the well-formed ones. This is what the
    /// [`table!`](crate::table) macro expands to.
    pub fn declare(
        name: impl Into<String>,
        fields: Vec<Result<FieldDescriptor, SchemaViolation>>,
        registry: &SchemaRegistry,
    ) -> Result<Arc<TableSchema>, SchemaError> {
        let mut valid = Vec::with_capacity(fields.len());
        let mut invalid = Vec::new();
        for field in fields {
            match field {
                Ok(field) => valid.push(field),
                Err(violation) => invalid.push(violation),
            }
        }
        Self::register_validated(name.into(), valid, invalid, registry)
    }

    fn register_validated(
        name: String,
        fields: Vec<FieldDescriptor>,
        mut violations: Vec<SchemaViolation>,
        registry: &SchemaRegistry,
    ) -> Result<Arc<TableSchema>, SchemaError> {
        // Held across validation and insert so a concurrent registration can
        // neither take our name nor appear halfway through FK resolution.
        let mut catalog = registry.write();

        // An all-invalid declaration is not also an empty table.
        let declared_any = !fields.is_empty() || !violations.is_empty();
        violations.extend(
            validate(&name, &fields, &catalog)
                .into_iter()
                .filter(|v| !(declared_any && *v == SchemaViolation::EmptyTable)),
        );
        if !violations.is_empty() {
            warn!(
                "rejected table `{}` with {} violation(s)",
                name,
                violations.len()
            );
            return Err(SchemaError::new(name, violations));
        }

        let schema = catalog
            .insert(TableSchema {
                name: name.clone(),
                fields,
            })
            .map_err(|violation| SchemaError::new(name, vec![violation]))?;

        info!(
            "registered table `{}` ({} fields)",
            schema.name,
            schema.fields.len()
        );
        Ok(schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.is_primary_key())
    }

    /// One rendered line per field, in declaration order.
    pub fn describe(&self) -> Vec<String> {
        self.fields.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fields for table {}:", self.name)?;
        for field in &self.fields {
            writeln!(f, "\t{}", field)?;
        }
        Ok(())
    }
}

fn validate(name: &str, fields: &[FieldDescriptor], catalog: &Catalog) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    if !is_identifier(name) {
        violations.push(SchemaViolation::InvalidTableName {
            name: name.to_string(),
        });
    } else if catalog.get(name).is_some() {
        violations.push(SchemaViolation::DuplicateTable {
            table: name.to_string(),
        });
    }

    if fields.is_empty() {
        violations.push(SchemaViolation::EmptyTable);
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut primary_keys = Vec::new();
    for field in fields {
        let key = fold(field.name());
        if !seen.insert(key.clone()) && reported.insert(key) {
            violations.push(SchemaViolation::DuplicateFieldName {
                field: field.name().to_string(),
            });
        }
        if field.is_primary_key() {
            primary_keys.push(field.name().to_string());
        }
    }
    if primary_keys.len() > 1 {
        violations.push(SchemaViolation::MultiplePrimaryKeys {
            fields: primary_keys,
        });
    }

    for field in fields {
        let Some(target) = field.references() else {
            continue;
        };
        let Some(table) = catalog.get(&target.table) else {
            violations.push(SchemaViolation::UnknownReferencedTable {
                field: field.name().to_string(),
                target: target.clone(),
            });
            continue;
        };
        let problem = match table.field(&target.field) {
            None => Some(ForeignKeyProblem::MissingField),
            Some(referenced) if !referenced.is_primary_key() => {
                Some(ForeignKeyProblem::NotPrimaryKey)
            }
            Some(referenced) if referenced.base_type() != field.base_type() => {
                Some(ForeignKeyProblem::TypeMismatch)
            }
            Some(_) => None,
        };
        if let Some(problem) = problem {
            violations.push(SchemaViolation::InvalidForeignKeyTarget {
                field: field.name().to_string(),
                target: target.clone(),
                problem,
            });
        }
    }

    violations
}
