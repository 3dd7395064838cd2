//! Process-wide catalog of registered tables.
//!
//! The registry is the only place cross-table knowledge lives: foreign keys
//! are resolved against it, and table handles look their schema up in it.
//! Entries are only ever added (through [`TableSchema::create`]) and never
//! removed.
//!
//! Registration holds the write lock for the whole validate-then-insert
//! step; lookups share a read lock and therefore never observe a
//! half-inserted schema.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::libs::error::{SchemaError, SchemaViolation};
use crate::libs::field::FieldDescriptor;
use crate::libs::schema::TableSchema;

/// Shared catalog of [`TableSchema`]s, keyed case-insensitively by name.
///
/// Cloning yields another handle to the same catalog. Tests create a fresh
/// registry per case instead of sharing a global one.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    inner: Arc<RwLock<Catalog>>,
}

#[derive(Debug, Default)]
pub(crate) struct Catalog {
    by_name: HashMap<String, Arc<TableSchema>>,
    /// Registration order; always a valid creation order for the engine.
    order: Vec<Arc<TableSchema>>,
}

impl Catalog {
    pub(crate) fn get(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.by_name.get(&fold(name))
    }

    pub(crate) fn insert(
        &mut self,
        schema: TableSchema,
    ) -> Result<Arc<TableSchema>, SchemaViolation> {
        let key = fold(schema.name());
        if self.by_name.contains_key(&key) {
            return Err(SchemaViolation::DuplicateTable {
                table: schema.name().to_string(),
            });
        }
        let schema = Arc::new(schema);
        self.by_name.insert(key, Arc::clone(&schema));
        self.order.push(Arc::clone(&schema));
        Ok(schema)
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.inner.write()
    }

    /// Register a schema that was validated against another registry.
    ///
    /// The schema is validated again here, since its foreign key targets
    /// must exist in this registry too.
    pub fn register(&self, schema: &TableSchema) -> Result<Arc<TableSchema>, SchemaError> {
        TableSchema::create(schema.name(), schema.fields().to_vec(), self)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.inner.read().get(name).cloned()
    }

    pub fn lookup_field(&self, table: &str, field: &str) -> Option<FieldDescriptor> {
        self.inner
            .read()
            .get(table)
            .and_then(|schema| schema.field(field).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().get(name).is_some()
    }

    /// Registered schemas in registration order.
    pub fn tables(&self) -> Vec<Arc<TableSchema>> {
        self.inner.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }
}

/// Registry key for a table or field name.
pub(crate) fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::field::FieldKind;
    use std::thread;

    fn schema(name: &str) -> Arc<TableSchema> {
        TableSchema::create(
            name,
            vec![FieldDescriptor::plain("id", FieldKind::INTEGER | FieldKind::PRIMARY_KEY).unwrap()],
            &SchemaRegistry::new(),
        )
        .unwrap()
    }

    #[test]
    fn register_rejects_duplicate_names_case_insensitively() {
        let registry = SchemaRegistry::new();
        registry.register(&schema("Movie")).unwrap();

        let err = registry.register(&schema("MOVIE")).unwrap_err();
        assert_eq!(
            err.violations(),
            [SchemaViolation::DuplicateTable {
                table: "MOVIE".into()
            }]
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("movie").unwrap().name(), "Movie");
    }

    #[test]
    fn lookup_field_resolves_through_table() {
        let registry = SchemaRegistry::new();
        registry.register(&schema("Director")).unwrap();

        let id = registry.lookup_field("Director", "ID").unwrap();
        assert!(id.is_primary_key());
        assert!(registry.lookup_field("Director", "name").is_none());
        assert!(registry.lookup_field("Studio", "id").is_none());
    }

    #[test]
    fn concurrent_registration_admits_one_winner() {
        let registry = SchemaRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    TableSchema::create(
                        "Movie",
                        vec![FieldDescriptor::plain("title", FieldKind::TEXT).unwrap()],
                        &registry,
                    )
                    .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }
}
