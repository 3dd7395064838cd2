use std::sync::Arc;

use log::info;

use crate::libs::config::EngineConfig;
use crate::libs::dialect::Dialect;
use crate::libs::engine::{Engine, RowSet, SqlxEngine};
use crate::libs::error::{EngineError, Result, SchemaError};
use crate::libs::field::FieldDescriptor;
use crate::libs::handle::TableHandle;
use crate::libs::registry::SchemaRegistry;
use crate::libs::schema::TableSchema;

/// A schema registry bound to one engine and one dialect.
///
/// Tables are declared against the registry, then `migrate` creates them in
/// the engine in registration order.
pub struct Database {
    config: EngineConfig,
    registry: SchemaRegistry,
    engine: Arc<dyn Engine>,
    dialect: Arc<dyn Dialect>,
}

impl Database {
    /// Open a sqlx pool for `config.database_url`.
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        let engine = SqlxEngine::connect(&config).await?;
        Ok(Self::with_engine(config, Arc::new(engine)))
    }

    /// Use a caller-supplied engine.
    pub fn with_engine(config: EngineConfig, engine: Arc<dyn Engine>) -> Self {
        let dialect = config.dialect_kind().dialect();
        info!(
            "schema layer ready ({} dialect, {})",
            dialect.name(),
            config.database_url
        );
        Self {
            config,
            registry: SchemaRegistry::new(),
            engine,
            dialect,
        }
    }

    /// Share an existing catalog instead of starting empty.
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Validate and register a table, returning its handle.
    pub fn declare(
        &self,
        name: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<TableHandle, SchemaError> {
        let schema = TableSchema::create(name, fields, &self.registry)?;
        Ok(self.handle(schema))
    }

    /// Handle for an already registered table.
    pub fn table(&self, name: &str) -> Option<TableHandle> {
        self.registry.lookup(name).map(|schema| self.handle(schema))
    }

    fn handle(&self, schema: Arc<TableSchema>) -> TableHandle {
        TableHandle::new(schema, Arc::clone(&self.engine), Arc::clone(&self.dialect))
            .if_not_exists(self.config.if_not_exists)
    }

    /// Create every registered table, in registration order.
    pub async fn migrate(&self) -> Result<(), EngineError> {
        for schema in self.registry.tables() {
            let sql = self.dialect.create_table(&schema, self.config.if_not_exists);
            self.engine.execute(&sql).await?;
            info!("migrated table `{}`", schema.name());
        }
        Ok(())
    }

    /// Execute raw SQL.
    pub async fn raw(&self, sql: &str) -> Result<RowSet, EngineError> {
        self.engine.execute(sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::dialect::DialectKind;
    use crate::libs::field::{FieldKind, ForeignKeyRef};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        statements: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Engine for Recorder {
        async fn execute(&self, sql: &str) -> Result<RowSet, EngineError> {
            self.statements.lock().push(sql.to_string());
            Ok(RowSet::default())
        }
    }

    fn database(recorder: &Arc<Recorder>) -> Database {
        let config = EngineConfig::new("postgres://localhost/films").with_dialect(DialectKind::Generic);
        Database::with_engine(config, recorder.clone())
    }

    #[tokio::test]
    async fn migrate_creates_tables_in_registration_order() {
        let recorder = Arc::new(Recorder::default());
        let db = database(&recorder);

        db.declare(
            "Director",
            vec![FieldDescriptor::plain("directorId", FieldKind::INTEGER | FieldKind::PRIMARY_KEY).unwrap()],
        )
        .unwrap();
        db.declare(
            "Movie",
            vec![
                FieldDescriptor::plain("title", FieldKind::TEXT).unwrap(),
                FieldDescriptor::foreign(
                    "directorId",
                    FieldKind::INTEGER,
                    ForeignKeyRef::new("Director", "directorId"),
                )
                .unwrap(),
            ],
        )
        .unwrap();
        db.migrate().await.unwrap();

        assert_eq!(
            *recorder.statements.lock(),
            [
                "CREATE TABLE IF NOT EXISTS Director (directorId INTEGER PRIMARY KEY)",
                "CREATE TABLE IF NOT EXISTS Movie (title TEXT, \
                 directorId INTEGER REFERENCES Director (directorId))",
            ]
        );
    }

    #[test]
    fn rejected_declaration_yields_no_handle() {
        let recorder = Arc::new(Recorder::default());
        let db = database(&recorder);

        let err = db
            .declare(
                "Movie",
                vec![FieldDescriptor::foreign(
                    "directorId",
                    FieldKind::INTEGER,
                    ForeignKeyRef::new("Director", "directorId"),
                )
                .unwrap()],
            )
            .unwrap_err();
        assert_eq!(err.table(), "Movie");
        assert!(db.table("Movie").is_none());
    }

    #[test]
    fn shared_registry_is_visible_to_both_databases() {
        let recorder = Arc::new(Recorder::default());
        let first = database(&recorder);
        let second = database(&recorder).with_registry(first.registry().clone());

        first
            .declare(
                "Director",
                vec![FieldDescriptor::plain("directorId", FieldKind::INTEGER | FieldKind::PRIMARY_KEY).unwrap()],
            )
            .unwrap();
        assert!(second.table("director").is_some());
        assert_eq!(second.dialect().name(), "generic");
    }
}
