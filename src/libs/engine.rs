use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row};

use crate::libs::config::EngineConfig;
use crate::libs::error::EngineError;

/// The external SQL engine: takes literal statement text, returns rows.
///
/// Implementations may block on I/O; timeouts and retries are theirs to
/// decide. Nothing in this crate retries a failed statement.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<RowSet, EngineError>;
}

/// Rows returned by a statement, decoded into JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.rows.iter()
    }

    /// Deserialize each row into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Vec<T>, serde_json::Error> {
        self.rows
            .into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)))
            .collect()
    }
}

/// [`Engine`] over a sqlx `AnyPool`.
#[derive(Debug, Clone)]
pub struct SqlxEngine {
    pool: AnyPool,
}

impl SqlxEngine {
    pub async fn connect(config: &EngineConfig) -> Result<Self, EngineError> {
        sqlx::any::install_default_drivers();

        let mut options = AnyPoolOptions::new().max_connections(config.max_connections);
        if config.is_in_memory_sqlite() {
            // Each connection would otherwise see its own empty database.
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        debug!("connecting to {}", config.database_url);
        let pool = options.connect(&config.database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Engine for SqlxEngine {
    async fn execute(&self, sql: &str) -> Result<RowSet, EngineError> {
        debug!("executing: {}", sql);
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let columns = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows.iter().map(row_to_json).collect();
        Ok(RowSet { columns, rows })
    }
}

fn row_to_json(r: &AnyRow) -> Map<String, Value> {
    let mut map = Map::new();
    for col in r.columns() {
        let col_name = col.name();
        let value = match r.try_get::<Option<i64>, _>(col_name) {
            Ok(Some(v)) => Value::from(v),
            Ok(None) => Value::Null,
            Err(_) => match r.try_get::<Option<f64>, _>(col_name) {
                Ok(Some(v)) => Value::from(v),
                Ok(None) => Value::Null,
                Err(_) => match r.try_get::<Option<bool>, _>(col_name) {
                    Ok(Some(v)) => Value::from(v),
                    Ok(None) => Value::Null,
                    Err(_) => match r.try_get::<Option<String>, _>(col_name) {
                        Ok(Some(v)) => Value::from(v),
                        Ok(None) => Value::Null,
                        Err(_) => Value::Null,
                    },
                },
            },
        };
        map.insert(col_name.to_string(), value);
    }
    map
}
