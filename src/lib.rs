//! Declare relational tables as Rust values, validate them when they are
//! declared, and render the DDL an external SQL engine needs.
//!
//! ```ignore
//! use slintschema::*;
//!
//! let db = Database::connect(EngineConfig::new("sqlite::memory:")).await?;
//! table!(db.registry(), Director {
//!     directorId: INTEGER | PRIMARY_KEY,
//!     name: TEXT,
//! })?;
//! table!(db.registry(), Movie {
//!     title: TEXT,
//!     directorId: INTEGER | FOREIGN_KEY => Director.directorId,
//!     movieId: INTEGER | PRIMARY_KEY,
//! })?;
//! db.migrate().await?;
//! ```

pub mod libs;

pub use libs::*;
