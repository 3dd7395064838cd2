pub mod config;
pub mod database;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod field;
pub mod handle;
mod macros;
pub mod query_builder;
pub mod registry;
pub mod schema;

// Re-export them for easier access from the crate root
pub use config::*;
pub use database::*;
pub use dialect::*;
pub use engine::*;
pub use error::*;
pub use field::*;
pub use handle::*;
pub use query_builder::*;
pub use registry::*;
pub use schema::*;
