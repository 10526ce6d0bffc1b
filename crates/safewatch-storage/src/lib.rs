//! SafeWatch Storage - Database access layer
//!
//! This crate owns the PostgreSQL pool, the schema migrations, the row
//! models and one repository per table family.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
