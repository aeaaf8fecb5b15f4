//! SQL Generation
//!
//! Renders query state and write operations into parameterized PostgreSQL.

pub mod generation;

pub use generation::{delete_sql, insert_sql, select_sql, update_sql, SqlStatement};
