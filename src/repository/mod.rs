//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking over
//! an async SQLite connection factory.

pub mod fault;
pub mod maintenance;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod util;

pub use fault::FaultRepository;
pub use maintenance::MaintenanceRepository;
pub use pool::{AsyncSqlitePool, DieselError};
