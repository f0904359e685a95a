//! Cranewatch - crane fleet fault and maintenance record tracker.
//!
//! Ingests PLC log exports, stores fault activations in SQLite, and answers
//! drill-down queries (raw records, frequency charts, bulk deletes) over a
//! chat front-end and a CLI.

pub mod bot;
pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;

pub use config::Settings;
