//! Data models for Cranewatch.

mod fault;
mod record;

pub use fault::FaultReference;
pub use record::{crane_label, MaintenanceRecord, RawEvent};
