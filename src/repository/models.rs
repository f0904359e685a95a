//! Diesel ORM models for database tables.
//!
//! These models provide compile-time type checking for database operations.
//! Dates are stored as ISO-8601 TEXT, which keeps BETWEEN range scans
//! lexicographically correct.

use chrono::NaiveDate;
use diesel::prelude::*;

use crate::models::{FaultReference, MaintenanceRecord};
use crate::schema;

/// Date format used for the TEXT-typed date columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fault reference record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::fault_references)]
#[diesel(primary_key(fault_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FaultRow {
    pub fault_id: i32,
    pub fault_code: Option<String>,
    pub fault_name: String,
}

impl From<FaultRow> for FaultReference {
    fn from(row: FaultRow) -> Self {
        FaultReference {
            fault_id: row.fault_id,
            code: row.fault_code,
            name: row.fault_name,
        }
    }
}

/// New fault reference for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::fault_references)]
pub struct NewFault<'a> {
    pub fault_code: Option<&'a str>,
    pub fault_name: &'a str,
}

/// Maintenance record row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::maintenance_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordRow {
    pub id: i32,
    pub event_date: String,
    pub event_time: String,
    pub act: i32,
    pub fault_name: String,
    pub crane_id: i32,
    pub fault_id: i32,
}

impl RecordRow {
    /// Join a record row with its fault reference into the domain model.
    ///
    /// A date column that fails to parse maps to the Unix epoch rather than
    /// failing the whole result set, mirroring how datetime columns degrade
    /// elsewhere in the repository layer.
    pub fn into_record(self, fault: FaultRow) -> MaintenanceRecord {
        let event_date = NaiveDate::parse_from_str(&self.event_date, DATE_FORMAT)
            .unwrap_or(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        MaintenanceRecord {
            id: self.id,
            event_date,
            event_time: self.event_time,
            act: self.act,
            fault_name: self.fault_name,
            crane_id: self.crane_id,
            fault: fault.into(),
        }
    }
}

/// New maintenance record for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::maintenance_records)]
pub struct NewRecord<'a> {
    pub event_date: String,
    pub event_time: &'a str,
    pub act: i32,
    pub fault_name: &'a str,
    pub crane_id: i32,
    pub fault_id: i32,
}
