//! Maintenance record models.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::FaultReference;

/// Time-of-day format used by the crane PLC log exports.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Human-facing crane label (`fc01`, `fc12`, ...).
pub fn crane_label(crane_id: i32) -> String {
    format!("fc{:02}", crane_id)
}

/// A raw fault event as parsed from one log line, before it is joined with a
/// fault reference. Immutable once stored; inserted or bulk-deleted, never
/// updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event_date: NaiveDate,
    /// Time-of-day as exported (`HH:MM:SS`). Kept verbatim; parsing happens
    /// lazily so one malformed row cannot poison a whole batch.
    pub event_time: String,
    pub act: i32,
    pub fault_name: String,
    pub crane_id: i32,
}

/// A stored fault event joined with its resolved fault reference. The unit
/// returned by every query operation; `fault` is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: i32,
    pub event_date: NaiveDate,
    pub event_time: String,
    pub act: i32,
    pub fault_name: String,
    pub crane_id: i32,
    pub fault: FaultReference,
}

impl MaintenanceRecord {
    /// Combined date + time-of-day timestamp at seconds precision.
    ///
    /// Returns `None` (with a logged warning) when the stored time-of-day does
    /// not parse; callers must skip such records without anchoring on them.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match NaiveTime::parse_from_str(&self.event_time, TIME_FORMAT) {
            Ok(time) => Some(self.event_date.and_time(time)),
            Err(_) => {
                warn!(
                    record_id = self.id,
                    event_time = %self.event_time,
                    "skipping record with unparsable time-of-day"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: &str) -> MaintenanceRecord {
        MaintenanceRecord {
            id: 1,
            event_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            event_time: time.to_string(),
            act: 1,
            fault_name: "Brake Fail".to_string(),
            crane_id: 2,
            fault: FaultReference {
                fault_id: 7,
                code: Some("175".to_string()),
                name: "Brake Fail".to_string(),
            },
        }
    }

    #[test]
    fn timestamp_combines_date_and_time() {
        let ts = record("10:00:30").timestamp().unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 10:00:30");
    }

    #[test]
    fn malformed_time_is_none() {
        assert!(record("25:99").timestamp().is_none());
    }

    #[test]
    fn crane_labels_are_zero_padded() {
        assert_eq!(crane_label(1), "fc01");
        assert_eq!(crane_label(12), "fc12");
    }
}
