//! Event deduplication: collapse bursts of repeated fault signals into
//! discrete activations.
//!
//! The source sensor emits one row per polling tick while a fault condition
//! persists, not one row per fault onset. A record is an activation when it
//! is the first occurrence of its fault name, or at least
//! [`DEBOUNCE_WINDOW_SECS`] after the previously retained record for that
//! same fault name (inclusive boundary). Different fault names debounce
//! independently and may interleave freely.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::models::MaintenanceRecord;

/// Minimum spacing between retained activations of the same fault.
pub const DEBOUNCE_WINDOW_SECS: i64 = 60;

/// Debounce a chronologically sorted record stream with the standard window.
pub fn debounce(records: Vec<MaintenanceRecord>) -> Vec<MaintenanceRecord> {
    debounce_with_window(records, DEBOUNCE_WINDOW_SECS)
}

/// Debounce with an explicit window.
///
/// Single left-to-right pass, O(n): one last-retained timestamp per fault
/// name, decisions are never revisited. Input must already be sorted
/// ascending by timestamp. Records with an unparsable time-of-day are skipped
/// (warning logged by [`MaintenanceRecord::timestamp`]) and do not move the
/// anchor for subsequent valid records.
pub fn debounce_with_window(
    records: Vec<MaintenanceRecord>,
    window_secs: i64,
) -> Vec<MaintenanceRecord> {
    let mut last_retained: HashMap<String, NaiveDateTime> = HashMap::new();
    let mut retained = Vec::with_capacity(records.len());

    for record in records {
        let Some(timestamp) = record.timestamp() else {
            continue;
        };
        match last_retained.get(&record.fault_name) {
            Some(anchor) if (timestamp - *anchor).num_seconds() < window_secs => {}
            _ => {
                last_retained.insert(record.fault_name.clone(), timestamp);
                retained.push(record);
            }
        }
    }

    retained
}
