//! Record aggregation: per-day fault counts, chart-series reduction and
//! summary statistics over deduplicated activations.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::MaintenanceRecord;

/// Maximum number of (date, count) pairs in a reduced chart series.
pub const MAX_CHART_BUCKETS: usize = 20;

/// Summary statistics over one chart group.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Sum of daily counts over the full, non-reduced range.
    pub total: u64,
    /// Total divided by the number of days in range (zero-count days
    /// included).
    pub per_day_avg: f64,
    /// Fault name with the highest raw occurrence count across all supplied
    /// activations, with that count.
    pub top_fault: Option<(String, u64)>,
}

/// Count activations per calendar day over the closed range `[start, end]`.
///
/// Every day of the range is present in the result, zero-count days
/// included, so charts show gaps explicitly rather than omitting days.
/// Activations outside the range are ignored.
pub fn daily_counts(
    activations: &[MaintenanceRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(NaiveDate, u32)> {
    let mut counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut day = start;
    while day <= end {
        counts.insert(day, 0);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    for record in activations {
        if let Some(slot) = counts.get_mut(&record.event_date) {
            *slot += 1;
        }
    }

    counts.into_iter().collect()
}

/// Reduce a sorted (date, count) series to at most [`MAX_CHART_BUCKETS`]
/// pairs.
///
/// The series is split into contiguous groups of `ceil(len / 20)` days (the
/// last group may be short). Each group contributes its maximum count (the
/// first maximum wins ties), keyed by the group's last calendar day rather
/// than the winning day. The x-axis label of a bucket is therefore always
/// that bucket's final date even though the value came from whichever day in
/// the bucket had the most faults.
pub fn reduce_series(days: &[(NaiveDate, u32)]) -> Vec<(NaiveDate, u32)> {
    if days.is_empty() {
        return Vec::new();
    }
    let group_size = usize::max(1, days.len().div_ceil(MAX_CHART_BUCKETS));

    let mut reduced = Vec::with_capacity(MAX_CHART_BUCKETS);
    for group in days.chunks(group_size) {
        let mut best = group[0].1;
        for &(_, count) in &group[1..] {
            if count > best {
                best = count;
            }
        }
        reduced.push((group[group.len() - 1].0, best));
    }
    reduced
}

/// Compute summary statistics from the full daily series and the activations
/// it was built from. The top fault is counted over all supplied activations,
/// independent of the bucket reduction.
pub fn summarize(activations: &[MaintenanceRecord], days: &[(NaiveDate, u32)]) -> Summary {
    let total: u64 = days.iter().map(|&(_, count)| u64::from(count)).sum();
    let per_day_avg = if days.is_empty() {
        0.0
    } else {
        total as f64 / days.len() as f64
    };

    let mut occurrences: HashMap<&str, u64> = HashMap::new();
    for record in activations {
        *occurrences.entry(record.fault_name.as_str()).or_insert(0) += 1;
    }
    let top_fault = occurrences
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, count)| (name.to_string(), count));

    Summary {
        total,
        per_day_avg,
        top_fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FaultReference;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn activation(date: &str, fault: &str) -> MaintenanceRecord {
        MaintenanceRecord {
            id: 0,
            event_date: day(date),
            event_time: "08:00:00".to_string(),
            act: 1,
            fault_name: fault.to_string(),
            crane_id: 1,
            fault: FaultReference {
                fault_id: 1,
                code: None,
                name: fault.to_string(),
            },
        }
    }

    #[test]
    fn daily_counts_cover_every_day_in_range() {
        let activations = vec![
            activation("2024-03-02", "Brake Fail"),
            activation("2024-03-02", "Brake Fail"),
            activation("2024-03-05", "Hoist Overload"),
            activation("2024-04-10", "Brake Fail"), // out of range
        ];
        let days = daily_counts(&activations, day("2024-03-01"), day("2024-03-31"));

        assert_eq!(days.len(), 31);
        let sum: u32 = days.iter().map(|&(_, c)| c).sum();
        assert_eq!(sum, 3);
        assert_eq!(days[0], (day("2024-03-01"), 0));
        assert_eq!(days[1], (day("2024-03-02"), 2));
    }

    #[test]
    fn short_range_is_not_reduced() {
        let days: Vec<_> = (1..=10).map(|d| (day(&format!("2024-03-{d:02}")), d as u32)).collect();
        let reduced = reduce_series(&days);
        assert_eq!(reduced, days);
    }

    #[test]
    fn reduction_never_exceeds_bucket_cap() {
        let days = daily_counts(&[], day("2024-01-01"), day("2024-12-31"));
        assert_eq!(days.len(), 366);
        let reduced = reduce_series(&days);
        assert!(reduced.len() <= MAX_CHART_BUCKETS);
    }

    #[test]
    fn bucket_is_labeled_with_its_last_day_not_the_winner() {
        // 40 days -> group size 2. Put the max of the first group on its
        // first day; the label must still be the group's second day.
        let mut days: Vec<_> = (0..40)
            .map(|i| (day("2024-01-01") + chrono::Duration::days(i), 0u32))
            .collect();
        days[0].1 = 9;
        days[1].1 = 3;

        let reduced = reduce_series(&days);
        assert_eq!(reduced.len(), 20);
        assert_eq!(reduced[0], (day("2024-01-02"), 9));
    }

    #[test]
    fn reduction_output_is_date_ascending() {
        let days = daily_counts(&[], day("2024-01-01"), day("2024-06-30"));
        let reduced = reduce_series(&days);
        for pair in reduced.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn summary_average_counts_zero_days() {
        let activations = vec![
            activation("2024-03-01", "Brake Fail"),
            activation("2024-03-01", "Brake Fail"),
            activation("2024-03-02", "Hoist Overload"),
        ];
        let days = daily_counts(&activations, day("2024-03-01"), day("2024-03-10"));
        let summary = summarize(&activations, &days);

        assert_eq!(summary.total, 3);
        assert!((summary.per_day_avg - 0.3).abs() < 1e-9);
        assert_eq!(summary.top_fault, Some(("Brake Fail".to_string(), 2)));
    }

    #[test]
    fn summary_of_empty_input() {
        let summary = summarize(&[], &[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.per_day_avg, 0.0);
        assert_eq!(summary.top_fault, None);
    }
}
