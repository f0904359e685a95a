//! Chart seam: the aggregation side of graph generation.
//!
//! Rasterization itself is an external collaborator behind
//! [`ChartRenderer`]; this module only assembles the data a renderer needs
//! for one (crane, fault) group.

use chrono::NaiveDate;

use super::aggregate::{self, Summary};
use crate::models::MaintenanceRecord;

/// Everything a renderer needs to draw one fault-frequency chart.
#[derive(Debug, Clone)]
pub struct ChartInput {
    pub crane_id: i32,
    pub fault_name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Reduced (date, count) series, at most 20 pairs, date-ascending.
    pub series: Vec<(NaiveDate, u32)>,
    /// Statistics over the full non-reduced range.
    pub summary: Summary,
}

impl ChartInput {
    /// Aggregate one group of activations into chart data.
    pub fn build(
        crane_id: i32,
        fault_name: String,
        activations: &[MaintenanceRecord],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        let days = aggregate::daily_counts(activations, start, end);
        let series = aggregate::reduce_series(&days);
        let summary = aggregate::summarize(activations, &days);
        Self {
            crane_id,
            fault_name,
            start,
            end,
            series,
            summary,
        }
    }
}

/// Renders a [`ChartInput`] to an image.
///
/// Implementations are synchronous and CPU-bound; callers run them through
/// `spawn_blocking` so rendering never blocks the event-intake path.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, input: &ChartInput) -> anyhow::Result<Vec<u8>>;
}
