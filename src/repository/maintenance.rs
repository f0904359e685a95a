//! Maintenance record repository.
//!
//! All query shapes share one optional-filter form: a closed date range plus
//! optional crane and fault filters. The crane/fault "all" wildcards from the
//! menu layer map to `None` here.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel::sqlite::Sqlite;
use diesel_async::RunQueryDsl;

use super::models::{FaultRow, NewRecord, RecordRow, DATE_FORMAT};
use super::pool::{AsyncSqlitePool, DieselError};
use crate::models::{FaultReference, MaintenanceRecord, RawEvent};
use crate::schema::{fault_references, maintenance_records};

/// Boxed predicate over the records table, shared by delete and count.
type RecordPredicate =
    Box<dyn BoxableExpression<maintenance_records::table, Sqlite, SqlType = Bool>>;

fn date_str(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn range_predicate(
    start: NaiveDate,
    end: NaiveDate,
    crane_id: Option<i32>,
    fault_id: Option<i32>,
) -> RecordPredicate {
    let mut pred: RecordPredicate = Box::new(
        maintenance_records::event_date.between(date_str(start), date_str(end)),
    );
    if let Some(crane) = crane_id {
        pred = Box::new(pred.and(maintenance_records::crane_id.eq(crane)));
    }
    if let Some(fault) = fault_id {
        pred = Box::new(pred.and(maintenance_records::fault_id.eq(fault)));
    }
    pred
}

/// Repository for maintenance records.
#[derive(Clone)]
pub struct MaintenanceRepository {
    pool: AsyncSqlitePool,
}

impl MaintenanceRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch of raw events already resolved to their fault ids.
    ///
    /// Rows go in one at a time; SQLite through the async wrapper has no
    /// batch insert form.
    pub async fn insert_events(
        &self,
        events: &[(RawEvent, i32)],
    ) -> Result<usize, DieselError> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await?;

        let mut inserted = 0;
        for (event, fault_id) in events {
            let row = NewRecord {
                event_date: date_str(event.event_date),
                event_time: &event.event_time,
                act: event.act,
                fault_name: &event.fault_name,
                crane_id: event.crane_id,
                fault_id: *fault_id,
            };
            inserted += diesel::insert_into(maintenance_records::table)
                .values(&row)
                .execute(&mut conn)
                .await?;
        }
        Ok(inserted)
    }

    /// Range scan joined against fault references, optionally filtered by
    /// crane and/or fault, sorted ascending by (date, time-of-day).
    ///
    /// The ascending sort is what the downstream debounce pass relies on.
    pub async fn records_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        crane_id: Option<i32>,
        fault_id: Option<i32>,
    ) -> Result<Vec<MaintenanceRecord>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = maintenance_records::table
            .inner_join(fault_references::table)
            .select((RecordRow::as_select(), FaultRow::as_select()))
            .order((
                maintenance_records::event_date.asc(),
                maintenance_records::event_time.asc(),
            ))
            .into_boxed();
        query = query.filter(
            maintenance_records::event_date.between(date_str(start), date_str(end)),
        );
        if let Some(crane) = crane_id {
            query = query.filter(maintenance_records::crane_id.eq(crane));
        }
        if let Some(fault) = fault_id {
            query = query.filter(maintenance_records::fault_id.eq(fault));
        }

        let rows: Vec<(RecordRow, FaultRow)> = query.load(&mut conn).await?;
        Ok(rows
            .into_iter()
            .map(|(record, fault)| record.into_record(fault))
            .collect())
    }

    /// Count rows matching the same filter shape as [`records_in_range`].
    pub async fn count_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        crane_id: Option<i32>,
        fault_id: Option<i32>,
    ) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        maintenance_records::table
            .filter(range_predicate(start, end, crane_id, fault_id))
            .count()
            .get_result(&mut conn)
            .await
    }

    /// Bulk delete by the same filter shape, returning the affected-row
    /// count. Deletes raw stored rows; debounce never applies here.
    pub async fn delete_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        crane_id: Option<i32>,
        fault_id: Option<i32>,
    ) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::delete(
            maintenance_records::table.filter(range_predicate(start, end, crane_id, fault_id)),
        )
        .execute(&mut conn)
        .await
    }

    /// Distinct crane ids present in storage, ascending.
    pub async fn distinct_cranes(&self) -> Result<Vec<i32>, DieselError> {
        let mut conn = self.pool.get().await?;

        maintenance_records::table
            .select(maintenance_records::crane_id)
            .distinct()
            .order(maintenance_records::crane_id.asc())
            .load(&mut conn)
            .await
    }

    /// Distinct years with data, globally or for one crane, ascending.
    pub async fn distinct_years(&self, crane_id: Option<i32>) -> Result<Vec<i32>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = maintenance_records::table
            .select(maintenance_records::event_date)
            .distinct()
            .into_boxed();
        if let Some(crane) = crane_id {
            query = query.filter(maintenance_records::crane_id.eq(crane));
        }

        let dates: Vec<String> = query.load(&mut conn).await?;
        let mut years: Vec<i32> = dates
            .iter()
            .filter_map(|date| date.get(..4)?.parse().ok())
            .collect();
        years.sort_unstable();
        years.dedup();
        Ok(years)
    }

    /// Distinct faults occurring in a range, globally or for one crane,
    /// ordered by fault id for stable menu pagination. Codes are not carried
    /// by the records table; the references returned here have `code: None`.
    pub async fn faults_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        crane_id: Option<i32>,
    ) -> Result<Vec<FaultReference>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = maintenance_records::table
            .select((
                maintenance_records::fault_id,
                maintenance_records::fault_name,
            ))
            .distinct()
            .order(maintenance_records::fault_id.asc())
            .into_boxed();
        query = query.filter(
            maintenance_records::event_date.between(date_str(start), date_str(end)),
        );
        if let Some(crane) = crane_id {
            query = query.filter(maintenance_records::crane_id.eq(crane));
        }

        let rows: Vec<(i32, String)> = query.load(&mut conn).await?;
        Ok(rows
            .into_iter()
            .map(|(fault_id, name)| FaultReference {
                fault_id,
                code: None,
                name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{migrations, FaultRepository};
    use tempfile::tempdir;

    async fn setup() -> (MaintenanceRepository, FaultRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("test.db"));
        migrations::run(&pool).await.unwrap();
        (
            MaintenanceRepository::new(pool.clone()),
            FaultRepository::new(pool),
            dir,
        )
    }

    fn event(date: &str, time: &str, fault: &str, crane: i32) -> RawEvent {
        RawEvent {
            event_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            event_time: time.to_string(),
            act: 1,
            fault_name: fault.to_string(),
            crane_id: crane,
        }
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    async fn seed(records: &MaintenanceRepository, faults: &FaultRepository) -> (i32, i32) {
        let brake = faults.get_or_create("Brake Fail").await.unwrap();
        let hoist = faults.get_or_create("Hoist Overload").await.unwrap();
        records
            .insert_events(&[
                (event("2024-03-01", "10:00:00", "Brake Fail", 1), brake.fault_id),
                (event("2024-03-01", "09:00:00", "Brake Fail", 1), brake.fault_id),
                (event("2024-03-05", "12:00:00", "Hoist Overload", 2), hoist.fault_id),
                (event("2023-11-20", "08:30:00", "Brake Fail", 2), brake.fault_id),
            ])
            .await
            .unwrap();
        (brake.fault_id, hoist.fault_id)
    }

    #[tokio::test]
    async fn range_scan_is_sorted_and_joined() {
        let (records, faults, _dir) = setup().await;
        let (brake, _) = seed(&records, &faults).await;

        let all = records
            .records_in_range(day("2024-03-01"), day("2024-03-31"), None, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        // Ascending by (date, time)
        assert_eq!(all[0].event_time, "09:00:00");
        assert_eq!(all[1].event_time, "10:00:00");
        assert_eq!(all[0].fault.name, "Brake Fail");

        let crane_only = records
            .records_in_range(day("2024-03-01"), day("2024-03-31"), Some(1), None)
            .await
            .unwrap();
        assert_eq!(crane_only.len(), 2);

        let both = records
            .records_in_range(day("2024-03-01"), day("2024-03-31"), Some(1), Some(brake))
            .await
            .unwrap();
        assert_eq!(both.len(), 2);

        let none = records
            .records_in_range(day("2025-01-01"), day("2025-01-31"), None, None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn insert_batch_reports_row_count() {
        let (records, faults, _dir) = setup().await;
        let brake = faults.get_or_create("Brake Fail").await.unwrap();

        let batch: Vec<_> = (0..5)
            .map(|i| {
                (
                    event("2024-06-01", &format!("0{i}:00:00"), "Brake Fail", 1),
                    brake.fault_id,
                )
            })
            .collect();
        assert_eq!(records.insert_events(&batch).await.unwrap(), 5);
        assert_eq!(records.insert_events(&[]).await.unwrap(), 0);

        let total = records
            .count_in_range(day("2024-06-01"), day("2024-06-30"), None, None)
            .await
            .unwrap();
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn delete_and_count_share_filter_shape() {
        let (records, faults, _dir) = setup().await;
        let (brake, _) = seed(&records, &faults).await;

        let count = records
            .count_in_range(day("2024-03-01"), day("2024-03-31"), Some(1), Some(brake))
            .await
            .unwrap();
        assert_eq!(count, 2);

        let deleted = records
            .delete_in_range(day("2024-03-01"), day("2024-03-31"), Some(1), Some(brake))
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let remaining = records
            .count_in_range(day("2023-01-01"), day("2024-12-31"), None, None)
            .await
            .unwrap();
        assert_eq!(remaining, 2);
    }

    #[tokio::test]
    async fn distinct_listings() {
        let (records, faults, _dir) = setup().await;
        seed(&records, &faults).await;

        assert_eq!(records.distinct_cranes().await.unwrap(), vec![1, 2]);
        assert_eq!(records.distinct_years(None).await.unwrap(), vec![2023, 2024]);
        assert_eq!(records.distinct_years(Some(1)).await.unwrap(), vec![2024]);

        let faults_march = records
            .faults_in_range(day("2024-03-01"), day("2024-03-31"), None)
            .await
            .unwrap();
        assert_eq!(faults_march.len(), 2);

        let faults_crane1 = records
            .faults_in_range(day("2024-03-01"), day("2024-03-31"), Some(1))
            .await
            .unwrap();
        assert_eq!(faults_crane1.len(), 1);
        assert_eq!(faults_crane1[0].name, "Brake Fail");
    }
}
