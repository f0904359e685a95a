//! Query routing: scope selectors to storage calls.
//!
//! Every crane x fault wildcard combination collapses into one query shape
//! with two optional filters, so the storage layer never needs to know
//! which menu path produced the request.

use chrono::NaiveDate;

use crate::bot::command::FaultScope;
use crate::bot::BotError;
use crate::models::{FaultReference, MaintenanceRecord};
use crate::repository::{FaultRepository, MaintenanceRepository};
use crate::services::dedup;

/// Outcome of resolving a fault selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultResolution {
    /// Selector resolved to a single optional filter; `None` means all
    /// faults.
    Resolved(Option<i32>),
    /// Keyword matched several references; the caller presents a choice
    /// menu.
    Choices(Vec<FaultReference>),
}

#[derive(Clone)]
pub struct QueryRouter {
    faults: FaultRepository,
    records: MaintenanceRepository,
}

impl QueryRouter {
    pub fn new(faults: FaultRepository, records: MaintenanceRepository) -> Self {
        Self { faults, records }
    }

    /// Resolve a fault selector. Keywords go through reference search:
    /// no match is a user error, one match resolves directly, several
    /// become a choice list.
    pub async fn resolve_fault(&self, scope: &FaultScope) -> Result<FaultResolution, BotError> {
        match scope {
            FaultScope::All => Ok(FaultResolution::Resolved(None)),
            FaultScope::Id(id) => Ok(FaultResolution::Resolved(Some(*id))),
            FaultScope::Keyword(keyword) => {
                let matches = self.faults.search(keyword).await?;
                match matches.as_slice() {
                    [] => Err(BotError::Validation(format!(
                        "no fault matches \"{keyword}\""
                    ))),
                    [single] => Ok(FaultResolution::Resolved(Some(single.fault_id))),
                    _ => Ok(FaultResolution::Choices(matches)),
                }
            }
        }
    }

    /// Fetch records for a resolved scope, debounced.
    ///
    /// Consecutive activations of the same fault within the debounce window
    /// are one physical incident, so the raw rows are collapsed before
    /// anything user-facing sees them.
    pub async fn fetch(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        crane_id: Option<i32>,
        fault_id: Option<i32>,
    ) -> Result<Vec<MaintenanceRecord>, BotError> {
        let rows = self
            .records
            .records_in_range(start, end, crane_id, fault_id)
            .await?;
        Ok(dedup::debounce(rows))
    }

    /// Count raw rows in scope. Deletes operate on storage rows, not
    /// debounced incidents, so the count shown before a delete matches
    /// what the delete will remove.
    pub async fn count(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        crane_id: Option<i32>,
        fault_id: Option<i32>,
    ) -> Result<i64, BotError> {
        Ok(self
            .records
            .count_in_range(start, end, crane_id, fault_id)
            .await?)
    }

    /// Delete raw rows in scope, returning how many went away.
    pub async fn delete(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        crane_id: Option<i32>,
        fault_id: Option<i32>,
    ) -> Result<usize, BotError> {
        Ok(self
            .records
            .delete_in_range(start, end, crane_id, fault_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEvent;
    use crate::repository::{migrations, AsyncSqlitePool};
    use tempfile::tempdir;

    async fn setup() -> (QueryRouter, FaultRepository, MaintenanceRepository, tempfile::TempDir)
    {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("test.db"));
        migrations::run(&pool).await.unwrap();
        let faults = FaultRepository::new(pool.clone());
        let records = MaintenanceRepository::new(pool);
        (
            QueryRouter::new(faults.clone(), records.clone()),
            faults,
            records,
            dir,
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(time: &str, fault: &str, crane: i32) -> RawEvent {
        RawEvent {
            event_date: date(2024, 1, 10),
            event_time: time.to_string(),
            act: 1,
            fault_name: fault.to_string(),
            crane_id: crane,
        }
    }

    #[tokio::test]
    async fn keyword_resolution_modes() {
        let (router, faults, _records, _dir) = setup().await;
        faults.get_or_create("(175)Brake Fail").await.unwrap();
        faults.get_or_create("(201)Hoist Overload").await.unwrap();
        faults.get_or_create("(202)Hoist Brake Worn").await.unwrap();

        let err = router
            .resolve_fault(&FaultScope::Keyword("gantry".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Validation(_)));

        let single = router
            .resolve_fault(&FaultScope::Keyword("overload".to_string()))
            .await
            .unwrap();
        assert!(matches!(single, FaultResolution::Resolved(Some(_))));

        let many = router
            .resolve_fault(&FaultScope::Keyword("brake".to_string()))
            .await
            .unwrap();
        match many {
            FaultResolution::Choices(choices) => assert_eq!(choices.len(), 2),
            other => panic!("expected choices, got {other:?}"),
        }

        assert_eq!(
            router.resolve_fault(&FaultScope::All).await.unwrap(),
            FaultResolution::Resolved(None)
        );
    }

    #[tokio::test]
    async fn fetch_debounces_but_count_is_raw() {
        let (router, faults, records, _dir) = setup().await;
        let brake = faults.get_or_create("Brake Fail").await.unwrap();
        records
            .insert_events(&[
                (event("10:00:00", "Brake Fail", 1), brake.fault_id),
                (event("10:00:30", "Brake Fail", 1), brake.fault_id),
                (event("10:02:00", "Brake Fail", 1), brake.fault_id),
            ])
            .await
            .unwrap();

        let start = date(2024, 1, 1);
        let end = date(2024, 1, 31);
        let fetched = router.fetch(start, end, Some(1), None).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(router.count(start, end, Some(1), None).await.unwrap(), 3);

        assert_eq!(router.delete(start, end, Some(1), None).await.unwrap(), 3);
        assert_eq!(router.count(start, end, Some(1), None).await.unwrap(), 0);
    }
}
