//! Fault reference repository.
//!
//! Lookups resolve by normalized name; creation is get-or-create against the
//! store's unique constraint. There is deliberately no in-memory registry:
//! concurrent creators of the same name are resolved by insert-on-conflict
//! plus re-select, first writer wins.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{FaultRow, NewFault};
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::to_diesel_error;
use crate::models::FaultReference;
use crate::schema::fault_references;

/// Maximum number of keyword-search matches returned.
pub const SEARCH_LIMIT: i64 = 50;

/// Repository for the fault reference table.
#[derive(Clone)]
pub struct FaultRepository {
    pool: AsyncSqlitePool,
}

impl FaultRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Get a fault reference by id.
    pub async fn get(&self, fault_id: i32) -> Result<Option<FaultReference>, DieselError> {
        let mut conn = self.pool.get().await?;

        fault_references::table
            .find(fault_id)
            .first::<FaultRow>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(FaultReference::from))
    }

    /// Resolve a raw fault name to its reference, creating it on first
    /// sighting.
    ///
    /// The raw name is normalized for the lookup (parenthesized segments
    /// stripped, leading `(code)` harvested); the insert tolerates a
    /// concurrent creator winning the race and re-selects afterwards.
    pub async fn get_or_create(&self, raw_name: &str) -> Result<FaultReference, DieselError> {
        let (code, name) = FaultReference::normalize(raw_name);
        let mut conn = self.pool.get().await?;

        if let Some(row) = fault_references::table
            .filter(fault_references::fault_name.eq(&name))
            .first::<FaultRow>(&mut conn)
            .await
            .optional()?
        {
            return Ok(row.into());
        }

        diesel::insert_into(fault_references::table)
            .values(NewFault {
                fault_code: code.as_deref(),
                fault_name: &name,
            })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;

        // Re-select: picks up our row or the concurrent winner's.
        fault_references::table
            .filter(fault_references::fault_name.eq(&name))
            .first::<FaultRow>(&mut conn)
            .await
            .optional()?
            .map(FaultReference::from)
            .ok_or_else(|| to_diesel_error(format!("fault reference vanished after insert: {name}")))
    }

    /// Upsert one library entry with an explicit code. Used by the fault
    /// library import; duplicate (code, name) pairs are ignored.
    pub async fn import_reference(
        &self,
        code: Option<&str>,
        name: &str,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_into(fault_references::table)
            .values(NewFault {
                fault_code: code,
                fault_name: name,
            })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Keyword search over code, name and id, capped at [`SEARCH_LIMIT`].
    ///
    /// A purely numeric keyword additionally matches the fault id exactly.
    pub async fn search(&self, keyword: &str) -> Result<Vec<FaultReference>, DieselError> {
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await?;

        let pattern = format!("%{}%", keyword);
        let mut query = fault_references::table
            .order(fault_references::fault_id.asc())
            .into_boxed();
        query = query.filter(
            fault_references::fault_code
                .like(pattern.clone())
                .or(fault_references::fault_name.like(pattern)),
        );
        if let Ok(id) = keyword.parse::<i32>() {
            query = query.or_filter(fault_references::fault_id.eq(id));
        }

        query
            .limit(SEARCH_LIMIT)
            .load::<FaultRow>(&mut conn)
            .await
            .map(|rows| rows.into_iter().map(FaultReference::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::migrations;
    use tempfile::tempdir;

    async fn setup() -> (FaultRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("test.db"));
        migrations::run(&pool).await.unwrap();
        (FaultRepository::new(pool), dir)
    }

    #[tokio::test]
    async fn get_or_create_is_stable_across_code_variants() {
        let (repo, _dir) = setup().await;

        let first = repo.get_or_create("(175)Brake Fail").await.unwrap();
        assert_eq!(first.code.as_deref(), Some("175"));
        assert_eq!(first.name, "Brake Fail");

        // Same normalized name resolves to the same surrogate key.
        let second = repo.get_or_create("Brake Fail").await.unwrap();
        assert_eq!(second.fault_id, first.fault_id);

        let third = repo.get_or_create("(175)Brake Fail").await.unwrap();
        assert_eq!(third.fault_id, first.fault_id);
    }

    #[tokio::test]
    async fn import_ignores_duplicates() {
        let (repo, _dir) = setup().await;

        repo.import_reference(Some("175"), "Brake Fail").await.unwrap();
        repo.import_reference(Some("175"), "Brake Fail").await.unwrap();

        let matches = repo.search("Brake").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].label(), "175-Brake Fail");
    }

    #[tokio::test]
    async fn import_without_code_stays_unique() {
        let (repo, _dir) = setup().await;

        repo.import_reference(None, "Hoist Overload").await.unwrap();
        repo.import_reference(None, "Hoist Overload").await.unwrap();

        let matches = repo.search("Hoist").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].code.is_none());
    }

    #[tokio::test]
    async fn search_matches_code_name_and_id() {
        let (repo, _dir) = setup().await;

        let brake = repo.get_or_create("(175)Brake Fail").await.unwrap();
        repo.get_or_create("(201)Hoist Overload").await.unwrap();

        let by_code = repo.search("175").await.unwrap();
        assert!(by_code.iter().any(|f| f.fault_id == brake.fault_id));

        let by_name = repo.search("hoist").await.unwrap();
        assert_eq!(by_name.len(), 1);

        let by_id = repo.search(&brake.fault_id.to_string()).await.unwrap();
        assert!(by_id.iter().any(|f| f.fault_id == brake.fault_id));

        assert!(repo.search("").await.unwrap().is_empty());
    }
}
