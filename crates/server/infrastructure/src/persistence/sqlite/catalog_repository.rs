use async_trait::async_trait;
use campo_server_domain::catalog::{CatalogRepository, Roster, RosterEntry, Subject};
use campo_server_domain::shared_kernel::{DomainError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::storage;

#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &SqliteRow) -> RosterEntry {
        RosterEntry {
            id: row.get("id"),
            name: row.get("name"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_subject(row: &SqliteRow) -> Subject {
        Subject {
            id: row.get("id"),
            name: row.get("name"),
            is_active: row.get("is_active"),
        }
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn list_roster(&self, roster: Roster) -> Result<Vec<RosterEntry>> {
        // Table names come from the Roster enum, never from request input.
        let sql = format!(
            "SELECT id, name, is_active, created_at FROM {} ORDER BY is_active DESC, name",
            roster.table()
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to list roster", e))?;
        Ok(rows.iter().map(Self::row_to_entry).collect())
    }

    async fn find_roster_entry(&self, roster: Roster, id: i64) -> Result<Option<RosterEntry>> {
        let sql = format!(
            "SELECT id, name, is_active, created_at FROM {} WHERE id = ?",
            roster.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to load roster entry", e))?;
        Ok(row.as_ref().map(Self::row_to_entry))
    }

    async fn find_roster_by_name(
        &self,
        roster: Roster,
        name: &str,
    ) -> Result<Option<RosterEntry>> {
        let sql = format!(
            "SELECT id, name, is_active, created_at FROM {} WHERE LOWER(name) = LOWER(?)",
            roster.table()
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to look up roster name", e))?;
        Ok(row.as_ref().map(Self::row_to_entry))
    }

    async fn insert_roster_entry(&self, roster: Roster, name: &str) -> Result<i64> {
        let sql = format!("INSERT INTO {} (name, is_active) VALUES (?, 1)", roster.table());
        let result = sqlx::query(&sql)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to insert roster entry", e))?;
        Ok(result.last_insert_rowid())
    }

    async fn set_roster_active(&self, roster: Roster, id: i64, active: bool) -> Result<u64> {
        let sql = format!("UPDATE {} SET is_active = ? WHERE id = ?", roster.table());
        let result = sqlx::query(&sql)
            .bind(active as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to update roster status", e))?;
        Ok(result.rows_affected())
    }

    async fn list_subjects(&self, include_inactive: bool) -> Result<Vec<Subject>> {
        let sql = if include_inactive {
            "SELECT id, name, is_active FROM subjects ORDER BY name"
        } else {
            "SELECT id, name, is_active FROM subjects WHERE is_active = 1 ORDER BY name"
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to list subjects", e))?;
        Ok(rows.iter().map(Self::row_to_subject).collect())
    }

    async fn find_subject(&self, id: i64) -> Result<Option<Subject>> {
        let row = sqlx::query("SELECT id, name, is_active FROM subjects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to load subject", e))?;
        Ok(row.as_ref().map(Self::row_to_subject))
    }

    async fn find_subject_by_name(&self, name: &str) -> Result<Option<Subject>> {
        let row = sqlx::query("SELECT id, name, is_active FROM subjects WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to look up subject", e))?;
        Ok(row.as_ref().map(Self::row_to_subject))
    }

    async fn upsert_subject(&self, name: &str) -> Result<Subject> {
        sqlx::query("INSERT OR IGNORE INTO subjects (name, is_active) VALUES (?, 1)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to insert subject", e))?;
        // An existing inactive subject with the same name comes back.
        sqlx::query(
            "UPDATE subjects SET is_active = 1, updated_at = CURRENT_TIMESTAMP WHERE name = ?",
        )
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to reactivate subject", e))?;

        self.find_subject_by_name(name)
            .await?
            .ok_or_else(|| DomainError::storage("subject vanished after upsert"))
    }

    async fn rename_subject(&self, id: i64, name: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE subjects SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(name)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to rename subject", e))?;
        Ok(result.rows_affected())
    }

    async fn set_subject_active(&self, id: i64, active: bool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE subjects SET is_active = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(active as i64)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to update subject status", e))?;
        Ok(result.rows_affected())
    }
}
