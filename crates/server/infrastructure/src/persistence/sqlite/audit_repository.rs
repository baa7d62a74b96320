use async_trait::async_trait;
use campo_server_domain::audit::{
    AuditEntry, AuditMeta, AuditPage, AuditQuery, AuditRecord, AuditRepository, AuditUserRef,
};
use campo_server_domain::shared_kernel::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::storage;

#[derive(Clone)]
pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &SqliteRow) -> AuditEntry {
        AuditEntry {
            id: row.get("id"),
            user_id: row.get("user_id"),
            username: row.get("username"),
            action: row.get("action"),
            entity_type: row.get("entity_type"),
            entity_id: row.get("entity_id"),
            old_value: row.get("old_value"),
            new_value: row.get("new_value"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            created_at: row.get("created_at"),
        }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &'a AuditQuery) {
        if let Some(ref from) = query.from {
            qb.push(" AND DATE(created_at) >= ").push_bind(from);
        }
        if let Some(ref to) = query.to {
            qb.push(" AND DATE(created_at) <= ").push_bind(to);
        }
        if let Some(user_id) = query.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(ref action) = query.action {
            qb.push(" AND action = ").push_bind(action);
        }
        if let Some(ref entity_type) = query.entity_type {
            qb.push(" AND entity_type = ").push_bind(entity_type);
        }
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn insert(&self, record: &AuditRecord) -> Result<()> {
        let old_value = record
            .old_value
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default());
        let new_value = record
            .new_value
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO audit_logs
              (user_id, username, action, entity_type, entity_id,
               old_value, new_value, ip_address, user_agent)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.username)
        .bind(&record.action)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(old_value)
        .bind(new_value)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to insert audit entry", e))?;
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage> {
        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) as total FROM audit_logs WHERE 1=1");
        Self::push_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage("failed to count audit entries", e))?
            .get("total");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM audit_logs WHERE 1=1");
        Self::push_filters(&mut qb, query);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to query audit entries", e))?;

        Ok(AuditPage {
            rows: rows.iter().map(Self::row_to_entry).collect(),
            total,
        })
    }

    async fn meta(&self) -> Result<AuditMeta> {
        let actions: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT action FROM audit_logs ORDER BY action")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage("failed to list audit actions", e))?;

        let entity_types: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT entity_type FROM audit_logs ORDER BY entity_type")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage("failed to list audit entity types", e))?;

        let users = sqlx::query("SELECT id, username FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to list audit users", e))?
            .iter()
            .map(|row| AuditUserRef {
                id: row.get("id"),
                username: row.get("username"),
            })
            .collect();

        Ok(AuditMeta {
            actions,
            entity_types,
            users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{in_memory, run_migrations};
    use serde_json::json;

    async fn repo() -> SqliteAuditRepository {
        let pool = in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteAuditRepository::new(pool)
    }

    fn record(action: &str, entity_type: &str) -> AuditRecord {
        AuditRecord {
            user_id: Some(1),
            username: Some("hiago".to_string()),
            ip_address: Some("127.0.0.1".to_string()),
            ..AuditRecord::new(action, entity_type)
        }
    }

    #[tokio::test]
    async fn snapshots_are_stored_as_json_text() {
        let repo = repo().await;
        repo.insert(
            &record("UPDATE_AGENDAMENTO", "agendamento")
                .entity_id(3)
                .old_value(json!({"status": "Aberta"}))
                .new_value(json!({"status": "Agendada"})),
        )
        .await
        .unwrap();

        let page = repo.query(&AuditQuery::default().normalize()).await.unwrap();
        assert_eq!(page.total, 1);
        let entry = &page.rows[0];
        assert_eq!(entry.entity_id.as_deref(), Some("3"));
        let old: serde_json::Value =
            serde_json::from_str(entry.old_value.as_deref().unwrap()).unwrap();
        assert_eq!(old["status"], "Aberta");
    }

    #[tokio::test]
    async fn filters_restrict_by_action_and_entity_type() {
        let repo = repo().await;
        repo.insert(&record("CREATE_USER", "user")).await.unwrap();
        repo.insert(&record("DELETE_USER", "user")).await.unwrap();
        repo.insert(&record("CLOSE_SLOT", "vacancy_closed_slot"))
            .await
            .unwrap();

        let q = AuditQuery {
            action: Some("CREATE_USER".to_string()),
            ..AuditQuery::default()
        }
        .normalize();
        assert_eq!(repo.query(&q).await.unwrap().total, 1);

        let q = AuditQuery {
            entity_type: Some("user".to_string()),
            ..AuditQuery::default()
        }
        .normalize();
        assert_eq!(repo.query(&q).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn meta_lists_distinct_values() {
        let repo = repo().await;
        repo.insert(&record("CREATE_USER", "user")).await.unwrap();
        repo.insert(&record("CREATE_USER", "user")).await.unwrap();
        repo.insert(&record("CLOSE_SLOT", "vacancy_closed_slot"))
            .await
            .unwrap();

        let meta = repo.meta().await.unwrap();
        assert_eq!(meta.actions, vec!["CLOSE_SLOT", "CREATE_USER"]);
        assert_eq!(meta.entity_types, vec!["user", "vacancy_closed_slot"]);
    }

    #[tokio::test]
    async fn pagination_caps_the_page_size() {
        let repo = repo().await;
        for _ in 0..3 {
            repo.insert(&record("LOGIN", "session")).await.unwrap();
        }
        let q = AuditQuery {
            page: 1,
            limit: 2,
            ..AuditQuery::default()
        }
        .normalize();
        let page = repo.query(&q).await.unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.total, 3);
    }
}
