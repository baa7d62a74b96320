use async_trait::async_trait;
use campo_server_domain::scheduling::{
    CapacityCell, CellIds, CityTemplateRow, ClosedSlotRow, SubjectCapacity, TemplateRow,
    VacancyRepository,
};
use campo_server_domain::shared_kernel::Result;
use sqlx::{Row, SqlitePool};

use super::storage;

#[derive(Clone)]
pub struct SqliteVacancyRepository {
    pool: SqlitePool,
}

impl SqliteVacancyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VacancyRepository for SqliteVacancyRepository {
    async fn capacity_for(&self, cell: &CapacityCell) -> Result<i64> {
        let capacity: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT vt.capacity
            FROM vacancy_templates vt
            JOIN cities c ON c.id = vt.city_id
            JOIN os_types t ON t.id = vt.os_type_id
            JOIN periods p ON p.id = vt.period_id
            JOIN subjects s ON s.id = vt.subject_id
            WHERE c.name = ? AND t.code = ? AND p.code = ? AND s.name = ?
            LIMIT 1
            "#,
        )
        .bind(&cell.cidade)
        .bind(&cell.tipo_os)
        .bind(&cell.periodo)
        .bind(&cell.assunto)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("failed to load cell capacity", e))?;
        Ok(capacity.unwrap_or(0))
    }

    async fn find_city_id(&self, name: &str, active_only: bool) -> Result<Option<i64>> {
        let sql = if active_only {
            "SELECT id FROM cities WHERE name = ? AND is_active = 1"
        } else {
            "SELECT id FROM cities WHERE name = ?"
        };
        sqlx::query_scalar(sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to look up city", e))
    }

    async fn find_os_type_id(&self, code: &str, active_only: bool) -> Result<Option<i64>> {
        let sql = if active_only {
            "SELECT id FROM os_types WHERE code = ? AND is_active = 1"
        } else {
            "SELECT id FROM os_types WHERE code = ?"
        };
        sqlx::query_scalar(sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to look up os type", e))
    }

    async fn find_period_id(&self, code: &str) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT id FROM periods WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to look up period", e))
    }

    async fn find_subject_id(&self, name: &str, active_only: bool) -> Result<Option<i64>> {
        let sql = if active_only {
            "SELECT id FROM subjects WHERE name = ? AND is_active = 1"
        } else {
            "SELECT id FROM subjects WHERE name = ?"
        };
        sqlx::query_scalar(sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to look up subject", e))
    }

    async fn resolve_cell(&self, cell: &CapacityCell) -> Result<Option<CellIds>> {
        let row = sqlx::query(
            r#"
            SELECT c.id as city_id, t.id as os_type_id, p.id as period_id, s.id as subject_id
            FROM cities c, os_types t, periods p, subjects s
            WHERE c.name = ? AND t.code = ? AND p.code = ? AND s.name = ?
            "#,
        )
        .bind(&cell.cidade)
        .bind(&cell.tipo_os)
        .bind(&cell.periodo)
        .bind(&cell.assunto)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("failed to resolve capacity cell", e))?;

        Ok(row.map(|r| CellIds {
            city_id: r.get("city_id"),
            os_type_id: r.get("os_type_id"),
            period_id: r.get("period_id"),
            subject_id: r.get("subject_id"),
        }))
    }

    async fn subject_capacities(
        &self,
        city: &str,
        tipo_os: &str,
        periodo: &str,
    ) -> Result<Vec<SubjectCapacity>> {
        let rows = sqlx::query(
            r#"
            SELECT s.name as assunto, vt.capacity as capacity
            FROM vacancy_templates vt
            JOIN cities c ON c.id = vt.city_id
            JOIN os_types t ON t.id = vt.os_type_id
            JOIN periods p ON p.id = vt.period_id
            JOIN subjects s ON s.id = vt.subject_id
            WHERE c.name = ? AND t.code = ? AND p.code = ?
              AND c.is_active = 1 AND t.is_active = 1
            ORDER BY s.name
            "#,
        )
        .bind(city)
        .bind(tipo_os)
        .bind(periodo)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to load subject capacities", e))?;

        Ok(rows
            .iter()
            .map(|r| SubjectCapacity {
                assunto: r.get("assunto"),
                capacity: r.get("capacity"),
            })
            .collect())
    }

    async fn city_template(&self, city: &str) -> Result<Vec<CityTemplateRow>> {
        let rows = sqlx::query(
            r#"
            SELECT t.code as tipo, p.code as periodo, s.name as assunto, vt.capacity as capacity
            FROM vacancy_templates vt
            JOIN cities c ON c.id = vt.city_id
            JOIN os_types t ON t.id = vt.os_type_id
            JOIN periods p ON p.id = vt.period_id
            JOIN subjects s ON s.id = vt.subject_id
            WHERE c.name = ? AND COALESCE(s.is_active, 1) = 1
            "#,
        )
        .bind(city)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to load city template", e))?;

        Ok(rows
            .iter()
            .map(|r| CityTemplateRow {
                tipo: r.get("tipo"),
                periodo: r.get("periodo"),
                assunto: r.get("assunto"),
                capacity: r.get("capacity"),
            })
            .collect())
    }

    async fn city_type_template(&self, city: &str, tipo_os: &str) -> Result<Vec<TemplateRow>> {
        let rows = sqlx::query(
            r#"
            SELECT p.code as periodo, s.name as assunto, vt.capacity as capacity
            FROM vacancy_templates vt
            JOIN cities c ON c.id = vt.city_id
            JOIN os_types t ON t.id = vt.os_type_id
            JOIN periods p ON p.id = vt.period_id
            JOIN subjects s ON s.id = vt.subject_id
            WHERE c.name = ? AND t.code = ? AND COALESCE(s.is_active, 1) = 1
            "#,
        )
        .bind(city)
        .bind(tipo_os)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to load city/type template", e))?;

        Ok(rows
            .iter()
            .map(|r| TemplateRow {
                periodo: r.get("periodo"),
                assunto: r.get("assunto"),
                capacity: r.get("capacity"),
            })
            .collect())
    }

    async fn upsert_capacity(&self, ids: &CellIds, capacity: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vacancy_templates (city_id, os_type_id, period_id, subject_id, capacity)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(city_id, os_type_id, period_id, subject_id) DO UPDATE SET
              capacity = excluded.capacity,
              updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(ids.city_id)
        .bind(ids.os_type_id)
        .bind(ids.period_id)
        .bind(ids.subject_id)
        .bind(capacity)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to upsert capacity", e))?;
        Ok(())
    }

    async fn capacities_by_subject(
        &self,
        city_id: i64,
        os_type_id: i64,
        period_id: i64,
    ) -> Result<Vec<SubjectCapacity>> {
        let rows = sqlx::query(
            r#"
            SELECT s.name as assunto, vt.capacity as capacity
            FROM vacancy_templates vt
            JOIN subjects s ON s.id = vt.subject_id
            WHERE vt.city_id = ? AND vt.os_type_id = ? AND vt.period_id = ?
            "#,
        )
        .bind(city_id)
        .bind(os_type_id)
        .bind(period_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to load current capacities", e))?;

        Ok(rows
            .iter()
            .map(|r| SubjectCapacity {
                assunto: r.get("assunto"),
                capacity: r.get("capacity"),
            })
            .collect())
    }

    async fn closed_slots_for_day(
        &self,
        city: &str,
        tipo_os: &str,
        day: &str,
    ) -> Result<Vec<ClosedSlotRow>> {
        let rows = sqlx::query(
            r#"
            SELECT p.code as periodo, s.name as assunto, vcs.slot_index as slot_index
            FROM vacancy_closed_slots vcs
            JOIN cities c ON c.id = vcs.city_id
            JOIN os_types t ON t.id = vcs.os_type_id
            JOIN periods p ON p.id = vcs.period_id
            JOIN subjects s ON s.id = vcs.subject_id
            WHERE c.name = ? AND t.code = ? AND vcs.day = ?
            ORDER BY p.code, s.name, vcs.slot_index
            "#,
        )
        .bind(city)
        .bind(tipo_os)
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to load closed slots", e))?;

        Ok(rows
            .iter()
            .map(|r| ClosedSlotRow {
                periodo: r.get("periodo"),
                assunto: r.get("assunto"),
                slot_index: r.get("slot_index"),
            })
            .collect())
    }

    async fn count_closed(&self, cell: &CapacityCell, day: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM vacancy_closed_slots vcs
            JOIN cities c ON c.id = vcs.city_id
            JOIN os_types t ON t.id = vcs.os_type_id
            JOIN periods p ON p.id = vcs.period_id
            JOIN subjects s ON s.id = vcs.subject_id
            WHERE c.name = ? AND t.code = ? AND p.code = ? AND s.name = ? AND vcs.day = ?
            "#,
        )
        .bind(&cell.cidade)
        .bind(&cell.tipo_os)
        .bind(&cell.periodo)
        .bind(&cell.assunto)
        .bind(day)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to count closed slots", e))?;
        Ok(count)
    }

    async fn close_slot(
        &self,
        ids: &CellIds,
        day: &str,
        slot_index: i64,
        closed_by_user_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO vacancy_closed_slots
              (city_id, os_type_id, period_id, subject_id, day, slot_index, closed_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ids.city_id)
        .bind(ids.os_type_id)
        .bind(ids.period_id)
        .bind(ids.subject_id)
        .bind(day)
        .bind(slot_index)
        .bind(closed_by_user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to close slot", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn open_slot(&self, ids: &CellIds, day: &str, slot_index: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM vacancy_closed_slots
            WHERE city_id = ? AND os_type_id = ? AND period_id = ? AND subject_id = ?
              AND day = ? AND slot_index = ?
            "#,
        )
        .bind(ids.city_id)
        .bind(ids.os_type_id)
        .bind(ids.period_id)
        .bind(ids.subject_id)
        .bind(day)
        .bind(slot_index)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to reopen slot", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{in_memory, run_migrations};
    use crate::seed;

    async fn repo() -> SqliteVacancyRepository {
        let pool = in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        seed::seed_defaults(&pool).await.unwrap();
        SqliteVacancyRepository::new(pool)
    }

    fn cell(cidade: &str, tipo: &str, periodo: &str, assunto: &str) -> CapacityCell {
        CapacityCell {
            cidade: cidade.to_string(),
            tipo_os: tipo.to_string(),
            periodo: periodo.to_string(),
            assunto: assunto.to_string(),
        }
    }

    #[tokio::test]
    async fn seeded_capacity_matrix_is_queryable() {
        let repo = repo().await;
        let c = cell("PATOS DE MINAS", "FIBRA", "MANHÃ", "SEM CONEXÃO");
        assert_eq!(repo.capacity_for(&c).await.unwrap(), 5);

        let radio = cell("PATOS DE MINAS", "RADIO", "TARDE", "AGENDAMENTO");
        assert_eq!(repo.capacity_for(&radio).await.unwrap(), 2);

        // Unknown cells default to zero capacity.
        let unknown = cell("PATOS DE MINAS", "FIBRA", "MANHÃ", "MANUTENÇÃO");
        assert_eq!(repo.capacity_for(&unknown).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_overwrites_one_cell_only() {
        let repo = repo().await;
        let c = cell("PARACATU", "FIBRA", "MANHÃ", "SEM CONEXÃO");
        let ids = repo.resolve_cell(&c).await.unwrap().unwrap();
        repo.upsert_capacity(&ids, 9).await.unwrap();

        assert_eq!(repo.capacity_for(&c).await.unwrap(), 9);
        let tarde = cell("PARACATU", "FIBRA", "TARDE", "SEM CONEXÃO");
        assert_eq!(repo.capacity_for(&tarde).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn resolve_cell_rejects_unknown_names() {
        let repo = repo().await;
        let bogus = cell("ATLANTIS", "FIBRA", "MANHÃ", "SEM CONEXÃO");
        assert!(repo.resolve_cell(&bogus).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_open_removes() {
        let repo = repo().await;
        let c = cell("PARACATU", "FIBRA", "MANHÃ", "SEM CONEXÃO");
        let ids = repo.resolve_cell(&c).await.unwrap().unwrap();

        assert!(repo.close_slot(&ids, "2024-03-01", 0, 1).await.unwrap());
        assert!(!repo.close_slot(&ids, "2024-03-01", 0, 1).await.unwrap());
        assert_eq!(repo.count_closed(&c, "2024-03-01").await.unwrap(), 1);

        let slots = repo
            .closed_slots_for_day("PARACATU", "FIBRA", "2024-03-01")
            .await
            .unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot_index, 0);

        assert_eq!(repo.open_slot(&ids, "2024-03-01", 0).await.unwrap(), 1);
        assert_eq!(repo.count_closed(&c, "2024-03-01").await.unwrap(), 0);
        // Other days are untouched pools.
        assert_eq!(repo.count_closed(&c, "2024-03-02").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn city_template_covers_both_types_and_periods() {
        let repo = repo().await;
        let rows = repo.city_template("PATOS DE MINAS").await.unwrap();
        // 2 types x 2 periods x 3 subjects
        assert_eq!(rows.len(), 12);

        let typed = repo
            .city_type_template("PATOS DE MINAS", "FIBRA")
            .await
            .unwrap();
        assert_eq!(typed.len(), 6);
    }

    #[tokio::test]
    async fn subject_capacities_lists_the_editor_view() {
        let repo = repo().await;
        let caps = repo
            .subject_capacities("PATOS DE MINAS", "FIBRA", "MANHÃ")
            .await
            .unwrap();
        assert_eq!(caps.len(), 3);
        assert!(caps
            .iter()
            .any(|c| c.assunto == "SEM CONEXÃO" && c.capacity == 5));
    }
}
