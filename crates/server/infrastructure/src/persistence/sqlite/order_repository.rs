use async_trait::async_trait;
use campo_server_domain::orders::{
    NewOrder, OccupancyQuery, OrderListFilter, OrderPage, OrderPatch, OrderRepository,
    OrderSearch, ServiceOrder,
};
use campo_server_domain::shared_kernel::{OrderStatus, Period, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::storage;

#[derive(Clone)]
pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: &SqliteRow) -> ServiceOrder {
        ServiceOrder {
            id: row.get("id"),
            cliente: row.get("cliente"),
            cidade: row.get("cidade"),
            assunto: row.get("assunto"),
            data_hora: row.get("data_hora"),
            periodo: row.get("periodo"),
            tecnico: row.get("tecnico"),
            status: row.get("status"),
            observacoes: row.get("observacoes"),
            tipo_os: row.get("tipo_os"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn push_search_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, search: &'a OrderSearch) {
        if let Some(ref cidade) = search.cidade {
            qb.push(" AND cidade = ").push_bind(cidade);
        }
        if let Some(ref tecnico) = search.tecnico {
            qb.push(" AND tecnico = ").push_bind(tecnico);
        }
        if let Some(ref assunto) = search.assunto {
            qb.push(" AND assunto = ").push_bind(assunto);
        }
        if let Some(ref tipo_os) = search.tipo_os {
            qb.push(" AND tipo_os = ").push_bind(tipo_os);
        }
        match search.status.len() {
            0 => {}
            1 => {
                qb.push(" AND status = ").push_bind(&search.status[0]);
            }
            _ => {
                qb.push(" AND status IN (");
                let mut sep = qb.separated(", ");
                for status in &search.status {
                    sep.push_bind(status);
                }
                qb.push(")");
            }
        }
        if let Some(ref cliente) = search.cliente {
            qb.push(" AND cliente LIKE ")
                .push_bind(format!("%{cliente}%"));
        }
        if let Some(ref data) = search.data {
            qb.push(" AND DATE(data_hora) = ").push_bind(data);
        } else {
            if let Some(ref inicio) = search.data_inicio {
                qb.push(" AND DATE(data_hora) >= ").push_bind(inicio);
            }
            if let Some(ref fim) = search.data_fim {
                qb.push(" AND DATE(data_hora) <= ").push_bind(fim);
            }
        }
        match search.periodo {
            Some(Period::Manha) => {
                qb.push(" AND data_hora IS NOT NULL AND strftime('%H', data_hora) < '12'");
            }
            Some(Period::Tarde) => {
                qb.push(" AND data_hora IS NOT NULL AND strftime('%H', data_hora) >= '12'");
            }
            None => {}
        }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<ServiceOrder>> {
        let row = sqlx::query("SELECT * FROM agendamentos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to load order", e))?;
        Ok(row.as_ref().map(Self::row_to_order))
    }

    async fn list(&self, filter: &OrderListFilter) -> Result<Vec<ServiceOrder>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM agendamentos WHERE 1=1");
        if let Some(ref cidade) = filter.cidade {
            qb.push(" AND cidade = ").push_bind(cidade);
        }
        if let Some(ref data) = filter.data {
            qb.push(" AND DATE(data_hora) = ").push_bind(data);
        }
        if let Some(ref status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(ref cliente) = filter.cliente {
            qb.push(" AND cliente LIKE ")
                .push_bind(format!("%{cliente}%"));
        }
        qb.push(" ORDER BY data_hora DESC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to list orders", e))?;
        Ok(rows.iter().map(Self::row_to_order).collect())
    }

    async fn search(&self, search: &OrderSearch) -> Result<OrderPage> {
        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) as total FROM agendamentos WHERE 1=1");
        Self::push_search_filters(&mut count_qb, search);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage("failed to count orders", e))?
            .get("total");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM agendamentos WHERE 1=1");
        Self::push_search_filters(&mut qb, search);
        // Sort column and direction come from closed enums, never from the
        // raw query string.
        qb.push(format!(
            " ORDER BY {col} {dir}, id {dir}",
            col = search.sort_by.column(),
            dir = search.sort_dir.as_sql()
        ));
        qb.push(" LIMIT ")
            .push_bind(search.page_size)
            .push(" OFFSET ")
            .push_bind(search.offset());

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to search orders", e))?;

        Ok(OrderPage {
            rows: rows.iter().map(Self::row_to_order).collect(),
            total,
        })
    }

    async fn unallocated(&self) -> Result<Vec<ServiceOrder>> {
        let rows = sqlx::query(
            "SELECT * FROM agendamentos WHERE status = 'Aberta' ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to list backlog orders", e))?;
        Ok(rows.iter().map(Self::row_to_order).collect())
    }

    async fn board_orders(
        &self,
        cidade: &str,
        tipo_os: &str,
        day: &str,
    ) -> Result<Vec<ServiceOrder>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM agendamentos
            WHERE cidade = ?
              AND tipo_os = ?
              AND DATE(data_hora) = ?
              AND status IN (?, ?, ?, ?)
            ORDER BY data_hora ASC, id ASC
            "#,
        )
        .bind(cidade)
        .bind(tipo_os)
        .bind(day)
        .bind(OrderStatus::Agendada.as_str())
        .bind(OrderStatus::EmAndamento.as_str())
        .bind(OrderStatus::Concluida.as_str())
        .bind(OrderStatus::Cancelada.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to load board orders", e))?;
        Ok(rows.iter().map(Self::row_to_order).collect())
    }

    async fn insert(&self, order: &NewOrder) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO agendamentos (cliente, cidade, assunto, observacoes, status, tipo_os)
            VALUES (?, ?, ?, ?, 'Aberta', ?)
            "#,
        )
        .bind(&order.cliente)
        .bind(&order.cidade)
        .bind(&order.assunto)
        .bind(&order.observacoes)
        .bind(&order.tipo_os)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to insert order", e))?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&self, id: i64, patch: &OrderPatch) -> Result<u64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE agendamentos SET ");
        {
            let mut sep = qb.separated(", ");
            if let Some(ref v) = patch.cliente {
                sep.push("cliente = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.cidade {
                sep.push("cidade = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.assunto {
                sep.push("assunto = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.data_hora {
                sep.push("data_hora = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.periodo {
                sep.push("periodo = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.tecnico {
                sep.push("tecnico = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.status {
                sep.push("status = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.observacoes {
                sep.push("observacoes = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = patch.tipo_os {
                sep.push("tipo_os = ").push_bind_unseparated(v);
            }
            sep.push("updated_at = CURRENT_TIMESTAMP");
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to update order", e))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM agendamentos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to delete order", e))?;
        Ok(result.rows_affected())
    }

    async fn count_occupied(&self, cell: &OccupancyQuery) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM agendamentos
            WHERE cidade = ?
              AND tipo_os = ?
              AND DATE(data_hora) = DATE(?)
              AND assunto = ?
              AND status NOT IN (?, ?)
              AND data_hora IS NOT NULL
              AND periodo = ?
            "#,
        )
        .bind(&cell.cidade)
        .bind(&cell.tipo_os)
        .bind(&cell.data_hora)
        .bind(&cell.assunto)
        .bind(OrderStatus::Cancelada.as_str())
        .bind(OrderStatus::Aberta.as_str())
        .bind(&cell.periodo)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to count cell occupancy", e))?;
        Ok(count)
    }

    async fn allocate(
        &self,
        id: i64,
        data_hora: &str,
        periodo: &str,
        assunto: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE agendamentos
            SET data_hora = ?, periodo = ?, assunto = ?, status = 'Agendada',
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(data_hora)
        .bind(periodo)
        .bind(assunto)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to allocate order", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{in_memory, run_migrations};
    use campo_server_domain::orders::{OrderSortKey, SortDir};

    async fn repo() -> SqliteOrderRepository {
        let pool = in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteOrderRepository::new(pool)
    }

    fn new_order(cliente: &str, cidade: &str, assunto: &str) -> NewOrder {
        NewOrder {
            cliente: cliente.to_string(),
            cidade: cidade.to_string(),
            assunto: assunto.to_string(),
            observacoes: None,
            tipo_os: "FIBRA".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_starts_in_the_backlog() {
        let repo = repo().await;
        let id = repo
            .insert(&new_order("ACME", "PARACATU", "SEM CONEXÃO"))
            .await
            .unwrap();

        let order = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(order.status, "Aberta");
        assert_eq!(order.data_hora, None);

        let backlog = repo.unallocated().await.unwrap();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, id);
    }

    #[tokio::test]
    async fn partial_update_keeps_unset_fields() {
        let repo = repo().await;
        let id = repo
            .insert(&new_order("ACME", "PARACATU", "SEM CONEXÃO"))
            .await
            .unwrap();

        let patch = OrderPatch {
            tecnico: Some("Maria Souza".to_string()),
            status: Some("Em andamento".to_string()),
            ..OrderPatch::default()
        };
        assert_eq!(repo.update(id, &patch).await.unwrap(), 1);

        let order = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(order.cliente, "ACME");
        assert_eq!(order.tecnico.as_deref(), Some("Maria Souza"));
        assert_eq!(order.status, "Em andamento");

        assert_eq!(repo.update(9999, &patch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn allocation_flips_status_and_counts_as_occupied() {
        let repo = repo().await;
        let id = repo
            .insert(&new_order("ACME", "PARACATU", "AGENDAMENTO"))
            .await
            .unwrap();

        repo.allocate(id, "2024-03-01T08:00", "MANHÃ", "SEM CONEXÃO")
            .await
            .unwrap();

        let order = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(order.status, "Agendada");
        assert_eq!(order.assunto, "SEM CONEXÃO");
        assert_eq!(order.periodo.as_deref(), Some("MANHÃ"));

        let cell = OccupancyQuery {
            cidade: "PARACATU".to_string(),
            tipo_os: "FIBRA".to_string(),
            data_hora: "2024-03-01T10:30".to_string(),
            assunto: "SEM CONEXÃO".to_string(),
            periodo: "MANHÃ".to_string(),
        };
        assert_eq!(repo.count_occupied(&cell).await.unwrap(), 1);

        // Another period is a different pool.
        let tarde = OccupancyQuery {
            periodo: "TARDE".to_string(),
            ..cell.clone()
        };
        assert_eq!(repo.count_occupied(&tarde).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cancelled_orders_release_their_slot() {
        let repo = repo().await;
        let id = repo
            .insert(&new_order("ACME", "PARACATU", "SEM CONEXÃO"))
            .await
            .unwrap();
        repo.allocate(id, "2024-03-01T08:00", "MANHÃ", "SEM CONEXÃO")
            .await
            .unwrap();
        repo.update(
            id,
            &OrderPatch {
                status: Some("Cancelada".to_string()),
                ..OrderPatch::default()
            },
        )
        .await
        .unwrap();

        let cell = OccupancyQuery {
            cidade: "PARACATU".to_string(),
            tipo_os: "FIBRA".to_string(),
            data_hora: "2024-03-01T08:00".to_string(),
            assunto: "SEM CONEXÃO".to_string(),
            periodo: "MANHÃ".to_string(),
        };
        assert_eq!(repo.count_occupied(&cell).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_filters_paginates_and_reports_totals() {
        let repo = repo().await;
        for i in 0..5 {
            let id = repo
                .insert(&new_order(&format!("cliente-{i}"), "PARACATU", "SEM CONEXÃO"))
                .await
                .unwrap();
            repo.allocate(id, &format!("2024-03-0{}T08:00", i + 1), "MANHÃ", "SEM CONEXÃO")
                .await
                .unwrap();
        }
        repo.insert(&new_order("outro", "PATROCINIO", "AGENDAMENTO"))
            .await
            .unwrap();

        let search = OrderSearch {
            cidade: Some("PARACATU".to_string()),
            status: vec!["Agendada".to_string()],
            page: 1,
            page_size: 2,
            sort_by: OrderSortKey::DataHora,
            sort_dir: SortDir::Asc,
            ..OrderSearch::default()
        }
        .normalize();

        let page = repo.search(&search).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].data_hora.as_deref(), Some("2024-03-01T08:00"));
        assert_eq!(page.total_pages(search.page_size), 3);
    }

    #[tokio::test]
    async fn search_by_period_uses_the_timestamp_hour() {
        let repo = repo().await;
        let morning = repo
            .insert(&new_order("a", "PARACATU", "SEM CONEXÃO"))
            .await
            .unwrap();
        repo.allocate(morning, "2024-03-01T08:00", "MANHÃ", "SEM CONEXÃO")
            .await
            .unwrap();
        let afternoon = repo
            .insert(&new_order("b", "PARACATU", "SEM CONEXÃO"))
            .await
            .unwrap();
        repo.allocate(afternoon, "2024-03-01T14:00", "TARDE", "SEM CONEXÃO")
            .await
            .unwrap();

        let search = OrderSearch {
            periodo: Some(Period::Manha),
            ..OrderSearch::default()
        }
        .normalize();
        let page = repo.search(&search).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].id, morning);
    }

    #[tokio::test]
    async fn list_matches_on_day_and_customer_substring() {
        let repo = repo().await;
        let id = repo
            .insert(&new_order("Maria dos Santos", "PARACATU", "SEM CONEXÃO"))
            .await
            .unwrap();
        repo.allocate(id, "2024-03-01T08:00", "MANHÃ", "SEM CONEXÃO")
            .await
            .unwrap();

        let filter = OrderListFilter {
            data: Some("2024-03-01".to_string()),
            cliente: Some("Santos".to_string()),
            ..OrderListFilter::default()
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);

        let other_day = OrderListFilter {
            data: Some("2024-03-02".to_string()),
            ..OrderListFilter::default()
        };
        assert!(repo.list(&other_day).await.unwrap().is_empty());
    }
}
