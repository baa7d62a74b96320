use async_trait::async_trait;
use campo_server_domain::reports::{ExportRow, ReportFilter, ReportsRepository, SummaryRow};
use campo_server_domain::shared_kernel::Result;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::storage;

#[derive(Clone)]
pub struct SqliteReportsRepository {
    pool: SqlitePool,
}

impl SqliteReportsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a ReportFilter) {
        if let Some(ref inicio) = filter.data_inicio {
            qb.push(" AND DATE(data_hora) >= ").push_bind(inicio);
        }
        if let Some(ref fim) = filter.data_fim {
            qb.push(" AND DATE(data_hora) <= ").push_bind(fim);
        }
        if let Some(ref cidade) = filter.cidade {
            qb.push(" AND cidade = ").push_bind(cidade);
        }
        if let Some(ref tecnico) = filter.tecnico {
            qb.push(" AND tecnico = ").push_bind(tecnico);
        }
        if let Some(ref assunto) = filter.assunto {
            qb.push(" AND assunto = ").push_bind(assunto);
        }
        if let Some(ref tipo_os) = filter.tipo_os {
            qb.push(" AND tipo_os = ").push_bind(tipo_os);
        }
        match filter.status.len() {
            0 => {}
            1 => {
                qb.push(" AND status = ").push_bind(&filter.status[0]);
            }
            _ => {
                qb.push(" AND status IN (");
                let mut sep = qb.separated(", ");
                for status in &filter.status {
                    sep.push_bind(status);
                }
                qb.push(")");
            }
        }
    }
}

#[async_trait]
impl ReportsRepository for SqliteReportsRepository {
    async fn summary(&self, filter: &ReportFilter) -> Result<Vec<SummaryRow>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
              cidade,
              COALESCE(tecnico, '-') as tecnico,
              COALESCE(assunto, '-') as assunto,
              COALESCE(tipo_os, '-') as tipo_os,
              status,
              COUNT(*) as total
            FROM agendamentos
            WHERE 1=1
            "#,
        );
        Self::push_filters(&mut qb, filter);
        qb.push(
            r#"
            GROUP BY cidade, tecnico, assunto, tipo_os, status
            ORDER BY cidade ASC, tecnico ASC, assunto ASC, tipo_os ASC, status ASC
            "#,
        );

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to build summary report", e))?;

        Ok(rows
            .iter()
            .map(|row| SummaryRow {
                cidade: row.get("cidade"),
                tecnico: row.get("tecnico"),
                assunto: row.get("assunto"),
                tipo_os: row.get("tipo_os"),
                status: row.get("status"),
                total: row.get("total"),
            })
            .collect())
    }

    async fn export_rows(&self, filter: &ReportFilter) -> Result<Vec<ExportRow>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT id, cliente, cidade, assunto, tipo_os, tecnico, status,
                   data_hora, created_at, updated_at
            FROM agendamentos
            WHERE 1=1
            "#,
        );
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY COALESCE(data_hora, created_at) DESC, id DESC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to build export report", e))?;

        Ok(rows
            .iter()
            .map(|row| ExportRow {
                id: row.get("id"),
                cliente: row.get("cliente"),
                cidade: row.get("cidade"),
                assunto: row.get("assunto"),
                tipo_os: row.get("tipo_os"),
                tecnico: row.get("tecnico"),
                status: row.get("status"),
                data_hora: row.get("data_hora"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{in_memory, run_migrations};

    async fn seeded_repo() -> SqliteReportsRepository {
        let pool = in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows = [
            ("a", "PARACATU", "SEM CONEXÃO", "FIBRA", "João", "Concluída", "2024-03-01T08:00"),
            ("b", "PARACATU", "SEM CONEXÃO", "FIBRA", "João", "Concluída", "2024-03-01T09:00"),
            ("c", "PARACATU", "AGENDAMENTO", "RADIO", "Maria", "Cancelada", "2024-03-02T08:00"),
            ("d", "PATROCINIO", "SEM CONEXÃO", "FIBRA", "João", "Agendada", "2024-03-05T08:00"),
        ];
        for (cliente, cidade, assunto, tipo, tecnico, status, data_hora) in rows {
            sqlx::query(
                r#"
                INSERT INTO agendamentos (cliente, cidade, assunto, tipo_os, tecnico, status, data_hora)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(cliente)
            .bind(cidade)
            .bind(assunto)
            .bind(tipo)
            .bind(tecnico)
            .bind(status)
            .bind(data_hora)
            .execute(&pool)
            .await
            .unwrap();
        }

        SqliteReportsRepository::new(pool)
    }

    #[tokio::test]
    async fn summary_groups_and_counts() {
        let repo = seeded_repo().await;
        let rows = repo.summary(&ReportFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 3);

        let done = rows
            .iter()
            .find(|r| r.cidade == "PARACATU" && r.status == "Concluída")
            .unwrap();
        assert_eq!(done.total, 2);
        assert_eq!(done.tecnico, "João");
    }

    #[tokio::test]
    async fn date_and_status_filters_narrow_the_report() {
        let repo = seeded_repo().await;
        let filter = ReportFilter {
            data_inicio: Some("2024-03-02".to_string()),
            data_fim: Some("2024-03-05".to_string()),
            status: vec!["Cancelada".to_string(), "Agendada".to_string()],
            ..ReportFilter::default()
        };
        let rows = repo.summary(&filter).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.total).sum::<i64>(), 2);
    }

    #[tokio::test]
    async fn export_orders_newest_first() {
        let repo = seeded_repo().await;
        let rows = repo.export_rows(&ReportFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].data_hora.as_deref(), Some("2024-03-05T08:00"));
        assert_eq!(rows[3].data_hora.as_deref(), Some("2024-03-01T08:00"));
    }
}
