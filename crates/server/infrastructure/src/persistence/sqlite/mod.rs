//! Pool construction and schema management.
//!
//! The schema is applied with idempotent `CREATE TABLE IF NOT EXISTS`
//! statements so a server restart against an existing database is a no-op.

mod audit_repository;
mod catalog_repository;
mod order_repository;
mod report_repository;
mod user_repository;
mod vacancy_repository;

pub use audit_repository::SqliteAuditRepository;
pub use catalog_repository::SqliteCatalogRepository;
pub use order_repository::SqliteOrderRepository;
pub use report_repository::SqliteReportsRepository;
pub use user_repository::{SqlitePermissionRepository, SqliteUserRepository};
pub use vacancy_repository::SqliteVacancyRepository;

use campo_server_domain::shared_kernel::{DomainError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const BUSY_TIMEOUT_MS: u64 = 5_000;

pub(crate) fn storage(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::storage(format!("{context}: {err}"))
}

/// Opens (creating if missing) a file-backed database and applies pragmas.
pub async fn connect(path: impl AsRef<Path>) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path.as_ref())
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| storage("failed to open database", e))?;

    info!(path = %path.as_ref().display(), "sqlite pool ready");
    Ok(pool)
}

/// In-memory database for tests. A single connection keeps every query on
/// the same database instance.
pub async fn in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| storage("invalid in-memory dsn", e))?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| storage("failed to open in-memory database", e))
}

/// Creates the full schema. Safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    const STATEMENTS: [&str; 17] = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            role TEXT DEFAULT 'user',
            is_active INTEGER DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS user_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            permission TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
            UNIQUE(user_id, permission)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS role_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role TEXT NOT NULL,
            permission TEXT NOT NULL,
            UNIQUE(role, permission)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            username TEXT,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            old_value TEXT,
            new_value TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS cities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            is_active INTEGER DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS technicians (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            is_active INTEGER DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            is_active INTEGER DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS os_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            is_active INTEGER DEFAULT 1
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS periods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS vacancy_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            city_id INTEGER NOT NULL,
            os_type_id INTEGER NOT NULL,
            period_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            capacity INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(city_id, os_type_id, period_id, subject_id),
            FOREIGN KEY(city_id) REFERENCES cities (id),
            FOREIGN KEY(os_type_id) REFERENCES os_types (id),
            FOREIGN KEY(period_id) REFERENCES periods (id),
            FOREIGN KEY(subject_id) REFERENCES subjects (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS vacancy_closed_slots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            city_id INTEGER NOT NULL,
            os_type_id INTEGER NOT NULL,
            period_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            day TEXT NOT NULL,
            slot_index INTEGER NOT NULL,
            closed_by_user_id INTEGER,
            closed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(city_id, os_type_id, period_id, subject_id, day, slot_index),
            FOREIGN KEY(city_id) REFERENCES cities (id),
            FOREIGN KEY(os_type_id) REFERENCES os_types (id),
            FOREIGN KEY(period_id) REFERENCES periods (id),
            FOREIGN KEY(subject_id) REFERENCES subjects (id),
            FOREIGN KEY(closed_by_user_id) REFERENCES users (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS agendamentos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cliente TEXT NOT NULL,
            cidade TEXT NOT NULL,
            assunto TEXT NOT NULL,
            data_hora TIMESTAMP,
            periodo TEXT,
            tecnico TEXT,
            status TEXT DEFAULT 'Aberta',
            observacoes TEXT,
            tipo_os TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_agendamentos_status ON agendamentos(status)",
        "CREATE INDEX IF NOT EXISTS idx_agendamentos_cidade_data ON agendamentos(cidade, data_hora)",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_action ON audit_logs(action)",
        "CREATE INDEX IF NOT EXISTS idx_closed_slots_day ON vacancy_closed_slots(day)",
    ];

    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| storage("failed to apply schema", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(count >= 12);
    }
}
