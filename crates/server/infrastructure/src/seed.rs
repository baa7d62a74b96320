//! First-run defaults. Every block seeds only when its table is empty, so
//! an existing database is never touched.

use campo_server_domain::auth::perm;
use campo_server_domain::shared_kernel::{DomainError, Result};
use sqlx::SqlitePool;
use tracing::info;

const DEFAULT_USERS: [(&str, &str, &str); 3] = [
    ("hiago", "hiago123", "admin"),
    ("suporte", "suporte123", "suporte"),
    ("agendamento", "agenda123", "agendamento"),
];

const CITIES: [&str; 9] = [
    "PARACATU",
    "PATROCINIO",
    "PATOS DE MINAS",
    "VARJÃO DE MINAS",
    "LAGOA FORMOSA",
    "PANTANO",
    "CARMO DO PARANAIBA",
    "CRUZEIRO DA FORTALEZA",
    "SAO GONÇALO",
];

const TECHNICIANS: [&str; 4] = ["João Silva", "Maria Souza", "Carlos Rocha", "A definir"];

const SUBJECTS: [&str; 5] = [
    "SEM CONEXÃO",
    "CONEXÃO LENTA",
    "AGENDAMENTO",
    "INSTALAÇÃO",
    "MANUTENÇÃO",
];

const OS_TYPES: [&str; 2] = ["FIBRA", "RADIO"];
const PERIODS: [&str; 2] = ["MANHÃ", "TARDE"];

/// Subjects that take part in the capacity grid.
const GRID_SUBJECTS: [&str; 3] = ["SEM CONEXÃO", "CONEXÃO LENTA", "AGENDAMENTO"];

/// Default slot counts per (city, type, subject); both periods share them.
/// Only the regional hub runs a larger grid.
fn default_capacity(city: &str, os_type: &str, subject: &str) -> i64 {
    let hub = city == "PATOS DE MINAS";
    match (hub, os_type, subject) {
        (true, "FIBRA", "SEM CONEXÃO") => 5,
        (true, "FIBRA", "CONEXÃO LENTA") => 2,
        (true, "FIBRA", "AGENDAMENTO") => 3,
        (true, "RADIO", "SEM CONEXÃO") => 2,
        (true, "RADIO", "CONEXÃO LENTA") => 1,
        (true, "RADIO", "AGENDAMENTO") => 2,
        (false, "FIBRA", "SEM CONEXÃO") => 3,
        (false, "FIBRA", _) => 1,
        (false, "RADIO", _) => 1,
        _ => 0,
    }
}

async fn table_is_empty(pool: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .map_err(|e| DomainError::storage(format!("failed to probe {table}: {e}")))?;
    Ok(count == 0)
}

/// Applies every seed block.
pub async fn seed_defaults(pool: &SqlitePool) -> Result<()> {
    seed_users(pool).await?;
    seed_role_permissions(pool).await?;
    seed_catalog(pool).await?;
    seed_capacity_matrix(pool).await?;
    Ok(())
}

async fn seed_users(pool: &SqlitePool) -> Result<()> {
    if !table_is_empty(pool, "users").await? {
        return Ok(());
    }

    for (username, password, role) in DEFAULT_USERS {
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || {
            bcrypt::hash(password, bcrypt::DEFAULT_COST)
        })
        .await
        .map_err(|e| DomainError::storage(format!("hash task failed: {e}")))?
        .map_err(|e| DomainError::storage(format!("failed to hash default password: {e}")))?;

        sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
            .bind(username)
            .bind(hash)
            .bind(role)
            .execute(pool)
            .await
            .map_err(|e| DomainError::storage(format!("failed to seed user: {e}")))?;
        info!(username, role, "seeded default user");
    }
    Ok(())
}

async fn seed_role_permissions(pool: &SqlitePool) -> Result<()> {
    if !table_is_empty(pool, "role_permissions").await? {
        return Ok(());
    }

    let supervisor = [
        perm::AGENDA_VIEW,
        perm::AGENDA_CREATE,
        perm::AGENDA_EDIT,
        perm::AGENDA_ALLOCATE,
        perm::VAGAS_VIEW,
        perm::VAGAS_MANAGE,
        perm::VAGAS_ADJUST,
        perm::CONFIG_VIEW,
        perm::USERS_VIEW,
        perm::LOGS_VIEW,
        perm::REPORTS_VIEW,
        perm::SUBJECTS_MANAGE,
        perm::TECHNICIANS_MANAGE,
        perm::CITIES_MANAGE,
    ];
    let agendamento = [
        perm::AGENDA_VIEW,
        perm::AGENDA_CREATE,
        perm::AGENDA_EDIT,
        perm::AGENDA_ALLOCATE,
        perm::VAGAS_VIEW,
        perm::REPORTS_VIEW,
    ];
    let suporte = [
        perm::AGENDA_VIEW,
        perm::AGENDA_EDIT,
        perm::VAGAS_VIEW,
        perm::CONFIG_VIEW,
    ];

    let grants = perm::ALL
        .iter()
        .map(|p| ("admin", *p))
        .chain(supervisor.iter().map(|p| ("supervisor", *p)))
        .chain(agendamento.iter().map(|p| ("agendamento", *p)))
        .chain(suporte.iter().map(|p| ("suporte", *p)));

    for (role, permission) in grants {
        sqlx::query("INSERT OR IGNORE INTO role_permissions (role, permission) VALUES (?, ?)")
            .bind(role)
            .bind(permission)
            .execute(pool)
            .await
            .map_err(|e| DomainError::storage(format!("failed to seed role grant: {e}")))?;
    }
    info!("seeded role permission grants");
    Ok(())
}

async fn seed_catalog(pool: &SqlitePool) -> Result<()> {
    if table_is_empty(pool, "cities").await? {
        for city in CITIES {
            sqlx::query("INSERT OR IGNORE INTO cities (name) VALUES (?)")
                .bind(city)
                .execute(pool)
                .await
                .map_err(|e| DomainError::storage(format!("failed to seed city: {e}")))?;
        }
    }

    if table_is_empty(pool, "technicians").await? {
        for technician in TECHNICIANS {
            sqlx::query("INSERT OR IGNORE INTO technicians (name) VALUES (?)")
                .bind(technician)
                .execute(pool)
                .await
                .map_err(|e| DomainError::storage(format!("failed to seed technician: {e}")))?;
        }
    }

    if table_is_empty(pool, "subjects").await? {
        for subject in SUBJECTS {
            sqlx::query("INSERT OR IGNORE INTO subjects (name) VALUES (?)")
                .bind(subject)
                .execute(pool)
                .await
                .map_err(|e| DomainError::storage(format!("failed to seed subject: {e}")))?;
        }
    }

    if table_is_empty(pool, "os_types").await? {
        for code in OS_TYPES {
            sqlx::query("INSERT OR IGNORE INTO os_types (code) VALUES (?)")
                .bind(code)
                .execute(pool)
                .await
                .map_err(|e| DomainError::storage(format!("failed to seed os type: {e}")))?;
        }
    }

    if table_is_empty(pool, "periods").await? {
        for code in PERIODS {
            sqlx::query("INSERT OR IGNORE INTO periods (code) VALUES (?)")
                .bind(code)
                .execute(pool)
                .await
                .map_err(|e| DomainError::storage(format!("failed to seed period: {e}")))?;
        }
    }

    Ok(())
}

async fn seed_capacity_matrix(pool: &SqlitePool) -> Result<()> {
    if !table_is_empty(pool, "vacancy_templates").await? {
        return Ok(());
    }

    for city in CITIES {
        for os_type in OS_TYPES {
            for period in PERIODS {
                for subject in GRID_SUBJECTS {
                    let capacity = default_capacity(city, os_type, subject);
                    sqlx::query(
                        r#"
                        INSERT OR IGNORE INTO vacancy_templates
                          (city_id, os_type_id, period_id, subject_id, capacity)
                        SELECT c.id, t.id, p.id, s.id, ?
                        FROM cities c, os_types t, periods p, subjects s
                        WHERE c.name = ? AND t.code = ? AND p.code = ? AND s.name = ?
                        "#,
                    )
                    .bind(capacity)
                    .bind(city)
                    .bind(os_type)
                    .bind(period)
                    .bind(subject)
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        DomainError::storage(format!("failed to seed capacity matrix: {e}"))
                    })?;
                }
            }
        }
    }
    info!("seeded default capacity matrix");
    Ok(())
}
