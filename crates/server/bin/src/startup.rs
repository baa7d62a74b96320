//! Wires the SQLite adapters into the services and serves the router.

use crate::config::ServerConfig;
use anyhow::Context;
use campo_server_application::allocation::AllocationService;
use campo_server_application::audit::AuditService;
use campo_server_application::auth::{LoginService, PermissionService};
use campo_server_application::catalog::CatalogService;
use campo_server_application::orders::OrderService;
use campo_server_application::reports::ReportService;
use campo_server_application::users::UserAdminService;
use campo_server_application::vacancy::VacancyService;
use campo_server_infrastructure::{
    connect, run_migrations, seed, SqliteAuditRepository, SqliteCatalogRepository,
    SqliteOrderRepository, SqlitePermissionRepository, SqliteReportsRepository,
    SqliteUserRepository, SqliteVacancyRepository,
};
use campo_server_interface::{router, AppState, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let pool = connect(&config.database_path)
        .await
        .context("failed to open the database")?;
    run_migrations(&pool)
        .await
        .context("failed to apply the schema")?;
    seed::seed_defaults(&pool)
        .await
        .context("failed to seed defaults")?;

    let orders = Arc::new(SqliteOrderRepository::new(pool.clone()));
    let vacancies = Arc::new(SqliteVacancyRepository::new(pool.clone()));
    let users = Arc::new(SqliteUserRepository::new(pool.clone()));
    let permissions = Arc::new(SqlitePermissionRepository::new(pool.clone()));
    let catalog = Arc::new(SqliteCatalogRepository::new(pool.clone()));
    let audit_repo = Arc::new(SqliteAuditRepository::new(pool.clone()));
    let reports = Arc::new(SqliteReportsRepository::new(pool));

    let audit = AuditService::new(audit_repo);
    let state = AppState {
        sessions: Arc::new(SessionStore::default()),
        login: LoginService::new(users.clone()),
        permissions: PermissionService::new(permissions.clone()),
        orders: OrderService::new(orders.clone(), audit.clone()),
        allocation: AllocationService::new(orders.clone(), vacancies.clone(), audit.clone()),
        vacancy: VacancyService::new(orders, vacancies, audit.clone()),
        users: UserAdminService::new(users, permissions, audit.clone()),
        catalog: CatalogService::new(catalog, audit.clone()),
        audit,
        reports: ReportService::new(reports),
    };

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, database = %config.database_path, "campo server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install the shutdown handler");
        return;
    }
    info!("shutting down gracefully");
}
