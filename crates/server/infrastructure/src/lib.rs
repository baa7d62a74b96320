//! SQLite persistence for the campo server.
//!
//! One adapter per domain port, all over a shared [`sqlx::SqlitePool`]. The
//! schema is created idempotently at startup and first-run defaults are
//! seeded by [`seed`].

pub mod persistence;
pub mod seed;

pub use persistence::sqlite::{connect, in_memory, run_migrations};
pub use persistence::sqlite::{
    SqliteAuditRepository, SqliteCatalogRepository, SqliteOrderRepository,
    SqlitePermissionRepository, SqliteReportsRepository, SqliteUserRepository,
    SqliteVacancyRepository,
};
