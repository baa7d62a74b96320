//! Production reporting over the order history.

use crate::shared_kernel::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Shared filter of the summary and export endpoints. Date bounds apply to
/// `DATE(data_hora)`.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub cidade: Option<String>,
    pub tecnico: Option<String>,
    pub assunto: Option<String>,
    pub tipo_os: Option<String>,
    /// Comma-split status list.
    pub status: Vec<String>,
}

/// One aggregated production line. NULL dimensions surface as `-` so the
/// report table never renders holes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryRow {
    pub cidade: String,
    pub tecnico: String,
    pub assunto: String,
    pub tipo_os: String,
    pub status: String,
    pub total: i64,
}

/// Flat order row of the CSV export, in header order.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub id: i64,
    pub cliente: String,
    pub cidade: String,
    pub assunto: String,
    pub tipo_os: Option<String>,
    pub tecnico: Option<String>,
    pub status: String,
    pub data_hora: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub const EXPORT_HEADER: [&str; 10] = [
    "id",
    "cliente",
    "cidade",
    "assunto",
    "tipo_os",
    "tecnico",
    "status",
    "data_hora",
    "created_at",
    "updated_at",
];

#[async_trait]
pub trait ReportsRepository: Send + Sync {
    async fn summary(&self, filter: &ReportFilter) -> Result<Vec<SummaryRow>>;
    /// Export rows ordered by `COALESCE(data_hora, created_at)` descending.
    async fn export_rows(&self, filter: &ReportFilter) -> Result<Vec<ExportRow>>;
}
