//! Production reports: grouped summary and the CSV download.

use campo_server_domain::reports::{
    ExportRow, ReportFilter, ReportsRepository, SummaryRow, EXPORT_HEADER,
};
use campo_server_domain::shared_kernel::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReportService {
    reports: Arc<dyn ReportsRepository>,
}

impl ReportService {
    pub fn new(reports: Arc<dyn ReportsRepository>) -> Self {
        Self { reports }
    }

    pub async fn summary(&self, filter: ReportFilter) -> Result<Vec<SummaryRow>> {
        self.reports.summary(&filter).await
    }

    /// Renders the export as CSV text: header row plus one line per order.
    pub async fn export_csv(&self, filter: ReportFilter) -> Result<String> {
        let rows = self.reports.export_rows(&filter).await?;

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(EXPORT_HEADER.join(","));
        for row in &rows {
            lines.push(render_row(row));
        }
        Ok(lines.join("\n"))
    }
}

fn render_row(row: &ExportRow) -> String {
    [
        row.id.to_string(),
        csv_escape(&row.cliente),
        csv_escape(&row.cidade),
        csv_escape(&row.assunto),
        csv_escape(row.tipo_os.as_deref().unwrap_or("")),
        csv_escape(row.tecnico.as_deref().unwrap_or("")),
        csv_escape(&row.status),
        csv_escape(row.data_hora.as_deref().unwrap_or("")),
        csv_escape(&row.created_at),
        csv_escape(&row.updated_at),
    ]
    .join(",")
}

/// Quotes a CSV field when it carries a delimiter or quote; embedded quotes
/// are doubled and newlines flattened to spaces.
fn csv_escape(value: &str) -> String {
    let flat = value.replace("\r\n", " ").replace('\n', " ");
    if flat.contains('"') || flat.contains(',') || flat.contains(';') {
        format!("\"{}\"", flat.replace('"', "\"\""))
    } else {
        flat
    }
}
