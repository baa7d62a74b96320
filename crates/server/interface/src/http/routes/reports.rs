//! Production reports (`/api/reports`).

use crate::http::error::{ApiError, ApiResult};
use crate::http::routes::{non_blank, split_csv};
use crate::http::{AppState, Ctx};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campo_server_domain::auth::perm;
use campo_server_domain::reports::ReportFilter;
use serde::Deserialize;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub cidade: Option<String>,
    pub tecnico: Option<String>,
    pub assunto: Option<String>,
    pub tipo_os: Option<String>,
    pub status: Option<String>,
}

impl ReportQuery {
    fn into_filter(self) -> ReportFilter {
        ReportFilter {
            data_inicio: non_blank(self.data_inicio),
            data_fim: non_blank(self.data_fim),
            cidade: non_blank(self.cidade),
            tecnico: non_blank(self.tecnico),
            assunto: non_blank(self.assunto),
            tipo_os: non_blank(self.tipo_os),
            status: split_csv(self.status.as_deref()),
        }
    }
}

pub async fn summary(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::REPORTS_VIEW)
        .await?;
    let rows = state.reports.summary(query.into_filter()).await?;
    Ok(Json(json!({"rows": rows})))
}

pub async fn export(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    state
        .permissions
        .require(&ctx.user, perm::REPORTS_EXPORT)
        .await?;
    let csv = state.reports.export_csv(query.into_filter()).await?;

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let disposition = format!("attachment; filename=relatorio_agendamentos_{stamp}.csv");

    let mut response = csv.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        "text/csv; charset=utf-8"
            .parse()
            .map_err(|_| ApiError::Internal)?,
    );
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        disposition.parse().map_err(|_| ApiError::Internal)?,
    );
    Ok(response)
}
