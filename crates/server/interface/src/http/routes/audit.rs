//! Audit trail views (`/api/audit`).

use crate::http::error::ApiResult;
use crate::http::routes::non_blank;
use crate::http::{AppState, Ctx};
use axum::extract::{Query, State};
use axum::Json;
use campo_server_domain::audit::{AuditMeta, AuditQuery, AUDIT_PAGE_LIMIT_DEFAULT};
use campo_server_domain::auth::perm;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct AuditListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<AuditListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state.permissions.require(&ctx.user, perm::LOGS_VIEW).await?;

    let audit_query = AuditQuery {
        from: non_blank(query.from),
        to: non_blank(query.to),
        user_id: query.user_id,
        action: non_blank(query.action),
        entity_type: non_blank(query.entity_type),
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(AUDIT_PAGE_LIMIT_DEFAULT),
    }
    .normalize();

    let page = audit_query.page;
    let limit = audit_query.limit;
    let result = state.audit.query(audit_query).await?;
    Ok(Json(json!({
        "rows": result.rows,
        "meta": {"page": page, "limit": limit, "total": result.total},
    })))
}

pub async fn meta(State(state): State<AppState>, Ctx(ctx): Ctx) -> ApiResult<Json<AuditMeta>> {
    state.permissions.require(&ctx.user, perm::LOGS_VIEW).await?;
    Ok(Json(state.audit.meta().await?))
}
