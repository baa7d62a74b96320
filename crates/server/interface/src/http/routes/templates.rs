//! Capacity-template editing (`/api/vacancy-templates*`).

use crate::http::error::ApiResult;
use crate::http::{AppState, Ctx};
use axum::extract::{Query, State};
use axum::Json;
use campo_server_application::vacancy::{AdjustCapacityRequest, SaveCapacitiesRequest};
use campo_server_domain::auth::perm;
use campo_server_domain::scheduling::SubjectCapacity;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub city: Option<String>,
    pub tipo_os: Option<String>,
    pub periodo: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<TemplateQuery>,
) -> ApiResult<Json<Vec<SubjectCapacity>>> {
    state
        .permissions
        .require(&ctx.user, perm::VAGAS_MANAGE)
        .await?;
    let rows = state
        .vacancy
        .template_capacities(
            query.city.as_deref(),
            query.tipo_os.as_deref(),
            query.periodo.as_deref(),
        )
        .await?;
    Ok(Json(rows))
}

pub async fn save(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<SaveCapacitiesRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::VAGAS_MANAGE)
        .await?;
    let changes = state.vacancy.save_capacities(&ctx, body).await?;
    Ok(Json(json!({"ok": true, "changes": changes})))
}

pub async fn adjust(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<AdjustCapacityRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::VAGAS_ADJUST)
        .await?;
    let capacity = state.vacancy.adjust_capacity(&ctx, body).await?;
    Ok(Json(json!({"ok": true, "capacity": capacity})))
}
