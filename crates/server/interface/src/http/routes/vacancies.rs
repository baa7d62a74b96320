//! Vacancy boards and closed-slot management (`/api/vagas*`).

use crate::http::error::{ApiError, ApiResult};
use crate::http::{AppState, Ctx};
use axum::extract::{Path, Query, State};
use axum::Json;
use campo_server_application::vacancy::{CityOverview, SetSlotClosedRequest};
use campo_server_domain::auth::perm;
use campo_server_domain::scheduling::PeriodMap;
use serde::Deserialize;
use serde_json::json;

pub async fn city_overview(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path((cidade, data)): Path<(String, String)>,
) -> ApiResult<Json<CityOverview>> {
    state.permissions.require(&ctx.user, perm::VAGAS_VIEW).await?;
    Ok(Json(state.vacancy.city_overview(&cidade, &data).await?))
}

pub async fn day_board(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path((cidade, tipo, data)): Path<(String, String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    state.permissions.require(&ctx.user, perm::VAGAS_VIEW).await?;
    let board = state.vacancy.day_board(&cidade, &tipo, &data).await?;
    Ok(Json(json!({
        "template": board.template,
        "agendamentos": board.agendamentos,
        "vagasFechadas": board.vagas_fechadas,
        "cidade": cidade,
        "data": data,
        "tipo": tipo,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ClosedSlotsQuery {
    pub cidade: Option<String>,
    pub data: Option<String>,
    pub tipo: Option<String>,
}

pub async fn closed_slots(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<ClosedSlotsQuery>,
) -> ApiResult<Json<PeriodMap<Vec<i64>>>> {
    state.permissions.require(&ctx.user, perm::VAGAS_VIEW).await?;
    let (Some(cidade), Some(data), Some(tipo)) = (query.cidade, query.data, query.tipo) else {
        return Err(ApiError::bad_request("Informe cidade, data e tipo"));
    };
    Ok(Json(state.vacancy.closed_map(&cidade, &tipo, &data).await?))
}

pub async fn set_slot_closed(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<SetSlotClosedRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::VAGAS_MANAGE)
        .await?;
    let outcome = state.vacancy.set_slot_closed(&ctx, body).await?;
    Ok(Json(json!({
        "ok": true,
        "action": outcome.action,
        "changes": outcome.changes,
    })))
}
