//! Service-order endpoints (`/api/agendamentos`).

use crate::http::error::ApiResult;
use crate::http::routes::{non_blank, split_csv};
use crate::http::{AppState, Ctx};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use campo_server_application::allocation::AllocateRequest;
use campo_server_application::orders::CreateOrderRequest;
use campo_server_domain::auth::perm;
use campo_server_domain::orders::{
    OrderListFilter, OrderPatch, OrderSearch, OrderSortKey, ServiceOrder, SortDir,
    SEARCH_PAGE_SIZE_DEFAULT,
};
use campo_server_domain::shared_kernel::Period;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub cidade: Option<String>,
    pub data: Option<String>,
    pub status: Option<String>,
    pub cliente: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ServiceOrder>>> {
    state.permissions.require(&ctx.user, perm::AGENDA_VIEW).await?;
    let rows = state
        .orders
        .list(OrderListFilter {
            cidade: non_blank(query.cidade),
            data: non_blank(query.data),
            status: non_blank(query.status),
            cliente: non_blank(query.cliente),
        })
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub cidade: Option<String>,
    pub tecnico: Option<String>,
    pub status: Option<String>,
    pub cliente: Option<String>,
    pub assunto: Option<String>,
    pub tipo_os: Option<String>,
    pub data: Option<String>,
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub periodo: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn search(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state.permissions.require(&ctx.user, perm::AGENDA_VIEW).await?;

    let search = OrderSearch {
        cidade: non_blank(query.cidade),
        tecnico: non_blank(query.tecnico),
        status: split_csv(query.status.as_deref()),
        cliente: non_blank(query.cliente),
        assunto: non_blank(query.assunto),
        tipo_os: non_blank(query.tipo_os),
        data: non_blank(query.data),
        data_inicio: non_blank(query.data_inicio),
        data_fim: non_blank(query.data_fim),
        periodo: query.periodo.as_deref().and_then(Period::parse),
        sort_by: query
            .sort_by
            .as_deref()
            .and_then(OrderSortKey::parse)
            .unwrap_or(OrderSortKey::DataHora),
        sort_dir: query
            .sort_dir
            .as_deref()
            .map(SortDir::parse)
            .unwrap_or(SortDir::Desc),
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(SEARCH_PAGE_SIZE_DEFAULT),
    };

    let (search, page) = state.orders.search(search).await?;
    Ok(Json(json!({
        "rows": page.rows,
        "meta": {
            "page": search.page,
            "page_size": search.page_size,
            "total": page.total,
            "total_pages": page.total_pages(search.page_size),
            "sort_by": search.sort_by.column(),
            "sort_dir": search.sort_dir.as_str(),
        },
    })))
}

pub async fn unallocated(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> ApiResult<Json<Vec<ServiceOrder>>> {
    state.permissions.require(&ctx.user, perm::AGENDA_VIEW).await?;
    Ok(Json(state.orders.unallocated().await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<ServiceOrder>> {
    state.permissions.require(&ctx.user, perm::AGENDA_VIEW).await?;
    Ok(Json(state.orders.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    state
        .permissions
        .require(&ctx.user, perm::AGENDA_CREATE)
        .await?;
    let id = state.orders.create(&ctx, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"id": id, "message": "Agendamento criado com sucesso"})),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
    Json(patch): Json<OrderPatch>,
) -> ApiResult<Json<serde_json::Value>> {
    state.permissions.require(&ctx.user, perm::AGENDA_EDIT).await?;
    let changes = state.orders.update(&ctx, id, patch).await?;
    Ok(Json(json!({
        "message": "Agendamento atualizado com sucesso",
        "changes": changes,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::AGENDA_DELETE)
        .await?;
    let changes = state.orders.remove(&ctx, id).await?;
    Ok(Json(json!({
        "message": "Agendamento excluído com sucesso",
        "changes": changes,
    })))
}

pub async fn allocate(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
    Json(body): Json<AllocateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::AGENDA_ALLOCATE)
        .await?;
    let changes = state.allocation.allocate(&ctx, id, body).await?;
    Ok(Json(json!({
        "message": "Agendamento alocado com sucesso",
        "changes": changes,
    })))
}
