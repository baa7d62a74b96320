//! Catalog endpoints: cities, technicians and subjects.

use crate::http::error::ApiResult;
use crate::http::{AppState, Ctx};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use campo_server_application::catalog::RosterCreateOutcome;
use campo_server_domain::auth::perm;
use campo_server_domain::catalog::{Roster, RosterEntry, Subject};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: Option<String>,
}

/// Success-message vocabulary per roster, matching the dashboard wording.
fn roster_noun(roster: Roster) -> (&'static str, &'static str) {
    match roster {
        Roster::Cities => ("Cidade", "a"),
        Roster::Technicians => ("Técnico", "o"),
    }
}

async fn list_roster_entries(
    state: &AppState,
    ctx: &Ctx,
    roster: Roster,
    permission: &str,
) -> ApiResult<Json<Vec<RosterEntry>>> {
    state.permissions.require(&ctx.0.user, permission).await?;
    Ok(Json(state.catalog.list_roster(roster).await?))
}

async fn create_roster_entry(
    state: &AppState,
    ctx: &Ctx,
    roster: Roster,
    permission: &str,
    name: Option<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.permissions.require(&ctx.0.user, permission).await?;
    let outcome = state
        .catalog
        .create_roster_entry(&ctx.0, roster, name.as_deref())
        .await?;
    let (noun, suffix) = roster_noun(roster);
    let (id, verb) = match outcome {
        RosterCreateOutcome::Created(id) => (id, format!("criad{suffix}")),
        RosterCreateOutcome::Reactivated(id) => (id, format!("reativad{suffix}")),
    };
    Ok(Json(json!({
        "message": format!("{noun} {verb} com sucesso"),
        "id": id,
    })))
}

async fn remove_roster_entry(
    state: &AppState,
    ctx: &Ctx,
    roster: Roster,
    permission: &str,
    id: i64,
) -> ApiResult<Json<serde_json::Value>> {
    state.permissions.require(&ctx.0.user, permission).await?;
    state
        .catalog
        .deactivate_roster_entry(&ctx.0, roster, id)
        .await?;
    let (noun, suffix) = roster_noun(roster);
    Ok(Json(json!({
        "message": format!("{noun} removid{suffix} com sucesso"),
    })))
}

async fn toggle_roster_entry(
    state: &AppState,
    ctx: &Ctx,
    roster: Roster,
    permission: &str,
    id: i64,
) -> ApiResult<Json<serde_json::Value>> {
    state.permissions.require(&ctx.0.user, permission).await?;
    let active = state
        .catalog
        .toggle_roster_entry(&ctx.0, roster, id)
        .await?;
    let (noun, suffix) = roster_noun(roster);
    let verb = if active {
        format!("ativad{suffix}")
    } else {
        format!("desativad{suffix}")
    };
    Ok(Json(json!({
        "message": format!("{noun} {verb} com sucesso"),
    })))
}

pub async fn list_cities(
    State(state): State<AppState>,
    ctx: Ctx,
) -> ApiResult<Json<Vec<RosterEntry>>> {
    list_roster_entries(&state, &ctx, Roster::Cities, perm::CITIES_MANAGE).await
}

pub async fn create_city(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(body): Json<NameRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    create_roster_entry(&state, &ctx, Roster::Cities, perm::CITIES_MANAGE, body.name).await
}

pub async fn remove_city(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    remove_roster_entry(&state, &ctx, Roster::Cities, perm::CITIES_MANAGE, id).await
}

pub async fn toggle_city(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    toggle_roster_entry(&state, &ctx, Roster::Cities, perm::CITIES_MANAGE, id).await
}

pub async fn list_technicians(
    State(state): State<AppState>,
    ctx: Ctx,
) -> ApiResult<Json<Vec<RosterEntry>>> {
    list_roster_entries(&state, &ctx, Roster::Technicians, perm::TECHNICIANS_MANAGE).await
}

pub async fn create_technician(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(body): Json<NameRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    create_roster_entry(
        &state,
        &ctx,
        Roster::Technicians,
        perm::TECHNICIANS_MANAGE,
        body.name,
    )
    .await
}

pub async fn remove_technician(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    remove_roster_entry(&state, &ctx, Roster::Technicians, perm::TECHNICIANS_MANAGE, id).await
}

pub async fn toggle_technician(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    toggle_roster_entry(&state, &ctx, Roster::Technicians, perm::TECHNICIANS_MANAGE, id).await
}

#[derive(Debug, Deserialize)]
pub struct SubjectsQuery {
    pub active: Option<String>,
}

pub async fn list_subjects(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<SubjectsQuery>,
) -> ApiResult<Json<Vec<Subject>>> {
    state.permissions.require(&ctx.user, perm::CONFIG_VIEW).await?;
    let include_inactive = query.active.as_deref() == Some("0");
    Ok(Json(state.catalog.list_subjects(include_inactive).await?))
}

pub async fn create_subject(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<NameRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    state
        .permissions
        .require(&ctx.user, perm::SUBJECTS_MANAGE)
        .await?;
    let subject = state
        .catalog
        .upsert_subject(&ctx, body.name.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"ok": true, "name": subject.name})),
    ))
}

pub async fn rename_subject(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
    Json(body): Json<NameRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::SUBJECTS_MANAGE)
        .await?;
    state
        .catalog
        .rename_subject(&ctx, id, body.name.as_deref())
        .await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct ToggleSubjectRequest {
    #[serde(default)]
    pub is_active: Option<serde_json::Value>,
}

pub async fn toggle_subject(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
    Json(body): Json<ToggleSubjectRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::SUBJECTS_MANAGE)
        .await?;
    // The editor sends is_active as a bool or 0/1.
    let active = match body.is_active {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    };
    state.catalog.set_subject_active(&ctx, id, active).await?;
    Ok(Json(json!({"ok": true})))
}
