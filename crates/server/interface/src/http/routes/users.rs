//! User administration (`/api/users`).

use crate::http::error::ApiResult;
use crate::http::{AppState, Ctx};
use axum::extract::{Path, State};
use axum::Json;
use campo_server_application::users::{CreateUserRequest, UpdateUserRequest};
use campo_server_domain::auth::{perm, UserWithPermissions};
use serde::Deserialize;
use serde_json::json;

pub async fn list(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> ApiResult<Json<Vec<UserWithPermissions>>> {
    state.permissions.require(&ctx.user, perm::USERS_VIEW).await?;
    Ok(Json(state.users.list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::USERS_MANAGE)
        .await?;
    let user = state.users.create(&ctx, body).await?;
    Ok(Json(json!({
        "message": "Usuário criado com sucesso",
        "user": user,
    })))
}

pub async fn update(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::USERS_MANAGE)
        .await?;
    state.users.update(&ctx, id, body).await?;
    Ok(Json(json!({"message": "Usuário atualizado com sucesso"})))
}

pub async fn remove(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::USERS_MANAGE)
        .await?;
    state.users.delete(&ctx, id).await?;
    Ok(Json(json!({"message": "Usuário excluído com sucesso"})))
}

pub async fn permissions(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<String>>> {
    state
        .permissions
        .require(&ctx.user, perm::USERS_MANAGE)
        .await?;
    Ok(Json(state.users.permissions_of(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    #[serde(default)]
    pub permissions: Vec<String>,
}

pub async fn set_permissions(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(id): Path<i64>,
    Json(body): Json<SetPermissionsRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .permissions
        .require(&ctx.user, perm::USERS_MANAGE)
        .await?;
    let permissions = state
        .users
        .set_permissions(&ctx, id, body.permissions)
        .await?;
    Ok(Json(json!({
        "message": "Permissões atualizadas com sucesso",
        "permissions": permissions,
    })))
}
