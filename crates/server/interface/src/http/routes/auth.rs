//! Login, logout and the session probe.

use crate::http::error::{ApiError, ApiResult};
use crate::http::session::{clear_session_cookie, session_cookie, token_from_cookie_header};
use crate::http::{AppState, Ctx};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Response> {
    let (Some(username), Some(password)) = (
        body.username.filter(|u| !u.trim().is_empty()),
        body.password.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("Usuário e senha são obrigatórios"));
    };

    let user = state.login.login(&username, &password).await?;
    let token = state.sessions.create(user.clone());

    let mut response = Json(json!({
        "message": "Login bem-sucedido",
        "user": user,
    }))
    .into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie(&token)
            .parse()
            .map_err(|_| ApiError::Internal)?,
    );
    Ok(response)
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_cookie_header)
    {
        if let Some(user) = state.sessions.get(&token) {
            info!(username = %user.username, "logout");
        }
        state.sessions.remove(&token);
    }

    let mut response =
        Json(json!({"message": "Logout efetuado com sucesso"})).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        clear_session_cookie()
            .parse()
            .map_err(|_| ApiError::Internal)?,
    );
    Ok(response)
}

/// Current session plus effective permissions, for menu visibility on the
/// client side. Security never trusts this list; handlers re-check.
pub async fn current_user(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> ApiResult<Json<serde_json::Value>> {
    let permissions = state.permissions.effective(&ctx.user).await?;
    Ok(Json(json!({
        "id": ctx.user.id,
        "username": ctx.user.username,
        "role": ctx.user.role,
        "permissions": permissions,
    })))
}
