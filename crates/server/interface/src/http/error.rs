//! Maps domain errors onto the status codes and `{error, ...}` JSON bodies
//! of the wire contract. Messages stay in the dashboard's language.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campo_server_domain::shared_kernel::DomainError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    /// Missing or expired session.
    Unauthorized,
    /// Bad credentials on login.
    InvalidCredentials,
    /// Authenticated but lacking the named permission.
    Forbidden { permission: String },
    BadRequest { message: String },
    Validation { details: Vec<String> },
    NotFound { message: String },
    Conflict { message: String },
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::OrderNotFound { .. } => ApiError::NotFound {
                message: "Agendamento não encontrado".to_string(),
            },
            DomainError::UserNotFound { .. } => ApiError::NotFound {
                message: "Usuário não encontrado".to_string(),
            },
            DomainError::EntityNotFound { entity, .. } => ApiError::NotFound {
                message: match entity {
                    "city" => "Cidade não encontrada",
                    "os_type" => "Tipo OS não encontrado",
                    "period" => "Período não encontrado",
                    "subject" => "Assunto não encontrado",
                    "technician" => "Técnico não encontrado",
                    _ => "Recurso não encontrado",
                }
                .to_string(),
            },
            DomainError::UsernameTaken { .. } => {
                ApiError::bad_request("Nome de usuário já existe")
            }
            DomainError::InvalidRole { .. } => ApiError::bad_request("Função inválida"),
            DomainError::SelfDeletion => {
                ApiError::bad_request("Você não pode excluir sua própria conta")
            }
            DomainError::InvalidCredentials => ApiError::InvalidCredentials,
            DomainError::PermissionDenied { permission } => ApiError::Forbidden { permission },
            DomainError::CapacityExceeded {
                assunto,
                periodo,
                capacity,
            } => ApiError::bad_request(format!(
                "Vaga indisponível. Limite de {capacity} para {assunto} ({periodo})."
            )),
            DomainError::Validation { details } => ApiError::Validation { details },
            DomainError::InvalidInput { message } => ApiError::BadRequest { message },
            DomainError::DuplicateEntity { entity, .. } => ApiError::Conflict {
                message: match entity {
                    "city" => "Já existe uma cidade com esse nome",
                    "technician" => "Já existe um técnico com esse nome",
                    _ => "Registro duplicado",
                }
                .to_string(),
            },
            DomainError::Storage { message } => {
                error!(%message, "storage failure");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Não autenticado"}),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Usuário ou senha inválidos"}),
            ),
            ApiError::Forbidden { permission } => (
                StatusCode::FORBIDDEN,
                json!({"error": "Acesso negado", "permission": permission}),
            ),
            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, json!({"error": message}))
            }
            ApiError::Validation { details } => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Dados inválidos", "details": details}),
            ),
            ApiError::NotFound { message } => (StatusCode::NOT_FOUND, json!({"error": message})),
            ApiError::Conflict { message } => (StatusCode::CONFLICT, json!({"error": message})),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Erro interno do servidor"}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rejection_carries_the_limit() {
        let err = ApiError::from(DomainError::CapacityExceeded {
            assunto: "SEM CONEXÃO".to_string(),
            periodo: "MANHÃ".to_string(),
            capacity: 3,
        });
        match err {
            ApiError::BadRequest { message } => {
                assert_eq!(
                    message,
                    "Vaga indisponível. Limite de 3 para SEM CONEXÃO (MANHÃ)."
                );
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn entity_not_found_picks_the_localized_message() {
        let err = ApiError::from(DomainError::EntityNotFound {
            entity: "os_type",
            name: "COBRE".to_string(),
        });
        match err {
            ApiError::NotFound { message } => assert_eq!(message, "Tipo OS não encontrado"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
