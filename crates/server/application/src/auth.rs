//! Login and per-request permission checks.

use campo_server_domain::auth::{
    effective_permissions, PermissionRepository, SessionUser, UserRepository,
};
use campo_server_domain::shared_kernel::{DomainError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Verifies credentials against the stored bcrypt hash. Hashing runs on the
/// blocking pool; bcrypt is deliberately slow.
#[derive(Clone)]
pub struct LoginService {
    users: Arc<dyn UserRepository>,
}

impl LoginService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser> {
        let Some(user) = self.users.find_by_username(username).await? else {
            warn!(username, "login failed: unknown user");
            return Err(DomainError::InvalidCredentials);
        };
        if user.is_active == 0 {
            warn!(username, "login failed: inactive user");
            return Err(DomainError::InvalidCredentials);
        }

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| DomainError::storage(format!("verify task failed: {e}")))?
            .map_err(|e| DomainError::storage(format!("bcrypt verify failed: {e}")))?;

        if !matches {
            warn!(username, "login failed: wrong password");
            return Err(DomainError::InvalidCredentials);
        }

        info!(username, "login ok");
        Ok(SessionUser::from(&user))
    }

    pub async fn hash_password(&self, password: &str) -> Result<String> {
        hash_password(password).await
    }
}

pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| DomainError::storage(format!("hash task failed: {e}")))?
        .map_err(|e| DomainError::storage(format!("bcrypt hash failed: {e}")))
}

/// Resolves effective permissions on every call. Permission edits in the
/// store take effect on the next request; sessions never cache grants.
#[derive(Clone)]
pub struct PermissionService {
    permissions: Arc<dyn PermissionRepository>,
}

impl PermissionService {
    pub fn new(permissions: Arc<dyn PermissionRepository>) -> Self {
        Self { permissions }
    }

    pub async fn effective(&self, user: &SessionUser) -> Result<Vec<String>> {
        let user_perms = self.permissions.user_permissions(user.id).await?;
        let role_perms = self.permissions.role_permissions(&user.role).await?;
        Ok(effective_permissions(user_perms, role_perms))
    }

    /// Errors with `PermissionDenied` unless the user holds `permission`.
    pub async fn require(&self, user: &SessionUser, permission: &str) -> Result<()> {
        let perms = self.effective(user).await?;
        if perms.iter().any(|p| p == permission) {
            Ok(())
        } else {
            warn!(user = %user.username, permission, "permission denied");
            Err(DomainError::PermissionDenied {
                permission: permission.to_string(),
            })
        }
    }
}
