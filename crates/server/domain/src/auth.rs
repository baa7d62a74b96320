//! Users, roles and the permission model.
//!
//! Permissions are flat dotted names granted either through the user's role
//! (`role_permissions`) or through a per-user override set
//! (`user_permissions`). A non-empty override fully replaces the role
//! grants, which is what lets an admin revoke a single role permission from
//! one user. There is no implicit admin bypass: the admin role is powerful
//! only because it is granted every permission.

use crate::shared_kernel::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Canonical permission names. Middlewares and seeds must agree on these.
pub mod perm {
    pub const AGENDA_VIEW: &str = "agenda.view";
    pub const AGENDA_CREATE: &str = "agenda.create";
    pub const AGENDA_EDIT: &str = "agenda.edit";
    pub const AGENDA_DELETE: &str = "agenda.delete";
    pub const AGENDA_ALLOCATE: &str = "agenda.allocate";
    pub const VAGAS_VIEW: &str = "vagas.view";
    pub const VAGAS_MANAGE: &str = "vagas.manage";
    pub const VAGAS_ADJUST: &str = "vagas.adjust";
    pub const CONFIG_VIEW: &str = "config.view";
    pub const CONFIG_EDIT: &str = "config.edit";
    pub const USERS_VIEW: &str = "users.view";
    pub const USERS_MANAGE: &str = "users.manage";
    pub const LOGS_VIEW: &str = "logs.view";
    pub const REPORTS_VIEW: &str = "reports.view";
    pub const REPORTS_EXPORT: &str = "reports.export";
    pub const SUBJECTS_MANAGE: &str = "subjects.manage";
    pub const TECHNICIANS_MANAGE: &str = "technicians.manage";
    pub const CITIES_MANAGE: &str = "cities.manage";

    pub const ALL: [&str; 18] = [
        AGENDA_VIEW,
        AGENDA_CREATE,
        AGENDA_EDIT,
        AGENDA_DELETE,
        AGENDA_ALLOCATE,
        VAGAS_VIEW,
        VAGAS_MANAGE,
        VAGAS_ADJUST,
        CONFIG_VIEW,
        CONFIG_EDIT,
        USERS_VIEW,
        USERS_MANAGE,
        LOGS_VIEW,
        REPORTS_VIEW,
        REPORTS_EXPORT,
        SUBJECTS_MANAGE,
        TECHNICIANS_MANAGE,
        CITIES_MANAGE,
    ];
}

/// Assignable roles. Kept closed: the permission editor grants exceptions
/// per user instead of inventing roles.
pub const ROLES: [&str; 4] = ["admin", "supervisor", "agendamento", "suporte"];

pub fn is_valid_role(role: &str) -> bool {
    ROLES.contains(&role)
}

/// Full user row. The password hash never leaves the auth boundary.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: i64,
    pub created_at: String,
}

/// The identity carried by a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
        }
    }
}

/// User listing row with the aggregated override permissions.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithPermissions {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub is_active: i64,
    pub created_at: String,
    pub permissions: Vec<String>,
}

/// Override-wins rule: any per-user grant set replaces the role grants.
pub fn effective_permissions(user_perms: Vec<String>, role_perms: Vec<String>) -> Vec<String> {
    if user_perms.is_empty() {
        role_perms
    } else {
        user_perms
    }
}

/// Normalizes an override list: trimmed, non-empty, deduplicated in order.
pub fn normalize_permissions(raw: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for perm in raw {
        let p = perm.trim();
        if !p.is_empty() && !seen.iter().any(|s| s == p) {
            seen.push(p.to_string());
        }
    }
    seen
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn list_with_permissions(&self) -> Result<Vec<UserWithPermissions>>;
    async fn username_taken(&self, username: &str, exclude_id: Option<i64>) -> Result<bool>;
    async fn insert(&self, username: &str, password_hash: &str, role: &str) -> Result<i64>;
    /// `password_hash = None` keeps the stored hash.
    async fn update(
        &self,
        id: i64,
        username: &str,
        password_hash: Option<&str>,
        role: &str,
        is_active: i64,
    ) -> Result<u64>;
    async fn delete(&self, id: i64) -> Result<u64>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn user_permissions(&self, user_id: i64) -> Result<Vec<String>>;
    async fn role_permissions(&self, role: &str) -> Result<Vec<String>>;
    /// Replaces the user's override set; an empty list clears the override.
    async fn replace_user_permissions(&self, user_id: i64, permissions: &[String]) -> Result<()>;
}
