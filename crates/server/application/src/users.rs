//! User administration and per-user permission overrides.

use crate::audit::AuditService;
use crate::auth::hash_password;
use crate::context::RequestContext;
use campo_server_domain::audit::AuditRecord;
use campo_server_domain::auth::{
    effective_permissions, is_valid_role, normalize_permissions, PermissionRepository,
    UserRepository, UserWithPermissions,
};
use campo_server_domain::shared_kernel::{require_fields, DomainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

#[derive(Clone)]
pub struct UserAdminService {
    users: Arc<dyn UserRepository>,
    permissions: Arc<dyn PermissionRepository>,
    audit: AuditService,
}

impl UserAdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        permissions: Arc<dyn PermissionRepository>,
        audit: AuditService,
    ) -> Self {
        Self {
            users,
            permissions,
            audit,
        }
    }

    pub async fn list(&self) -> Result<Vec<UserWithPermissions>> {
        self.users.list_with_permissions().await
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: CreateUserRequest,
    ) -> Result<CreatedUser> {
        require_fields(&[
            ("username", request.username.as_deref()),
            ("password", request.password.as_deref()),
            ("role", request.role.as_deref()),
        ])?;
        let username = request.username.unwrap_or_default();
        let role = request.role.unwrap_or_default();
        if !is_valid_role(&role) {
            return Err(DomainError::InvalidRole { role });
        }
        if self.users.username_taken(&username, None).await? {
            return Err(DomainError::UsernameTaken { username });
        }

        let hash = hash_password(&request.password.unwrap_or_default()).await?;
        let id = self.users.insert(&username, &hash, &role).await?;

        info!(user = %ctx.user.username, created = %username, %role, "user created");
        self.audit
            .record(
                ctx,
                AuditRecord::new("CREATE_USER", "user")
                    .entity_id(id)
                    .new_value(json!({
                        "id": id,
                        "username": username,
                        "role": role,
                        "is_active": 1,
                    })),
            )
            .await;

        Ok(CreatedUser { id, username, role })
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        request: UpdateUserRequest,
    ) -> Result<()> {
        require_fields(&[
            ("username", request.username.as_deref()),
            ("role", request.role.as_deref()),
        ])?;
        let username = request.username.unwrap_or_default();
        let role = request.role.unwrap_or_default();
        if !is_valid_role(&role) {
            return Err(DomainError::InvalidRole { role });
        }

        let old = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound { id })?;
        if self.users.username_taken(&username, Some(id)).await? {
            return Err(DomainError::UsernameTaken { username });
        }

        let is_active = request.is_active.unwrap_or(1);
        let hash = match request.password.as_deref().map(str::trim) {
            Some(password) if !password.is_empty() => Some(hash_password(password).await?),
            _ => None,
        };
        self.users
            .update(id, &username, hash.as_deref(), &role, is_active)
            .await?;

        info!(user = %ctx.user.username, updated = %username, id, "user updated");
        self.audit
            .record(
                ctx,
                AuditRecord::new("UPDATE_USER", "user")
                    .entity_id(id)
                    .old_value(json!({
                        "id": old.id,
                        "username": old.username,
                        "role": old.role,
                        "is_active": old.is_active,
                    }))
                    .new_value(json!({
                        "id": id,
                        "username": username,
                        "role": role,
                        "is_active": is_active,
                    })),
            )
            .await;

        Ok(())
    }

    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> Result<()> {
        if ctx.user.id == id {
            return Err(DomainError::SelfDeletion);
        }
        let old = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound { id })?;

        let changes = self.users.delete(id).await?;
        if changes == 0 {
            return Err(DomainError::UserNotFound { id });
        }

        info!(user = %ctx.user.username, deleted = %old.username, id, "user deleted");
        self.audit
            .record(
                ctx,
                AuditRecord::new("DELETE_USER", "user")
                    .entity_id(id)
                    .old_value(json!({
                        "id": old.id,
                        "username": old.username,
                        "role": old.role,
                        "is_active": old.is_active,
                    })),
            )
            .await;

        Ok(())
    }

    /// The effective list the permission editor shows: the override set if
    /// present, the role grants otherwise.
    pub async fn permissions_of(&self, id: i64) -> Result<Vec<String>> {
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound { id })?;
        let user_perms = self.permissions.user_permissions(id).await?;
        let role_perms = self.permissions.role_permissions(&user.role).await?;
        Ok(effective_permissions(user_perms, role_perms))
    }

    /// Replaces the override set; an empty list restores role inheritance.
    pub async fn set_permissions(
        &self,
        ctx: &RequestContext,
        id: i64,
        permissions: Vec<String>,
    ) -> Result<Vec<String>> {
        let normalized = normalize_permissions(&permissions);
        let old = self.permissions.user_permissions(id).await?;
        self.permissions
            .replace_user_permissions(id, &normalized)
            .await?;

        info!(
            user = %ctx.user.username,
            target = id,
            count = normalized.len(),
            "permission override replaced"
        );
        self.audit
            .record(
                ctx,
                AuditRecord::new("UPDATE_PERMISSIONS", "user_permissions")
                    .entity_id(id)
                    .old_value(json!({"user_id": id, "permissions": old}))
                    .new_value(json!({"user_id": id, "permissions": normalized})),
            )
            .await;

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::tests::{ctx, RecordingAudit};
    use campo_server_domain::auth::User;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockUsers {
        users: Mutex<Vec<User>>,
        next_id: Mutex<i64>,
    }

    impl MockUsers {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                users: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
            })
        }
    }

    #[async_trait::async_trait]
    impl UserRepository for MockUsers {
        async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn list_with_permissions(&self) -> Result<Vec<UserWithPermissions>> {
            Ok(vec![])
        }

        async fn username_taken(&self, username: &str, exclude_id: Option<i64>) -> Result<bool> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .any(|u| u.username == username && Some(u.id) != exclude_id))
        }

        async fn insert(&self, username: &str, hash: &str, role: &str) -> Result<i64> {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            self.users.lock().unwrap().push(User {
                id,
                username: username.to_string(),
                password_hash: hash.to_string(),
                role: role.to_string(),
                is_active: 1,
                created_at: "2024-03-01 08:00:00".to_string(),
            });
            Ok(id)
        }

        async fn update(
            &self,
            id: i64,
            username: &str,
            hash: Option<&str>,
            role: &str,
            is_active: i64,
        ) -> Result<u64> {
            let mut users = self.users.lock().unwrap();
            match users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    user.username = username.to_string();
                    if let Some(hash) = hash {
                        user.password_hash = hash.to_string();
                    }
                    user.role = role.to_string();
                    user.is_active = is_active;
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn delete(&self, id: i64) -> Result<u64> {
            let mut users = self.users.lock().unwrap();
            let before = users.len();
            users.retain(|u| u.id != id);
            Ok((before - users.len()) as u64)
        }
    }

    #[derive(Default)]
    struct MockPerms {
        user_perms: Mutex<HashMap<i64, Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl PermissionRepository for MockPerms {
        async fn user_permissions(&self, user_id: i64) -> Result<Vec<String>> {
            Ok(self
                .user_perms
                .lock()
                .unwrap()
                .get(&user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn role_permissions(&self, role: &str) -> Result<Vec<String>> {
            Ok(match role {
                "suporte" => vec!["agenda.view".to_string(), "vagas.view".to_string()],
                _ => vec![],
            })
        }

        async fn replace_user_permissions(
            &self,
            user_id: i64,
            permissions: &[String],
        ) -> Result<()> {
            self.user_perms
                .lock()
                .unwrap()
                .insert(user_id, permissions.to_vec());
            Ok(())
        }
    }

    fn service(users: Arc<MockUsers>, audit: Arc<RecordingAudit>) -> UserAdminService {
        UserAdminService::new(users, Arc::new(MockPerms::default()), AuditService::new(audit))
    }

    fn create_request(username: &str, role: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: Some(username.to_string()),
            password: Some("s3cret!".to_string()),
            role: Some(role.to_string()),
        }
    }

    #[tokio::test]
    async fn create_rejects_bad_roles_and_duplicates() {
        let users = MockUsers::new();
        let service = service(users.clone(), RecordingAudit::new());

        let err = service
            .create(&ctx(), create_request("ana", "root"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidRole { .. }));

        service
            .create(&ctx(), create_request("ana", "suporte"))
            .await
            .unwrap();
        let err = service
            .create(&ctx(), create_request("ana", "suporte"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::UsernameTaken { .. }));
    }

    #[tokio::test]
    async fn create_stores_a_hash_not_the_password() {
        let users = MockUsers::new();
        let service = service(users.clone(), RecordingAudit::new());
        service
            .create(&ctx(), create_request("ana", "suporte"))
            .await
            .unwrap();

        let stored = users.find_by_username("ana").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "s3cret!");
        assert!(stored.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn update_keeps_the_password_when_blank() {
        let users = MockUsers::new();
        let service = service(users.clone(), RecordingAudit::new());
        let created = service
            .create(&ctx(), create_request("ana", "suporte"))
            .await
            .unwrap();
        let original_hash = users
            .find_by_id(created.id)
            .await
            .unwrap()
            .unwrap()
            .password_hash;

        service
            .update(
                &ctx(),
                created.id,
                UpdateUserRequest {
                    username: Some("ana".to_string()),
                    password: Some("   ".to_string()),
                    role: Some("supervisor".to_string()),
                    is_active: Some(0),
                },
            )
            .await
            .unwrap();

        let updated = users.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, original_hash);
        assert_eq!(updated.role, "supervisor");
        assert_eq!(updated.is_active, 0);
    }

    #[tokio::test]
    async fn self_deletion_is_blocked() {
        let users = MockUsers::new();
        let service = service(users.clone(), RecordingAudit::new());
        // ctx() acts as user id 1.
        users.insert("hiago", "$2b$h", "admin").await.unwrap();

        let err = service.delete(&ctx(), 1).await.unwrap_err();
        assert!(matches!(err, DomainError::SelfDeletion));
    }

    #[tokio::test]
    async fn set_permissions_normalizes_and_audits() {
        let users = MockUsers::new();
        let audit = RecordingAudit::new();
        let service = service(users.clone(), audit.clone());
        let created = service
            .create(&ctx(), create_request("ana", "suporte"))
            .await
            .unwrap();

        let stored = service
            .set_permissions(
                &ctx(),
                created.id,
                vec![
                    " logs.view ".to_string(),
                    "logs.view".to_string(),
                    String::new(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(stored, vec!["logs.view"]);

        // With an override the effective list is the override.
        assert_eq!(
            service.permissions_of(created.id).await.unwrap(),
            vec!["logs.view"]
        );

        // Clearing the override restores role inheritance.
        service
            .set_permissions(&ctx(), created.id, vec![])
            .await
            .unwrap();
        assert_eq!(
            service.permissions_of(created.id).await.unwrap(),
            vec!["agenda.view", "vagas.view"]
        );

        let records = audit.records.lock().unwrap();
        assert!(records
            .iter()
            .any(|r| r.action == "UPDATE_PERMISSIONS"));
    }
}
