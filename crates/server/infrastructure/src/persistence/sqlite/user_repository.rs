use async_trait::async_trait;
use campo_server_domain::auth::{
    PermissionRepository, User, UserRepository, UserWithPermissions,
};
use campo_server_domain::shared_kernel::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::storage;

#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &SqliteRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password"),
            role: row.get("role"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to load user", e))?;
        Ok(row.as_ref().map(Self::row_to_user))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to load user by name", e))?;
        Ok(row.as_ref().map(Self::row_to_user))
    }

    async fn list_with_permissions(&self) -> Result<Vec<UserWithPermissions>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.username, u.role, u.is_active, u.created_at,
                   GROUP_CONCAT(up.permission) as permissions
            FROM users u
            LEFT JOIN user_permissions up ON u.id = up.user_id
            GROUP BY u.id, u.username, u.role, u.is_active, u.created_at
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to list users", e))?;

        Ok(rows
            .iter()
            .map(|row| {
                let concat: Option<String> = row.get("permissions");
                UserWithPermissions {
                    id: row.get("id"),
                    username: row.get("username"),
                    role: row.get("role"),
                    is_active: row.get("is_active"),
                    created_at: row.get("created_at"),
                    permissions: concat
                        .map(|s| {
                            s.split(',')
                                .filter(|p| !p.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn username_taken(&self, username: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = match exclude_id {
            Some(id) => sqlx::query("SELECT id FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(id)
                .fetch_optional(&self.pool)
                .await,
            None => sqlx::query("SELECT id FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await,
        }
        .map_err(|e| storage("failed to check username", e))?;
        Ok(row.is_some())
    }

    async fn insert(&self, username: &str, password_hash: &str, role: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to insert user", e))?;
        Ok(result.last_insert_rowid())
    }

    async fn update(
        &self,
        id: i64,
        username: &str,
        password_hash: Option<&str>,
        role: &str,
        is_active: i64,
    ) -> Result<u64> {
        let result = match password_hash {
            Some(hash) => {
                sqlx::query(
                    "UPDATE users SET username = ?, password = ?, role = ?, is_active = ? WHERE id = ?",
                )
                .bind(username)
                .bind(hash)
                .bind(role)
                .bind(is_active)
                .bind(id)
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query("UPDATE users SET username = ?, role = ?, is_active = ? WHERE id = ?")
                    .bind(username)
                    .bind(role)
                    .bind(is_active)
                    .bind(id)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| storage("failed to update user", e))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to delete user", e))?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct SqlitePermissionRepository {
    pool: SqlitePool,
}

impl SqlitePermissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for SqlitePermissionRepository {
    async fn user_permissions(&self, user_id: i64) -> Result<Vec<String>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM user_permissions WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage("failed to load user permissions", e))?;
        Ok(rows)
    }

    async fn role_permissions(&self, role: &str) -> Result<Vec<String>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM role_permissions WHERE role = ?")
                .bind(role)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage("failed to load role permissions", e))?;
        Ok(rows)
    }

    async fn replace_user_permissions(&self, user_id: i64, permissions: &[String]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage("failed to open transaction", e))?;

        sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("failed to clear permissions", e))?;

        for permission in permissions {
            sqlx::query(
                "INSERT OR IGNORE INTO user_permissions (user_id, permission) VALUES (?, ?)",
            )
            .bind(user_id)
            .bind(permission)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("failed to store permission", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| storage("failed to commit permissions", e))?;
        Ok(())
    }
}
