//! Audit trail: before/after snapshots of every mutating operation.

use crate::shared_kernel::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A stored audit row. `old_value`/`new_value` hold the JSON snapshots as
/// the text they were written with, so the API serves them untouched.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

/// A record to append. Built by the application services; the acting user
/// and client metadata come from the request context.
#[derive(Debug, Clone, Default)]
pub struct AuditRecord {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditRecord {
    pub fn new(action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity_type: entity_type.into(),
            ..Self::default()
        }
    }

    pub fn entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn old_value(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }
}

pub const AUDIT_PAGE_LIMIT_DEFAULT: i64 = 50;
pub const AUDIT_PAGE_LIMIT_MAX: i64 = 200;

/// Filters of the audit listing.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// `YYYY-MM-DD`, inclusive, matched on `DATE(created_at)`.
    pub from: Option<String>,
    pub to: Option<String>,
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl AuditQuery {
    pub fn normalize(mut self) -> Self {
        if self.page < 1 {
            self.page = 1;
        }
        if self.limit < 1 {
            self.limit = AUDIT_PAGE_LIMIT_DEFAULT;
        }
        self.limit = self.limit.min(AUDIT_PAGE_LIMIT_MAX);
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone)]
pub struct AuditPage {
    pub rows: Vec<AuditEntry>,
    pub total: i64,
}

/// Distinct values backing the audit filter dropdowns.
#[derive(Debug, Clone, Serialize)]
pub struct AuditMeta {
    pub actions: Vec<String>,
    pub entity_types: Vec<String>,
    pub users: Vec<AuditUserRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditUserRef {
    pub id: i64,
    pub username: String,
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert(&self, record: &AuditRecord) -> Result<()>;
    async fn query(&self, query: &AuditQuery) -> Result<AuditPage>;
    async fn meta(&self) -> Result<AuditMeta>;
}
