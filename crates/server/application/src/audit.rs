//! Audit trail service: best-effort writes, queryable history.

use crate::context::RequestContext;
use campo_server_domain::audit::{
    AuditMeta, AuditPage, AuditQuery, AuditRecord, AuditRepository,
};
use campo_server_domain::shared_kernel::Result;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AuditService {
    repository: Arc<dyn AuditRepository>,
}

impl AuditService {
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Stamps the record with the acting user and client metadata and writes
    /// it. A failed write must never fail the operation being audited, so
    /// errors only reach the log.
    pub async fn record(&self, ctx: &RequestContext, mut record: AuditRecord) {
        record.user_id = Some(ctx.user.id);
        record.username = Some(ctx.user.username.clone());
        record.ip_address = ctx.ip_address.clone();
        record.user_agent = ctx.user_agent.clone();

        if let Err(err) = self.repository.insert(&record).await {
            warn!(action = %record.action, %err, "failed to write audit entry");
        }
    }

    pub async fn query(&self, query: AuditQuery) -> Result<AuditPage> {
        self.repository.query(&query.normalize()).await
    }

    pub async fn meta(&self) -> Result<AuditMeta> {
        self.repository.meta().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campo_server_domain::audit::AuditMeta;
    use campo_server_domain::auth::SessionUser;
    use campo_server_domain::shared_kernel::DomainError;
    use std::sync::Mutex;

    struct MockAuditRepository {
        saved: Mutex<Vec<AuditRecord>>,
        fail: bool,
    }

    impl MockAuditRepository {
        fn new(fail: bool) -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait::async_trait]
    impl AuditRepository for MockAuditRepository {
        async fn insert(&self, record: &AuditRecord) -> Result<()> {
            if self.fail {
                return Err(DomainError::storage("disk full"));
            }
            self.saved.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn query(&self, _query: &AuditQuery) -> Result<AuditPage> {
            Ok(AuditPage {
                rows: vec![],
                total: 0,
            })
        }

        async fn meta(&self) -> Result<AuditMeta> {
            Ok(AuditMeta {
                actions: vec![],
                entity_types: vec![],
                users: vec![],
            })
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::with_client(
            SessionUser {
                id: 1,
                username: "hiago".to_string(),
                role: "admin".to_string(),
            },
            Some("127.0.0.1".to_string()),
            Some("tests".to_string()),
        )
    }

    #[tokio::test]
    async fn record_stamps_the_acting_user() {
        let repo = Arc::new(MockAuditRepository::new(false));
        let service = AuditService::new(repo.clone());

        service
            .record(&ctx(), AuditRecord::new("CREATE_USER", "user").entity_id(9))
            .await;

        let saved = repo.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].user_id, Some(1));
        assert_eq!(saved[0].username.as_deref(), Some("hiago"));
        assert_eq!(saved[0].ip_address.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn failed_writes_are_swallowed() {
        let service = AuditService::new(Arc::new(MockAuditRepository::new(true)));
        // Must not panic or propagate.
        service
            .record(&ctx(), AuditRecord::new("CREATE_USER", "user"))
            .await;
    }
}
