//! Service-order CRUD and search use cases.

use crate::audit::AuditService;
use crate::context::RequestContext;
use campo_server_domain::audit::AuditRecord;
use campo_server_domain::orders::{
    NewOrder, OrderListFilter, OrderPage, OrderPatch, OrderRepository, OrderSearch, ServiceOrder,
};
use campo_server_domain::shared_kernel::{require_fields, DomainError, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Payload of the create endpoint. `observacao` keeps the singular wire
/// spelling the clients send.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub cliente: Option<String>,
    pub cidade: Option<String>,
    pub assunto: Option<String>,
    pub observacao: Option<String>,
    pub tipo_os: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    audit: AuditService,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, audit: AuditService) -> Self {
        Self { orders, audit }
    }

    pub async fn get(&self, id: i64) -> Result<ServiceOrder> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or(DomainError::OrderNotFound { id })
    }

    pub async fn list(&self, filter: OrderListFilter) -> Result<Vec<ServiceOrder>> {
        self.orders.list(&filter).await
    }

    pub async fn search(&self, search: OrderSearch) -> Result<(OrderSearch, OrderPage)> {
        let search = search.normalize();
        let page = self.orders.search(&search).await?;
        Ok((search, page))
    }

    pub async fn unallocated(&self) -> Result<Vec<ServiceOrder>> {
        self.orders.unallocated().await
    }

    pub async fn create(&self, ctx: &RequestContext, request: CreateOrderRequest) -> Result<i64> {
        require_fields(&[
            ("cliente", request.cliente.as_deref()),
            ("cidade", request.cidade.as_deref()),
            ("assunto", request.assunto.as_deref()),
            ("tipo_os", request.tipo_os.as_deref()),
        ])?;

        let order = NewOrder {
            cliente: request.cliente.unwrap_or_default(),
            cidade: request.cidade.unwrap_or_default(),
            assunto: request.assunto.unwrap_or_default(),
            observacoes: request.observacao,
            tipo_os: request.tipo_os.unwrap_or_default(),
        };

        let id = self.orders.insert(&order).await?;
        info!(
            user = %ctx.user.username,
            id,
            cliente = %order.cliente,
            "service order created"
        );

        self.audit
            .record(
                ctx,
                AuditRecord::new("CREATE_AGENDAMENTO", "agendamento")
                    .entity_id(id)
                    .new_value(json!({
                        "id": id,
                        "cliente": order.cliente,
                        "cidade": order.cidade,
                        "assunto": order.assunto,
                        "observacoes": order.observacoes,
                        "status": "Aberta",
                        "tipo_os": order.tipo_os,
                    })),
            )
            .await;

        Ok(id)
    }

    /// Partial update. Returns the number of changed rows for the response
    /// body the clients expect.
    pub async fn update(&self, ctx: &RequestContext, id: i64, patch: OrderPatch) -> Result<u64> {
        if patch.is_empty() {
            return Err(DomainError::Validation {
                details: vec!["Nenhum campo para atualizar foi fornecido".to_string()],
            });
        }

        let old = self.get(id).await?;
        let changes = self.orders.update(id, &patch).await?;
        if changes == 0 {
            return Err(DomainError::OrderNotFound { id });
        }
        let new = self.get(id).await?;

        info!(user = %ctx.user.username, id, "service order updated");
        self.audit
            .record(
                ctx,
                AuditRecord::new("UPDATE_AGENDAMENTO", "agendamento")
                    .entity_id(id)
                    .old_value(serde_json::to_value(&old).unwrap_or_default())
                    .new_value(serde_json::to_value(&new).unwrap_or_default()),
            )
            .await;

        Ok(changes)
    }

    pub async fn remove(&self, ctx: &RequestContext, id: i64) -> Result<u64> {
        let old = self.get(id).await?;
        let changes = self.orders.delete(id).await?;
        if changes == 0 {
            return Err(DomainError::OrderNotFound { id });
        }

        info!(user = %ctx.user.username, id, "service order deleted");
        self.audit
            .record(
                ctx,
                AuditRecord::new("DELETE_AGENDAMENTO", "agendamento")
                    .entity_id(id)
                    .old_value(serde_json::to_value(&old).unwrap_or_default()),
            )
            .await;

        Ok(changes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use campo_server_domain::audit::{
        AuditMeta, AuditPage, AuditQuery, AuditRepository,
    };
    use campo_server_domain::auth::SessionUser;
    use campo_server_domain::orders::OccupancyQuery;
    use std::sync::Mutex;

    /// Audit sink shared by the service tests in this crate.
    pub(crate) struct RecordingAudit {
        pub records: Mutex<Vec<AuditRecord>>,
    }

    impl RecordingAudit {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl AuditRepository for RecordingAudit {
        async fn insert(&self, record: &AuditRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
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

    /// In-memory order store with just enough behavior for the use cases.
    pub(crate) struct MockOrderRepository {
        pub orders: Mutex<Vec<ServiceOrder>>,
        next_id: Mutex<i64>,
    }

    impl MockOrderRepository {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                orders: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
            })
        }
    }

    #[async_trait::async_trait]
    impl OrderRepository for MockOrderRepository {
        async fn find_by_id(&self, id: i64) -> Result<Option<ServiceOrder>> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == id)
                .cloned())
        }

        async fn list(&self, _filter: &OrderListFilter) -> Result<Vec<ServiceOrder>> {
            Ok(self.orders.lock().unwrap().clone())
        }

        async fn search(&self, _search: &OrderSearch) -> Result<OrderPage> {
            let rows = self.orders.lock().unwrap().clone();
            let total = rows.len() as i64;
            Ok(OrderPage { rows, total })
        }

        async fn unallocated(&self) -> Result<Vec<ServiceOrder>> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.status == "Aberta")
                .cloned()
                .collect())
        }

        async fn board_orders(
            &self,
            cidade: &str,
            tipo_os: &str,
            day: &str,
        ) -> Result<Vec<ServiceOrder>> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| {
                    o.cidade == cidade
                        && o.tipo_os.as_deref() == Some(tipo_os)
                        && o.status != "Aberta"
                        && o.data_hora
                            .as_deref()
                            .map(|dh| dh.starts_with(day))
                            .unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn insert(&self, order: &NewOrder) -> Result<i64> {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            self.orders.lock().unwrap().push(ServiceOrder {
                id,
                cliente: order.cliente.clone(),
                cidade: order.cidade.clone(),
                assunto: order.assunto.clone(),
                data_hora: None,
                periodo: None,
                tecnico: None,
                status: "Aberta".to_string(),
                observacoes: order.observacoes.clone(),
                tipo_os: Some(order.tipo_os.clone()),
                created_at: "2024-03-01 08:00:00".to_string(),
                updated_at: "2024-03-01 08:00:00".to_string(),
            });
            Ok(id)
        }

        async fn update(&self, id: i64, patch: &OrderPatch) -> Result<u64> {
            let mut orders = self.orders.lock().unwrap();
            match orders.iter_mut().find(|o| o.id == id) {
                Some(order) => {
                    if let Some(ref v) = patch.cliente {
                        order.cliente = v.clone();
                    }
                    if let Some(ref v) = patch.status {
                        order.status = v.clone();
                    }
                    if let Some(ref v) = patch.tecnico {
                        order.tecnico = Some(v.clone());
                    }
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn delete(&self, id: i64) -> Result<u64> {
            let mut orders = self.orders.lock().unwrap();
            let before = orders.len();
            orders.retain(|o| o.id != id);
            Ok((before - orders.len()) as u64)
        }

        async fn count_occupied(&self, cell: &OccupancyQuery) -> Result<i64> {
            let day = cell.data_hora.split('T').next().unwrap_or("").to_string();
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| {
                    o.cidade == cell.cidade
                        && o.tipo_os.as_deref() == Some(cell.tipo_os.as_str())
                        && o.assunto == cell.assunto
                        && o.periodo.as_deref() == Some(cell.periodo.as_str())
                        && o.status != "Cancelada"
                        && o.status != "Aberta"
                        && o.data_hora
                            .as_deref()
                            .map(|dh| dh.starts_with(&day))
                            .unwrap_or(false)
                })
                .count() as i64)
        }

        async fn allocate(
            &self,
            id: i64,
            data_hora: &str,
            periodo: &str,
            assunto: &str,
        ) -> Result<u64> {
            let mut orders = self.orders.lock().unwrap();
            match orders.iter_mut().find(|o| o.id == id) {
                Some(order) => {
                    order.data_hora = Some(data_hora.to_string());
                    order.periodo = Some(periodo.to_string());
                    order.assunto = assunto.to_string();
                    order.status = "Agendada".to_string();
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    pub(crate) fn ctx() -> RequestContext {
        RequestContext::new(SessionUser {
            id: 1,
            username: "hiago".to_string(),
            role: "admin".to_string(),
        })
    }

    fn service(
        repo: Arc<MockOrderRepository>,
        audit: Arc<RecordingAudit>,
    ) -> OrderService {
        OrderService::new(repo, AuditService::new(audit))
    }

    #[tokio::test]
    async fn create_validates_required_fields() {
        let service = service(MockOrderRepository::new(), RecordingAudit::new());
        let err = service
            .create(
                &ctx(),
                CreateOrderRequest {
                    cliente: Some("ACME".to_string()),
                    cidade: None,
                    assunto: Some("SEM CONEXÃO".to_string()),
                    observacao: None,
                    tipo_os: Some("  ".to_string()),
                },
            )
            .await
            .unwrap_err();

        match err {
            DomainError::Validation { details } => {
                assert_eq!(details.len(), 2);
                assert!(details.iter().any(|d| d.contains("cidade")));
                assert!(details.iter().any(|d| d.contains("tipo_os")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_audits_the_new_order() {
        let audit = RecordingAudit::new();
        let service = service(MockOrderRepository::new(), audit.clone());
        let id = service
            .create(
                &ctx(),
                CreateOrderRequest {
                    cliente: Some("ACME".to_string()),
                    cidade: Some("PARACATU".to_string()),
                    assunto: Some("SEM CONEXÃO".to_string()),
                    observacao: Some("portão azul".to_string()),
                    tipo_os: Some("FIBRA".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(id, 1);

        let records = audit.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "CREATE_AGENDAMENTO");
        assert_eq!(records[0].new_value.as_ref().unwrap()["status"], "Aberta");
    }

    #[tokio::test]
    async fn update_rejects_empty_patches_and_unknown_ids() {
        let repo = MockOrderRepository::new();
        let service = service(repo.clone(), RecordingAudit::new());

        let err = service
            .update(&ctx(), 1, OrderPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let patch = OrderPatch {
            tecnico: Some("Maria Souza".to_string()),
            ..OrderPatch::default()
        };
        let err = service.update(&ctx(), 42, patch).await.unwrap_err();
        assert!(matches!(err, DomainError::OrderNotFound { id: 42 }));
    }

    #[tokio::test]
    async fn update_audits_before_and_after() {
        let repo = MockOrderRepository::new();
        let audit = RecordingAudit::new();
        let service = service(repo.clone(), audit.clone());
        let id = service
            .create(
                &ctx(),
                CreateOrderRequest {
                    cliente: Some("ACME".to_string()),
                    cidade: Some("PARACATU".to_string()),
                    assunto: Some("SEM CONEXÃO".to_string()),
                    observacao: None,
                    tipo_os: Some("FIBRA".to_string()),
                },
            )
            .await
            .unwrap();

        let patch = OrderPatch {
            status: Some("Em andamento".to_string()),
            ..OrderPatch::default()
        };
        assert_eq!(service.update(&ctx(), id, patch).await.unwrap(), 1);

        let records = audit.records.lock().unwrap();
        let update = records.last().unwrap();
        assert_eq!(update.action, "UPDATE_AGENDAMENTO");
        assert_eq!(update.old_value.as_ref().unwrap()["status"], "Aberta");
        assert_eq!(
            update.new_value.as_ref().unwrap()["status"],
            "Em andamento"
        );
    }

    #[tokio::test]
    async fn remove_keeps_the_final_snapshot() {
        let repo = MockOrderRepository::new();
        let audit = RecordingAudit::new();
        let service = service(repo.clone(), audit.clone());
        let id = service
            .create(
                &ctx(),
                CreateOrderRequest {
                    cliente: Some("ACME".to_string()),
                    cidade: Some("PARACATU".to_string()),
                    assunto: Some("SEM CONEXÃO".to_string()),
                    observacao: None,
                    tipo_os: Some("FIBRA".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(service.remove(&ctx(), id).await.unwrap(), 1);
        assert!(service.get(id).await.is_err());

        let records = audit.records.lock().unwrap();
        let delete = records.last().unwrap();
        assert_eq!(delete.action, "DELETE_AGENDAMENTO");
        assert_eq!(delete.old_value.as_ref().unwrap()["cliente"], "ACME");
        assert!(delete.new_value.is_none());
    }
}
