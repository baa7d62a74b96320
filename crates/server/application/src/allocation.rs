//! Slot allocation: the drag-and-drop move of an order onto the capacity
//! board. The order's city and OS type pin the capacity cell; the request
//! picks the day, period and the subject column of the slot.

use crate::audit::AuditService;
use crate::context::RequestContext;
use campo_server_domain::audit::AuditRecord;
use campo_server_domain::orders::{OccupancyQuery, OrderRepository};
use campo_server_domain::scheduling::{CapacityCell, VacancyRepository};
use campo_server_domain::shared_kernel::{day_of, require_fields, DomainError, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct AllocateRequest {
    pub data_hora: Option<String>,
    pub periodo: Option<String>,
    pub vaga_assunto: Option<String>,
}

#[derive(Clone)]
pub struct AllocationService {
    orders: Arc<dyn OrderRepository>,
    vacancies: Arc<dyn VacancyRepository>,
    audit: AuditService,
}

impl AllocationService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        vacancies: Arc<dyn VacancyRepository>,
        audit: AuditService,
    ) -> Self {
        Self {
            orders,
            vacancies,
            audit,
        }
    }

    /// Places order `id` into a slot, enforcing the cell's effective
    /// capacity: configured capacity minus the slots closed for that day.
    pub async fn allocate(
        &self,
        ctx: &RequestContext,
        id: i64,
        request: AllocateRequest,
    ) -> Result<u64> {
        require_fields(&[
            ("data_hora", request.data_hora.as_deref()),
            ("periodo", request.periodo.as_deref()),
            ("vaga_assunto", request.vaga_assunto.as_deref()),
        ])?;
        let data_hora = request.data_hora.unwrap_or_default();
        let periodo = request.periodo.unwrap_or_default();
        let vaga_assunto = request.vaga_assunto.unwrap_or_default();

        let order = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or(DomainError::OrderNotFound { id })?;

        let tipo_os = order.tipo_os.clone().unwrap_or_default();
        let cell = CapacityCell {
            cidade: order.cidade.clone(),
            tipo_os: tipo_os.clone(),
            periodo: periodo.clone(),
            assunto: vaga_assunto.clone(),
        };

        let capacity = self.vacancies.capacity_for(&cell).await?;
        let day = day_of(&data_hora).unwrap_or_else(|| data_hora.clone());
        let closed = self.vacancies.count_closed(&cell, &day).await?;
        let effective = (capacity - closed).max(0);

        let occupied = self
            .orders
            .count_occupied(&OccupancyQuery {
                cidade: order.cidade.clone(),
                tipo_os,
                data_hora: data_hora.clone(),
                assunto: vaga_assunto.clone(),
                periodo: periodo.clone(),
            })
            .await?;

        if occupied >= effective {
            return Err(DomainError::CapacityExceeded {
                assunto: vaga_assunto,
                periodo,
                capacity: effective,
            });
        }

        let changes = self
            .orders
            .allocate(id, &data_hora, &periodo, &vaga_assunto)
            .await?;
        if changes == 0 {
            return Err(DomainError::OrderNotFound { id });
        }
        let new = self.orders.find_by_id(id).await?;

        info!(
            user = %ctx.user.username,
            id,
            %data_hora,
            %periodo,
            "service order allocated"
        );
        self.audit
            .record(
                ctx,
                AuditRecord::new("ALLOCATE_AGENDAMENTO", "agendamento")
                    .entity_id(id)
                    .old_value(serde_json::to_value(&order).unwrap_or_default())
                    .new_value(serde_json::to_value(&new).unwrap_or_default()),
            )
            .await;

        Ok(changes)
    }
}
