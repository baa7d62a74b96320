//! Vacancy board queries and capacity-template management.

use crate::audit::AuditService;
use crate::context::RequestContext;
use campo_server_domain::audit::AuditRecord;
use campo_server_domain::orders::{OrderListFilter, OrderRepository};
use campo_server_domain::scheduling::{
    city_template_map, closed_slot_map, sort_by_schedule, BoardEntry, CapacityCell, DayBoard,
    PeriodMap, SubjectCapacity, VacancyRepository,
};
use campo_server_domain::shared_kernel::{
    require_fields, DomainError, OrderStatus, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Legacy dashboard feed: the whole city template plus the day's allocated
/// orders.
#[derive(Debug, Clone, Serialize)]
pub struct CityOverview {
    pub template: BTreeMap<String, PeriodMap<i64>>,
    pub ocupadas: Vec<BoardEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveCapacitiesRequest {
    pub city: Option<String>,
    pub tipo_os: Option<String>,
    pub periodo: Option<String>,
    pub capacities: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustCapacityRequest {
    pub city: Option<String>,
    pub tipo_os: Option<String>,
    pub periodo: Option<String>,
    pub assunto: Option<String>,
    pub delta: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetSlotClosedRequest {
    pub cidade: Option<String>,
    pub data: Option<String>,
    pub tipo: Option<String>,
    pub periodo: Option<String>,
    pub assunto: Option<String>,
    pub index: Option<i64>,
    #[serde(default)]
    pub closed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotCloseOutcome {
    pub action: &'static str,
    pub changes: u64,
}

#[derive(Clone)]
pub struct VacancyService {
    orders: Arc<dyn OrderRepository>,
    vacancies: Arc<dyn VacancyRepository>,
    audit: AuditService,
}

impl VacancyService {
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

    pub async fn city_overview(&self, city: &str, day: &str) -> Result<CityOverview> {
        let template_rows = self.vacancies.city_template(city).await?;
        let mut allocated = self
            .orders
            .list(&OrderListFilter {
                cidade: Some(city.to_string()),
                data: Some(day.to_string()),
                status: Some(OrderStatus::Agendada.as_str().to_string()),
                cliente: None,
            })
            .await?;
        sort_by_schedule(&mut allocated);

        Ok(CityOverview {
            template: city_template_map(&template_rows),
            ocupadas: allocated.iter().map(BoardEntry::from).collect(),
        })
    }

    /// Detailed board for one city/OS-type/day.
    pub async fn day_board(&self, city: &str, tipo_os: &str, day: &str) -> Result<DayBoard> {
        let template_rows = self.vacancies.city_type_template(city, tipo_os).await?;
        if template_rows.is_empty() {
            return Err(DomainError::InvalidInput {
                message: "Cidade ou tipo de OS não encontrado".to_string(),
            });
        }

        let orders = self.orders.board_orders(city, tipo_os, day).await?;
        let closed = self
            .vacancies
            .closed_slots_for_day(city, tipo_os, day)
            .await?;

        Ok(DayBoard::assemble(&template_rows, &orders, &closed))
    }

    pub async fn closed_map(
        &self,
        city: &str,
        tipo_os: &str,
        day: &str,
    ) -> Result<PeriodMap<Vec<i64>>> {
        let rows = self
            .vacancies
            .closed_slots_for_day(city, tipo_os, day)
            .await?;
        Ok(closed_slot_map(&rows))
    }

    pub async fn set_slot_closed(
        &self,
        ctx: &RequestContext,
        request: SetSlotClosedRequest,
    ) -> Result<SlotCloseOutcome> {
        require_fields(&[
            ("cidade", request.cidade.as_deref()),
            ("data", request.data.as_deref()),
            ("tipo", request.tipo.as_deref()),
            ("periodo", request.periodo.as_deref()),
            ("assunto", request.assunto.as_deref()),
            ("index", request.index.map(|_| "set")),
        ])?;
        let index = request.index.unwrap_or(-1);
        if index < 0 {
            return Err(DomainError::InvalidInput {
                message: "index inválido".to_string(),
            });
        }

        let cidade = request.cidade.unwrap_or_default();
        let data = request.data.unwrap_or_default();
        let tipo = request.tipo.unwrap_or_default();
        let periodo = request.periodo.unwrap_or_default();
        let assunto = request.assunto.unwrap_or_default();

        let cell = CapacityCell {
            cidade: cidade.clone(),
            tipo_os: tipo.clone(),
            periodo: periodo.clone(),
            assunto: assunto.clone(),
        };
        let ids = self
            .vacancies
            .resolve_cell(&cell)
            .await?
            .ok_or_else(|| DomainError::InvalidInput {
                message: "Cidade/tipo/período/assunto inválidos".to_string(),
            })?;

        let closing = request.closed.unwrap_or(true);
        let entity_id = format!("{cidade}|{tipo}|{periodo}|{assunto}|{data}|{index}");

        if closing {
            self.vacancies
                .close_slot(&ids, &data, index, ctx.user.id)
                .await?;
            info!(user = %ctx.user.username, %entity_id, "slot closed");
            self.audit
                .record(
                    ctx,
                    AuditRecord::new("CLOSE_SLOT", "vacancy_closed_slot")
                        .entity_id(&entity_id)
                        .old_value(json!({"closed": false}))
                        .new_value(json!({
                            "closed": true,
                            "cidade": cidade,
                            "tipo": tipo,
                            "periodo": periodo,
                            "assunto": assunto,
                            "data": data,
                            "index": index,
                        })),
                )
                .await;
            Ok(SlotCloseOutcome {
                action: "close",
                changes: 1,
            })
        } else {
            let changes = self.vacancies.open_slot(&ids, &data, index).await?;
            info!(user = %ctx.user.username, %entity_id, "slot reopened");
            self.audit
                .record(
                    ctx,
                    AuditRecord::new("OPEN_SLOT", "vacancy_closed_slot")
                        .entity_id(&entity_id)
                        .old_value(json!({"closed": true}))
                        .new_value(json!({
                            "closed": false,
                            "cidade": cidade,
                            "tipo": tipo,
                            "periodo": periodo,
                            "assunto": assunto,
                            "data": data,
                            "index": index,
                        })),
                )
                .await;
            Ok(SlotCloseOutcome {
                action: "open",
                changes,
            })
        }
    }

    pub async fn template_capacities(
        &self,
        city: Option<&str>,
        tipo_os: Option<&str>,
        periodo: Option<&str>,
    ) -> Result<Vec<SubjectCapacity>> {
        require_fields(&[
            ("city", city),
            ("tipo_os", tipo_os),
            ("periodo", periodo),
        ])?;
        self.vacancies
            .subject_capacities(
                city.unwrap_or_default(),
                tipo_os.unwrap_or_default(),
                periodo.unwrap_or_default(),
            )
            .await
    }

    /// Bulk upsert of one city/type/period column set. Unknown subjects are
    /// skipped, matching the editor contract.
    pub async fn save_capacities(
        &self,
        ctx: &RequestContext,
        request: SaveCapacitiesRequest,
    ) -> Result<u64> {
        require_fields(&[
            ("city", request.city.as_deref()),
            ("tipo_os", request.tipo_os.as_deref()),
            ("periodo", request.periodo.as_deref()),
            ("capacities", request.capacities.as_ref().map(|_| "set")),
        ])?;
        let city = request.city.unwrap_or_default();
        let tipo_os = request.tipo_os.unwrap_or_default();
        let periodo = request.periodo.unwrap_or_default();
        let capacities = request.capacities.unwrap_or_default();

        let city_id = self
            .vacancies
            .find_city_id(&city, true)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "city",
                name: city.clone(),
            })?;
        let os_type_id = self
            .vacancies
            .find_os_type_id(&tipo_os, true)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "os_type",
                name: tipo_os.clone(),
            })?;
        let period_id = self
            .vacancies
            .find_period_id(&periodo)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "period",
                name: periodo.clone(),
            })?;

        let previous = self
            .vacancies
            .capacities_by_subject(city_id, os_type_id, period_id)
            .await?;
        let old_map: BTreeMap<String, i64> = previous
            .into_iter()
            .map(|c| (c.assunto, c.capacity))
            .collect();

        let mut changes = 0;
        for (assunto, capacity) in &capacities {
            let Some(subject_id) = self.vacancies.find_subject_id(assunto, true).await? else {
                continue;
            };
            self.vacancies
                .upsert_capacity(
                    &campo_server_domain::scheduling::CellIds {
                        city_id,
                        os_type_id,
                        period_id,
                        subject_id,
                    },
                    (*capacity).max(0),
                )
                .await?;
            changes += 1;
        }

        info!(user = %ctx.user.username, %city, %tipo_os, %periodo, changes, "capacity template saved");
        self.audit
            .record(
                ctx,
                AuditRecord::new("UPDATE_VACANCY_TEMPLATES", "vacancy_templates")
                    .entity_id(format!("{city}|{tipo_os}|{periodo}"))
                    .old_value(json!({
                        "city": city,
                        "tipo_os": tipo_os,
                        "periodo": periodo,
                        "capacities": old_map,
                    }))
                    .new_value(json!({
                        "city": city,
                        "tipo_os": tipo_os,
                        "periodo": periodo,
                        "capacities": capacities,
                    })),
            )
            .await;

        Ok(changes)
    }

    /// Single-cell +/- adjustment from the dashboard; clamps at zero.
    pub async fn adjust_capacity(
        &self,
        ctx: &RequestContext,
        request: AdjustCapacityRequest,
    ) -> Result<i64> {
        require_fields(&[
            ("city", request.city.as_deref()),
            ("tipo_os", request.tipo_os.as_deref()),
            ("periodo", request.periodo.as_deref()),
            ("assunto", request.assunto.as_deref()),
            ("delta", request.delta.map(|_| "set")),
        ])?;
        let delta = request.delta.unwrap_or(0);
        if delta != 1 && delta != -1 {
            return Err(DomainError::InvalidInput {
                message: "delta deve ser 1 ou -1".to_string(),
            });
        }

        let city = request.city.unwrap_or_default();
        let tipo_os = request.tipo_os.unwrap_or_default();
        let periodo = request.periodo.unwrap_or_default();
        let assunto = request.assunto.unwrap_or_default();

        let city_id = self
            .vacancies
            .find_city_id(&city, false)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "city",
                name: city.clone(),
            })?;
        let os_type_id = self
            .vacancies
            .find_os_type_id(&tipo_os, true)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "os_type",
                name: tipo_os.clone(),
            })?;
        let period_id = self
            .vacancies
            .find_period_id(&periodo)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "period",
                name: periodo.clone(),
            })?;
        let subject_id = self
            .vacancies
            .find_subject_id(&assunto, false)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "subject",
                name: assunto.clone(),
            })?;

        let cell = CapacityCell {
            cidade: city.clone(),
            tipo_os: tipo_os.clone(),
            periodo: periodo.clone(),
            assunto: assunto.clone(),
        };
        let old_capacity = self.vacancies.capacity_for(&cell).await?;
        let new_capacity = (old_capacity + delta).max(0);

        self.vacancies
            .upsert_capacity(
                &campo_server_domain::scheduling::CellIds {
                    city_id,
                    os_type_id,
                    period_id,
                    subject_id,
                },
                new_capacity,
            )
            .await?;

        info!(
            user = %ctx.user.username,
            %city, %tipo_os, %periodo, %assunto,
            old_capacity, new_capacity,
            "capacity adjusted"
        );
        self.audit
            .record(
                ctx,
                AuditRecord::new("VACANCY_TEMPLATE_ADJUST", "vacancy_template")
                    .entity_id(format!("{city}|{tipo_os}|{periodo}|{assunto}"))
                    .old_value(json!({"capacity": old_capacity}))
                    .new_value(json!({"capacity": new_capacity})),
            )
            .await;

        Ok(new_capacity)
    }
}
