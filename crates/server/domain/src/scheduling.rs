//! Vacancy scheduling: capacity templates, closed slots and the day boards
//! the dispatch dashboard renders.

use crate::orders::ServiceOrder;
use crate::shared_kernel::{parse_local_datetime, Period, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

/// Addresses one capacity cell by catalog names, the way the wire contract
/// does. The infrastructure resolves names to catalog ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityCell {
    pub cidade: String,
    pub tipo_os: String,
    pub periodo: String,
    pub assunto: String,
}

/// Resolved catalog ids backing a [`CapacityCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellIds {
    pub city_id: i64,
    pub os_type_id: i64,
    pub period_id: i64,
    pub subject_id: i64,
}

/// Template row scoped to one city and OS type.
#[derive(Debug, Clone)]
pub struct TemplateRow {
    pub periodo: String,
    pub assunto: String,
    pub capacity: i64,
}

/// Template row scoped to one city, across OS types (legacy feed).
#[derive(Debug, Clone)]
pub struct CityTemplateRow {
    pub tipo: String,
    pub periodo: String,
    pub assunto: String,
    pub capacity: i64,
}

/// Capacity per subject, as returned by the template editor endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectCapacity {
    pub assunto: String,
    pub capacity: i64,
}

/// One closed slot index within a day/cell.
#[derive(Debug, Clone)]
pub struct ClosedSlotRow {
    pub periodo: String,
    pub assunto: String,
    pub slot_index: i64,
}

/// Entry of a day board cell.
#[derive(Debug, Clone, Serialize)]
pub struct BoardEntry {
    pub id: i64,
    pub cliente: String,
    pub assunto: String,
    pub data_hora: Option<String>,
    pub tecnico: Option<String>,
    pub status: String,
    pub observacoes: Option<String>,
    pub tipo_os: Option<String>,
}

impl From<&ServiceOrder> for BoardEntry {
    fn from(order: &ServiceOrder) -> Self {
        Self {
            id: order.id,
            cliente: order.cliente.clone(),
            assunto: order.assunto.clone(),
            data_hora: order.data_hora.clone(),
            tecnico: order.tecnico.clone(),
            status: order.status.clone(),
            observacoes: order.observacoes.clone(),
            tipo_os: order.tipo_os.clone(),
        }
    }
}

pub type PeriodMap<T> = BTreeMap<String, BTreeMap<String, T>>;

/// The assembled board for one city/OS-type/day: capacities, the orders
/// occupying each cell, and the slot indexes closed for the day.
#[derive(Debug, Clone, Serialize)]
pub struct DayBoard {
    pub template: PeriodMap<i64>,
    pub agendamentos: PeriodMap<Vec<BoardEntry>>,
    #[serde(rename = "vagasFechadas")]
    pub vagas_fechadas: PeriodMap<Vec<i64>>,
}

impl DayBoard {
    /// Groups orders and closed slots under the period/subject cells the
    /// template declares. Orders land in the period derived from their
    /// timestamp (stored `periodo` wins when present); orders whose subject
    /// has no template cell are not shown, matching the dashboard contract.
    pub fn assemble(
        template_rows: &[TemplateRow],
        orders: &[ServiceOrder],
        closed: &[ClosedSlotRow],
    ) -> Self {
        let mut template: PeriodMap<i64> = BTreeMap::new();
        let mut agendamentos: PeriodMap<Vec<BoardEntry>> = BTreeMap::new();
        let mut vagas_fechadas: PeriodMap<Vec<i64>> = BTreeMap::new();

        // Both canonical periods always render, even with an empty template.
        for period in Period::ALL {
            template.entry(period.as_str().to_string()).or_default();
            agendamentos.entry(period.as_str().to_string()).or_default();
            vagas_fechadas.entry(period.as_str().to_string()).or_default();
        }

        for row in template_rows {
            template
                .entry(row.periodo.clone())
                .or_default()
                .insert(row.assunto.clone(), row.capacity);
            agendamentos
                .entry(row.periodo.clone())
                .or_default()
                .entry(row.assunto.clone())
                .or_default();
            vagas_fechadas
                .entry(row.periodo.clone())
                .or_default()
                .entry(row.assunto.clone())
                .or_default();
        }

        for order in orders {
            let periodo = order
                .periodo
                .as_deref()
                .and_then(Period::parse)
                .or_else(|| {
                    order
                        .data_hora
                        .as_deref()
                        .and_then(Period::from_datetime_str)
                })
                .unwrap_or(Period::Manha);
            if let Some(subjects) = agendamentos.get_mut(periodo.as_str()) {
                if let Some(bucket) = subjects.get_mut(&order.assunto) {
                    bucket.push(BoardEntry::from(order));
                }
            }
        }

        // Board cells keep arrival order by schedule; callers pass orders
        // already sorted by data_hora.
        for slot in closed {
            if let Some(subjects) = vagas_fechadas.get_mut(&slot.periodo) {
                if let Some(indexes) = subjects.get_mut(&slot.assunto) {
                    indexes.push(slot.slot_index);
                }
            }
        }

        Self {
            template,
            agendamentos,
            vagas_fechadas,
        }
    }
}

/// Nested `tipo → periodo → assunto → capacity` map of the legacy city feed.
pub fn city_template_map(rows: &[CityTemplateRow]) -> BTreeMap<String, PeriodMap<i64>> {
    let mut out: BTreeMap<String, PeriodMap<i64>> = BTreeMap::new();
    for row in rows {
        out.entry(row.tipo.clone())
            .or_default()
            .entry(row.periodo.clone())
            .or_default()
            .insert(row.assunto.clone(), row.capacity);
    }
    out
}

/// `periodo → assunto → [slot indexes]` map of the closed-slot query.
pub fn closed_slot_map(rows: &[ClosedSlotRow]) -> PeriodMap<Vec<i64>> {
    let mut out: PeriodMap<Vec<i64>> = BTreeMap::new();
    for period in Period::ALL {
        out.entry(period.as_str().to_string()).or_default();
    }
    for row in rows {
        out.entry(row.periodo.clone())
            .or_default()
            .entry(row.assunto.clone())
            .or_default()
            .push(row.slot_index);
    }
    out
}

/// Sorts board orders the way the queries do: by schedule, then id.
pub fn sort_by_schedule(orders: &mut [ServiceOrder]) {
    orders.sort_by(|a, b| {
        let ka = a.data_hora.as_deref().and_then(parse_local_datetime);
        let kb = b.data_hora.as_deref().and_then(parse_local_datetime);
        ka.cmp(&kb).then(a.id.cmp(&b.id))
    });
}

#[async_trait]
pub trait VacancyRepository: Send + Sync {
    /// Configured capacity of one cell; absent cells have capacity 0.
    async fn capacity_for(&self, cell: &CapacityCell) -> Result<i64>;
    /// Name-to-id lookups used by the template editor to report which part
    /// of a cell address is unknown.
    async fn find_city_id(&self, name: &str, active_only: bool) -> Result<Option<i64>>;
    async fn find_os_type_id(&self, code: &str, active_only: bool) -> Result<Option<i64>>;
    async fn find_period_id(&self, code: &str) -> Result<Option<i64>>;
    async fn find_subject_id(&self, name: &str, active_only: bool) -> Result<Option<i64>>;
    /// Resolves the cell's catalog ids, `None` when any name is unknown.
    async fn resolve_cell(&self, cell: &CapacityCell) -> Result<Option<CellIds>>;
    /// `[{assunto, capacity}]` for an active city/type/period cell.
    async fn subject_capacities(
        &self,
        city: &str,
        tipo_os: &str,
        periodo: &str,
    ) -> Result<Vec<SubjectCapacity>>;
    /// Template rows for one city across OS types (active subjects only).
    async fn city_template(&self, city: &str) -> Result<Vec<CityTemplateRow>>;
    /// Template rows for one city/OS-type (active subjects only).
    async fn city_type_template(&self, city: &str, tipo_os: &str) -> Result<Vec<TemplateRow>>;
    /// Upserts one cell capacity.
    async fn upsert_capacity(&self, ids: &CellIds, capacity: i64) -> Result<()>;
    /// Current capacities keyed by subject for an id-resolved cell scope.
    async fn capacities_by_subject(
        &self,
        city_id: i64,
        os_type_id: i64,
        period_id: i64,
    ) -> Result<Vec<SubjectCapacity>>;
    /// Closed slots for a city/type/day, across periods and subjects.
    async fn closed_slots_for_day(
        &self,
        city: &str,
        tipo_os: &str,
        day: &str,
    ) -> Result<Vec<ClosedSlotRow>>;
    /// Number of closed slots in one cell for a day.
    async fn count_closed(&self, cell: &CapacityCell, day: &str) -> Result<i64>;
    /// Marks a slot index closed. Idempotent; returns false when the slot
    /// was already closed.
    async fn close_slot(
        &self,
        ids: &CellIds,
        day: &str,
        slot_index: i64,
        closed_by_user_id: i64,
    ) -> Result<bool>;
    /// Reopens a slot index; returns the number of removed rows.
    async fn open_slot(&self, ids: &CellIds, day: &str, slot_index: i64) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: i64, assunto: &str, data_hora: &str, status: &str) -> ServiceOrder {
        ServiceOrder {
            id,
            cliente: format!("cliente-{id}"),
            cidade: "PATOS DE MINAS".to_string(),
            assunto: assunto.to_string(),
            data_hora: Some(data_hora.to_string()),
            periodo: None,
            tecnico: Some("João Silva".to_string()),
            status: status.to_string(),
            observacoes: None,
            tipo_os: Some("FIBRA".to_string()),
            created_at: "2024-03-01 08:00:00".to_string(),
            updated_at: "2024-03-01 08:00:00".to_string(),
        }
    }

    fn template() -> Vec<TemplateRow> {
        vec![
            TemplateRow {
                periodo: "MANHÃ".into(),
                assunto: "SEM CONEXÃO".into(),
                capacity: 2,
            },
            TemplateRow {
                periodo: "TARDE".into(),
                assunto: "SEM CONEXÃO".into(),
                capacity: 2,
            },
            TemplateRow {
                periodo: "MANHÃ".into(),
                assunto: "AGENDAMENTO".into(),
                capacity: 1,
            },
        ]
    }

    #[test]
    fn board_groups_orders_by_derived_period_and_subject() {
        let orders = vec![
            order(1, "SEM CONEXÃO", "2024-03-01T08:00", "Agendada"),
            order(2, "SEM CONEXÃO", "2024-03-01T14:00", "Agendada"),
            order(3, "AGENDAMENTO", "2024-03-01T09:00", "Agendada"),
        ];
        let board = DayBoard::assemble(&template(), &orders, &[]);

        assert_eq!(board.agendamentos["MANHÃ"]["SEM CONEXÃO"].len(), 1);
        assert_eq!(board.agendamentos["TARDE"]["SEM CONEXÃO"].len(), 1);
        assert_eq!(board.agendamentos["MANHÃ"]["AGENDAMENTO"][0].id, 3);
        assert_eq!(board.template["MANHÃ"]["SEM CONEXÃO"], 2);
    }

    #[test]
    fn stored_period_wins_over_timestamp_derivation() {
        let mut o = order(7, "SEM CONEXÃO", "2024-03-01T08:00", "Agendada");
        o.periodo = Some("TARDE".to_string());
        let board = DayBoard::assemble(&template(), &[o], &[]);
        assert!(board.agendamentos["MANHÃ"]["SEM CONEXÃO"].is_empty());
        assert_eq!(board.agendamentos["TARDE"]["SEM CONEXÃO"].len(), 1);
    }

    #[test]
    fn orders_outside_the_template_are_not_shown() {
        let orders = vec![order(9, "MANUTENÇÃO", "2024-03-01T08:00", "Agendada")];
        let board = DayBoard::assemble(&template(), &orders, &[]);
        assert!(!board.agendamentos["MANHÃ"].contains_key("MANUTENÇÃO"));
    }

    #[test]
    fn closed_slots_land_in_their_cells() {
        let closed = vec![
            ClosedSlotRow {
                periodo: "MANHÃ".into(),
                assunto: "SEM CONEXÃO".into(),
                slot_index: 0,
            },
            ClosedSlotRow {
                periodo: "MANHÃ".into(),
                assunto: "SEM CONEXÃO".into(),
                slot_index: 1,
            },
        ];
        let board = DayBoard::assemble(&template(), &[], &closed);
        assert_eq!(board.vagas_fechadas["MANHÃ"]["SEM CONEXÃO"], vec![0, 1]);
        assert!(board.vagas_fechadas["TARDE"]["SEM CONEXÃO"].is_empty());
    }

    #[test]
    fn both_periods_render_even_without_template_rows() {
        let board = DayBoard::assemble(&[], &[], &[]);
        assert!(board.template.contains_key("MANHÃ"));
        assert!(board.template.contains_key("TARDE"));

        let map = closed_slot_map(&[]);
        assert!(map.contains_key("MANHÃ") && map.contains_key("TARDE"));
    }

    #[test]
    fn city_template_map_nests_type_period_subject() {
        let rows = vec![
            CityTemplateRow {
                tipo: "FIBRA".into(),
                periodo: "MANHÃ".into(),
                assunto: "SEM CONEXÃO".into(),
                capacity: 5,
            },
            CityTemplateRow {
                tipo: "RADIO".into(),
                periodo: "TARDE".into(),
                assunto: "AGENDAMENTO".into(),
                capacity: 2,
            },
        ];
        let map = city_template_map(&rows);
        assert_eq!(map["FIBRA"]["MANHÃ"]["SEM CONEXÃO"], 5);
        assert_eq!(map["RADIO"]["TARDE"]["AGENDAMENTO"], 2);
    }

    #[test]
    fn schedule_sort_orders_by_timestamp_then_id() {
        let mut orders = vec![
            order(2, "SEM CONEXÃO", "2024-03-01T14:00", "Agendada"),
            order(1, "SEM CONEXÃO", "2024-03-01T08:00", "Agendada"),
            order(3, "SEM CONEXÃO", "2024-03-01T08:00", "Agendada"),
        ];
        sort_by_schedule(&mut orders);
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }
}
