//! Service orders ("OS"): the scheduling unit of the field operation.

use crate::shared_kernel::{Period, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A service order row as stored and served. Field names follow the wire
/// contract used by the dashboard clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceOrder {
    pub id: i64,
    pub cliente: String,
    pub cidade: String,
    pub assunto: String,
    pub data_hora: Option<String>,
    pub periodo: Option<String>,
    pub tecnico: Option<String>,
    pub status: String,
    pub observacoes: Option<String>,
    pub tipo_os: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating an order. New orders always start in the backlog
/// (`Aberta`, no `data_hora`) until allocation places them on the board.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub cliente: String,
    pub cidade: String,
    pub assunto: String,
    pub observacoes: Option<String>,
    pub tipo_os: String,
}

/// Partial update. Only the whitelisted columns of the contract can change;
/// absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub cliente: Option<String>,
    pub cidade: Option<String>,
    pub assunto: Option<String>,
    pub data_hora: Option<String>,
    pub periodo: Option<String>,
    pub tecnico: Option<String>,
    pub status: Option<String>,
    pub observacoes: Option<String>,
    pub tipo_os: Option<String>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.cliente.is_none()
            && self.cidade.is_none()
            && self.assunto.is_none()
            && self.data_hora.is_none()
            && self.periodo.is_none()
            && self.tecnico.is_none()
            && self.status.is_none()
            && self.observacoes.is_none()
            && self.tipo_os.is_none()
    }
}

/// Filters of the plain list endpoint.
#[derive(Debug, Clone, Default)]
pub struct OrderListFilter {
    pub cidade: Option<String>,
    /// `YYYY-MM-DD`, matched against `DATE(data_hora)`.
    pub data: Option<String>,
    pub status: Option<String>,
    /// Substring match on the customer name.
    pub cliente: Option<String>,
}

/// Sortable columns of the search endpoint. The whitelist keeps client
/// input out of the ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSortKey {
    Id,
    DataHora,
    CreatedAt,
    UpdatedAt,
    Cliente,
    Cidade,
    Status,
    Tecnico,
    Assunto,
    TipoOs,
}

impl OrderSortKey {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "id" => Self::Id,
            "data_hora" => Self::DataHora,
            "created_at" => Self::CreatedAt,
            "updated_at" => Self::UpdatedAt,
            "cliente" => Self::Cliente,
            "cidade" => Self::Cidade,
            "status" => Self::Status,
            "tecnico" => Self::Tecnico,
            "assunto" => Self::Assunto,
            "tipo_os" => Self::TipoOs,
            _ => return None,
        })
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::DataHora => "data_hora",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Cliente => "cliente",
            Self::Cidade => "cidade",
            Self::Status => "status",
            Self::Tecnico => "tecnico",
            Self::Assunto => "assunto",
            Self::TipoOs => "tipo_os",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            SortDir::Asc
        } else {
            SortDir::Desc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

pub const SEARCH_PAGE_SIZE_DEFAULT: i64 = 20;
pub const SEARCH_PAGE_SIZE_MAX: i64 = 200;

/// Normalized query of the paginated search endpoint.
#[derive(Debug, Clone)]
pub struct OrderSearch {
    pub cidade: Option<String>,
    pub tecnico: Option<String>,
    /// Comma-split status list; one entry becomes `=`, several become `IN`.
    pub status: Vec<String>,
    pub cliente: Option<String>,
    pub assunto: Option<String>,
    pub tipo_os: Option<String>,
    /// Exact day; when present the range bounds are ignored.
    pub data: Option<String>,
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub periodo: Option<Period>,
    pub sort_by: OrderSortKey,
    pub sort_dir: SortDir,
    pub page: i64,
    pub page_size: i64,
}

impl Default for OrderSearch {
    fn default() -> Self {
        Self {
            cidade: None,
            tecnico: None,
            status: Vec::new(),
            cliente: None,
            assunto: None,
            tipo_os: None,
            data: None,
            data_inicio: None,
            data_fim: None,
            periodo: None,
            sort_by: OrderSortKey::DataHora,
            sort_dir: SortDir::Desc,
            page: 1,
            page_size: SEARCH_PAGE_SIZE_DEFAULT,
        }
    }
}

impl OrderSearch {
    /// Clamps pagination into the contract's bounds.
    pub fn normalize(mut self) -> Self {
        self.page = self.page.max(1);
        self.page_size = self.page_size.clamp(1, SEARCH_PAGE_SIZE_MAX);
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// One page of search results plus the grand total for the filter.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub rows: Vec<ServiceOrder>,
    pub total: i64,
}

impl OrderPage {
    pub fn total_pages(&self, page_size: i64) -> i64 {
        ((self.total + page_size - 1) / page_size).max(1)
    }
}

/// Identifies the capacity cell an allocation competes for: orders of the
/// same city, OS type, subject, day and period share one pool of slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyQuery {
    pub cidade: String,
    pub tipo_os: String,
    /// Any wire timestamp within the target day.
    pub data_hora: String,
    pub assunto: String,
    pub periodo: String,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<ServiceOrder>>;
    async fn list(&self, filter: &OrderListFilter) -> Result<Vec<ServiceOrder>>;
    async fn search(&self, search: &OrderSearch) -> Result<OrderPage>;
    /// Backlog orders (`Aberta`), newest first.
    async fn unallocated(&self) -> Result<Vec<ServiceOrder>>;
    /// Orders shown on a day board: everything but the backlog for one
    /// city/OS-type/day, ordered by schedule.
    async fn board_orders(
        &self,
        cidade: &str,
        tipo_os: &str,
        day: &str,
    ) -> Result<Vec<ServiceOrder>>;
    async fn insert(&self, order: &NewOrder) -> Result<i64>;
    /// Returns the number of updated rows (0 when the id is unknown).
    async fn update(&self, id: i64, patch: &OrderPatch) -> Result<u64>;
    async fn delete(&self, id: i64) -> Result<u64>;
    /// Orders already occupying the cell (excludes `Aberta`/`Cancelada`).
    async fn count_occupied(&self, cell: &OccupancyQuery) -> Result<i64>;
    /// Moves the order onto the board: sets schedule, period, subject and
    /// flips the status to `Agendada`.
    async fn allocate(
        &self,
        id: i64,
        data_hora: &str,
        periodo: &str,
        assunto: &str,
    ) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_whitelist_rejects_unknown_columns() {
        assert_eq!(OrderSortKey::parse("cliente"), Some(OrderSortKey::Cliente));
        assert_eq!(OrderSortKey::parse("password"), None);
        assert_eq!(OrderSortKey::parse("id; DROP TABLE agendamentos"), None);
    }

    #[test]
    fn search_normalization_clamps_pagination() {
        let s = OrderSearch {
            page: 0,
            page_size: 10_000,
            ..OrderSearch::default()
        }
        .normalize();
        assert_eq!(s.page, 1);
        assert_eq!(s.page_size, SEARCH_PAGE_SIZE_MAX);
        assert_eq!(s.offset(), 0);

        let s = OrderSearch {
            page: 3,
            page_size: 20,
            ..OrderSearch::default()
        }
        .normalize();
        assert_eq!(s.offset(), 40);
    }

    #[test]
    fn total_pages_rounds_up_and_never_hits_zero() {
        let page = OrderPage {
            rows: vec![],
            total: 0,
        };
        assert_eq!(page.total_pages(20), 1);
        let page = OrderPage {
            rows: vec![],
            total: 41,
        };
        assert_eq!(page.total_pages(20), 3);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(OrderPatch::default().is_empty());
        let patch = OrderPatch {
            tecnico: Some("Maria Souza".to_string()),
            ..OrderPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
