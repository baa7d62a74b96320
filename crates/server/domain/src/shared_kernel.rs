// Shared kernel - base types and errors shared across the domain modules.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle states of a service order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created but not yet placed on the board.
    Aberta,
    /// Allocated to a capacity slot.
    Agendada,
    /// Technician is on site.
    EmAndamento,
    Concluida,
    Cancelada,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Aberta,
        OrderStatus::Agendada,
        OrderStatus::EmAndamento,
        OrderStatus::Concluida,
        OrderStatus::Cancelada,
    ];

    /// Canonical wire/database spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Aberta => "Aberta",
            OrderStatus::Agendada => "Agendada",
            OrderStatus::EmAndamento => "Em andamento",
            OrderStatus::Concluida => "Concluída",
            OrderStatus::Cancelada => "Cancelada",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    /// Whether an order in this state occupies a slot on the board. Open
    /// orders are still in the backlog and cancelled ones release their slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, OrderStatus::Aberta | OrderStatus::Cancelada)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Half-day scheduling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Manha,
    Tarde,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Manha, Period::Tarde];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Manha => "MANHÃ",
            Period::Tarde => "TARDE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MANHÃ" | "MANHA" => Some(Period::Manha),
            "TARDE" => Some(Period::Tarde),
            _ => None,
        }
    }

    /// Derives the period from a local timestamp: before noon is MANHÃ.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        if dt.hour() < 12 {
            Period::Manha
        } else {
            Period::Tarde
        }
    }

    /// Derives the period from the textual `data_hora` spellings the clients
    /// send (`YYYY-MM-DDTHH:MM[:SS]` or SQLite's `YYYY-MM-DD HH:MM[:SS]`).
    pub fn from_datetime_str(raw: &str) -> Option<Self> {
        parse_local_datetime(raw).map(|dt| Self::from_datetime(&dt))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses the timestamp spellings accepted on the wire.
pub fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
}

/// Extracts the `YYYY-MM-DD` day component of a wire timestamp.
pub fn day_of(raw: &str) -> Option<String> {
    parse_local_datetime(raw).map(|dt| dt.date().format("%Y-%m-%d").to_string())
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("service order not found: {id}")]
    OrderNotFound { id: i64 },

    #[error("user not found: {id}")]
    UserNotFound { id: i64 },

    #[error("{entity} not found: {name}")]
    EntityNotFound { entity: &'static str, name: String },

    #[error("username already exists: {username}")]
    UsernameTaken { username: String },

    #[error("invalid role: {role}")]
    InvalidRole { role: String },

    #[error("users cannot delete their own account")]
    SelfDeletion,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("permission denied: {permission}")]
    PermissionDenied { permission: String },

    #[error("no capacity left for {assunto} ({periodo}): limit {capacity}")]
    CapacityExceeded {
        assunto: String,
        periodo: String,
        capacity: i64,
    },

    #[error("invalid input: {}", details.join("; "))]
    Validation { details: Vec<String> },

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("{entity} already exists: {name}")]
    DuplicateEntity { entity: &'static str, name: String },

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn storage(message: impl Into<String>) -> Self {
        DomainError::Storage {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Validates that every named field carries a non-blank value, accumulating
/// the wire contract's `Campo 'x' é obrigatório` detail lines.
pub fn require_fields(fields: &[(&str, Option<&str>)]) -> Result<()> {
    let details: Vec<String> = fields
        .iter()
        .filter(|(_, v)| v.map(str::trim).unwrap_or("").is_empty())
        .map(|(name, _)| format!("Campo '{name}' é obrigatório"))
        .collect();
    if details.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation { details })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_canonical_spelling() {
        for st in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(st.as_str()), Some(st));
        }
        assert_eq!(OrderStatus::parse("aberta"), None);
    }

    #[test]
    fn open_and_cancelled_orders_do_not_occupy_slots() {
        assert!(!OrderStatus::Aberta.occupies_slot());
        assert!(!OrderStatus::Cancelada.occupies_slot());
        assert!(OrderStatus::Agendada.occupies_slot());
        assert!(OrderStatus::EmAndamento.occupies_slot());
        assert!(OrderStatus::Concluida.occupies_slot());
    }

    #[test]
    fn period_parse_accepts_unaccented_spelling() {
        assert_eq!(Period::parse("manha"), Some(Period::Manha));
        assert_eq!(Period::parse("MANHÃ"), Some(Period::Manha));
        assert_eq!(Period::parse("tarde"), Some(Period::Tarde));
        assert_eq!(Period::parse("NOITE"), None);
    }

    #[test]
    fn period_derivation_splits_at_noon() {
        assert_eq!(
            Period::from_datetime_str("2024-03-01T08:30"),
            Some(Period::Manha)
        );
        assert_eq!(
            Period::from_datetime_str("2024-03-01 12:00:00"),
            Some(Period::Tarde)
        );
        assert_eq!(Period::from_datetime_str("not-a-date"), None);
    }

    #[test]
    fn day_of_strips_the_time_component() {
        assert_eq!(day_of("2024-03-01T14:00"), Some("2024-03-01".to_string()));
        assert_eq!(day_of(""), None);
    }

    #[test]
    fn require_fields_collects_every_missing_field() {
        let err = require_fields(&[
            ("cliente", Some("  ")),
            ("cidade", Some("PARACATU")),
            ("assunto", None),
        ])
        .unwrap_err();
        match err {
            DomainError::Validation { details } => {
                assert_eq!(details.len(), 2);
                assert!(details[0].contains("cliente"));
                assert!(details[1].contains("assunto"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
