//! Catalog entities: cities, technicians, subjects and OS types.
//!
//! Cities and technicians share identical soft-activation semantics, so the
//! port addresses them through [`Roster`] instead of two parallel APIs.

use crate::shared_kernel::Result;
use async_trait::async_trait;
use serde::Serialize;

/// The two name rosters with create/deactivate/toggle semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Roster {
    Cities,
    Technicians,
}

impl Roster {
    pub fn table(&self) -> &'static str {
        match self {
            Roster::Cities => "cities",
            Roster::Technicians => "technicians",
        }
    }

    /// Entity label used in audit records.
    pub fn entity(&self) -> &'static str {
        match self {
            Roster::Cities => "city",
            Roster::Technicians => "technician",
        }
    }

    /// Prefix of audit actions (`CITY_CREATE`, `TECHNICIAN_DEACTIVATE`, ...).
    pub fn action_prefix(&self) -> &'static str {
        match self {
            Roster::Cities => "CITY",
            Roster::Technicians => "TECHNICIAN",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RosterEntry {
    pub id: i64,
    pub name: String,
    pub is_active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub is_active: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OsType {
    pub id: i64,
    pub code: String,
    pub is_active: i64,
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Roster listing, active entries first, then by name.
    async fn list_roster(&self, roster: Roster) -> Result<Vec<RosterEntry>>;
    async fn find_roster_entry(&self, roster: Roster, id: i64) -> Result<Option<RosterEntry>>;
    /// Case-insensitive lookup used to catch duplicates before insert.
    async fn find_roster_by_name(&self, roster: Roster, name: &str)
        -> Result<Option<RosterEntry>>;
    async fn insert_roster_entry(&self, roster: Roster, name: &str) -> Result<i64>;
    async fn set_roster_active(&self, roster: Roster, id: i64, active: bool) -> Result<u64>;

    async fn list_subjects(&self, include_inactive: bool) -> Result<Vec<Subject>>;
    async fn find_subject(&self, id: i64) -> Result<Option<Subject>>;
    async fn find_subject_by_name(&self, name: &str) -> Result<Option<Subject>>;
    /// Insert-or-reactivate by name; returns the resulting row.
    async fn upsert_subject(&self, name: &str) -> Result<Subject>;
    async fn rename_subject(&self, id: i64, name: &str) -> Result<u64>;
    async fn set_subject_active(&self, id: i64, active: bool) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_metadata_is_consistent() {
        assert_eq!(Roster::Cities.table(), "cities");
        assert_eq!(Roster::Cities.action_prefix(), "CITY");
        assert_eq!(Roster::Technicians.table(), "technicians");
        assert_eq!(Roster::Technicians.entity(), "technician");
    }
}
