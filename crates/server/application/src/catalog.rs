//! Catalog administration: city/technician rosters and subjects.

use crate::audit::AuditService;
use crate::context::RequestContext;
use campo_server_domain::audit::AuditRecord;
use campo_server_domain::catalog::{CatalogRepository, Roster, RosterEntry, Subject};
use campo_server_domain::shared_kernel::{require_fields, DomainError, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Whether a roster create hit a fresh name or revived an inactive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterCreateOutcome {
    Created(i64),
    Reactivated(i64),
}

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
    audit: AuditService,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, audit: AuditService) -> Self {
        Self { catalog, audit }
    }

    pub async fn list_roster(&self, roster: Roster) -> Result<Vec<RosterEntry>> {
        self.catalog.list_roster(roster).await
    }

    /// Creates a roster entry; an inactive entry with the same name (case
    /// insensitive) is reactivated instead, and an active one conflicts.
    pub async fn create_roster_entry(
        &self,
        ctx: &RequestContext,
        roster: Roster,
        name: Option<&str>,
    ) -> Result<RosterCreateOutcome> {
        require_fields(&[("name", name)])?;
        let clean = name.unwrap_or_default().trim().to_string();

        if let Some(existing) = self.catalog.find_roster_by_name(roster, &clean).await? {
            if existing.is_active == 0 {
                self.catalog
                    .set_roster_active(roster, existing.id, true)
                    .await?;
                info!(user = %ctx.user.username, roster = roster.table(), name = %clean, "roster entry reactivated");
                self.audit
                    .record(
                        ctx,
                        AuditRecord::new(
                            format!("{}_REACTIVATE", roster.action_prefix()),
                            roster.entity(),
                        )
                        .entity_id(existing.id)
                        .old_value(snapshot(&existing))
                        .new_value(json!({
                            "id": existing.id,
                            "name": existing.name,
                            "is_active": 1,
                        })),
                    )
                    .await;
                return Ok(RosterCreateOutcome::Reactivated(existing.id));
            }
            return Err(DomainError::DuplicateEntity {
                entity: roster.entity(),
                name: clean,
            });
        }

        let id = self.catalog.insert_roster_entry(roster, &clean).await?;
        info!(user = %ctx.user.username, roster = roster.table(), name = %clean, "roster entry created");
        self.audit
            .record(
                ctx,
                AuditRecord::new(
                    format!("{}_CREATE", roster.action_prefix()),
                    roster.entity(),
                )
                .entity_id(id)
                .new_value(json!({"id": id, "name": clean, "is_active": 1})),
            )
            .await;
        Ok(RosterCreateOutcome::Created(id))
    }

    /// Soft delete: the entry goes inactive and disappears from pickers but
    /// historical orders keep referencing its name.
    pub async fn deactivate_roster_entry(
        &self,
        ctx: &RequestContext,
        roster: Roster,
        id: i64,
    ) -> Result<()> {
        let existing = self
            .catalog
            .find_roster_entry(roster, id)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: roster.entity(),
                name: id.to_string(),
            })?;

        self.catalog.set_roster_active(roster, id, false).await?;
        info!(user = %ctx.user.username, roster = roster.table(), id, "roster entry deactivated");
        self.audit
            .record(
                ctx,
                AuditRecord::new(
                    format!("{}_DEACTIVATE", roster.action_prefix()),
                    roster.entity(),
                )
                .entity_id(id)
                .old_value(snapshot(&existing))
                .new_value(json!({
                    "id": existing.id,
                    "name": existing.name,
                    "is_active": 0,
                })),
            )
            .await;
        Ok(())
    }

    /// Flips the active flag; returns the new state.
    pub async fn toggle_roster_entry(
        &self,
        ctx: &RequestContext,
        roster: Roster,
        id: i64,
    ) -> Result<bool> {
        let existing = self
            .catalog
            .find_roster_entry(roster, id)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: roster.entity(),
                name: id.to_string(),
            })?;

        let next = existing.is_active == 0;
        self.catalog.set_roster_active(roster, id, next).await?;
        let action = if next { "REACTIVATE" } else { "DEACTIVATE" };
        self.audit
            .record(
                ctx,
                AuditRecord::new(
                    format!("{}_{action}", roster.action_prefix()),
                    roster.entity(),
                )
                .entity_id(id)
                .old_value(snapshot(&existing))
                .new_value(json!({
                    "id": existing.id,
                    "name": existing.name,
                    "is_active": next as i64,
                })),
            )
            .await;
        Ok(next)
    }

    pub async fn list_subjects(&self, include_inactive: bool) -> Result<Vec<Subject>> {
        self.catalog.list_subjects(include_inactive).await
    }

    /// Create-or-reactivate by name.
    pub async fn upsert_subject(&self, ctx: &RequestContext, name: Option<&str>) -> Result<Subject> {
        require_fields(&[("name", name)])?;
        let clean = name.unwrap_or_default().trim().to_string();

        let old = self.catalog.find_subject_by_name(&clean).await?;
        let subject = self.catalog.upsert_subject(&clean).await?;

        info!(user = %ctx.user.username, name = %clean, "subject upserted");
        let mut record = AuditRecord::new("UPSERT_SUBJECT", "subject")
            .entity_id(subject.id)
            .new_value(json!({
                "id": subject.id,
                "name": subject.name,
                "is_active": subject.is_active,
            }));
        if let Some(old) = old {
            record = record.old_value(json!({
                "id": old.id,
                "name": old.name,
                "is_active": old.is_active,
            }));
        }
        self.audit.record(ctx, record).await;

        Ok(subject)
    }

    pub async fn rename_subject(
        &self,
        ctx: &RequestContext,
        id: i64,
        name: Option<&str>,
    ) -> Result<()> {
        require_fields(&[("name", name)])?;
        let clean = name.unwrap_or_default().trim().to_string();

        let old = self
            .catalog
            .find_subject(id)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "subject",
                name: id.to_string(),
            })?;
        let changes = self.catalog.rename_subject(id, &clean).await?;
        if changes == 0 {
            return Err(DomainError::EntityNotFound {
                entity: "subject",
                name: id.to_string(),
            });
        }

        info!(user = %ctx.user.username, id, from = %old.name, to = %clean, "subject renamed");
        self.audit
            .record(
                ctx,
                AuditRecord::new("RENAME_SUBJECT", "subject")
                    .entity_id(id)
                    .old_value(json!({"id": old.id, "name": old.name, "is_active": old.is_active}))
                    .new_value(json!({"id": id, "name": clean, "is_active": old.is_active})),
            )
            .await;
        Ok(())
    }

    pub async fn set_subject_active(
        &self,
        ctx: &RequestContext,
        id: i64,
        active: bool,
    ) -> Result<()> {
        let old = self
            .catalog
            .find_subject(id)
            .await?
            .ok_or(DomainError::EntityNotFound {
                entity: "subject",
                name: id.to_string(),
            })?;
        let changes = self.catalog.set_subject_active(id, active).await?;
        if changes == 0 {
            return Err(DomainError::EntityNotFound {
                entity: "subject",
                name: id.to_string(),
            });
        }

        let action = if active {
            "ACTIVATE_SUBJECT"
        } else {
            "DEACTIVATE_SUBJECT"
        };
        self.audit
            .record(
                ctx,
                AuditRecord::new(action, "subject")
                    .entity_id(id)
                    .old_value(json!({"id": old.id, "name": old.name, "is_active": old.is_active}))
                    .new_value(json!({"id": id, "name": old.name, "is_active": active as i64})),
            )
            .await;
        Ok(())
    }
}

fn snapshot(entry: &RosterEntry) -> serde_json::Value {
    json!({
        "id": entry.id,
        "name": entry.name,
        "is_active": entry.is_active,
    })
}
