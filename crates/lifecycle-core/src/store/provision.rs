//! Tenant install / uninstall

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{now, LifecycleStore};
use crate::error::{LifecycleError, Result};
use crate::item_type::ItemConfig;
use crate::schema::Schema;
use crate::seed::default_catalogue;
use crate::tenant::{Table, TenantId, Tables};

/// Outcome of an install call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallReport {
    pub tenant: TenantId,
    /// Whether the default catalogue was written by this call
    pub seeded: bool,
    pub phases: usize,
    pub items: usize,
}

impl LifecycleStore {
    /// Create the tenant's tables and seed the default catalogue.
    ///
    /// Safe to repeat: tables are created with `IF NOT EXISTS` and the seed is
    /// only written while the tenant has no phases at all, so a reinstall never
    /// clobbers an administrator's catalogue. Runs as a single transaction.
    pub fn install(&self, tenant: &TenantId) -> Result<InstallReport> {
        let conn = self.lock()?;
        let report = install_in(&conn, tenant).map_err(|e| {
            tracing::warn!(tenant = %tenant, error = %e, "lifecycle install failed");
            LifecycleError::Install(e.to_string())
        })?;

        tracing::info!(
            tenant = %tenant,
            seeded = report.seeded,
            phases = report.phases,
            items = report.items,
            "lifecycle tables installed"
        );
        Ok(report)
    }

    /// Drop the tenant's tables, dependents first. Safe to repeat.
    pub fn uninstall(&self, tenant: &TenantId) -> Result<()> {
        let conn = self.lock()?;
        let result = (|| -> Result<()> {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(&Schema::drop_tables(tenant))?;
            tx.commit()?;
            Ok(())
        })();

        result.map_err(|e| {
            tracing::warn!(tenant = %tenant, error = %e, "lifecycle uninstall failed");
            LifecycleError::Uninstall(e.to_string())
        })?;
        tracing::info!(tenant = %tenant, "lifecycle tables dropped");
        Ok(())
    }

    /// Whether the tenant's phase table exists.
    pub fn is_installed(&self, tenant: &TenantId) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![tenant.raw_table(Table::Phases)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn install_in(conn: &Connection, tenant: &TenantId) -> Result<InstallReport> {
    let t = Tables::for_tenant(tenant);
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(&Schema::create_tables(tenant))?;

    let existing: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM {}", t.phases), [], |row| {
        row.get(0)
    })?;

    let mut report = InstallReport {
        tenant: tenant.clone(),
        seeded: false,
        phases: 0,
        items: 0,
    };

    if existing == 0 {
        let stamp = now();
        for (phase_pos, phase) in default_catalogue().into_iter().enumerate() {
            tx.execute(
                &format!(
                    "INSERT INTO {} (name, description, display_order, is_active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                    t.phases
                ),
                params![phase.name, phase.description, phase_pos as i64 + 1, stamp],
            )?;
            let phase_id = tx.last_insert_rowid();
            report.phases += 1;

            for (item_pos, item) in phase.items.into_iter().enumerate() {
                let config = ItemConfig::parse(item.item_type, Some(&item.config))?;
                tx.execute(
                    &format!(
                        "INSERT INTO {} (phase_id, name, description, item_type, is_required, display_order, config, is_active, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
                        t.items
                    ),
                    params![
                        phase_id,
                        item.name,
                        item.description,
                        item.item_type.as_str(),
                        item.is_required,
                        item_pos as i64 + 1,
                        config.to_json().to_string(),
                        stamp,
                    ],
                )?;
                report.items += 1;
            }
        }
        report.seeded = true;
    }

    tx.commit()?;
    Ok(report)
}
