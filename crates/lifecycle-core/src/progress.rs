//! Completion statistics for one tracked entity
//!
//! Progress is derived on every read from a single aggregate query and is
//! never stored. Only active phases and active items take part.

use rusqlite::params;
use serde::Serialize;

use crate::error::Result;
use crate::store::LifecycleStore;
use crate::tenant::{TenantId, Tables};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseProgress {
    pub phase_id: i64,
    pub phase_name: String,
    pub total_items: i64,
    pub filled_items: i64,
    pub required_items: i64,
    pub filled_required_items: i64,
    pub completion_percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub tracked_entity_id: i64,
    pub total_items: i64,
    pub filled_items: i64,
    pub required_items: i64,
    pub filled_required_items: i64,
    pub completion_percentage: i64,
    pub phases: Vec<PhaseProgress>,
}

/// `round(filled / total * 100)`, or 0 for an empty total
pub fn completion_percentage(filled: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (filled as f64 / total as f64 * 100.0).round() as i64
}

impl LifecycleStore {
    pub fn get_progress(&self, tenant: &TenantId, tracked_entity_id: i64) -> Result<Progress> {
        let t = Tables::for_tenant(tenant);
        // An item counts as filled when either typed column holds something or
        // at least one file hangs off its value row.
        let filled = format!(
            "(v.value_text IS NOT NULL OR v.value_json IS NOT NULL
              OR EXISTS (SELECT 1 FROM {files} f WHERE f.value_id = v.id))",
            files = t.files
        );
        let sql = format!(
            "SELECT p.id, p.name,
                    COUNT(i.id),
                    COALESCE(SUM(CASE WHEN i.id IS NOT NULL AND {filled} THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN i.is_required = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN i.is_required = 1 AND {filled} THEN 1 ELSE 0 END), 0)
             FROM {phases} p
             LEFT JOIN {items} i ON i.phase_id = p.id AND i.is_active = 1
             LEFT JOIN {values} v ON v.item_id = i.id AND v.tracked_entity_id = ?1
             WHERE p.is_active = 1
             GROUP BY p.id, p.name, p.display_order
             ORDER BY p.display_order, p.id",
            filled = filled,
            phases = t.phases,
            items = t.items,
            values = t.values,
        );

        let phases = self.with_conn(tenant, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![tracked_entity_id], |row| {
                    let total_items: i64 = row.get(2)?;
                    let filled_items: i64 = row.get(3)?;
                    Ok(PhaseProgress {
                        phase_id: row.get(0)?,
                        phase_name: row.get(1)?,
                        total_items,
                        filled_items,
                        required_items: row.get(4)?,
                        filled_required_items: row.get(5)?,
                        completion_percentage: completion_percentage(filled_items, total_items),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let total_items = phases.iter().map(|p| p.total_items).sum();
        let filled_items = phases.iter().map(|p| p.filled_items).sum();
        Ok(Progress {
            tracked_entity_id,
            total_items,
            filled_items,
            required_items: phases.iter().map(|p| p.required_items).sum(),
            filled_required_items: phases.iter().map(|p| p.filled_required_items).sum(),
            completion_percentage: completion_percentage(filled_items, total_items),
            phases,
        })
    }
}
