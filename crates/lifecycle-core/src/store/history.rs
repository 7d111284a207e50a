//! Append-only change history

use rusqlite::{params, Connection};

use super::{now, parse_json_column, LifecycleStore};
use crate::error::Result;
use crate::model::{ChangeHistoryEntry, ChangeType};
use crate::tenant::{TenantId, Tables};

/// Default number of entries returned by [`LifecycleStore::list_history`]
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Upper bound on a single history page
pub const MAX_HISTORY_LIMIT: usize = 1000;

impl LifecycleStore {
    /// Most recent changes for a tracked entity, newest first.
    pub fn list_history(
        &self,
        tenant: &TenantId,
        tracked_entity_id: i64,
        limit: usize,
    ) -> Result<Vec<ChangeHistoryEntry>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT) as i64;
        self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let mut stmt = conn.prepare(&format!(
                "SELECT id, tracked_entity_id, item_id, change_type, changed_by, old_value, new_value, created_at
                 FROM {} WHERE tracked_entity_id = ?1 ORDER BY id DESC LIMIT ?2",
                t.history
            ))?;
            let entries = stmt
                .query_map(params![tracked_entity_id, limit], row_to_history)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }
}

/// Append one history row inside the caller's transaction.
#[allow(clippy::too_many_arguments)]
pub(crate) fn record(
    conn: &Connection,
    t: &Tables,
    tracked_entity_id: i64,
    item_id: i64,
    change_type: ChangeType,
    changed_by: Option<i64>,
    old_value: Option<&serde_json::Value>,
    new_value: Option<&serde_json::Value>,
) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (tracked_entity_id, item_id, change_type, changed_by, old_value, new_value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            t.history
        ),
        params![
            tracked_entity_id,
            item_id,
            change_type.as_str(),
            changed_by,
            old_value.map(|v| v.to_string()),
            new_value.map(|v| v.to_string()),
            now(),
        ],
    )?;
    Ok(())
}

fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<ChangeHistoryEntry> {
    let change_type: String = row.get(3)?;
    let change_type = ChangeType::parse(&change_type).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, change_type.clone(), rusqlite::types::Type::Text)
    })?;
    let old_value: Option<String> = row.get(5)?;
    let new_value: Option<String> = row.get(6)?;

    Ok(ChangeHistoryEntry {
        id: row.get(0)?,
        tracked_entity_id: row.get(1)?,
        item_id: row.get(2)?,
        change_type,
        changed_by: row.get(4)?,
        old_value: old_value.map(|s| parse_json_column(5, &s)).transpose()?,
        new_value: new_value.map(|s| parse_json_column(6, &s)).transpose()?,
        created_at: row.get(7)?,
    })
}
