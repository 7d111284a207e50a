//! Per-entity values and the assembled lifecycle read

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::json;

use super::definitions::fetch_item;
use super::history::record;
use super::{
    now, placeholders, row_to_file, row_to_item, row_to_phase, row_to_value, LifecycleStore,
    ITEM_COLUMNS, PHASE_COLUMNS, VALUE_COLUMNS,
};
use crate::error::{LifecycleError, Result};
use crate::item_type::{approval_transitions, parse_approvals, ItemConfig, ItemType};
use crate::model::{
    ChangeType, FileRef, ItemValue, Lifecycle, LifecycleItem, LifecyclePhase, ValueInput,
    ValueView,
};
use crate::tenant::{TenantId, Tables};

impl LifecycleStore {
    /// Create or overwrite the value of one item for one tracked entity.
    ///
    /// Both typed columns are replaced; a missing field clears its column.
    /// The change and any approval decisions it carries are recorded in the
    /// history within the same transaction.
    pub fn upsert_value(
        &self,
        tenant: &TenantId,
        tracked_entity_id: i64,
        item_id: i64,
        input: ValueInput,
        user_id: Option<i64>,
    ) -> Result<ValueView> {
        let (view, decisions) = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;

            let item =
                fetch_item(&tx, &t, item_id)?.ok_or_else(|| LifecycleError::not_found("Item", item_id))?;
            let config = ItemConfig::parse(item.item_type, Some(&item.config))?;
            config.validate_value(input.value_text.as_deref(), input.value_json.as_ref())?;

            let previous = fetch_value(&tx, &t, tracked_entity_id, item_id)?;

            let decisions = if item.item_type == ItemType::Approval {
                // A payload stored under an earlier item type carries no decisions
                let before = previous
                    .as_ref()
                    .and_then(|v| v.value_json.as_ref())
                    .and_then(|json| parse_approvals(json).ok())
                    .unwrap_or_default();
                let after = match input.value_json.as_ref() {
                    Some(json) => parse_approvals(json)?,
                    None => Vec::new(),
                };
                approval_transitions(&before, &after)?
            } else {
                Vec::new()
            };

            let value_json = input.value_json.as_ref().map(|v| v.to_string());
            let stamp = now();
            let value_id: i64 = tx.query_row(
                &format!(
                    "INSERT INTO {} (tracked_entity_id, item_id, value_text, value_json, updated_by, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     ON CONFLICT (tracked_entity_id, item_id) DO UPDATE SET
                         value_text = excluded.value_text,
                         value_json = excluded.value_json,
                         updated_by = excluded.updated_by,
                         updated_at = excluded.updated_at
                     RETURNING id",
                    t.values
                ),
                params![
                    tracked_entity_id,
                    item_id,
                    input.value_text,
                    value_json,
                    user_id,
                    stamp
                ],
                |row| row.get(0),
            )?;

            let old_snapshot = previous.as_ref().map(snapshot);
            let new_snapshot = json!({
                "value_text": input.value_text,
                "value_json": input.value_json,
            });
            record(
                &tx,
                &t,
                tracked_entity_id,
                item_id,
                ChangeType::ValueUpdated,
                user_id,
                old_snapshot.as_ref(),
                Some(&new_snapshot),
            )?;
            for decision in &decisions {
                record(
                    &tx,
                    &t,
                    tracked_entity_id,
                    item_id,
                    ChangeType::ApprovalDecision,
                    user_id,
                    None,
                    Some(&serde_json::to_value(decision)?),
                )?;
            }

            let stored = fetch_value(&tx, &t, tracked_entity_id, item_id)?
                .ok_or_else(|| LifecycleError::not_found("Value", value_id))?;
            let files = files_for_values(&tx, &t, &[value_id])?
                .remove(&value_id)
                .unwrap_or_default();
            tx.commit()?;
            Ok((value_view(stored, files), decisions.len()))
        })?;

        tracing::debug!(
            tenant = %tenant,
            tracked_entity_id,
            item_id,
            value_id = view.id,
            decisions,
            "value upserted"
        );
        Ok(view)
    }

    /// Every active phase with its active items and this entity's values.
    ///
    /// Per phase: one query for items, one for the values of those items, one
    /// for the files of those values.
    pub fn get_lifecycle(&self, tenant: &TenantId, tracked_entity_id: i64) -> Result<Lifecycle> {
        self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);

            let phases = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM {} WHERE is_active = 1 ORDER BY display_order, id",
                    PHASE_COLUMNS, t.phases
                ))?;
                let rows = stmt
                    .query_map([], row_to_phase)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            let mut out = Vec::with_capacity(phases.len());
            for phase in phases {
                let items = {
                    let mut stmt = conn.prepare_cached(&format!(
                        "SELECT {} FROM {} WHERE phase_id = ?1 AND is_active = 1 ORDER BY display_order, id",
                        ITEM_COLUMNS, t.items
                    ))?;
                    let rows = stmt
                        .query_map(params![phase.id], row_to_item)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                };

                let item_ids: Vec<i64> = items.iter().map(|i| i.id).collect();
                let mut values = values_for_items(conn, &t, tracked_entity_id, &item_ids)?;
                let value_ids: Vec<i64> = values.values().map(|v| v.id).collect();
                let mut files = files_for_values(conn, &t, &value_ids)?;

                let items = items
                    .into_iter()
                    .map(|item| {
                        let value = values.remove(&item.id).map(|v| {
                            let value_files = files.remove(&v.id).unwrap_or_default();
                            value_view(v, value_files)
                        });
                        LifecycleItem { item, value }
                    })
                    .collect();
                out.push(LifecyclePhase { phase, items });
            }

            Ok(Lifecycle {
                tracked_entity_id,
                phases: out,
            })
        })
    }
}

pub(crate) fn fetch_value(
    conn: &Connection,
    t: &Tables,
    tracked_entity_id: i64,
    item_id: i64,
) -> Result<Option<ItemValue>> {
    let value = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE tracked_entity_id = ?1 AND item_id = ?2",
                VALUE_COLUMNS, t.values
            ),
            params![tracked_entity_id, item_id],
            row_to_value,
        )
        .optional()?;
    Ok(value)
}

/// The entity's values for `item_ids`, keyed by item id
fn values_for_items(
    conn: &Connection,
    t: &Tables,
    tracked_entity_id: i64,
    item_ids: &[i64],
) -> Result<HashMap<i64, ItemValue>> {
    if item_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE tracked_entity_id = ? AND item_id IN ({})",
        VALUE_COLUMNS,
        t.values,
        placeholders(item_ids.len())
    ))?;
    let bound = std::iter::once(tracked_entity_id).chain(item_ids.iter().copied());
    let rows = stmt
        .query_map(params_from_iter(bound), row_to_value)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.into_iter().map(|v| (v.item_id, v)).collect())
}

/// Attachments of `value_ids`, keyed by value id, oldest first
pub(crate) fn files_for_values(
    conn: &Connection,
    t: &Tables,
    value_ids: &[i64],
) -> Result<HashMap<i64, Vec<FileRef>>> {
    if value_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT id, file_id, created_at, value_id FROM {} WHERE value_id IN ({}) ORDER BY id",
        t.files,
        placeholders(value_ids.len())
    ))?;
    let rows = stmt
        .query_map(params_from_iter(value_ids.iter()), |row| {
            let value_id: i64 = row.get(3)?;
            Ok((value_id, row_to_file(row)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut by_value: HashMap<i64, Vec<FileRef>> = HashMap::new();
    for (value_id, file) in rows {
        by_value.entry(value_id).or_default().push(file);
    }
    Ok(by_value)
}

fn value_view(value: ItemValue, files: Vec<FileRef>) -> ValueView {
    ValueView {
        id: value.id,
        value_text: value.value_text,
        value_json: value.value_json,
        updated_by: value.updated_by,
        updated_at: value.updated_at,
        files,
    }
}

fn snapshot(value: &ItemValue) -> serde_json::Value {
    json!({
        "value_text": value.value_text,
        "value_json": value.value_json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeType, ItemUpdate, PhaseUpdate};

    fn setup() -> (LifecycleStore, TenantId) {
        let store = LifecycleStore::open_in_memory().unwrap();
        let tenant = TenantId::parse("acme").unwrap();
        store.install(&tenant).unwrap();
        (store, tenant)
    }

    fn item_of_type(store: &LifecycleStore, tenant: &TenantId, ty: ItemType) -> i64 {
        store
            .list_config(tenant, false)
            .unwrap()
            .into_iter()
            .flat_map(|p| p.items)
            .find(|i| i.item_type == ty)
            .unwrap()
            .id
    }

    fn text(s: &str) -> ValueInput {
        ValueInput {
            value_text: Some(s.to_string()),
            value_json: None,
        }
    }

    #[test]
    fn upsert_then_read_back() {
        let (store, tenant) = setup();
        let item = item_of_type(&store, &tenant, ItemType::Textarea);

        let view = store.upsert_value(&tenant, 42, item, text("abc"), Some(7)).unwrap();
        assert_eq!(view.value_text.as_deref(), Some("abc"));
        assert_eq!(view.updated_by, Some(7));
        assert!(view.files.is_empty());

        let lifecycle = store.get_lifecycle(&tenant, 42).unwrap();
        let found = lifecycle
            .phases
            .iter()
            .flat_map(|p| &p.items)
            .find(|i| i.item.id == item)
            .unwrap();
        assert_eq!(found.value.as_ref().unwrap().value_text.as_deref(), Some("abc"));

        // Another entity sees nothing
        let other = store.get_lifecycle(&tenant, 43).unwrap();
        assert!(other.phases.iter().flat_map(|p| &p.items).all(|i| i.value.is_none()));
    }

    #[test]
    fn upsert_keeps_one_row_per_pair() {
        let (store, tenant) = setup();
        let item = item_of_type(&store, &tenant, ItemType::Textarea);

        let first = store.upsert_value(&tenant, 1, item, text("one"), None).unwrap();
        let second = store.upsert_value(&tenant, 1, item, text("two"), Some(3)).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.value_text.as_deref(), Some("two"));

        let cleared = store
            .upsert_value(&tenant, 1, item, ValueInput::default(), Some(3))
            .unwrap();
        assert_eq!(cleared.id, first.id);
        assert_eq!(cleared.value_text, None);

        let history = store.list_history(&tenant, 1, 10).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|h| h.change_type == ChangeType::ValueUpdated));
        assert_eq!(history[0].old_value, Some(json!({ "value_text": "two", "value_json": null })));
        assert_eq!(history[2].old_value, None);
    }

    #[test]
    fn upsert_unknown_item_is_not_found() {
        let (store, tenant) = setup();
        let err = store.upsert_value(&tenant, 1, 9999, text("x"), None).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "Item", .. }));
    }

    #[test]
    fn upsert_validates_against_item_type() {
        let (store, tenant) = setup();
        let people = item_of_type(&store, &tenant, ItemType::People);
        let err = store.upsert_value(&tenant, 1, people, text("alice"), None).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        let classification = item_of_type(&store, &tenant, ItemType::Classification);
        assert!(store
            .upsert_value(&tenant, 1, classification, text("Medium"), None)
            .is_ok());
        assert!(store
            .upsert_value(&tenant, 1, classification, text("Enormous"), None)
            .is_err());
    }

    #[test]
    fn approval_decisions_are_final_and_audited() {
        let (store, tenant) = setup();
        let approval = item_of_type(&store, &tenant, ItemType::Approval);
        let payload = |status: &str| ValueInput {
            value_text: None,
            value_json: Some(json!([
                { "approverId": 10, "status": status, "date": "2026-03-01" },
                { "approverId": 11, "status": "pending" }
            ])),
        };

        store.upsert_value(&tenant, 5, approval, payload("pending"), Some(1)).unwrap();
        store.upsert_value(&tenant, 5, approval, payload("approved"), Some(10)).unwrap();

        let err = store
            .upsert_value(&tenant, 5, approval, payload("rejected"), Some(10))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        let decisions: Vec<_> = store
            .list_history(&tenant, 5, 50)
            .unwrap()
            .into_iter()
            .filter(|h| h.change_type == ChangeType::ApprovalDecision)
            .collect();
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].new_value,
            Some(json!({ "approver_id": 10, "status": "approved", "date": "2026-03-01" }))
        );

        // The refused write left the stored value alone
        let lifecycle = store.get_lifecycle(&tenant, 5).unwrap();
        let value = lifecycle
            .phases
            .iter()
            .flat_map(|p| &p.items)
            .find(|i| i.item.id == approval)
            .and_then(|i| i.value.clone())
            .unwrap();
        assert_eq!(value.value_json.unwrap()[0]["status"], "approved");
    }

    #[test]
    fn item_retyped_to_approval_accepts_new_values() {
        let (store, tenant) = setup();
        let item = item_of_type(&store, &tenant, ItemType::People);
        let people = ValueInput {
            value_text: None,
            value_json: Some(json!([7])),
        };
        store.upsert_value(&tenant, 2, item, people, Some(1)).unwrap();

        store
            .update_item(
                &tenant,
                item,
                ItemUpdate {
                    item_type: Some(ItemType::Approval),
                    ..Default::default()
                },
            )
            .unwrap();

        let approval = ValueInput {
            value_text: None,
            value_json: Some(json!([{ "approverId": 7, "status": "pending" }])),
        };
        let view = store.upsert_value(&tenant, 2, item, approval, Some(1)).unwrap();
        assert_eq!(view.value_json.unwrap()[0]["approverId"], 7);

        let cleared = store
            .upsert_value(&tenant, 2, item, ValueInput::default(), Some(1))
            .unwrap();
        assert_eq!(cleared.value_json, None);
    }

    #[test]
    fn lifecycle_hides_inactive_phases() {
        let (store, tenant) = setup();
        store
            .update_phase(
                &tenant,
                1,
                PhaseUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let lifecycle = store.get_lifecycle(&tenant, 1).unwrap();
        assert_eq!(lifecycle.phases.len(), 5);
        assert!(lifecycle.phases.iter().all(|p| p.phase.id != 1));
    }

    #[test]
    fn deleting_phase_cascades_to_values_and_files() {
        let (store, tenant) = setup();
        let config = store.list_config(&tenant, false).unwrap();
        let phase = config
            .iter()
            .find(|p| p.items.iter().any(|i| i.item_type == ItemType::Documents))
            .unwrap();
        let documents = phase
            .items
            .iter()
            .find(|i| i.item_type == ItemType::Documents)
            .unwrap()
            .id;
        let textual = phase
            .items
            .iter()
            .find(|i| i.item_type == ItemType::Textarea)
            .unwrap()
            .id;
        store.upsert_value(&tenant, 1, textual, text("purpose"), None).unwrap();
        store.add_file(&tenant, 1, documents, 900, None).unwrap();

        store.delete_phase(&tenant, phase.phase.id).unwrap();

        let conn = store.lock().unwrap();
        let t = Tables::for_tenant(&tenant);
        assert!(fetch_value(&conn, &t, 1, textual).unwrap().is_none());
        assert!(fetch_value(&conn, &t, 1, documents).unwrap().is_none());
        let files: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", t.files), [], |row| row.get(0))
            .unwrap();
        assert_eq!(files, 0);
    }
}
