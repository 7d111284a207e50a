//! Phase and item catalogue: CRUD and reordering

use std::collections::{BTreeMap, HashSet};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{now, placeholders, row_to_item, row_to_phase, LifecycleStore, ITEM_COLUMNS, PHASE_COLUMNS};
use crate::error::{LifecycleError, Result};
use crate::item_type::ItemConfig;
use crate::model::{Item, ItemUpdate, NewItem, NewPhase, Phase, PhaseUpdate, PhaseWithItems};
use crate::tenant::{TenantId, Tables};

impl LifecycleStore {
    // ==================== Config listing ====================

    /// Phases with their items, both ordered by `display_order`.
    ///
    /// Inactive phases and items are left out unless `include_inactive`.
    pub fn list_config(
        &self,
        tenant: &TenantId,
        include_inactive: bool,
    ) -> Result<Vec<PhaseWithItems>> {
        self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let active_filter = if include_inactive { "" } else { "WHERE is_active = 1" };

            let phases = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM {} {} ORDER BY display_order, id",
                    PHASE_COLUMNS, t.phases, active_filter
                ))?;
                let rows = stmt
                    .query_map([], row_to_phase)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            if phases.is_empty() {
                return Ok(Vec::new());
            }

            let phase_ids: Vec<i64> = phases.iter().map(|p| p.id).collect();
            let item_filter = if include_inactive { "" } else { "AND is_active = 1" };
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE phase_id IN ({}) {} ORDER BY display_order, id",
                ITEM_COLUMNS,
                t.items,
                placeholders(phase_ids.len()),
                item_filter
            ))?;
            let items = stmt
                .query_map(params_from_iter(phase_ids.iter()), row_to_item)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut by_phase: BTreeMap<i64, Vec<Item>> = BTreeMap::new();
            for item in items {
                by_phase.entry(item.phase_id).or_default().push(item);
            }

            Ok(phases
                .into_iter()
                .map(|phase| {
                    let items = by_phase.remove(&phase.id).unwrap_or_default();
                    PhaseWithItems { phase, items }
                })
                .collect())
        })
    }

    // ==================== Phase Operations ====================

    pub fn get_phase(&self, tenant: &TenantId, id: i64) -> Result<Phase> {
        self.with_conn(tenant, |conn| {
            fetch_phase(conn, &Tables::for_tenant(tenant), id)?
                .ok_or_else(|| LifecycleError::not_found("Phase", id))
        })
    }

    /// Create a phase; `display_order` defaults to one past the current maximum.
    pub fn create_phase(&self, tenant: &TenantId, new: NewPhase) -> Result<Phase> {
        let name = required_name(&new.name)?;
        let phase = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;

            let display_order = match new.display_order {
                Some(order) => order,
                None => next_display_order(&tx, &t.phases, None)?,
            };
            let stamp = now();
            tx.execute(
                &format!(
                    "INSERT INTO {} (name, description, display_order, is_active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    t.phases
                ),
                params![
                    name,
                    new.description,
                    display_order,
                    new.is_active.unwrap_or(true),
                    stamp
                ],
            )?;
            let id = tx.last_insert_rowid();
            let phase = fetch_phase(&tx, &t, id)?.ok_or_else(|| LifecycleError::not_found("Phase", id))?;
            tx.commit()?;
            Ok(phase)
        })?;

        tracing::info!(tenant = %tenant, phase_id = phase.id, name = %phase.name, "phase created");
        Ok(phase)
    }

    /// Apply the supplied fields of `update` to a phase.
    pub fn update_phase(&self, tenant: &TenantId, id: i64, update: PhaseUpdate) -> Result<Phase> {
        if update.is_empty() {
            return Err(LifecycleError::NoFieldsToUpdate);
        }

        let mut sets = SetClause::default();
        if let Some(name) = &update.name {
            sets.push("name", SqlValue::Text(required_name(name)?));
        }
        if let Some(description) = update.description {
            sets.push("description", opt_text(description));
        }
        if let Some(order) = update.display_order {
            sets.push("display_order", SqlValue::Integer(order));
        }
        if let Some(active) = update.is_active {
            sets.push("is_active", SqlValue::Integer(active as i64));
        }

        let phase = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            if sets.apply(conn, &t.phases, id)? == 0 {
                return Err(LifecycleError::not_found("Phase", id));
            }
            fetch_phase(conn, &t, id)?.ok_or_else(|| LifecycleError::not_found("Phase", id))
        })?;

        tracing::info!(tenant = %tenant, phase_id = id, fields = %sets.columns(), "phase updated");
        Ok(phase)
    }

    /// Hard-delete a phase; its items, values and attachments cascade.
    pub fn delete_phase(&self, tenant: &TenantId, id: i64) -> Result<()> {
        self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let rows = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", t.phases), params![id])?;
            if rows == 0 {
                return Err(LifecycleError::not_found("Phase", id));
            }
            Ok(())
        })?;

        tracing::info!(tenant = %tenant, phase_id = id, "phase deleted");
        Ok(())
    }

    /// Assign `display_order` 1..=n following the order of `ids`.
    pub fn reorder_phases(&self, tenant: &TenantId, ids: &[i64]) -> Result<Vec<Phase>> {
        check_reorder_ids(ids)?;
        let phases = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;
            reorder(&tx, &t.phases, ids, None, "Phase")?;
            tx.commit()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} ORDER BY display_order, id",
                PHASE_COLUMNS, t.phases
            ))?;
            let phases = stmt
                .query_map([], row_to_phase)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(phases)
        })?;

        tracing::info!(tenant = %tenant, count = ids.len(), "phases reordered");
        Ok(phases)
    }

    // ==================== Item Operations ====================

    pub fn get_item(&self, tenant: &TenantId, id: i64) -> Result<Item> {
        self.with_conn(tenant, |conn| {
            fetch_item(conn, &Tables::for_tenant(tenant), id)?
                .ok_or_else(|| LifecycleError::not_found("Item", id))
        })
    }

    /// Create an item under `phase_id`; config is validated against the type.
    pub fn create_item(&self, tenant: &TenantId, phase_id: i64, new: NewItem) -> Result<Item> {
        let name = required_name(&new.name)?;
        let config = ItemConfig::parse(new.item_type, new.config.as_ref())?;

        let item = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;

            if fetch_phase(&tx, &t, phase_id)?.is_none() {
                return Err(LifecycleError::not_found("Phase", phase_id));
            }

            let display_order = match new.display_order {
                Some(order) => order,
                None => next_display_order(&tx, &t.items, Some(phase_id))?,
            };
            let stamp = now();
            tx.execute(
                &format!(
                    "INSERT INTO {} (phase_id, name, description, item_type, is_required, display_order, config, is_active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                    t.items
                ),
                params![
                    phase_id,
                    name,
                    new.description,
                    new.item_type.as_str(),
                    new.is_required.unwrap_or(false),
                    display_order,
                    config.to_json().to_string(),
                    new.is_active.unwrap_or(true),
                    stamp,
                ],
            )?;
            let id = tx.last_insert_rowid();
            let item = fetch_item(&tx, &t, id)?.ok_or_else(|| LifecycleError::not_found("Item", id))?;
            tx.commit()?;
            Ok(item)
        })?;

        tracing::info!(
            tenant = %tenant,
            item_id = item.id,
            phase_id,
            item_type = %item.item_type,
            "item created"
        );
        Ok(item)
    }

    /// Apply the supplied fields of `update` to an item.
    ///
    /// A new `item_type` without a new `config` re-normalizes the stored config
    /// under the new type.
    pub fn update_item(&self, tenant: &TenantId, id: i64, update: ItemUpdate) -> Result<Item> {
        if update.is_empty() {
            return Err(LifecycleError::NoFieldsToUpdate);
        }

        let (item, columns) = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;
            let existing =
                fetch_item(&tx, &t, id)?.ok_or_else(|| LifecycleError::not_found("Item", id))?;

            let mut sets = SetClause::default();
            if let Some(name) = &update.name {
                sets.push("name", SqlValue::Text(required_name(name)?));
            }
            if let Some(description) = update.description.clone() {
                sets.push("description", opt_text(description));
            }
            if update.item_type.is_some() || update.config.is_some() {
                let item_type = update.item_type.unwrap_or(existing.item_type);
                let config = ItemConfig::parse(
                    item_type,
                    Some(update.config.as_ref().unwrap_or(&existing.config)),
                )?;
                sets.push("item_type", SqlValue::Text(item_type.as_str().to_string()));
                sets.push("config", SqlValue::Text(config.to_json().to_string()));
            }
            if let Some(required) = update.is_required {
                sets.push("is_required", SqlValue::Integer(required as i64));
            }
            if let Some(order) = update.display_order {
                sets.push("display_order", SqlValue::Integer(order));
            }
            if let Some(active) = update.is_active {
                sets.push("is_active", SqlValue::Integer(active as i64));
            }

            sets.apply(&tx, &t.items, id)?;
            let item = fetch_item(&tx, &t, id)?.ok_or_else(|| LifecycleError::not_found("Item", id))?;
            tx.commit()?;
            Ok((item, sets.columns()))
        })?;

        tracing::info!(tenant = %tenant, item_id = id, fields = %columns, "item updated");
        Ok(item)
    }

    /// Hard-delete an item; its values and attachments cascade.
    pub fn delete_item(&self, tenant: &TenantId, id: i64) -> Result<()> {
        self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let rows = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", t.items), params![id])?;
            if rows == 0 {
                return Err(LifecycleError::not_found("Item", id));
            }
            Ok(())
        })?;

        tracing::info!(tenant = %tenant, item_id = id, "item deleted");
        Ok(())
    }

    /// Assign `display_order` 1..=n to the phase's items following `ids`.
    pub fn reorder_items(&self, tenant: &TenantId, phase_id: i64, ids: &[i64]) -> Result<Vec<Item>> {
        check_reorder_ids(ids)?;
        let items = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;
            if fetch_phase(&tx, &t, phase_id)?.is_none() {
                return Err(LifecycleError::not_found("Phase", phase_id));
            }
            reorder(&tx, &t.items, ids, Some(phase_id), "Item")?;
            tx.commit()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE phase_id = ?1 ORDER BY display_order, id",
                ITEM_COLUMNS, t.items
            ))?;
            let items = stmt
                .query_map(params![phase_id], row_to_item)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(items)
        })?;

        tracing::info!(tenant = %tenant, phase_id, count = ids.len(), "items reordered");
        Ok(items)
    }
}

pub(crate) fn fetch_phase(conn: &Connection, t: &Tables, id: i64) -> Result<Option<Phase>> {
    let phase = conn
        .query_row(
            &format!("SELECT {} FROM {} WHERE id = ?1", PHASE_COLUMNS, t.phases),
            params![id],
            row_to_phase,
        )
        .optional()?;
    Ok(phase)
}

pub(crate) fn fetch_item(conn: &Connection, t: &Tables, id: i64) -> Result<Option<Item>> {
    let item = conn
        .query_row(
            &format!("SELECT {} FROM {} WHERE id = ?1", ITEM_COLUMNS, t.items),
            params![id],
            row_to_item,
        )
        .optional()?;
    Ok(item)
}

fn required_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::Validation("name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn opt_text(value: Option<String>) -> SqlValue {
    value.map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

fn next_display_order(conn: &Connection, table: &str, phase_id: Option<i64>) -> Result<i64> {
    let next = match phase_id {
        Some(phase_id) => conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(display_order), 0) + 1 FROM {} WHERE phase_id = ?1",
                table
            ),
            params![phase_id],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            &format!("SELECT COALESCE(MAX(display_order), 0) + 1 FROM {}", table),
            [],
            |row| row.get(0),
        )?,
    };
    Ok(next)
}

fn check_reorder_ids(ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Err(LifecycleError::Validation("reorder list is empty".to_string()));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(LifecycleError::Validation(format!(
            "id {} appears more than once in reorder list",
            dup
        )));
    }
    Ok(())
}

/// One `UPDATE … CASE` statement assigning list positions. The caller owns the
/// transaction; a missing id aborts before commit so nothing is reordered.
fn reorder(
    conn: &Connection,
    table: &str,
    ids: &[i64],
    phase_id: Option<i64>,
    entity: &'static str,
) -> Result<()> {
    let cases = vec!["WHEN ? THEN ?"; ids.len()].join(" ");
    let scope = if phase_id.is_some() { " AND phase_id = ?" } else { "" };
    let sql = format!(
        "UPDATE {} SET display_order = CASE id {} END, updated_at = ? WHERE id IN ({}){}",
        table,
        cases,
        placeholders(ids.len()),
        scope
    );

    let mut values: Vec<SqlValue> = Vec::with_capacity(ids.len() * 3 + 2);
    for (pos, id) in ids.iter().enumerate() {
        values.push(SqlValue::Integer(*id));
        values.push(SqlValue::Integer(pos as i64 + 1));
    }
    values.push(SqlValue::Text(now()));
    values.extend(ids.iter().map(|id| SqlValue::Integer(*id)));
    if let Some(phase_id) = phase_id {
        values.push(SqlValue::Integer(phase_id));
    }

    let updated = conn.execute(&sql, params_from_iter(values))?;
    if updated != ids.len() {
        let missing = first_missing(conn, table, ids, phase_id)?;
        return Err(LifecycleError::not_found(entity, missing));
    }
    Ok(())
}

fn first_missing(conn: &Connection, table: &str, ids: &[i64], phase_id: Option<i64>) -> Result<i64> {
    for id in ids {
        let found: Option<i64> = match phase_id {
            Some(phase_id) => conn
                .query_row(
                    &format!("SELECT id FROM {} WHERE id = ?1 AND phase_id = ?2", table),
                    params![id, phase_id],
                    |row| row.get(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    &format!("SELECT id FROM {} WHERE id = ?1", table),
                    params![id],
                    |row| row.get(0),
                )
                .optional()?,
        };
        if found.is_none() {
            return Ok(*id);
        }
    }
    Ok(ids[0])
}

/// Allow-listed `SET` assignments for a PATCH-style update
#[derive(Default)]
struct SetClause {
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl SetClause {
    fn push(&mut self, column: &'static str, value: SqlValue) {
        self.columns.push(column);
        self.values.push(value);
    }

    fn columns(&self) -> String {
        self.columns.join(",")
    }

    /// Execute the update against row `id`, stamping `updated_at`.
    fn apply(&self, conn: &Connection, table: &str, id: i64) -> Result<usize> {
        let assignments: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .chain(std::iter::once("updated_at = ?".to_string()))
            .collect();
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, assignments.join(", "));

        let mut values = self.values.clone();
        values.push(SqlValue::Text(now()));
        values.push(SqlValue::Integer(id));
        Ok(conn.execute(&sql, params_from_iter(values))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_type::ItemType;
    use serde_json::json;

    fn setup() -> (LifecycleStore, TenantId) {
        let store = LifecycleStore::open_in_memory().unwrap();
        let tenant = TenantId::parse("acme").unwrap();
        store.install(&tenant).unwrap();
        (store, tenant)
    }

    fn empty_tenant() -> (LifecycleStore, TenantId) {
        let (store, tenant) = setup();
        for p in store.list_config(&tenant, true).unwrap() {
            store.delete_phase(&tenant, p.phase.id).unwrap();
        }
        (store, tenant)
    }

    fn new_phase(name: &str) -> NewPhase {
        NewPhase {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn new_item(name: &str, item_type: ItemType) -> NewItem {
        NewItem {
            name: name.to_string(),
            description: None,
            item_type,
            is_required: None,
            display_order: None,
            config: None,
            is_active: None,
        }
    }

    #[test]
    fn config_is_ordered_by_display_order() {
        let (store, tenant) = setup();
        let config = store.list_config(&tenant, false).unwrap();
        let orders: Vec<i64> = config.iter().map(|p| p.phase.display_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(config[0].phase.name, "Registration");
        for phase in &config {
            let item_orders: Vec<i64> = phase.items.iter().map(|i| i.display_order).collect();
            let mut sorted = item_orders.clone();
            sorted.sort();
            assert_eq!(item_orders, sorted);
        }
    }

    #[test]
    fn create_phase_appends_after_max_order() {
        let (store, tenant) = setup();
        let phase = store.create_phase(&tenant, new_phase("Retirement")).unwrap();
        assert_eq!(phase.display_order, 7);
        assert!(phase.is_active);

        let explicit = store
            .create_phase(
                &tenant,
                NewPhase {
                    name: "Intake".into(),
                    display_order: Some(0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(explicit.display_order, 0);
        assert_eq!(store.list_config(&tenant, false).unwrap()[0].phase.name, "Intake");
    }

    #[test]
    fn create_phase_rejects_blank_name() {
        let (store, tenant) = setup();
        let err = store.create_phase(&tenant, new_phase("   ")).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn update_phase_without_fields_is_an_error() {
        let (store, tenant) = setup();
        let err = store.update_phase(&tenant, 1, PhaseUpdate::default()).unwrap_err();
        assert!(matches!(err, LifecycleError::NoFieldsToUpdate));
    }

    #[test]
    fn update_phase_applies_only_supplied_fields() {
        let (store, tenant) = setup();
        let before = store.get_phase(&tenant, 1).unwrap();
        let after = store
            .update_phase(
                &tenant,
                1,
                PhaseUpdate {
                    name: Some("Intake".into()),
                    description: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(after.name, "Intake");
        assert_eq!(after.description, None);
        assert_eq!(after.display_order, before.display_order);
        assert_eq!(after.is_active, before.is_active);
    }

    #[test]
    fn update_missing_phase_is_not_found() {
        let (store, tenant) = setup();
        let err = store
            .update_phase(
                &tenant,
                999,
                PhaseUpdate {
                    name: Some("x".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "Phase", .. }));
    }

    #[test]
    fn inactive_phase_hidden_unless_requested() {
        let (store, tenant) = setup();
        store
            .update_phase(
                &tenant,
                2,
                PhaseUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.list_config(&tenant, false).unwrap().len(), 5);
        assert_eq!(store.list_config(&tenant, true).unwrap().len(), 6);
    }

    #[test]
    fn reorder_phases_follows_list_position() {
        let (store, tenant) = empty_tenant();
        let a = store.create_phase(&tenant, new_phase("A")).unwrap();
        let b = store.create_phase(&tenant, new_phase("B")).unwrap();
        let c = store.create_phase(&tenant, new_phase("C")).unwrap();

        let phases = store.reorder_phases(&tenant, &[c.id, a.id, b.id]).unwrap();
        let order: Vec<(i64, i64)> = phases.iter().map(|p| (p.id, p.display_order)).collect();
        assert_eq!(order, vec![(c.id, 1), (a.id, 2), (b.id, 3)]);
    }

    #[test]
    fn reorder_with_unknown_id_changes_nothing() {
        let (store, tenant) = setup();
        let before: Vec<i64> = store
            .list_config(&tenant, true)
            .unwrap()
            .iter()
            .map(|p| p.phase.id)
            .collect();

        let err = store.reorder_phases(&tenant, &[6, 5, 4242]).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { ref id, .. } if id == "4242"));

        let after: Vec<i64> = store
            .list_config(&tenant, true)
            .unwrap()
            .iter()
            .map(|p| p.phase.id)
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn reorder_rejects_empty_and_duplicate_lists() {
        let (store, tenant) = setup();
        assert!(matches!(
            store.reorder_phases(&tenant, &[]).unwrap_err(),
            LifecycleError::Validation(_)
        ));
        assert!(matches!(
            store.reorder_phases(&tenant, &[1, 1]).unwrap_err(),
            LifecycleError::Validation(_)
        ));
    }

    #[test]
    fn create_item_under_missing_phase_fails() {
        let (store, tenant) = setup();
        let err = store
            .create_item(&tenant, 999, new_item("x", ItemType::Text))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "Phase", .. }));
    }

    #[test]
    fn create_item_normalizes_config_and_order() {
        let (store, tenant) = setup();
        let phase = store.create_phase(&tenant, new_phase("Retirement")).unwrap();
        let first = store
            .create_item(&tenant, phase.id, new_item("Reason", ItemType::Textarea))
            .unwrap();
        let second = store
            .create_item(
                &tenant,
                phase.id,
                NewItem {
                    config: Some(json!({ "options": ["Replaced", "Obsolete"] })),
                    ..new_item("Category", ItemType::Classification)
                },
            )
            .unwrap();
        assert_eq!(first.display_order, 1);
        assert_eq!(second.display_order, 2);
        assert_eq!(first.config, json!({}));
        assert_eq!(second.config, json!({ "options": ["Replaced", "Obsolete"] }));
    }

    #[test]
    fn create_item_rejects_bad_config() {
        let (store, tenant) = setup();
        let err = store
            .create_item(
                &tenant,
                1,
                NewItem {
                    config: Some(json!({ "approvers": "everyone" })),
                    ..new_item("Sign-off", ItemType::Approval)
                },
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn update_item_changes_type_and_revalidates() {
        let (store, tenant) = setup();
        let item = store
            .create_item(&tenant, 1, new_item("Reviewer", ItemType::Text))
            .unwrap();

        let updated = store
            .update_item(
                &tenant,
                item.id,
                ItemUpdate {
                    item_type: Some(ItemType::People),
                    is_required: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.item_type, ItemType::People);
        assert!(updated.is_required);
        assert_eq!(updated.config, json!({ "multiple": false }));

        assert!(matches!(
            store.update_item(&tenant, item.id, ItemUpdate::default()).unwrap_err(),
            LifecycleError::NoFieldsToUpdate
        ));
        assert!(matches!(
            store
                .update_item(
                    &tenant,
                    999,
                    ItemUpdate {
                        name: Some("x".into()),
                        ..Default::default()
                    }
                )
                .unwrap_err(),
            LifecycleError::NotFound { entity: "Item", .. }
        ));
    }

    #[test]
    fn reorder_items_scoped_to_phase() {
        let (store, tenant) = setup();
        let config = store.list_config(&tenant, true).unwrap();
        let registration = &config[0];
        let mut ids: Vec<i64> = registration.items.iter().map(|i| i.id).collect();
        ids.reverse();

        let items = store.reorder_items(&tenant, registration.phase.id, &ids).unwrap();
        let got: Vec<i64> = items.iter().map(|i| i.id).collect();
        assert_eq!(got, ids);

        // An item from another phase is not part of this phase's ordering
        let foreign = config[1].items[0].id;
        let err = store
            .reorder_items(&tenant, registration.phase.id, &[ids[0], foreign])
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "Item", .. }));
    }

    #[test]
    fn delete_item_and_missing_item() {
        let (store, tenant) = setup();
        let item = store
            .create_item(&tenant, 1, new_item("Temp", ItemType::Text))
            .unwrap();
        store.delete_item(&tenant, item.id).unwrap();
        assert!(matches!(
            store.delete_item(&tenant, item.id).unwrap_err(),
            LifecycleError::NotFound { .. }
        ));
    }
}
