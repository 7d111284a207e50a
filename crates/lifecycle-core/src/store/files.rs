//! Links between values and externally stored files

use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use super::definitions::fetch_item;
use super::history::record;
use super::{now, row_to_file, LifecycleStore};
use crate::error::{LifecycleError, Result};
use crate::model::{ChangeType, FileRef};
use crate::tenant::{TenantId, Tables};

/// Result of attaching a file to an item value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAttachment {
    pub value_id: i64,
    pub file: FileRef,
    /// False when the file was already attached
    pub created: bool,
}

impl LifecycleStore {
    /// Attach `file_id` to the entity's value for `item_id`.
    ///
    /// A pair with no value yet gets an empty value row as the anchor.
    /// Attaching the same file twice is a no-op.
    pub fn add_file(
        &self,
        tenant: &TenantId,
        tracked_entity_id: i64,
        item_id: i64,
        file_id: i64,
        user_id: Option<i64>,
    ) -> Result<FileAttachment> {
        let attachment = self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;

            if fetch_item(&tx, &t, item_id)?.is_none() {
                return Err(LifecycleError::not_found("Item", item_id));
            }

            let stamp = now();
            tx.execute(
                &format!(
                    "INSERT INTO {} (tracked_entity_id, item_id, updated_by, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT (tracked_entity_id, item_id) DO NOTHING",
                    t.values
                ),
                params![tracked_entity_id, item_id, user_id, stamp],
            )?;
            let value_id: i64 = tx.query_row(
                &format!(
                    "SELECT id FROM {} WHERE tracked_entity_id = ?1 AND item_id = ?2",
                    t.values
                ),
                params![tracked_entity_id, item_id],
                |row| row.get(0),
            )?;

            let inserted = tx.execute(
                &format!(
                    "INSERT INTO {} (value_id, file_id, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT (value_id, file_id) DO NOTHING",
                    t.files
                ),
                params![value_id, file_id, stamp],
            )?;
            let file = tx.query_row(
                &format!(
                    "SELECT id, file_id, created_at FROM {} WHERE value_id = ?1 AND file_id = ?2",
                    t.files
                ),
                params![value_id, file_id],
                row_to_file,
            )?;

            let created = inserted > 0;
            if created {
                record(
                    &tx,
                    &t,
                    tracked_entity_id,
                    item_id,
                    ChangeType::FileAdded,
                    user_id,
                    None,
                    Some(&json!({ "file_id": file_id })),
                )?;
            }
            tx.commit()?;

            Ok(FileAttachment {
                value_id,
                file,
                created,
            })
        })?;

        tracing::debug!(
            tenant = %tenant,
            tracked_entity_id,
            item_id,
            file_id,
            created = attachment.created,
            "file attached"
        );
        Ok(attachment)
    }

    /// Detach `file_id` from the entity's value for `item_id`.
    ///
    /// The value row itself stays, even when this was its last file.
    pub fn remove_file(
        &self,
        tenant: &TenantId,
        tracked_entity_id: i64,
        item_id: i64,
        file_id: i64,
        user_id: Option<i64>,
    ) -> Result<()> {
        self.with_conn(tenant, |conn| {
            let t = Tables::for_tenant(tenant);
            let tx = conn.unchecked_transaction()?;

            let removed: Option<i64> = tx
                .query_row(
                    &format!(
                        "DELETE FROM {} WHERE file_id = ?1 AND value_id =
                             (SELECT id FROM {} WHERE tracked_entity_id = ?2 AND item_id = ?3)
                         RETURNING id",
                        t.files, t.values
                    ),
                    params![file_id, tracked_entity_id, item_id],
                    |row| row.get(0),
                )
                .optional()?;
            if removed.is_none() {
                return Err(LifecycleError::not_found("File attachment", file_id));
            }

            record(
                &tx,
                &t,
                tracked_entity_id,
                item_id,
                ChangeType::FileRemoved,
                user_id,
                Some(&json!({ "file_id": file_id })),
                None,
            )?;
            tx.commit()?;
            Ok(())
        })?;

        tracing::debug!(tenant = %tenant, tracked_entity_id, item_id, file_id, "file detached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_type::ItemType;
    use crate::model::ValueInput;

    fn setup() -> (LifecycleStore, TenantId, i64) {
        let store = LifecycleStore::open_in_memory().unwrap();
        let tenant = TenantId::parse("acme").unwrap();
        store.install(&tenant).unwrap();
        let documents = store
            .list_config(&tenant, false)
            .unwrap()
            .into_iter()
            .flat_map(|p| p.items)
            .find(|i| i.item_type == ItemType::Documents)
            .unwrap()
            .id;
        (store, tenant, documents)
    }

    fn count(store: &LifecycleStore, sql: &str) -> i64 {
        let conn = store.lock().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn first_file_creates_value_anchor() {
        let (store, tenant, item) = setup();
        let attached = store.add_file(&tenant, 7, item, 501, Some(2)).unwrap();
        assert!(attached.created);
        assert_eq!(attached.file.file_id, 501);

        assert_eq!(count(&store, "SELECT COUNT(*) FROM \"acme__lifecycle_values\""), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM \"acme__lifecycle_value_files\""), 1);

        let lifecycle = store.get_lifecycle(&tenant, 7).unwrap();
        let value = lifecycle
            .phases
            .iter()
            .flat_map(|p| &p.items)
            .find(|i| i.item.id == item)
            .and_then(|i| i.value.clone())
            .unwrap();
        assert_eq!(value.value_text, None);
        assert_eq!(value.files, vec![attached.file]);
    }

    #[test]
    fn reattaching_is_a_no_op() {
        let (store, tenant, item) = setup();
        let first = store.add_file(&tenant, 7, item, 501, None).unwrap();
        let again = store.add_file(&tenant, 7, item, 501, None).unwrap();
        assert!(!again.created);
        assert_eq!(first.file.id, again.file.id);

        let second = store.add_file(&tenant, 7, item, 502, None).unwrap();
        assert_eq!(second.value_id, first.value_id);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM \"acme__lifecycle_value_files\""), 2);

        let added = store
            .list_history(&tenant, 7, 10)
            .unwrap()
            .into_iter()
            .filter(|h| h.change_type == ChangeType::FileAdded)
            .count();
        assert_eq!(added, 2);
    }

    #[test]
    fn attach_uses_existing_value() {
        let (store, tenant, _) = setup();
        let text_item = store
            .list_config(&tenant, false)
            .unwrap()
            .into_iter()
            .flat_map(|p| p.items)
            .find(|i| i.item_type == ItemType::Textarea)
            .unwrap()
            .id;
        let value = store
            .upsert_value(
                &tenant,
                7,
                text_item,
                ValueInput {
                    value_text: Some("see attachment".into()),
                    value_json: None,
                },
                None,
            )
            .unwrap();
        let attached = store.add_file(&tenant, 7, text_item, 9, None).unwrap();
        assert_eq!(attached.value_id, value.id);
    }

    #[test]
    fn attach_to_unknown_item_fails() {
        let (store, tenant, _) = setup();
        let err = store.add_file(&tenant, 7, 9999, 1, None).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "Item", .. }));
    }

    #[test]
    fn remove_is_scoped_to_entity_and_item() {
        let (store, tenant, item) = setup();
        store.add_file(&tenant, 7, item, 501, None).unwrap();
        store.add_file(&tenant, 8, item, 501, None).unwrap();

        store.remove_file(&tenant, 7, item, 501, Some(4)).unwrap();
        assert_eq!(count(&store, "SELECT COUNT(*) FROM \"acme__lifecycle_value_files\""), 1);

        // Entity 8 still has its copy; entity 7's anchor row stays
        assert_eq!(count(&store, "SELECT COUNT(*) FROM \"acme__lifecycle_values\""), 2);

        let err = store.remove_file(&tenant, 7, item, 501, None).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));

        let history = store.list_history(&tenant, 7, 10).unwrap();
        assert_eq!(history[0].change_type, ChangeType::FileRemoved);
        assert_eq!(history[0].changed_by, Some(4));
    }

    #[test]
    fn deleting_item_cascades_to_attachments() {
        let (store, tenant, item) = setup();
        store.add_file(&tenant, 7, item, 501, None).unwrap();
        store.delete_item(&tenant, item).unwrap();
        assert_eq!(count(&store, "SELECT COUNT(*) FROM \"acme__lifecycle_values\""), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM \"acme__lifecycle_value_files\""), 0);
    }
}
