//! SQLite schema for the tenant-scoped lifecycle tables

use crate::item_type::ItemType;
use crate::tenant::{Table, TenantId, Tables};

/// SQLite schema definition
pub struct Schema;

impl Schema {
    /// DDL creating the five tables and their indexes for one tenant.
    ///
    /// Every statement is guarded with `IF NOT EXISTS`, so running it against
    /// an already provisioned tenant is a no-op.
    pub fn create_tables(tenant: &TenantId) -> String {
        let t = Tables::for_tenant(tenant);
        let item_types = ItemType::ALL
            .iter()
            .map(|ty| format!("'{}'", ty.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"
CREATE TABLE IF NOT EXISTS {phases} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    display_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS {items} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phase_id INTEGER NOT NULL REFERENCES {phases}(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    item_type TEXT NOT NULL CHECK (item_type IN ({item_types})),
    is_required INTEGER NOT NULL DEFAULT 0,
    display_order INTEGER NOT NULL DEFAULT 0,
    config TEXT NOT NULL DEFAULT '{{}}',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS {idx_items_phase} ON {items}(phase_id, display_order);

CREATE TABLE IF NOT EXISTS {values} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tracked_entity_id INTEGER NOT NULL,
    item_id INTEGER NOT NULL REFERENCES {items}(id) ON DELETE CASCADE,
    value_text TEXT,
    value_json TEXT,
    updated_by INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (tracked_entity_id, item_id)
);

CREATE INDEX IF NOT EXISTS {idx_values_item} ON {values}(item_id);

CREATE TABLE IF NOT EXISTS {files} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    value_id INTEGER NOT NULL REFERENCES {values}(id) ON DELETE CASCADE,
    file_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (value_id, file_id)
);

CREATE INDEX IF NOT EXISTS {idx_files_file} ON {files}(file_id);

CREATE TABLE IF NOT EXISTS {history} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tracked_entity_id INTEGER NOT NULL,
    item_id INTEGER REFERENCES {items}(id) ON DELETE SET NULL,
    change_type TEXT NOT NULL,
    changed_by INTEGER,
    old_value TEXT,
    new_value TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS {idx_history_entity} ON {history}(tracked_entity_id, created_at);
"#,
            phases = t.phases,
            items = t.items,
            values = t.values,
            files = t.files,
            history = t.history,
            item_types = item_types,
            idx_items_phase = tenant.index("idx_lifecycle_items_phase"),
            idx_values_item = tenant.index("idx_lifecycle_values_item"),
            idx_files_file = tenant.index("idx_lifecycle_value_files_file"),
            idx_history_entity = tenant.index("idx_lifecycle_history_entity"),
        )
    }

    /// DDL dropping the tables, dependents first.
    pub fn drop_tables(tenant: &TenantId) -> String {
        Table::DROP_ORDER
            .iter()
            .map(|table| format!("DROP TABLE IF EXISTS {};\n", tenant.table(*table)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_sql_is_namespaced() {
        let tenant = TenantId::parse("acme").unwrap();
        let sql = Schema::create_tables(&tenant);
        assert_eq!(sql.matches("CREATE TABLE IF NOT EXISTS").count(), 5);
        assert!(sql.contains("\"acme__lifecycle_phases\""));
        assert!(sql.contains("'approval'"));
        assert!(!sql.contains("CREATE TABLE IF NOT EXISTS lifecycle_"));
    }

    #[test]
    fn drop_order_is_dependents_first() {
        let tenant = TenantId::parse("acme").unwrap();
        let sql = Schema::drop_tables(&tenant);
        let history = sql.find("change_history").unwrap();
        let files = sql.find("value_files").unwrap();
        let phases = sql.find("lifecycle_phases").unwrap();
        assert!(history < files && files < phases);
        assert!(sql.lines().all(|l| l.starts_with("DROP TABLE IF EXISTS")));
    }
}
