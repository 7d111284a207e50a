//! SQLite-backed lifecycle store
//!
//! One [`LifecycleStore`] serves every tenant. The tenant is an explicit
//! [`TenantId`] argument on each call and only selects which tables a
//! statement touches; the store keeps no per-tenant state of its own.

mod definitions;
mod files;
mod history;
mod provision;
mod values;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;

use crate::error::{LifecycleError, Result};
use crate::item_type::ItemType;
use crate::model::{FileRef, Item, ItemValue, Phase};
use crate::tenant::TenantId;

pub use files::FileAttachment;
pub use history::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
pub use provision::InstallReport;

/// Default time SQLite waits on a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store for phases, items, values, files and history.
pub struct LifecycleStore {
    conn: Mutex<Connection>,
}

impl LifecycleStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database with an explicit busy timeout.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| LifecycleError::Database(format!("open {}: {}", path.display(), e)))?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LifecycleError::Database(format!("connection mutex poisoned: {}", e)))
    }

    /// Run `f` against the connection, reporting missing tenant tables as
    /// [`LifecycleError::NotInstalled`].
    pub(crate) fn with_conn<T>(
        &self,
        tenant: &TenantId,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let conn = self.lock()?;
        f(&conn).map_err(|e| match e {
            LifecycleError::Database(msg) if msg.contains("no such table") => {
                LifecycleError::NotInstalled(tenant.to_string())
            }
            other => other,
        })
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) const PHASE_COLUMNS: &str =
    "id, name, description, display_order, is_active, created_at, updated_at";

pub(crate) const ITEM_COLUMNS: &str = "id, phase_id, name, description, item_type, is_required, display_order, config, is_active, created_at, updated_at";

pub(crate) const VALUE_COLUMNS: &str =
    "id, tracked_entity_id, item_id, value_text, value_json, updated_by, created_at, updated_at";

pub(crate) fn row_to_phase(row: &rusqlite::Row) -> rusqlite::Result<Phase> {
    Ok(Phase {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        display_order: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
    let item_type_str: String = row.get(4)?;
    let item_type: ItemType = item_type_str
        .parse()
        .map_err(|e: LifecycleError| conversion_error(4, Type::Text, e))?;
    let config_str: String = row.get(7)?;

    Ok(Item {
        id: row.get(0)?,
        phase_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        item_type,
        is_required: row.get(5)?,
        display_order: row.get(6)?,
        config: parse_json_column(7, &config_str)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) fn row_to_value(row: &rusqlite::Row) -> rusqlite::Result<ItemValue> {
    let value_json: Option<String> = row.get(4)?;
    Ok(ItemValue {
        id: row.get(0)?,
        tracked_entity_id: row.get(1)?,
        item_id: row.get(2)?,
        value_text: row.get(3)?,
        value_json: value_json
            .map(|s| parse_json_column(4, &s))
            .transpose()?,
        updated_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRef> {
    Ok(FileRef {
        id: row.get(0)?,
        file_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn parse_json_column(idx: usize, s: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(s).map_err(|e| conversion_error(idx, Type::Text, e))
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

/// `?, ?, ?` for an IN list of `n` parameters
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
