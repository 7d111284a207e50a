//! Tenant identifiers and the per-tenant table namespace
//!
//! A tenant id is the only caller-supplied text that ever becomes part of SQL.
//! It is checked against an allow-list when the [`TenantId`] is built, so a
//! value of this type is always safe to render as a quoted identifier prefix.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{LifecycleError, Result};

/// Longest accepted tenant identifier
pub const MAX_TENANT_LEN: usize = 30;

/// A validated, lowercase tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Validate a raw tenant identifier.
    ///
    /// Accepts 1..=30 ASCII letters, digits or underscores. SQLite table names
    /// are case-insensitive, so the id is folded to lowercase to keep `Acme`
    /// and `acme` from sharing tables under two spellings.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(LifecycleError::InvalidTenant("empty".to_string()));
        }
        if raw.len() > MAX_TENANT_LEN {
            return Err(LifecycleError::InvalidTenant(format!(
                "longer than {} characters",
                MAX_TENANT_LEN
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(LifecycleError::InvalidTenant(format!(
                "{:?} contains characters outside [A-Za-z0-9_]",
                raw
            )));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted table name for this tenant, e.g. `"acme__lifecycle_items"`.
    pub fn table(&self, table: Table) -> String {
        format!("\"{}__{}\"", self.0, table.suffix())
    }

    /// Quoted index name for this tenant.
    pub fn index(&self, name: &str) -> String {
        format!("\"{}__{}\"", self.0, name)
    }

    /// Unquoted table name, as stored in `sqlite_master`.
    pub fn raw_table(&self, table: Table) -> String {
        format!("{}__{}", self.0, table.suffix())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for TenantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// The five tenant-scoped tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Phases,
    Items,
    Values,
    Files,
    History,
}

impl Table {
    /// Drop order: dependents before the tables they reference.
    pub const DROP_ORDER: [Table; 5] = [
        Table::History,
        Table::Files,
        Table::Values,
        Table::Items,
        Table::Phases,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Table::Phases => "lifecycle_phases",
            Table::Items => "lifecycle_items",
            Table::Values => "lifecycle_values",
            Table::Files => "lifecycle_value_files",
            Table::History => "lifecycle_change_history",
        }
    }
}

/// Table names of one tenant, rendered once per statement.
pub(crate) struct Tables {
    pub phases: String,
    pub items: String,
    pub values: String,
    pub files: String,
    pub history: String,
}

impl Tables {
    pub(crate) fn for_tenant(tenant: &TenantId) -> Self {
        Self {
            phases: tenant.table(Table::Phases),
            items: tenant.table(Table::Items),
            values: tenant.table(Table::Values),
            files: tenant.table(Table::Files),
            history: tenant.table(Table::History),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifier_characters() {
        assert!(TenantId::parse("acme").is_ok());
        assert!(TenantId::parse("tenant_42").is_ok());
        assert!(TenantId::parse(&"a".repeat(30)).is_ok());
    }

    #[test]
    fn rejects_injection_characters() {
        for raw in ["acme'", "acme;drop", "acme corp", "a\"b", "a-b", "a.b", "ténant"] {
            let err = TenantId::parse(raw).unwrap_err();
            assert!(matches!(err, LifecycleError::InvalidTenant(_)), "{raw}");
        }
    }

    #[test]
    fn rejects_empty_and_long() {
        assert!(TenantId::parse("").is_err());
        assert!(TenantId::parse(&"a".repeat(31)).is_err());
    }

    #[test]
    fn folds_case_and_renders_quoted_tables() {
        let tenant = TenantId::parse("Acme_1").unwrap();
        assert_eq!(tenant.as_str(), "acme_1");
        assert_eq!(tenant.table(Table::Phases), "\"acme_1__lifecycle_phases\"");
        assert_eq!(tenant.raw_table(Table::Files), "acme_1__lifecycle_value_files");
    }
}
