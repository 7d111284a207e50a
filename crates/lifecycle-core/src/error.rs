//! Error types for lifecycle-core

use thiserror::Error;

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Main error type for lifecycle operations
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Tenant identifier failed the allow-list check
    #[error("Invalid tenant identifier: {0}")]
    InvalidTenant(String),

    /// Request payload, config or id failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// PATCH-style update carried no recognized field
    #[error("No fields to update")]
    NoFieldsToUpdate,

    /// Row not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// No route matched the request
    #[error("No route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// Tenant tables have not been provisioned
    #[error("Lifecycle tables are not installed for tenant {0}")]
    NotInstalled(String),

    /// Provisioning failed
    #[error("Installation failed: {0}")]
    Install(String),

    /// Deprovisioning failed
    #[error("Uninstallation failed: {0}")]
    Uninstall(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LifecycleError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP status code the route layer reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            LifecycleError::InvalidTenant(_)
            | LifecycleError::Validation(_)
            | LifecycleError::NoFieldsToUpdate => 400,
            LifecycleError::NotFound { .. } | LifecycleError::RouteNotFound { .. } => 404,
            LifecycleError::NotInstalled(_) => 409,
            LifecycleError::Install(_)
            | LifecycleError::Uninstall(_)
            | LifecycleError::Database(_)
            | LifecycleError::Serialization(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(err: rusqlite::Error) -> Self {
        LifecycleError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for LifecycleError {
    fn from(err: serde_json::Error) -> Self {
        LifecycleError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LifecycleError::not_found("Phase", 42);
        assert_eq!(err.to_string(), "Phase not found: 42");

        let err = LifecycleError::Install("disk full".into());
        assert_eq!(err.to_string(), "Installation failed: disk full");

        let err = LifecycleError::Uninstall("locked".into());
        assert!(err.to_string().starts_with("Uninstallation failed:"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(LifecycleError::NoFieldsToUpdate.status_code(), 400);
        assert_eq!(LifecycleError::InvalidTenant("x;".into()).status_code(), 400);
        assert_eq!(LifecycleError::not_found("Item", 1).status_code(), 404);
        assert_eq!(LifecycleError::Database("boom".into()).status_code(), 500);
    }
}
