//! Per-request context handed to route handlers

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// Metadata of a file the host already stored for this request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: i64,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
    pub size: Option<u64>,
}

/// Everything a handler may read about the current request.
///
/// Built fresh for every request; handlers keep nothing between calls.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant: TenantId,
    pub user_id: Option<i64>,
    pub organization_id: Option<i64>,
    /// Path parameters, filled in by the dispatcher
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: serde_json::Value,
    pub file: Option<UploadedFile>,
}

impl RequestContext {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            user_id: None,
            organization_id: None,
            params: HashMap::new(),
            query: HashMap::new(),
            body: serde_json::Value::Null,
            file: None,
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_organization(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}
