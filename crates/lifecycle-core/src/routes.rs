//! Route dispatcher: `METHOD /path/:param` patterns mapped onto store calls
//!
//! The table is fixed at compile time and matched in order, so literal
//! segments win over parameters by listing the literal route first
//! (`/phases/reorder` before `/phases/:id`).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::context::RequestContext;
use crate::error::{LifecycleError, Result};
use crate::model::{ItemUpdate, NewItem, NewPhase, PhaseUpdate, ValueInput};
use crate::store::{LifecycleStore, DEFAULT_HISTORY_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(LifecycleError::RouteNotFound {
                method: s.to_string(),
                path: String::new(),
            }),
        }
    }
}

/// Successful handler output: the HTTP status and the `data` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub data: serde_json::Value,
}

impl Reply {
    fn ok(data: impl Serialize) -> Result<Self> {
        Self::with_status(200, data)
    }

    fn created(data: impl Serialize) -> Result<Self> {
        Self::with_status(201, data)
    }

    fn with_status(status: u16, data: impl Serialize) -> Result<Self> {
        Ok(Self {
            status,
            data: serde_json::to_value(data)?,
        })
    }
}

/// Failed handler output, `{status, error}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    pub status: u16,
    pub error: String,
}

impl From<&LifecycleError> for ErrorReply {
    fn from(err: &LifecycleError) -> Self {
        Self {
            status: err.status_code(),
            error: err.to_string(),
        }
    }
}

pub type Handler = fn(&LifecycleStore, &RequestContext) -> Result<Reply>;

const ROUTES: &[(Method, &str, Handler)] = &[
    (Method::Get, "/config", get_config),
    (Method::Post, "/phases", create_phase),
    (Method::Put, "/phases/reorder", reorder_phases),
    (Method::Put, "/phases/:id", update_phase),
    (Method::Delete, "/phases/:id", delete_phase),
    (Method::Post, "/phases/:phaseId/items", create_item),
    (Method::Put, "/phases/:phaseId/items/reorder", reorder_items),
    (Method::Put, "/items/:id", update_item),
    (Method::Delete, "/items/:id", delete_item),
    (Method::Get, "/models/:id/lifecycle", get_lifecycle),
    (Method::Get, "/models/:id/lifecycle/progress", get_progress),
    (Method::Get, "/models/:id/lifecycle/history", get_history),
    (Method::Put, "/models/:id/lifecycle/items/:itemId", upsert_value),
    (Method::Post, "/models/:id/lifecycle/items/:itemId/files", add_file),
    (
        Method::Delete,
        "/models/:id/lifecycle/items/:itemId/files/:fileId",
        remove_file,
    ),
    (Method::Post, "/install", install),
    (Method::Post, "/uninstall", uninstall),
];

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
}

struct Route {
    method: Method,
    pattern: &'static str,
    segments: Vec<Segment>,
    handler: Handler,
}

impl Route {
    fn new(method: Method, pattern: &'static str, handler: Handler) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name),
                None => Segment::Literal(s),
            })
            .collect();
        Self {
            method,
            pattern,
            segments,
            handler,
        }
    }

    fn matches(&self, method: Method, parts: &[&str]) -> Option<HashMap<String, String>> {
        if self.method != method || self.segments.len() != parts.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert((*name).to_string(), (*part).to_string());
                }
            }
        }
        Some(params)
    }
}

/// The fixed route table
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            routes: ROUTES
                .iter()
                .map(|(method, pattern, handler)| Route::new(*method, *pattern, *handler))
                .collect(),
        }
    }

    /// `(method, pattern)` for every registered route, in match order
    pub fn patterns(&self) -> impl Iterator<Item = (Method, &'static str)> + '_ {
        self.routes.iter().map(|r| (r.method, r.pattern))
    }

    /// Match `path` and run its handler with the extracted path params.
    pub fn dispatch(
        &self,
        store: &LifecycleStore,
        method: Method,
        path: &str,
        mut ctx: RequestContext,
    ) -> Result<Reply> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for route in &self.routes {
            if let Some(params) = route.matches(method, &parts) {
                tracing::debug!(route = route.pattern, %method, "route matched");
                ctx.params = params;
                return (route.handler)(store, &ctx);
            }
        }

        Err(LifecycleError::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Request helpers ====================

fn id_param(ctx: &RequestContext, name: &str) -> Result<i64> {
    let raw = ctx
        .param(name)
        .ok_or_else(|| LifecycleError::Validation(format!("missing path parameter {}", name)))?;
    raw.parse::<i64>()
        .map_err(|_| LifecycleError::Validation(format!("{} must be an integer, got {:?}", name, raw)))
}

/// Deserialize the JSON body; an absent body reads as `{}`.
fn body<T: DeserializeOwned>(ctx: &RequestContext) -> Result<T> {
    let value = match &ctx.body {
        serde_json::Value::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(value)
        .map_err(|e| LifecycleError::Validation(format!("invalid request body: {}", e)))
}

fn flag(ctx: &RequestContext, name: &str) -> bool {
    matches!(ctx.query_param(name), Some("true") | Some("1"))
}

/// Reorder lists arrive as `{ids: [...]}` or `{order: [...]}`.
fn reorder_ids(ctx: &RequestContext) -> Result<Vec<i64>> {
    let list = ctx
        .body
        .get("ids")
        .or_else(|| ctx.body.get("order"))
        .ok_or_else(|| LifecycleError::Validation("body must contain ids".to_string()))?;
    serde_json::from_value(list.clone())
        .map_err(|_| LifecycleError::Validation("ids must be an array of integers".to_string()))
}

// ==================== Handlers ====================

fn get_config(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    Reply::ok(store.list_config(&ctx.tenant, flag(ctx, "includeInactive"))?)
}

fn create_phase(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let new: NewPhase = body(ctx)?;
    Reply::created(store.create_phase(&ctx.tenant, new)?)
}

fn reorder_phases(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let ids = reorder_ids(ctx)?;
    Reply::ok(store.reorder_phases(&ctx.tenant, &ids)?)
}

fn update_phase(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let id = id_param(ctx, "id")?;
    let update: PhaseUpdate = body(ctx)?;
    Reply::ok(store.update_phase(&ctx.tenant, id, update)?)
}

fn delete_phase(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let id = id_param(ctx, "id")?;
    store.delete_phase(&ctx.tenant, id)?;
    Reply::ok(json!({ "id": id, "deleted": true }))
}

fn create_item(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let phase_id = id_param(ctx, "phaseId")?;
    let new: NewItem = body(ctx)?;
    Reply::created(store.create_item(&ctx.tenant, phase_id, new)?)
}

fn reorder_items(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let phase_id = id_param(ctx, "phaseId")?;
    let ids = reorder_ids(ctx)?;
    Reply::ok(store.reorder_items(&ctx.tenant, phase_id, &ids)?)
}

fn update_item(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let id = id_param(ctx, "id")?;
    let update: ItemUpdate = body(ctx)?;
    Reply::ok(store.update_item(&ctx.tenant, id, update)?)
}

fn delete_item(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let id = id_param(ctx, "id")?;
    store.delete_item(&ctx.tenant, id)?;
    Reply::ok(json!({ "id": id, "deleted": true }))
}

fn get_lifecycle(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let entity = id_param(ctx, "id")?;
    Reply::ok(store.get_lifecycle(&ctx.tenant, entity)?)
}

fn get_progress(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let entity = id_param(ctx, "id")?;
    Reply::ok(store.get_progress(&ctx.tenant, entity)?)
}

fn get_history(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let entity = id_param(ctx, "id")?;
    let limit = match ctx.query_param("limit") {
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            LifecycleError::Validation(format!("limit must be a positive integer, got {:?}", raw))
        })?,
        None => DEFAULT_HISTORY_LIMIT,
    };
    Reply::ok(store.list_history(&ctx.tenant, entity, limit)?)
}

fn upsert_value(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let entity = id_param(ctx, "id")?;
    let item = id_param(ctx, "itemId")?;
    let input: ValueInput = body(ctx)?;
    Reply::ok(store.upsert_value(&ctx.tenant, entity, item, input, ctx.user_id)?)
}

fn add_file(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let entity = id_param(ctx, "id")?;
    let item = id_param(ctx, "itemId")?;
    let file_id = match ctx.body.get("file_id") {
        Some(raw) => raw
            .as_i64()
            .ok_or_else(|| LifecycleError::Validation("file_id must be an integer".to_string()))?,
        None => ctx
            .file
            .as_ref()
            .map(|f| f.id)
            .ok_or_else(|| LifecycleError::Validation("no file_id and no uploaded file".to_string()))?,
    };

    let attachment = store.add_file(&ctx.tenant, entity, item, file_id, ctx.user_id)?;
    let status = if attachment.created { 201 } else { 200 };
    Reply::with_status(status, attachment)
}

fn remove_file(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    let entity = id_param(ctx, "id")?;
    let item = id_param(ctx, "itemId")?;
    let file_id = id_param(ctx, "fileId")?;
    store.remove_file(&ctx.tenant, entity, item, file_id, ctx.user_id)?;
    Reply::ok(json!({ "file_id": file_id, "deleted": true }))
}

fn install(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    Reply::ok(store.install(&ctx.tenant)?)
}

fn uninstall(store: &LifecycleStore, ctx: &RequestContext) -> Result<Reply> {
    store.uninstall(&ctx.tenant)?;
    Reply::ok(json!({ "tenant": ctx.tenant, "uninstalled": true }))
}
