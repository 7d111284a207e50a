//! Lifecycle Core - tenant-scoped lifecycle tracking engine
//!
//! This crate provides a generic, per-tenant store for tracking entities
//! (models, systems, vendors) through an administrator-defined workflow:
//!
//! - **Tenant**: validated tenant identifiers and the per-tenant table namespace
//! - **Schema**: DDL for the five tenant tables, install/uninstall and the default seed
//! - **Definitions**: ordered phases and typed items, with CRUD and reordering
//! - **Values**: one typed value per (tracked entity, item), upserted
//! - **Files**: attachments linking values to host-owned file records
//! - **History**: append-only audit of value-level changes
//! - **Progress**: per-phase and overall completion statistics
//! - **Routes**: the `METHOD /path/:param` dispatcher that fronts all of the above
//!
//! # Item types
//!
//! ```text
//! text | textarea | classification   → value_text
//! people | checklist | approval      → value_json
//! documents                          → attachments only
//! ```

pub mod context;
pub mod error;
pub mod item_type;
pub mod model;
pub mod progress;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod store;
pub mod tenant;

pub use context::{RequestContext, UploadedFile};
pub use error::{LifecycleError, Result};
pub use item_type::{
    ApprovalConfig, ApprovalEntry, ApprovalStatus, ChecklistEntry, ItemConfig, ItemType,
};
pub use model::{
    ChangeHistoryEntry, ChangeType, FileRef, Item, ItemUpdate, ItemValue, Lifecycle,
    LifecycleItem, LifecyclePhase, NewItem, NewPhase, Phase, PhaseUpdate, PhaseWithItems,
    ValueInput, ValueView,
};
pub use progress::{PhaseProgress, Progress};
pub use routes::{Dispatcher, ErrorReply, Method, Reply};
pub use schema::Schema;
pub use store::{FileAttachment, InstallReport, LifecycleStore};
pub use tenant::{TenantId, MAX_TENANT_LEN};
