//! Rows, request payloads and read views

use serde::{Deserialize, Deserializer, Serialize};

use crate::item_type::ItemType;

/// An ordered stage of the tracked workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A typed field belonging to one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub phase_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub is_required: bool,
    pub display_order: i64,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Stored answer for one (tracked entity, item) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemValue {
    pub id: i64,
    pub tracked_entity_id: i64,
    pub item_id: i64,
    pub value_text: Option<String>,
    pub value_json: Option<serde_json::Value>,
    pub updated_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A file linked to a value; bytes and metadata live with the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: i64,
    pub file_id: i64,
    pub created_at: String,
}

/// Append-only audit record of a value-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeHistoryEntry {
    pub id: i64,
    pub tracked_entity_id: i64,
    pub item_id: Option<i64>,
    pub change_type: ChangeType,
    pub changed_by: Option<i64>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    ValueUpdated,
    FileAdded,
    FileRemoved,
    ApprovalDecision,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::ValueUpdated => "value_updated",
            ChangeType::FileAdded => "file_added",
            ChangeType::FileRemoved => "file_removed",
            ChangeType::ApprovalDecision => "approval_decision",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "value_updated" => Some(ChangeType::ValueUpdated),
            "file_added" => Some(ChangeType::FileAdded),
            "file_removed" => Some(ChangeType::FileRemoved),
            "approval_decision" => Some(ChangeType::ApprovalDecision),
            _ => None,
        }
    }
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPhase {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_order: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Partial phase update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhaseUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub display_order: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl PhaseUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.display_order.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub item_type: ItemType,
    #[serde(default)]
    pub is_required: Option<bool>,
    #[serde(default)]
    pub display_order: Option<i64>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Partial item update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub is_required: Option<bool>,
    #[serde(default)]
    pub display_order: Option<i64>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.item_type.is_none()
            && self.is_required.is_none()
            && self.display_order.is_none()
            && self.config.is_none()
            && self.is_active.is_none()
    }
}

/// Body of a value write; a missing or null field clears that column
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ValueInput {
    #[serde(default)]
    pub value_text: Option<String>,
    #[serde(default)]
    pub value_json: Option<serde_json::Value>,
}

/// Distinguishes an absent field (`None`) from an explicit null (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Read views
// ============================================================================

/// A phase with its items, as returned by the config listing
#[derive(Debug, Clone, Serialize)]
pub struct PhaseWithItems {
    #[serde(flatten)]
    pub phase: Phase,
    pub items: Vec<Item>,
}

/// The value part of the field-rendering contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueView {
    pub id: i64,
    pub value_text: Option<String>,
    pub value_json: Option<serde_json::Value>,
    pub updated_by: Option<i64>,
    pub updated_at: String,
    pub files: Vec<FileRef>,
}

/// An item annotated with the entity's value and files
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleItem {
    #[serde(flatten)]
    pub item: Item,
    pub value: Option<ValueView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecyclePhase {
    #[serde(flatten)]
    pub phase: Phase,
    pub items: Vec<LifecycleItem>,
}

/// Full catalogue plus values for one tracked entity
#[derive(Debug, Clone, Serialize)]
pub struct Lifecycle {
    pub tracked_entity_id: i64,
    pub phases: Vec<LifecyclePhase>,
}
