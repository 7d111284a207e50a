//! The closed set of item types and their config/value shapes
//!
//! `item_type` decides what an item's `config` looks like and what its stored
//! value may contain. Both are checked here, at the boundary, so the rest of
//! the crate can treat `config` and `value_json` as already-valid JSON.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, Result};

/// Kind of field an item renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Text,
    Textarea,
    Documents,
    People,
    Classification,
    Checklist,
    Approval,
}

impl ItemType {
    pub const ALL: [ItemType; 7] = [
        ItemType::Text,
        ItemType::Textarea,
        ItemType::Documents,
        ItemType::People,
        ItemType::Classification,
        ItemType::Checklist,
        ItemType::Approval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Text => "text",
            ItemType::Textarea => "textarea",
            ItemType::Documents => "documents",
            ItemType::People => "people",
            ItemType::Classification => "classification",
            ItemType::Checklist => "checklist",
            ItemType::Approval => "approval",
        }
    }

    /// Whether the value lives in `value_json` rather than `value_text`
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            ItemType::People | ItemType::Checklist | ItemType::Approval
        )
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        ItemType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LifecycleError::Validation(format!("unknown item_type: {}", s)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Accepted file extensions or mime types, informational for the UI
    pub accept: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeopleConfig {
    pub multiple: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistConfig {
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Fixed approver user ids; empty means any user may be listed
    pub approvers: Vec<i64>,
}

/// Type-specific item configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ItemConfig {
    Text(TextConfig),
    Textarea(TextConfig),
    Documents(DocumentsConfig),
    People(PeopleConfig),
    Classification(ClassificationConfig),
    Checklist(ChecklistConfig),
    Approval(ApprovalConfig),
}

impl ItemConfig {
    /// Parse and normalize `config` for the given type. `None` or JSON null
    /// yields the type's default config.
    pub fn parse(item_type: ItemType, config: Option<&serde_json::Value>) -> Result<Self> {
        let raw = match config {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
            Some(v @ serde_json::Value::Object(_)) => v.clone(),
            Some(other) => {
                return Err(LifecycleError::Validation(format!(
                    "config for {} item must be an object, got {}",
                    item_type, other
                )))
            }
        };

        let invalid =
            |e: serde_json::Error| LifecycleError::Validation(format!("{} config: {}", item_type, e));

        let config = match item_type {
            ItemType::Text => ItemConfig::Text(serde_json::from_value(raw).map_err(invalid)?),
            ItemType::Textarea => {
                ItemConfig::Textarea(serde_json::from_value(raw).map_err(invalid)?)
            }
            ItemType::Documents => {
                ItemConfig::Documents(serde_json::from_value(raw).map_err(invalid)?)
            }
            ItemType::People => ItemConfig::People(serde_json::from_value(raw).map_err(invalid)?),
            ItemType::Classification => {
                let c: ClassificationConfig = serde_json::from_value(raw).map_err(invalid)?;
                ensure_unique(&c.options, "classification options")?;
                ItemConfig::Classification(c)
            }
            ItemType::Checklist => {
                let c: ChecklistConfig = serde_json::from_value(raw).map_err(invalid)?;
                ensure_unique(&c.items, "checklist items")?;
                ItemConfig::Checklist(c)
            }
            ItemType::Approval => {
                let c: ApprovalConfig = serde_json::from_value(raw).map_err(invalid)?;
                ensure_unique(&c.approvers, "approvers")?;
                ItemConfig::Approval(c)
            }
        };
        Ok(config)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Object(Default::default()))
    }

    /// Check a value payload against this config.
    ///
    /// Scalar types keep their answer in `value_text`, structured types in
    /// `value_json`; the other column must be empty. Both empty clears the
    /// value and is always accepted.
    pub fn validate_value(
        &self,
        value_text: Option<&str>,
        value_json: Option<&serde_json::Value>,
    ) -> Result<()> {
        let item_type = self.item_type();
        if item_type.is_structured() && value_text.is_some() {
            return Err(LifecycleError::Validation(format!(
                "{} items store their value in value_json",
                item_type
            )));
        }
        if !item_type.is_structured() && value_json.is_some() {
            return Err(LifecycleError::Validation(format!(
                "{} items store their value in value_text",
                item_type
            )));
        }

        match self {
            ItemConfig::Text(c) | ItemConfig::Textarea(c) => {
                if let (Some(max), Some(text)) = (c.max_length, value_text) {
                    if text.chars().count() > max {
                        return Err(LifecycleError::Validation(format!(
                            "value exceeds {} characters",
                            max
                        )));
                    }
                }
            }
            ItemConfig::Documents(_) => {}
            ItemConfig::Classification(c) => {
                if let Some(text) = value_text {
                    if !c.options.is_empty() && !c.options.iter().any(|o| o == text) {
                        return Err(LifecycleError::Validation(format!(
                            "{:?} is not one of the classification options",
                            text
                        )));
                    }
                }
            }
            ItemConfig::People(c) => {
                if let Some(json) = value_json {
                    let people: Vec<i64> = parse_payload(json, "people")?;
                    ensure_unique(&people, "people")?;
                    if !c.multiple && people.len() > 1 {
                        return Err(LifecycleError::Validation(
                            "only one person may be selected".to_string(),
                        ));
                    }
                }
            }
            ItemConfig::Checklist(c) => {
                if let Some(json) = value_json {
                    let entries: Vec<ChecklistEntry> = parse_payload(json, "checklist")?;
                    let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
                    ensure_unique(&labels, "checklist labels")?;
                    if !c.items.is_empty() {
                        if let Some(unknown) = labels.iter().find(|l| !c.items.iter().any(|i| i == *l)) {
                            return Err(LifecycleError::Validation(format!(
                                "{:?} is not a checklist item",
                                unknown
                            )));
                        }
                    }
                }
            }
            ItemConfig::Approval(c) => {
                if let Some(json) = value_json {
                    let entries = parse_approvals(json)?;
                    if !c.approvers.is_empty() {
                        if let Some(entry) =
                            entries.iter().find(|e| !c.approvers.contains(&e.approver_id))
                        {
                            return Err(LifecycleError::Validation(format!(
                                "user {} is not an approver for this item",
                                entry.approver_id
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            ItemConfig::Text(_) => ItemType::Text,
            ItemConfig::Textarea(_) => ItemType::Textarea,
            ItemConfig::Documents(_) => ItemType::Documents,
            ItemConfig::People(_) => ItemType::People,
            ItemConfig::Classification(_) => ItemType::Classification,
            ItemConfig::Checklist(_) => ItemType::Checklist,
            ItemConfig::Approval(_) => ItemType::Approval,
        }
    }
}

/// One row of a checklist value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub label: String,
    #[serde(default)]
    pub checked: bool,
}

/// Approval state of one approver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

/// One approver entry inside an approval value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEntry {
    pub approver_id: i64,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// An approver reaching a terminal status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalDecision {
    pub approver_id: i64,
    pub status: ApprovalStatus,
    pub date: Option<String>,
}

/// Parse an approval payload, rejecting duplicate approvers.
pub fn parse_approvals(json: &serde_json::Value) -> Result<Vec<ApprovalEntry>> {
    let entries: Vec<ApprovalEntry> = parse_payload(json, "approval")?;
    let ids: Vec<i64> = entries.iter().map(|e| e.approver_id).collect();
    ensure_unique(&ids, "approvers")?;
    Ok(entries)
}

/// Compare the stored approval list with an incoming one.
///
/// Each approver moves on its own from `pending` to `approved` or `rejected`
/// and stays there, date included. Approvers who already decided can not be
/// dropped from the list. Returns the decisions the incoming list introduces.
pub fn approval_transitions(
    previous: &[ApprovalEntry],
    next: &[ApprovalEntry],
) -> Result<Vec<ApprovalDecision>> {
    for old in previous.iter().filter(|e| e.status.is_terminal()) {
        match next.iter().find(|e| e.approver_id == old.approver_id) {
            None => {
                return Err(LifecycleError::Validation(format!(
                    "approver {} already {} and can not be removed",
                    old.approver_id,
                    old.status.as_str()
                )))
            }
            Some(new) if new.status != old.status || new.date != old.date => {
                return Err(LifecycleError::Validation(format!(
                    "approver {} already {}; decision is final",
                    old.approver_id,
                    old.status.as_str()
                )))
            }
            Some(_) => {}
        }
    }

    let decisions = next
        .iter()
        .filter(|e| e.status.is_terminal())
        .filter(|e| {
            !previous
                .iter()
                .any(|old| old.approver_id == e.approver_id && old.status.is_terminal())
        })
        .map(|e| ApprovalDecision {
            approver_id: e.approver_id,
            status: e.status,
            date: e.date.clone(),
        })
        .collect();
    Ok(decisions)
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    json: &serde_json::Value,
    what: &str,
) -> Result<T> {
    serde_json::from_value(json.clone())
        .map_err(|e| LifecycleError::Validation(format!("invalid {} value: {}", what, e)))
}

fn ensure_unique<T: std::hash::Hash + Eq + fmt::Debug>(values: &[T], what: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for v in values {
        if !seen.insert(v) {
            return Err(LifecycleError::Validation(format!(
                "duplicate entry in {}: {:?}",
                what, v
            )));
        }
    }
    Ok(())
}
