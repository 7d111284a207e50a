//! Default phase/item catalogue seeded on first install

use serde_json::json;

use crate::item_type::ItemType;

pub struct SeedPhase {
    pub name: &'static str,
    pub description: &'static str,
    pub items: Vec<SeedItem>,
}

pub struct SeedItem {
    pub name: &'static str,
    pub description: &'static str,
    pub item_type: ItemType,
    pub is_required: bool,
    pub config: serde_json::Value,
}

fn item(
    name: &'static str,
    description: &'static str,
    item_type: ItemType,
    is_required: bool,
    config: serde_json::Value,
) -> SeedItem {
    SeedItem {
        name,
        description,
        item_type,
        is_required,
        config,
    }
}

/// The catalogue a freshly installed tenant starts with.
pub fn default_catalogue() -> Vec<SeedPhase> {
    use ItemType::*;

    vec![
        SeedPhase {
            name: "Registration",
            description: "Record the model and who is accountable for it",
            items: vec![
                item("Model purpose", "What the model is used for", Textarea, true, json!({})),
                item("Model owner", "Person accountable for the model", People, true, json!({ "multiple": false, "role": "owner" })),
                item("Business unit", "Unit operating the model", Text, false, json!({ "max_length": 200 })),
                item(
                    "Risk tier",
                    "Initial risk classification",
                    Classification,
                    true,
                    json!({ "options": ["Low", "Medium", "High", "Critical"] }),
                ),
            ],
        },
        SeedPhase {
            name: "Design & Development",
            description: "Document data, methodology and build artefacts",
            items: vec![
                item("Data sources", "Datasets used for training and evaluation", Textarea, true, json!({})),
                item("Methodology", "Modelling approach and key assumptions", Textarea, false, json!({})),
                item("Design documents", "Architecture and design records", Documents, false, json!({ "accept": [".pdf", ".docx", ".md"] })),
                item("Development team", "People who built the model", People, false, json!({ "multiple": true })),
                item(
                    "Development checklist",
                    "Engineering hygiene before validation",
                    Checklist,
                    false,
                    json!({ "items": ["Code reviewed", "Training data versioned", "Experiments tracked"] }),
                ),
            ],
        },
        SeedPhase {
            name: "Validation",
            description: "Independent review of model quality and fairness",
            items: vec![
                item("Validation report", "Independent validation findings", Documents, true, json!({ "accept": [".pdf"] })),
                item("Performance metrics", "Headline metrics on holdout data", Textarea, true, json!({})),
                item(
                    "Bias and fairness review",
                    "Checks across protected groups",
                    Checklist,
                    true,
                    json!({ "items": ["Protected attributes identified", "Disparate impact measured", "Mitigations documented"] }),
                ),
                item("Validator", "Person who performed validation", People, false, json!({ "multiple": false, "role": "validator" })),
                item("Explainability notes", "How predictions can be explained", Textarea, false, json!({})),
                item("Robustness testing", "Stress and adversarial test evidence", Documents, false, json!({})),
                item(
                    "Validation outcome",
                    "Overall validation result",
                    Classification,
                    true,
                    json!({ "options": ["Passed", "Passed with conditions", "Failed"] }),
                ),
            ],
        },
        SeedPhase {
            name: "Approval",
            description: "Sign-off before the model goes live",
            items: vec![
                item("Approval sign-off", "Approvers and their decisions", Approval, true, json!({ "approvers": [] })),
                item("Approval conditions", "Conditions attached to the approval", Textarea, false, json!({})),
            ],
        },
        SeedPhase {
            name: "Deployment",
            description: "Release into production",
            items: vec![
                item("Deployment date", "Date the model went live", Text, true, json!({ "placeholder": "YYYY-MM-DD" })),
                item("Deployment environment", "Where the model runs", Text, false, json!({})),
                item("Runbook", "Operational runbook", Documents, false, json!({})),
            ],
        },
        SeedPhase {
            name: "Monitoring",
            description: "Ongoing performance and incident tracking",
            items: vec![
                item("Monitoring plan", "Metrics, thresholds and cadence", Textarea, true, json!({})),
                item(
                    "Monitoring checklist",
                    "Recurring monitoring controls",
                    Checklist,
                    false,
                    json!({ "items": ["Drift alerts configured", "Performance dashboard live", "Review cadence agreed"] }),
                ),
                item("Incident log", "Incidents and remediations", Textarea, false, json!({})),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_type::ItemConfig;
    use std::collections::HashSet;

    #[test]
    fn six_phases_with_two_to_seven_items() {
        let catalogue = default_catalogue();
        assert_eq!(catalogue.len(), 6);
        for phase in &catalogue {
            assert!((2..=7).contains(&phase.items.len()), "{}", phase.name);
        }
    }

    #[test]
    fn covers_every_item_type_with_valid_config() {
        let mut seen = HashSet::new();
        for phase in default_catalogue() {
            for item in phase.items {
                ItemConfig::parse(item.item_type, Some(&item.config)).unwrap();
                seen.insert(item.item_type);
            }
        }
        assert_eq!(seen.len(), ItemType::ALL.len());
    }
}
