//! Aggregate invariants checked before a report is rendered.

use crate::core::aggregate::{Aggregate, CodeField, Slot};
use crate::core::naming::{is_reserved_theme_label, is_reserved_view_label};

/// Check invariants the passes are expected to uphold:
/// - No reserved utility label among themes or views
/// - Collected code blocks never hold an empty string
/// - Validation blocks never hold empty text
/// - `is_dynamic` is absent exactly when `kind` is absent
pub fn validate_aggregate(aggregate: &Aggregate) -> Vec<String> {
    let mut errors = Vec::new();
    for (model_name, model) in &aggregate.models {
        if model.catalog.kind.is_some() != model.catalog.is_dynamic.is_some() {
            errors.push(format!("{model_name}: is_dynamic must be set iff kind is set"));
        }
        for (theme_name, theme) in &model.themes {
            let path = format!("{model_name}/{theme_name}");
            if is_reserved_theme_label(theme_name) {
                errors.push(format!("{path}: reserved theme label"));
            }
            for view in &theme.views {
                if is_reserved_view_label(view) {
                    errors.push(format!("{path}: reserved view label '{view}'"));
                }
            }
            if let Some(Slot::Collected(code)) = &theme.code {
                for field in CodeField::ALL {
                    if code.get(field).trim().is_empty() {
                        errors.push(format!("{path}: code block {field:?} is empty"));
                    }
                }
            }
            if let Some(Slot::Collected(workflow)) = &theme.workflow {
                for state in &workflow.states {
                    for (field, text) in &state.validation_blocks {
                        if text.trim().is_empty() {
                            errors.push(format!(
                                "{path}/{}: validation block {field:?} is empty",
                                state.display_name
                            ));
                        }
                    }
                }
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{
        CodeBlocks, ModelCatalog, ModelEntry, StateEntry, ThemeEntry, ValidationField,
        WorkflowEntry,
    };

    fn aggregate_with(theme_name: &str, theme: ThemeEntry) -> Aggregate {
        let mut aggregate = Aggregate::default();
        aggregate.insert_model(
            "Grants".to_string(),
            ModelEntry {
                catalog: ModelCatalog::new("grants", Some("Grant".to_string()), "MacModelTypeDyn"),
                themes: [(theme_name.to_string(), theme)].into_iter().collect(),
                methods: None,
            },
        );
        aggregate
    }

    #[test]
    fn clean_aggregate_has_no_errors() {
        let theme = ThemeEntry {
            views: vec!["Gallery".to_string()],
            code: Some(Slot::Collected(CodeBlocks::from_fields(|_| None))),
            workflow: None,
        };
        assert!(validate_aggregate(&aggregate_with("Decision", theme)).is_empty());
    }

    #[test]
    fn reports_reserved_labels_and_empty_blocks() {
        let mut state = StateEntry::default();
        state
            .validation_blocks
            .insert(ValidationField::CurrentAfterEnter, String::new());
        let mut code = CodeBlocks::from_fields(|_| None);
        code.draft_after_create = String::new();
        let theme = ThemeEntry {
            views: vec!["New View".to_string()],
            code: Some(Slot::Collected(code)),
            workflow: Some(Slot::Collected(WorkflowEntry {
                workflow_id: None,
                states: vec![state],
                skipped: Vec::new(),
            })),
        };

        let errors = validate_aggregate(&aggregate_with("Export", theme));
        assert!(errors.iter().any(|err| err.contains("reserved theme label")));
        assert!(errors.iter().any(|err| err.contains("reserved view label")));
        assert!(errors.iter().any(|err| err.contains("DraftAfterCreate")));
        assert!(errors.iter().any(|err| err.contains("CurrentAfterEnter")));
    }
}
