//! In-memory snapshot of the discovered admin configuration.
//!
//! The aggregate is built by the catalog pass and enriched in place by the
//! optional passes. Each pass owns exactly one slot:
//!
//! - catalog: [`ModelCatalog`], the theme keys and [`ThemeEntry::views`]
//! - code blocks: [`ThemeEntry::code`]
//! - workflow: [`ThemeEntry::workflow`]
//! - methods: [`ModelEntry::methods`]
//!
//! Passes read the skeleton through the key listing helpers and write back
//! through the `record_*` methods, which never touch another pass's slot.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::naming::is_dynamic_kind;
use crate::core::skip::{SkipReason, Skipped};

/// Placeholder stored for script blocks that are empty or absent.
pub const NOT_CONFIGURED: &str = "N/A";

/// Model display name → model entry, in UI traversal order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub models: IndexMap<String, ModelEntry>,
    /// Models the catalog pass could not read at all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub catalog: ModelCatalog,
    pub themes: IndexMap<String, ThemeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Slot<MethodList>>,
}

/// Catalog-owned facts about a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    /// Identifier the display name was derived from (the container `id`).
    pub raw_id: String,
    /// Type tag from the `model_theme[model_type]` link; `None` means unknown/static.
    pub kind: Option<String>,
    /// `None` iff `kind` is `None`.
    pub is_dynamic: Option<bool>,
    /// Themes the catalog pass could not read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Skipped>,
}

impl ModelCatalog {
    pub fn new(raw_id: impl Into<String>, kind: Option<String>, dynamic_prefix: &str) -> Self {
        let is_dynamic = is_dynamic_kind(kind.as_deref(), dynamic_prefix);
        Self {
            raw_id: raw_id.into(),
            kind,
            is_dynamic,
            skipped: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeEntry {
    /// View labels in encounter order; duplicates are preserved.
    pub views: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Slot<CodeBlocks>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Slot<WorkflowEntry>>,
}

/// Outcome of an optional pass for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Slot<T> {
    Collected(T),
    Skipped(SkipReason),
}

impl<T> Slot<T> {
    pub fn collected(&self) -> Option<&T> {
        match self {
            Slot::Collected(value) => Some(value),
            Slot::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Slot::Collected(_) => None,
            Slot::Skipped(reason) => Some(reason),
        }
    }
}

impl<T> From<Result<T, SkipReason>> for Slot<T> {
    fn from(result: Result<T, SkipReason>) -> Self {
        match result {
            Ok(value) => Slot::Collected(value),
            Err(reason) => Slot::Skipped(reason),
        }
    }
}

/// The four theme script blocks shown in the configuration modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeField {
    CurrentBeforeCreate,
    DraftBeforeCreate,
    CurrentAfterCreate,
    DraftAfterCreate,
}

impl CodeField {
    pub const ALL: [CodeField; 4] = [
        CodeField::CurrentBeforeCreate,
        CodeField::DraftBeforeCreate,
        CodeField::CurrentAfterCreate,
        CodeField::DraftAfterCreate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CodeField::CurrentBeforeCreate => "Before Create (current)",
            CodeField::DraftBeforeCreate => "Before Create (draft)",
            CodeField::CurrentAfterCreate => "After Create (current)",
            CodeField::DraftAfterCreate => "After Create (draft)",
        }
    }
}

/// Always exactly four keys; empty or missing scripts hold [`NOT_CONFIGURED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlocks {
    pub current_before_create: String,
    pub draft_before_create: String,
    pub current_after_create: String,
    pub draft_after_create: String,
}

impl CodeBlocks {
    /// Build from per-field extracted text, filling gaps with the sentinel.
    pub fn from_fields(mut extract: impl FnMut(CodeField) -> Option<String>) -> Self {
        let mut take = |field| script_or_sentinel(extract(field));
        Self {
            current_before_create: take(CodeField::CurrentBeforeCreate),
            draft_before_create: take(CodeField::DraftBeforeCreate),
            current_after_create: take(CodeField::CurrentAfterCreate),
            draft_after_create: take(CodeField::DraftAfterCreate),
        }
    }

    pub fn get(&self, field: CodeField) -> &str {
        match field {
            CodeField::CurrentBeforeCreate => &self.current_before_create,
            CodeField::DraftBeforeCreate => &self.draft_before_create,
            CodeField::CurrentAfterCreate => &self.current_after_create,
            CodeField::DraftAfterCreate => &self.draft_after_create,
        }
    }

    pub fn configured_count(&self) -> usize {
        CodeField::ALL
            .iter()
            .filter(|field| self.get(**field) != NOT_CONFIGURED)
            .count()
    }
}

fn script_or_sentinel(text: Option<String>) -> String {
    match text {
        Some(text) if !text.trim().is_empty() => text,
        _ => NOT_CONFIGURED.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEntry {
    /// Parsed from the "new event" link, when present.
    pub workflow_id: Option<u64>,
    pub states: Vec<StateEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Skipped>,
}

/// Script blocks attached to a workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationField {
    CurrentBeforeValidation,
    DraftBeforeValidation,
    CurrentAfterEnter,
    DraftAfterEnter,
}

impl ValidationField {
    pub const ALL: [ValidationField; 4] = [
        ValidationField::CurrentBeforeValidation,
        ValidationField::DraftBeforeValidation,
        ValidationField::CurrentAfterEnter,
        ValidationField::DraftAfterEnter,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ValidationField::CurrentBeforeValidation => "Before Validation (current)",
            ValidationField::DraftBeforeValidation => "Before Validation (draft)",
            ValidationField::CurrentAfterEnter => "After Enter (current)",
            ValidationField::DraftAfterEnter => "After Enter (draft)",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub display_name: String,
    pub internal_name: String,
    /// Sparse: only fields with non-empty text are present.
    pub validation_blocks: BTreeMap<ValidationField, String>,
    pub actions: Vec<ActionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Skipped>,
}

impl StateEntry {
    /// Store a validation block, dropping empty text.
    pub fn set_validation_block(&mut self, field: ValidationField, text: Option<String>) {
        if let Some(text) = text.filter(|text| !text.trim().is_empty()) {
            self.validation_blocks.insert(field, text);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub name: String,
    pub to_state: Option<String>,
    pub guard_instructions: Option<String>,
    pub draft_guard: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodList {
    pub methods: Vec<MethodEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Skipped>,
}

/// Bodies default to the empty string, not the sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub name: String,
    pub method_type: String,
    pub current_code: String,
    pub draft_code: String,
}

impl Aggregate {
    /// Insert a catalog model. A literal duplicate name replaces the earlier entry.
    pub fn insert_model(&mut self, name: String, entry: ModelEntry) {
        self.models.insert(name, entry);
    }

    pub fn model(&self, name: &str) -> Option<&ModelEntry> {
        self.models.get(name)
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn theme_names(&self, model: &str) -> Vec<String> {
        self.models
            .get(model)
            .map(|entry| entry.themes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every (model, theme) pair in traversal order.
    pub fn theme_keys(&self) -> Vec<(String, String)> {
        self.models
            .iter()
            .flat_map(|(model, entry)| {
                entry
                    .themes
                    .keys()
                    .map(move |theme| (model.clone(), theme.clone()))
            })
            .collect()
    }

    pub fn record_code(&mut self, model: &str, theme: &str, slot: Slot<CodeBlocks>) -> bool {
        match self.theme_mut(model, theme) {
            Some(entry) => {
                entry.code = Some(slot);
                true
            }
            None => false,
        }
    }

    pub fn record_workflow(&mut self, model: &str, theme: &str, slot: Slot<WorkflowEntry>) -> bool {
        match self.theme_mut(model, theme) {
            Some(entry) => {
                entry.workflow = Some(slot);
                true
            }
            None => false,
        }
    }

    pub fn record_methods(&mut self, model: &str, slot: Slot<MethodList>) -> bool {
        match self.models.get_mut(model) {
            Some(entry) => {
                entry.methods = Some(slot);
                true
            }
            None => false,
        }
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn theme_count(&self) -> usize {
        self.models.values().map(|model| model.themes.len()).sum()
    }

    pub fn view_count(&self) -> usize {
        self.models
            .values()
            .flat_map(|model| model.themes.values())
            .map(|theme| theme.views.len())
            .sum()
    }

    fn theme_mut(&mut self, model: &str, theme: &str) -> Option<&mut ThemeEntry> {
        self.models.get_mut(model)?.themes.get_mut(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(raw_id: &str, themes: &[&str]) -> ModelEntry {
        ModelEntry {
            catalog: ModelCatalog::new(raw_id, None, "MacModelTypeDyn"),
            themes: themes
                .iter()
                .map(|name| (name.to_string(), ThemeEntry::default()))
                .collect(),
            methods: None,
        }
    }

    #[test]
    fn code_blocks_fill_empty_and_missing_with_sentinel() {
        let blocks = CodeBlocks::from_fields(|field| match field {
            CodeField::CurrentBeforeCreate => Some("model.state = 'new'".to_string()),
            CodeField::DraftBeforeCreate => Some("   ".to_string()),
            CodeField::CurrentAfterCreate => Some(String::new()),
            CodeField::DraftAfterCreate => None,
        });
        assert_eq!(blocks.current_before_create, "model.state = 'new'");
        assert_eq!(blocks.draft_before_create, NOT_CONFIGURED);
        assert_eq!(blocks.current_after_create, NOT_CONFIGURED);
        assert_eq!(blocks.draft_after_create, NOT_CONFIGURED);
        assert_eq!(blocks.configured_count(), 1);

        let json = serde_json::to_value(&blocks).expect("serialize");
        assert_eq!(json.as_object().map(|map| map.len()), Some(4));
    }

    #[test]
    fn validation_blocks_stay_sparse() {
        let mut state = StateEntry::default();
        state.set_validation_block(ValidationField::CurrentBeforeValidation, Some(String::new()));
        state.set_validation_block(ValidationField::DraftAfterEnter, None);
        state.set_validation_block(ValidationField::CurrentAfterEnter, Some("notify".to_string()));
        assert_eq!(state.validation_blocks.len(), 1);
        assert_eq!(
            state.validation_blocks.get(&ValidationField::CurrentAfterEnter),
            Some(&"notify".to_string())
        );
    }

    #[test]
    fn record_methods_only_touches_known_models() {
        let mut aggregate = Aggregate::default();
        aggregate.insert_model("Grants".to_string(), model("grants", &["Intake"]));

        assert!(aggregate.record_methods("Grants", Slot::Collected(MethodList::default())));
        assert!(!aggregate.record_methods("Missing", Slot::Collected(MethodList::default())));
        let themes = &aggregate.models["Grants"].themes;
        assert!(themes["Intake"].code.is_none());
        assert!(themes["Intake"].workflow.is_none());
    }

    #[test]
    fn theme_keys_follow_insertion_order() {
        let mut aggregate = Aggregate::default();
        aggregate.insert_model("Zeta".to_string(), model("zeta", &["B", "A"]));
        aggregate.insert_model("Alpha".to_string(), model("alpha", &["C"]));

        let keys = aggregate.theme_keys();
        assert_eq!(
            keys,
            vec![
                ("Zeta".to_string(), "B".to_string()),
                ("Zeta".to_string(), "A".to_string()),
                ("Alpha".to_string(), "C".to_string()),
            ]
        );
        assert_eq!(aggregate.theme_count(), 3);
    }

    #[test]
    fn slot_serializes_with_status_tag() {
        let slot: Slot<CodeBlocks> = Slot::Skipped(SkipReason::not_found("config trigger"));
        let json = serde_json::to_value(&slot).expect("serialize");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["data"]["kind"], "not_found");
    }
}
