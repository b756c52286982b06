//! Markup contracts of the admin console.
//!
//! These locators are the only binding to the remote system. Attribute
//! contracts (`id` on model containers, `data-card-uid` on themes, and the
//! `data-type="listing"` + `data-src` pairs on listings) must stay exact.

use crate::core::aggregate::{CodeField, ValidationField};
use crate::core::locator::Locator;

/// Dashboard picker entries used by the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardSection {
    Forms,
    Workflow,
    CardSettings,
}

impl DashboardSection {
    pub fn label(self) -> &'static str {
        match self {
            DashboardSection::Forms => "Forms",
            DashboardSection::Workflow => "Workflow",
            DashboardSection::CardSettings => "Card Settings",
        }
    }
}

/// URL fragment present once the admin configuration screen is open.
pub const ADMIN_URL_MARKER: &str = "db=config";

// Session

/// Rendered only after the human has logged in and picked a profile.
pub fn login_marker() -> Locator {
    Locator::css(r#"a.to-admin-panel[href="/?db=config"]"#)
}

pub fn dashboard_link(section: DashboardSection) -> Locator {
    Locator::xpath(format!(
        "//div[@id='dashboard-picker']//a[normalize-space(text())='{}']",
        section.label()
    ))
}

pub fn dashboard_selected(section: DashboardSection) -> Locator {
    Locator::xpath(format!(
        "//div[@id='dashboard-picker']//li[contains(@class,'selected')]//a[normalize-space(text())='{}']",
        section.label()
    ))
}

// Catalog (Forms section)

/// Scrollable container holding the model list.
pub fn model_list_scroller() -> Locator {
    Locator::css("#admin-navigation")
}

/// One label per rendered model row; used for counting.
pub fn model_labels() -> Locator {
    Locator::css("#admin-navigation #iconList > ul > li.list-label div.link")
}

pub fn model_containers() -> Locator {
    Locator::css("#iconList > ul[id]")
}

pub fn model_container(raw_id: &str) -> Locator {
    Locator::css(format!(r#"#iconList > ul[id="{}"]"#, css_string(raw_id)))
}

/// Clicking the label row toggles the container's `open` class.
pub fn model_toggle() -> Locator {
    Locator::css("li.list-label")
}

/// Class token on a model container while it is expanded.
pub const MODEL_OPEN_CLASS: &str = "open";

/// Markup variants observed for the link carrying `model_theme[model_type]`.
pub fn model_kind_links() -> Vec<Locator> {
    vec![
        Locator::css(r#"a[href*="model_theme[model_type]"]"#),
        Locator::css(r#"a[href*="model_theme%5Bmodel_type%5D"]"#),
        Locator::css(r#"a[href*="model_type="]"#),
    ]
}

pub fn theme_entries() -> Locator {
    Locator::css("li[data-card-uid]")
}

pub fn theme_label() -> Locator {
    Locator::css("a.link span.label")
}

/// View labels for one theme entry, looked up within that entry.
///
/// The `/stencils` listing is rendered as the entry's next sibling; older
/// console builds nested it inside the entry instead.
pub fn view_labels() -> Vec<Locator> {
    vec![
        Locator::xpath(
            "./following-sibling::*[1][@data-type='listing' and @data-src='/stencils']\
             //li[contains(concat(' ', normalize-space(@class), ' '), ' entry ')]\
             [not(contains(concat(' ', normalize-space(@class), ' '), ' non-entry '))]\
             //div[contains(concat(' ', normalize-space(@class), ' '), ' label ')]",
        ),
        Locator::css(
            r#"[data-type="listing"][data-src="/stencils"] li.entry:not(.non-entry) div.label"#,
        ),
    ]
}

// Code blocks (theme configuration modal)

pub fn theme_config_triggers() -> Vec<Locator> {
    vec![
        Locator::css("a.edit-theme"),
        Locator::css(r#"[data-action="edit-theme"]"#),
        Locator::css("a.icon-settings"),
    ]
}

/// The modal once its open animation has finished.
pub fn config_modal_open() -> Locator {
    Locator::css("div.reveal-modal.open")
}

pub fn config_modal_close() -> Locator {
    Locator::css("a.close-reveal-modal")
}

pub fn code_field(field: CodeField) -> Locator {
    let id = match field {
        CodeField::CurrentBeforeCreate => "model_theme_before_create_block",
        CodeField::DraftBeforeCreate => "model_theme_draft_before_create_block",
        CodeField::CurrentAfterCreate => "model_theme_after_create_block",
        CodeField::DraftAfterCreate => "model_theme_draft_after_create_block",
    };
    Locator::css(format!("#{id}"))
}

// Workflow and Card Settings sections

/// A model's block in the section list, one locator per identifier guess,
/// in the order the guesses were made.
///
/// Theme links, the methods tab and the method listing are looked up within
/// this block so that models sharing a theme label never cross over.
pub fn model_scopes(candidates: &[String]) -> Vec<Locator> {
    candidates
        .iter()
        .map(|candidate| {
            Locator::css(format!(
                r#"#iconList [data-model="{}"]"#,
                css_string(candidate)
            ))
        })
        .collect()
}

/// Clickable label inside a model block.
pub fn model_link() -> Locator {
    Locator::css("div.link")
}

pub fn section_theme_links() -> Locator {
    Locator::css("li.icon a.link")
}

pub fn state_listing() -> Locator {
    Locator::css(r#"[data-type="listing"][data-src="/machine_states"]"#)
}

pub fn state_entries() -> Locator {
    Locator::css("li.entry:not(.non-entry)")
}

pub fn state_header() -> Locator {
    Locator::css("div.label")
}

pub fn state_detail() -> Locator {
    Locator::css("form.edit_machine_state")
}

pub fn validation_field(field: ValidationField) -> Locator {
    let id = match field {
        ValidationField::CurrentBeforeValidation => "machine_state_before_validation_block",
        ValidationField::DraftBeforeValidation => "machine_state_draft_before_validation_block",
        ValidationField::CurrentAfterEnter => "machine_state_after_enter_block",
        ValidationField::DraftAfterEnter => "machine_state_draft_after_enter_block",
    };
    Locator::css(format!("#{id}"))
}

pub fn new_event_link() -> Locator {
    Locator::css(r#"a[href*="machine_events/new"]"#)
}

pub fn action_entries() -> Locator {
    Locator::css("ul.machine-events > li")
}

/// Decorative trailing entry that adds a new action.
pub const ADD_ACTION_LABEL: &str = "+";

pub fn action_detail() -> Locator {
    Locator::css("form.edit_machine_event")
}

pub fn action_to_state() -> Locator {
    Locator::css("select#machine_event_to_state_id option:checked")
}

pub fn action_guard() -> Locator {
    Locator::css("#machine_event_guard_instructions")
}

pub fn action_draft_guard() -> Locator {
    Locator::css("#machine_event_draft_guard_instructions")
}

pub fn methods_tab() -> Vec<Locator> {
    vec![
        Locator::xpath("//a[normalize-space(text())='Methods']"),
        Locator::css(r#"a[data-tab="methods"]"#),
    ]
}

pub fn method_listing() -> Locator {
    Locator::css(r#"[data-type="listing"][data-src="/model_methods"]"#)
}

pub fn method_entries() -> Locator {
    Locator::css("li.entry:not(.non-entry)")
}

pub fn method_name() -> Locator {
    Locator::css("div.label")
}

pub fn method_detail() -> Locator {
    Locator::css("form.edit_model_method")
}

pub fn method_type() -> Locator {
    Locator::css("select#model_method_method_type option:checked")
}

pub fn method_code() -> Locator {
    Locator::css("#model_method_code_block")
}

pub fn method_draft_code() -> Locator {
    Locator::css("#model_method_draft_code_block")
}

/// Escape a value for use inside a double-quoted CSS attribute selector.
fn css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
