//! Scripted fakes for driving the passes without a browser or a terminal.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::context::{Interrupt, ScanContext};
use crate::core::aggregate::{CodeField, ValidationField};
use crate::core::locator::Locator;
use crate::core::retry::Clock;
use crate::core::selectors::{self, DashboardSection};
use crate::io::config::ScanConfig;
use crate::io::console::Prompter;
use crate::io::session::{Scope, Session};

/// Handle to a node in a [`ScriptedSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub usize);

/// What a click on a node does to the scripted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEffect {
    Show(NodeRef),
    Hide(NodeRef),
    SetAttr(NodeRef, String, String),
    Navigate(String),
}

#[derive(Debug, Clone, Default)]
struct Node {
    text: String,
    value: Option<String>,
    attrs: BTreeMap<String, String>,
    hidden: bool,
    /// Showing a grouped node hides the rest of its group.
    group: Option<String>,
}

#[derive(Debug, Default)]
struct Page {
    url: String,
    nodes: Vec<Node>,
    answers: HashMap<(Option<NodeRef>, Locator), Vec<NodeRef>>,
    failing_lookups: HashSet<(Option<NodeRef>, Locator)>,
    click_effects: HashMap<NodeRef, Vec<ClickEffect>>,
    failing_clicks: HashSet<NodeRef>,
    interrupting_clicks: HashMap<NodeRef, Interrupt>,
    /// Effects and return value of upcoming `execute` calls, in order.
    scripts_ahead: VecDeque<(Vec<ClickEffect>, Value)>,
    clicks: Vec<NodeRef>,
    navigations: Vec<String>,
    scripts: Vec<String>,
    refuse_navigation: bool,
}

impl Page {
    fn apply(&mut self, effect: &ClickEffect) {
        match effect {
            ClickEffect::Show(node) => {
                if let Some(group) = self.nodes[node.0].group.clone() {
                    for other in &mut self.nodes {
                        if other.group.as_deref() == Some(group.as_str()) {
                            other.hidden = true;
                        }
                    }
                }
                self.nodes[node.0].hidden = false;
            }
            ClickEffect::Hide(node) => self.nodes[node.0].hidden = true,
            ClickEffect::SetAttr(node, name, value) => {
                self.nodes[node.0]
                    .attrs
                    .insert(name.clone(), value.clone());
            }
            ClickEffect::Navigate(url) => self.url = url.clone(),
        }
    }
}

/// In-memory page answering locators from a fixture.
///
/// Lookups are keyed by `(scope, locator)`; hidden nodes are filtered out of
/// every answer, so click effects that show or hide nodes model the page
/// reacting to the scanner.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    page: RefCell<Page>,
}

impl ScriptedSession {
    pub fn new(url: &str) -> Self {
        let session = Self::default();
        session.page.borrow_mut().url = url.to_string();
        session
    }

    pub fn node(&self, text: &str) -> NodeRef {
        let mut page = self.page.borrow_mut();
        page.nodes.push(Node {
            text: text.to_string(),
            ..Node::default()
        });
        NodeRef(page.nodes.len() - 1)
    }

    pub fn hidden_node(&self, text: &str) -> NodeRef {
        let node = self.node(text);
        self.page.borrow_mut().nodes[node.0].hidden = true;
        node
    }

    /// Hidden node that hides the rest of `group` when shown.
    pub fn grouped_node(&self, text: &str, group: &str) -> NodeRef {
        let node = self.hidden_node(text);
        self.page.borrow_mut().nodes[node.0].group = Some(group.to_string());
        node
    }

    /// Record navigations but leave the current URL unchanged.
    pub fn refuse_navigation(&self) {
        self.page.borrow_mut().refuse_navigation = true;
    }

    pub fn set_value(&self, node: NodeRef, value: &str) {
        self.page.borrow_mut().nodes[node.0].value = Some(value.to_string());
    }

    pub fn set_attr(&self, node: NodeRef, name: &str, value: &str) {
        self.page.borrow_mut().nodes[node.0]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn attr(&self, node: NodeRef, name: &str) -> Option<String> {
        self.page.borrow().nodes[node.0].attrs.get(name).cloned()
    }

    pub fn is_hidden(&self, node: NodeRef) -> bool {
        self.page.borrow().nodes[node.0].hidden
    }

    /// Answer `locator` looked up in `scope` (`None` = whole page).
    pub fn answer(&self, scope: Option<NodeRef>, locator: &Locator, nodes: &[NodeRef]) {
        self.page
            .borrow_mut()
            .answers
            .insert((scope, locator.clone()), nodes.to_vec());
    }

    /// Append to the answer for `locator` in `scope`.
    pub fn push_answer(&self, scope: Option<NodeRef>, locator: &Locator, node: NodeRef) {
        self.page
            .borrow_mut()
            .answers
            .entry((scope, locator.clone()))
            .or_default()
            .push(node);
    }

    /// Make `locator` in `scope` fail with a browser error.
    pub fn fail_lookup(&self, scope: Option<NodeRef>, locator: &Locator) {
        self.page
            .borrow_mut()
            .failing_lookups
            .insert((scope, locator.clone()));
    }

    pub fn on_click(&self, node: NodeRef, effect: ClickEffect) {
        self.page
            .borrow_mut()
            .click_effects
            .entry(node)
            .or_default()
            .push(effect);
    }

    pub fn fail_click(&self, node: NodeRef) {
        self.page.borrow_mut().failing_clicks.insert(node);
    }

    /// Trigger `interrupt` when `node` is clicked, as if Ctrl-C landed mid-click.
    pub fn on_click_interrupt(&self, node: NodeRef, interrupt: &Interrupt) {
        self.page
            .borrow_mut()
            .interrupting_clicks
            .insert(node, interrupt.clone());
    }

    /// Effects applied by the next `execute` call, in queue order. It returns `0`.
    pub fn on_next_script(&self, effects: Vec<ClickEffect>) {
        self.on_next_script_returning(effects, Value::from(0));
    }

    /// Like [`ScriptedSession::on_next_script`], with the script's return value.
    pub fn on_next_script_returning(&self, effects: Vec<ClickEffect>, result: Value) {
        self.page
            .borrow_mut()
            .scripts_ahead
            .push_back((effects, result));
    }

    pub fn clicks(&self) -> Vec<NodeRef> {
        self.page.borrow().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.page.borrow().navigations.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.page.borrow().scripts.clone()
    }
}

impl Session for ScriptedSession {
    type Element = NodeRef;

    fn navigate(&self, url: &str) -> Result<()> {
        let mut page = self.page.borrow_mut();
        page.navigations.push(url.to_string());
        if !page.refuse_navigation {
            page.url = url.to_string();
        }
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.page.borrow().url.clone())
    }

    fn find_all(&self, scope: Scope<'_, NodeRef>, locator: &Locator) -> Result<Vec<NodeRef>> {
        let page = self.page.borrow();
        let scope = match scope {
            Scope::Page => None,
            Scope::Within(node) => Some(*node),
        };
        let key = (scope, locator.clone());
        if page.failing_lookups.contains(&key) {
            return Err(anyhow!("scripted lookup failure for {locator}"));
        }
        if scope.is_some_and(|node| page.nodes[node.0].hidden) {
            return Err(anyhow!("stale element reference"));
        }
        Ok(page
            .answers
            .get(&key)
            .map(|nodes| {
                nodes
                    .iter()
                    .copied()
                    .filter(|node| !page.nodes[node.0].hidden)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn text(&self, element: &NodeRef) -> Result<String> {
        Ok(self.page.borrow().nodes[element.0].text.clone())
    }

    fn attribute(&self, element: &NodeRef, name: &str) -> Result<Option<String>> {
        Ok(self.page.borrow().nodes[element.0].attrs.get(name).cloned())
    }

    fn value(&self, element: &NodeRef) -> Result<Option<String>> {
        Ok(self.page.borrow().nodes[element.0].value.clone())
    }

    fn click(&self, element: &NodeRef) -> Result<()> {
        let mut page = self.page.borrow_mut();
        page.clicks.push(*element);
        if page.failing_clicks.contains(element) {
            return Err(anyhow!("element not interactable"));
        }
        if let Some(interrupt) = page.interrupting_clicks.get(element) {
            interrupt.trigger();
        }
        let effects = page.click_effects.get(element).cloned().unwrap_or_default();
        for effect in &effects {
            page.apply(effect);
        }
        Ok(())
    }

    fn execute(&self, script: &str, _target: Option<&NodeRef>) -> Result<Value> {
        let mut page = self.page.borrow_mut();
        page.scripts.push(script.to_string());
        let Some((effects, result)) = page.scripts_ahead.pop_front() else {
            return Ok(Value::from(0));
        };
        for effect in &effects {
            page.apply(effect);
        }
        Ok(result)
    }
}

/// Prompter answering from queues and recording what it was shown.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirms: RefCell<VecDeque<bool>>,
    choices: RefCell<VecDeque<usize>>,
    asked: RefCell<Vec<String>>,
    notes: RefCell<Vec<String>>,
    progress: RefCell<Vec<(usize, usize)>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confirms(self, answers: &[bool]) -> Self {
        self.confirms.borrow_mut().extend(answers.iter().copied());
        self
    }

    pub fn with_choices(self, choices: &[usize]) -> Self {
        self.choices.borrow_mut().extend(choices.iter().copied());
        self
    }

    /// Prompts passed to `confirm` and `choose`, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    pub fn notes(&self) -> Vec<String> {
        self.notes.borrow().clone()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.progress.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirm: {prompt}"))
    }

    fn choose(&self, prompt: &str, options: &[&str]) -> Result<usize> {
        self.asked.borrow_mut().push(prompt.to_string());
        let choice = self
            .choices
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected choice: {prompt}"))?;
        if choice >= options.len() {
            return Err(anyhow!("scripted choice {choice} out of range"));
        }
        Ok(choice)
    }

    fn report_progress(&self, current: usize, total: usize, _label: &str) {
        self.progress.borrow_mut().push((current, total));
    }

    fn notify(&self, message: &str) {
        self.notes.borrow_mut().push(message.to_string());
    }
}

/// Clock that only moves when slept on.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Cell<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> Duration {
        self.now.get()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

pub fn scan_context<'a>(
    session: &'a ScriptedSession,
    prompter: &'a ScriptedPrompter,
    clock: &'a FakeClock,
    config: &'a ScanConfig,
) -> ScanContext<'a, ScriptedSession> {
    ScanContext {
        session,
        prompter,
        clock,
        config,
        interrupt: Interrupt::default(),
    }
}

// Console fixtures. Each installer wires the nodes and answers one part of
// the admin console needs, following the selectors the passes use.

/// Admin panel link and the dashboard picker.
///
/// The admin link moves the page to `admin_url`; each picker entry marks its
/// own section selected.
pub fn install_admin_shell(session: &ScriptedSession, admin_url: &str) -> NodeRef {
    let admin = session.node("Admin Panel");
    session.answer(None, &selectors::login_marker(), &[admin]);
    session.on_click(admin, ClickEffect::Navigate(admin_url.to_string()));
    for section in [
        DashboardSection::Forms,
        DashboardSection::Workflow,
        DashboardSection::CardSettings,
    ] {
        let link = session.node(section.label());
        session.answer(None, &selectors::dashboard_link(section), &[link]);
        let selected = session.grouped_node(section.label(), "dashboard");
        session.answer(None, &selectors::dashboard_selected(section), &[selected]);
        session.on_click(link, ClickEffect::Show(selected));
    }
    admin
}

/// Forms section scroller; returns the scroll container.
pub fn install_forms_shell(session: &ScriptedSession) -> NodeRef {
    let scroller = session.node("");
    session.answer(None, &selectors::model_list_scroller(), &[scroller]);
    scroller
}

pub struct ThemeSpec<'a> {
    pub label: &'a str,
    pub views: &'a [&'a str],
}

pub struct ModelFixture {
    pub container: NodeRef,
    pub toggle: NodeRef,
    /// `(label, entry)` per installed theme entry, reserved ones included.
    pub themes: Vec<(String, NodeRef)>,
}

impl ModelFixture {
    pub fn theme(&self, label: &str) -> NodeRef {
        self.themes
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, entry)| *entry)
            .unwrap_or_else(|| panic!("no theme fixture {label}"))
    }
}

/// A collapsed model container in the Forms section.
pub fn install_catalog_model(
    session: &ScriptedSession,
    raw_id: &str,
    kind_href: Option<&str>,
    themes: &[ThemeSpec<'_>],
) -> ModelFixture {
    let container = session.node("");
    session.set_attr(container, "id", raw_id);
    session.set_attr(container, "class", "toggle-class");
    session.push_answer(None, &selectors::model_containers(), container);
    session.answer(None, &selectors::model_container(raw_id), &[container]);

    let label = session.node(raw_id);
    session.push_answer(None, &selectors::model_labels(), label);

    if let Some(href) = kind_href {
        let link = session.node("New");
        session.set_attr(link, "href", href);
        session.answer(
            Some(container),
            &selectors::model_kind_links()[0],
            &[link],
        );
    }

    let toggle = session.node(raw_id);
    session.answer(Some(container), &selectors::model_toggle(), &[toggle]);
    session.on_click(
        toggle,
        ClickEffect::SetAttr(container, "class".to_string(), "toggle-class open".to_string()),
    );

    let mut installed = Vec::new();
    for theme in themes {
        let entry = session.node("");
        session.push_answer(Some(container), &selectors::theme_entries(), entry);
        let label = session.node(&format!("  {}  ", theme.label));
        session.answer(Some(entry), &selectors::theme_label(), &[label]);
        let views: Vec<NodeRef> = theme.views.iter().map(|view| session.node(view)).collect();
        session.answer(Some(entry), &selectors::view_labels()[0], &views);
        installed.push((theme.label.to_string(), entry));
    }

    ModelFixture {
        container,
        toggle,
        themes: installed,
    }
}

pub struct CodeModalFixture {
    pub trigger: NodeRef,
    pub modal: NodeRef,
    pub close: NodeRef,
}

/// Configuration modal behind a theme entry's edit trigger.
pub fn install_code_modal(
    session: &ScriptedSession,
    theme_entry: NodeRef,
    fields: &[(CodeField, &str)],
) -> CodeModalFixture {
    let trigger = session.node("Edit");
    session.answer(
        Some(theme_entry),
        &selectors::theme_config_triggers()[0],
        &[trigger],
    );
    let modal = session.grouped_node("", "modal");
    session.push_answer(None, &selectors::config_modal_open(), modal);
    session.on_click(trigger, ClickEffect::Show(modal));
    for field in CodeField::ALL {
        let node = session.node("");
        if let Some((_, text)) = fields.iter().find(|(known, _)| *known == field) {
            session.set_value(node, text);
        }
        session.answer(Some(modal), &selectors::code_field(field), &[node]);
    }
    let close = session.node("×");
    session.answer(Some(modal), &selectors::config_modal_close(), &[close]);
    session.on_click(close, ClickEffect::Hide(modal));
    CodeModalFixture {
        trigger,
        modal,
        close,
    }
}

/// A model's block and its clickable label in the Workflow / Card Settings sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLink {
    pub block: NodeRef,
    pub link: NodeRef,
}

pub fn install_model_link(session: &ScriptedSession, identifier: &str) -> ModelLink {
    let block = session.node("");
    session.set_attr(block, "data-model", identifier);
    session.answer(
        None,
        &selectors::model_scopes(&[identifier.to_string()])[0],
        &[block],
    );
    let link = session.node(identifier);
    session.answer(Some(block), &selectors::model_link(), &[link]);
    ModelLink { block, link }
}

pub struct ActionSpec<'a> {
    pub name: &'a str,
    pub to_state: Option<&'a str>,
    pub guard: Option<&'a str>,
    pub draft_guard: Option<&'a str>,
}

pub struct StateSpec<'a> {
    pub header: &'a str,
    pub blocks: &'a [(ValidationField, &'a str)],
    pub actions: &'a [ActionSpec<'a>],
}

pub struct WorkflowThemeSpec<'a> {
    pub label: &'a str,
    pub workflow_id: Option<u64>,
    pub states: &'a [StateSpec<'a>],
}

pub struct WorkflowFixture {
    /// `(label, link)` per theme link.
    pub theme_links: Vec<(String, NodeRef)>,
    /// State listing per theme link.
    pub listings: Vec<NodeRef>,
    /// State entries and their headers in installation order, across themes.
    pub state_entries: Vec<NodeRef>,
    pub state_headers: Vec<NodeRef>,
    /// Action entries in installation order, across states.
    pub actions: Vec<NodeRef>,
}

/// Theme links, state listings and detail forms shown after the model is opened.
pub fn install_workflow(
    session: &ScriptedSession,
    model: ModelLink,
    themes: &[WorkflowThemeSpec<'_>],
) -> WorkflowFixture {
    let mut fixture = WorkflowFixture {
        theme_links: Vec::new(),
        listings: Vec::new(),
        state_entries: Vec::new(),
        state_headers: Vec::new(),
        actions: Vec::new(),
    };
    for theme in themes {
        let link = session.hidden_node(theme.label);
        session.push_answer(Some(model.block), &selectors::section_theme_links(), link);
        session.on_click(model.link, ClickEffect::Show(link));
        fixture.theme_links.push((theme.label.to_string(), link));

        let listing = session.grouped_node("", "state-listing");
        session.push_answer(None, &selectors::state_listing(), listing);
        session.on_click(link, ClickEffect::Show(listing));
        fixture.listings.push(listing);
        let new_event = session.grouped_node("New Action", "new-event");
        if let Some(id) = theme.workflow_id {
            session.set_attr(
                new_event,
                "href",
                &format!("/machine_events/new?machine_event[workflow_id]={id}"),
            );
        }
        session.push_answer(None, &selectors::new_event_link(), new_event);
        session.on_click(link, ClickEffect::Show(new_event));

        let mut entries = Vec::new();
        for state in theme.states {
            let entry = session.node("");
            entries.push(entry);
            fixture.state_entries.push(entry);
            let header = session.node(state.header);
            session.answer(Some(entry), &selectors::state_header(), &[header]);
            fixture.state_headers.push(header);

            let form = session.grouped_node("", "detail");
            session.push_answer(None, &selectors::state_detail(), form);
            session.on_click(header, ClickEffect::Show(form));
            for (field, text) in state.blocks {
                let node = session.node("");
                session.set_value(node, text);
                session.answer(Some(form), &selectors::validation_field(*field), &[node]);
            }

            let mut items = Vec::new();
            for action in state.actions {
                let item = session.node(action.name);
                items.push(item);
                fixture.actions.push(item);
                let detail = session.grouped_node("", "detail");
                session.push_answer(None, &selectors::action_detail(), detail);
                session.on_click(item, ClickEffect::Show(detail));
                if let Some(to_state) = action.to_state {
                    let option = session.node(to_state);
                    session.answer(Some(detail), &selectors::action_to_state(), &[option]);
                }
                for (locator, text) in [
                    (selectors::action_guard(), action.guard),
                    (selectors::action_draft_guard(), action.draft_guard),
                ] {
                    if let Some(text) = text {
                        let node = session.node("");
                        session.set_value(node, text);
                        session.answer(Some(detail), &locator, &[node]);
                    }
                }
            }
            items.push(session.node(selectors::ADD_ACTION_LABEL));
            session.answer(Some(entry), &selectors::action_entries(), &items);
        }
        session.answer(Some(listing), &selectors::state_entries(), &entries);
    }
    fixture
}

pub struct MethodSpec<'a> {
    pub name: &'a str,
    pub method_type: &'a str,
    pub code: Option<&'a str>,
    pub draft_code: Option<&'a str>,
}

pub struct MethodsFixture {
    pub tab: NodeRef,
    pub entries: Vec<NodeRef>,
}

/// Methods tab shown after the model is opened, with no listing behind it.
pub fn install_methods_tab(session: &ScriptedSession, model: ModelLink) -> NodeRef {
    let tab = session.grouped_node("Methods", "methods-tab");
    session.push_answer(Some(model.block), &selectors::methods_tab()[1], tab);
    session.on_click(model.link, ClickEffect::Show(tab));
    tab
}

/// Methods tab and listing shown after the model is opened.
pub fn install_methods(
    session: &ScriptedSession,
    model: ModelLink,
    methods: &[MethodSpec<'_>],
) -> MethodsFixture {
    let tab = install_methods_tab(session, model);
    let listing = session.grouped_node("", "method-listing");
    session.push_answer(Some(model.block), &selectors::method_listing(), listing);
    session.on_click(tab, ClickEffect::Show(listing));

    let mut entries = Vec::new();
    for method in methods {
        let entry = session.node("");
        entries.push(entry);
        let name = session.node(method.name);
        session.answer(Some(entry), &selectors::method_name(), &[name]);
        let detail = session.grouped_node("", "detail");
        session.push_answer(None, &selectors::method_detail(), detail);
        session.on_click(entry, ClickEffect::Show(detail));
        let kind = session.node(method.method_type);
        session.answer(Some(detail), &selectors::method_type(), &[kind]);
        for (locator, text) in [
            (selectors::method_code(), method.code),
            (selectors::method_draft_code(), method.draft_code),
        ] {
            if let Some(text) = text {
                let node = session.node("");
                session.set_value(node, text);
                session.answer(Some(detail), &locator, &[node]);
            }
        }
    }
    session.answer(Some(listing), &selectors::method_entries(), &entries);
    MethodsFixture { tab, entries }
}
