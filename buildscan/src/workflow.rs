//! Workflow pass: state machines per theme, from the Workflow section.
//!
//! Models are re-located by identifier guessing, then every theme already in
//! the skeleton is opened in turn. States and actions are re-found by index
//! after each click, since opening a detail form re-renders the listing.

use tracing::{debug, info, warn};

use crate::context::{PassError, PassSummary, ScanContext, stop_on_interrupt};
use crate::core::aggregate::{
    ActionEntry, Aggregate, Slot, StateEntry, ValidationField, WorkflowEntry,
};
use crate::core::naming::{parse_state_header, workflow_id_from_href};
use crate::core::selectors;
use crate::core::skip::{SkipReason, Skipped};
use crate::io::session::{Scope, Session};

/// Fill the `workflow` slot of every theme the Workflow section knows about.
///
/// The caller has already opened the Workflow section.
pub fn scan_workflows<S: Session>(
    ctx: &ScanContext<'_, S>,
    aggregate: &mut Aggregate,
) -> Result<PassSummary, PassError> {
    let models = aggregate.model_names();
    let total = models.len();
    info!(total, "scanning workflows");

    let mut summary = PassSummary::default();
    for (index, model) in models.iter().enumerate() {
        ctx.check_interrupt()?;
        scan_model(ctx, aggregate, model, &mut summary)?;
        ctx.prompter.report_progress(index + 1, total, model);
    }
    Ok(summary)
}

fn scan_model<S: Session>(
    ctx: &ScanContext<'_, S>,
    aggregate: &mut Aggregate,
    model: &str,
    summary: &mut PassSummary,
) -> Result<(), PassError> {
    let themes = aggregate.theme_names(model);
    let block = match ctx.open_model(model) {
        Ok(block) => block,
        Err(reason) => {
            let reason = stop_on_interrupt(reason)?;
            warn!(%model, %reason, "model not found in workflow section");
            for theme in &themes {
                aggregate.record_workflow(model, theme, Slot::Skipped(reason.clone()));
                summary.skipped += 1;
            }
            return Ok(());
        }
    };

    for theme in &themes {
        ctx.check_interrupt()?;
        let link = match find_theme_link(ctx, &block, theme) {
            Ok(Some(link)) => link,
            Ok(None) => {
                debug!(%model, %theme, "theme has no workflow link");
                continue;
            }
            Err(reason) => {
                let reason = stop_on_interrupt(reason)?;
                aggregate.record_workflow(model, theme, Slot::Skipped(reason));
                summary.skipped += 1;
                continue;
            }
        };

        let result = scan_theme(ctx, &link);
        summary.record(&result);
        let slot = match result {
            Ok(entry) => {
                debug!(%model, %theme, states = entry.states.len(), "workflow read");
                Slot::Collected(entry)
            }
            Err(reason) => {
                let reason = stop_on_interrupt(reason)?;
                warn!(%model, %theme, %reason, "workflow skipped");
                Slot::Skipped(reason)
            }
        };
        aggregate.record_workflow(model, theme, slot);
    }
    Ok(())
}

/// The model block's link for `theme`, or `None` when the block does not list it.
fn find_theme_link<S: Session>(
    ctx: &ScanContext<'_, S>,
    block: &S::Element,
    theme: &str,
) -> Result<Option<S::Element>, SkipReason> {
    let links = ctx.wait_for_all(
        Scope::Within(block),
        &selectors::section_theme_links(),
        ctx.config.timeouts.element,
        "workflow theme links",
    )?;
    for link in links {
        if ctx.text(&link)? == theme {
            return Ok(Some(link));
        }
    }
    Ok(None)
}

fn scan_theme<S: Session>(
    ctx: &ScanContext<'_, S>,
    link: &S::Element,
) -> Result<WorkflowEntry, SkipReason> {
    let listing_timeout = ctx.config.timeouts.listing;
    ctx.click(link, "workflow theme link")?;

    let mut entry = WorkflowEntry::default();
    let listing = match ctx.wait_for(
        Scope::Page,
        &selectors::state_listing(),
        listing_timeout,
        "state listing",
    ) {
        Ok(listing) => listing,
        Err(SkipReason::Interrupted) => return Err(SkipReason::Interrupted),
        Err(reason) => {
            debug!(%reason, "no state listing");
            return Ok(entry);
        }
    };
    entry.workflow_id = ctx
        .find(Scope::Page, &selectors::new_event_link(), "new event link")
        .ok()
        .and_then(|link| ctx.session.attribute(&link, "href").ok().flatten())
        .and_then(|href| workflow_id_from_href(&href));

    let count = match ctx.wait_for_all(
        Scope::Within(&listing),
        &selectors::state_entries(),
        listing_timeout,
        "workflow states",
    ) {
        Ok(states) => states.len(),
        Err(SkipReason::Interrupted) => return Err(SkipReason::Interrupted),
        Err(reason) => {
            debug!(%reason, "workflow has no states");
            return Ok(entry);
        }
    };

    for index in 0..count {
        if ctx.interrupt.is_set() {
            return Err(SkipReason::Interrupted);
        }
        let result = state_at(ctx, &listing, index)
            .and_then(|state| scan_state(ctx, &listing, index, &state));
        match result {
            Ok(state) => entry.states.push(state),
            Err(SkipReason::Interrupted) => return Err(SkipReason::Interrupted),
            Err(reason) => {
                let item = format!("state #{}", index + 1);
                warn!(%item, %reason, "state skipped");
                entry.skipped.push(Skipped::new(item, reason));
            }
        }
    }
    Ok(entry)
}

/// The `index`th state entry of `listing` as currently rendered.
fn state_at<S: Session>(
    ctx: &ScanContext<'_, S>,
    listing: &S::Element,
    index: usize,
) -> Result<S::Element, SkipReason> {
    ctx.find_all(Scope::Within(listing), &selectors::state_entries())?
        .into_iter()
        .nth(index)
        .ok_or_else(|| SkipReason::not_found("state entry"))
}

/// Action entries of the `index`th state, re-found so a re-rendered entry is never stale.
fn actions_of<S: Session>(
    ctx: &ScanContext<'_, S>,
    listing: &S::Element,
    index: usize,
) -> Result<Vec<S::Element>, SkipReason> {
    let state_entry = state_at(ctx, listing, index)?;
    ctx.find_all(Scope::Within(&state_entry), &selectors::action_entries())
}

fn scan_state<S: Session>(
    ctx: &ScanContext<'_, S>,
    listing: &S::Element,
    state_index: usize,
    state_entry: &S::Element,
) -> Result<StateEntry, SkipReason> {
    let header = ctx.find(
        Scope::Within(state_entry),
        &selectors::state_header(),
        "state header",
    )?;
    let (display_name, internal_name) = parse_state_header(&ctx.text(&header)?);
    let mut state = StateEntry {
        display_name,
        internal_name,
        ..StateEntry::default()
    };

    ctx.click(&header, "state header")?;
    let detail = ctx.wait_for(
        Scope::Page,
        &selectors::state_detail(),
        ctx.config.timeouts.element,
        "state detail form",
    )?;
    for field in ValidationField::ALL {
        state.set_validation_block(
            field,
            ctx.field_text(Scope::Within(&detail), &selectors::validation_field(field)),
        );
    }

    // The header click re-renders the listing; `state_entry` may be stale from here on.
    let count = match actions_of(ctx, listing, state_index) {
        Ok(actions) => actions.len(),
        Err(reason) => {
            let item = format!("{} actions", state.display_name);
            warn!(%item, %reason, "actions skipped");
            state.skipped.push(Skipped::new(item, reason));
            return Ok(state);
        }
    };
    for index in 0..count {
        if ctx.interrupt.is_set() {
            return Err(SkipReason::Interrupted);
        }
        let item = actions_of(ctx, listing, state_index).and_then(|actions| {
            actions
                .into_iter()
                .nth(index)
                .ok_or_else(|| SkipReason::not_found("action entry"))
        });
        let result = item.and_then(|item| {
            let name = ctx.text(&item)?;
            if name == selectors::ADD_ACTION_LABEL {
                return Ok(None);
            }
            scan_action(ctx, &item, name).map(Some)
        });
        match result {
            Ok(Some(action)) => state.actions.push(action),
            Ok(None) => {}
            Err(SkipReason::Interrupted) => return Err(SkipReason::Interrupted),
            Err(reason) => {
                let item = format!("{} action #{}", state.display_name, index + 1);
                warn!(%item, %reason, "action skipped");
                state.skipped.push(Skipped::new(item, reason));
            }
        }
    }
    Ok(state)
}

fn scan_action<S: Session>(
    ctx: &ScanContext<'_, S>,
    item: &S::Element,
    name: String,
) -> Result<ActionEntry, SkipReason> {
    ctx.click(item, "action entry")?;
    let detail = ctx.wait_for(
        Scope::Page,
        &selectors::action_detail(),
        ctx.config.timeouts.element,
        "action detail form",
    )?;
    let to_state = ctx
        .find(
            Scope::Within(&detail),
            &selectors::action_to_state(),
            "destination state",
        )
        .and_then(|option| ctx.text(&option))
        .ok()
        .filter(|label| !label.is_empty());
    Ok(ActionEntry {
        name,
        to_state,
        guard_instructions: ctx.field_text(Scope::Within(&detail), &selectors::action_guard()),
        draft_guard: ctx.field_text(Scope::Within(&detail), &selectors::action_draft_guard()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{ModelCatalog, ModelEntry, ThemeEntry};
    use crate::io::config::ScanConfig;
    use crate::test_support::{
        ActionSpec, ClickEffect, FakeClock, ScriptedPrompter, ScriptedSession, StateSpec,
        WorkflowThemeSpec, install_model_link, install_workflow, scan_context,
    };

    fn skeleton(models: &[(&str, &str, &[&str])]) -> Aggregate {
        let mut aggregate = Aggregate::default();
        for (name, raw_id, themes) in models {
            aggregate.insert_model(
                name.to_string(),
                ModelEntry {
                    catalog: ModelCatalog::new(*raw_id, None, "MacModelTypeDyn"),
                    themes: themes
                        .iter()
                        .map(|theme| (theme.to_string(), ThemeEntry::default()))
                        .collect(),
                    methods: None,
                },
            );
        }
        aggregate
    }

    #[test]
    fn reads_states_blocks_and_actions() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "GrantRequest");
        install_workflow(
            &session,
            model,
            &[WorkflowThemeSpec {
                label: "Decision",
                workflow_id: Some(42),
                states: &[
                    StateSpec {
                        header: "Approved (approved)",
                        blocks: &[
                            (ValidationField::CurrentAfterEnter, "notify_po"),
                            (ValidationField::DraftBeforeValidation, "  "),
                        ],
                        actions: &[ActionSpec {
                            name: "Close",
                            to_state: Some("Closed"),
                            guard: Some("model.closable?"),
                            draft_guard: None,
                        }],
                    },
                    StateSpec {
                        header: "Draft",
                        blocks: &[],
                        actions: &[],
                    },
                ],
            }],
        );
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = skeleton(&[("Grant Request", "grant_request", &["Decision"])]);

        let summary = scan_workflows(&ctx, &mut aggregate).expect("pass");

        assert_eq!(summary, PassSummary { visited: 1, skipped: 0 });
        let workflow = aggregate.models["Grant Request"].themes["Decision"]
            .workflow
            .clone()
            .expect("visited");
        let Slot::Collected(workflow) = workflow else {
            panic!("workflow skipped");
        };
        assert_eq!(workflow.workflow_id, Some(42));
        assert_eq!(workflow.states.len(), 2);

        let approved = &workflow.states[0];
        assert_eq!(approved.display_name, "Approved");
        assert_eq!(approved.internal_name, "approved");
        assert_eq!(approved.validation_blocks.len(), 1);
        assert_eq!(
            approved.validation_blocks[&ValidationField::CurrentAfterEnter],
            "notify_po"
        );
        assert_eq!(
            approved.actions,
            vec![ActionEntry {
                name: "Close".to_string(),
                to_state: Some("Closed".to_string()),
                guard_instructions: Some("model.closable?".to_string()),
                draft_guard: None,
            }]
        );

        let draft = &workflow.states[1];
        assert_eq!(draft.display_name, "Draft");
        assert_eq!(draft.internal_name, "Draft");
        assert!(draft.validation_blocks.is_empty());
        assert!(draft.actions.is_empty());
    }

    #[test]
    fn unresolved_model_marks_each_theme_skipped() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = skeleton(&[("Grants", "grants", &["Intake", "Decision"])]);

        let summary = scan_workflows(&ctx, &mut aggregate).expect("pass");

        assert_eq!(summary.skipped, 2);
        for theme in aggregate.models["Grants"].themes.values() {
            assert_eq!(
                theme.workflow,
                Some(Slot::Skipped(SkipReason::not_found("model link for Grants")))
            );
        }
    }

    #[test]
    fn themes_missing_from_section_stay_unvisited() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "Grants");
        install_workflow(
            &session,
            model,
            &[WorkflowThemeSpec {
                label: "Decision",
                workflow_id: None,
                states: &[],
            }],
        );
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = skeleton(&[("Grants", "grants", &["Intake", "Decision"])]);

        scan_workflows(&ctx, &mut aggregate).expect("pass");

        let themes = &aggregate.models["Grants"].themes;
        assert_eq!(themes["Intake"].workflow, None);
        assert_eq!(
            themes["Decision"].workflow,
            Some(Slot::Collected(WorkflowEntry::default()))
        );
    }

    #[test]
    fn failing_action_is_skipped_and_siblings_kept() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "Grants");
        let fixture = install_workflow(
            &session,
            model,
            &[WorkflowThemeSpec {
                label: "Decision",
                workflow_id: Some(3),
                states: &[StateSpec {
                    header: "Submitted (submitted)",
                    blocks: &[],
                    actions: &[
                        ActionSpec {
                            name: "Approve",
                            to_state: Some("Approved"),
                            guard: None,
                            draft_guard: Some("draft_check"),
                        },
                        ActionSpec {
                            name: "Reject",
                            to_state: Some("Rejected"),
                            guard: None,
                            draft_guard: None,
                        },
                    ],
                }],
            }],
        );
        session.fail_click(fixture.actions[0]);
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = skeleton(&[("Grants", "grants", &["Decision"])]);

        scan_workflows(&ctx, &mut aggregate).expect("pass");

        let Some(Slot::Collected(workflow)) =
            aggregate.models["Grants"].themes["Decision"].workflow.clone()
        else {
            panic!("workflow not collected");
        };
        let state = &workflow.states[0];
        assert_eq!(
            state.actions.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["Reject"]
        );
        assert_eq!(state.skipped.len(), 1);
        assert_eq!(state.skipped[0].item, "Submitted action #1");
    }

    fn collected(aggregate: &Aggregate, model: &str, theme: &str) -> WorkflowEntry {
        match aggregate.models[model].themes[theme].workflow.clone() {
            Some(Slot::Collected(workflow)) => workflow,
            other => panic!("{model}/{theme} workflow not collected: {other:?}"),
        }
    }

    #[test]
    fn same_theme_label_reads_each_models_own_workflow() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let grants = install_model_link(&session, "Grants");
        let grants_flow = install_workflow(
            &session,
            grants,
            &[WorkflowThemeSpec {
                label: "Default",
                workflow_id: Some(1),
                states: &[StateSpec {
                    header: "Open (open)",
                    blocks: &[],
                    actions: &[],
                }],
            }],
        );
        let loans = install_model_link(&session, "Loans");
        let loans_flow = install_workflow(
            &session,
            loans,
            &[WorkflowThemeSpec {
                label: "Default",
                workflow_id: Some(2),
                states: &[StateSpec {
                    header: "Pending (pending)",
                    blocks: &[],
                    actions: &[],
                }],
            }],
        );
        // Opening either model leaves both "Default" links on screen.
        session.on_click(grants.link, ClickEffect::Show(loans_flow.theme_links[0].1));
        session.on_click(loans.link, ClickEffect::Show(grants_flow.theme_links[0].1));
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = skeleton(&[
            ("Grants", "grants", &["Default"]),
            ("Loans", "loans", &["Default"]),
        ]);

        let summary = scan_workflows(&ctx, &mut aggregate).expect("pass");

        assert_eq!(summary, PassSummary { visited: 2, skipped: 0 });
        let grants_default = collected(&aggregate, "Grants", "Default");
        assert_eq!(grants_default.workflow_id, Some(1));
        assert_eq!(grants_default.states[0].internal_name, "open");
        let loans_default = collected(&aggregate, "Loans", "Default");
        assert_eq!(loans_default.workflow_id, Some(2));
        assert_eq!(loans_default.states[0].internal_name, "pending");
    }

    #[test]
    fn actions_come_from_the_rerendered_state_entry() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "Grants");
        let fixture = install_workflow(
            &session,
            model,
            &[WorkflowThemeSpec {
                label: "Decision",
                workflow_id: Some(5),
                states: &[StateSpec {
                    header: "Submitted (submitted)",
                    blocks: &[(ValidationField::CurrentAfterEnter, "notify_po")],
                    actions: &[ActionSpec {
                        name: "Approve",
                        to_state: Some("Approved"),
                        guard: None,
                        draft_guard: None,
                    }],
                }],
            }],
        );
        // The header click swaps the entry for a freshly rendered copy.
        let stale = fixture.state_entries[0];
        let fresh = session.hidden_node("");
        session.push_answer(Some(fixture.listings[0]), &selectors::state_entries(), fresh);
        session.answer(Some(fresh), &selectors::action_entries(), &[fixture.actions[0]]);
        session.on_click(fixture.state_headers[0], ClickEffect::Hide(stale));
        session.on_click(fixture.state_headers[0], ClickEffect::Show(fresh));
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = skeleton(&[("Grants", "grants", &["Decision"])]);

        scan_workflows(&ctx, &mut aggregate).expect("pass");

        let workflow = collected(&aggregate, "Grants", "Decision");
        let state = &workflow.states[0];
        assert!(state.skipped.is_empty(), "{:?}", state.skipped);
        assert_eq!(state.actions.len(), 1);
        assert_eq!(state.actions[0].name, "Approve");
        assert_eq!(state.actions[0].to_state.as_deref(), Some("Approved"));
    }

    #[test]
    fn unreadable_actions_keep_the_state_and_its_blocks() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "Grants");
        let fixture = install_workflow(
            &session,
            model,
            &[WorkflowThemeSpec {
                label: "Decision",
                workflow_id: None,
                states: &[StateSpec {
                    header: "Submitted (submitted)",
                    blocks: &[(ValidationField::CurrentBeforeValidation, "check_budget")],
                    actions: &[ActionSpec {
                        name: "Approve",
                        to_state: None,
                        guard: None,
                        draft_guard: None,
                    }],
                }],
            }],
        );
        session.fail_lookup(Some(fixture.state_entries[0]), &selectors::action_entries());
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = skeleton(&[("Grants", "grants", &["Decision"])]);

        scan_workflows(&ctx, &mut aggregate).expect("pass");

        let workflow = collected(&aggregate, "Grants", "Decision");
        assert!(workflow.skipped.is_empty());
        let state = &workflow.states[0];
        assert_eq!(state.internal_name, "submitted");
        assert_eq!(
            state.validation_blocks[&ValidationField::CurrentBeforeValidation],
            "check_budget"
        );
        assert!(state.actions.is_empty());
        assert_eq!(state.skipped.len(), 1);
        assert_eq!(state.skipped[0].item, "Submitted actions");
    }
}
