//! Methods pass: model methods from the Card Settings section.
//!
//! The methods tab and its listing are looked up within the opened model's
//! block, never page-wide.

use tracing::{debug, info, warn};

use crate::context::{PassError, PassSummary, ScanContext, stop_on_interrupt};
use crate::core::aggregate::{Aggregate, MethodEntry, MethodList, Slot};
use crate::core::selectors;
use crate::core::skip::{SkipReason, Skipped};
use crate::io::session::{Scope, Session};

/// Fill every model's `methods` slot. The caller has opened Card Settings.
pub fn scan_methods<S: Session>(
    ctx: &ScanContext<'_, S>,
    aggregate: &mut Aggregate,
) -> Result<PassSummary, PassError> {
    let models = aggregate.model_names();
    let total = models.len();
    info!(total, "scanning methods");

    let mut summary = PassSummary::default();
    for (index, model) in models.iter().enumerate() {
        ctx.check_interrupt()?;
        let result = scan_model(ctx, model);
        summary.record(&result);
        let slot = match result {
            Ok(list) => {
                debug!(%model, methods = list.methods.len(), "methods read");
                Slot::Collected(list)
            }
            Err(reason) => {
                let reason = stop_on_interrupt(reason)?;
                warn!(%model, %reason, "methods skipped");
                Slot::Skipped(reason)
            }
        };
        aggregate.record_methods(model, slot);
        ctx.prompter.report_progress(index + 1, total, model);
    }
    Ok(summary)
}

fn scan_model<S: Session>(
    ctx: &ScanContext<'_, S>,
    model: &str,
) -> Result<MethodList, SkipReason> {
    let timeouts = &ctx.config.timeouts;
    let block = ctx.open_model(model)?;

    let tab = ctx.wait_resolve(
        Scope::Within(&block),
        &selectors::methods_tab(),
        timeouts.element,
        "methods tab",
    )?;
    ctx.click(&tab, "methods tab")?;

    let mut list = MethodList::default();
    let listing = match ctx.wait_for(
        Scope::Within(&block),
        &selectors::method_listing(),
        timeouts.listing,
        "method listing",
    ) {
        Ok(listing) => listing,
        Err(SkipReason::Interrupted) => return Err(SkipReason::Interrupted),
        Err(reason) => {
            debug!(%model, %reason, "no method listing");
            return Ok(list);
        }
    };

    let count = ctx
        .find_all(Scope::Within(&listing), &selectors::method_entries())?
        .len();
    for index in 0..count {
        if ctx.interrupt.is_set() {
            return Err(SkipReason::Interrupted);
        }
        let result = ctx
            .find_all(Scope::Within(&listing), &selectors::method_entries())
            .and_then(|entries| {
                entries
                    .into_iter()
                    .nth(index)
                    .ok_or_else(|| SkipReason::not_found("method entry"))
            })
            .and_then(|entry| scan_method(ctx, &entry));
        match result {
            Ok(method) => list.methods.push(method),
            Err(SkipReason::Interrupted) => return Err(SkipReason::Interrupted),
            Err(reason) => {
                let item = format!("{model} method #{}", index + 1);
                warn!(%item, %reason, "method skipped");
                list.skipped.push(Skipped::new(item, reason));
            }
        }
    }
    Ok(list)
}

fn scan_method<S: Session>(
    ctx: &ScanContext<'_, S>,
    entry: &S::Element,
) -> Result<MethodEntry, SkipReason> {
    let name = ctx.find(Scope::Within(entry), &selectors::method_name(), "method name")?;
    let name = ctx.text(&name)?;
    ctx.click(entry, "method entry")?;
    let detail = ctx.wait_for(
        Scope::Page,
        &selectors::method_detail(),
        ctx.config.timeouts.element,
        "method detail form",
    )?;
    let method_type = ctx
        .find(Scope::Within(&detail), &selectors::method_type(), "method type")
        .and_then(|option| ctx.text(&option))
        .unwrap_or_default();
    Ok(MethodEntry {
        name,
        method_type,
        current_code: ctx
            .field_text(Scope::Within(&detail), &selectors::method_code())
            .unwrap_or_default(),
        draft_code: ctx
            .field_text(Scope::Within(&detail), &selectors::method_draft_code())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{ModelCatalog, ModelEntry};
    use crate::io::config::ScanConfig;
    use crate::test_support::{
        FakeClock, MethodSpec, ScriptedPrompter, ScriptedSession, install_methods,
        install_methods_tab, install_model_link, scan_context,
    };
    use indexmap::IndexMap;

    fn models(names: &[&str]) -> Aggregate {
        let mut aggregate = Aggregate::default();
        for name in names {
            aggregate.insert_model(
                name.to_string(),
                ModelEntry {
                    catalog: ModelCatalog::new(name.to_lowercase(), None, "MacModelTypeDyn"),
                    themes: IndexMap::new(),
                    methods: None,
                },
            );
        }
        aggregate
    }

    #[test]
    fn reads_methods_with_empty_string_defaults() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "Grants");
        install_methods(
            &session,
            model,
            &[
                MethodSpec {
                    name: "total_awarded",
                    method_type: "Calculated",
                    code: Some("amount * 2"),
                    draft_code: None,
                },
                MethodSpec {
                    name: "is_overdue",
                    method_type: "Boolean",
                    code: None,
                    draft_code: Some("due_at < now"),
                },
            ],
        );
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = models(&["Grants"]);

        let summary = scan_methods(&ctx, &mut aggregate).expect("pass");

        assert_eq!(summary, PassSummary { visited: 1, skipped: 0 });
        let Some(Slot::Collected(list)) = aggregate.models["Grants"].methods.clone() else {
            panic!("methods not collected");
        };
        assert_eq!(
            list.methods,
            vec![
                MethodEntry {
                    name: "total_awarded".to_string(),
                    method_type: "Calculated".to_string(),
                    current_code: "amount * 2".to_string(),
                    draft_code: String::new(),
                },
                MethodEntry {
                    name: "is_overdue".to_string(),
                    method_type: "Boolean".to_string(),
                    current_code: String::new(),
                    draft_code: "due_at < now".to_string(),
                },
            ]
        );
    }

    #[test]
    fn missing_listing_records_empty_list() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "Grants");
        install_methods_tab(&session, model);
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = models(&["Grants", "Reports"]);

        let summary = scan_methods(&ctx, &mut aggregate).expect("pass");

        assert_eq!(summary, PassSummary { visited: 1, skipped: 1 });
        assert_eq!(
            aggregate.models["Grants"].methods,
            Some(Slot::Collected(MethodList::default()))
        );
        assert_eq!(
            aggregate.models["Reports"].methods,
            Some(Slot::Skipped(SkipReason::not_found("model link for Reports")))
        );
    }

    #[test]
    fn failing_method_is_skipped_and_rest_attempted() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let model = install_model_link(&session, "Grants");
        let fixture = install_methods(
            &session,
            model,
            &[
                MethodSpec {
                    name: "broken",
                    method_type: "Calculated",
                    code: None,
                    draft_code: None,
                },
                MethodSpec {
                    name: "working",
                    method_type: "",
                    code: Some("1"),
                    draft_code: None,
                },
            ],
        );
        session.fail_click(fixture.entries[0]);
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = models(&["Grants"]);

        scan_methods(&ctx, &mut aggregate).expect("pass");

        let Some(Slot::Collected(list)) = aggregate.models["Grants"].methods.clone() else {
            panic!("methods not collected");
        };
        assert_eq!(list.methods.len(), 1);
        assert_eq!(list.methods[0].name, "working");
        assert_eq!(list.methods[0].method_type, "");
        assert_eq!(list.skipped.len(), 1);
        assert_eq!(list.skipped[0].item, "Grants method #1");
    }

    #[test]
    fn each_model_reads_its_own_methods_tab() {
        let session = ScriptedSession::new("https://acme.test/?db=config");
        let grants = install_model_link(&session, "Grants");
        install_methods(
            &session,
            grants,
            &[MethodSpec {
                name: "total_awarded",
                method_type: "Calculated",
                code: Some("amount * 2"),
                draft_code: None,
            }],
        );
        let loans = install_model_link(&session, "Loans");
        let loans_methods = install_methods(
            &session,
            loans,
            &[MethodSpec {
                name: "interest",
                method_type: "Calculated",
                code: Some("rate * principal"),
                draft_code: None,
            }],
        );
        // A stray tab outside either block is never picked up.
        let stray = session.node("Methods");
        session.answer(None, &selectors::methods_tab()[1], &[stray]);
        let prompter = ScriptedPrompter::new();
        let clock = FakeClock::new();
        let config = ScanConfig::default();
        let ctx = scan_context(&session, &prompter, &clock, &config);
        let mut aggregate = models(&["Grants", "Loans"]);

        let summary = scan_methods(&ctx, &mut aggregate).expect("pass");

        assert_eq!(summary, PassSummary { visited: 2, skipped: 0 });
        let names = |model: &str| match aggregate.models[model].methods.clone() {
            Some(Slot::Collected(list)) => list
                .methods
                .into_iter()
                .map(|method| method.name)
                .collect::<Vec<_>>(),
            other => panic!("{model} methods not collected: {other:?}"),
        };
        assert_eq!(names("Grants"), vec!["total_awarded"]);
        assert_eq!(names("Loans"), vec!["interest"]);
        assert!(!session.clicks().contains(&stray));
        assert!(session.clicks().contains(&loans_methods.tab));
    }
}
