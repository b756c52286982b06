//! Catalog pass: models, their themes, and each theme's views.
//!
//! Runs first and builds the skeleton every other pass walks. Operates on the
//! Forms section of the admin console.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::{PassError, PassSummary, ScanContext, stop_on_interrupt};
use crate::core::aggregate::{Aggregate, ModelCatalog, ModelEntry, ThemeEntry};
use crate::core::naming::{
    display_name, is_reserved_theme_label, is_reserved_view_label, model_type_from_href,
};
use crate::core::selectors;
use crate::core::skip::{SkipReason, Skipped};
use crate::core::stabilize::stabilize;
use crate::io::session::{Scope, Session};

/// Count the models in the Forms list and get the human to sign off on it.
///
/// Each measurement sweeps the list top to bottom so lazily rendered rows
/// load before counting.
pub fn count_models<S: Session>(ctx: &ScanContext<'_, S>) -> Result<usize, PassError> {
    let scroller = ctx
        .wait_for(
            Scope::Page,
            &selectors::model_list_scroller(),
            ctx.config.timeouts.element,
            "model list",
        )
        .map_err(|reason| match reason {
            SkipReason::Interrupted => PassError::Interrupted,
            other => PassError::Navigation(format!("the Forms model list ({other})")),
        })?;

    let count = stabilize(
        || {
            sweep(ctx, &scroller)?;
            let labels = ctx
                .session
                .find_all(Scope::Page, &selectors::model_labels())
                .context("count model labels")?;
            Ok(labels.len())
        },
        |count| {
            ctx.prompter.confirm(&format!(
                "Found {count} models in the Forms section. Does this count appear correct?"
            ))
        },
        || {
            ctx.prompter
                .notify("Waiting for the page to finish loading before counting again...");
            ctx.clock.sleep(ctx.config.timeouts.settle());
        },
    )?;
    ctx.check_interrupt()?;
    Ok(count)
}

/// Scroll the container through its full height in fixed steps.
fn sweep<S: Session>(ctx: &ScanContext<'_, S>, scroller: &S::Element) -> Result<()> {
    let step = ctx.config.scroll.step_px;
    let pause = std::time::Duration::from_millis(ctx.config.scroll.pause_ms);
    let mut height = scroll_to(ctx, scroller, 0)?;
    let mut position = 0;
    while position < height {
        position += step;
        height = scroll_to(ctx, scroller, position)?;
        ctx.clock.sleep(pause);
    }
    scroll_to(ctx, scroller, 0)?;
    debug!(height, "model list swept");
    Ok(())
}

/// Set `scrollTop` and return the (possibly grown) `scrollHeight`.
fn scroll_to<S: Session>(ctx: &ScanContext<'_, S>, scroller: &S::Element, top: u64) -> Result<u64> {
    let script = format!(
        "arguments[0].scrollTop = {top}; return arguments[0].scrollHeight;"
    );
    let height = ctx
        .session
        .execute(&script, Some(scroller))
        .context("scroll model list")?;
    Ok(match height {
        Value::Number(number) => number.as_u64().unwrap_or(0),
        _ => 0,
    })
}

/// Walk every model container and add it to `aggregate`.
///
/// A model or theme that cannot be read is recorded as skipped; the scan
/// continues with the next one.
pub fn scan_catalog<S: Session>(
    ctx: &ScanContext<'_, S>,
    aggregate: &mut Aggregate,
) -> Result<PassSummary, PassError> {
    let containers = ctx
        .find_all(Scope::Page, &selectors::model_containers())
        .map_err(|reason| PassError::Navigation(format!("the Forms model list ({reason})")))?;
    let total = containers.len();
    info!(total, "scanning catalog");

    let mut summary = PassSummary::default();
    for (index, container) in containers.iter().enumerate() {
        ctx.check_interrupt()?;
        let result = scan_model(ctx, container);
        summary.record(&result);
        let label = match result {
            Ok((name, entry)) => {
                debug!(model = %name, themes = entry.themes.len(), "model scanned");
                aggregate.insert_model(name.clone(), entry);
                name
            }
            Err(reason) => {
                let reason = stop_on_interrupt(reason)?;
                let item = format!("model #{}", index + 1);
                warn!(%item, %reason, "model skipped");
                aggregate.skipped.push(Skipped::new(item.clone(), reason));
                item
            }
        };
        ctx.prompter.report_progress(index + 1, total, &label);
    }
    info!(
        models = aggregate.model_count(),
        themes = aggregate.theme_count(),
        views = aggregate.view_count(),
        "catalog complete"
    );
    Ok(summary)
}

fn scan_model<S: Session>(
    ctx: &ScanContext<'_, S>,
    container: &S::Element,
) -> Result<(String, ModelEntry), SkipReason> {
    let raw_id = ctx
        .session
        .attribute(container, "id")
        .map_err(|err| SkipReason::browser(&err))?
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SkipReason::not_found("model id"))?;
    let name = display_name(&raw_id);

    let kind = ctx
        .resolve(
            Scope::Within(container),
            &selectors::model_kind_links(),
            "model type link",
        )
        .ok()
        .and_then(|link| ctx.session.attribute(&link, "href").ok().flatten())
        .and_then(|href| model_type_from_href(&href));
    let mut catalog = ModelCatalog::new(raw_id, kind, &ctx.config.dynamic_type_prefix);

    let mut themes = IndexMap::new();
    let entries = ctx.find_all(Scope::Within(container), &selectors::theme_entries())?;
    for (index, entry) in entries.iter().enumerate() {
        match scan_theme(ctx, entry) {
            Ok(Some((label, theme))) => {
                themes.insert(label, theme);
            }
            Ok(None) => {}
            Err(reason) => {
                let item = format!("{name} theme #{}", index + 1);
                warn!(%item, %reason, "theme skipped");
                catalog.skipped.push(Skipped::new(item, reason));
            }
        }
    }

    Ok((
        name,
        ModelEntry {
            catalog,
            themes,
            methods: None,
        },
    ))
}

/// `Ok(None)` for the console's utility entries.
fn scan_theme<S: Session>(
    ctx: &ScanContext<'_, S>,
    entry: &S::Element,
) -> Result<Option<(String, ThemeEntry)>, SkipReason> {
    let label = ctx.find(Scope::Within(entry), &selectors::theme_label(), "theme label")?;
    let label = ctx.text(&label)?;
    if label.is_empty() {
        return Err(SkipReason::not_found("theme label text"));
    }
    if is_reserved_theme_label(&label) {
        return Ok(None);
    }

    let mut views = Vec::new();
    for view in ctx.find_all_first(Scope::Within(entry), &selectors::view_labels())? {
        let view = ctx.text(&view)?;
        if !view.is_empty() && !is_reserved_view_label(&view) {
            views.push(view);
        }
    }
    Ok(Some((
        label,
        ThemeEntry {
            views,
            ..ThemeEntry::default()
        },
    )))
}
