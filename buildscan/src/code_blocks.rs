//! Code block pass: the four theme scripts from each theme's configuration modal.

use tracing::{debug, info, warn};

use crate::context::{PassError, PassSummary, ScanContext, stop_on_interrupt};
use crate::core::aggregate::{Aggregate, CodeBlocks, CodeField, Slot};
use crate::core::selectors;
use crate::core::skip::SkipReason;
use crate::io::session::{Scope, Session};

/// Visit every theme in the skeleton and fill its `code` slot.
pub fn collect_code_blocks<S: Session>(
    ctx: &ScanContext<'_, S>,
    aggregate: &mut Aggregate,
) -> Result<PassSummary, PassError> {
    let keys = aggregate.theme_keys();
    let total = keys.len();
    info!(total, "collecting code blocks");

    let mut summary = PassSummary::default();
    for (index, (model, theme)) in keys.iter().enumerate() {
        ctx.check_interrupt()?;
        let Some(raw_id) = aggregate
            .model(model)
            .map(|entry| entry.catalog.raw_id.clone())
        else {
            continue;
        };

        let result = collect_theme(ctx, &raw_id, theme);
        summary.record(&result);
        let (slot, interrupted) = match result {
            Ok(Extracted {
                blocks,
                interrupted,
            }) => {
                debug!(%model, %theme, configured = blocks.configured_count(), "code blocks read");
                (Slot::Collected(blocks), interrupted)
            }
            Err(reason) => {
                close_open_modal(ctx);
                let reason = stop_on_interrupt(reason)?;
                warn!(%model, %theme, %reason, "code blocks skipped");
                (Slot::Skipped(reason), false)
            }
        };
        aggregate.record_code(model, theme, slot);
        if interrupted {
            return Err(PassError::Interrupted);
        }
        ctx.prompter
            .report_progress(index + 1, total, &format!("{model} / {theme}"));
    }
    Ok(summary)
}

/// Blocks read from one modal.
///
/// `interrupted` means Ctrl-C arrived while the modal was closing: the blocks
/// are complete, but the pass stops after recording them.
struct Extracted {
    blocks: CodeBlocks,
    interrupted: bool,
}

fn collect_theme<S: Session>(
    ctx: &ScanContext<'_, S>,
    raw_id: &str,
    theme: &str,
) -> Result<Extracted, SkipReason> {
    let timeouts = &ctx.config.timeouts;
    let container = ctx.find(
        Scope::Page,
        &selectors::model_container(raw_id),
        "model container",
    )?;
    expand_model(ctx, &container)?;

    let entry = find_theme_entry(ctx, &container, theme)?;
    ctx.scroll_into_view(&entry);
    let trigger = ctx.resolve(
        Scope::Within(&entry),
        &selectors::theme_config_triggers(),
        "theme config trigger",
    )?;
    ctx.click(&trigger, "theme config trigger")?;

    // The open animation and the form content finish at different times.
    let modal = ctx.wait_for(
        Scope::Page,
        &selectors::config_modal_open(),
        timeouts.modal,
        "config modal",
    )?;
    ctx.wait_until(timeouts.modal, "config modal fields", || {
        for field in CodeField::ALL {
            if ctx
                .session
                .find(Scope::Within(&modal), &selectors::code_field(field))?
                .is_some()
            {
                return Ok(true);
            }
        }
        Ok(false)
    })?;

    let blocks = CodeBlocks::from_fields(|field| {
        ctx.field_text(Scope::Within(&modal), &selectors::code_field(field))
    });

    let interrupted = match close_modal(ctx, &modal) {
        Ok(()) => false,
        Err(SkipReason::Interrupted) => true,
        Err(reason) => {
            warn!(%theme, %reason, "config modal did not close; keeping extracted blocks");
            false
        }
    };
    Ok(Extracted {
        blocks,
        interrupted,
    })
}

/// Open the model container unless it already carries the open class.
fn expand_model<S: Session>(
    ctx: &ScanContext<'_, S>,
    container: &S::Element,
) -> Result<(), SkipReason> {
    let is_open = || -> anyhow::Result<bool> {
        Ok(ctx
            .session
            .attribute(container, "class")?
            .is_some_and(|class| {
                class
                    .split_whitespace()
                    .any(|token| token == selectors::MODEL_OPEN_CLASS)
            }))
    };
    if is_open().map_err(|err| SkipReason::browser(&err))? {
        return Ok(());
    }
    let toggle = ctx.find(
        Scope::Within(container),
        &selectors::model_toggle(),
        "model toggle",
    )?;
    ctx.click(&toggle, "model toggle")?;
    ctx.wait_until(ctx.config.timeouts.element, "model to expand", is_open)
}

fn find_theme_entry<S: Session>(
    ctx: &ScanContext<'_, S>,
    container: &S::Element,
    theme: &str,
) -> Result<S::Element, SkipReason> {
    for entry in ctx.find_all(Scope::Within(container), &selectors::theme_entries())? {
        let Ok(label) = ctx.find(Scope::Within(&entry), &selectors::theme_label(), "theme label")
        else {
            continue;
        };
        if ctx.text(&label)? == theme {
            return Ok(entry);
        }
    }
    Err(SkipReason::not_found(format!("theme entry {theme}")))
}

/// Click the close control and wait for the modal to go away.
fn close_modal<S: Session>(ctx: &ScanContext<'_, S>, modal: &S::Element) -> Result<(), SkipReason> {
    let close = ctx.find(
        Scope::Within(modal),
        &selectors::config_modal_close(),
        "config modal close control",
    )?;
    ctx.click(&close, "config modal close control")?;
    ctx.wait_until(ctx.config.timeouts.modal, "config modal to close", || {
        Ok(ctx
            .session
            .find(Scope::Page, &selectors::config_modal_open())?
            .is_none())
    })
}

/// Best effort, after a failure, so the next theme does not stack a second modal.
fn close_open_modal<S: Session>(ctx: &ScanContext<'_, S>) {
    let Ok(Some(modal)) = ctx
        .session
        .find(Scope::Page, &selectors::config_modal_open())
    else {
        return;
    };
    if let Err(reason) = close_modal(ctx, &modal) {
        debug!(%reason, "best-effort modal close failed");
    }
}
