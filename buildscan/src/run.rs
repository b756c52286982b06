//! Interactive session: login, the scan passes, and the main menu.
//!
//! The catalog pass always runs; the code, workflow and methods passes follow
//! in that order, each gated by the command line or a confirmation. A pass
//! that stops early keeps whatever it already recorded.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Local;
use tracing::{info, warn};
use url::Url;

use crate::catalog::{count_models, scan_catalog};
use crate::code_blocks::collect_code_blocks;
use crate::context::{PassError, PassSummary, ScanContext};
use crate::core::aggregate::Aggregate;
use crate::core::selectors::DashboardSection;
use crate::io::report::{ReportMeta, report_stem, write_report};
use crate::io::session::Session;
use crate::io::snapshot::{Snapshot, write_snapshot};
use crate::methods::scan_methods;
use crate::navigate::{open_admin_panel, open_instance, open_section, wait_for_login};
use crate::workflow::scan_workflows;

/// Optional pass decisions taken on the command line. `None` asks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassGates {
    pub code: Option<bool>,
    pub workflow: Option<bool>,
    pub methods: Option<bool>,
}

impl PassGates {
    pub fn all(enabled: bool) -> Self {
        Self {
            code: Some(enabled),
            workflow: Some(enabled),
            methods: Some(enabled),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub instance_url: Url,
    pub output_dir: PathBuf,
    pub gates: PassGates,
}

/// How an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    /// The dashboard never appeared after login.
    LoginFailed,
    /// Ctrl-C before the first scan started.
    Interrupted,
}

/// Aggregate plus the passes that contributed to it.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub aggregate: Aggregate,
    /// Pass names in run order; an interrupted pass is suffixed.
    pub passes: Vec<String>,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

const MENU: [&str; 4] = ["Generate report", "Re-run scan", "Save snapshot", "Exit"];

/// Accept `acme.example.com`, `@acme.example.com` or a full URL.
pub fn normalize_instance_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_start_matches('@');
    if trimmed.is_empty() {
        bail!("instance URL is empty");
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).with_context(|| format!("invalid instance URL {raw:?}"))?;
    if url.host_str().is_none_or(str::is_empty) {
        bail!("instance URL {raw:?} has no host");
    }
    Ok(url)
}

/// Drive one interactive session from the instance URL to the menu's exit.
pub fn run_session<S: Session>(ctx: &ScanContext<'_, S>, options: &RunOptions) -> Result<RunOutcome> {
    open_instance(ctx.session, &options.instance_url)?;

    match wait_for_login(ctx) {
        Ok(true) => {}
        Ok(false) => return Ok(RunOutcome::LoginFailed),
        Err(PassError::Interrupted) => return Ok(RunOutcome::Interrupted),
        Err(err) => return Err(err).context("wait for login"),
    }
    match open_admin_panel(ctx) {
        Ok(()) => {}
        Err(PassError::Interrupted) => return Ok(RunOutcome::Interrupted),
        Err(err) => return Err(err).context("open the admin panel"),
    }

    let mut scan = scan_all(ctx, &options.gates)?;
    loop {
        announce(ctx, &scan);
        match ctx.prompter.choose("What next?", &MENU)? {
            0 => {
                let now = Local::now();
                let meta = ReportMeta::new(&options.instance_url, scan.passes.clone(), now);
                let paths = write_report(&options.output_dir, &scan.aggregate, &meta, now)?;
                ctx.prompter
                    .notify(&format!("Report written to {}", paths.markdown.display()));
            }
            1 => {
                info!("re-running scan");
                scan = scan_all(ctx, &options.gates)?;
            }
            2 => {
                let now = Local::now();
                let meta = ReportMeta::new(&options.instance_url, scan.passes.clone(), now);
                let path = options
                    .output_dir
                    .join(format!("{}.json", report_stem(&meta.client, now)));
                write_snapshot(
                    &path,
                    &Snapshot {
                        meta,
                        aggregate: scan.aggregate.clone(),
                    },
                )?;
                ctx.prompter
                    .notify(&format!("Snapshot saved to {}", path.display()));
            }
            _ => return Ok(RunOutcome::Finished),
        }
    }
}

/// Build a fresh aggregate: catalog, then the gated passes in fixed order.
pub fn scan_all<S: Session>(ctx: &ScanContext<'_, S>, gates: &PassGates) -> Result<ScanResult> {
    ctx.interrupt.clear();
    let mut result = ScanResult::default();

    let catalog = run_catalog(ctx, &mut result.aggregate);
    if finish_pass(ctx, "catalog", catalog, &mut result)? == Flow::Stop {
        return Ok(result);
    }
    if result.aggregate.model_count() == 0 {
        ctx.prompter
            .notify("No models were cataloged; skipping the remaining passes.");
        return Ok(result);
    }

    if gate(
        ctx,
        gates.code,
        "Collect theme code blocks? This opens every theme's configuration modal.",
    )? {
        let code = collect_code_blocks(ctx, &mut result.aggregate);
        if finish_pass(ctx, "code", code, &mut result)? == Flow::Stop {
            return Ok(result);
        }
    }

    if gate(
        ctx,
        gates.workflow,
        "Scan workflows (states, validations and actions)?",
    )? {
        let workflow = open_section(ctx, DashboardSection::Workflow)
            .and_then(|()| scan_workflows(ctx, &mut result.aggregate));
        if finish_pass(ctx, "workflow", workflow, &mut result)? == Flow::Stop {
            return Ok(result);
        }
    }

    if gate(ctx, gates.methods, "Scan model methods?")? {
        let methods = open_section(ctx, DashboardSection::CardSettings)
            .and_then(|()| scan_methods(ctx, &mut result.aggregate));
        finish_pass(ctx, "methods", methods, &mut result)?;
    }
    Ok(result)
}

fn run_catalog<S: Session>(
    ctx: &ScanContext<'_, S>,
    aggregate: &mut Aggregate,
) -> Result<PassSummary, PassError> {
    open_section(ctx, DashboardSection::Forms)?;
    let count = count_models(ctx)?;
    info!(count, "model count confirmed");
    scan_catalog(ctx, aggregate)
}

fn gate<S: Session>(ctx: &ScanContext<'_, S>, decided: Option<bool>, prompt: &str) -> Result<bool> {
    match decided {
        Some(decided) => Ok(decided),
        None => ctx.prompter.confirm(prompt),
    }
}

/// Apply the pass boundary policy.
///
/// An interrupt keeps partial results and skips the remaining passes. A
/// navigation failure skips only this pass. Session errors end the run.
fn finish_pass<S: Session>(
    ctx: &ScanContext<'_, S>,
    name: &str,
    outcome: Result<PassSummary, PassError>,
    result: &mut ScanResult,
) -> Result<Flow> {
    match outcome {
        Ok(summary) => {
            info!(pass = name, visited = summary.visited, skipped = summary.skipped, "pass finished");
            ctx.prompter.notify(&format!(
                "The {name} pass finished: {} visited, {} skipped.",
                summary.visited, summary.skipped
            ));
            result.passes.push(name.to_string());
            Ok(Flow::Continue)
        }
        Err(PassError::Interrupted) => {
            warn!(pass = name, "pass interrupted");
            ctx.prompter.notify(&format!(
                "The {name} pass was interrupted; keeping partial results."
            ));
            result.passes.push(format!("{name} (interrupted)"));
            result.interrupted = true;
            ctx.interrupt.clear();
            Ok(Flow::Stop)
        }
        Err(PassError::Navigation(target)) => {
            warn!(pass = name, %target, "pass skipped");
            ctx.prompter
                .notify(&format!("Skipping the {name} pass: could not reach {target}."));
            Ok(Flow::Continue)
        }
        Err(PassError::Session(err)) => Err(err.context(format!("{name} pass"))),
    }
}

fn announce<S: Session>(ctx: &ScanContext<'_, S>, scan: &ScanResult) {
    let aggregate = &scan.aggregate;
    ctx.prompter.notify(&format!(
        "Scanned {} models, {} themes, {} views.",
        aggregate.model_count(),
        aggregate.theme_count(),
        aggregate.view_count()
    ));
}
