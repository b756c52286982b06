//! Markdown report rendering and output files.
//!
//! The report is rendered from the final aggregate through a minijinja
//! template. A JSON snapshot with the same file stem is written alongside so a
//! run can be re-rendered later without the browser.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::core::aggregate::{
    ActionEntry, Aggregate, CodeField, MethodEntry, ModelEntry, Slot, ThemeEntry,
};
use crate::core::invariants::validate_aggregate;
use crate::core::skip::Skipped;
use crate::io::snapshot::{Snapshot, write_snapshot};

const REPORT_TEMPLATE: &str = include_str!("templates/report.md");

/// Client header shown at the top of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub instance_url: String,
    /// Instance host, used as the client name.
    pub client: String,
    pub generated_at: String,
    /// Passes that ran, in order.
    pub passes: Vec<String>,
}

impl ReportMeta {
    pub fn new(instance_url: &Url, passes: Vec<String>, now: DateTime<Local>) -> Self {
        Self {
            instance_url: instance_url.to_string(),
            client: instance_url.host_str().unwrap_or("unknown").to_string(),
            generated_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            passes,
        }
    }
}

/// Files produced by one report generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub snapshot: Option<PathBuf>,
}

/// `build_documentation_<client>_<YYYYmmdd_HHMMSS>`; the timestamp keeps
/// earlier reports from being overwritten.
pub fn report_stem(client: &str, now: DateTime<Local>) -> String {
    let client: String = client
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    format!(
        "build_documentation_{client}_{}",
        now.format("%Y%m%d_%H%M%S")
    )
}

/// Write the Markdown report and its JSON snapshot into `out_dir`.
pub fn write_report(
    out_dir: &Path,
    aggregate: &Aggregate,
    meta: &ReportMeta,
    now: DateTime<Local>,
) -> Result<ReportPaths> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;
    let stem = report_stem(&meta.client, now);

    let snapshot_path = out_dir.join(format!("{stem}.json"));
    write_snapshot(
        &snapshot_path,
        &Snapshot {
            meta: meta.clone(),
            aggregate: aggregate.clone(),
        },
    )?;

    let markdown = write_markdown(&out_dir.join(format!("{stem}.md")), aggregate, meta)?;
    info!(report = %markdown.display(), snapshot = %snapshot_path.display(), "report written");
    Ok(ReportPaths {
        markdown,
        snapshot: Some(snapshot_path),
    })
}

/// Re-render a saved snapshot into `out_dir` (Markdown only).
pub fn write_snapshot_report(
    out_dir: &Path,
    snapshot: &Snapshot,
    now: DateTime<Local>,
) -> Result<ReportPaths> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;
    let stem = report_stem(&snapshot.meta.client, now);
    let markdown = write_markdown(
        &out_dir.join(format!("{stem}.md")),
        &snapshot.aggregate,
        &snapshot.meta,
    )?;
    Ok(ReportPaths {
        markdown,
        snapshot: None,
    })
}

fn write_markdown(path: &Path, aggregate: &Aggregate, meta: &ReportMeta) -> Result<PathBuf> {
    let rendered = render_markdown(aggregate, meta)?;
    fs::write(path, rendered).with_context(|| format!("write report {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Render the aggregate as a Markdown document.
pub fn render_markdown(aggregate: &Aggregate, meta: &ReportMeta) -> Result<String> {
    for violation in validate_aggregate(aggregate) {
        warn!(%violation, "aggregate invariant violated");
    }

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("report.md", REPORT_TEMPLATE)
        .context("load report template")?;
    let template = env.get_template("report.md")?;

    let models: Vec<ModelView<'_>> = aggregate
        .models
        .iter()
        .map(|(name, model)| ModelView::new(name, model))
        .collect();
    debug!(models = models.len(), "rendering report");

    let rendered = template
        .render(context! {
            meta => meta,
            counts => context! {
                models => aggregate.model_count(),
                themes => aggregate.theme_count(),
                views => aggregate.view_count(),
            },
            skipped => describe_skips(&aggregate.skipped),
            models => models,
        })
        .context("render report template")?;
    Ok(rendered)
}

fn describe_skips(skipped: &[Skipped]) -> Vec<String> {
    skipped
        .iter()
        .map(|skip| format!("{}: {}", skip.item, skip.reason))
        .collect()
}

#[derive(Serialize)]
struct ModelView<'a> {
    name: &'a str,
    raw_id: &'a str,
    kind: Option<&'a str>,
    dynamic: &'static str,
    skipped: Vec<String>,
    themes: Vec<ThemeView<'a>>,
    methods: Option<MethodsView<'a>>,
    methods_skipped: Option<String>,
}

impl<'a> ModelView<'a> {
    fn new(name: &'a str, model: &'a ModelEntry) -> Self {
        let (methods, methods_skipped) = match &model.methods {
            Some(Slot::Collected(list)) => (
                Some(MethodsView {
                    entries: list.methods.iter().collect(),
                    skipped: describe_skips(&list.skipped),
                }),
                None,
            ),
            Some(Slot::Skipped(reason)) => (None, Some(reason.to_string())),
            None => (None, None),
        };
        Self {
            name,
            raw_id: &model.catalog.raw_id,
            kind: model.catalog.kind.as_deref(),
            dynamic: match model.catalog.is_dynamic {
                Some(true) => "yes",
                Some(false) => "no",
                None => "unknown",
            },
            skipped: describe_skips(&model.catalog.skipped),
            themes: model
                .themes
                .iter()
                .map(|(name, theme)| ThemeView::new(name, theme))
                .collect(),
            methods,
            methods_skipped,
        }
    }
}

#[derive(Serialize)]
struct ThemeView<'a> {
    name: &'a str,
    views: &'a [String],
    code: Option<Vec<BlockView<'a>>>,
    code_skipped: Option<String>,
    workflow: Option<WorkflowView<'a>>,
    workflow_skipped: Option<String>,
}

impl<'a> ThemeView<'a> {
    fn new(name: &'a str, theme: &'a ThemeEntry) -> Self {
        let (code, code_skipped) = match &theme.code {
            Some(Slot::Collected(blocks)) => (
                Some(
                    CodeField::ALL
                        .iter()
                        .map(|field| {
                            let text = blocks.get(*field);
                            BlockView {
                                label: field.label(),
                                text,
                                configured: text != crate::core::aggregate::NOT_CONFIGURED,
                            }
                        })
                        .collect(),
                ),
                None,
            ),
            Some(Slot::Skipped(reason)) => (None, Some(reason.to_string())),
            None => (None, None),
        };
        let (workflow, workflow_skipped) = match &theme.workflow {
            Some(Slot::Collected(entry)) => (
                Some(WorkflowView {
                    id: entry.workflow_id,
                    states: entry
                        .states
                        .iter()
                        .map(|state| StateView {
                            display_name: &state.display_name,
                            internal_name: &state.internal_name,
                            blocks: state
                                .validation_blocks
                                .iter()
                                .map(|(field, text)| BlockView {
                                    label: field.label(),
                                    text,
                                    configured: true,
                                })
                                .collect(),
                            actions: state.actions.iter().collect(),
                            skipped: describe_skips(&state.skipped),
                        })
                        .collect(),
                    skipped: describe_skips(&entry.skipped),
                }),
                None,
            ),
            Some(Slot::Skipped(reason)) => (None, Some(reason.to_string())),
            None => (None, None),
        };
        Self {
            name,
            views: &theme.views,
            code,
            code_skipped,
            workflow,
            workflow_skipped,
        }
    }
}

#[derive(Serialize)]
struct BlockView<'a> {
    label: &'static str,
    text: &'a str,
    configured: bool,
}

#[derive(Serialize)]
struct WorkflowView<'a> {
    id: Option<u64>,
    states: Vec<StateView<'a>>,
    skipped: Vec<String>,
}

#[derive(Serialize)]
struct StateView<'a> {
    display_name: &'a str,
    internal_name: &'a str,
    blocks: Vec<BlockView<'a>>,
    actions: Vec<&'a ActionEntry>,
    skipped: Vec<String>,
}

#[derive(Serialize)]
struct MethodsView<'a> {
    entries: Vec<&'a MethodEntry>,
    skipped: Vec<String>,
}
