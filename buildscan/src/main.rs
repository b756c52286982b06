//! Documentation scanner for a hosted low-code admin console.
//!
//! Opens the console in a WebDriver-controlled Chrome, waits for the human to
//! log in, walks the configuration screens, and writes a Markdown report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use buildscan::context::{Interrupt, ScanContext};
use buildscan::exit_codes;
use buildscan::io::clock::SystemClock;
use buildscan::io::config::{DEFAULT_CONFIG_FILE, ScanConfig, load_config, write_config};
use buildscan::io::console::ConsolePrompter;
use buildscan::io::report::write_snapshot_report;
use buildscan::io::snapshot::load_snapshot;
use buildscan::io::webdriver::WebDriverSession;
use buildscan::logging;
use buildscan::run::{PassGates, RunOptions, RunOutcome, normalize_instance_url, run_session};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "buildscan",
    version,
    about = "Document the build of a low-code admin console instance"
)]
struct Cli {
    /// Raise diagnostic logging on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `buildscan.toml` if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Log in to an instance and scan its configuration interactively.
    Scan {
        /// Instance URL; a bare host gets `https://`.
        url: String,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Output directory (overrides `output_dir` from the config).
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        gates: GateArgs,
        /// Run every optional pass without asking.
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-render a saved snapshot as Markdown.
    Render {
        snapshot: PathBuf,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(clap::Args)]
struct GateArgs {
    /// Collect theme code blocks.
    #[arg(long, overrides_with = "no_code")]
    code: bool,
    #[arg(long)]
    no_code: bool,
    /// Scan workflows.
    #[arg(long, overrides_with = "no_workflow")]
    workflow: bool,
    #[arg(long)]
    no_workflow: bool,
    /// Scan model methods.
    #[arg(long, overrides_with = "no_methods")]
    methods: bool,
    #[arg(long)]
    no_methods: bool,
}

impl GateArgs {
    fn resolve(&self, yes: bool) -> PassGates {
        let decide = |on: bool, off: bool| match (on, off) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ if yes => Some(true),
            _ => None,
        };
        PassGates {
            code: decide(self.code, self.no_code),
            workflow: decide(self.workflow, self.no_workflow),
            methods: decide(self.methods, self.no_methods),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force, config } => cmd_init(&config, force),
        Command::Scan {
            url,
            config,
            out,
            gates,
            yes,
        } => cmd_scan(&url, &config, out, gates.resolve(yes)),
        Command::Render { snapshot, out } => cmd_render(&snapshot, &out),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ScanConfig::default())?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_scan(raw_url: &str, config_path: &Path, out: Option<PathBuf>, gates: PassGates) -> Result<i32> {
    let config = load_config(config_path)?;
    let instance_url = normalize_instance_url(raw_url)?;
    let options = RunOptions {
        instance_url,
        output_dir: out.unwrap_or_else(|| config.output_dir.clone()),
        gates,
    };

    let session = WebDriverSession::connect(&config)?;
    let interrupt = Interrupt::default();
    session.install_interrupt_handler(interrupt.clone());

    let outcome = {
        let prompter = ConsolePrompter;
        let clock = SystemClock::new();
        let ctx = ScanContext {
            session: &session,
            prompter: &prompter,
            clock: &clock,
            config: &config,
            interrupt,
        };
        run_session(&ctx, &options)
    };

    if let Err(err) = session.close() {
        warn!(error = %format!("{err:#}"), "browser session did not close cleanly");
    }

    Ok(match outcome.context("scan session")? {
        RunOutcome::Finished => exit_codes::OK,
        RunOutcome::LoginFailed => {
            eprintln!("Login was not detected; nothing was scanned.");
            exit_codes::ABORTED
        }
        RunOutcome::Interrupted => exit_codes::INTERRUPTED,
    })
}

fn cmd_render(snapshot_path: &Path, out: &Path) -> Result<i32> {
    let snapshot = load_snapshot(snapshot_path)?;
    let paths = write_snapshot_report(out, &snapshot, Local::now())?;
    println!("{}", paths.markdown.display());
    Ok(exit_codes::OK)
}
