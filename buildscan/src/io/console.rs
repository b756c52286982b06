//! Human-facing console I/O: prompts, progress, and a busy spinner.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Confirm, Select};

/// The human side of the session. Injected so scans run without a terminal in tests.
pub trait Prompter {
    /// Ask a yes/no question.
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Pick one of `options`; returns its index.
    fn choose(&self, prompt: &str, options: &[&str]) -> Result<usize>;

    fn report_progress(&self, current: usize, total: usize, label: &str);

    fn notify(&self, message: &str);

    /// Start a busy indicator for a blocking wait; stops when dropped.
    fn spinner(&self, _label: &str) -> Option<Spinner> {
        None
    }
}

/// Prompter backed by `dialoguer` on the controlling terminal.
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .interact()
            .context("failed to read confirmation")
    }

    fn choose(&self, prompt: &str, options: &[&str]) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact()
            .context("failed to read menu choice")
    }

    fn report_progress(&self, current: usize, total: usize, label: &str) {
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r{}", progress_line(current, total, label, 30));
        if current >= total {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }

    fn notify(&self, message: &str) {
        println!("{message}");
    }

    fn spinner(&self, label: &str) -> Option<Spinner> {
        Some(Spinner::start(label))
    }
}

/// Render `[#####-----] 5/10 label` with a bar `width` cells wide.
pub fn progress_line(current: usize, total: usize, label: &str, width: usize) -> String {
    let filled = if total == 0 {
        width
    } else {
        (current.min(total) * width) / total
    };
    format!(
        "[{}{}] {current}/{total} {label}",
        "#".repeat(filled),
        "-".repeat(width - filled)
    )
}

const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

/// Decorative busy indicator on its own thread.
///
/// Carries no data. Dropping the spinner signals the thread to stop and joins
/// it, so a blocking operation's result (or panic) passes through unchanged.
pub struct Spinner {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn start(label: &str) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let label = label.to_string();
        let handle = thread::spawn(move || {
            let mut frame = 0;
            while !flag.load(Ordering::Relaxed) {
                eprint!("\r{} {label}", SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]);
                let _ = io::stderr().flush();
                frame += 1;
                thread::sleep(Duration::from_millis(120));
            }
            eprint!("\r{}\r", " ".repeat(label.len() + 2));
            let _ = io::stderr().flush();
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
