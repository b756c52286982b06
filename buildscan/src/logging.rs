//! Diagnostic tracing for scans.
//!
//! Goes to stderr so it never interleaves with prompts on stdout. Everything
//! the person running the scan needs to see goes through the console prompter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directive used when neither `RUST_LOG` nor `-v` asks for more.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Filter directive for a `-v` count. `RUST_LOG` wins when set and non-empty.
///
/// Verbosity only raises this crate's level; dependencies (fantoccini, hyper)
/// stay at `warn` so WebDriver chatter does not bury scan events.
pub fn directive(verbosity: u8, rust_log: Option<&str>) -> String {
    if let Some(env) = rust_log.map(str::trim).filter(|env| !env.is_empty()) {
        return env.to_string();
    }
    match verbosity {
        0 => DEFAULT_DIRECTIVE.to_string(),
        1 => format!("{DEFAULT_DIRECTIVE},buildscan=info"),
        2 => format!("{DEFAULT_DIRECTIVE},buildscan=debug"),
        _ => format!("{DEFAULT_DIRECTIVE},buildscan=trace"),
    }
}

/// Install the stderr subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=buildscan=debug buildscan scan acme.example.com
/// buildscan -vv scan acme.example.com
/// ```
pub fn init(verbosity: u8) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let wanted = directive(verbosity, rust_log.as_deref());
    let filter = EnvFilter::try_new(&wanted).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity > 1).compact())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_only_this_crate() {
        assert_eq!(directive(0, None), "warn");
        assert_eq!(directive(1, None), "warn,buildscan=info");
        assert_eq!(directive(2, None), "warn,buildscan=debug");
        assert_eq!(directive(7, None), "warn,buildscan=trace");
    }

    #[test]
    fn rust_log_overrides_unless_blank() {
        assert_eq!(directive(2, Some("fantoccini=debug")), "fantoccini=debug");
        assert_eq!(directive(1, Some("  ")), "warn,buildscan=info");
    }
}
