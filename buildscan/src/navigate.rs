//! Getting from a fresh browser to a dashboard section of the admin console.

use anyhow::{Result, bail};
use tracing::{info, warn};
use url::Url;

use crate::context::{PassError, ScanContext};
use crate::core::selectors::{self, ADMIN_URL_MARKER, DashboardSection};
use crate::core::skip::SkipReason;
use crate::io::session::{Scope, Session};

/// Open the instance URL. A browser left on `data:,` never reached it.
pub fn open_instance<S: Session>(session: &S, url: &Url) -> Result<()> {
    info!(%url, "opening instance");
    session.navigate(url.as_str())?;
    let current = session.current_url()?;
    if current == "data:," {
        bail!("navigation to {url} failed; check the network connection");
    }
    Ok(())
}

/// Wait for the human to log in inside the browser.
///
/// Returns `false` when the dashboard never appeared or the browser is still
/// on a login page.
pub fn wait_for_login<S: Session>(ctx: &ScanContext<'_, S>) -> Result<bool, PassError> {
    let timeout_ms = ctx.config.timeouts.login;
    ctx.prompter.notify(&format!(
        "Log in using the browser window (select a profile if prompted). \
         The scan continues once the dashboard loads (waiting up to {} minutes).",
        timeout_ms.div_ceil(60_000)
    ));

    let waited = {
        let _spinner = ctx.prompter.spinner("Waiting for the dashboard");
        ctx.wait_for(
            Scope::Page,
            &selectors::login_marker(),
            timeout_ms,
            "post-login dashboard",
        )
    };
    match waited {
        Ok(_) => {}
        Err(SkipReason::Interrupted) => return Err(PassError::Interrupted),
        Err(reason) => {
            warn!(%reason, "login not detected");
            ctx.prompter
                .notify(&format!("Could not detect the dashboard: {reason}"));
            return Ok(false);
        }
    }

    let url = ctx.session.current_url()?;
    if url.to_lowercase().contains("login") {
        ctx.prompter
            .notify("Still on the login page. Make sure you are logged in.");
        return Ok(false);
    }
    info!("login detected");
    Ok(true)
}

/// Follow the admin panel link and wait for the configuration screen.
pub fn open_admin_panel<S: Session>(ctx: &ScanContext<'_, S>) -> Result<(), PassError> {
    let timeout_ms = ctx.config.timeouts.navigation;
    let to_admin = |reason| navigation_error("the admin panel", reason);

    let link = ctx
        .wait_for(
            Scope::Page,
            &selectors::login_marker(),
            timeout_ms,
            "admin panel link",
        )
        .map_err(to_admin)?;
    ctx.click(&link, "admin panel link").map_err(to_admin)?;
    ctx.wait_until(timeout_ms, "admin panel url", || {
        Ok(ctx.session.current_url()?.contains(ADMIN_URL_MARKER))
    })
    .map_err(to_admin)?;
    info!("admin panel open");
    Ok(())
}

/// Pick a dashboard section by its exact label and wait until it is selected.
pub fn open_section<S: Session>(
    ctx: &ScanContext<'_, S>,
    section: DashboardSection,
) -> Result<(), PassError> {
    let timeout_ms = ctx.config.timeouts.navigation;
    let target = format!("the {} section", section.label());
    let to_section = |reason| navigation_error(&target, reason);

    let link = ctx
        .wait_for(
            Scope::Page,
            &selectors::dashboard_link(section),
            timeout_ms,
            "dashboard picker entry",
        )
        .map_err(to_section)?;
    ctx.click(&link, "dashboard picker entry")
        .map_err(to_section)?;
    ctx.wait_for(
        Scope::Page,
        &selectors::dashboard_selected(section),
        timeout_ms,
        "selected dashboard entry",
    )
    .map_err(to_section)?;
    info!(section = section.label(), "section open");
    Ok(())
}

fn navigation_error(target: &str, reason: SkipReason) -> PassError {
    match reason {
        SkipReason::Interrupted => PassError::Interrupted,
        other => PassError::Navigation(format!("{target} ({other})")),
    }
}
