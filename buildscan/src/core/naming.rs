//! Naming and parsing rules for identifiers scraped from the admin console.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Theme labels that are console utilities, not themes.
pub const RESERVED_THEME_LABELS: [&str; 5] = [
    "New Theme",
    "Retired Themes",
    "Export",
    "Filter",
    "Visualizations",
];

/// Placeholder row at the end of every view listing.
pub const RESERVED_VIEW_LABEL: &str = "New View";

static MODEL_TYPE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)model_theme(?:\[|%5B)model_type(?:\]|%5D)=([^&#]+)")
        .expect("model type pattern is valid")
});

static STATE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)\s*\(([^()]*)\)$").expect("state header pattern is valid")
});

/// Derive the human-readable model name from its raw identifier.
///
/// Underscores become spaces and every word is title-cased: the first letter
/// after any non-letter is upper-cased, the rest lower-cased.
pub fn display_name(raw_id: &str) -> String {
    let mut out = String::with_capacity(raw_id.len());
    let mut at_word_start = true;
    for ch in raw_id.trim().chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Extract the `model_theme[model_type]` query value from an action link.
pub fn model_type_from_href(href: &str) -> Option<String> {
    MODEL_TYPE_PARAM
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `None` when the kind is unknown, otherwise whether it carries the dynamic prefix.
pub fn is_dynamic_kind(kind: Option<&str>, dynamic_prefix: &str) -> Option<bool> {
    kind.map(|kind| kind.starts_with(dynamic_prefix))
}

/// Split a `Display (internal)` state header. Headers without the
/// parenthetical yield the raw text for both names.
pub fn parse_state_header(header: &str) -> (String, String) {
    let header = header.trim();
    if let Some(caps) = STATE_HEADER.captures(header) {
        let display = caps.get(1).map_or("", |m| m.as_str()).trim();
        let internal = caps.get(2).map_or("", |m| m.as_str()).trim();
        if !display.is_empty() && !internal.is_empty() {
            return (display.to_string(), internal.to_string());
        }
    }
    (header.to_string(), header.to_string())
}

/// Identifier guesses for re-locating a model outside the Forms section.
///
/// Statically and dynamically defined models use different identifier
/// schemes there, so every format is tried in order: verbatim, spaces
/// removed, CamelCase, dynamic prefix + CamelCase, lower-case underscore
/// joined. Duplicates are dropped, keeping the first occurrence.
pub fn candidate_identifiers(display: &str, dynamic_prefix: &str) -> Vec<String> {
    let display = display.trim();
    let words: Vec<&str> = display.split_whitespace().collect();
    let camel: String = words.iter().map(|word| capitalize(word)).collect();
    let candidates = [
        display.to_string(),
        words.concat(),
        camel.clone(),
        format!("{dynamic_prefix}{camel}"),
        words.join("_").to_lowercase(),
    ];

    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

/// Workflow id from the query string of a "new event" link.
///
/// Accepts both `workflow_id=7` and nested `machine_event[workflow_id]=7`
/// keys; relative links are resolved against a placeholder origin.
pub fn workflow_id_from_href(href: &str) -> Option<u64> {
    let parsed = Url::parse(href).or_else(|_| {
        Url::parse("http://console.invalid/").and_then(|base| base.join(href))
    });
    let parsed = parsed.ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "workflow_id" || key.ends_with("[workflow_id]"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

pub fn is_reserved_theme_label(label: &str) -> bool {
    RESERVED_THEME_LABELS.contains(&label)
}

pub fn is_reserved_view_label(label: &str) -> bool {
    label == RESERVED_VIEW_LABEL
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
