//! Classification of quilt output into typed outcomes.
//!
//! Each invocation's captured text maps to exactly one [`Outcome`]. The push
//! patterns overlap (a fuzz report also carries an offset, and every applied
//! report ends with `Now at patch`), so rules live in ordered tables and the
//! first match wins.
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Typed result of one quilt invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SetupOk,
    SetupFailed(String),
    FullyApplied,
    SeriesEmpty,
    FuzzApplied(String),
    OffsetApplied(String),
    ReverseApplied(String),
    CleanApplied(String),
    ApplyFailed(String),
    /// Push output that no rule recognises.
    Unrecognized(String),
    RefreshOk,
    RefreshFailed(String),
}

type Build = for<'c, 'h> fn(&'c Captures<'h>, &str) -> Outcome;

struct Rule {
    pattern: Regex,
    build: Build,
}

const PUSH_RULES: &[(&str, Build)] = &[
    (r"File series fully applied", |_, _| Outcome::FullyApplied),
    (r"No patches in series", |_, _| Outcome::SeriesEmpty),
    (r"Patch (\S+) can be reverse-applied", |caps, _| {
        Outcome::ReverseApplied(patch_name(caps))
    }),
    (r"Patch \S+ does not apply \(enforce with -f\)", |_, raw| {
        Outcome::ApplyFailed(raw.to_string())
    }),
    (
        r"Applying patch (\S+) .*Hunk #\d+ succeeded at \d+ with fuzz [1-9]\d*.*Now at patch \S+",
        |caps, _| Outcome::FuzzApplied(patch_name(caps)),
    ),
    (
        r"Applying patch (\S+) .*Hunk #\d+ succeeded at \d+.*\(offset -?\d+ lines?\).*Now at patch \S+",
        |caps, _| Outcome::OffsetApplied(patch_name(caps)),
    ),
    (r"Applying patch (\S+) .*Now at patch \S+", |caps, _| {
        Outcome::CleanApplied(patch_name(caps))
    }),
];

const SETUP_OK: &str = r"Unpacking archive ";
const REFRESH_OK: &str = r"Refreshed patch \S+";

/// Collapse a multi-line capture into the single line the rules match against.
pub fn normalize(raw: &str) -> String {
    raw.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify the output of `quilt setup`.
pub fn classify_setup(raw: &str) -> Outcome {
    if static_regex(&SETUP_REGEX, SETUP_OK).is_match(&normalize(raw)) {
        Outcome::SetupOk
    } else {
        Outcome::SetupFailed(raw.to_string())
    }
}

/// Classify the output of one `quilt push`.
///
/// Output matching no rule yields [`Outcome::Unrecognized`] so the caller can
/// fail loudly instead of looping on text it does not understand.
pub fn classify_push(raw: &str) -> Outcome {
    let line = normalize(raw);
    push_rules()
        .iter()
        .find_map(|rule| {
            rule.pattern
                .captures(&line)
                .map(|caps| (rule.build)(&caps, raw))
        })
        .unwrap_or_else(|| Outcome::Unrecognized(raw.to_string()))
}

/// Classify the output of `quilt refresh`.
pub fn classify_refresh(raw: &str) -> Outcome {
    if static_regex(&REFRESH_REGEX, REFRESH_OK).is_match(&normalize(raw)) {
        Outcome::RefreshOk
    } else {
        Outcome::RefreshFailed(raw.to_string())
    }
}

static SETUP_REGEX: OnceLock<Regex> = OnceLock::new();
static REFRESH_REGEX: OnceLock<Regex> = OnceLock::new();
static PUSH_TABLE: OnceLock<Vec<Rule>> = OnceLock::new();

fn static_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid classifier pattern"))
}

fn push_rules() -> &'static [Rule] {
    PUSH_TABLE.get_or_init(|| {
        PUSH_RULES
            .iter()
            .map(|(pattern, build)| Rule {
                pattern: Regex::new(pattern).expect("valid classifier pattern"),
                build: *build,
            })
            .collect()
    })
}

// quilt prints patch paths relative to the tree; series lines hold bare names.
fn patch_name(caps: &Captures<'_>) -> String {
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    name.strip_prefix("patches/").unwrap_or(name).to_string()
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
