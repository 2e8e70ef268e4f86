//! Parsing of labeled completions into structured results.
//!
//! Parsing runs in two phases over the immutable completion text:
//!
//! 1. A line scanner. A line starting with a known label (`TITLE:`,
//!    `SUMMARY:`, ...) opens a section that collects the rest of that line
//!    and every following non-label line.
//! 2. For task mode only, a regex pass over the whole text, used when the
//!    scanner found neither a summary nor technical notes.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::engine::request::GenerationMode;
use crate::engine::result::{CommitResult, CommitType, Generation, TaskResult};

/// Reasons a completion cannot be turned into a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Commit mode output without a usable DESCRIPTION field.
    #[error("response has no DESCRIPTION field")]
    MissingDescription,
}

/// Parses a completion for the given mode.
pub fn parse(raw: &str, mode: GenerationMode) -> Result<Generation, ParseError> {
    match mode {
        GenerationMode::Task { .. } => Ok(Generation::Task(parse_task(raw))),
        GenerationMode::Commit => parse_commit(raw).map(Generation::Commit),
    }
}

/// Parses a task completion. Never fails; missing fields stay empty.
pub fn parse_task(raw: &str) -> TaskResult {
    let scanned = scan_task(raw);
    if scanned.summary.is_empty() && scanned.technical.is_empty() {
        regex_task_fallback(raw, scanned)
    } else {
        scanned
    }
}

/// Parses a commit completion.
pub fn parse_commit(raw: &str) -> Result<CommitResult, ParseError> {
    let sections = scan_sections(raw, commit_label_regex());
    let field = |label: &str| sections.get(label).map_or("", String::as_str);

    let description = field("DESCRIPTION")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if description.is_empty() {
        return Err(ParseError::MissingDescription);
    }

    let (breaking, breaking_description) = normalize_breaking(field("BREAKING"));

    Ok(CommitResult {
        commit_type: normalize_type(field("TYPE")),
        scope: normalize_optional(field("SCOPE"))
            .trim_matches(|c: char| c == '(' || c == ')')
            .to_string(),
        description,
        body: normalize_optional(field("BODY")).to_string(),
        breaking,
        breaking_description,
    })
}

fn scan_task(raw: &str) -> TaskResult {
    let mut sections = scan_sections(raw, task_label_regex());
    TaskResult {
        title: sections.remove("TITLE").unwrap_or_default(),
        summary: sections.remove("SUMMARY").unwrap_or_default(),
        technical: sections.remove("TECHNICAL").unwrap_or_default(),
    }
}

/// Splits `raw` into labeled sections. Labels are returned upper-cased;
/// the first non-empty occurrence of a label wins.
fn scan_sections(raw: &str, labels: &Regex) -> HashMap<String, String> {
    let mut ordered: Vec<(String, Vec<&str>)> = Vec::new();

    for line in raw.lines() {
        if line.trim_start().starts_with("```") {
            continue;
        }
        if let Some(caps) = labels.captures(line) {
            let label = caps[1].to_ascii_uppercase();
            let rest = caps.get(2).map_or("", |m| m.as_str());
            ordered.push((label, vec![rest]));
        } else if let Some((_, lines)) = ordered.last_mut() {
            lines.push(line);
        }
    }

    let mut sections: HashMap<String, String> = HashMap::new();
    for (label, lines) in ordered {
        let content = lines.join("\n").trim().to_string();
        let slot = sections.entry(label).or_default();
        if slot.is_empty() {
            *slot = content;
        }
    }
    sections
}

/// Second-chance extraction for task completions that ignored the format.
/// Only fields the scanner left empty are filled.
fn regex_task_fallback(raw: &str, scanned: TaskResult) -> TaskResult {
    let patterns = task_fallback_regexes();
    let fill = |scanned: String, re: &Regex| {
        if !scanned.is_empty() {
            return scanned;
        }
        re.captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    TaskResult {
        title: fill(scanned.title, &patterns.title),
        summary: fill(scanned.summary, &patterns.summary),
        technical: fill(scanned.technical, &patterns.technical),
    }
}

fn normalize_type(raw: &str) -> CommitType {
    let keyword: String = raw
        .trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'')
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    keyword.parse().unwrap_or_default()
}

/// Maps the literal placeholders models use for "nothing" to empty.
fn normalize_optional(raw: &str) -> &str {
    let trimmed = raw.trim();
    if is_placeholder(trimmed) {
        ""
    } else {
        trimmed
    }
}

fn is_placeholder(value: &str) -> bool {
    let lowered = value
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '.' | '(' | ')'))
        .to_ascii_lowercase();
    matches!(lowered.as_str(), "" | "empty" | "none" | "n/a")
}

fn normalize_breaking(raw: &str) -> (bool, String) {
    let value = normalize_optional(raw);
    match value.to_ascii_lowercase().as_str() {
        "" | "no" | "false" => (false, String::new()),
        "yes" | "true" => (true, String::new()),
        _ => (true, value.to_string()),
    }
}

fn task_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| label_regex("TITLE|SUMMARY|TECHNICAL"))
}

fn commit_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| label_regex("TYPE|SCOPE|DESCRIPTION|BODY|BREAKING"))
}

/// Matches `LABEL: rest`, tolerating Markdown headings and bold markers
/// such as `## TITLE:` or `**TITLE:**`.
#[allow(clippy::expect_used)] // the pattern is a compile-time constant
fn label_regex(labels: &str) -> Regex {
    Regex::new(&format!(
        r"^\s*(?:#+\s*)?(?:\*\*)?({labels})(?:\*\*)?\s*:(?:\*\*)?[ \t]*(.*)$"
    ))
    .expect("label regex is valid")
}

struct TaskFallbackRegexes {
    title: Regex,
    summary: Regex,
    technical: Regex,
}

#[allow(clippy::expect_used)] // the patterns are compile-time constants
fn task_fallback_regexes() -> &'static TaskFallbackRegexes {
    static RE: OnceLock<TaskFallbackRegexes> = OnceLock::new();
    RE.get_or_init(|| TaskFallbackRegexes {
        title: Regex::new(
            r"(?i)\btitle\s*[:\-]\s*(.*?)(?:\s*\bsummary\s*[:\-]|\s*\btechnical\s*[:\-]|\n|$)",
        )
        .expect("title regex is valid"),
        summary: Regex::new(r"(?is)\bsummary\s*[:\-]\s*(.*?)\s*(?:\btechnical\s*[:\-]|$)")
            .expect("summary regex is valid"),
        technical: Regex::new(r"(?is)\btechnical\s*[:\-]\s*(.*)$")
            .expect("technical regex is valid"),
    })
}
