//! Prompt templates for task and commit generation.
//!
//! Every prompt asks for the exact `LABEL:` line format that
//! [`crate::engine::parser`] scans for.

use crate::engine::request::{CommitHints, GenerationMode, GenerationRequest};
use crate::engine::result::CommitType;

/// Shared preamble for every mode.
const PREAMBLE: &str = "You are an experienced software engineer reviewing a git diff. \
Base your answer only on the changes shown: lines starting with + were added, \
lines starting with - were removed. Do not invent changes that are not in the diff.";

const TASK_CONCISE_INSTRUCTIONS: &str = r"Describe this change as a task for an issue tracker.

Answer in exactly this format, with each label at the start of its own line and nothing before the first label:

TITLE: <one line, imperative mood, at most 72 characters>
SUMMARY: <two or three sentences on what changed and why>
TECHNICAL: <short notes on how it was implemented>";

const TASK_DETAILED_INSTRUCTIONS: &str = r"Describe this change as a detailed task for an issue tracker.

Answer in exactly this format, with each label at the start of its own line and nothing before the first label. Sub-bullets go on the lines after their label:

TITLE: <one line, imperative mood, at most 72 characters>
SUMMARY:
- What changed and why
- Impact on users or other components
- Acceptance criteria the change satisfies
TECHNICAL:
- Implementation approach and key files touched
- Risks and edge cases
- How the change should be tested";

const COMMIT_INSTRUCTIONS: &str = r"Write a conventional commit message for this change.

Answer in exactly this format, with each label at the start of its own line and nothing before the first label:

TYPE: <one of: feat, fix, docs, style, refactor, perf, test, chore, ci, build>
SCOPE: <short lower-case area of the codebase, or none>
DESCRIPTION: <imperative, lower-case, no trailing period, at most 72 characters>
BODY: <what changed and why, wrapped at 72 characters, or none>
BREAKING: <description of the breaking change, or none>";

/// Builds the single user message sent to the provider.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let instructions = match request.mode() {
        GenerationMode::Task { detailed: false } => TASK_CONCISE_INSTRUCTIONS.to_string(),
        GenerationMode::Task { detailed: true } => TASK_DETAILED_INSTRUCTIONS.to_string(),
        GenerationMode::Commit => commit_instructions(request.commit_hints()),
    };

    format!(
        "{PREAMBLE}\n\n{instructions}\n\nDiff:\n```diff\n{}\n```",
        request.diff_text().trim_end()
    )
}

fn commit_instructions(hints: Option<&CommitHints>) -> String {
    let mut out = String::from(COMMIT_INSTRUCTIONS);
    out.push_str("\n\nDirectives:\n");
    out.push_str(&type_directive(hints.and_then(|h| h.commit_type)));
    out.push('\n');

    match hints.and_then(|h| h.scope.as_deref()).map(str::trim) {
        Some(scope) if !scope.is_empty() => {
            out.push_str(&format!("- SCOPE must be exactly: {scope}"));
        }
        _ => out.push_str("- Choose SCOPE yourself, or answer none if no single area fits."),
    }
    out.push('\n');

    if hints.is_some_and(|h| h.breaking) {
        out.push_str("- This IS a breaking change: describe what breaks after BREAKING.");
    } else {
        out.push_str("- Decide yourself whether the change is breaking; answer none if it is not.");
    }
    out
}

fn type_directive(commit_type: Option<CommitType>) -> String {
    match commit_type {
        Some(commit_type) => format!("- TYPE must be exactly: {commit_type}"),
        None => "- Choose TYPE yourself from the allowed list.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: GenerationMode) -> GenerationRequest {
        GenerationRequest::builder("+console.log('x')\n", mode)
            .build()
            .unwrap()
    }

    #[test]
    fn task_prompt_requests_task_labels() {
        for detailed in [false, true] {
            let prompt = build_prompt(&request(GenerationMode::Task { detailed }));
            for label in ["TITLE:", "SUMMARY:", "TECHNICAL:"] {
                assert!(prompt.contains(label), "{label} missing");
            }
            assert!(prompt.contains("+console.log('x')\n```"));
        }
    }

    #[test]
    fn detailed_prompt_asks_for_sub_bullets() {
        let prompt = build_prompt(&request(GenerationMode::Task { detailed: true }));
        assert!(prompt.contains("Acceptance criteria"));
        assert!(prompt.contains("tested"));
        let concise = build_prompt(&request(GenerationMode::Task { detailed: false }));
        assert!(!concise.contains("Acceptance criteria"));
    }

    #[test]
    fn commit_prompt_requests_commit_labels() {
        let prompt = build_prompt(&request(GenerationMode::Commit));
        for label in ["TYPE:", "SCOPE:", "DESCRIPTION:", "BODY:", "BREAKING:"] {
            assert!(prompt.contains(label), "{label} missing");
        }
        assert!(prompt.contains("Choose TYPE yourself"));
    }

    #[test]
    fn commit_hints_become_directives() {
        let request = GenerationRequest::builder("+x", GenerationMode::Commit)
            .commit_hints(CommitHints {
                commit_type: Some(CommitType::Perf),
                scope: Some("cache".to_string()),
                breaking: true,
            })
            .build()
            .unwrap();
        let prompt = build_prompt(&request);
        assert!(prompt.contains("TYPE must be exactly: perf"));
        assert!(prompt.contains("SCOPE must be exactly: cache"));
        assert!(prompt.contains("This IS a breaking change"));
    }
}
