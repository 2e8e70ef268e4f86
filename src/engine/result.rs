//! Structured generation results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::error::ProviderFailure;
use crate::engine::provider::ProviderId;
use crate::engine::request::CommitHints;

/// Task description extracted from a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// One-line title.
    pub title: String,
    /// What changed and why; may span several lines.
    pub summary: String,
    /// Implementation notes.
    pub technical: String,
}

impl TaskResult {
    /// Renders the task as a small Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            out.push_str(&format!("# {}\n\n", self.title));
        }
        if !self.summary.is_empty() {
            out.push_str(&format!("## Summary\n\n{}\n\n", self.summary));
        }
        if !self.technical.is_empty() {
            out.push_str(&format!("## Technical notes\n\n{}\n", self.technical));
        }
        out.trim_end().to_string()
    }
}

/// Conventional commit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    /// New feature.
    Feat,
    /// Bug fix.
    Fix,
    /// Documentation only.
    Docs,
    /// Formatting, no behaviour change.
    Style,
    /// Restructuring without behaviour change.
    Refactor,
    /// Performance improvement.
    Perf,
    /// Tests only.
    Test,
    /// Maintenance.
    #[default]
    Chore,
    /// CI configuration.
    Ci,
    /// Build system or dependencies.
    Build,
}

impl CommitType {
    /// All types, in the order prompts list them.
    pub const ALL: [Self; 10] = [
        Self::Feat,
        Self::Fix,
        Self::Docs,
        Self::Style,
        Self::Refactor,
        Self::Perf,
        Self::Test,
        Self::Chore,
        Self::Ci,
        Self::Build,
    ];

    /// Lower-case keyword.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Docs => "docs",
            Self::Style => "style",
            Self::Refactor => "refactor",
            Self::Perf => "perf",
            Self::Test => "test",
            Self::Chore => "chore",
            Self::Ci => "ci",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown commit type '{s}'"))
    }
}

/// Conventional commit extracted from a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// Commit type.
    #[serde(rename = "type")]
    pub commit_type: CommitType,
    /// Optional scope; empty when absent.
    pub scope: String,
    /// Subject line description. Never empty on success.
    pub description: String,
    /// Optional body; empty when absent.
    pub body: String,
    /// Whether the change is breaking.
    pub breaking: bool,
    /// Explanation for the `BREAKING CHANGE:` footer; may be empty.
    pub breaking_description: String,
}

impl CommitResult {
    /// Overrides parsed fields with the caller's directives.
    pub fn apply_hints(&mut self, hints: &CommitHints) {
        if let Some(commit_type) = hints.commit_type {
            self.commit_type = commit_type;
        }
        if let Some(scope) = hints.scope.as_deref().map(str::trim) {
            self.scope = scope.to_string();
        }
        if hints.breaking {
            self.breaking = true;
        }
    }

    /// `type(scope)!: description`.
    pub fn header(&self) -> String {
        let scope = if self.scope.is_empty() {
            String::new()
        } else {
            format!("({})", self.scope)
        };
        let bang = if self.breaking { "!" } else { "" };
        format!("{}{scope}{bang}: {}", self.commit_type, self.description)
    }

    /// Full commit message: header, optional body, optional breaking footer.
    pub fn to_message(&self) -> String {
        let mut message = self.header();
        if !self.body.is_empty() {
            message.push_str("\n\n");
            message.push_str(&self.body);
        }
        if self.breaking && !self.breaking_description.is_empty() {
            message.push_str("\n\nBREAKING CHANGE: ");
            message.push_str(&self.breaking_description);
        }
        message
    }
}

/// Either kind of structured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Generation {
    /// Task mode output.
    Task(TaskResult),
    /// Commit mode output.
    Commit(CommitResult),
}

impl Generation {
    /// Returns the task result, if this is one.
    pub fn as_task(&self) -> Option<&TaskResult> {
        match self {
            Self::Task(task) => Some(task),
            Self::Commit(_) => None,
        }
    }

    /// Returns the commit result, if this is one.
    pub fn as_commit(&self) -> Option<&CommitResult> {
        match self {
            Self::Commit(commit) => Some(commit),
            Self::Task(_) => None,
        }
    }
}

/// A successful dispatch.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Parsed output.
    pub generation: Generation,
    /// Provider that produced it.
    pub provider: ProviderId,
    /// Concrete model used.
    pub model: String,
    /// Earlier candidates that failed before this one succeeded.
    pub failures: Vec<ProviderFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_commit() -> CommitResult {
        CommitResult {
            commit_type: CommitType::Feat,
            scope: "engine".to_string(),
            description: "add community fallback".to_string(),
            body: "Route to the shared key when no hosted provider is configured.".to_string(),
            breaking: false,
            breaking_description: String::new(),
        }
    }

    #[test]
    fn commit_message_rendering() {
        let mut commit = sample_commit();
        commit.breaking = true;
        commit.breaking_description = "engine config key renamed".to_string();
        insta::assert_snapshot!(commit.to_message(), @r"
        feat(engine)!: add community fallback

        Route to the shared key when no hosted provider is configured.

        BREAKING CHANGE: engine config key renamed
        ");
    }

    #[test]
    fn header_without_scope() {
        let commit = CommitResult {
            scope: String::new(),
            ..sample_commit()
        };
        assert_eq!(commit.header(), "feat: add community fallback");
    }

    #[test]
    fn hints_override_parsed_fields() {
        let mut commit = sample_commit();
        commit.apply_hints(&CommitHints {
            commit_type: Some(CommitType::Fix),
            scope: Some(" cli ".to_string()),
            breaking: true,
        });
        assert_eq!(commit.header(), "fix(cli)!: add community fallback");
    }

    #[test]
    fn commit_type_parsing() {
        assert_eq!("FEAT".parse::<CommitType>().unwrap(), CommitType::Feat);
        assert!("feature".parse::<CommitType>().is_err());
    }

    #[test]
    fn task_markdown_skips_empty_sections() {
        let task = TaskResult {
            title: "Add log".to_string(),
            summary: String::new(),
            technical: "trivial".to_string(),
        };
        assert_eq!(
            task.to_markdown(),
            "# Add log\n\n## Technical notes\n\ntrivial"
        );
    }

    #[test]
    fn generation_serializes_with_kind_tag() {
        let json = serde_json::to_value(Generation::Commit(sample_commit())).unwrap();
        assert_eq!(json["kind"], "commit");
        assert_eq!(json["type"], "feat");
    }
}
