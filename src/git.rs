//! Diff sources: the current repository or a patch file.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use git2::{Diff, DiffFormat, DiffOptions, Repository};

/// Which side of the index to diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffScope {
    /// `HEAD` against the index, like `git diff --cached`.
    Staged,
    /// The index against the working tree, like `git diff`.
    Unstaged,
}

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Opens the repository containing the current directory.
    pub fn open() -> Result<Self> {
        let repo = Repository::discover(".").context("Not in a git repository")?;
        Ok(Self { repo })
    }

    /// Opens the repository at `path`.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path).context("Failed to open git repository")?;
        Ok(Self { repo })
    }

    /// Renders the diff for `scope` as a unified patch.
    pub fn diff(&self, scope: DiffScope) -> Result<String> {
        let mut options = DiffOptions::new();
        options.context_lines(3);

        let diff = match scope {
            DiffScope::Staged => {
                // An unborn HEAD diffs against the empty tree.
                let head_tree = match self.repo.head() {
                    Ok(head) => Some(head.peel_to_tree().context("Failed to get HEAD tree")?),
                    Err(_) => None,
                };
                self.repo
                    .diff_tree_to_index(head_tree.as_ref(), None, Some(&mut options))
                    .context("Failed to diff HEAD against the index")?
            }
            DiffScope::Unstaged => self
                .repo
                .diff_index_to_workdir(None, Some(&mut options))
                .context("Failed to diff the index against the working tree")?,
        };

        render_patch(&diff)
    }
}

fn render_patch(diff: &Diff<'_>) -> Result<String> {
    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let content = std::str::from_utf8(line.content()).unwrap_or("<binary>\n");
        let prefix = match line.origin() {
            '+' => "+",
            '-' => "-",
            ' ' => " ",
            _ => "",
        };
        patch.push_str(prefix);
        patch.push_str(content);
        true
    })
    .context("Failed to format diff")?;
    Ok(patch)
}

/// Reads a patch from `path`, or from stdin when `path` is `-`.
pub fn read_diff_file(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read diff from stdin")?;
        return Ok(content);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read diff file: {}", path.display()))
}
