use chrono::{DateTime, Utc};

/// A label attached to an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub color: String,
}

/// A commit reachable from a revision.
#[derive(Debug, Clone)]
pub struct Commit {
    pub sha: String,
    pub committed_at: Option<DateTime<Utc>>,
}

/// Select the most recent commit by committer date, falling back to list
/// order (the GitHub API returns newest first).
pub fn most_recent(commits: &[Commit]) -> Option<&Commit> {
    commits
        .iter()
        .filter(|c| c.committed_at.is_some())
        .max_by_key(|c| c.committed_at)
        .or_else(|| commits.first())
}

/// Where to post a comment: a pull request by number, or a commit by
/// revision when no number is known.
#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    pub number: Option<u64>,
    pub revision: String,
}
