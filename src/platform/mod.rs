pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::{Commit, Label, PostOptions};

/// Posts the rendered comment.
#[async_trait]
pub trait CommentClient: Send + Sync {
    /// Post `body` to the pull request (by number) or commit (by revision).
    async fn post(&self, body: &str, opts: &PostOptions) -> Result<()>;
}

/// Reads and mutates labels on a pull request.
#[async_trait]
pub trait LabelClient: Send + Sync {
    async fn list_labels(&self, pr_number: u64) -> Result<Vec<Label>>;

    /// Add labels; returns the labels now attached, with their colors.
    async fn add_labels(&self, pr_number: u64, names: &[String]) -> Result<Vec<Label>>;

    /// Remove a label. Returns `AppError::LabelNotFound` when the label was
    /// not attached.
    async fn remove_label(&self, pr_number: u64, name: &str) -> Result<()>;

    /// Change a repository label's color.
    async fn update_label_color(&self, name: &str, color: &str) -> Result<Label>;
}

/// Resolves pull-request identity from commit history.
#[async_trait]
pub trait CommitsClient: Send + Sync {
    /// The number of the pull request whose merge produced `revision`.
    async fn merged_pr_number(&self, revision: &str) -> Result<u64>;

    /// Commits reachable from `revision`, newest first.
    async fn list(&self, revision: &str) -> Result<Vec<Commit>>;
}
