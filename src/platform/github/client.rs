use async_trait::async_trait;
use octocrab::Octocrab;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::{Commit, Label, PostOptions};
use crate::platform::{CommentClient, CommitsClient, LabelClient};

/// GitHub-backed implementation of the comment, label, and commits
/// clients, authenticated with a personal or CI-provided token.
pub struct GitHubClient {
    octocrab: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(config.token.clone());
        if let Some(base) = &config.base_url {
            builder = builder
                .base_uri(base.as_str())
                .map_err(|e| AppError::Config(format!("Invalid GitHub base URL: {e}")))?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self {
            octocrab,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
        })
    }
}

fn is_not_found(e: &octocrab::Error) -> bool {
    matches!(e, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

#[async_trait]
impl CommentClient for GitHubClient {
    async fn post(&self, body: &str, opts: &PostOptions) -> Result<()> {
        if let Some(number) = opts.number {
            self.octocrab
                .issues(&self.owner, &self.repo)
                .create_comment(number, body)
                .await?;
            return Ok(());
        }

        if opts.revision.is_empty() {
            return Err(AppError::GitHubApi(
                "cannot post a comment: neither a PR number nor a revision is known".to_string(),
            ));
        }

        // Commit comment; octocrab has no typed endpoint for this.
        let url = format!(
            "/repos/{}/{}/commits/{}/comments",
            self.owner, self.repo, opts.revision
        );
        let _: serde_json::Value = self
            .octocrab
            .post(&url, Some(&serde_json::json!({ "body": body })))
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to post commit comment: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl LabelClient for GitHubClient {
    async fn list_labels(&self, pr_number: u64) -> Result<Vec<Label>> {
        let page = self
            .octocrab
            .issues(&self.owner, &self.repo)
            .list_labels_for_issue(pr_number)
            .per_page(100)
            .send()
            .await?;

        Ok(page
            .items
            .into_iter()
            .map(|l| Label {
                name: l.name,
                color: l.color,
            })
            .collect())
    }

    async fn add_labels(&self, pr_number: u64, names: &[String]) -> Result<Vec<Label>> {
        let added = self
            .octocrab
            .issues(&self.owner, &self.repo)
            .add_labels(pr_number, names)
            .await?;

        Ok(added
            .into_iter()
            .map(|l| Label {
                name: l.name,
                color: l.color,
            })
            .collect())
    }

    async fn remove_label(&self, pr_number: u64, name: &str) -> Result<()> {
        let url = format!(
            "/repos/{}/{}/issues/{}/labels/{}",
            self.owner, self.repo, pr_number, name
        );
        let result: std::result::Result<serde_json::Value, octocrab::Error> =
            self.octocrab.delete(&url, None::<&()>).await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(AppError::LabelNotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_label_color(&self, name: &str, color: &str) -> Result<Label> {
        let url = format!("/repos/{}/{}/labels/{}", self.owner, self.repo, name);
        let updated: serde_json::Value = self
            .octocrab
            .patch(&url, Some(&serde_json::json!({ "color": color })))
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to update label color: {e}")))?;

        Ok(Label {
            name: updated["name"].as_str().unwrap_or(name).to_string(),
            color: updated["color"].as_str().unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl CommitsClient for GitHubClient {
    async fn merged_pr_number(&self, revision: &str) -> Result<u64> {
        let url = format!(
            "/repos/{}/{}/commits/{}/pulls",
            self.owner, self.repo, revision
        );
        let pulls: Vec<serde_json::Value> = self
            .octocrab
            .get(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to list pull requests for commit: {e}")))?;

        pulls
            .iter()
            .find(|pr| !pr["merged_at"].is_null())
            .and_then(|pr| pr["number"].as_u64())
            .ok_or_else(|| {
                AppError::GitHubApi(format!("no merged pull request found for revision {revision}"))
            })
    }

    async fn list(&self, revision: &str) -> Result<Vec<Commit>> {
        let url = format!(
            "/repos/{}/{}/commits?sha={}&per_page=100",
            self.owner, self.repo, revision
        );
        let commits: Vec<serde_json::Value> = self
            .octocrab
            .get(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to list commits: {e}")))?;

        Ok(commits
            .into_iter()
            .map(|c| Commit {
                sha: c["sha"].as_str().unwrap_or_default().to_string(),
                committed_at: c["commit"]["committer"]["date"]
                    .as_str()
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc)),
            })
            .collect())
    }
}
