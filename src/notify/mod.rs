mod labels;

use std::sync::Arc;

use crate::config::{Config, PullRequestIdentity};
use crate::error::{AppError, NotifyError, Result};
use crate::metadata;
use crate::platform::github::GitHubClient;
use crate::platform::types::{most_recent, PostOptions};
use crate::platform::{CommentClient, CommitsClient, LabelClient};
use crate::template::{CommentTemplates, CommonTemplate, TemplateKind};
use crate::terraform::{OperationKind, OutputParser, ParseResult};

/// Inputs for one notification.
#[derive(Debug, Clone, Default)]
pub struct RunParameters {
    pub combined_output: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub ci_name: String,
}

/// What a successful notification produced: the exit code the CI step
/// should propagate, and the pull-request identity as resolved during the
/// run (the configured identity is never mutated).
#[derive(Debug, Clone)]
pub struct NotifyOutcome {
    pub exit_code: i32,
    pub pr: PullRequestIdentity,
}

/// Drives one end-to-end notification: parse the Terraform output, decide
/// the result label, render the comment, embed the metadata marker, post.
pub struct Notifier {
    config: Config,
    parser: OutputParser,
    templates: CommentTemplates,
    comment: Arc<dyn CommentClient>,
    labels: Arc<dyn LabelClient>,
    commits: Arc<dyn CommitsClient>,
}

impl Notifier {
    pub fn new(
        config: Config,
        parser: OutputParser,
        comment: Arc<dyn CommentClient>,
        labels: Arc<dyn LabelClient>,
        commits: Arc<dyn CommitsClient>,
    ) -> Result<Self> {
        let templates = CommentTemplates::new(&config.templates)?;
        Ok(Self {
            config,
            parser,
            templates,
            comment,
            labels,
            commits,
        })
    }

    /// Build a notifier backed by the GitHub API.
    pub fn github(config: Config, parser: OutputParser) -> Result<Self> {
        let client = Arc::new(GitHubClient::new(&config.github)?);
        Self::new(config, parser, client.clone(), client.clone(), client)
    }

    pub async fn notify(&self, param: RunParameters) -> std::result::Result<NotifyOutcome, NotifyError> {
        let mut result = self.parser.parse(&param.combined_output);
        // The caller's observed exit code is authoritative.
        result.exit_code = param.exit_code;
        self.notify_parsed(result, &param).await
    }

    async fn notify_parsed(
        &self,
        result: ParseResult,
        param: &RunParameters,
    ) -> std::result::Result<NotifyOutcome, NotifyError> {
        let exit_code = result.exit_code;
        let fatal = |e: AppError| NotifyError::new(exit_code, e);

        let template_kind = if result.has_parse_error {
            TemplateKind::ParseError
        } else {
            if result.result.is_empty() {
                // Nothing meaningful to report.
                return Ok(NotifyOutcome {
                    exit_code,
                    pr: self.config.pr.clone(),
                });
            }
            if let Some(err) = &result.error {
                return Err(fatal(AppError::Parse(err.clone())));
            }
            TemplateKind::Default
        };

        // Label bookkeeping must never fail the run; failures surface in
        // the comment body instead.
        let mut err_msgs = Vec::new();
        if result.kind == OperationKind::Plan
            && self.config.pr.is_number()
            && self.config.result_labels.has_any_label_defined()
        {
            let pr_number = self.config.pr.number.unwrap_or_default();
            err_msgs.extend(labels::reconcile(&*self.labels, &self.config, pr_number, &result).await);
        }

        let value = CommonTemplate {
            result: result.result.clone(),
            changed_result: result.changed_result.clone(),
            change_outside_terraform: result.outside_terraform.clone(),
            warning: result.warning.clone(),
            has_destroy: result.has_destroy,
            link: self.config.ci.link.clone(),
            use_raw_output: self.config.use_raw_output,
            vars: self.config.vars.clone(),
            stdout: param.stdout.clone(),
            stderr: param.stderr.clone(),
            combined_output: param.combined_output.clone(),
            exit_code,
            error_messages: err_msgs,
            created_resources: result.created_resources.clone(),
            updated_resources: result.updated_resources.clone(),
            deleted_resources: result.deleted_resources.clone(),
            replaced_resources: result.replaced_resources.clone(),
        };
        let mut body = self.templates.render(template_kind, &value).map_err(fatal)?;

        let mut pr = self.config.pr.clone();
        if result.kind == OperationKind::Apply {
            match self.commits.merged_pr_number(&pr.revision).await {
                Ok(number) => pr.number = Some(number),
                Err(e) if !pr.is_number() => {
                    tracing::debug!(error = %e, revision = %pr.revision, "merged PR lookup failed, falling back to commit history");
                    let commits = self.commits.list(&pr.revision).await.map_err(fatal)?;
                    let latest = most_recent(&commits).ok_or_else(|| {
                        fatal(AppError::GitHubApi(format!(
                            "no commits found for revision {}",
                            pr.revision
                        )))
                    })?;
                    pr.revision = latest.sha.clone();
                }
                // A PR number is already known; the lookup was best-effort.
                Err(e) => {
                    tracing::debug!(error = %e, "merged PR lookup failed");
                }
            }
        }

        let marker =
            metadata::build_marker(&self.config, &pr, result.kind, &param.ci_name).map_err(fatal)?;
        tracing::debug!(comment = %marker, "embedded HTML comment");
        body.push_str(&marker);

        self.comment
            .post(
                &body,
                &PostOptions {
                    number: pr.number,
                    revision: pr.revision.clone(),
                },
            )
            .await
            .map_err(fatal)?;

        Ok(NotifyOutcome { exit_code, pr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResultLabels;
    use crate::platform::types::{Commit, Label};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeComment {
        posts: Mutex<Vec<(String, PostOptions)>>,
    }

    #[async_trait]
    impl CommentClient for FakeComment {
        async fn post(&self, body: &str, opts: &PostOptions) -> Result<()> {
            self.posts
                .lock()
                .unwrap()
                .push((body.to_string(), opts.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLabels {
        labels: Mutex<Vec<Label>>,
        mutations: Mutex<Vec<String>>,
        fail_add: bool,
        fail_remove: Option<String>,
        not_found_remove: Option<String>,
        default_color: String,
    }

    impl FakeLabels {
        fn with_labels(names: &[(&str, &str)]) -> Self {
            Self {
                labels: Mutex::new(
                    names
                        .iter()
                        .map(|(n, c)| Label {
                            name: n.to_string(),
                            color: c.to_string(),
                        })
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn names(&self) -> Vec<String> {
            self.labels
                .lock()
                .unwrap()
                .iter()
                .map(|l| l.name.clone())
                .collect()
        }

        fn color_of(&self, name: &str) -> Option<String> {
            self.labels
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.name == name)
                .map(|l| l.color.clone())
        }

        fn take_mutations(&self) -> Vec<String> {
            std::mem::take(&mut self.mutations.lock().unwrap())
        }
    }

    #[async_trait]
    impl LabelClient for FakeLabels {
        async fn list_labels(&self, _pr_number: u64) -> Result<Vec<Label>> {
            Ok(self.labels.lock().unwrap().clone())
        }

        async fn add_labels(&self, _pr_number: u64, names: &[String]) -> Result<Vec<Label>> {
            if self.fail_add {
                return Err(AppError::GitHubApi("rate limited".to_string()));
            }
            let mut labels = self.labels.lock().unwrap();
            for name in names {
                labels.push(Label {
                    name: name.clone(),
                    color: self.default_color.clone(),
                });
                self.mutations.lock().unwrap().push(format!("add:{name}"));
            }
            Ok(labels.clone())
        }

        async fn remove_label(&self, _pr_number: u64, name: &str) -> Result<()> {
            if self.not_found_remove.as_deref() == Some(name) {
                return Err(AppError::LabelNotFound);
            }
            if self.fail_remove.as_deref() == Some(name) {
                return Err(AppError::GitHubApi("forbidden".to_string()));
            }
            self.labels.lock().unwrap().retain(|l| l.name != name);
            self.mutations.lock().unwrap().push(format!("remove:{name}"));
            Ok(())
        }

        async fn update_label_color(&self, name: &str, color: &str) -> Result<Label> {
            let mut labels = self.labels.lock().unwrap();
            for l in labels.iter_mut() {
                if l.name == name {
                    l.color = color.to_string();
                }
            }
            self.mutations
                .lock()
                .unwrap()
                .push(format!("color:{name}:{color}"));
            Ok(Label {
                name: name.to_string(),
                color: color.to_string(),
            })
        }
    }

    #[derive(Default)]
    struct FakeCommits {
        merged_pr: Option<u64>,
        commits: Vec<Commit>,
        fail_list: bool,
    }

    #[async_trait]
    impl CommitsClient for FakeCommits {
        async fn merged_pr_number(&self, revision: &str) -> Result<u64> {
            self.merged_pr.ok_or_else(|| {
                AppError::GitHubApi(format!("no merged pull request found for revision {revision}"))
            })
        }

        async fn list(&self, _revision: &str) -> Result<Vec<Commit>> {
            if self.fail_list {
                return Err(AppError::GitHubApi("commit listing failed".to_string()));
            }
            Ok(self.commits.clone())
        }
    }

    fn commit(sha: &str, ts: i64) -> Commit {
        Commit {
            sha: sha.to_string(),
            committed_at: Some(chrono::Utc.timestamp_opt(ts, 0).unwrap()),
        }
    }

    fn labeled_config() -> Config {
        Config {
            pr: PullRequestIdentity {
                number: Some(7),
                revision: "abc123".to_string(),
            },
            result_labels: ResultLabels {
                add_or_update_label: Some("add-or-update".to_string()),
                destroy_label: Some("destroy".to_string()),
                no_changes_label: Some("no-changes".to_string()),
                no_changes_label_color: Some("cccccc".to_string()),
                plan_error_label: Some("error".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    struct Harness {
        notifier: Notifier,
        comment: Arc<FakeComment>,
        labels: Arc<FakeLabels>,
    }

    fn harness(config: Config, parser: OutputParser, labels: FakeLabels, commits: FakeCommits) -> Harness {
        let comment = Arc::new(FakeComment::default());
        let labels = Arc::new(labels);
        let notifier = Notifier::new(
            config,
            parser,
            comment.clone(),
            labels.clone(),
            Arc::new(commits),
        )
        .unwrap();
        Harness {
            notifier,
            comment,
            labels,
        }
    }

    fn parsed(kind: OperationKind) -> ParseResult {
        let mut result = ParseResult::empty(kind);
        result.result = "Plan: 1 to add, 0 to change, 0 to destroy.".to_string();
        result.has_add_or_update_only = true;
        result
    }

    #[tokio::test]
    async fn test_parse_error_uses_parse_error_template() {
        let h = harness(
            Config::default(),
            OutputParser::apply(),
            FakeLabels::default(),
            FakeCommits {
                merged_pr: Some(3),
                ..Default::default()
            },
        );
        let outcome = h
            .notifier
            .notify(RunParameters {
                combined_output: "unrecognizable".to_string(),
                exit_code: 2,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 2);
        let posts = h.comment.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].0.contains("Failed to parse the result"));
        assert!(posts[0].0.contains("unrecognizable"));
    }

    #[tokio::test]
    async fn test_structured_error_is_fatal_without_posting() {
        let h = harness(
            Config::default(),
            OutputParser::plan(),
            FakeLabels::default(),
            FakeCommits::default(),
        );
        let mut result = parsed(OperationKind::Plan);
        result.error = Some("plan failed".to_string());
        result.exit_code = 1;

        let err = h
            .notifier
            .notify_parsed(result, &RunParameters::default())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code, 1);
        assert!(err.source.to_string().contains("plan failed"));
        assert!(h.comment.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_result_posts_nothing() {
        let h = harness(
            Config::default(),
            OutputParser::plan(),
            FakeLabels::default(),
            FakeCommits::default(),
        );
        let mut result = ParseResult::empty(OperationKind::Plan);
        result.error = Some("ignored".to_string());
        result.exit_code = 3;

        let outcome = h
            .notifier
            .notify_parsed(result, &RunParameters::default())
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 3);
        assert!(h.comment.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plan_posts_comment_with_marker() {
        let mut config = labeled_config();
        config.pr.number = None; // skip labeling, keep the post path
        let h = harness(
            config,
            OutputParser::plan(),
            FakeLabels::default(),
            FakeCommits::default(),
        );
        let outcome = h
            .notifier
            .notify(RunParameters {
                combined_output: "Plan: 1 to add, 0 to change, 0 to destroy.\n".to_string(),
                ci_name: "github-actions".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        let posts = h.comment.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        let metadata = crate::metadata::extract(&posts[0].0).unwrap().unwrap();
        assert_eq!(metadata.command, "plan");
        assert_eq!(metadata.sha1, "abc123");
    }

    #[tokio::test]
    async fn test_reconcile_no_changes_scenario() {
        let config = labeled_config();
        let labels = FakeLabels::with_labels(&[("destroy", "ff0000"), ("unrelated", "00ff00")]);

        let mut result = ParseResult::empty(OperationKind::Plan);
        result.has_no_changes = true;

        let errs = labels::reconcile(&labels, &config, 7, &result).await;
        assert!(errs.is_empty());
        let mut names = labels.names();
        names.sort();
        assert_eq!(names, vec!["no-changes", "unrelated"]);
        assert_eq!(labels.color_of("no-changes").as_deref(), Some("cccccc"));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let config = labeled_config();
        let labels = FakeLabels::with_labels(&[("destroy", "ff0000")]);

        let mut result = ParseResult::empty(OperationKind::Plan);
        result.has_no_changes = true;

        let errs = labels::reconcile(&labels, &config, 7, &result).await;
        assert!(errs.is_empty());
        assert!(!labels.take_mutations().is_empty());

        let errs = labels::reconcile(&labels, &config, 7, &result).await;
        assert!(errs.is_empty());
        assert!(labels.take_mutations().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_priority_add_or_update_over_destroy() {
        let config = labeled_config();
        let labels = FakeLabels::default();

        let mut result = ParseResult::empty(OperationKind::Plan);
        result.has_add_or_update_only = true;
        result.has_destroy = true;

        labels::reconcile(&labels, &config, 7, &result).await;
        assert_eq!(labels.names(), vec!["add-or-update"]);
    }

    #[tokio::test]
    async fn test_reconcile_ignores_not_found_removal() {
        let config = labeled_config();
        let mut labels = FakeLabels::with_labels(&[("destroy", "ff0000")]);
        labels.not_found_remove = Some("destroy".to_string());

        let mut result = ParseResult::empty(OperationKind::Plan);
        result.has_no_changes = true;

        let errs = labels::reconcile(&labels, &config, 7, &result).await;
        assert!(errs.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_records_removal_failure_and_continues() {
        let config = labeled_config();
        let mut labels = FakeLabels::with_labels(&[("destroy", "ff0000"), ("error", "ffaa00")]);
        labels.fail_remove = Some("destroy".to_string());

        let mut result = ParseResult::empty(OperationKind::Plan);
        result.has_no_changes = true;

        let errs = labels::reconcile(&labels, &config, 7, &result).await;
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("remove a label destroy:"));
        // The other stale label was still removed and the target added.
        assert!(labels.names().contains(&"no-changes".to_string()));
        assert!(!labels.names().contains(&"error".to_string()));
    }

    #[tokio::test]
    async fn test_add_failure_surfaces_in_comment_body() {
        let mut config = labeled_config();
        config.result_labels.add_or_update_label = None;
        let mut labels = FakeLabels::default();
        labels.fail_add = true;

        let h = harness(config, OutputParser::plan(), labels, FakeCommits::default());
        let outcome = h
            .notifier
            .notify(RunParameters {
                combined_output: "Plan: 0 to add, 0 to change, 1 to destroy.\n".to_string(),
                exit_code: 0,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        let posts = h.comment.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].0.contains("add a label destroy: "));
    }

    #[tokio::test]
    async fn test_apply_resolves_merged_pr_number() {
        let config = Config {
            pr: PullRequestIdentity {
                number: None,
                revision: "abc123".to_string(),
            },
            ..Default::default()
        };
        let h = harness(
            config,
            OutputParser::apply(),
            FakeLabels::default(),
            FakeCommits {
                merged_pr: Some(42),
                ..Default::default()
            },
        );
        let outcome = h
            .notifier
            .notify(RunParameters {
                combined_output:
                    "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.pr.number, Some(42));
        let posts = h.comment.posts.lock().unwrap();
        assert_eq!(posts[0].1.number, Some(42));
    }

    #[tokio::test]
    async fn test_apply_fallback_picks_most_recent_commit() {
        let config = Config {
            pr: PullRequestIdentity {
                number: None,
                revision: "abc123".to_string(),
            },
            ..Default::default()
        };
        let h = harness(
            config,
            OutputParser::apply(),
            FakeLabels::default(),
            FakeCommits {
                merged_pr: None,
                commits: vec![commit("c1", 100), commit("c2", 200)],
                ..Default::default()
            },
        );
        let outcome = h
            .notifier
            .notify(RunParameters {
                combined_output:
                    "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.pr.number, None);
        assert_eq!(outcome.pr.revision, "c2");
        let posts = h.comment.posts.lock().unwrap();
        assert_eq!(posts[0].1.revision, "c2");
    }

    #[tokio::test]
    async fn test_apply_fallback_with_empty_commit_list_is_fatal() {
        let config = Config {
            pr: PullRequestIdentity {
                number: None,
                revision: "abc123".to_string(),
            },
            ..Default::default()
        };
        let h = harness(
            config,
            OutputParser::apply(),
            FakeLabels::default(),
            FakeCommits::default(),
        );
        let err = h
            .notifier
            .notify(RunParameters {
                combined_output:
                    "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(err.source.to_string().contains("no commits found"));
        assert!(h.comment.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_lookup_failure_with_known_number_is_benign() {
        let config = Config {
            pr: PullRequestIdentity {
                number: Some(9),
                revision: "abc123".to_string(),
            },
            ..Default::default()
        };
        let h = harness(
            config,
            OutputParser::apply(),
            FakeLabels::default(),
            FakeCommits {
                merged_pr: None,
                fail_list: true,
                ..Default::default()
            },
        );
        let outcome = h
            .notifier
            .notify(RunParameters {
                combined_output:
                    "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.pr.number, Some(9));
        assert_eq!(h.comment.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_never_touches_labels() {
        let config = labeled_config();
        let labels = FakeLabels::with_labels(&[("destroy", "ff0000")]);
        let h = harness(
            config,
            OutputParser::apply(),
            labels,
            FakeCommits {
                merged_pr: Some(7),
                ..Default::default()
            },
        );
        h.notifier
            .notify(RunParameters {
                combined_output:
                    "Apply complete! Resources: 0 added, 0 changed, 1 destroyed.\n".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(h.labels.take_mutations().is_empty());
    }
}
