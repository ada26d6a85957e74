use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::{Config, PullRequestIdentity};
use crate::error::{AppError, Result};
use crate::terraform::OperationKind;

const MARKER_PREFIX: &str = "<!-- tfcomment:";
const MARKER_SUFFIX: &str = " -->";

/// Machine-readable metadata embedded in every posted comment as a hidden
/// HTML comment, so later runs can find and supersede earlier comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "Program")]
    pub program: String,
    #[serde(rename = "Vars")]
    pub vars: HashMap<String, String>,
    #[serde(rename = "SHA1")]
    pub sha1: String,
    #[serde(rename = "PRNumber", default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(rename = "Target", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(rename = "Command")]
    pub command: String,
    /// CI-provider fields, keyed by field name (e.g. "WorkflowName").
    #[serde(flatten)]
    pub ci_env: BTreeMap<String, String>,
}

/// Build the marker for one notification. Vars are filtered down to the
/// configured allow-list.
pub fn build_marker(
    cfg: &Config,
    pr: &PullRequestIdentity,
    kind: OperationKind,
    ci_name: &str,
) -> Result<String> {
    build_marker_with_env(cfg, pr, kind, ci_name, |name| std::env::var(name).ok())
}

pub fn build_marker_with_env(
    cfg: &Config,
    pr: &PullRequestIdentity,
    kind: OperationKind,
    ci_name: &str,
    getenv: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let vars: HashMap<String, String> = cfg
        .embedded_var_names
        .iter()
        .filter_map(|name| cfg.vars.get(name).map(|v| (name.clone(), v.clone())))
        .collect();

    let target = cfg
        .vars
        .get("target")
        .filter(|t| !t.is_empty())
        .cloned();

    let metadata = Metadata {
        program: "tfcomment".to_string(),
        vars,
        sha1: pr.revision.clone(),
        pr_number: pr.number,
        target,
        command: match kind {
            OperationKind::Plan => "plan",
            OperationKind::Apply => "apply",
        }
        .to_string(),
        ci_env: ci_env_fields(ci_name, getenv),
    };

    embed(&metadata)
}

/// Serialize metadata into the hidden HTML comment form.
pub fn embed(metadata: &Metadata) -> Result<String> {
    let json = serde_json::to_string(metadata)
        .map_err(|e| AppError::Metadata(format!("serialize embedded metadata: {e}")))?;
    Ok(format!("\n{MARKER_PREFIX}{json}{MARKER_SUFFIX}"))
}

/// Recover metadata from a previously posted comment body, if present.
pub fn extract(body: &str) -> Result<Option<Metadata>> {
    let Some(start) = body.rfind(MARKER_PREFIX) else {
        return Ok(None);
    };
    let rest = &body[start + MARKER_PREFIX.len()..];
    let Some(end) = rest.find(MARKER_SUFFIX) else {
        return Err(AppError::Metadata("unterminated metadata marker".to_string()));
    };
    let metadata = serde_json::from_str(&rest[..end])
        .map_err(|e| AppError::Metadata(format!("deserialize embedded metadata: {e}")))?;
    Ok(Some(metadata))
}

/// CI-provider fields recorded alongside the metadata, looked up from the
/// provider's well-known environment variables.
fn ci_env_fields(
    ci_name: &str,
    getenv: impl Fn(&str) -> Option<String>,
) -> BTreeMap<String, String> {
    let wanted: &[(&str, &str)] = match ci_name {
        "github-actions" => &[
            ("WorkflowName", "GITHUB_WORKFLOW"),
            ("JobName", "GITHUB_JOB"),
            ("RunID", "GITHUB_RUN_ID"),
        ],
        "circleci" => &[
            ("WorkflowID", "CIRCLE_WORKFLOW_ID"),
            ("JobName", "CIRCLE_JOB"),
        ],
        "drone" => &[
            ("BuildNumber", "DRONE_BUILD_NUMBER"),
            ("StageName", "DRONE_STAGE_NAME"),
        ],
        _ => &[],
    };

    wanted
        .iter()
        .filter_map(|(field, env)| getenv(env).map(|v| (field.to_string(), v)))
        .collect()
}
