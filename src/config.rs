use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub github: GitHubConfig,
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default)]
    pub pr: PullRequestIdentity,
    #[serde(default)]
    pub templates: TemplateConfig,
    /// Template variables, referenced as `{{vars.name}}` in templates.
    #[serde(default)]
    pub vars: HashMap<String, String>,
    /// Names of vars copied into the embedded comment marker.
    #[serde(default)]
    pub embedded_var_names: Vec<String>,
    #[serde(default)]
    pub result_labels: ResultLabels,
    /// Render stdout/stderr verbatim instead of fenced code blocks.
    #[serde(default)]
    pub use_raw_output: bool,
}

#[derive(Deserialize, Clone, Default)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    /// Override for GitHub Enterprise, e.g. "https://ghe.example.com/api/v3".
    #[serde(default)]
    pub base_url: Option<String>,
}

// Manual Debug impl to avoid leaking the API token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"[REDACTED]")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CiConfig {
    /// Link to the CI build, rendered into the comment header.
    #[serde(default)]
    pub link: String,
}

/// Where the comment goes: a known PR number, or a commit revision used
/// to find one.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PullRequestIdentity {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub revision: String,
}

impl PullRequestIdentity {
    pub fn is_number(&self) -> bool {
        self.number.is_some()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TemplateConfig {
    /// Main comment template; falls back to the built-in default.
    #[serde(default)]
    pub template: Option<String>,
    /// Template used when the Terraform output could not be parsed.
    #[serde(default)]
    pub parse_error_template: Option<String>,
    /// User-defined sub-templates, referenced by name with `{{> name}}`.
    #[serde(default)]
    pub templates: HashMap<String, String>,
}

/// The mutually exclusive labels describing a plan's outcome. At most one
/// of these may be attached to a pull request after reconciliation.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ResultLabels {
    #[serde(default)]
    pub add_or_update_label: Option<String>,
    #[serde(default)]
    pub add_or_update_label_color: Option<String>,
    #[serde(default)]
    pub destroy_label: Option<String>,
    #[serde(default)]
    pub destroy_label_color: Option<String>,
    #[serde(default)]
    pub no_changes_label: Option<String>,
    #[serde(default)]
    pub no_changes_label_color: Option<String>,
    #[serde(default)]
    pub plan_error_label: Option<String>,
    #[serde(default)]
    pub plan_error_label_color: Option<String>,
}

impl ResultLabels {
    pub fn has_any_label_defined(&self) -> bool {
        self.add_or_update_label.is_some()
            || self.destroy_label.is_some()
            || self.no_changes_label.is_some()
            || self.plan_error_label.is_some()
    }

    /// Whether `name` is one of the configured result labels.
    pub fn is_result_label(&self, name: &str) -> bool {
        [
            &self.add_or_update_label,
            &self.destroy_label,
            &self.no_changes_label,
            &self.plan_error_label,
        ]
        .iter()
        .any(|l| l.as_deref() == Some(name))
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("tfcomment").required(false));
        }

        // Environment variable overrides with TFCOMMENT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("TFCOMMENT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }
}
