use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;

use crate::config::TemplateConfig;
use crate::error::{AppError, Result};

/// Value bag handed to the comment templates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommonTemplate {
    pub result: String,
    pub changed_result: String,
    pub change_outside_terraform: String,
    pub warning: String,
    pub has_destroy: bool,
    pub link: String,
    pub use_raw_output: bool,
    pub vars: HashMap<String, String>,
    pub stdout: String,
    pub stderr: String,
    pub combined_output: String,
    pub exit_code: i32,
    pub error_messages: Vec<String>,
    pub created_resources: Vec<String>,
    pub updated_resources: Vec<String>,
    pub deleted_resources: Vec<String>,
    pub replaced_resources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Default,
    ParseError,
}

impl TemplateKind {
    fn name(self) -> &'static str {
        match self {
            TemplateKind::Default => "default",
            TemplateKind::ParseError => "parse_error",
        }
    }
}

const DEFAULT_TEMPLATE: &str = "\
{{#if link}}[CI link]({{link}})

{{/if}}\
{{#if has_destroy}}:warning: **Resource deletion will happen** :warning:

This plan contains a destroy operation. Check the plan result carefully!

{{/if}}\
{{result}}

{{#if changed_result}}\
<details><summary>Details (Click me)</summary>

{{#if use_raw_output}}````
{{changed_result}}
````{{else}}````hcl
{{changed_result}}
````{{/if}}
</details>

{{/if}}\
{{#if change_outside_terraform}}\
<details><summary>:information_source: Objects have changed outside of Terraform</summary>

````
{{change_outside_terraform}}
````
</details>

{{/if}}\
{{#if warning}}## :warning: Warnings :warning:

````
{{warning}}
````

{{/if}}\
{{#each error_messages}}* {{this}}
{{/each}}";

const DEFAULT_PARSE_ERROR_TEMPLATE: &str = "\
{{#if link}}[CI link]({{link}})

{{/if}}\
## :warning: Failed to parse the result

<details><summary>Details (Click me)</summary>

````
{{combined_output}}
````
</details>
";

/// Handlebars renderer holding the normal and parse-error comment
/// templates plus any user-defined sub-templates as partials.
pub struct CommentTemplates {
    registry: Handlebars<'static>,
}

impl CommentTemplates {
    pub fn new(cfg: &TemplateConfig) -> Result<Self> {
        let mut registry = Handlebars::new();
        // Comments are markdown, not HTML.
        registry.register_escape_fn(handlebars::no_escape);

        let template = cfg.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        registry
            .register_template_string(TemplateKind::Default.name(), template)
            .map_err(|e| AppError::Template(e.to_string()))?;

        let parse_error = cfg
            .parse_error_template
            .as_deref()
            .unwrap_or(DEFAULT_PARSE_ERROR_TEMPLATE);
        registry
            .register_template_string(TemplateKind::ParseError.name(), parse_error)
            .map_err(|e| AppError::Template(e.to_string()))?;

        for (name, body) in &cfg.templates {
            registry
                .register_partial(name, body)
                .map_err(|e| AppError::Template(e.to_string()))?;
        }

        Ok(Self { registry })
    }

    pub fn render(&self, kind: TemplateKind, value: &CommonTemplate) -> Result<String> {
        Ok(self.registry.render(kind.name(), value)?)
    }
}
