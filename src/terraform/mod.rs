pub mod parser;

pub use parser::{ApplyParser, OutputParser, PlanParser};

/// Which Terraform command produced the output being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Plan,
    Apply,
}

/// Structured outcome of parsing `terraform plan` / `terraform apply`
/// output. Built once per invocation; the orchestrator only overwrites
/// `exit_code` with the exit code observed by the caller.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub kind: OperationKind,
    pub exit_code: i32,
    /// The summary line (or the error block on failure).
    pub result: String,
    /// The resource-action section, through the `Plan:` summary line.
    pub changed_result: String,
    /// The "Objects have changed outside of Terraform" drift section.
    pub outside_terraform: String,
    pub warning: String,
    pub has_add_or_update_only: bool,
    pub has_destroy: bool,
    pub has_no_changes: bool,
    pub has_plan_error: bool,
    pub has_parse_error: bool,
    pub error: Option<String>,
    pub created_resources: Vec<String>,
    pub updated_resources: Vec<String>,
    pub deleted_resources: Vec<String>,
    pub replaced_resources: Vec<String>,
}

impl ParseResult {
    pub fn empty(kind: OperationKind) -> Self {
        Self {
            kind,
            exit_code: 0,
            result: String::new(),
            changed_result: String::new(),
            outside_terraform: String::new(),
            warning: String::new(),
            has_add_or_update_only: false,
            has_destroy: false,
            has_no_changes: false,
            has_plan_error: false,
            has_parse_error: false,
            error: None,
            created_resources: Vec::new(),
            updated_resources: Vec::new(),
            deleted_resources: Vec::new(),
            replaced_resources: Vec::new(),
        }
    }
}
