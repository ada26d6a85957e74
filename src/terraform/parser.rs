use regex::Regex;

use super::{OperationKind, ParseResult};

const ACTIONS_HEADER: &str = "Terraform will perform the following actions:";
const DRIFT_HEADER: &str = "Note: Objects have changed outside of Terraform";

/// The parser selected for this invocation. The resulting
/// [`ParseResult::kind`] tag is what downstream logic dispatches on.
pub enum OutputParser {
    Plan(PlanParser),
    Apply(ApplyParser),
}

impl OutputParser {
    pub fn plan() -> Self {
        Self::Plan(PlanParser::new())
    }

    pub fn apply() -> Self {
        Self::Apply(ApplyParser::new())
    }

    pub fn parse(&self, body: &str) -> ParseResult {
        match self {
            Self::Plan(p) => p.parse(body),
            Self::Apply(p) => p.parse(body),
        }
    }
}

/// Parses `terraform plan` output.
pub struct PlanParser {
    plan_summary: Regex,
    no_changes: Regex,
    fail: Regex,
    resource_action: Regex,
    warning: Regex,
}

impl Default for PlanParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanParser {
    pub fn new() -> Self {
        Self {
            plan_summary: Regex::new(r"(?m)^Plan: (\d+) to add, (\d+) to change, (\d+) to destroy\.")
                .unwrap(),
            no_changes: Regex::new(
                r"(?m)^No changes\. (?:Infrastructure is up-to-date\.|Your infrastructure matches the configuration\.)",
            )
            .unwrap(),
            fail: Regex::new(r"(?m)^(?:Error|╷\n│ Error):").unwrap(),
            resource_action: Regex::new(
                r"(?m)^\s*# (\S+) (will be created|will be updated in-place|will be destroyed|will be replaced|must be replaced|is tainted, so must be replaced)",
            )
            .unwrap(),
            warning: Regex::new(r"(?ms)^(?:│ )?Warning: .*?(?:\n\s*\n|\z)").unwrap(),
        }
    }

    pub fn parse(&self, body: &str) -> ParseResult {
        let mut result = ParseResult::empty(OperationKind::Plan);

        if let Some(fail) = self.fail.find(body) {
            result.result = body[fail.start()..].trim_end().to_string();
            result.has_plan_error = true;
            result.exit_code = 1;
            result.warning = collect_warnings(&self.warning, body);
            return result;
        }

        if let Some(m) = self.no_changes.find(body) {
            result.result = m.as_str().to_string();
            result.has_no_changes = true;
            result.warning = collect_warnings(&self.warning, body);
            result.outside_terraform = extract_drift(body);
            return result;
        }

        let Some(caps) = self.plan_summary.captures(body) else {
            result.has_parse_error = true;
            result.exit_code = 1;
            return result;
        };

        // The regex only captures digit groups, so these parses cannot fail.
        let to_add: u64 = caps[1].parse().unwrap_or(0);
        let to_change: u64 = caps[2].parse().unwrap_or(0);
        let to_destroy: u64 = caps[3].parse().unwrap_or(0);

        result.result = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
        result.has_destroy = to_destroy > 0;
        result.has_add_or_update_only = (to_add + to_change) > 0 && to_destroy == 0;
        result.has_no_changes = to_add + to_change + to_destroy == 0;

        let summary_end = caps.get(0).map_or(body.len(), |m| m.end());
        if let Some(start) = body.find(ACTIONS_HEADER) {
            if start < summary_end {
                result.changed_result = body[start..summary_end].trim_end().to_string();
            }
        }
        result.outside_terraform = extract_drift(body);
        result.warning = collect_warnings(&self.warning, body);

        for caps in self.resource_action.captures_iter(body) {
            let name = caps[1].to_string();
            match &caps[2] {
                "will be created" => result.created_resources.push(name),
                "will be updated in-place" => result.updated_resources.push(name),
                "will be destroyed" => result.deleted_resources.push(name),
                _ => result.replaced_resources.push(name),
            }
        }

        result
    }
}

/// Parses `terraform apply` output.
pub struct ApplyParser {
    pass: Regex,
    fail: Regex,
}

impl Default for ApplyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplyParser {
    pub fn new() -> Self {
        Self {
            pass: Regex::new(r"(?m)^Apply complete! Resources: \d+ added, \d+ changed, \d+ destroyed\.")
                .unwrap(),
            fail: Regex::new(r"(?m)^(?:Error|╷\n│ Error):").unwrap(),
        }
    }

    pub fn parse(&self, body: &str) -> ParseResult {
        let mut result = ParseResult::empty(OperationKind::Apply);

        if let Some(fail) = self.fail.find(body) {
            result.result = body[fail.start()..].trim_end().to_string();
            result.exit_code = 1;
            return result;
        }

        if let Some(m) = self.pass.find(body) {
            result.result = m.as_str().to_string();
            return result;
        }

        result.has_parse_error = true;
        result.exit_code = 1;
        result.error = Some("cannot parse apply result".to_string());
        result
    }
}

fn collect_warnings(warning: &Regex, body: &str) -> String {
    warning
        .find_iter(body)
        .map(|m| m.as_str().trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extract the drift section, ending before the resource-action section or
/// the plan summary.
fn extract_drift(body: &str) -> String {
    let Some(start) = body.find(DRIFT_HEADER) else {
        return String::new();
    };
    let rest = &body[start..];
    let end = rest
        .find(ACTIONS_HEADER)
        .or_else(|| rest.find("\nPlan:"))
        .or_else(|| rest.find("\nNo changes."))
        .unwrap_or(rest.len());
    rest[..end].trim_end().to_string()
}
