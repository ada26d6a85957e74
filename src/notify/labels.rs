use crate::config::Config;
use crate::error::AppError;
use crate::platform::LabelClient;
use crate::terraform::ParseResult;

/// Which result label (and color) the parsed outcome implies. First match
/// wins; add-or-update beats destroy when both flags are set.
fn target_label(cfg: &Config, result: &ParseResult) -> (Option<String>, Option<String>) {
    let rl = &cfg.result_labels;
    if result.has_add_or_update_only {
        (rl.add_or_update_label.clone(), rl.add_or_update_label_color.clone())
    } else if result.has_destroy {
        (rl.destroy_label.clone(), rl.destroy_label_color.clone())
    } else if result.has_no_changes {
        (rl.no_changes_label.clone(), rl.no_changes_label_color.clone())
    } else if result.has_plan_error {
        (rl.plan_error_label.clone(), rl.plan_error_label_color.clone())
    } else {
        (None, None)
    }
}

/// Repair the pull request's label set so that exactly the label implied by
/// `result` is attached, with its configured color, and no other result
/// label remains. Failures are returned as human-readable messages for the
/// comment body; none of them abort the notification.
pub(super) async fn reconcile(
    labels: &dyn LabelClient,
    cfg: &Config,
    pr_number: u64,
    result: &ParseResult,
) -> Vec<String> {
    let (target, configured_color) = target_label(cfg, result);
    let mut err_msgs = Vec::new();

    // Sweep stale result labels, remembering the target's current color if
    // it is already attached.
    let mut current_color: Option<String> = None;
    match labels.list_labels(pr_number).await {
        Ok(existing) => {
            for label in existing {
                if Some(label.name.as_str()) == target.as_deref() {
                    current_color = Some(label.color);
                    continue;
                }
                if !cfg.result_labels.is_result_label(&label.name) {
                    continue;
                }
                match labels.remove_label(pr_number, &label.name).await {
                    Ok(()) => {}
                    // The label disappeared between list and remove.
                    Err(AppError::LabelNotFound) => {}
                    Err(e) => {
                        tracing::error!(label = %label.name, error = %e, "remove a label");
                        err_msgs.push(format!("remove a label {}: {e}", label.name));
                    }
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "list labels");
            err_msgs.push(format!("list labels: {e}"));
        }
    }

    let Some(target) = target else {
        return err_msgs;
    };

    match current_color {
        None => {
            // Not attached yet.
            match labels.add_labels(pr_number, &[target.clone()]).await {
                Ok(added) => {
                    if let Some(color) = &configured_color {
                        let added_color = added
                            .iter()
                            .find(|l| l.name == target)
                            .map(|l| l.color.as_str());
                        if added_color.is_some() && added_color != Some(color) {
                            if let Err(e) = labels.update_label_color(&target, color).await {
                                tracing::error!(label = %target, color = %color, error = %e, "update a label color");
                                err_msgs.push(format!(
                                    "update a label color (name: {target}, color: {color}): {e}"
                                ));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(label = %target, error = %e, "add a label");
                    err_msgs.push(format!("add a label {target}: {e}"));
                }
            }
        }
        Some(current) => {
            if let Some(color) = &configured_color {
                if color != &current {
                    if let Err(e) = labels.update_label_color(&target, color).await {
                        tracing::error!(label = %target, color = %color, error = %e, "update a label color");
                        err_msgs.push(format!(
                            "update a label color (name: {target}, color: {color}): {e}"
                        ));
                    }
                }
            }
        }
    }

    err_msgs
}
