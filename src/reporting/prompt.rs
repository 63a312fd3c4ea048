use crate::reporting::aggregate::WorkerDailySummary;
use anyhow::{Context, Result};

pub const REPORTING_SYSTEM_PROMPT: &str = "You are a world-class business operations analyst. Your task is to review the following worker daily task log and provide a concise, objective performance summary and three key insights, focusing on time variance (Actual vs. Expected), productivity, and completion status.";

/// Deterministic prompt for one worker-day. Tasks render as numbered blocks
/// in summary list order; a day without tasks gets its own wording instead
/// of an empty task section.
pub fn build_worker_report_prompt(summary: &WorkerDailySummary) -> String {
    let header = format!(
        "Worker: {} <{}>\nDate: {}\nTotal Minutes Logged: {}",
        summary.worker_name.as_deref().unwrap_or("Unknown"),
        summary.worker_email,
        summary.date,
        summary.total_minutes
    );

    if summary.tasks.is_empty() {
        return format!("{header}\n\nNo tasks logged for this worker on the specified date.");
    }

    let body = summary
        .tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let notes_block = if task.notes.is_empty() {
                "Notes: None".to_string()
            } else {
                let bullets = task
                    .notes
                    .iter()
                    .map(|note| format!("- {note}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("Notes:\n{bullets}")
            };

            [
                format!("{}. Task: {}", index + 1, task.title),
                format!("   Project: {}", task.project_name.as_deref().unwrap_or("Unassigned")),
                format!("   Expected Duration (min): {}", task.expected_duration_minutes),
                format!("   Actual Duration (min): {}", task.actual_duration_minutes),
                format!("   Variance (min): {}", task.variance_minutes),
                format!("   Status: {}", task.status),
                format!("   Follow-up Task: {}", if task.is_follow_up { "Yes" } else { "No" }),
                format!("   {notes_block}"),
            ]
            .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n\n{body}")
}

/// Pretty-printed JSON snapshot of the summary, stored alongside the report
/// for audit and replay.
pub fn serialize_daily_summary(summary: &WorkerDailySummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("Failed to serialize daily summary")
}
