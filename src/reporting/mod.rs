pub mod aggregate;
pub mod prompt;

use crate::ai;
use crate::config::Config;
use crate::db::Database;
use anyhow::Result;
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct WorkerOutcome {
    pub worker_id: String,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Fixed trigger policy: reports cover yesterday in UTC.
pub fn default_target_date() -> NaiveDate {
    Utc::now().date_naive() - Days::new(1)
}

/// Runs the full pipeline for one UTC day: aggregate, prompt, generate,
/// upsert, one worker at a time in aggregation order.
///
/// A failing insight call aborts the remaining workers and the whole run
/// reports failure; per-worker isolation was deliberately not adopted so a
/// partial batch never half-succeeds silently. Workers whose upsert already
/// ran keep their reports (each upsert is atomic).
pub fn process_reports(config: &Config, target_date: NaiveDate) -> Result<Vec<WorkerOutcome>> {
    let database = Database::open(&config.db_path)?;
    let summaries = aggregate::fetch_daily_worker_logs(&database, target_date)?;
    let ai_configured = ai::is_configured(config);

    let mut outcomes = Vec::new();

    for summary in summaries {
        // Idle day for this worker: nothing to report, nothing to touch.
        if summary.tasks.is_empty() {
            continue;
        }

        // A real report must not be overwritten by the sentinel fallback.
        if !ai_configured && database.report_exists(&summary.worker_id, &summary.date)? {
            outcomes.push(WorkerOutcome {
                worker_id: summary.worker_id.clone(),
                skipped: true,
                reason: Some("Existing report present and AI not configured".to_string()),
            });
            continue;
        }

        let prompt_text = prompt::build_worker_report_prompt(&summary);
        let raw_data_used = prompt::serialize_daily_summary(&summary)?;

        let generated = ai::request_insights(config, &prompt_text)?;
        let insights_text = (!generated.insights.is_empty()).then(|| generated.insights.join("\n"));

        database.upsert_report(
            &summary.worker_id,
            &summary.date,
            &generated.summary,
            insights_text.as_deref(),
            &raw_data_used,
            Utc::now().timestamp(),
        )?;

        info!(
            worker_id = %summary.worker_id,
            date = %summary.date,
            total_minutes = summary.total_minutes,
            "daily report stored"
        );

        outcomes.push(WorkerOutcome {
            worker_id: summary.worker_id,
            skipped: false,
            reason: None,
        });
    }

    Ok(outcomes)
}
