use crate::config::Config;
use crate::reporting;
use anyhow::{Context, Result};
use chrono::{Days, Local, LocalResult, NaiveTime, TimeZone};
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

/// Fires the report pipeline once a day at the configured local time,
/// targeting yesterday in UTC. The config file is re-read on every poll so
/// a changed report_time takes effect without a restart.
pub async fn run_report_scheduler(fallback_config: Arc<Config>) -> Result<()> {
    let mut last_logged_time = String::new();

    loop {
        let config = Config::load().unwrap_or_else(|_| (*fallback_config).clone());

        let report_time = match config.parse_report_time() {
            Ok(value) => value,
            Err(err) => {
                error!(error = %err, "invalid report_time setting");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let delay = match delay_until_next(report_time) {
            Ok(value) => value,
            Err(err) => {
                error!(error = %err, report_time = %config.report_time, "failed to compute next run");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if config.report_time != last_logged_time {
            info!(
                seconds = delay.as_secs(),
                report_time = %config.report_time,
                "next report run scheduled"
            );
            last_logged_time = config.report_time.clone();
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let target_date = reporting::default_target_date();
        let run_config = config.clone();
        let result = tokio::task::spawn_blocking(move || {
            reporting::process_reports(&run_config, target_date)
        })
        .await
        .context("Report pipeline task panicked")
        .and_then(|inner| inner);

        match result {
            Ok(outcomes) => {
                info!(date = %target_date, processed = outcomes.len(), "scheduled report run finished");
            }
            Err(err) => {
                error!(error = %err, date = %target_date, "scheduled report run failed");
            }
        }

        sleep(Duration::from_secs(1)).await;
    }
}

/// Time until the next occurrence of `target_time` in local time, today or
/// tomorrow. Skips ahead a day when DST makes the local time ambiguous.
fn delay_until_next(target_time: NaiveTime) -> Result<Duration> {
    let now = Local::now();
    let today = now.date_naive();

    let candidate_today = match Local.from_local_datetime(&today.and_time(target_time)) {
        LocalResult::Single(datetime) => datetime,
        _ => Local
            .from_local_datetime(&(today + Days::new(1)).and_time(target_time))
            .single()
            .context("Failed to convert schedule time")?,
    };

    let next_run = if candidate_today > now {
        candidate_today
    } else {
        Local
            .from_local_datetime(&(today + Days::new(1)).and_time(target_time))
            .single()
            .context("Failed to convert next run time")?
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next run delay")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn delay_is_positive_and_within_a_day() {
        let target = NaiveTime::from_hms_opt(2, 0, 0).expect("time");
        let delay = delay_until_next(target).expect("delay");

        assert!(delay.as_secs() > 0);
        assert!(delay.as_secs() <= 25 * 60 * 60);
    }

    #[test]
    fn past_time_today_rolls_to_tomorrow() {
        let now = Local::now();
        // A minute ago; the next occurrence must be close to 24h away.
        let past = now.time().with_second(0).expect("time") - chrono::Duration::minutes(1);

        let delay = delay_until_next(past).expect("delay");
        assert!(delay.as_secs() > 23 * 60 * 60);
    }
}
