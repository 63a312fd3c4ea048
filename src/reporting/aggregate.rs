use crate::db::{DailyEntryRow, Database};
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTaskSummary {
    pub task_id: String,
    pub title: String,
    pub project_name: Option<String>,
    pub expected_duration_minutes: i64,
    pub actual_duration_minutes: i64,
    pub variance_minutes: i64,
    pub status: String,
    pub is_follow_up: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDailySummary {
    pub worker_id: String,
    pub worker_name: Option<String>,
    pub worker_email: String,
    pub date: String,
    pub total_minutes: i64,
    pub tasks: Vec<WorkerTaskSummary>,
}

/// Worker accumulator keeping tasks in first-seen order. A plain map would
/// lose the insertion order the prompt relies on, so tasks live in a Vec
/// with a side index for get-or-create lookups.
struct WorkerAccumulator {
    summary: WorkerDailySummary,
    task_index: HashMap<String, usize>,
}

/// UTC day window for `date`: `[midnight, midnight + 24h)` in unix
/// milliseconds. Entries are attributed to the day their start time falls
/// in, even when they end on the next day.
pub fn utc_day_range_ms(date: NaiveDate) -> (i64, i64) {
    let start = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    (start, start + MS_PER_DAY)
}

/// Effective minutes for one entry: an explicit duration wins, otherwise the
/// rounded wall-clock span, otherwise zero for a still-open entry.
fn derive_entry_minutes(entry: &DailyEntryRow) -> i64 {
    match (entry.entry_duration, entry.entry_end) {
        (Some(minutes), _) => minutes,
        (None, Some(end)) => (((end - entry.entry_start) as f64) / MS_PER_MINUTE).round() as i64,
        (None, None) => 0,
    }
}

/// Folds one UTC day of time entries into per-worker summaries.
///
/// Grouping preserves first-seen order for workers and for tasks within a
/// worker; the returned list is then sorted ascending by worker email.
/// Entries without a worker id are treated as corrupt rows and skipped.
pub fn fetch_daily_worker_logs(
    database: &Database,
    target_date: NaiveDate,
) -> Result<Vec<WorkerDailySummary>> {
    let (start_ms, end_ms) = utc_day_range_ms(target_date);
    let rows = database.daily_entry_rows(start_ms, end_ms)?;
    let date = target_date.format("%Y-%m-%d").to_string();

    let mut workers: Vec<WorkerAccumulator> = Vec::new();
    let mut worker_index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(worker_id) = row.worker_id.clone() else {
            continue;
        };

        let worker_pos = *worker_index.entry(worker_id.clone()).or_insert_with(|| {
            workers.push(WorkerAccumulator {
                summary: WorkerDailySummary {
                    worker_id,
                    worker_name: row.worker_name.clone(),
                    worker_email: row
                        .worker_email
                        .clone()
                        .unwrap_or_else(|| "unknown@email".to_string()),
                    date: date.clone(),
                    total_minutes: 0,
                    tasks: Vec::new(),
                },
                task_index: HashMap::new(),
            });
            workers.len() - 1
        });
        let worker = &mut workers[worker_pos];

        let duration = derive_entry_minutes(&row);
        if duration > 0 {
            worker.summary.total_minutes += duration;
        }

        let task_pos = match worker.task_index.get(&row.task_id) {
            Some(&pos) => pos,
            None => {
                worker.summary.tasks.push(WorkerTaskSummary {
                    task_id: row.task_id.clone(),
                    title: row
                        .task_title
                        .clone()
                        .unwrap_or_else(|| "Untitled Task".to_string()),
                    project_name: row.project_name.clone(),
                    expected_duration_minutes: row.expected_duration_minutes.unwrap_or(0),
                    actual_duration_minutes: 0,
                    variance_minutes: 0,
                    status: row.status.clone().unwrap_or_else(|| "pending".to_string()),
                    is_follow_up: row.is_follow_up.unwrap_or(false),
                    notes: Vec::new(),
                });
                let pos = worker.summary.tasks.len() - 1;
                worker.task_index.insert(row.task_id.clone(), pos);
                pos
            }
        };
        let task = &mut worker.summary.tasks[task_pos];

        if duration > 0 {
            task.actual_duration_minutes += duration;
        }
        task.variance_minutes = task.actual_duration_minutes - task.expected_duration_minutes;

        if let Some(notes) = row.entry_notes {
            task.notes.push(notes);
        }
    }

    let mut summaries = workers
        .into_iter()
        .map(|worker| worker.summary)
        .collect::<Vec<_>>();
    summaries.sort_by(|a, b| a.worker_email.cmp(&b.worker_email));

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn ms(date: &str, hour: u32, minute: u32) -> i64 {
        day(date)
            .and_hms_opt(hour, minute, 0)
            .expect("valid time")
            .and_utc()
            .timestamp_millis()
    }

    fn fixture_db() -> Database {
        let database = Database::open_in_memory().expect("open db");
        database
            .insert_worker("w1", "alice@example.com", Some("Alice"))
            .expect("worker");
        database
            .insert_worker("w2", "bob@example.com", Some("Bob"))
            .expect("worker");
        database
            .insert_project("p1", "Apollo", "w1")
            .expect("project");
        database
            .insert_task("t1", "p1", "w1", "Write spec", 60, "in_progress", false)
            .expect("task");
        database
            .insert_task("t2", "p1", "w1", "Review PR", 30, "pending", true)
            .expect("task");
        database
            .insert_task("t3", "p1", "w2", "Deploy", 45, "complete", false)
            .expect("task");
        database
    }

    #[test]
    fn includes_exactly_the_utc_day_by_start_time() {
        let database = fixture_db();
        let target = day("2026-08-30");

        // One millisecond before midnight, at midnight, last ms of the day,
        // and at the next midnight.
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 0, 0) - 1, None, Some(5), None)
            .expect("entry");
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 0, 0), None, Some(10), None)
            .expect("entry");
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-31", 0, 0) - 1, None, Some(20), None)
            .expect("entry");
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-31", 0, 0), None, Some(40), None)
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, target).expect("aggregate");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_minutes, 30);
        assert_eq!(summaries[0].date, "2026-08-30");
    }

    #[test]
    fn entry_spanning_midnight_is_attributed_to_start_day() {
        let database = fixture_db();

        database
            .insert_time_entry(
                "t1",
                Some("w1"),
                ms("2026-08-30", 23, 30),
                Some(ms("2026-08-31", 0, 30)),
                None,
                None,
            )
            .expect("entry");

        let on_start_day = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert_eq!(on_start_day.len(), 1);
        assert_eq!(on_start_day[0].total_minutes, 60);

        let on_next_day = fetch_daily_worker_logs(&database, day("2026-08-31")).expect("aggregate");
        assert!(on_next_day.is_empty());
    }

    #[test]
    fn explicit_duration_wins_over_timestamps() {
        let database = fixture_db();

        database
            .insert_time_entry(
                "t1",
                Some("w1"),
                ms("2026-08-30", 9, 0),
                Some(ms("2026-08-30", 11, 0)),
                Some(15),
                None,
            )
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert_eq!(summaries[0].total_minutes, 15);
    }

    #[test]
    fn span_duration_rounds_to_nearest_minute() {
        let database = fixture_db();

        // 10 minutes 31 seconds rounds up to 11.
        let start = ms("2026-08-30", 9, 0);
        database
            .insert_time_entry("t1", Some("w1"), start, Some(start + 631_000), None, None)
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert_eq!(summaries[0].total_minutes, 11);
    }

    #[test]
    fn open_entry_contributes_zero_but_registers_task() {
        let database = fixture_db();

        database
            .insert_time_entry(
                "t2",
                Some("w1"),
                ms("2026-08-30", 9, 0),
                None,
                None,
                Some("started, waiting on review"),
            )
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_minutes, 0);
        assert_eq!(summaries[0].tasks.len(), 1);
        assert_eq!(summaries[0].tasks[0].actual_duration_minutes, 0);
        assert_eq!(
            summaries[0].tasks[0].notes,
            vec!["started, waiting on review".to_string()]
        );
    }

    #[test]
    fn scenario_two_entries_one_task_plus_open_task() {
        let database = fixture_db();
        let target = day("2026-08-30");

        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 8, 0), None, Some(45), None)
            .expect("entry");
        database
            .insert_time_entry(
                "t1",
                Some("w1"),
                ms("2026-08-30", 9, 0),
                Some(ms("2026-08-30", 9, 30)),
                None,
                None,
            )
            .expect("entry");
        database
            .insert_time_entry("t2", Some("w1"), ms("2026-08-30", 10, 0), None, None, None)
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, target).expect("aggregate");
        assert_eq!(summaries.len(), 1);

        let worker = &summaries[0];
        assert_eq!(worker.total_minutes, 75);
        assert_eq!(worker.tasks.len(), 2);
        assert_eq!(worker.tasks[0].task_id, "t1");
        assert_eq!(worker.tasks[0].actual_duration_minutes, 75);
        assert_eq!(worker.tasks[1].task_id, "t2");
        assert_eq!(worker.tasks[1].actual_duration_minutes, 0);
    }

    #[test]
    fn variance_always_equals_actual_minus_expected() {
        let database = fixture_db();
        let target = day("2026-08-30");

        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 8, 0), None, Some(40), None)
            .expect("entry");
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 9, 0), None, Some(35), None)
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, target).expect("aggregate");
        let task = &summaries[0].tasks[0];
        assert_eq!(task.expected_duration_minutes, 60);
        assert_eq!(task.actual_duration_minutes, 75);
        assert_eq!(task.variance_minutes, 15);
    }

    #[test]
    fn zero_expected_duration_makes_variance_equal_actual() {
        let database = fixture_db();
        database
            .insert_task("t9", "p1", "w1", "Unscoped chore", 0, "pending", false)
            .expect("task");
        database
            .insert_time_entry("t9", Some("w1"), ms("2026-08-30", 8, 0), None, Some(25), None)
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert_eq!(summaries[0].tasks[0].variance_minutes, 25);
    }

    #[test]
    fn workers_sorted_by_email_tasks_in_first_seen_order() {
        let database = fixture_db();
        let target = day("2026-08-30");

        // Bob's entry is first in time, Alice still sorts first by email.
        database
            .insert_time_entry("t3", Some("w2"), ms("2026-08-30", 7, 0), None, Some(30), None)
            .expect("entry");
        database
            .insert_time_entry("t2", Some("w1"), ms("2026-08-30", 8, 0), None, Some(10), None)
            .expect("entry");
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 9, 0), None, Some(20), None)
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, target).expect("aggregate");
        let emails = summaries
            .iter()
            .map(|worker| worker.worker_email.as_str())
            .collect::<Vec<_>>();
        assert_eq!(emails, vec!["alice@example.com", "bob@example.com"]);

        let alice_tasks = summaries[0]
            .tasks
            .iter()
            .map(|task| task.task_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(alice_tasks, vec!["t2", "t1"]);
    }

    #[test]
    fn reaggregation_is_deterministic() {
        let database = fixture_db();
        let target = day("2026-08-30");

        database
            .insert_time_entry("t2", Some("w1"), ms("2026-08-30", 8, 0), None, Some(10), Some("n1"))
            .expect("entry");
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 9, 0), None, Some(20), Some("n2"))
            .expect("entry");
        database
            .insert_time_entry("t3", Some("w2"), ms("2026-08-30", 10, 0), None, Some(30), None)
            .expect("entry");

        let first = fetch_daily_worker_logs(&database, target).expect("aggregate");
        let second = fetch_daily_worker_logs(&database, target).expect("aggregate");
        assert_eq!(first, second);
    }

    #[test]
    fn entries_without_worker_id_are_skipped() {
        let database = fixture_db();

        database
            .insert_time_entry("t1", None, ms("2026-08-30", 9, 0), None, Some(30), None)
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert!(summaries.is_empty());
    }

    #[test]
    fn empty_day_yields_empty_list() {
        let database = fixture_db();
        let summaries = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert!(summaries.is_empty());
    }

    #[test]
    fn notes_collected_in_entry_order() {
        let database = fixture_db();

        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 8, 0), None, Some(10), Some("first"))
            .expect("entry");
        database
            .insert_time_entry("t1", Some("w1"), ms("2026-08-30", 9, 0), None, None, Some("second"))
            .expect("entry");

        let summaries = fetch_daily_worker_logs(&database, day("2026-08-30")).expect("aggregate");
        assert_eq!(
            summaries[0].tasks[0].notes,
            vec!["first".to_string(), "second".to_string()]
        );
    }
}
