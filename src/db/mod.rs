pub mod queries;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// One joined row of the daily time-entry selection. Worker columns come from
/// a left join, so a corrupt entry without a worker id survives to the fold
/// where it is skipped.
#[derive(Debug, Clone)]
pub struct DailyEntryRow {
    pub worker_id: Option<String>,
    pub worker_name: Option<String>,
    pub worker_email: Option<String>,
    pub task_id: String,
    pub task_title: Option<String>,
    pub project_name: Option<String>,
    pub status: Option<String>,
    pub expected_duration_minutes: Option<i64>,
    pub is_follow_up: Option<bool>,
    pub entry_duration: Option<i64>,
    pub entry_notes: Option<String>,
    pub entry_start: i64,
    pub entry_end: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: i64,
    pub worker_id: String,
    pub report_date: String,
    pub summary: String,
    pub insights: Option<String>,
    pub raw_data_used: Option<String>,
    pub generated_at: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite DB")?;
        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    /// All time entries whose start time falls in `[from_ms, to_ms)`,
    /// joined against tasks, projects, and workers. Row order is
    /// deterministic so repeated aggregation of the same data folds in the
    /// same order every time.
    pub fn daily_entry_rows(&self, from_ms: i64, to_ms: i64) -> Result<Vec<DailyEntryRow>> {
        let mut statement = self.conn.prepare(
            "SELECT e.worker_id, w.name, w.email,
                    e.task_id, t.title, p.name, t.status,
                    t.expected_duration_minutes, t.is_follow_up,
                    e.duration_minutes, e.notes, e.start_time, e.end_time
             FROM time_entries e
             LEFT JOIN tasks t ON e.task_id = t.id
             LEFT JOIN projects p ON t.project_id = p.id
             LEFT JOIN workers w ON e.worker_id = w.id
             WHERE e.start_time >= ?1 AND e.start_time < ?2
             ORDER BY e.start_time ASC, e.id ASC",
        )?;

        let rows = statement
            .query_map(params![from_ms, to_ms], |row| {
                Ok(DailyEntryRow {
                    worker_id: row.get(0)?,
                    worker_name: row.get(1)?,
                    worker_email: row.get(2)?,
                    task_id: row.get(3)?,
                    task_title: row.get(4)?,
                    project_name: row.get(5)?,
                    status: row.get(6)?,
                    expected_duration_minutes: row.get(7)?,
                    is_follow_up: row.get(8)?,
                    entry_duration: row.get(9)?,
                    entry_notes: row.get(10)?,
                    entry_start: row.get(11)?,
                    entry_end: row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query daily time entries")?;

        Ok(rows)
    }

    pub fn report_exists(&self, worker_id: &str, report_date: &str) -> Result<bool> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM ai_reports WHERE worker_id = ?1 AND report_date = ?2 LIMIT 1",
                params![worker_id, report_date],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to check for existing report")?;

        Ok(id.is_some())
    }

    /// One report per (worker, report date). Conflicts overwrite the report
    /// body and advance the generation timestamp; the row identity and key
    /// are untouched.
    pub fn upsert_report(
        &self,
        worker_id: &str,
        report_date: &str,
        summary: &str,
        insights: Option<&str>,
        raw_data_used: &str,
        generated_at: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO ai_reports (worker_id, report_date, summary, insights, raw_data_used, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(worker_id, report_date)
                 DO UPDATE SET summary=excluded.summary, insights=excluded.insights,
                               raw_data_used=excluded.raw_data_used, generated_at=excluded.generated_at",
                params![worker_id, report_date, summary, insights, raw_data_used, generated_at],
            )
            .context("Failed to upsert report")?;

        Ok(())
    }

    pub fn report_for(&self, worker_id: &str, report_date: &str) -> Result<Option<ReportRow>> {
        self.conn
            .query_row(
                "SELECT id, worker_id, report_date, summary, insights, raw_data_used, generated_at
                 FROM ai_reports
                 WHERE worker_id = ?1 AND report_date = ?2",
                params![worker_id, report_date],
                map_report_row,
            )
            .optional()
            .context("Failed to load report")
    }

    pub fn reports_for_date(&self, report_date: &str) -> Result<Vec<ReportRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, worker_id, report_date, summary, insights, raw_data_used, generated_at
             FROM ai_reports
             WHERE report_date = ?1
             ORDER BY worker_id ASC",
        )?;

        let rows = statement
            .query_map(params![report_date], map_report_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list reports")?;

        Ok(rows)
    }

    pub fn latest_report_date(&self) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT report_date FROM ai_reports ORDER BY report_date DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read latest report date")
    }

    #[cfg(test)]
    pub fn insert_worker(&self, id: &str, email: &str, name: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO workers (id, email, name) VALUES (?1, ?2, ?3)",
                params![id, email, name],
            )
            .context("Failed to insert worker")?;
        Ok(())
    }

    #[cfg(test)]
    pub fn insert_project(&self, id: &str, name: &str, admin_id: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO projects (id, name, admin_id) VALUES (?1, ?2, ?3)",
                params![id, name, admin_id],
            )
            .context("Failed to insert project")?;
        Ok(())
    }

    #[cfg(test)]
    #[allow(clippy::too_many_arguments)]
    pub fn insert_task(
        &self,
        id: &str,
        project_id: &str,
        worker_id: &str,
        title: &str,
        expected_duration_minutes: i64,
        status: &str,
        is_follow_up: bool,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO tasks (id, project_id, assigned_worker_id, title, expected_duration_minutes, status, is_follow_up)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, project_id, worker_id, title, expected_duration_minutes, status, is_follow_up],
            )
            .context("Failed to insert task")?;
        Ok(())
    }

    #[cfg(test)]
    pub fn insert_time_entry(
        &self,
        task_id: &str,
        worker_id: Option<&str>,
        start_time: i64,
        end_time: Option<i64>,
        duration_minutes: Option<i64>,
        notes: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO time_entries (task_id, worker_id, start_time, end_time, duration_minutes, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![task_id, worker_id, start_time, end_time, duration_minutes, notes],
            )
            .context("Failed to insert time entry")?;
        Ok(())
    }
}

fn map_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        worker_id: row.get(1)?,
        report_date: row.get(2)?,
        summary: row.get(3)?,
        insights: row.get(4)?,
        raw_data_used: row.get(5)?,
        generated_at: row.get(6)?,
    })
}
