pub const CREATE_WORKERS: &str = r#"
CREATE TABLE IF NOT EXISTS workers (
  id    TEXT PRIMARY KEY,
  email TEXT NOT NULL UNIQUE,
  name  TEXT
);
"#;

pub const CREATE_PROJECTS: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
  id                    TEXT PRIMARY KEY,
  name                  TEXT NOT NULL,
  admin_id              TEXT NOT NULL REFERENCES workers(id),
  is_archived           INTEGER NOT NULL DEFAULT 0,
  expected_budget_hours INTEGER
);
"#;

pub const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
  id                        TEXT PRIMARY KEY,
  project_id                TEXT NOT NULL REFERENCES projects(id),
  assigned_worker_id        TEXT NOT NULL REFERENCES workers(id),
  title                     TEXT NOT NULL,
  expected_duration_minutes INTEGER NOT NULL DEFAULT 0,
  status                    TEXT NOT NULL DEFAULT 'pending',
  is_follow_up              INTEGER NOT NULL DEFAULT 0
);
"#;

pub const CREATE_TIME_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS time_entries (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  task_id          TEXT NOT NULL REFERENCES tasks(id),
  worker_id        TEXT REFERENCES workers(id),
  start_time       INTEGER NOT NULL,
  end_time         INTEGER,
  duration_minutes INTEGER,
  notes            TEXT
);
"#;

pub const CREATE_AI_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS ai_reports (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  worker_id     TEXT NOT NULL REFERENCES workers(id),
  report_date   TEXT NOT NULL,
  summary       TEXT NOT NULL,
  insights      TEXT,
  raw_data_used TEXT,
  generated_at  INTEGER NOT NULL,
  UNIQUE (worker_id, report_date)
);
"#;

pub const INDEX_TIME_ENTRIES_START: &str =
    "CREATE INDEX IF NOT EXISTS idx_time_entries_start_time ON time_entries(start_time);";

pub const INDEX_AI_REPORTS_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_ai_reports_date ON ai_reports(report_date);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_WORKERS,
        CREATE_PROJECTS,
        CREATE_TASKS,
        CREATE_TIME_ENTRIES,
        CREATE_AI_REPORTS,
        INDEX_TIME_ENTRIES_START,
        INDEX_AI_REPORTS_DATE,
    ]
}
