use rusqlite::{Connection, params};
use std::path::Path;

/// SQLite-backed store for workflow run history.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS workflow_runs (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                status TEXT NOT NULL,
                outcome TEXT,
                failed_stage TEXT,
                error TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER
            );
            CREATE TABLE IF NOT EXISTS stage_runs (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL REFERENCES workflow_runs(id),
                stage TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_workflow_runs_workflow ON workflow_runs(workflow_id);
            CREATE INDEX IF NOT EXISTS idx_workflow_runs_status ON workflow_runs(status);
            CREATE INDEX IF NOT EXISTS idx_stage_runs_run_id ON stage_runs(run_id);"
        )?;
        Ok(())
    }

    /// Record a new workflow run as started.
    pub fn insert_workflow_run(
        &self,
        id: &str,
        workflow_id: &str,
        trigger_type: &str,
        started_at: &str,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO workflow_runs (id, workflow_id, trigger_type, status, started_at)
             VALUES (?1, ?2, ?3, 'running', ?4)",
            params![id, workflow_id, trigger_type, started_at],
        )?;
        Ok(())
    }

    /// Close a workflow run with its final status.
    pub fn complete_workflow_run(&self, id: &str, completion: &RunCompletion<'_>) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE workflow_runs
             SET status = ?2, outcome = ?3, failed_stage = ?4, error = ?5, finished_at = ?6, duration_ms = ?7
             WHERE id = ?1",
            params![
                id,
                completion.status,
                completion.outcome,
                completion.failed_stage,
                completion.error,
                completion.finished_at,
                completion.duration_ms,
            ],
        )?;
        Ok(())
    }

    /// Record one finished stage.
    pub fn insert_stage_run(&self, row: &StageRunRow) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO stage_runs (id, run_id, stage, status, started_at, finished_at, duration_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id,
                row.run_id,
                row.stage,
                row.status,
                row.started_at,
                row.finished_at,
                row.duration_ms,
                row.error,
            ],
        )?;
        Ok(())
    }

    /// Mark in-flight runs as crashed (for crash recovery on startup).
    pub fn mark_inflight_as_crashed(&self) -> Result<usize, rusqlite::Error> {
        let count = self.conn.execute(
            "UPDATE workflow_runs SET status = 'crashed' WHERE status = 'running'",
            [],
        )?;
        Ok(count)
    }

    /// Get recent workflow runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<WorkflowRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workflow_id, trigger_type, status, outcome, failed_stage, error, started_at, finished_at, duration_ms
             FROM workflow_runs ORDER BY started_at DESC LIMIT ?1"
        )?;
        let rows = stmt.query_map(params![limit], WorkflowRunRow::from_row)?;
        rows.collect()
    }

    /// Get every run of one workflow, oldest first.
    pub fn runs_for_workflow(&self, workflow_id: &str) -> Result<Vec<WorkflowRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workflow_id, trigger_type, status, outcome, failed_stage, error, started_at, finished_at, duration_ms
             FROM workflow_runs WHERE workflow_id = ?1 ORDER BY started_at"
        )?;
        let rows = stmt.query_map(params![workflow_id], WorkflowRunRow::from_row)?;
        rows.collect()
    }

    /// Get stage runs for a specific workflow run.
    pub fn stage_runs_for(&self, run_id: &str) -> Result<Vec<StageRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, stage, status, started_at, finished_at, duration_ms, error
             FROM stage_runs WHERE run_id = ?1 ORDER BY started_at, rowid"
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(StageRunRow {
                id: row.get(0)?,
                run_id: row.get(1)?,
                stage: row.get(2)?,
                status: row.get(3)?,
                started_at: row.get(4)?,
                finished_at: row.get(5)?,
                duration_ms: row.get(6)?,
                error: row.get(7)?,
            })
        })?;
        rows.collect()
    }
}

/// Final state written when a run ends.
#[derive(Debug, Default)]
pub struct RunCompletion<'a> {
    pub status: &'a str,
    pub outcome: Option<&'a str>,
    pub failed_stage: Option<&'a str>,
    pub error: Option<&'a str>,
    pub finished_at: &'a str,
    pub duration_ms: i64,
}

#[derive(Debug)]
pub struct WorkflowRunRow {
    pub id: String,
    pub workflow_id: String,
    pub trigger_type: String,
    pub status: String,
    pub outcome: Option<String>,
    pub failed_stage: Option<String>,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_ms: Option<i64>,
}

impl WorkflowRunRow {
    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            workflow_id: row.get(1)?,
            trigger_type: row.get(2)?,
            status: row.get(3)?,
            outcome: row.get(4)?,
            failed_stage: row.get(5)?,
            error: row.get(6)?,
            started_at: row.get(7)?,
            finished_at: row.get(8)?,
            duration_ms: row.get(9)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StageRunRow {
    pub id: String,
    pub run_id: String,
    pub stage: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}
