//! SQLite-backed analysis result store.
//!
//! One `drift.db` file in WAL mode. Snapshots and their fingerprints live in
//! separate tables so shallow loads never touch fingerprint payloads.

use crate::error::{StoreError, StoreResult};
use crate::store::{new_analysis_id, scope, validate_analytics, validate_result, ProjectAnalysisResultStore};
use drift_core::{
    format_timestamp, parse_timestamp, AnalyticsRecord, CohortAnalysis, Fingerprint,
    FingerprintKind, FingerprintUsage, FingerprintWithId, PersistenceResult,
    ProjectAnalysisResult, RepoRef,
};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

const SCHEMA_VERSION: u32 = 2;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS repo_snapshots (
    rowid INTEGER PRIMARY KEY,
    id TEXT UNIQUE NOT NULL,
    workspace_id TEXT NOT NULL,
    owner TEXT NOT NULL,
    repo TEXT NOT NULL,
    sha TEXT NOT NULL DEFAULT '',
    branch TEXT,
    url TEXT,
    ts TEXT NOT NULL,
    ts_unix INTEGER NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    score REAL,
    errors TEXT NOT NULL DEFAULT '[]',
    UNIQUE (workspace_id, owner, repo, sha)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_workspace ON repo_snapshots(workspace_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_repo ON repo_snapshots(owner, repo, ts_unix DESC);

CREATE TABLE IF NOT EXISTS fingerprints (
    snapshot_id TEXT NOT NULL REFERENCES repo_snapshots(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    fp_type TEXT NOT NULL,
    name TEXT NOT NULL,
    sha TEXT NOT NULL,
    data TEXT NOT NULL,
    display_name TEXT,
    display_value TEXT,
    PRIMARY KEY (snapshot_id, position)
);

CREATE INDEX IF NOT EXISTS idx_fingerprints_kind ON fingerprints(fp_type, name);

CREATE TABLE IF NOT EXISTS fingerprint_analytics (
    workspace_id TEXT NOT NULL,
    fp_type TEXT NOT NULL,
    name TEXT NOT NULL,
    count INTEGER NOT NULL,
    variants INTEGER NOT NULL,
    entropy REAL NOT NULL,
    PRIMARY KEY (workspace_id, fp_type, name)
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const SNAPSHOT_COLUMNS: &str =
    "id, workspace_id, owner, repo, sha, branch, url, ts, tags, score, errors";

const FINGERPRINT_COLUMNS: &str = "fp_type, name, sha, data, display_name, display_value";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a database file with the full schema.
    pub fn open_or_create(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        Self::init(Connection::open(db_path)?)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        let version = store.schema_version()?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::Unavailable(format!(
                "database schema v{version} is newer than supported v{SCHEMA_VERSION}"
            )));
        }
        if version < 2 {
            store.migrate_v1()?;
        }
        Ok(store)
    }

    /// v1 snapshots predate recorded evaluation errors.
    fn migrate_v1(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch("ALTER TABLE repo_snapshots ADD COLUMN errors TEXT NOT NULL DEFAULT '[]';")?;
        tx.execute(
            "UPDATE schema_meta SET value = ?1 WHERE key = 'version'",
            params![SCHEMA_VERSION.to_string()],
        )?;
        tx.commit()?;
        tracing::info!(to = SCHEMA_VERSION, "migrated snapshot schema");
        Ok(())
    }

    pub fn schema_version(&self) -> StoreResult<u32> {
        let conn = self.conn()?;
        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.and_then(|v| v.parse().ok()).unwrap_or(SCHEMA_VERSION))
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    // ── Snapshots ───────────────────────────────────────────────────

    fn insert_snapshot(&self, result: &ProjectAnalysisResult) -> StoreResult<PersistenceResult> {
        validate_result(result)?;
        let id = new_analysis_id();
        let tags = serde_json::to_string(&result.tags)?;
        let errors = serde_json::to_string(&result.evaluation_errors)?;
        let mut fp_rows = Vec::with_capacity(result.fingerprints.len());
        for fp in &result.fingerprints {
            fp_rows.push((fp, serde_json::to_string(&fp.data)?));
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO repo_snapshots
             (id, workspace_id, owner, repo, sha, branch, url, ts, ts_unix, tags, score, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                result.workspace_id,
                result.repo_ref.owner,
                result.repo_ref.repo,
                result.repo_ref.sha.as_deref().unwrap_or(""),
                result.repo_ref.branch,
                result.repo_ref.url,
                format_timestamp(result.timestamp),
                result.timestamp.unix_timestamp(),
                tags,
                result.score,
                errors,
            ],
        );
        if let Err(err) = inserted {
            return Err(if is_constraint_violation(&err) {
                StoreError::Duplicate(result.snapshot_key())
            } else {
                err.into()
            });
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO fingerprints
                 (snapshot_id, position, fp_type, name, sha, data, display_name, display_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (position, (fp, data)) in fp_rows.iter().enumerate() {
                stmt.execute(params![
                    id,
                    position as i64,
                    fp.fp_type,
                    fp.name,
                    fp.sha,
                    data,
                    fp.display_name,
                    fp.display_value,
                ])?;
            }
        }
        tx.commit()?;

        Ok(PersistenceResult {
            id,
            repo_ref: result.repo_ref.clone(),
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Ok(conn) = self.conn.get_mut() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}

#[async_trait::async_trait]
impl ProjectAnalysisResultStore for SqliteStore {
    async fn distinct_repo_count(&self, workspace_id: &str) -> StoreResult<u64> {
        let scope = scope(workspace_id)?;
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT owner, repo FROM repo_snapshots
             WHERE ?1 IS NULL OR workspace_id = ?1)",
            params![scope.id()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn latest_timestamp(&self, workspace_id: &str) -> StoreResult<OffsetDateTime> {
        let scope = scope(workspace_id)?;
        let conn = self.conn()?;
        let ts: Option<String> = conn
            .query_row(
                "SELECT ts FROM repo_snapshots WHERE ?1 IS NULL OR workspace_id = ?1
                 ORDER BY ts_unix DESC, rowid DESC LIMIT 1",
                params![scope.id()],
                |row| row.get(0),
            )
            .optional()?;
        match ts {
            Some(ts) => Ok(parse_timestamp(&ts)?),
            None => Err(StoreError::NotFound(format!("no analyses in workspace {scope}"))),
        }
    }

    async fn load_in_workspace(
        &self,
        workspace_id: &str,
        deep: bool,
    ) -> StoreResult<Vec<ProjectAnalysisResult>> {
        let scope = scope(workspace_id)?;
        let conn = self.conn()?;
        query_snapshots(
            &conn,
            "WHERE ?1 IS NULL OR workspace_id = ?1 ORDER BY rowid",
            params![scope.id()],
            deep,
        )
    }

    async fn load_by_repo_ref(&self, repo: &RepoRef) -> StoreResult<Option<ProjectAnalysisResult>> {
        let conn = self.conn()?;
        let mut found = query_snapshots(
            &conn,
            "WHERE owner = ?1 AND repo = ?2
               AND (?3 IS NULL OR sha = ?3)
               AND (?4 IS NULL OR branch = ?4)
             ORDER BY ts_unix DESC, rowid DESC LIMIT 1",
            params![repo.owner, repo.repo, repo.sha, repo.branch],
            true,
        )?;
        Ok(found.pop())
    }

    async fn load_by_id(&self, id: &str) -> StoreResult<Option<ProjectAnalysisResult>> {
        let conn = self.conn()?;
        let mut found = query_snapshots(&conn, "WHERE id = ?1", params![id], true)?;
        Ok(found.pop())
    }

    async fn persist_single(&self, result: &ProjectAnalysisResult) -> StoreResult<PersistenceResult> {
        self.insert_snapshot(result)
    }

    async fn distinct_fingerprint_kinds(&self, workspace_id: &str) -> StoreResult<Vec<FingerprintKind>> {
        let scope = scope(workspace_id)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT f.fp_type, f.name FROM fingerprints f
             JOIN repo_snapshots s ON s.id = f.snapshot_id
             WHERE ?1 IS NULL OR s.workspace_id = ?1
             ORDER BY f.fp_type, f.name",
        )?;
        let kinds = stmt
            .query_map(params![scope.id()], |row| {
                Ok(FingerprintKind::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(kinds)
    }

    async fn fingerprint_usage_for_type(
        &self,
        workspace_id: &str,
        fp_type: Option<&str>,
    ) -> StoreResult<Vec<FingerprintUsage>> {
        let scope = scope(workspace_id)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT fp_type, name, count, variants, entropy FROM fingerprint_analytics
             WHERE (?1 IS NULL OR workspace_id = ?1) AND (?2 IS NULL OR fp_type = ?2)
             ORDER BY fp_type, name",
        )?;
        let usage = stmt
            .query_map(params![scope.id(), fp_type], |row| {
                Ok(FingerprintUsage {
                    fp_type: row.get(0)?,
                    name: row.get(1)?,
                    categories: BTreeSet::new(),
                    cohort: CohortAnalysis {
                        count: row.get::<_, i64>(2)? as u64,
                        variants: row.get::<_, i64>(3)? as u64,
                        entropy: row.get(4)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usage)
    }

    async fn persist_analytics(&self, batch: &[AnalyticsRecord]) -> StoreResult<bool> {
        if let Err(err) = validate_analytics(batch) {
            tracing::warn!(error = %err, "rejected analytics batch");
            return Ok(false);
        }
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO fingerprint_analytics
                 (workspace_id, fp_type, name, count, variants, entropy)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in batch {
                stmt.execute(params![
                    record.workspace_id,
                    record.kind.fp_type,
                    record.kind.name,
                    record.cohort_analysis.count as i64,
                    record.cohort_analysis.variants as i64,
                    record.cohort_analysis.entropy,
                ])?;
            }
        }
        tx.commit()?;
        tracing::info!(records = batch.len(), "persisted analytics");
        Ok(true)
    }

    async fn fingerprints_in_workspace(
        &self,
        workspace_id: &str,
        fp_type: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<Vec<FingerprintWithId>> {
        let scope = scope(workspace_id)?;
        let conn = self.conn()?;
        let sql = format!(
            "SELECT f.snapshot_id, {} FROM fingerprints f
             JOIN repo_snapshots s ON s.id = f.snapshot_id
             WHERE (?1 IS NULL OR s.workspace_id = ?1)
               AND (?2 IS NULL OR f.fp_type = ?2)
               AND (?3 IS NULL OR f.name = ?3)
             ORDER BY s.rowid, f.position",
            prefixed_fingerprint_columns("f")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![scope.id(), fp_type, name], |row| {
                Ok((row.get::<_, String>(0)?, FingerprintRow::read(row, 1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, row)| {
                Ok(FingerprintWithId {
                    id,
                    fingerprint: row.into_fingerprint()?,
                })
            })
            .collect()
    }

    async fn fingerprints_for_project(&self, id: &str) -> StoreResult<Vec<Fingerprint>> {
        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM repo_snapshots WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("analysis {id}")));
        }
        load_fingerprints(&conn, id)
    }

    async fn average_fingerprint_count(&self, workspace_id: Option<&str>) -> StoreResult<f64> {
        let scope = scope(workspace_id.unwrap_or(drift_core::WorkspaceScope::WILDCARD))?;
        let conn = self.conn()?;
        let avg: Option<f64> = conn.query_row(
            "SELECT AVG(n) FROM (
                SELECT COUNT(f.snapshot_id) AS n FROM repo_snapshots s
                LEFT JOIN fingerprints f ON f.snapshot_id = s.id
                WHERE ?1 IS NULL OR s.workspace_id = ?1
                GROUP BY s.id
             )",
            params![scope.id()],
            |row| row.get(0),
        )?;
        Ok(avg.unwrap_or(0.0))
    }
}

// ── Row helpers ─────────────────────────────────────────────────────

struct SnapshotRow {
    id: String,
    workspace_id: String,
    owner: String,
    repo: String,
    sha: String,
    branch: Option<String>,
    url: Option<String>,
    ts: String,
    tags: String,
    score: Option<f64>,
    errors: String,
}

impl SnapshotRow {
    fn into_result(self, fingerprints: Vec<Fingerprint>) -> StoreResult<ProjectAnalysisResult> {
        Ok(ProjectAnalysisResult {
            id: Some(self.id),
            workspace_id: self.workspace_id,
            repo_ref: RepoRef {
                owner: self.owner,
                repo: self.repo,
                sha: (!self.sha.is_empty()).then_some(self.sha),
                branch: self.branch,
                url: self.url,
            },
            fingerprints,
            timestamp: parse_timestamp(&self.ts)?,
            tags: serde_json::from_str(&self.tags)?,
            score: self.score,
            evaluation_errors: serde_json::from_str(&self.errors)?,
        })
    }
}

struct FingerprintRow {
    fp_type: String,
    name: String,
    sha: String,
    data: String,
    display_name: Option<String>,
    display_value: Option<String>,
}

impl FingerprintRow {
    fn read(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            fp_type: row.get(offset)?,
            name: row.get(offset + 1)?,
            sha: row.get(offset + 2)?,
            data: row.get(offset + 3)?,
            display_name: row.get(offset + 4)?,
            display_value: row.get(offset + 5)?,
        })
    }

    fn into_fingerprint(self) -> StoreResult<Fingerprint> {
        Ok(Fingerprint {
            fp_type: self.fp_type,
            name: self.name,
            data: serde_json::from_str(&self.data)?,
            sha: self.sha,
            display_name: self.display_name,
            display_value: self.display_value,
        })
    }
}

fn query_snapshots(
    conn: &Connection,
    where_clause: &str,
    args: &[&dyn rusqlite::ToSql],
    deep: bool,
) -> StoreResult<Vec<ProjectAnalysisResult>> {
    let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM repo_snapshots {where_clause}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(args, |row| {
            Ok(SnapshotRow {
                id: row.get(0)?,
                workspace_id: row.get(1)?,
                owner: row.get(2)?,
                repo: row.get(3)?,
                sha: row.get(4)?,
                branch: row.get(5)?,
                url: row.get(6)?,
                ts: row.get(7)?,
                tags: row.get(8)?,
                score: row.get(9)?,
                errors: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let fingerprints = if deep {
            load_fingerprints(conn, &row.id)?
        } else {
            Vec::new()
        };
        results.push(row.into_result(fingerprints)?);
    }
    Ok(results)
}

fn prefixed_fingerprint_columns(alias: &str) -> String {
    FINGERPRINT_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn load_fingerprints(conn: &Connection, snapshot_id: &str) -> StoreResult<Vec<Fingerprint>> {
    let sql = format!(
        "SELECT {FINGERPRINT_COLUMNS} FROM fingerprints WHERE snapshot_id = ?1 ORDER BY position"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![snapshot_id], |row| FingerprintRow::read(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(FingerprintRow::into_fingerprint).collect()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}
