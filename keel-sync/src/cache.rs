//! Local state cache: what the remote side has already accepted.
//!
//! One SQLite database per project at `<root>/.keel/state.db`. Rows are only
//! written after a confirmed remote acceptance, so the cache is a memo and
//! never the source of truth.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use keel_core::{ConfigDocument, ProjectId, ProjectLayout};

use crate::error::{io_err, SyncError};

const REMOTE_ID_KEY: &str = "remote_id";
const PUSHED_AT_KEY: &str = "last_pushed_at";

/// The per-category fingerprint tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintTable {
    /// Keyed by migration file name.
    Migrations,
    /// Keyed by `<function>/<server path>`.
    FunctionFiles,
    /// Keyed by workflow name.
    Workflows,
}

impl FingerprintTable {
    fn table(self) -> &'static str {
        match self {
            FingerprintTable::Migrations => "migrations",
            FingerprintTable::FunctionFiles => "function_files",
            FingerprintTable::Workflows => "workflows",
        }
    }
}

#[derive(Debug)]
pub struct StateCache {
    conn: Connection,
}

impl StateCache {
    /// Open the cache of an already provisioned project.
    pub fn open(layout: &ProjectLayout) -> Result<Self, SyncError> {
        let path = layout.state_db_path();
        if !path.is_file() {
            return Err(SyncError::NotProvisioned {
                path: layout.root().to_path_buf(),
            });
        }
        Self::open_at(&path)
    }

    /// Open the cache of `layout`, creating `.keel/state.db` if needed.
    pub fn create(layout: &ProjectLayout) -> Result<Self, SyncError> {
        let dir = layout.state_dir();
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        Self::open_at(&layout.state_db_path())
    }

    pub fn open_at(path: &Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.migrate()?;
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.migrate()?;
        Ok(cache)
    }

    fn migrate(&self) -> Result<(), SyncError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS meta (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS config (
              id INTEGER PRIMARY KEY CHECK (id = 1),
              document TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS migrations (
              key TEXT PRIMARY KEY,
              fingerprint TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS functions (
              name TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS function_files (
              key TEXT PRIMARY KEY,
              fingerprint TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workflows (
              key TEXT PRIMARY KEY,
              fingerprint TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Project metadata
    // -----------------------------------------------------------------------

    /// Bind the cache to `remote_id` and record `baseline` as the last
    /// synchronized configuration.
    ///
    /// Returns `false` without touching anything when the cache is already
    /// bound to the same id.
    pub fn provision(
        &mut self,
        remote_id: &ProjectId,
        baseline: &ConfigDocument,
    ) -> Result<bool, SyncError> {
        if let Some(existing) = self.remote_id()? {
            if &existing == remote_id {
                return Ok(false);
            }
            return Err(SyncError::AlreadyProvisioned {
                existing,
                requested: remote_id.clone(),
            });
        }
        let document = serde_json::to_string(baseline)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO meta(key, value) VALUES (?1, ?2)",
            params![REMOTE_ID_KEY, remote_id.as_str()],
        )?;
        tx.execute(
            r#"
            INSERT INTO config(id, document) VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET document=excluded.document
            "#,
            params![document],
        )?;
        tx.commit()?;
        Ok(true)
    }

    pub fn remote_id(&self) -> Result<Option<ProjectId>, SyncError> {
        Ok(self.meta(REMOTE_ID_KEY)?.map(ProjectId::from))
    }

    /// Like [`remote_id`](Self::remote_id) but a missing id is an error.
    pub fn require_remote_id(&self, root: &Path) -> Result<ProjectId, SyncError> {
        self.remote_id()?.ok_or_else(|| SyncError::NotProvisioned {
            path: root.to_path_buf(),
        })
    }

    pub fn last_pushed_at(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        Ok(self
            .meta(PUSHED_AT_KEY)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc)))
    }

    pub fn touch_pushed_at(&self, at: DateTime<Utc>) -> Result<(), SyncError> {
        self.set_meta(PUSHED_AT_KEY, &at.to_rfc3339())
    }

    fn meta(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.conn.execute(
            r#"
            INSERT INTO meta(key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Configuration baseline
    // -----------------------------------------------------------------------

    /// The last pushed configuration document, if any.
    pub fn config_document(&self) -> Result<Option<ConfigDocument>, SyncError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT document FROM config WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_config_document(&self, document: &ConfigDocument) -> Result<(), SyncError> {
        let raw = serde_json::to_string(document)?;
        self.conn.execute(
            r#"
            INSERT INTO config(id, document) VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET document=excluded.document
            "#,
            params![raw],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fingerprints
    // -----------------------------------------------------------------------

    /// Every `key → fingerprint` row of `table`.
    pub fn fingerprints(&self, table: FingerprintTable) -> Result<HashMap<String, String>, SyncError> {
        let sql = format!("SELECT key, fingerprint FROM {}", table.table());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<HashMap<_, _>, _>>()?)
    }

    /// Rows of `table` whose key starts with `prefix`.
    pub fn fingerprints_with_prefix(
        &self,
        table: FingerprintTable,
        prefix: &str,
    ) -> Result<HashMap<String, String>, SyncError> {
        let sql = format!(
            "SELECT key, fingerprint FROM {} WHERE substr(key, 1, length(?1)) = ?1",
            table.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<HashMap<_, _>, _>>()?)
    }

    pub fn put_fingerprint(
        &self,
        table: FingerprintTable,
        key: &str,
        fingerprint: &str,
    ) -> Result<(), SyncError> {
        let sql = format!(
            r#"
            INSERT INTO {}(key, fingerprint) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET fingerprint=excluded.fingerprint
            "#,
            table.table()
        );
        self.conn.execute(&sql, params![key, fingerprint])?;
        Ok(())
    }

    pub fn delete_fingerprint(&self, table: FingerprintTable, key: &str) -> Result<(), SyncError> {
        let sql = format!("DELETE FROM {} WHERE key = ?1", table.table());
        self.conn.execute(&sql, params![key])?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Function names
    // -----------------------------------------------------------------------

    pub fn function_names(&self) -> Result<Vec<String>, SyncError> {
        let mut stmt = self.conn.prepare("SELECT name FROM functions ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn put_function(&self, name: &str) -> Result<(), SyncError> {
        self.conn.execute(
            "INSERT INTO functions(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        Ok(())
    }

    /// Forget a function together with every file row beneath it.
    pub fn delete_function(&mut self, name: &str) -> Result<(), SyncError> {
        let prefix = format!("{name}/");
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM functions WHERE name = ?1", params![name])?;
        tx.execute(
            "DELETE FROM function_files WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(name: &str) -> ConfigDocument {
        ConfigDocument::named(name)
    }

    #[test]
    fn open_without_provisioning_fails() {
        let tmp = TempDir::new().expect("tempdir");
        let layout = ProjectLayout::new(tmp.path());
        assert!(matches!(
            StateCache::open(&layout),
            Err(SyncError::NotProvisioned { .. })
        ));
    }

    #[test]
    fn provision_persists_across_reopen() {
        let tmp = TempDir::new().expect("tempdir");
        let layout = ProjectLayout::new(tmp.path());
        {
            let mut cache = StateCache::create(&layout).expect("create");
            assert!(cache.provision(&ProjectId::from("p1"), &doc("shop")).expect("provision"));
        }
        let cache = StateCache::open(&layout).expect("reopen");
        assert_eq!(cache.remote_id().expect("id"), Some(ProjectId::from("p1")));
        assert_eq!(cache.config_document().expect("doc"), Some(doc("shop")));
    }

    #[test]
    fn provision_is_idempotent_for_same_id() {
        let mut cache = StateCache::open_in_memory().expect("open");
        let id = ProjectId::from("p1");
        assert!(cache.provision(&id, &doc("a")).expect("first"));
        assert!(!cache.provision(&id, &doc("b")).expect("second"));
        assert_eq!(cache.config_document().expect("doc"), Some(doc("a")));
    }

    #[test]
    fn provision_rejects_a_different_id() {
        let mut cache = StateCache::open_in_memory().expect("open");
        cache.provision(&ProjectId::from("p1"), &doc("a")).expect("first");
        let err = cache
            .provision(&ProjectId::from("p2"), &doc("a"))
            .unwrap_err();
        assert!(matches!(err, SyncError::AlreadyProvisioned { .. }));
    }

    #[test]
    fn fingerprint_upsert_and_delete() {
        let cache = StateCache::open_in_memory().expect("open");
        let table = FingerprintTable::Migrations;
        cache.put_fingerprint(table, "a.sql", "1").expect("put");
        cache.put_fingerprint(table, "a.sql", "2").expect("upsert");
        assert_eq!(
            cache.fingerprints(table).expect("read").get("a.sql").map(String::as_str),
            Some("2")
        );
        cache.delete_fingerprint(table, "a.sql").expect("delete");
        assert!(cache.fingerprints(table).expect("read").is_empty());
    }

    #[test]
    fn prefix_query_does_not_match_sibling_functions() {
        let cache = StateCache::open_in_memory().expect("open");
        let table = FingerprintTable::FunctionFiles;
        cache.put_fingerprint(table, "api/index.ts", "1").expect("put");
        cache.put_fingerprint(table, "api_v2/index.ts", "2").expect("put");

        let rows = cache.fingerprints_with_prefix(table, "api/").expect("read");
        assert_eq!(rows.len(), 1);
        assert!(rows.contains_key("api/index.ts"));
    }

    #[test]
    fn delete_function_drops_its_files() {
        let mut cache = StateCache::open_in_memory().expect("open");
        let table = FingerprintTable::FunctionFiles;
        cache.put_function("api").expect("put");
        cache.put_function("cron").expect("put");
        cache.put_fingerprint(table, "api/index.ts", "1").expect("put");
        cache.put_fingerprint(table, "cron/index.ts", "2").expect("put");

        cache.delete_function("api").expect("delete");
        assert_eq!(cache.function_names().expect("names"), vec!["cron".to_string()]);
        assert_eq!(cache.fingerprints(table).expect("read").len(), 1);
    }

    #[test]
    fn pushed_at_round_trips_as_rfc3339() {
        let cache = StateCache::open_in_memory().expect("open");
        assert_eq!(cache.last_pushed_at().expect("read"), None);
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .expect("ts")
            .with_timezone(&Utc);
        cache.touch_pushed_at(at).expect("touch");
        assert_eq!(cache.last_pushed_at().expect("read"), Some(at));
    }
}
