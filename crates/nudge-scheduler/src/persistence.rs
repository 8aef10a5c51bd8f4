//! SQLite-backed persistence for reminder jobs and loop configurations.
//! The store is the source of truth across restarts.

use std::path::Path;
use std::sync::Mutex;

use chrono::DateTime;
use rusqlite::Connection;

use nudge_core::error::{NudgeError, Result};

use crate::job::ReminderJob;
use crate::looper::{LoopConfig, ThreadMap};

/// SQLite store for reminders, webhook loops, and misc key/value state.
pub struct SchedulerDb {
    conn: Mutex<Connection>,
}

impl SchedulerDb {
    /// Open or create the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn =
            Connection::open(path).map_err(|e| NudgeError::Store(format!("open: {e}")))?;
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| NudgeError::Store(format!("open: {e}")))?;
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                userId TEXT,
                channelId TEXT,
                message TEXT,
                time INTEGER,
                active BOOLEAN DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS webhook_loops (
                channelId TEXT PRIMARY KEY,
                config TEXT,
                threads TEXT
            );

            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT
            );
         ",
            )
            .map_err(|e| NudgeError::Store(format!("migration: {e}")))?;
        Ok(())
    }

    // ─── Reminders ──────────────────────────────────────

    /// Insert a reminder row and return its assigned id. Must be called
    /// before the job is handed to the scheduler.
    pub fn insert_reminder(
        &self,
        user_id: &str,
        channel_id: &str,
        message: &str,
        due_at_unix: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO reminders (userId, channelId, message, time, active) VALUES (?1, ?2, ?3, ?4, 1)",
            rusqlite::params![user_id, channel_id, message, due_at_unix],
        )
        .map_err(|e| NudgeError::Store(format!("insert reminder: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete a reminder row. Called after confirmed delivery.
    pub fn delete_reminder(&self, id: i64) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute("DELETE FROM reminders WHERE id = ?1", [id])
            .map_err(|e| NudgeError::Store(format!("delete reminder: {e}")))?;
        Ok(())
    }

    /// Mark a reminder row inactive. Durable cancellation for the command
    /// layer; the in-process timer is stopped separately.
    pub fn deactivate_reminder(&self, id: i64) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute("UPDATE reminders SET active = 0 WHERE id = ?1", [id])
            .map_err(|e| NudgeError::Store(format!("deactivate reminder: {e}")))?;
        Ok(())
    }

    /// All active reminder rows. Rows that fail to scan are skipped and
    /// counted, never fatal.
    pub fn active_reminders(&self) -> Result<Vec<ReminderJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, userId, channelId, message, time FROM reminders WHERE active = 1")
            .map_err(|e| NudgeError::Store(format!("scan reminders: {e}")))?;
        let rows = stmt
            .query_map([], row_to_job)
            .map_err(|e| NudgeError::Store(format!("scan reminders: {e}")))?;

        let mut jobs = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            match row {
                Ok(job) => jobs.push(job),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!("⚠️ Skipped {skipped} unreadable reminder rows");
        }
        Ok(jobs)
    }

    /// Active reminders for one user, soonest first.
    pub fn active_reminders_for_user(&self, user_id: &str) -> Result<Vec<ReminderJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, userId, channelId, message, time FROM reminders
                 WHERE userId = ?1 AND active = 1 ORDER BY time ASC",
            )
            .map_err(|e| NudgeError::Store(format!("list reminders: {e}")))?;
        let rows = stmt
            .query_map([user_id], row_to_job)
            .map_err(|e| NudgeError::Store(format!("list reminders: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ─── Webhook loops ──────────────────────────────────────

    /// Persist a loop row keyed by its channel id.
    pub fn save_loop(&self, config: &LoopConfig, threads: &ThreadMap) -> Result<()> {
        let config_json = serde_json::to_string(config)
            .map_err(|e| NudgeError::Store(format!("serialize loop: {e}")))?;
        let threads_json = serde_json::to_string(threads)
            .map_err(|e| NudgeError::Store(format!("serialize threads: {e}")))?;
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT OR REPLACE INTO webhook_loops (channelId, config, threads) VALUES (?1, ?2, ?3)",
                rusqlite::params![config.channel_id, config_json, threads_json],
            )
            .map_err(|e| NudgeError::Store(format!("save loop: {e}")))?;
        Ok(())
    }

    /// Delete a loop row.
    pub fn delete_loop(&self, channel_id: &str) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute("DELETE FROM webhook_loops WHERE channelId = ?1", [channel_id])
            .map_err(|e| NudgeError::Store(format!("delete loop: {e}")))?;
        Ok(())
    }

    /// Raw loop rows: (channelId, config JSON, threads JSON).
    pub fn loop_rows(&self) -> Result<Vec<(String, String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT channelId, config, threads FROM webhook_loops")
            .map_err(|e| NudgeError::Store(format!("scan loops: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                ))
            })
            .map_err(|e| NudgeError::Store(format!("scan loops: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ─── Key/value ──────────────────────────────────────

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value],
            )
            .map_err(|e| NudgeError::Store(format!("kv set: {e}")))?;
        Ok(())
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
            row.get::<_, Option<String>>(0)
        }) {
            Ok(value) => Ok(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(NudgeError::Store(format!("kv get: {e}"))),
        }
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReminderJob> {
    let due_at_unix: i64 = row.get(4)?;
    Ok(ReminderJob {
        id: row.get(0)?,
        user_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        channel_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        message: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        due_at: DateTime::from_timestamp(due_at_unix, 0).unwrap_or(DateTime::UNIX_EPOCH),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn open_creates_file_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nudge.db");
        let db = SchedulerDb::open(&path).unwrap();
        assert!(path.exists());
        assert!(db.active_reminders().unwrap().is_empty());
        assert!(db.loop_rows().unwrap().is_empty());
    }

    #[test]
    fn reminder_round_trip() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let due = Utc::now().timestamp() + 60;
        let id = db.insert_reminder("u1", "c1", "water the plants", due).unwrap();

        let jobs = db.active_reminders().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].user_id, "u1");
        assert_eq!(jobs[0].due_at.timestamp(), due);

        db.delete_reminder(id).unwrap();
        assert!(db.active_reminders().unwrap().is_empty());
    }

    #[test]
    fn deactivated_rows_are_hidden() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let id = db.insert_reminder("u1", "", "m", 0).unwrap();
        db.deactivate_reminder(id).unwrap();
        assert!(db.active_reminders().unwrap().is_empty());
    }

    #[test]
    fn per_user_listing_is_ordered_by_due_time() {
        let db = SchedulerDb::open_in_memory().unwrap();
        db.insert_reminder("u1", "", "later", 2000).unwrap();
        db.insert_reminder("u1", "", "sooner", 1000).unwrap();
        db.insert_reminder("u2", "", "other user", 1500).unwrap();

        let jobs = db.active_reminders_for_user("u1").unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].message, "sooner");
        assert_eq!(jobs[1].message, "later");
    }

    #[test]
    fn loop_row_round_trip() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let config = LoopConfig {
            channel_id: "chan-1".into(),
            channel_name: "general".into(),
            interval: 2000,
            message: "hello".into(),
            webhook_author: "Looper".into(),
            webhook_avatar: String::new(),
        };
        db.save_loop(&config, &ThreadMap::new()).unwrap();

        let rows = db.loop_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "chan-1");
        let parsed: LoopConfig = serde_json::from_str(&rows[0].1).unwrap();
        assert_eq!(parsed.interval, 2000);
        assert_eq!(parsed.message, "hello");

        db.delete_loop("chan-1").unwrap();
        assert!(db.loop_rows().unwrap().is_empty());
    }

    #[test]
    fn kv_round_trip() {
        let db = SchedulerDb::open_in_memory().unwrap();
        assert_eq!(db.kv_get("missing").unwrap(), None);
        db.kv_set("k", "v").unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
        db.kv_set("k", "v2").unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v2"));
    }
}
