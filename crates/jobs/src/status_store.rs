use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::Error;

/// WAL-mode SQLite store for job status and log lines, kept in a file
/// separate from the results store so a burst of status polling never
/// blocks a result write.
#[derive(Clone)]
pub struct StatusStore {
    conn: Arc<Mutex<Connection>>,
}

impl StatusStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pipeline_status (
                job_id TEXT PRIMARY KEY,
                step TEXT NOT NULL,
                progress REAL NOT NULL,
                result TEXT,
                started_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS pipeline_logs (
                job_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn upsert_status(&self, job_id: Uuid, step: &str, progress: f32, result: Option<&str>, started_at: &str) -> Result<(), Error> {
        let conn = self.conn.lock().expect("status db mutex is never poisoned by a panicking holder");
        conn.execute(
            "INSERT INTO pipeline_status (job_id, step, progress, result, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(job_id) DO UPDATE SET step = excluded.step, progress = excluded.progress, result = excluded.result",
            params![job_id.to_string(), step, progress, result, started_at],
        )?;
        Ok(())
    }

    pub fn status(&self, job_id: Uuid) -> Result<Option<(String, f32, Option<String>, String)>, Error> {
        let conn = self.conn.lock().expect("status db mutex is never poisoned by a panicking holder");
        let mut stmt = conn.prepare("SELECT step, progress, result, started_at FROM pipeline_status WHERE job_id = ?1")?;
        let mut rows = stmt.query(params![job_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))),
            None => Ok(None),
        }
    }

    pub fn append_log(&self, job_id: Uuid, timestamp: &str, level: &str, message: &str) -> Result<(), Error> {
        let conn = self.conn.lock().expect("status db mutex is never poisoned by a panicking holder");
        conn.execute(
            "INSERT INTO pipeline_logs (job_id, timestamp, level, message) VALUES (?1, ?2, ?3, ?4)",
            params![job_id.to_string(), timestamp, level, message],
        )?;
        Ok(())
    }

    pub fn logs(&self, job_id: Uuid) -> Result<Vec<(String, String, String)>, Error> {
        let conn = self.conn.lock().expect("status db mutex is never poisoned by a panicking holder");
        let mut stmt = conn.prepare("SELECT timestamp, level, message FROM pipeline_logs WHERE job_id = ?1 ORDER BY timestamp ASC")?;
        let rows = stmt.query_map(params![job_id.to_string()], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Error::from)
    }

    /// The most recently started jobs, newest first, surviving process
    /// restarts since they come straight from the on-disk status table.
    pub fn recent(&self, limit: u32) -> Result<Vec<(Uuid, String, f32, Option<String>, String)>, Error> {
        let conn = self.conn.lock().expect("status db mutex is never poisoned by a panicking holder");
        let mut stmt = conn.prepare("SELECT job_id, step, progress, result, started_at FROM pipeline_status ORDER BY started_at DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], |row| {
            let job_id: String = row.get(0)?;
            Ok((job_id, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?;
        rows.map(|row| {
            let (job_id, step, progress, result, started_at) = row?;
            let job_id = Uuid::parse_str(&job_id).map_err(|_| rusqlite::Error::InvalidColumnType(0, "job_id".to_string(), rusqlite::types::Type::Text))?;
            Ok((job_id, step, progress, result, started_at))
        })
        .collect::<Result<Vec<_>, rusqlite::Error>>()
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_status_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::open(dir.path().join("jobs.sqlite")).unwrap();
        let job_id = Uuid::new_v4();

        store.upsert_status(job_id, "ingest", 0.1, None, "2026-01-01T00:00:00Z").unwrap();
        store.upsert_status(job_id, "annotate", 0.5, None, "2026-01-01T00:00:00Z").unwrap();
        store.append_log(job_id, "2026-01-01T00:00:01Z", "info", "started annotation").unwrap();

        let (step, progress, _, _) = store.status(job_id).unwrap().unwrap();
        assert_eq!(step, "annotate");
        assert_eq!(progress, 0.5);
        assert_eq!(store.logs(job_id).unwrap().len(), 1);
    }

    #[test]
    fn recent_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::open(dir.path().join("jobs.sqlite")).unwrap();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();

        store.upsert_status(older, "completed", 1.0, None, "2026-01-01T00:00:00Z").unwrap();
        store.upsert_status(newer, "completed", 1.0, None, "2026-01-02T00:00:00Z").unwrap();

        let recent = store.recent(10).unwrap();
        assert_eq!(recent[0].0, newer);
        assert_eq!(recent[1].0, older);
    }
}
