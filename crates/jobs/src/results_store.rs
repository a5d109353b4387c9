use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::Error;

/// Stage-output store, keyed by `(job_id, stage_name)` per the Results
/// database described for the job runtime — one row per completed stage,
/// holding the stage's exported CSV as a blob so a second process (or a
/// restarted server) can still stream it back. Kept in its own connection
/// so a burst of result reads never blocks a status write.
#[derive(Clone)]
pub struct ResultsStore {
    conn: Arc<Mutex<Connection>>,
}

impl ResultsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stage_results (
                job_id TEXT NOT NULL,
                stage_name TEXT NOT NULL,
                csv_blob BLOB NOT NULL,
                PRIMARY KEY (job_id, stage_name)
            );",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn write_stage(&self, job_id: Uuid, stage_name: &str, csv_blob: &[u8]) -> Result<(), Error> {
        let conn = self.conn.lock().expect("results db mutex is never poisoned by a panicking holder");
        conn.execute(
            "INSERT INTO stage_results (job_id, stage_name, csv_blob) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id, stage_name) DO UPDATE SET csv_blob = excluded.csv_blob",
            params![job_id.to_string(), stage_name, csv_blob],
        )?;
        Ok(())
    }

    pub fn read_stage(&self, job_id: Uuid, stage_name: &str) -> Result<Option<Vec<u8>>, Error> {
        let conn = self.conn.lock().expect("results db mutex is never poisoned by a panicking holder");
        let mut stmt = conn.prepare("SELECT csv_blob FROM stage_results WHERE job_id = ?1 AND stage_name = ?2")?;
        let mut rows = stmt.query(params![job_id.to_string(), stage_name])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_stage_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(dir.path().join("results.sqlite")).unwrap();
        let job_id = Uuid::new_v4();

        assert!(store.read_stage(job_id, "link_rows").unwrap().is_none());

        store.write_stage(job_id, "link_rows", b"patient_id,value\nP1,ok\n").unwrap();
        let blob = store.read_stage(job_id, "link_rows").unwrap().unwrap();
        assert_eq!(blob, b"patient_id,value\nP1,ok\n");
    }
}
