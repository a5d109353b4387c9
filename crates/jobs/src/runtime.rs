use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Error;
use crate::process::JobProcess;
use crate::shapes::JobShape;
use crate::status_store::StatusStore;

/// Per-job bookkeeping the runtime needs to cancel a running job: its
/// cancellation token, kept separate from the status store so cancelling a
/// job never depends on a database round trip.
#[derive(Default)]
struct Registry {
    tokens: HashMap<Uuid, CancellationToken>,
}

/// Runs pipeline jobs as isolated OS processes, tracking status in a
/// WAL-mode SQLite store and exposing cancellation through a
/// `CancellationToken` per job — the "task with a cancel token" shape the
/// rest of the runtime is built around.
pub struct JobRuntime {
    status: StatusStore,
    registry: Arc<Mutex<Registry>>,
    etl_host: String,
    poll_interval: Duration,
    grace_period: Duration,
}

impl JobRuntime {
    pub fn new(status: StatusStore, etl_host: String, poll_interval: Duration, grace_period: Duration) -> Self {
        Self { status, registry: Arc::new(Mutex::new(Registry::default())), etl_host, poll_interval, grace_period }
    }

    /// Registers a new job and spawns the external command backing
    /// `shape`, returning its id immediately; the job runs to completion
    /// in the background and reports through the status store.
    pub async fn submit(&self, shape: JobShape, payload: &str) -> Result<Uuid, Error> {
        let job_id = Uuid::new_v4();
        let started_at = now_rfc3339();
        self.status.upsert_status(job_id, "pending", 0.0, None, &started_at)?;

        let token = CancellationToken::new();
        self.registry.lock().await.tokens.insert(job_id, token.clone());

        let command = self.build_command(shape, job_id, payload);
        let process = JobProcess::spawn(command)?;

        let status = self.status.clone();
        let registry = self.registry.clone();
        let grace_period = self.grace_period;

        tokio::spawn(async move {
            let _ = status.upsert_status(job_id, shape.as_str(), 0.1, None, &started_at);
            let outcome = process.wait_or_cancel(token.clone(), grace_period).await;

            let (step, result) = match outcome {
                Ok(exit) if exit.success() => ("completed", Some("ok".to_string())),
                Ok(_) if token.is_cancelled() => ("cancelled", Some("cancelled".to_string())),
                Ok(exit) => ("failed", Some(format!("exit status {exit}"))),
                Err(err) => ("failed", Some(err.to_string())),
            };
            let _ = status.upsert_status(job_id, step, 1.0, result.as_deref(), &started_at);
            registry.lock().await.tokens.remove(&job_id);
        });

        Ok(job_id)
    }

    /// Requests cancellation of a running job; a no-op if the job has
    /// already finished.
    pub async fn cancel(&self, job_id: Uuid) -> Result<(), Error> {
        match self.registry.lock().await.tokens.get(&job_id) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(Error::NotFound(job_id)),
        }
    }

    pub fn status_store(&self) -> &StatusStore {
        &self.status
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn build_command(&self, shape: JobShape, job_id: Uuid, payload: &str) -> Command {
        let mut command = Command::new("annot-pipeline-worker");
        command.arg(shape.as_str()).arg("--job-id").arg(job_id.to_string()).arg("--etl-host").arg(&self.etl_host).arg("--payload").arg(payload);
        command
    }
}

fn now_rfc3339() -> String {
    jiff::Timestamp::now().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_shape_strings_are_stable() {
        assert_eq!(JobShape::Annotate.as_str(), "annotate");
        assert_eq!(JobShape::QualityCheck.as_str(), "quality_check");
    }
}
