use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// A child process running a pipeline stage in its own process group, so
/// cancellation can reach every descendant it spawns.
pub struct JobProcess {
    child: Child,
    pgid: Pid,
}

impl JobProcess {
    /// Spawns `command`, placing it in a new process group via `setsid` so
    /// it and anything it forks can be signalled together.
    pub fn spawn(mut command: Command) -> Result<Self, Error> {
        // SAFETY: `setsid` is async-signal-safe and runs in the child
        // after fork, before exec; it touches only the child's own process
        // state.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }
        let child = command.spawn().map_err(Error::Spawn)?;
        let pid = child.id().expect("freshly spawned child has a pid") as i32;
        Ok(Self { child, pgid: Pid::from_raw(pid) })
    }

    /// Waits for the child to exit, or for `cancel` to fire — in which
    /// case the process group is sent `SIGTERM`, given `grace_period` to
    /// exit on its own, then `SIGKILL`ed and reaped so no zombie survives.
    pub async fn wait_or_cancel(mut self, cancel: CancellationToken, grace_period: Duration) -> Result<std::process::ExitStatus, Error> {
        tokio::select! {
            status = self.child.wait() => Ok(status.map_err(Error::Spawn)?),
            _ = cancel.cancelled() => {
                killpg(self.pgid, Signal::SIGTERM).map_err(Error::Signal)?;

                let exited = tokio::time::timeout(grace_period, self.child.wait()).await;
                match exited {
                    Ok(status) => Ok(status.map_err(Error::Spawn)?),
                    Err(_timeout) => {
                        let _ = killpg(self.pgid, Signal::SIGKILL);
                        Ok(self.child.wait().await.map_err(Error::Spawn)?)
                    }
                }
            }
        }
    }
}
