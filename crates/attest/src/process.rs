//! Process supervision: spawn, readiness, stop, kill, restart

use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::harness::Harness;
use crate::poll;

/// Signal used to bring a process down during [`Harness::restart_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM, escalating to SIGKILL after the shutdown timeout
    Term,
    /// SIGKILL immediately — simulates a crash
    Kill,
}

/// One managed child process.
///
/// The `Child` handle is taken out of the record before any blocking wait so
/// the map lock is never held across an await point. Externally registered
/// processes carry no child or process group.
pub(crate) struct ProcessRecord {
    child: Option<Child>,
    pgid: Option<i32>,
    pub(crate) port: u16,
    args: Vec<String>,
}

impl ProcessRecord {
    pub(crate) fn external(port: u16) -> Self {
        Self { child: None, pgid: None, port, args: Vec::new() }
    }
}

impl Harness {
    /// Starts a named process with an OS-assigned port.
    ///
    /// The configured command is spawned in a new process group with
    /// `--port=<n>` and `--working-dir=<run dir>` prepended to `args`, its
    /// output appended to `<run dir>/<name>.log`. Blocks until the port
    /// accepts TCP connections or the start timeout elapses.
    pub async fn start(&self, name: &str, args: &[&str]) -> Result<()> {
        let args = args.iter().map(|s| s.to_string()).collect();
        self.start_on_port(name, 0, args).await
    }

    async fn start_on_port(&self, name: &str, port: u16, args: Vec<String>) -> Result<()> {
        if self.token.is_cancelled() {
            return Ok(());
        }

        let port = if port == 0 { free_port()? } else { port };

        let log_path = self.working_dir.join(format!("{name}.log"));
        let log = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)?;

        let mut command = Command::new(&self.config.command);
        command
            .arg(format!("--port={port}"))
            .arg(format!("--working-dir={}", self.working_dir.display()))
            .args(&args)
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .kill_on_drop(true);
        command.process_group(0);

        let child = command.spawn().map_err(|e| {
            Error::ProcessStart(format!(
                "Failed to spawn {}: {e}",
                self.config.command.display()
            ))
        })?;
        let pgid = child.id().map(|pid| pid as i32);

        debug!("spawned {name} on port {port} (pgid {pgid:?})");

        self.processes.write().insert(
            name.to_string(),
            ProcessRecord { child: Some(child), pgid, port, args },
        );

        let address = format!("127.0.0.1:{port}");
        let ready = poll::eventually(
            &self.token,
            || {
                let address = address.clone();
                async move {
                    matches!(
                        timeout(Duration::from_millis(100), TcpStream::connect(address.as_str()))
                            .await,
                        Ok(Ok(_))
                    )
                }
            },
            self.config.process_start_timeout,
            self.config.retry_poll_interval,
        )
        .await;

        if !ready {
            if self.token.is_cancelled() {
                return Ok(());
            }

            return Err(Error::ProcessStart(format!(
                "Could not connect to http://{address}.\n\n\
                 Possible issues:\n\
                 - {command} script not executable (run: chmod +x {command})\n\
                 - Process not starting on port {port}\n\
                 - Process crashing during startup\n\n\
                 Check the logs: {log}\n\
                 Debug with: {command} and check for error messages",
                command = self.config.command.display(),
                log = log_path.display(),
            )));
        }

        debug!("{name} ready on port {port}");
        Ok(())
    }

    /// Sends SIGTERM to the process group, escalating to SIGKILL after the
    /// shutdown timeout.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let (child, pgid) = self.take_child(name)?;
        let Some(mut child) = child else {
            return Ok(());
        };

        let Some(pgid) = pgid else {
            let _ = child.kill().await;
            return Ok(());
        };

        debug!("stopping {name} (pgid {pgid})");

        if killpg(Pid::from_raw(pgid), Signal::SIGTERM).is_err() {
            // Group already gone; reap the child.
            let _ = child.wait().await;
            return Ok(());
        }

        match timeout(self.config.process_shutdown_timeout, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!("{name} did not exit after SIGTERM, escalating to SIGKILL");
                let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
                let _ = child.wait().await;
            }
        }

        Ok(())
    }

    /// Sends SIGKILL to the process group immediately.
    pub async fn kill(&self, name: &str) -> Result<()> {
        let (child, pgid) = self.take_child(name)?;
        let Some(mut child) = child else {
            return Ok(());
        };

        debug!("killing {name} (pgid {pgid:?})");

        if let Some(pgid) = pgid {
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        } else {
            let _ = child.kill().await;
        }
        let _ = child.wait().await;

        Ok(())
    }

    /// Stops the process gracefully and starts it again on the same port
    /// with the same arguments.
    pub async fn restart(&self, name: &str) -> Result<()> {
        self.restart_with(name, StopSignal::Term).await
    }

    /// Restarts the process, choosing how it is brought down.
    ///
    /// [`StopSignal::Kill`] simulates a crash; either way the respawned
    /// process is reachable on the port it held before, so client-visible
    /// endpoints survive the restart.
    pub async fn restart_with(&self, name: &str, signal: StopSignal) -> Result<()> {
        let (port, args) = {
            let map = self.processes.read();
            let record = map
                .get(name)
                .ok_or_else(|| Error::ProcessNotFound(name.to_string()))?;
            (record.port, record.args.clone())
        };

        match signal {
            StopSignal::Term => self.stop(name).await?,
            StopSignal::Kill => self.kill(name).await?,
        }

        tokio::time::sleep(self.config.process_restart_delay).await;

        self.start_on_port(name, port, args).await
    }

    /// Tears the harness down: cancels the scope, then stops every process.
    ///
    /// Cancellation unblocks outstanding pollers, HTTP requests, and child
    /// command contexts before the stop sweep begins.
    pub async fn done(&self) {
        self.token.cancel();

        let names: Vec<String> = self.processes.read().keys().cloned().collect();
        for name in names {
            if let Err(e) = self.stop(&name).await {
                warn!("failed to stop {name}: {e}");
            }
        }
    }

    fn take_child(&self, name: &str) -> Result<(Option<Child>, Option<i32>)> {
        let mut map = self.processes.write();
        let record = map
            .get_mut(name)
            .ok_or_else(|| Error::ProcessNotFound(name.to_string()))?;
        Ok((record.child.take(), record.pgid))
    }
}

/// Asks the kernel for a free TCP port.
///
/// The listener is closed before the child is spawned; the race window is
/// accepted for loopback-only test environments.
fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("0.0.0.0:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_port_is_usable() {
        let port = free_port().unwrap();
        assert!(port > 1024);
    }
}
