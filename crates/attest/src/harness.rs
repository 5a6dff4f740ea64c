//! Test harness handle passed into setup and test bodies

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::ProcessRecord;
use crate::promise::{CliPromise, HttpPromise};

/// Drives the system under test for one suite run.
///
/// Owns the spawned processes, the per-run working directory, and the
/// cancellation scope; every poll loop, HTTP request, and child command is
/// tied to that scope. Constructed by [`crate::Suite::run`] and shared with
/// setup/test bodies as an `Arc`.
pub struct Harness {
    pub(crate) processes: RwLock<HashMap<String, ProcessRecord>>,
    pub(crate) config: Config,
    pub(crate) working_dir: PathBuf,
    pub(crate) token: CancellationToken,
    pub(crate) client: reqwest::Client,
}

impl Harness {
    /// Creates a harness with a fresh timestamped working directory.
    pub fn new(config: Config, token: CancellationToken) -> Result<Self> {
        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let working_dir = config.working_dir.join(format!("run-{timestamp}"));
        std::fs::create_dir_all(&working_dir)?;

        debug!("harness working directory: {}", working_dir.display());

        Ok(Self {
            processes: RwLock::new(HashMap::new()),
            config,
            working_dir,
            token: token.child_token(),
            client: reqwest::Client::new(),
        })
    }

    /// The per-run working directory holding process logs.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Cancels the harness scope by hand.
    ///
    /// Normally [`done`](Self::done) does this during teardown; tests use it
    /// to exercise cancellation mid-operation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The port assigned to a managed process.
    pub fn port(&self, name: &str) -> Result<u16> {
        self.processes
            .read()
            .get(name)
            .map(|record| record.port)
            .ok_or_else(|| Error::ProcessNotFound(name.to_string()))
    }

    /// Records a process entry for a server the harness did not spawn.
    ///
    /// Probes address it like any managed process; `stop`/`restart` are
    /// no-ops since there is no child to signal. Used to point the harness at
    /// pre-started servers in framework tests.
    pub fn register_external(&self, name: &str, port: u16) {
        self.processes.write().insert(name.to_string(), ProcessRecord::external(port));
    }

    /// Creates a deferred HTTP request against a managed process.
    ///
    /// # Panics
    ///
    /// Panics if the process name is unknown or the method is invalid —
    /// both are stage authoring errors.
    pub fn http(&self, name: &str, method: &str, path: &str) -> HttpPromise {
        let port = self
            .port(name)
            .unwrap_or_else(|_| panic!("process {name:?} not found"));
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .unwrap_or_else(|_| panic!("invalid HTTP method {method:?}"));
        let url = format!("http://127.0.0.1:{port}{path}");

        HttpPromise::new(
            method,
            url,
            self.token.clone(),
            self.config.clone(),
            self.client.clone(),
        )
    }

    /// Creates a deferred invocation of the configured command.
    pub fn exec<I, S>(&self, args: I) -> CliPromise
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CliPromise::new(
            self.config.command.clone(),
            args.into_iter().map(Into::into).collect(),
            self.token.clone(),
            self.config.clone(),
        )
    }

    /// Runs tasks concurrently and waits for all of them to settle.
    ///
    /// Returns the first failure (an `Err` or a panic) once every task has
    /// completed; panics in one task do not cut the others short.
    pub async fn concurrently<I, F>(&self, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let handles: Vec<_> = tasks.into_iter().map(tokio::spawn).collect();

        let mut first_failure = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_failure.get_or_insert(e);
                }
                Err(join_error) => {
                    first_failure.get_or_insert(join_error_to_failure(join_error));
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

pub(crate) fn join_error_to_failure(join_error: tokio::task::JoinError) -> Error {
    if join_error.is_panic() {
        let payload = join_error.into_panic();
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "unknown panic".to_string());
        Error::Panicked(message)
    } else {
        Error::Cancelled("task".to_string())
    }
}
