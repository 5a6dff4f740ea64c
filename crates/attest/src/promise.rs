//! Deferred operations: recorded probes executed at `assert`
//!
//! Building a promise registers no work. The operation is recorded, optionally
//! reshaped by a timing qualifier (`eventually`/`consistently`), decorated
//! with matchers, and executed exactly once by the final
//! [`assert`](HttpPromise::assert) call — which either returns `Ok(())` or a
//! [`Error::Mismatch`] carrying the rendered failure block.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::matcher::{status_text, JsonFieldMatcher, Matcher, ValueMatcher};

/// When a recorded operation executes relative to its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timing {
    /// Single attempt at `assert` time
    Immediate,
    /// Retried until it passes or the deadline elapses
    Eventually,
    /// Retried until it fails or the deadline elapses
    Consistently,
}

/// Indents stage-supplied help text under the failure block.
fn format_help(help: &str) -> String {
    format!("\n\n  {}", help.replace('\n', "\n  "))
}

// ── HTTP ─────────────────────────────────────────────────────────────────

struct HttpObservation {
    status: u16,
    body: String,
}

/// A deferred HTTP request against a managed process.
pub struct HttpPromise {
    method: reqwest::Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,

    timing: Timing,
    timeout: Option<Duration>,

    token: CancellationToken,
    config: Config,
    client: reqwest::Client,

    status_matchers: Vec<Box<dyn Matcher<u16>>>,
    body_matchers: Vec<Box<dyn Matcher<str>>>,
    json_matchers: Vec<JsonFieldMatcher>,

    observed: Option<HttpObservation>,
}

impl HttpPromise {
    pub(crate) fn new(
        method: reqwest::Method,
        url: String,
        token: CancellationToken,
        config: Config,
        client: reqwest::Client,
    ) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timing: Timing::Immediate,
            timeout: None,
            token,
            config,
            client,
            status_matchers: Vec::new(),
            body_matchers: Vec::new(),
            json_matchers: Vec::new(),
            observed: None,
        }
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a request header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Retries the request until the expectations pass or the deadline
    /// elapses (default retry timeout; override with [`within`](Self::within)).
    ///
    /// # Panics
    ///
    /// Panics if a timing qualifier was already applied.
    pub fn eventually(mut self) -> Self {
        assert!(
            self.timing == Timing::Immediate,
            "eventually() must be the first timing qualifier on a promise"
        );
        self.timing = Timing::Eventually;
        self
    }

    /// Overrides the `eventually` deadline.
    ///
    /// # Panics
    ///
    /// Panics unless [`eventually`](Self::eventually) was called first.
    pub fn within(mut self, deadline: Duration) -> Self {
        assert!(
            self.timing == Timing::Eventually,
            "within() is only valid after eventually()"
        );
        self.timeout = Some(deadline);
        self
    }

    /// Retries the request for the whole window, failing the moment the
    /// expectations stop holding.
    ///
    /// # Panics
    ///
    /// Panics if a timing qualifier was already applied.
    pub fn consistently(mut self) -> Self {
        assert!(
            self.timing == Timing::Immediate,
            "consistently() must be the first timing qualifier on a promise"
        );
        self.timing = Timing::Consistently;
        self
    }

    /// Overrides the `consistently` window.
    ///
    /// # Panics
    ///
    /// Panics unless [`consistently`](Self::consistently) was called first.
    pub fn for_duration(mut self, window: Duration) -> Self {
        assert!(
            self.timing == Timing::Consistently,
            "for_duration() is only valid after consistently()"
        );
        self.timeout = Some(window);
        self
    }

    /// Adds an expectation on the response status code.
    pub fn status(mut self, matcher: impl Matcher<u16> + 'static) -> Self {
        self.status_matchers.push(Box::new(matcher));
        self
    }

    /// Adds an expectation on the raw response body.
    pub fn body(mut self, matcher: impl Matcher<str> + 'static) -> Self {
        self.body_matchers.push(Box::new(matcher));
        self
    }

    /// Adds an expectation on a JSON field of the response body.
    pub fn json(mut self, path: &str, matcher: impl ValueMatcher + 'static) -> Self {
        self.json_matchers.push(crate::matcher::json(path, matcher));
        self
    }

    /// Executes the recorded request per its timing mode and checks the
    /// expectations, rendering `help` into any failure.
    pub async fn assert(mut self, help: &str) -> Result<()> {
        let deadline_window = self.timeout.unwrap_or(self.config.default_retry_timeout);
        let interval = self.config.retry_poll_interval;
        let token = self.token.clone();

        match self.timing {
            Timing::Immediate => {
                self.execute().await?;
            }
            Timing::Eventually => {
                let deadline = Instant::now() + deadline_window;
                while Instant::now() < deadline {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = sleep(interval) => {
                            if self.execute().await? {
                                break;
                            }
                        }
                    }
                }
            }
            Timing::Consistently => {
                let deadline = Instant::now() + deadline_window;
                while Instant::now() < deadline {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = sleep(interval) => {
                            if !self.execute().await? {
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.check(help)
    }

    /// One request attempt. Transport failures abort immediately; they are
    /// network faults, not expectation mismatches.
    async fn execute(&mut self) -> Result<bool> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .timeout(self.config.execute_timeout);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        let token = self.token.clone();
        let response = tokio::select! {
            _ = token.cancelled() => {
                return Err(Error::Cancelled(format!("{} {}", self.method, self.url)));
            }
            result = request.send() => {
                result.map_err(|e| Error::Transport(e.to_string()))?
            }
        };

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        self.observed = Some(HttpObservation { status, body });
        Ok(self.satisfied())
    }

    fn satisfied(&self) -> bool {
        let Some(observed) = &self.observed else {
            return false;
        };

        self.status_matchers.iter().all(|m| m.matches(&observed.status))
            && self.body_matchers.iter().all(|m| m.matches(observed.body.as_str()))
            && self.json_matchers.iter().all(|m| m.check(&observed.body))
    }

    fn check(&self, help: &str) -> Result<()> {
        let signature = format!("{} {}", self.method, self.url);

        let Some(observed) = &self.observed else {
            return Err(Error::Mismatch(format!(
                "{signature}\n  No response observed before the operation was cut short{}",
                format_help(help)
            )));
        };

        if let Some(failed) = self.status_matchers.iter().find(|m| !m.matches(&observed.status)) {
            return Err(Error::Mismatch(format!(
                "{signature}\n  Expected {}, got {}{}",
                failed.expected(),
                status_text(observed.status),
                format_help(help)
            )));
        }

        if let Some(failed) = self
            .body_matchers
            .iter()
            .find(|m| !m.matches(observed.body.as_str()))
        {
            return Err(Error::Mismatch(format!(
                "{signature}\n  Expected response {}\n  Actual response: {:?}{}",
                failed.expected(),
                observed.body,
                format_help(help)
            )));
        }

        if let Some(failed) = self.json_matchers.iter().find(|m| !m.check(&observed.body)) {
            return Err(Error::Mismatch(format!(
                "{signature}\n  Expected {}\n  Actual value: {}{}",
                failed.expected(),
                failed.observed(&observed.body),
                format_help(help)
            )));
        }

        Ok(())
    }
}

// ── CLI ──────────────────────────────────────────────────────────────────

struct CliObservation {
    exit_code: i32,
    output: String,
}

/// A deferred invocation of the configured command.
pub struct CliPromise {
    command: PathBuf,
    args: Vec<String>,

    timing: Timing,
    timeout: Option<Duration>,

    token: CancellationToken,
    config: Config,

    exit_matchers: Vec<Box<dyn Matcher<i32>>>,
    output_matchers: Vec<Box<dyn Matcher<str>>>,

    observed: Option<CliObservation>,
}

impl CliPromise {
    pub(crate) fn new(
        command: PathBuf,
        args: Vec<String>,
        token: CancellationToken,
        config: Config,
    ) -> Self {
        Self {
            command,
            args,
            timing: Timing::Immediate,
            timeout: None,
            token,
            config,
            exit_matchers: Vec::new(),
            output_matchers: Vec::new(),
            observed: None,
        }
    }

    /// Retries the invocation until the expectations pass or the deadline
    /// elapses.
    ///
    /// # Panics
    ///
    /// Panics if a timing qualifier was already applied.
    pub fn eventually(mut self) -> Self {
        assert!(
            self.timing == Timing::Immediate,
            "eventually() must be the first timing qualifier on a promise"
        );
        self.timing = Timing::Eventually;
        self
    }

    /// Overrides the `eventually` deadline.
    ///
    /// # Panics
    ///
    /// Panics unless [`eventually`](Self::eventually) was called first.
    pub fn within(mut self, deadline: Duration) -> Self {
        assert!(
            self.timing == Timing::Eventually,
            "within() is only valid after eventually()"
        );
        self.timeout = Some(deadline);
        self
    }

    /// Retries the invocation for the whole window, failing the moment the
    /// expectations stop holding.
    ///
    /// # Panics
    ///
    /// Panics if a timing qualifier was already applied.
    pub fn consistently(mut self) -> Self {
        assert!(
            self.timing == Timing::Immediate,
            "consistently() must be the first timing qualifier on a promise"
        );
        self.timing = Timing::Consistently;
        self
    }

    /// Overrides the `consistently` window.
    ///
    /// # Panics
    ///
    /// Panics unless [`consistently`](Self::consistently) was called first.
    pub fn for_duration(mut self, window: Duration) -> Self {
        assert!(
            self.timing == Timing::Consistently,
            "for_duration() is only valid after consistently()"
        );
        self.timeout = Some(window);
        self
    }

    /// Adds an expectation on the exit code.
    pub fn exit_code(mut self, matcher: impl Matcher<i32> + 'static) -> Self {
        self.exit_matchers.push(Box::new(matcher));
        self
    }

    /// Adds an expectation on the captured output (stdout on success,
    /// stderr on failure).
    pub fn output(mut self, matcher: impl Matcher<str> + 'static) -> Self {
        self.output_matchers.push(Box::new(matcher));
        self
    }

    /// Executes the recorded invocation per its timing mode and checks the
    /// expectations, rendering `help` into any failure.
    pub async fn assert(mut self, help: &str) -> Result<()> {
        let deadline_window = self.timeout.unwrap_or(self.config.default_retry_timeout);
        let interval = self.config.retry_poll_interval;
        let token = self.token.clone();

        match self.timing {
            Timing::Immediate => {
                self.execute().await?;
            }
            Timing::Eventually => {
                let deadline = Instant::now() + deadline_window;
                while Instant::now() < deadline {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = sleep(interval) => {
                            if self.execute().await? {
                                break;
                            }
                        }
                    }
                }
            }
            Timing::Consistently => {
                let deadline = Instant::now() + deadline_window;
                while Instant::now() < deadline {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = sleep(interval) => {
                            if !self.execute().await? {
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.check(help)
    }

    /// One invocation attempt. A timeout or cancellation is folded into the
    /// observation as exit code `-1` with a synthetic output; failing to
    /// launch the command at all aborts immediately.
    async fn execute(&mut self) -> Result<bool> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let token = self.token.clone();
        let command_name = self.command.display().to_string();
        let execute_timeout = self.config.execute_timeout;

        let observed = tokio::select! {
            _ = token.cancelled() => CliObservation {
                exit_code: -1,
                output: format!("{command_name} was cancelled"),
            },
            result = timeout(execute_timeout, command.output()) => match result {
                Err(_) => CliObservation {
                    exit_code: -1,
                    output: format!("{command_name} timed out after {execute_timeout:?}"),
                },
                Ok(Ok(output)) => {
                    let exit_code = output.status.code().unwrap_or(-1);
                    let captured = if output.status.success() {
                        output.stdout
                    } else {
                        output.stderr
                    };
                    CliObservation {
                        exit_code,
                        output: String::from_utf8_lossy(&captured).into_owned(),
                    }
                }
                Ok(Err(e)) => return Err(Error::Io(e)),
            },
        };

        self.observed = Some(observed);
        Ok(self.satisfied())
    }

    fn satisfied(&self) -> bool {
        let Some(observed) = &self.observed else {
            return false;
        };

        self.exit_matchers.iter().all(|m| m.matches(&observed.exit_code))
            && self.output_matchers.iter().all(|m| m.matches(observed.output.as_str()))
    }

    fn check(&self, help: &str) -> Result<()> {
        let signature = if self.args.is_empty() {
            self.command.display().to_string()
        } else {
            format!("{} {}", self.command.display(), self.args.join(" "))
        };

        let Some(observed) = &self.observed else {
            return Err(Error::Mismatch(format!(
                "{signature}\n  No invocation completed before the operation was cut short{}",
                format_help(help)
            )));
        };

        if let Some(failed) = self.exit_matchers.iter().find(|m| !m.matches(&observed.exit_code)) {
            return Err(Error::Mismatch(format!(
                "{signature}\n  Expected {}, got {}{}",
                failed.expected(),
                observed.exit_code,
                format_help(help)
            )));
        }

        if let Some(failed) = self
            .output_matchers
            .iter()
            .find(|m| !m.matches(observed.output.as_str()))
        {
            return Err(Error::Mismatch(format!(
                "{signature}\n  Expected output {}\n  Actual output: {:?}{}",
                failed.expected(),
                observed.output,
                format_help(help)
            )));
        }

        Ok(())
    }
}
