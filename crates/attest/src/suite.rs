//! Suite construction and execution

use std::future::Future;
use std::sync::Arc;

use colored::Colorize;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::harness::{join_error_to_failure, Harness};

type BodyFn = Box<dyn Fn(Arc<Harness>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct TestCase {
    name: String,
    body: BodyFn,
}

/// An ordered collection of setup and named tests sharing one harness.
///
/// Tests run strictly in registration order and stop at the first failure:
/// stages are progressive, and later tests assume the state earlier tests
/// built.
///
/// ```no_run
/// use lsfr_attest::{is, Suite};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let passed = Suite::new()
///     .setup(|h| async move { h.start("node", &[]).await })
///     .test("responds to GET", |h| async move {
///         h.http("node", "GET", "/kv/kenya:capital")
///             .status(is(200u16))
///             .body(is("Nairobi"))
///             .assert("Your server should return stored values.")
///             .await
///     })
///     .run(CancellationToken::new())
///     .await;
/// # }
/// ```
pub struct Suite {
    setup: Option<BodyFn>,
    tests: Vec<TestCase>,
    config: Config,
}

impl Default for Suite {
    fn default() -> Self {
        Self::new()
    }
}

impl Suite {
    /// Creates an empty suite with the default configuration.
    pub fn new() -> Self {
        Self { setup: None, tests: Vec::new(), config: Config::default() }
    }

    /// Replaces the suite configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the setup body that runs before all tests.
    ///
    /// A setup failure skips every test: a suite that could not be set up
    /// cannot produce meaningful outcomes.
    pub fn setup<F, Fut>(mut self, body: F) -> Self
    where
        F: Fn(Arc<Harness>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.setup = Some(Box::new(move |harness| Box::pin(body(harness))));
        self
    }

    /// Adds a named test case.
    pub fn test<F, Fut>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(Arc<Harness>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.tests.push(TestCase {
            name: name.to_string(),
            body: Box::new(move |harness| Box::pin(body(harness))),
        });
        self
    }

    /// Runs setup then every test in order, tearing the harness down
    /// unconditionally. Returns whether the suite passed.
    pub async fn run(self, token: CancellationToken) -> bool {
        let check = "✓".green();
        let cross = "✗".red();

        let harness = match Harness::new(self.config.clone(), token) {
            Ok(harness) => Arc::new(harness),
            Err(e) => {
                println!("{cross} SETUP");
                println!("\n{e}");
                println!("\n{} {cross}", "FAILED".bold());
                return false;
            }
        };

        let mut failed = false;
        let mut cancelled = false;

        if let Some(setup) = &self.setup {
            if let Err(e) = run_isolated(setup(harness.clone())).await {
                failed = true;
                println!("{cross} SETUP");
                println!("\n{e}");
            }
        }

        if !failed {
            for test in &self.tests {
                if harness.token.is_cancelled() {
                    cancelled = true;
                    break;
                }

                match run_isolated((test.body)(harness.clone())).await {
                    Ok(()) => println!("{check} {}", test.name),
                    Err(e) => {
                        failed = true;
                        println!("{cross} {}", test.name);
                        println!("\n{e}");
                        break;
                    }
                }
            }
        }

        harness.done().await;

        if cancelled {
            return false;
        }

        if failed {
            println!("\n{} {cross}", "FAILED".bold());
        } else {
            println!("\n{} {check}", "PASSED".bold());
        }

        !failed
    }
}

/// Runs a body in its own task so panics are captured rather than unwinding
/// through the runner.
async fn run_isolated(body: BoxFuture<'static, Result<()>>) -> Result<()> {
    match tokio::spawn(body).await {
        Ok(result) => result,
        Err(join_error) => Err(join_error_to_failure(join_error)),
    }
}
