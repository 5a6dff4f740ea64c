//! lsfr attest — black-box test harness for learner-built systems
//!
//! This crate drives an external program (launched through a user-supplied
//! shell script, probed over loopback HTTP and via CLI invocations) and
//! asserts outcomes with composable matchers. Stages build a [`Suite`] of
//! progressive tests; the suite owns a [`Harness`] that supervises the
//! processes under test for the whole run.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Suite                                                       │
//! │    ├── setup(fn) / test(name, fn)  — registration order      │
//! │    └── run(token)                  — stop at first failure   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Harness (one per run, Arc-shared with test bodies)          │
//! │    ├── start / stop / kill / restart   — process supervisor  │
//! │    ├── http(name, method, path)        — HttpPromise         │
//! │    ├── exec(args)                      — CliPromise          │
//! │    └── concurrently(tasks)                                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Promise (recorded, executed once at .assert(help))          │
//! │    ├── eventually().within(d) / consistently().for_duration  │
//! │    └── status / body / json / exit_code / output matchers    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every poll loop, HTTP request, and child command hangs off one
//! cancellation scope per harness; cancelling it (teardown or Ctrl-C)
//! unblocks everything and the teardown sweep stops every spawned process.

pub mod config;
pub mod error;
pub mod harness;
pub mod matcher;
pub mod poll;
pub mod process;
pub mod promise;
pub mod suite;

pub use config::Config;
pub use error::{Error, Result};
pub use harness::Harness;
pub use matcher::{
    contains, has_len, is, is_null, json, matches, not, one_of, JsonFieldMatcher, Matcher,
    ValueMatcher,
};
pub use process::StopSignal;
pub use promise::{CliPromise, HttpPromise};
pub use suite::Suite;
