//! Command implementations for the lsfr CLI

pub mod list;
pub mod new;
pub mod next;
pub mod status;

use std::path::Path;

use anyhow::bail;
use lsfr_registry::{Challenge, Registry};
use tokio_util::sync::CancellationToken;

use crate::progress::Progress;

/// Checks that the current directory looks like a challenge directory and
/// loads its progress file.
fn validate_environment() -> anyhow::Result<Progress> {
    if !Path::new("run.sh").exists() {
        bail!(
            "run.sh not found\n\
             Create an executable run.sh script that starts your implementation."
        );
    }

    Progress::load()
}

fn lookup_challenge<'a>(registry: &'a Registry, key: &str) -> anyhow::Result<&'a Challenge> {
    match registry.get(key) {
        Some(challenge) => Ok(challenge),
        None => {
            let mut known = String::new();
            for challenge in registry.all() {
                known.push_str(&format!("- {}\n", challenge.key));
            }
            bail!("Challenge {key:?} not found\nAvailable challenges:\n{known}");
        }
    }
}

/// Runs one stage's suite and reports whether it passed.
async fn run_stage_tests(
    registry: &Registry,
    challenge_key: &str,
    stage_key: &str,
    token: CancellationToken,
) -> anyhow::Result<bool> {
    let challenge = lookup_challenge(registry, challenge_key)?;

    let Some(stage) = challenge.stage(stage_key) else {
        let mut known = String::new();
        for stage in &challenge.stages {
            known.push_str(&format!("- {}\n", stage.key));
        }
        bail!("Stage {stage_key:?} not found for challenge {challenge_key}\nAvailable stages:\n{known}");
    };

    println!("Running {}: {}\n", stage.key, stage.name);

    let suite = (stage.suite)();
    Ok(suite.run(token).await)
}

/// Terminal hyperlink to the stage guide.
fn guide_link(challenge_key: &str, stage_key: &str) -> String {
    let url = format!("https://lsfr.io/c/{challenge_key}/{stage_key}");
    format!("\u{1b}]8;;{url}\u{1b}\\lsfr.io/c/{challenge_key}/{stage_key}\u{1b}]8;;\u{1b}\\")
}
