//! `lsfr new` - scaffold a new challenge directory

use std::path::{Path, PathBuf};

use anyhow::Context;
use lsfr_registry::{Challenge, Registry};

use crate::progress::{Progress, PROGRESS_FILE};

const RUN_SH_TEMPLATE: &str = r#"#!/bin/bash

# This script builds and runs your implementation.
# lsfr will execute this script to start your program.
# "$@" passes any command-line arguments from lsfr to your program.

echo "Replace this line with the command that runs your implementation."
# Examples:
#   cargo run --quiet -- "$@"
#   go run ./cmd/server "$@"
#   python main.py "$@"
"#;

pub fn execute(registry: &Registry, challenge_key: &str, path: Option<PathBuf>) -> anyhow::Result<()> {
    let challenge = super::lookup_challenge(registry, challenge_key)?;

    let target = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create directory {}", target.display()))?;

    create_challenge_files(challenge, &target)?;

    if target == Path::new(".") {
        println!("Created challenge in current directory.");
    } else {
        println!("Created challenge in directory: ./{}", target.display());
    }
    println!("  run.sh       - Your implementation entry point");
    println!("  README.md    - Challenge overview and requirements");
    println!("  lsfr.yaml    - Tracks your progress\n");

    let first_stage = challenge.stages[0].key;
    if target == Path::new(".") {
        println!("Implement the {first_stage} stage, then run 'lsfr test'.");
    } else {
        println!("cd {} and implement the {first_stage} stage, then run 'lsfr test'.", target.display());
    }

    Ok(())
}

fn create_challenge_files(challenge: &Challenge, target: &Path) -> anyhow::Result<()> {
    let script_path = target.join("run.sh");
    std::fs::write(&script_path, RUN_SH_TEMPLATE).context("Failed to create run.sh")?;
    make_executable(&script_path)?;

    std::fs::write(target.join("README.md"), challenge.readme())
        .context("Failed to create README.md")?;

    let progress = Progress::new(challenge.key, challenge.stages[0].key);
    progress.save_to(&target.join(PROGRESS_FILE))?;

    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).context("Failed to mark run.sh executable")?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
