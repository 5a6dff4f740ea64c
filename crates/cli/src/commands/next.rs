//! `lsfr next` - advance to the next stage

use anyhow::bail;
use lsfr_registry::Registry;
use tokio_util::sync::CancellationToken;

pub async fn execute(registry: &Registry, token: CancellationToken) -> anyhow::Result<()> {
    let mut progress = super::validate_environment()?;
    let challenge = super::lookup_challenge(registry, &progress.challenge)?;

    let current_key = progress.stages.current.clone();
    let Some(current_index) = challenge.stage_index(&current_key) else {
        bail!("Current stage {current_key:?} not found in challenge");
    };

    // Verify the current stage before advancing
    if !progress.is_completed(&current_key) {
        let passed =
            super::run_stage_tests(registry, &progress.challenge, &current_key, token).await?;
        if !passed {
            bail!("\nComplete {current_key} before advancing.");
        }

        progress.mark_completed(&current_key);
    }

    if current_index == challenge.len() - 1 {
        println!("\nYou've completed all stages for {}! 🎉\n", progress.challenge);
        println!("Share your work: tag your repo with 'lsfr-rust' (or your language).\n");
        println!("Consider trying another challenge with 'lsfr list'.");
        return progress.save();
    }

    let next_stage = &challenge.stages[current_index + 1];
    progress.stages.current = next_stage.key.to_string();
    progress.save()?;

    println!("Advanced to {}: {}\n", next_stage.key, next_stage.name);
    println!(
        "Read the guide: {}\n",
        super::guide_link(&progress.challenge, next_stage.key)
    );
    println!("Run 'lsfr test' when ready.");

    Ok(())
}
