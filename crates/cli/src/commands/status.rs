//! `lsfr status` - show challenge progress

use colored::Colorize;
use lsfr_registry::Registry;

use crate::progress::Progress;

pub fn execute(registry: &Registry) -> anyhow::Result<()> {
    let progress = Progress::load()?;
    let challenge = super::lookup_challenge(registry, &progress.challenge)?;

    println!("{}\n\n{}\n", challenge.name, challenge.summary);

    println!("Progress:");
    for stage in &challenge.stages {
        if progress.is_completed(stage.key) {
            println!("{} {:18} - {}", "✓".green(), stage.key, stage.name);
        } else if stage.key == progress.stages.current {
            println!("→ {:18} - {}", stage.key, stage.name);
        } else {
            println!("  {:18} - {}", stage.key, stage.name);
        }
    }

    println!(
        "\nRead the guide: {}\n",
        super::guide_link(&progress.challenge, &progress.stages.current)
    );
    println!("Implement {}, then run 'lsfr test'.", progress.stages.current);

    Ok(())
}
