//! `lsfr list` - show available challenges

use lsfr_registry::Registry;

pub fn execute(registry: &Registry) -> anyhow::Result<()> {
    println!("Available challenges:\n");

    for challenge in registry.all() {
        println!("  {:20} - {} ({} stages)", challenge.key, challenge.name, challenge.len());
    }

    println!("\nStart with: lsfr new <challenge-name>");

    Ok(())
}
