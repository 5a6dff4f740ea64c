//! Challenge progress file (lsfr.yaml)

use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// File name of the progress file inside a challenge directory.
pub const PROGRESS_FILE: &str = "lsfr.yaml";

/// Tracks which challenge a directory belongs to and how far the learner
/// has progressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub challenge: String,
    pub stages: StageProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub current: String,

    #[serde(default)]
    pub completed: Vec<String>,
}

impl Progress {
    pub fn new(challenge: &str, first_stage: &str) -> Self {
        Self {
            challenge: challenge.to_string(),
            stages: StageProgress { current: first_stage.to_string(), completed: Vec::new() },
        }
    }

    /// Loads the progress file from the current directory.
    pub fn load() -> anyhow::Result<Self> {
        if !Path::new(PROGRESS_FILE).exists() {
            bail!(
                "Not in a challenge directory\n\
                 Run this command from a directory created with 'lsfr new <challenge>'"
            );
        }

        let content =
            std::fs::read_to_string(PROGRESS_FILE).context("Failed to read progress file")?;
        let progress: Self =
            serde_yaml::from_str(&content).context("Failed to parse progress file")?;

        Ok(progress)
    }

    /// Saves the progress file to the current directory.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(Path::new(PROGRESS_FILE))
    }

    /// Saves the progress file to the given path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize progress")?;
        std::fs::write(path, content).context("Failed to write progress file")?;
        Ok(())
    }

    pub fn is_completed(&self, stage_key: &str) -> bool {
        self.stages.completed.iter().any(|s| s == stage_key)
    }

    pub fn mark_completed(&mut self, stage_key: &str) {
        if !self.is_completed(stage_key) {
            self.stages.completed.push(stage_key.to_string());
        }
    }
}
