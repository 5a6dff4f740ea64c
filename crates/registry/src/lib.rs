//! Challenge registry
//!
//! Maps challenge keys to ordered stage lists. The registry is an explicit
//! value constructed at program start and threaded into command dispatch —
//! no module-initialisation side effects, no hidden registration order.

use lsfr_attest::Suite;

pub mod kv_store;

/// All known challenges, in presentation order.
pub struct Registry {
    challenges: Vec<Challenge>,
}

impl Registry {
    /// Builds the registry of built-in challenges.
    pub fn builtin() -> Self {
        Self { challenges: vec![kv_store::challenge()] }
    }

    /// Looks a challenge up by key.
    pub fn get(&self, key: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.key == key)
    }

    /// All registered challenges.
    pub fn all(&self) -> &[Challenge] {
        &self.challenges
    }
}

/// A coding challenge: an ordered list of progressive stages.
pub struct Challenge {
    pub key: &'static str,
    pub name: &'static str,
    pub summary: &'static str,
    pub concepts: &'static [&'static str],
    pub stages: Vec<Stage>,
}

/// One progressive step of a challenge.
pub struct Stage {
    pub key: &'static str,
    pub name: &'static str,
    /// Builds the test suite for this stage.
    pub suite: fn() -> Suite,
}

impl Challenge {
    /// Looks a stage up by key.
    pub fn stage(&self, key: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.key == key)
    }

    /// Position of a stage in the progression, if present.
    pub fn stage_index(&self, key: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.key == key)
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the challenge has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Generates the README content scaffolded into a new challenge
    /// directory.
    pub fn readme(&self) -> String {
        let mut stages = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            stages.push_str(&format!("{}. **{}** - {}\n", i + 1, stage.key, stage.name));
        }

        format!(
            "# {name} Challenge\n\n\
             {summary}\n\n\
             ## Stages\n\n\
             {stages}\n\
             ## Getting Started\n\n\
             1. Edit _run.sh_ to start your implementation.\n\
             2. Run _lsfr test_ to test the current stage.\n\
             3. Run _lsfr next_ when ready to advance.\n\n\
             Good luck! 🚀\n",
            name = self.name,
            summary = self.summary,
            stages = stages,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_key_value_store() {
        let registry = Registry::builtin();
        let challenge = registry.get("key-value-store").unwrap();

        assert_eq!(challenge.name, "Distributed Key-Value Store");
        assert!(!challenge.is_empty());
    }

    #[test]
    fn test_stage_order_is_progressive() {
        let registry = Registry::builtin();
        let challenge = registry.get("key-value-store").unwrap();

        assert_eq!(challenge.stage_index("http-api"), Some(0));
        assert_eq!(challenge.stage_index("persistence"), Some(1));
        assert_eq!(challenge.stage_index("crash-recovery"), Some(2));
        assert_eq!(challenge.stage_index("missing"), None);
    }

    #[test]
    fn test_unknown_challenge_is_none() {
        let registry = Registry::builtin();
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_readme_lists_stages() {
        let registry = Registry::builtin();
        let readme = registry.get("key-value-store").unwrap().readme();

        assert!(readme.contains("## Stages"));
        assert!(readme.contains("**http-api**"));
        assert!(readme.contains("lsfr next"));
    }

    #[test]
    fn test_stage_suites_build() {
        let registry = Registry::builtin();
        for challenge in registry.all() {
            for stage in &challenge.stages {
                // Building a suite registers no work; it must never panic.
                let _ = (stage.suite)();
            }
        }
    }
}
