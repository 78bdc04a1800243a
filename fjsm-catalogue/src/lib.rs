//! Read-only mapping from `(task base-name, machine)` to integer duration,
//! loaded once from a JSON configuration artefact shaped
//! `{ base_name: { machine: duration } }` (see `config/machine_config_loader.py`
//! in the original source). Durations are treated as dimensionless integer
//! time units; a missing or zero entry means "not eligible".

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineCatalogue {
    durations: BTreeMap<String, BTreeMap<String, u32>>,
}

impl MachineCatalogue {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let durations: BTreeMap<String, BTreeMap<String, u32>> =
            serde_json::from_str(text).context("parsing machine catalogue JSON")?;
        Ok(MachineCatalogue { durations })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading machine catalogue file {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Duration for `(base_name, machine)`, or 0 if undefined / not eligible.
    pub fn duration(&self, base_name: &str, machine: &str) -> u32 {
        self.durations
            .get(base_name)
            .and_then(|machines| machines.get(machine))
            .copied()
            .unwrap_or(0)
    }

    /// All machines with strictly positive duration for `base_name`.
    pub fn eligible(&self, base_name: &str) -> Vec<String> {
        match self.durations.get(base_name) {
            None => Vec::new(),
            Some(machines) => machines
                .iter()
                .filter(|(_, &d)| d > 0)
                .map(|(m, _)| m.clone())
                .collect(),
        }
    }

    pub fn has_task(&self, base_name: &str) -> bool {
        self.durations.contains_key(base_name)
    }

    pub fn all_tasks(&self) -> Vec<String> {
        self.durations.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MachineCatalogue {
        MachineCatalogue::from_json_str(
            r#"{
                "cut": {"M1": 5, "M2": 0},
                "engrave": {"M1": 3, "M3": 4}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn zero_duration_means_not_eligible() {
        let cat = sample();
        assert_eq!(cat.duration("cut", "M2"), 0);
        assert_eq!(cat.eligible("cut"), vec!["M1".to_string()]);
    }

    #[test]
    fn unknown_task_has_no_eligible_machines() {
        let cat = sample();
        assert!(cat.eligible("bend").is_empty());
        assert_eq!(cat.duration("bend", "M1"), 0);
        assert!(!cat.has_task("bend"));
    }

    #[test]
    fn eligible_is_sorted_and_positive_only() {
        let cat = sample();
        assert_eq!(cat.eligible("engrave"), vec!["M1".to_string(), "M3".to_string()]);
    }
}
