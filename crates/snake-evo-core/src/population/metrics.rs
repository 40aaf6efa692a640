use super::Population;
use crate::config::TrialConfig;
use crate::snake::DeathCause;
use serde::{Deserialize, Serialize};

/// Everything needed to replay one trial deterministically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub seed: u64,
    pub trial: TrialConfig,
    pub eaten: u32,
    pub steps: u32,
    pub cause: DeathCause,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct NetworkRecord {
    /// Mean food eaten across `trials`.
    pub fitness: f64,
    pub trials: Vec<TrialRecord>,
}

impl NetworkRecord {
    pub fn from_trials(trials: Vec<TrialRecord>) -> Self {
        let fitness = if trials.is_empty() {
            0.0
        } else {
            trials.iter().map(|t| t.eaten as f64).sum::<f64>() / trials.len() as f64
        };
        Self { fitness, trials }
    }

    /// Highest-scoring trial; the earliest one wins ties.
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        self.trials
            .iter()
            .reduce(|best, t| if t.eaten > best.eaten { t } else { best })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub worst_fitness: f64,
    pub best_trial: Option<TrialRecord>,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generations: usize,
    pub population_size: usize,
    pub stats: Vec<GenerationStats>,
}

impl RunSummary {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Population {
    /// Fitness spread of the last evaluation pass, or `None` if the current
    /// generation has not been evaluated.
    pub fn generation_stats(&self) -> Option<GenerationStats> {
        if !self.is_evaluated() {
            return None;
        }
        let fitness = self.records.iter().map(|r| r.fitness);
        let best_fitness = fitness.clone().fold(f64::NEG_INFINITY, f64::max);
        let worst_fitness = fitness.clone().fold(f64::INFINITY, f64::min);
        let mean_fitness = fitness.sum::<f64>() / self.records.len() as f64;
        let best_trial = self
            .fittest()
            .and_then(|(_, record)| record.best_trial().cloned());
        Some(GenerationStats {
            generation: self.generation,
            best_fitness,
            mean_fitness,
            worst_fitness,
            best_trial,
        })
    }
}
