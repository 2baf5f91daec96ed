//! Scenario loading and configuration.
//!
//! A scenario bundles the rule set a run is played under with the limits
//! autoplay uses to end it.

use std::path::Path;

use necro_core::data::RuleSet;
use necro_core::error::GameError;
use necro_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The embedded rules were rejected.
    #[error("Scenario rules are invalid: {0}")]
    InvalidRules(#[from] GameError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Seed used when the caller does not pick one.
    #[serde(default)]
    pub seed: u64,
    /// Autoplay stops after this many waves have ended (None = no limit).
    #[serde(default)]
    pub max_waves: Option<u32>,
    /// Autoplay stops after this many ticks.
    pub max_ticks: u64,
    /// Rule tables; omitted fields take the standard values.
    #[serde(default)]
    pub rules: RuleSet,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::standard()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.rules.validate()?;
        Ok(scenario)
    }

    /// Ten waves under the standard rules.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            description: "Ten waves under the standard rules".to_string(),
            seed: 0,
            max_waves: Some(10),
            max_ticks: 60_000,
            rules: RuleSet::default(),
        }
    }

    /// Keep starting waves until the run is defeated or time runs out.
    #[must_use]
    pub fn endless() -> Self {
        Self {
            name: "endless".to_string(),
            description: "Waves until defeat".to_string(),
            seed: 0,
            max_waves: None,
            max_ticks: 200_000,
            rules: RuleSet::default(),
        }
    }

    /// Look up a built-in preset by name.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "endless" => Some(Self::endless()),
            _ => None,
        }
    }

    /// A preset name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::preset(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// A fresh simulation under this scenario's rules.
    pub fn build_simulation(&self, seed: u64) -> Result<Simulation, ScenarioError> {
        Ok(Simulation::with_rules(self.rules.clone(), seed)?)
    }
}
