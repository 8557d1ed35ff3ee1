//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`DCOP_*`)
//! - CLI arguments (for the `dcop` binary)
//!
//! ```toml
//! [environment]
//! agents = 30
//! domain_size = 10
//! iterations = 100
//! algorithm = "mgm2"
//!
//! [constraints]
//! density = 0.5
//! toughness = 0.5
//! cost_range = [100, 200]
//! seed = 0
//!
//! [dsa]
//! variant = "C"
//! p = 0.7
//!
//! [mgm2]
//! offer_probability = 0.5
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent::dsa::DsaVariant;
use crate::agent::mgm2::ROUNDS_PER_CYCLE;
use crate::error::{DcopError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Run environment
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Problem generation
    #[serde(default)]
    pub constraints: ConstraintConfig,

    /// DSA parameters
    #[serde(default)]
    pub dsa: DsaConfig,

    /// MGM-2 parameters
    #[serde(default)]
    pub mgm2: Mgm2Config,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| DcopError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `DCOP_*` environment variables on top of this config.
    ///
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(algorithm) = std::env::var("DCOP_ALGORITHM") {
            if let Ok(algorithm) = algorithm.parse() {
                self.environment.algorithm = algorithm;
            }
        }
        if let Ok(val) = std::env::var("DCOP_AGENTS") {
            if let Ok(val) = val.parse() {
                self.environment.agents = val;
            }
        }
        if let Ok(val) = std::env::var("DCOP_ITERATIONS") {
            if let Ok(val) = val.parse() {
                self.environment.iterations = val;
            }
        }
        if let Ok(val) = std::env::var("DCOP_SEED") {
            if let Ok(val) = val.parse() {
                self.environment.seed = Some(val);
            }
        }
        if let Ok(val) = std::env::var("DCOP_DSA_P") {
            if let Ok(val) = val.parse() {
                self.dsa.p = val;
            }
        }
        if let Ok(val) = std::env::var("DCOP_OFFER_PROBABILITY") {
            if let Ok(val) = val.parse() {
                self.mgm2.offer_probability = val;
            }
        }

        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.environment.domain_size == 0 {
            return Err(DcopError::Config("environment.domain_size must be at least 1".to_string()));
        }
        if self.environment.iterations == 0 {
            return Err(DcopError::Config("environment.iterations must be at least 1".to_string()));
        }

        for (name, value) in [
            ("constraints.density", self.constraints.density),
            ("constraints.toughness", self.constraints.toughness),
            ("dsa.p", self.dsa.p),
            ("mgm2.offer_probability", self.mgm2.offer_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DcopError::InvalidProbability { name, value });
            }
        }

        let (low, high) = self.constraints.cost_range;
        if low >= high {
            return Err(DcopError::Config(format!(
                "constraints.cost_range [{low}, {high}) is empty"
            )));
        }

        Ok(())
    }

    /// Total driver rounds: iterations × rounds per cycle.
    pub fn rounds(&self) -> usize {
        self.environment.iterations * self.environment.algorithm.rounds_per_cycle()
    }
}

/// Algorithm run by every agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    /// Distributed Stochastic Algorithm
    #[default]
    Dsa,
    /// Maximum Gain Message, 2-coordinated
    Mgm2,
}

impl AlgorithmKind {
    /// Get descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dsa => "DSA",
            Self::Mgm2 => "MGM-2",
        }
    }

    /// Rounds in one algorithm cycle.
    pub fn rounds_per_cycle(&self) -> usize {
        match self {
            Self::Dsa => 1,
            Self::Mgm2 => ROUNDS_PER_CYCLE,
        }
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AlgorithmKind {
    type Err = DcopError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dsa" => Ok(Self::Dsa),
            "mgm2" | "mgm-2" => Ok(Self::Mgm2),
            _ => Err(DcopError::Config(format!("Unknown algorithm: {s}"))),
        }
    }
}

/// `[environment]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Number of agents
    pub agents: usize,

    /// Domain size D (values `0..D`)
    pub domain_size: usize,

    /// Algorithm cycles to run
    pub iterations: usize,

    /// Agent algorithm
    pub algorithm: AlgorithmKind,

    /// Seed for agent randomness (`constraints.seed` if unset)
    pub seed: Option<u64>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            agents: 30,
            domain_size: 10,
            iterations: 100,
            algorithm: AlgorithmKind::Dsa,
            seed: None,
        }
    }
}

/// `[constraints]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Fraction of agent pairs that share a constraint (p1)
    pub density: f64,

    /// Fraction of non-zero cells per cost matrix (p2)
    pub toughness: f64,

    /// Cost bounds `[low, high)`
    pub cost_range: (u32, u32),

    /// Seed for problem generation
    pub seed: u64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            density: 0.5,
            toughness: 0.5,
            cost_range: (100, 200),
            seed: 0,
        }
    }
}

/// `[dsa]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsaConfig {
    /// Replacement rule
    pub variant: DsaVariant,

    /// Replacement probability
    pub p: f64,
}

impl Default for DsaConfig {
    fn default() -> Self {
        Self {
            variant: DsaVariant::C,
            p: 0.7,
        }
    }
}

/// `[mgm2]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mgm2Config {
    /// Probability an agent becomes a bidder in phase 1
    pub offer_probability: f64,
}

impl Default for Mgm2Config {
    fn default() -> Self {
        Self {
            offer_probability: 0.5,
        }
    }
}
