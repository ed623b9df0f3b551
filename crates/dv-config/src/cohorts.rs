use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use dv_core::{Cohort, normalize_network};
use serde::Deserialize;

use crate::ConfigError;

#[derive(Debug, Deserialize)]
struct CohortFile {
    #[serde(default)]
    cohorts: Vec<Cohort>,
}

/// Cohort reference data, read once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CohortRegistry {
    cohorts: Vec<Cohort>,
}

impl CohortRegistry {
    pub fn new(cohorts: Vec<Cohort>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut normalized = Vec::with_capacity(cohorts.len());
        for mut cohort in cohorts {
            cohort.network = normalize_network(&cohort.network);
            if cohort.network.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "cohort {} has an empty network",
                    cohort.index
                )));
            }
            if !seen.insert((cohort.network.clone(), cohort.index)) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate cohort {} for network '{}'",
                    cohort.index, cohort.network
                )));
            }
            if cohort
                .end_block
                .is_some_and(|end_block| end_block < cohort.start_block)
            {
                return Err(ConfigError::Invalid(format!(
                    "cohort {} ends before it starts at block {}",
                    cohort.index, cohort.start_block
                )));
            }
            normalized.push(cohort);
        }
        normalized.sort_by(|left, right| {
            left.network
                .cmp(&right.network)
                .then_with(|| left.index.cmp(&right.index))
        });
        Ok(Self {
            cohorts: normalized,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let file: CohortFile = toml::from_str(raw)?;
        Self::new(file.cohorts)
    }

    pub fn get(&self, network: &str, index: u32) -> Option<&Cohort> {
        let network = normalize_network(network);
        self.cohorts
            .iter()
            .find(|cohort| cohort.network == network && cohort.index == index)
    }

    pub fn for_network(&self, network: &str) -> Vec<&Cohort> {
        let network = normalize_network(network);
        self.cohorts
            .iter()
            .filter(|cohort| cohort.network == network)
            .collect()
    }

    /// Highest-indexed cohort on `network` that has no end block yet.
    pub fn current(&self, network: &str) -> Option<&Cohort> {
        self.for_network(network)
            .into_iter()
            .filter(|cohort| cohort.is_ongoing())
            .max_by_key(|cohort| cohort.index)
    }

    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }
}

pub fn load_cohort_registry(path: impl AsRef<Path>) -> Result<CohortRegistry, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(CohortRegistry::default());
    }
    let raw = fs::read_to_string(path)?;
    CohortRegistry::parse(&raw)
}
