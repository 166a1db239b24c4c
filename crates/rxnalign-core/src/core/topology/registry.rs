use super::bond_limits::{self, BondLimits};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Bond-length limits with optional user overrides layered over the built-in table.
#[derive(Debug, Clone, Default)]
pub struct BondLimitRegistry {
    overrides: HashMap<String, BondLimits>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct BondLimitFile(HashMap<String, BondLimits>);

impl BondLimitRegistry {
    /// Loads overrides from a TOML file whose tables are keyed by element pair, e.g. `["C-Br"]`.
    pub fn load(path: &Path) -> Result<Self, BondLimitLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| BondLimitLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: BondLimitFile =
            toml::from_str(&content).map_err(|e| BondLimitLoadError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        let mut overrides = HashMap::with_capacity(file.0.len());
        for (pair, limits) in file.0 {
            let (a, b) = pair
                .split_once('-')
                .filter(|(a, b)| !a.trim().is_empty() && !b.trim().is_empty())
                .ok_or_else(|| BondLimitLoadError::InvalidPair(pair.clone()))?;
            overrides.insert(bond_limits::pair_key(a.trim(), b.trim()), limits);
        }
        Ok(Self { overrides })
    }

    pub fn get(&self, element1: &str, element2: &str) -> Option<BondLimits> {
        self.overrides
            .get(&bond_limits::pair_key(element1, element2))
            .copied()
            .or_else(|| bond_limits::lookup(element1, element2))
    }

    pub fn num_overrides(&self) -> usize {
        self.overrides.len()
    }
}

#[derive(Debug, Error)]
pub enum BondLimitLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid element pair '{0}', expected the form 'A-B'")]
    InvalidPair(String),
}
