use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value {value} for parameter '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Settings for the geometric alignment scorer and its constrained solver.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentConfig {
    /// Outer (multiplier update) iterations of the constrained solve.
    pub max_iterations: usize,
    /// Quasi-Newton iterations per outer iteration.
    pub inner_max_iterations: usize,
    /// Decrease of the inner objective, relative to `max(1, |L|)`, below which a quasi-Newton
    /// restart counts as making no progress.
    pub objective_tolerance: f64,
    /// Projected-gradient infinity norm, relative to `max(1, |L|)`, below which an inner solve is
    /// stationary. Its square root is accepted only once `L` can no longer be decreased.
    pub gradient_tolerance: f64,
    /// Largest constraint residual accepted as feasible.
    pub constraint_tolerance: f64,
    /// Box bound applied to every dual (translation) component.
    pub dual_bound: f64,
    /// Optional box bound applied to every rotation component.
    pub rotation_bound: Option<f64>,
    /// Gap between the two largest eigenvalues, relative to the eigenvalue spread, below which a
    /// rotation is ambiguous.
    pub degeneracy_tolerance: f64,
    /// Total match weight of a group pair at or below which the pair is ill-posed.
    pub min_block_weight: f64,
    /// Accept ambiguous rotations (with a warning) instead of failing.
    pub allow_degenerate_rotation: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            inner_max_iterations: 2000,
            objective_tolerance: 1e-12,
            gradient_tolerance: 1e-8,
            constraint_tolerance: 1e-8,
            dual_bound: 1e3,
            rotation_bound: None,
            degeneracy_tolerance: 1e-9,
            min_block_weight: f64::EPSILON,
            allow_degenerate_rotation: false,
        }
    }
}

#[derive(Default)]
pub struct AlignmentConfigBuilder {
    max_iterations: Option<usize>,
    inner_max_iterations: Option<usize>,
    objective_tolerance: Option<f64>,
    gradient_tolerance: Option<f64>,
    constraint_tolerance: Option<f64>,
    dual_bound: Option<f64>,
    rotation_bound: Option<f64>,
    degeneracy_tolerance: Option<f64>,
    min_block_weight: Option<f64>,
    allow_degenerate_rotation: Option<bool>,
}

impl AlignmentConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn inner_max_iterations(mut self, iterations: usize) -> Self {
        self.inner_max_iterations = Some(iterations);
        self
    }
    pub fn objective_tolerance(mut self, tolerance: f64) -> Self {
        self.objective_tolerance = Some(tolerance);
        self
    }
    pub fn gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = Some(tolerance);
        self
    }
    pub fn constraint_tolerance(mut self, tolerance: f64) -> Self {
        self.constraint_tolerance = Some(tolerance);
        self
    }
    pub fn dual_bound(mut self, bound: f64) -> Self {
        self.dual_bound = Some(bound);
        self
    }
    pub fn rotation_bound(mut self, bound: f64) -> Self {
        self.rotation_bound = Some(bound);
        self
    }
    pub fn degeneracy_tolerance(mut self, tolerance: f64) -> Self {
        self.degeneracy_tolerance = Some(tolerance);
        self
    }
    pub fn min_block_weight(mut self, weight: f64) -> Self {
        self.min_block_weight = Some(weight);
        self
    }
    pub fn allow_degenerate_rotation(mut self, allow: bool) -> Self {
        self.allow_degenerate_rotation = Some(allow);
        self
    }

    /// Fills unset parameters from [`AlignmentConfig::default`] and validates the result.
    pub fn build(self) -> Result<AlignmentConfig, ConfigError> {
        let defaults = AlignmentConfig::default();
        let config = AlignmentConfig {
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            inner_max_iterations: self
                .inner_max_iterations
                .unwrap_or(defaults.inner_max_iterations),
            objective_tolerance: self
                .objective_tolerance
                .unwrap_or(defaults.objective_tolerance),
            gradient_tolerance: self
                .gradient_tolerance
                .unwrap_or(defaults.gradient_tolerance),
            constraint_tolerance: self
                .constraint_tolerance
                .unwrap_or(defaults.constraint_tolerance),
            dual_bound: self.dual_bound.unwrap_or(defaults.dual_bound),
            rotation_bound: self.rotation_bound.or(defaults.rotation_bound),
            degeneracy_tolerance: self
                .degeneracy_tolerance
                .unwrap_or(defaults.degeneracy_tolerance),
            min_block_weight: self.min_block_weight.unwrap_or(defaults.min_block_weight),
            allow_degenerate_rotation: self
                .allow_degenerate_rotation
                .unwrap_or(defaults.allow_degenerate_rotation),
        };
        config.validate()?;
        Ok(config)
    }
}

impl AlignmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_iterations",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        if self.inner_max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "inner_max_iterations",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        for (name, value) in [
            ("objective_tolerance", self.objective_tolerance),
            ("gradient_tolerance", self.gradient_tolerance),
            ("constraint_tolerance", self.constraint_tolerance),
            ("degeneracy_tolerance", self.degeneracy_tolerance),
            ("dual_bound", self.dual_bound),
        ] {
            require_positive(name, value)?;
        }
        if let Some(bound) = self.rotation_bound {
            if !(bound >= 1.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "rotation_bound",
                    value: bound,
                    reason: "must be at least 1 so that unit quaternions stay reachable",
                });
            }
        }
        if !(self.min_block_weight >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "min_block_weight",
                value: self.min_block_weight,
                reason: "must be non-negative",
            });
        }
        Ok(())
    }
}

/// Weights for combining the alignment score with the compatibility scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub alignment: AlignmentConfig,
    pub alignment_weight: f64,
    pub bond_weight: f64,
    /// Penalty added when the SYBYL types of a reactant and a product atom differ.
    pub sybyl_weight: f64,
    /// Penalty added when the elements of a reactant and a product atom differ.
    pub element_mismatch_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            alignment: AlignmentConfig::default(),
            alignment_weight: 1.0,
            bond_weight: 1.0,
            sybyl_weight: 1.0,
            element_mismatch_penalty: 1e300,
        }
    }
}

#[derive(Default)]
pub struct ScoringConfigBuilder {
    alignment: Option<AlignmentConfig>,
    alignment_weight: Option<f64>,
    bond_weight: Option<f64>,
    sybyl_weight: Option<f64>,
    element_mismatch_penalty: Option<f64>,
}

impl ScoringConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alignment(mut self, config: AlignmentConfig) -> Self {
        self.alignment = Some(config);
        self
    }
    pub fn alignment_weight(mut self, weight: f64) -> Self {
        self.alignment_weight = Some(weight);
        self
    }
    pub fn bond_weight(mut self, weight: f64) -> Self {
        self.bond_weight = Some(weight);
        self
    }
    pub fn sybyl_weight(mut self, weight: f64) -> Self {
        self.sybyl_weight = Some(weight);
        self
    }
    pub fn element_mismatch_penalty(mut self, penalty: f64) -> Self {
        self.element_mismatch_penalty = Some(penalty);
        self
    }

    pub fn build(self) -> Result<ScoringConfig, ConfigError> {
        let defaults = ScoringConfig::default();
        let alignment = self.alignment.unwrap_or(defaults.alignment);
        alignment.validate()?;
        let config = ScoringConfig {
            alignment,
            alignment_weight: self.alignment_weight.unwrap_or(defaults.alignment_weight),
            bond_weight: self.bond_weight.unwrap_or(defaults.bond_weight),
            sybyl_weight: self.sybyl_weight.unwrap_or(defaults.sybyl_weight),
            element_mismatch_penalty: self
                .element_mismatch_penalty
                .unwrap_or(defaults.element_mismatch_penalty),
        };
        for (name, value) in [
            ("alignment_weight", config.alignment_weight),
            ("bond_weight", config.bond_weight),
            ("sybyl_weight", config.sybyl_weight),
            ("element_mismatch_penalty", config.element_mismatch_penalty),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite and non-negative",
                });
            }
        }
        Ok(config)
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            reason: "must be finite and positive",
        })
    }
}
