use crate::core::utils::quaternion::DualQuaternion;
use nalgebra::DVector;

/// Which solver produced an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Closed-form eigen-solution; one side is a single rigid group.
    Analytical,
    /// Joint constrained optimization over all transforms.
    Numerical,
    /// Every group pair aligned independently.
    Pairwise,
}

/// Diagnostics of the most recent alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveSummary {
    pub kind: SolverKind,
    /// Match-weighted sum of squared distances at the solution.
    pub objective: f64,
    pub iterations: usize,
    pub max_constraint_violation: f64,
}

/// The evolving transform estimate of one alignment problem.
///
/// Holds `N + M - 1` transforms for `N` reactant and `M` product groups: entry `j < M` maps
/// product group `j` into the frame of reactant group 0, entry `M + i - 1` maps reactant group
/// `i >= 1` into the same frame. Reactant group 0 is the untransformed reference. The Lagrange
/// multipliers of the constrained solve are kept alongside so that later calls warm-start from
/// a converged point.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformState {
    transforms: Vec<DualQuaternion>,
    multipliers: DVector<f64>,
    num_product_groups: usize,
    seeded: bool,
}

impl TransformState {
    pub const PARAMETERS_PER_TRANSFORM: usize = 8;
    pub const CONSTRAINTS_PER_TRANSFORM: usize = 2;

    pub fn new(num_reactant_groups: usize, num_product_groups: usize) -> Self {
        let count = num_reactant_groups + num_product_groups - 1;
        Self {
            transforms: vec![DualQuaternion::identity(); count],
            multipliers: DVector::zeros(count * Self::CONSTRAINTS_PER_TRANSFORM),
            num_product_groups,
            seeded: false,
        }
    }

    pub fn transforms(&self) -> &[DualQuaternion] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Whether the state holds a solution (as opposed to the initial identities).
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn multipliers(&self) -> &DVector<f64> {
        &self.multipliers
    }

    /// Index of the transform of product group `j`.
    pub fn product_slot(&self, product_group: usize) -> usize {
        product_group
    }

    /// Index of the transform of reactant group `i`; `None` for the reference group.
    pub fn reactant_slot(&self, reactant_group: usize) -> Option<usize> {
        (reactant_group > 0).then(|| self.num_product_groups + reactant_group - 1)
    }

    /// Flattens the transforms into `[s_0, r_0, s_1, r_1, ...]`.
    pub fn to_flat(&self) -> DVector<f64> {
        Self::flatten(&self.transforms)
    }

    pub fn flatten(transforms: &[DualQuaternion]) -> DVector<f64> {
        let mut flat = DVector::zeros(transforms.len() * Self::PARAMETERS_PER_TRANSFORM);
        for (k, transform) in transforms.iter().enumerate() {
            let base = k * Self::PARAMETERS_PER_TRANSFORM;
            flat.fixed_rows_mut::<4>(base).copy_from(&transform.s);
            flat.fixed_rows_mut::<4>(base + 4).copy_from(&transform.r);
        }
        flat
    }

    /// Reads the `k`-th transform out of a flat parameter vector.
    pub fn transform_from_flat(flat: &DVector<f64>, k: usize) -> DualQuaternion {
        let base = k * Self::PARAMETERS_PER_TRANSFORM;
        DualQuaternion::new(
            flat.fixed_rows::<4>(base).into_owned(),
            flat.fixed_rows::<4>(base + 4).into_owned(),
        )
    }

    /// Replaces the estimate with a solution.
    pub fn commit(&mut self, transforms: Vec<DualQuaternion>, multipliers: Option<DVector<f64>>) {
        debug_assert_eq!(transforms.len(), self.transforms.len());
        self.transforms = transforms;
        if let Some(multipliers) = multipliers {
            self.multipliers = multipliers;
        }
        self.seeded = true;
    }

    /// Discards the estimate so that the next solve starts from scratch.
    pub fn reset(&mut self) {
        *self = Self::new(
            self.transforms.len() + 1 - self.num_product_groups,
            self.num_product_groups,
        );
    }
}
