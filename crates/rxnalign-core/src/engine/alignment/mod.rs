//! # Alignment Module
//!
//! Scores a soft reactant/product atom correspondence by the squared distances that remain after
//! rigidly superimposing the groups each atom belongs to.
//!
//! Reactant group 0 is the reference frame. When either side is a single rigid group every group
//! pair is solved in closed form ([`analytical`]); otherwise all `N + M - 1` transforms are
//! estimated jointly by a constrained optimization ([`numerical`]) that warm-starts from the
//! previous call.

pub mod analytical;
pub mod interaction;
pub mod numerical;

use self::analytical::{GroupPair, check_degeneracy, solve_block};
use self::interaction::AtomInteractions;
use self::numerical::{MultiBodyProblem, seed_transforms};
use super::config::AlignmentConfig;
use super::error::AlignmentError;
use super::optimizer::{AugmentedLagrangian, SolverSettings};
use super::state::{SolveSummary, SolverKind, TransformState};
use crate::core::models::side::{ReactionSide, validate_partition};
use crate::core::utils::quaternion::DualQuaternion;
use nalgebra::{DMatrix, DVector, Isometry3, Point3};
use tracing::{debug, instrument, warn};

struct Solution {
    distances: DMatrix<f64>,
    transforms: Option<(Vec<DualQuaternion>, Option<DVector<f64>>)>,
    summary: SolveSummary,
}

/// Owns the geometry of one alignment problem and its evolving transform estimate.
#[derive(Debug, Clone)]
pub struct AlignmentScorer {
    reactant_positions: Vec<Point3<f64>>,
    product_positions: Vec<Point3<f64>>,
    reactant_groups: Vec<Vec<usize>>,
    product_groups: Vec<Vec<usize>>,
    reactant_slots: Vec<Option<usize>>,
    product_slots: Vec<usize>,
    interactions: AtomInteractions,
    config: AlignmentConfig,
    solver: AugmentedLagrangian,
    state: TransformState,
    distances: DMatrix<f64>,
    last_solve: Option<SolveSummary>,
}

impl AlignmentScorer {
    pub fn new(
        reactants: &ReactionSide,
        products: &ReactionSide,
        config: AlignmentConfig,
    ) -> Result<Self, AlignmentError> {
        Self::from_parts(
            reactants.positions(),
            reactants.groups().to_vec(),
            products.positions(),
            products.groups().to_vec(),
            config,
        )
    }

    /// Builds a scorer from raw coordinates and rigid-group partitions.
    ///
    /// Fails if either side is empty, a partition does not cover its side exactly once, or the
    /// configuration is invalid.
    pub fn from_parts(
        reactant_positions: Vec<Point3<f64>>,
        reactant_groups: Vec<Vec<usize>>,
        product_positions: Vec<Point3<f64>>,
        product_groups: Vec<Vec<usize>>,
        config: AlignmentConfig,
    ) -> Result<Self, AlignmentError> {
        config.validate()?;
        for (side, positions, groups) in [
            ("reactant", &reactant_positions, &reactant_groups),
            ("product", &product_positions, &product_groups),
        ] {
            if positions.is_empty() {
                return Err(AlignmentError::EmptySide { side });
            }
            validate_partition(positions.len(), groups)
                .map_err(|source| AlignmentError::InvalidGroups { side, source })?;
        }

        let state = TransformState::new(reactant_groups.len(), product_groups.len());
        let mut reactant_slots = vec![None; reactant_positions.len()];
        for (group, atoms) in reactant_groups.iter().enumerate() {
            for &atom in atoms {
                reactant_slots[atom] = state.reactant_slot(group);
            }
        }
        let mut product_slots = vec![0; product_positions.len()];
        for (group, atoms) in product_groups.iter().enumerate() {
            for &atom in atoms {
                product_slots[atom] = state.product_slot(group);
            }
        }

        let interactions = AtomInteractions::new(&reactant_positions, &product_positions);
        let distances = DMatrix::zeros(reactant_positions.len(), product_positions.len());
        let solver = AugmentedLagrangian::new(SolverSettings::from(&config));

        Ok(Self {
            reactant_positions,
            product_positions,
            reactant_groups,
            product_groups,
            reactant_slots,
            product_slots,
            interactions,
            config,
            solver,
            state,
            distances,
            last_solve: None,
        })
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// `(reactant atoms, product atoms)`
    pub fn shape(&self) -> (usize, usize) {
        (self.reactant_positions.len(), self.product_positions.len())
    }

    pub fn solver_kind(&self) -> SolverKind {
        if self.reactant_groups.len() == 1 || self.product_groups.len() == 1 {
            SolverKind::Analytical
        } else {
            SolverKind::Numerical
        }
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    pub fn transforms(&self) -> &[DualQuaternion] {
        self.state.transforms()
    }

    /// The matrix returned by the most recent successful call.
    pub fn squared_distances(&self) -> &DMatrix<f64> {
        &self.distances
    }

    pub fn last_solve(&self) -> Option<&SolveSummary> {
        self.last_solve.as_ref()
    }

    /// Forgets the transform estimate; the next numerical solve seeds itself again.
    pub fn reset(&mut self) {
        self.state.reset();
        self.last_solve = None;
    }

    /// Aligns all groups under `matches` and returns the reactant-by-product squared distances.
    ///
    /// On failure neither the transform estimate nor the previous distance matrix is touched.
    #[instrument(skip_all, name = "alignment_score", fields(shape = ?self.shape()))]
    pub fn score(&mut self, matches: &DMatrix<f64>) -> Result<&DMatrix<f64>, AlignmentError> {
        let matches = self.prepare_matches(matches)?;
        let solution = match self.solver_kind() {
            SolverKind::Analytical => self.solve_analytical(&matches)?,
            _ => self.solve_numerical(&matches)?,
        };
        self.finish(solution)
    }

    /// Aligns every group pair on its own, ignoring the shared reference frame.
    ///
    /// Never fails on an ambiguous rotation, and leaves group pairs without any match weight
    /// unaligned. Intended as a fallback after [`AlignmentError::NotConverged`]; the transform
    /// estimate is left unchanged.
    #[instrument(skip_all, name = "alignment_score_pairwise", fields(shape = ?self.shape()))]
    pub fn score_pairwise(
        &mut self,
        matches: &DMatrix<f64>,
    ) -> Result<&DMatrix<f64>, AlignmentError> {
        let matches = self.prepare_matches(matches)?;
        let solution = self.solve_pairwise(&matches)?;
        self.finish(solution)
    }

    /// Checks the shape and entries of a match matrix and zeroes negligible weights.
    fn prepare_matches(&self, matches: &DMatrix<f64>) -> Result<DMatrix<f64>, AlignmentError> {
        let expected = self.shape();
        if matches.shape() != expected {
            return Err(AlignmentError::ShapeMismatch {
                what: "match matrix",
                expected,
                found: matches.shape(),
            });
        }
        let mut prepared = matches.clone();
        for col in 0..prepared.ncols() {
            for row in 0..prepared.nrows() {
                let value = prepared[(row, col)];
                if !value.is_finite() || value < -f64::EPSILON {
                    return Err(AlignmentError::InvalidWeight { row, col, value });
                }
                if value.abs() <= f64::EPSILON {
                    prepared[(row, col)] = 0.0;
                }
            }
        }
        Ok(prepared)
    }

    fn pairs(&self) -> impl Iterator<Item = GroupPair> + use<> {
        let num_products = self.product_groups.len();
        (0..self.reactant_groups.len()).flat_map(move |reactant_group| {
            (0..num_products).map(move |product_group| GroupPair {
                reactant_group,
                product_group,
            })
        })
    }

    fn write_block(
        &self,
        distances: &mut DMatrix<f64>,
        pair: GroupPair,
        reactant_map: &Isometry3<f64>,
        product_map: &Isometry3<f64>,
    ) {
        for &a in &self.reactant_groups[pair.reactant_group] {
            let placed = reactant_map * self.reactant_positions[a];
            for &b in &self.product_groups[pair.product_group] {
                distances[(a, b)] = (placed - product_map * self.product_positions[b]).norm_squared();
            }
        }
    }

    fn solve_analytical(&self, matches: &DMatrix<f64>) -> Result<Solution, AlignmentError> {
        let mut distances = DMatrix::zeros(matches.nrows(), matches.ncols());
        let mut pair_transforms = Vec::with_capacity(self.state.len());
        for pair in self.pairs() {
            let solution = solve_block(
                &self.interactions,
                pair,
                &self.reactant_groups[pair.reactant_group],
                &self.product_groups[pair.product_group],
                matches,
                &self.config,
            )?;
            check_degeneracy(&solution, pair, &self.config)?;
            self.write_block(
                &mut distances,
                pair,
                &Isometry3::identity(),
                &solution.transform.to_isometry(),
            );
            pair_transforms.push(solution.transform);
        }

        // Either the reactant side has one group, and each pair transform already maps its
        // product group into the reference frame, or the product side has one group and every
        // other reactant group reaches the reference through it.
        let transforms = if self.reactant_groups.len() == 1 {
            pair_transforms
        } else {
            let product_frame = pair_transforms[0].to_isometry();
            let mut transforms = vec![pair_transforms[0]];
            transforms.extend(pair_transforms[1..].iter().map(|pair_transform| {
                DualQuaternion::from_isometry(
                    &(product_frame * pair_transform.to_isometry().inverse()),
                )
                .canonicalized()
            }));
            transforms
        };

        let max_constraint_violation = transforms
            .iter()
            .map(|t| t.norm_residual().abs().max(t.orthogonality_residual().abs()))
            .fold(0.0, f64::max);
        let summary = SolveSummary {
            kind: SolverKind::Analytical,
            objective: matches.component_mul(&distances).sum(),
            iterations: 0,
            max_constraint_violation,
        };
        Ok(Solution {
            distances,
            transforms: Some((transforms, None)),
            summary,
        })
    }

    fn solve_numerical(&self, matches: &DMatrix<f64>) -> Result<Solution, AlignmentError> {
        let x0 = if self.state.is_seeded() {
            self.state.to_flat()
        } else {
            TransformState::flatten(&seed_transforms(
                &self.interactions,
                &self.reactant_groups,
                &self.product_groups,
                matches,
                &self.config,
                &self.state,
            ))
        };

        let problem = MultiBodyProblem::new(
            &self.reactant_positions,
            &self.product_positions,
            &self.reactant_slots,
            &self.product_slots,
            matches,
            self.state.len(),
            &self.config,
        );
        let outcome = self
            .solver
            .minimize(&problem, &x0, Some(self.state.multipliers()));
        if !outcome.converged {
            warn!(
                iterations = outcome.iterations,
                objective = outcome.objective,
                violation = outcome.max_constraint_violation,
                "Constrained alignment did not converge."
            );
            return Err(AlignmentError::NotConverged {
                iterations: outcome.iterations,
                objective: outcome.objective,
                max_constraint_violation: outcome.max_constraint_violation,
            });
        }

        let transforms: Vec<DualQuaternion> = (0..self.state.len())
            .map(|k| TransformState::transform_from_flat(&outcome.x, k))
            .collect();
        let distances = self.distances_from_transforms(&transforms);
        let summary = SolveSummary {
            kind: SolverKind::Numerical,
            objective: outcome.objective,
            iterations: outcome.iterations,
            max_constraint_violation: outcome.max_constraint_violation,
        };
        Ok(Solution {
            distances,
            transforms: Some((transforms, Some(outcome.multipliers))),
            summary,
        })
    }

    fn solve_pairwise(&self, matches: &DMatrix<f64>) -> Result<Solution, AlignmentError> {
        let mut distances = DMatrix::zeros(matches.nrows(), matches.ncols());
        let mut max_constraint_violation: f64 = 0.0;
        for pair in self.pairs() {
            let product_map = match solve_block(
                &self.interactions,
                pair,
                &self.reactant_groups[pair.reactant_group],
                &self.product_groups[pair.product_group],
                matches,
                &self.config,
            ) {
                Ok(solution) => {
                    if solution.is_degenerate(self.config.degeneracy_tolerance) {
                        warn!(
                            reactant_group = pair.reactant_group,
                            product_group = pair.product_group,
                            gap = solution.eigenvalue_gap,
                            "Pairwise alignment uses an ambiguous rotation."
                        );
                    }
                    let t = solution.transform;
                    max_constraint_violation = max_constraint_violation
                        .max(t.norm_residual().abs())
                        .max(t.orthogonality_residual().abs());
                    t.to_isometry()
                }
                Err(AlignmentError::IllPosedBlock { total_weight, .. }) => {
                    debug!(
                        reactant_group = pair.reactant_group,
                        product_group = pair.product_group,
                        total_weight,
                        "Group pair has no match weight; leaving it unaligned."
                    );
                    Isometry3::identity()
                }
                Err(e) => return Err(e),
            };
            self.write_block(&mut distances, pair, &Isometry3::identity(), &product_map);
        }

        let summary = SolveSummary {
            kind: SolverKind::Pairwise,
            objective: matches.component_mul(&distances).sum(),
            iterations: 0,
            max_constraint_violation,
        };
        Ok(Solution {
            distances,
            transforms: None,
            summary,
        })
    }

    fn distances_from_transforms(&self, transforms: &[DualQuaternion]) -> DMatrix<f64> {
        let rigid: Vec<_> = transforms
            .iter()
            .map(DualQuaternion::to_rigid_transform)
            .collect();
        let placed_products: Vec<_> = self
            .product_positions
            .iter()
            .zip(&self.product_slots)
            .map(|(x, &k)| rigid[k].0 * x.coords + rigid[k].1)
            .collect();

        DMatrix::from_fn(self.reactant_positions.len(), placed_products.len(), |a, b| {
            let y = self.reactant_positions[a].coords;
            let placed = match self.reactant_slots[a] {
                Some(k) => rigid[k].0 * y + rigid[k].1,
                None => y,
            };
            (placed - placed_products[b]).norm_squared()
        })
    }

    fn finish(&mut self, solution: Solution) -> Result<&DMatrix<f64>, AlignmentError> {
        if let Some(index) = solution.distances.iter().position(|d| !d.is_finite()) {
            let rows = solution.distances.nrows();
            return Err(AlignmentError::NonFinite {
                row: index % rows,
                col: index / rows,
            });
        }

        if let Some((transforms, multipliers)) = solution.transforms {
            self.state.commit(transforms, multipliers);
        }
        debug!(
            kind = ?solution.summary.kind,
            objective = solution.summary.objective,
            iterations = solution.summary.iterations,
            violation = solution.summary.max_constraint_violation,
            "Alignment solved."
        );
        self.last_solve = Some(solution.summary);
        self.distances = solution.distances;
        Ok(&self.distances)
    }
}
