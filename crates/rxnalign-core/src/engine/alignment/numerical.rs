//! Joint estimation of all group transforms when both sides consist of several rigid groups.

use super::analytical::{GroupPair, solve_block};
use super::interaction::AtomInteractions;
use crate::core::utils::quaternion::{
    DualQuaternion, left_representation, right_representation, to_rigid_transform,
};
use crate::engine::config::AlignmentConfig;
use crate::engine::optimizer::{Bound, ConstrainedProblem};
use crate::engine::state::TransformState;
use nalgebra::{DMatrix, DVector, Isometry3, Matrix3, Point3, Vector3, Vector4};
use tracing::{debug, trace};

const P: usize = TransformState::PARAMETERS_PER_TRANSFORM;
const C: usize = TransformState::CONSTRAINTS_PER_TRANSFORM;

#[derive(Debug, Clone, Copy)]
struct WeightedPair {
    reactant: usize,
    product: usize,
    weight: f64,
}

/// The match-weighted sum of squared distances over all transforms, with two equality
/// constraints (`|r|^2 = 1`, `r . s = 0`) per transform.
///
/// Reactant atoms of the reference group have no slot and stay where they are; every other
/// atom is moved by the transform in its group's slot.
pub struct MultiBodyProblem<'a> {
    reactant_positions: &'a [Point3<f64>],
    product_positions: &'a [Point3<f64>],
    reactant_slots: &'a [Option<usize>],
    product_slots: &'a [usize],
    pairs: Vec<WeightedPair>,
    num_transforms: usize,
    bounds: Vec<Bound>,
}

impl<'a> MultiBodyProblem<'a> {
    pub fn new(
        reactant_positions: &'a [Point3<f64>],
        product_positions: &'a [Point3<f64>],
        reactant_slots: &'a [Option<usize>],
        product_slots: &'a [usize],
        matches: &DMatrix<f64>,
        num_transforms: usize,
        config: &AlignmentConfig,
    ) -> Self {
        let mut pairs = Vec::new();
        for reactant in 0..matches.nrows() {
            for product in 0..matches.ncols() {
                let weight = matches[(reactant, product)];
                if weight > 0.0 {
                    pairs.push(WeightedPair {
                        reactant,
                        product,
                        weight,
                    });
                }
            }
        }

        let dual = Bound::symmetric(config.dual_bound);
        let rotation = config
            .rotation_bound
            .map(Bound::symmetric)
            .unwrap_or(Bound::FREE);
        let bounds = (0..num_transforms)
            .flat_map(|_| [dual; 4].into_iter().chain([rotation; 4]))
            .collect();

        Self {
            reactant_positions,
            product_positions,
            reactant_slots,
            product_slots,
            pairs,
            num_transforms,
            bounds,
        }
    }

    fn parts(x: &DVector<f64>, k: usize) -> (Vector4<f64>, Vector4<f64>) {
        let base = k * P;
        (
            x.fixed_rows::<4>(base).into_owned(),
            x.fixed_rows::<4>(base + 4).into_owned(),
        )
    }

    fn rigid_transforms(&self, x: &DVector<f64>) -> Vec<(Matrix3<f64>, Vector3<f64>)> {
        (0..self.num_transforms)
            .map(|k| {
                let (s, r) = Self::parts(x, k);
                to_rigid_transform(&r, &s)
            })
            .collect()
    }

    fn residual(
        &self,
        transforms: &[(Matrix3<f64>, Vector3<f64>)],
        pair: &WeightedPair,
    ) -> Vector3<f64> {
        let y = &self.reactant_positions[pair.reactant].coords;
        let placed_reactant = match self.reactant_slots[pair.reactant] {
            Some(k) => transforms[k].0 * y + transforms[k].1,
            None => *y,
        };
        let (rotation, translation) = &transforms[self.product_slots[pair.product]];
        placed_reactant - (rotation * self.product_positions[pair.product].coords + translation)
    }
}

impl ConstrainedProblem for MultiBodyProblem<'_> {
    fn dimension(&self) -> usize {
        self.num_transforms * P
    }

    fn num_constraints(&self) -> usize {
        self.num_transforms * C
    }

    fn objective(&self, x: &DVector<f64>) -> f64 {
        let transforms = self.rigid_transforms(x);
        self.pairs
            .iter()
            .map(|pair| pair.weight * self.residual(&transforms, pair).norm_squared())
            .sum()
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let transforms = self.rigid_transforms(x);
        let mut d_rotation = vec![Matrix3::zeros(); self.num_transforms];
        let mut d_translation = vec![Vector3::zeros(); self.num_transforms];

        for pair in &self.pairs {
            let z = self.residual(&transforms, pair) * (2.0 * pair.weight);
            let product_slot = self.product_slots[pair.product];
            let x_b = &self.product_positions[pair.product].coords;
            d_rotation[product_slot] -= z * x_b.transpose();
            d_translation[product_slot] -= z;
            if let Some(reactant_slot) = self.reactant_slots[pair.reactant] {
                let y_a = &self.reactant_positions[pair.reactant].coords;
                d_rotation[reactant_slot] += z * y_a.transpose();
                d_translation[reactant_slot] += z;
            }
        }

        // R = [W(r)^T Q(r)]_3x3 and t = [W(r)^T s]_3 are both linear in W and Q, which are in
        // turn linear in r.
        let mut gradient = DVector::zeros(self.dimension());
        for k in 0..self.num_transforms {
            let base = k * P;
            let (s, r) = Self::parts(x, k);
            let w_r = left_representation(&r);
            let q_r = right_representation(&r);

            let d_s = w_r.fixed_columns::<3>(0) * d_translation[k];
            gradient.fixed_rows_mut::<4>(base).copy_from(&d_s);

            for m in 0..4 {
                let mut e = Vector4::zeros();
                e[m] = 1.0;
                let w_e = left_representation(&e);
                let q_e = right_representation(&e);
                let dr_rotation = (w_e.transpose() * q_r + w_r.transpose() * q_e)
                    .fixed_view::<3, 3>(0, 0)
                    .into_owned();
                let dr_translation = (w_e.transpose() * s).fixed_rows::<3>(0).into_owned();
                gradient[base + 4 + m] = d_rotation[k].component_mul(&dr_rotation).sum()
                    + d_translation[k].dot(&dr_translation);
            }
        }
        gradient
    }

    fn constraints(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut values = DVector::zeros(self.num_constraints());
        for k in 0..self.num_transforms {
            let (s, r) = Self::parts(x, k);
            values[k * C] = r.norm_squared() - 1.0;
            values[k * C + 1] = r.dot(&s);
        }
        values
    }

    fn constraint_jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(self.num_constraints(), self.dimension());
        for k in 0..self.num_transforms {
            let base = k * P;
            let (s, r) = Self::parts(x, k);
            for m in 0..4 {
                jacobian[(k * C, base + 4 + m)] = 2.0 * r[m];
                jacobian[(k * C + 1, base + m)] = r[m];
                jacobian[(k * C + 1, base + 4 + m)] = s[m];
            }
        }
        jacobian
    }

    fn bounds(&self) -> Vec<Bound> {
        self.bounds.clone()
    }
}

/// Initial transforms built from closed-form solutions of individual group pairs.
///
/// Frames spread outward from reactant group 0 along a maximum-weight spanning tree of the
/// bipartite group graph: at each step the heaviest block joining a placed group to an unplaced
/// one is solved and composed with the placed group's frame. Ill-posed or asymmetric blocks are
/// skipped. A block with an ambiguous rotation is set aside while any other block can still
/// place a group, and used only when nothing else reaches the groups behind it. Groups that
/// cannot be reached keep the identity.
pub fn seed_transforms(
    interactions: &AtomInteractions,
    reactant_groups: &[Vec<usize>],
    product_groups: &[Vec<usize>],
    matches: &DMatrix<f64>,
    config: &AlignmentConfig,
    state: &TransformState,
) -> Vec<DualQuaternion> {
    let (n, m) = (reactant_groups.len(), product_groups.len());
    let block_weight = DMatrix::from_fn(n, m, |i, j| {
        reactant_groups[i]
            .iter()
            .flat_map(|&a| product_groups[j].iter().map(move |&b| (a, b)))
            .map(|(a, b)| matches[(a, b)])
            .sum::<f64>()
    });

    let mut reactant_frames: Vec<Option<Isometry3<f64>>> = vec![None; n];
    let mut product_frames: Vec<Option<Isometry3<f64>>> = vec![None; m];
    reactant_frames[0] = Some(Isometry3::identity());
    let mut rejected = DMatrix::from_element(n, m, false);
    let mut ambiguous = DMatrix::from_element(n, m, false);

    loop {
        let candidate = (0..n)
            .flat_map(|i| (0..m).map(move |j| (i, j)))
            .filter(|&(i, j)| {
                !rejected[(i, j)]
                    && block_weight[(i, j)] > config.min_block_weight
                    && (reactant_frames[i].is_some() != product_frames[j].is_some())
            })
            .max_by(|a, b| {
                ambiguous[*b]
                    .cmp(&ambiguous[*a])
                    .then(block_weight[*a].total_cmp(&block_weight[*b]))
            });
        let Some((i, j)) = candidate else { break };

        let pair = GroupPair {
            reactant_group: i,
            product_group: j,
        };
        let solution = match solve_block(
            interactions,
            pair,
            &reactant_groups[i],
            &product_groups[j],
            matches,
            config,
        ) {
            Ok(solution) => solution,
            Err(e) => {
                trace!(reactant_group = i, product_group = j, error = %e, "Skipping seed block.");
                rejected[(i, j)] = true;
                continue;
            }
        };

        if solution.is_degenerate(config.degeneracy_tolerance) && !ambiguous[(i, j)] {
            trace!(
                reactant_group = i,
                product_group = j,
                gap = solution.eigenvalue_gap,
                "Deferring ambiguous seed block."
            );
            ambiguous[(i, j)] = true;
            continue;
        }

        let pair_transform = solution.transform.to_isometry();
        if let Some(reactant_frame) = reactant_frames[i] {
            product_frames[j] = Some(reactant_frame * pair_transform);
        } else if let Some(product_frame) = product_frames[j] {
            reactant_frames[i] = Some(product_frame * pair_transform.inverse());
        }
    }

    let placed = reactant_frames.iter().flatten().count() + product_frames.iter().flatten().count();
    debug!(placed, total = n + m, "Seeded group frames from pairwise solutions.");

    let mut transforms = vec![DualQuaternion::identity(); state.len()];
    for (j, frame) in product_frames.iter().enumerate() {
        if let Some(frame) = frame {
            transforms[state.product_slot(j)] = DualQuaternion::from_isometry(frame);
        }
    }
    for (i, frame) in reactant_frames.iter().enumerate() {
        if let (Some(slot), Some(frame)) = (state.reactant_slot(i), frame) {
            transforms[slot] = DualQuaternion::from_isometry(frame);
        }
    }
    transforms
}
