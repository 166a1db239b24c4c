//! Closed-form rigid alignment of one reactant group onto one product group.
//!
//! The optimal rotation quaternion maximizes `r^T A r` over unit `r`, so it is the eigenvector
//! of the largest eigenvalue of the symmetric 4x4 system `A`; the dual part follows as
//! `s = -C3 r / (2 C2)`.

use super::interaction::AtomInteractions;
use crate::core::utils::quaternion::DualQuaternion;
use crate::engine::config::AlignmentConfig;
use crate::engine::error::AlignmentError;
use nalgebra::{DMatrix, SymmetricEigen, Vector4};
use tracing::warn;

/// Relative asymmetry of the system matrix above which the block sums are considered corrupt.
const SYMMETRY_TOLERANCE: f64 = 1e-9;
/// Eigenvalue spread, relative to the size of the block sums, below which the system is a
/// multiple of the identity.
const SPREAD_TOLERANCE: f64 = 1e-12;

/// A group pair identified by the index of each group on its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPair {
    pub reactant_group: usize,
    pub product_group: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockSolution {
    /// Maps the product group onto the reactant group.
    pub transform: DualQuaternion,
    /// Gap between the two largest eigenvalues, relative to the spread between the largest and
    /// the smallest. Moving both groups by a common offset only shifts every eigenvalue by the
    /// same amount, so the ratio does not depend on where the origin is.
    pub eigenvalue_gap: f64,
    pub total_weight: f64,
}

impl BlockSolution {
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        self.eigenvalue_gap <= tolerance
    }
}

pub fn solve_block(
    interactions: &AtomInteractions,
    pair: GroupPair,
    reactant_atoms: &[usize],
    product_atoms: &[usize],
    matches: &DMatrix<f64>,
    config: &AlignmentConfig,
) -> Result<BlockSolution, AlignmentError> {
    let terms = interactions.block_terms(reactant_atoms, product_atoms, matches);
    if terms.c2 <= config.min_block_weight {
        return Err(AlignmentError::IllPosedBlock {
            reactant_group: pair.reactant_group,
            product_group: pair.product_group,
            total_weight: terms.c2,
        });
    }

    let raw = terms.system_matrix();
    let scale = raw.amax().max(terms.magnitude).max(f64::MIN_POSITIVE);
    let asymmetry = (raw - raw.transpose()).amax() / scale;
    if asymmetry > SYMMETRY_TOLERANCE {
        return Err(AlignmentError::AsymmetricSystem {
            reactant_group: pair.reactant_group,
            product_group: pair.product_group,
            asymmetry,
        });
    }
    let system = (raw + raw.transpose()) * 0.5;

    let eigen = SymmetricEigen::new(system);
    let mut order = [0usize, 1, 2, 3];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let largest = eigen.eigenvalues[order[0]];
    let second = eigen.eigenvalues[order[1]];
    let spread = largest - eigen.eigenvalues[order[3]];
    let eigenvalue_gap = if spread > SPREAD_TOLERANCE * scale {
        (largest - second) / spread
    } else {
        0.0
    };

    let r: Vector4<f64> = eigen.eigenvectors.column(order[0]).normalize();
    let s = -(terms.c3 * r) / (2.0 * terms.c2);

    Ok(BlockSolution {
        transform: DualQuaternion::new(s, r).canonicalized(),
        eigenvalue_gap,
        total_weight: terms.c2,
    })
}

/// Rejects an ambiguous rotation unless the configuration tolerates it.
pub fn check_degeneracy(
    solution: &BlockSolution,
    pair: GroupPair,
    config: &AlignmentConfig,
) -> Result<(), AlignmentError> {
    if !solution.is_degenerate(config.degeneracy_tolerance) {
        return Ok(());
    }
    if config.allow_degenerate_rotation {
        warn!(
            reactant_group = pair.reactant_group,
            product_group = pair.product_group,
            gap = solution.eigenvalue_gap,
            "Accepting an ambiguous rotation; the largest eigenvalue is not simple."
        );
        return Ok(());
    }
    Err(AlignmentError::DegenerateRotation {
        reactant_group: pair.reactant_group,
        product_group: pair.product_group,
        gap: solution.eigenvalue_gap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::{centroid, rigid_transform};
    use nalgebra::{Point3, Vector3};

    const PAIR: GroupPair = GroupPair {
        reactant_group: 0,
        product_group: 0,
    };

    fn triangle() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(0.4, 1.1, 0.3),
        ]
    }

    fn diagonal_dominant(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.1 })
    }

    #[test]
    fn recovers_a_known_rigid_transform() {
        let reactants = triangle();
        let known = rigid_transform(&Vector3::z(), 90.0, &Vector3::new(1.0, 0.0, 0.0));
        let products: Vec<_> = reactants.iter().map(|p| known * p).collect();
        let interactions = AtomInteractions::new(&reactants, &products);

        let solution = solve_block(
            &interactions,
            PAIR,
            &[0, 1, 2],
            &[0, 1, 2],
            &diagonal_dominant(3),
            &AlignmentConfig::default(),
        )
        .unwrap();

        let recovered = solution.transform.to_isometry();
        let expected = known.inverse();
        assert!(recovered.rotation.angle_to(&expected.rotation) < 1e-6);
        assert!((recovered.translation.vector - expected.translation.vector).norm() < 1e-6);
        for (y, x) in reactants.iter().zip(&products) {
            assert!((solution.transform.apply(x) - y).norm() < 1e-6);
        }
        assert!(solution.transform.norm_residual().abs() < 1e-6);
        assert!(solution.transform.orthogonality_residual().abs() < 1e-6);
        assert!(!solution.is_degenerate(1e-9));
    }

    #[test]
    fn zero_weight_block_is_ill_posed() {
        let points = triangle();
        let interactions = AtomInteractions::new(&points, &points);
        let result = solve_block(
            &interactions,
            GroupPair {
                reactant_group: 2,
                product_group: 1,
            },
            &[0, 1, 2],
            &[0, 1, 2],
            &DMatrix::zeros(3, 3),
            &AlignmentConfig::default(),
        );
        assert!(matches!(
            result,
            Err(AlignmentError::IllPosedBlock {
                reactant_group: 2,
                product_group: 1,
                ..
            })
        ));
    }

    #[test]
    fn uniform_weights_leave_the_rotation_ambiguous() {
        let reactants = triangle();
        let known = rigid_transform(&Vector3::z(), 90.0, &Vector3::new(1.0, 0.0, 0.0));
        let products: Vec<_> = reactants.iter().map(|p| known * p).collect();
        let interactions = AtomInteractions::new(&reactants, &products);
        let config = AlignmentConfig::default();

        let solution = solve_block(
            &interactions,
            PAIR,
            &[0, 1, 2],
            &[0, 1, 2],
            &DMatrix::from_element(3, 3, 1.0),
            &config,
        )
        .unwrap();

        assert!(solution.is_degenerate(config.degeneracy_tolerance));
        assert!(matches!(
            check_degeneracy(&solution, PAIR, &config),
            Err(AlignmentError::DegenerateRotation { .. })
        ));

        let tolerant = AlignmentConfig {
            allow_degenerate_rotation: true,
            ..AlignmentConfig::default()
        };
        assert!(check_degeneracy(&solution, PAIR, &tolerant).is_ok());
        // Whatever the rotation, the centroids coincide.
        let (rotation, translation) = solution.transform.to_rigid_transform();
        let centroid_x = centroid(&products).unwrap().coords;
        let centroid_y = centroid(&reactants).unwrap().coords;
        assert!((rotation * centroid_x + translation - centroid_y).norm() < 1e-9);
    }

    #[test]
    fn eigenvalue_gap_does_not_depend_on_the_origin() {
        let flat = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(0.7, 0.3, 0.0),
        ];
        let known = rigid_transform(&Vector3::x(), 35.0, &Vector3::new(0.2, -0.4, 0.9));
        let config = AlignmentConfig::default();

        let solve_at = |offset: f64| {
            let shift = Vector3::new(offset, -0.5 * offset, 0.25 * offset);
            let reactants: Vec<_> = flat.iter().map(|p| p + shift).collect();
            let products: Vec<_> = flat.iter().map(|p| known * p + shift).collect();
            let interactions = AtomInteractions::new(&reactants, &products);
            let solution = solve_block(
                &interactions,
                PAIR,
                &[0, 1, 2],
                &[0, 1, 2],
                &DMatrix::identity(3, 3),
                &config,
            )
            .unwrap();
            for (y, x) in reactants.iter().zip(&products) {
                assert!((solution.transform.apply(x) - y).norm() < 1e-5);
            }
            solution
        };

        let reference = solve_at(0.0);
        assert!(!reference.is_degenerate(config.degeneracy_tolerance));
        for offset in [1e2, 1e3] {
            let shifted = solve_at(offset);
            assert!((shifted.eigenvalue_gap - reference.eigenvalue_gap).abs() < 1e-6);
            assert_eq!(
                shifted.is_degenerate(config.degeneracy_tolerance),
                reference.is_degenerate(config.degeneracy_tolerance)
            );
        }
    }

    #[test]
    fn rotation_is_canonicalized_to_non_negative_scalar_part() {
        let reactants = triangle();
        let known = rigid_transform(&Vector3::new(1.0, 1.0, 0.0), 200.0, &Vector3::zeros());
        let products: Vec<_> = reactants.iter().map(|p| known * p).collect();
        let interactions = AtomInteractions::new(&reactants, &products);

        let solution = solve_block(
            &interactions,
            PAIR,
            &[0, 1, 2],
            &[0, 1, 2],
            &DMatrix::identity(3, 3),
            &AlignmentConfig::default(),
        )
        .unwrap();
        assert!(solution.transform.r[3] >= 0.0);
    }
}
