use super::{Objective, ScoringError, check_shape};
use crate::core::models::side::ReactionSide;
use nalgebra::DMatrix;

/// Penalizes pairings whose bonds cannot be carried over under the current match matrix.
///
/// For reactant atom `a` and product atom `i` the score is
/// `max(deg a, deg i) - sum_{b, j} M[b, j] C[a, i, b, j]`, clamped at zero, where
/// `C[a, i, b, j] = 1` when `a-b` is a reactant bond, `i-j` is a product bond and both bonds join
/// the same unordered pair of elements. A pairing whose bonds are all matched scores zero.
#[derive(Debug, Clone, PartialEq)]
pub struct BondObjective {
    required: DMatrix<f64>,
    /// Compatible neighbor pairs `(b, j)` for each `(a, i)`, row-major by reactant atom.
    neighbor_pairs: Vec<Vec<(usize, usize)>>,
}

impl BondObjective {
    pub fn new(reactants: &ReactionSide, products: &ReactionSide) -> Self {
        let (n, m) = (reactants.len(), products.len());
        let required = DMatrix::from_fn(n, m, |a, i| {
            reactants.degree(a).max(products.degree(i)) as f64
        });

        let element = |side: &ReactionSide, atom: usize| side.atoms()[atom].element.clone();
        let mut neighbor_pairs = vec![Vec::new(); n * m];
        for reactant_bond in reactants.bonds() {
            for product_bond in products.bonds() {
                for (a, b) in [
                    (reactant_bond.atom1, reactant_bond.atom2),
                    (reactant_bond.atom2, reactant_bond.atom1),
                ] {
                    for (i, j) in [
                        (product_bond.atom1, product_bond.atom2),
                        (product_bond.atom2, product_bond.atom1),
                    ] {
                        let same_pair = (element(reactants, a), element(reactants, b))
                            == (element(products, i), element(products, j))
                            || (element(reactants, a), element(reactants, b))
                                == (element(products, j), element(products, i));
                        if same_pair {
                            neighbor_pairs[a * m + i].push((b, j));
                        }
                    }
                }
            }
        }

        Self {
            required,
            neighbor_pairs,
        }
    }
}

impl Objective for BondObjective {
    fn name(&self) -> &'static str {
        "bond"
    }

    fn score(&mut self, matches: &DMatrix<f64>) -> Result<DMatrix<f64>, ScoringError> {
        check_shape(self.name(), self.required.shape(), matches)?;
        let m = self.required.ncols();
        Ok(DMatrix::from_fn(self.required.nrows(), m, |a, i| {
            let carried: f64 = self.neighbor_pairs[a * m + i]
                .iter()
                .map(|&(b, j)| matches[(b, j)])
                .sum();
            (self.required[(a, i)] - carried).max(0.0)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::topology::Bond;
    use nalgebra::Point3;

    /// C-O-H on both sides, with the product atoms listed in reverse.
    fn hydroxyl() -> (ReactionSide, ReactionSide) {
        let atoms = |elements: [&str; 3]| -> Vec<Atom> {
            elements
                .iter()
                .map(|e| Atom::new(e, Point3::origin()))
                .collect()
        };
        let reactants = ReactionSide::new(
            atoms(["C", "O", "H"]),
            vec![Bond::new(0, 1), Bond::new(1, 2)],
            vec![vec![0, 1, 2]],
        )
        .unwrap();
        let products = ReactionSide::new(
            atoms(["H", "O", "C"]),
            vec![Bond::new(2, 1), Bond::new(1, 0)],
            vec![vec![0, 1, 2]],
        )
        .unwrap();
        (reactants, products)
    }

    fn reversal() -> DMatrix<f64> {
        DMatrix::from_fn(3, 3, |a, i| if a + i == 2 { 1.0 } else { 0.0 })
    }

    #[test]
    fn correct_mapping_keeps_every_bond() {
        let (reactants, products) = hydroxyl();
        let mut objective = BondObjective::new(&reactants, &products);
        let scores = objective.score(&reversal()).unwrap();

        assert_eq!(scores[(0, 2)], 0.0);
        assert_eq!(scores[(1, 1)], 0.0);
        assert_eq!(scores[(2, 0)], 0.0);
    }

    #[test]
    fn wrong_mapping_loses_bonds() {
        let (reactants, products) = hydroxyl();
        let mut objective = BondObjective::new(&reactants, &products);
        let scores = objective.score(&DMatrix::identity(3, 3)).unwrap();

        // Mapping the oxygen onto itself still needs both neighbors carried over, but the
        // identity pairs C with H.
        assert_eq!(scores[(1, 1)], 2.0);
        assert_eq!(scores[(0, 0)], 1.0);
    }

    #[test]
    fn only_element_compatible_neighbors_carry_bonds() {
        let (reactants, products) = hydroxyl();
        let mut objective = BondObjective::new(&reactants, &products);

        // O with O: pairing the carbon neighbors carries the C-O bond, a C paired with an H
        // carries nothing.
        let mut matches = DMatrix::zeros(3, 3);
        matches[(0, 0)] = 1.0;
        assert_eq!(objective.score(&matches).unwrap()[(1, 1)], 2.0);
        matches[(0, 2)] = 1.0;
        assert_eq!(objective.score(&matches).unwrap()[(1, 1)], 1.0);
    }

    #[test]
    fn unmatched_atoms_score_their_degree() {
        let (reactants, products) = hydroxyl();
        let mut objective = BondObjective::new(&reactants, &products);
        let scores = objective.score(&DMatrix::zeros(3, 3)).unwrap();

        assert_eq!(scores[(1, 1)], 2.0);
        assert_eq!(scores[(2, 0)], 1.0);
        assert_eq!(scores[(0, 1)], 2.0);
    }
}
