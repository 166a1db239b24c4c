use super::{Objective, ScoringError, check_shape};
use crate::core::models::atom::Atom;
use crate::core::models::side::ReactionSide;
use crate::engine::config::ScoringConfig;
use nalgebra::DMatrix;

/// Penalizes pairing atoms of different elements or SYBYL types.
///
/// Independent of the match matrix, so the scores are computed once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicObjective {
    scores: DMatrix<f64>,
}

impl AtomicObjective {
    pub fn new(
        reactants: &ReactionSide,
        products: &ReactionSide,
        sybyl_weight: f64,
        element_mismatch_penalty: f64,
    ) -> Self {
        let scores = DMatrix::from_fn(reactants.len(), products.len(), |a, i| {
            pair_penalty(
                &reactants.atoms()[a],
                &products.atoms()[i],
                sybyl_weight,
                element_mismatch_penalty,
            )
        });
        Self { scores }
    }

    pub fn from_config(
        reactants: &ReactionSide,
        products: &ReactionSide,
        config: &ScoringConfig,
    ) -> Self {
        Self::new(
            reactants,
            products,
            config.sybyl_weight,
            config.element_mismatch_penalty,
        )
    }

    pub fn scores(&self) -> &DMatrix<f64> {
        &self.scores
    }
}

fn pair_penalty(reactant: &Atom, product: &Atom, sybyl_weight: f64, element_penalty: f64) -> f64 {
    let mut penalty = 0.0;
    if let (Some(a), Some(b)) = (&reactant.sybyl_type, &product.sybyl_type) {
        if a != b {
            penalty += sybyl_weight;
        }
    }
    if reactant.element != product.element {
        penalty += element_penalty;
    }
    penalty
}

impl Objective for AtomicObjective {
    fn name(&self) -> &'static str {
        "atomic"
    }

    fn score(&mut self, matches: &DMatrix<f64>) -> Result<DMatrix<f64>, ScoringError> {
        check_shape(self.name(), self.scores.shape(), matches)?;
        Ok(self.scores.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn side(atoms: Vec<Atom>) -> ReactionSide {
        let groups = vec![(0..atoms.len()).collect()];
        ReactionSide::new(atoms, vec![], groups).unwrap()
    }

    #[test]
    fn penalizes_element_and_type_mismatches() {
        let reactants = side(vec![
            Atom::new("C", Point3::origin()).with_sybyl_type("C.3"),
            Atom::new("O", Point3::origin()).with_sybyl_type("O.3"),
        ]);
        let products = side(vec![
            Atom::new("C", Point3::origin()).with_sybyl_type("C.2"),
            Atom::new("O", Point3::origin()),
            Atom::new("C", Point3::origin()).with_sybyl_type("C.3"),
        ]);

        let mut objective = AtomicObjective::new(&reactants, &products, 0.5, 1e6);
        let scores = objective.score(&DMatrix::zeros(2, 3)).unwrap();

        assert_eq!(scores[(0, 0)], 0.5);
        assert_eq!(scores[(0, 2)], 0.0);
        assert_eq!(scores[(0, 1)], 1e6);
        // Untyped atoms only compare by element.
        assert_eq!(scores[(1, 1)], 0.0);
        assert_eq!(scores[(1, 0)], 1e6 + 0.5);
    }

    #[test]
    fn default_configuration_forbids_element_changes() {
        let reactants = side(vec![Atom::new("N", Point3::origin())]);
        let products = side(vec![Atom::new("n", Point3::origin()), Atom::new("S", Point3::origin())]);

        let objective = AtomicObjective::from_config(&reactants, &products, &ScoringConfig::default());
        assert_eq!(objective.scores()[(0, 0)], 0.0);
        assert_eq!(objective.scores()[(0, 1)], 1e300);
    }

    #[test]
    fn rejects_mismatched_match_matrix() {
        let reactants = side(vec![Atom::new("C", Point3::origin())]);
        let products = side(vec![Atom::new("C", Point3::origin())]);
        let mut objective = AtomicObjective::new(&reactants, &products, 1.0, 1.0);
        assert!(matches!(
            objective.score(&DMatrix::zeros(2, 1)),
            Err(ScoringError::ShapeMismatch { objective: "atomic", .. })
        ));
    }
}
