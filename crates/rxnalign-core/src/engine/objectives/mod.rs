//! Score matrices whose weighted sum is the cost of a candidate atom correspondence.
//!
//! Every objective maps the current reactant-by-product match matrix to a score matrix of the
//! same shape in which lower is better and a perfect correspondence scores zero.

pub mod atomic;
pub mod bond;

use super::alignment::AlignmentScorer;
use super::error::AlignmentError;
use nalgebra::DMatrix;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Alignment objective failed: {source}")]
    Alignment {
        #[from]
        source: AlignmentError,
    },

    #[error("Objective '{objective}' expected a {expected:?} matrix but got {found:?}")]
    ShapeMismatch {
        objective: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("No objectives to combine")]
    Empty,
}

pub trait Objective {
    fn name(&self) -> &'static str;

    fn score(&mut self, matches: &DMatrix<f64>) -> Result<DMatrix<f64>, ScoringError>;
}

pub(crate) fn check_shape(
    objective: &'static str,
    expected: (usize, usize),
    matrix: &DMatrix<f64>,
) -> Result<(), ScoringError> {
    if matrix.shape() == expected {
        Ok(())
    } else {
        Err(ScoringError::ShapeMismatch {
            objective,
            expected,
            found: matrix.shape(),
        })
    }
}

impl Objective for AlignmentScorer {
    fn name(&self) -> &'static str {
        "alignment"
    }

    fn score(&mut self, matches: &DMatrix<f64>) -> Result<DMatrix<f64>, ScoringError> {
        Ok(AlignmentScorer::score(self, matches)?.clone())
    }
}

/// One objective's unweighted score matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: &'static str,
    pub weight: f64,
    pub scores: DMatrix<f64>,
}

/// A weighted sum of objectives.
#[derive(Default)]
pub struct CombinedObjective {
    terms: Vec<(f64, Box<dyn Objective>)>,
}

impl CombinedObjective {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, weight: f64, objective: impl Objective + 'static) -> Self {
        self.push(weight, Box::new(objective));
        self
    }

    pub fn push(&mut self, weight: f64, objective: Box<dyn Objective>) {
        self.terms.push((weight, objective));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.terms.iter().map(|(_, objective)| objective.name()).collect()
    }

    /// Evaluates every objective; stops at the first failure.
    pub fn score_components(
        &mut self,
        matches: &DMatrix<f64>,
    ) -> Result<Vec<Component>, ScoringError> {
        if self.terms.is_empty() {
            return Err(ScoringError::Empty);
        }
        self.terms
            .iter_mut()
            .map(|(weight, objective)| {
                let scores = objective.score(matches)?;
                check_shape(objective.name(), matches.shape(), &scores)?;
                Ok(Component {
                    name: objective.name(),
                    weight: *weight,
                    scores,
                })
            })
            .collect()
    }

    /// `sum weight * scores`; terms with zero weight are skipped so that infinite penalties
    /// they may hold do not turn into NaN.
    pub fn combine(shape: (usize, usize), components: &[Component]) -> DMatrix<f64> {
        let mut total = DMatrix::zeros(shape.0, shape.1);
        for component in components.iter().filter(|c| c.weight != 0.0) {
            total += &component.scores * component.weight;
        }
        total
    }
}

impl Objective for CombinedObjective {
    fn name(&self) -> &'static str {
        "combined"
    }

    fn score(&mut self, matches: &DMatrix<f64>) -> Result<DMatrix<f64>, ScoringError> {
        let components = self.score_components(matches)?;
        Ok(Self::combine(matches.shape(), &components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant {
        value: f64,
        shape: (usize, usize),
    }

    impl Objective for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }
        fn score(&mut self, _: &DMatrix<f64>) -> Result<DMatrix<f64>, ScoringError> {
            Ok(DMatrix::from_element(self.shape.0, self.shape.1, self.value))
        }
    }

    #[test]
    fn combined_objective_sums_weighted_components() {
        let mut combined = CombinedObjective::new()
            .with(2.0, Constant { value: 1.5, shape: (2, 3) })
            .with(0.5, Constant { value: 4.0, shape: (2, 3) });

        let total = combined.score(&DMatrix::zeros(2, 3)).unwrap();
        assert_eq!(combined.len(), 2);
        assert!(total.iter().all(|v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn zero_weight_terms_are_skipped() {
        let mut combined = CombinedObjective::new()
            .with(0.0, Constant { value: f64::INFINITY, shape: (1, 1) })
            .with(1.0, Constant { value: 3.0, shape: (1, 1) });

        let total = combined.score(&DMatrix::zeros(1, 1)).unwrap();
        assert_eq!(total[(0, 0)], 3.0);
    }

    #[test]
    fn mismatched_component_shapes_fail_fast() {
        let mut combined =
            CombinedObjective::new().with(1.0, Constant { value: 1.0, shape: (3, 2) });
        assert!(matches!(
            combined.score(&DMatrix::zeros(2, 3)),
            Err(ScoringError::ShapeMismatch {
                objective: "constant",
                expected: (2, 3),
                found: (3, 2),
            })
        ));
    }

    #[test]
    fn empty_combination_is_an_error() {
        let mut combined = CombinedObjective::new();
        assert_eq!(
            combined.score(&DMatrix::zeros(1, 1)),
            Err(ScoringError::Empty)
        );
    }
}
