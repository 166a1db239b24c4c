use crate::core::models::side::Reaction;
use crate::engine::alignment::AlignmentScorer;
use crate::engine::config::ScoringConfig;
use crate::engine::error::EngineError;
use crate::engine::objectives::atomic::AtomicObjective;
use crate::engine::objectives::bond::BondObjective;
use crate::engine::objectives::{CombinedObjective, Component};
use nalgebra::DMatrix;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    /// Weighted sum of all components.
    pub combined: DMatrix<f64>,
    /// Unweighted score of each objective, in evaluation order.
    pub components: Vec<Component>,
}

impl ScoreReport {
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[instrument(skip_all, name = "score_workflow", fields(shape = ?reaction.shape()))]
pub fn run(
    reaction: &Reaction,
    matches: &DMatrix<f64>,
    config: &ScoringConfig,
) -> Result<ScoreReport, EngineError> {
    info!("Building objectives.");
    let alignment = AlignmentScorer::new(
        &reaction.reactants,
        &reaction.products,
        config.alignment.clone(),
    )?;
    let mut objectives = CombinedObjective::new()
        .with(
            1.0,
            AtomicObjective::from_config(&reaction.reactants, &reaction.products, config),
        )
        .with(
            config.bond_weight,
            BondObjective::new(&reaction.reactants, &reaction.products),
        )
        .with(config.alignment_weight, alignment);

    let components = objectives.score_components(matches)?;
    let combined = CombinedObjective::combine(matches.shape(), &components);

    info!(
        objectives = ?objectives.names(),
        "Scoring complete."
    );
    Ok(ScoreReport {
        combined,
        components,
    })
}

/// A match matrix that pairs every reactant atom with every product atom of the same element.
pub fn element_matches(reaction: &Reaction) -> DMatrix<f64> {
    let (reactants, products) = (reaction.reactants.atoms(), reaction.products.atoms());
    DMatrix::from_fn(reactants.len(), products.len(), |a, i| {
        if reactants[a].element == products[i].element {
            1.0
        } else {
            0.0
        }
    })
}
