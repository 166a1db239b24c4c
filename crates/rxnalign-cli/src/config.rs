use crate::cli::ScoreArgs;
use crate::error::{CliError, Result};
use nalgebra::{DMatrix, Point3};
use rxnalign::core::models::atom::Atom;
use rxnalign::core::models::side::{Reaction, ReactionSide};
use rxnalign::core::topology::registry::BondLimitRegistry;
use rxnalign::engine::config::{AlignmentConfigBuilder, ScoringConfig, ScoringConfigBuilder};
use rxnalign::engine::error::EngineError;
use rxnalign::workflows::score::element_matches;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileAtom {
    pub element: String,
    pub sybyl: Option<String>,
    pub position: [f64; 3],
}

impl From<&FileAtom> for Atom {
    fn from(atom: &FileAtom) -> Self {
        let [x, y, z] = atom.position;
        let base = Atom::new(&atom.element, Point3::new(x, y, z));
        match &atom.sybyl {
            Some(sybyl) => base.with_sybyl_type(sybyl),
            None => base,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialAlignmentConfig {
    pub max_iterations: Option<usize>,
    pub inner_max_iterations: Option<usize>,
    pub objective_tolerance: Option<f64>,
    pub gradient_tolerance: Option<f64>,
    pub constraint_tolerance: Option<f64>,
    pub dual_bound: Option<f64>,
    pub rotation_bound: Option<f64>,
    pub degeneracy_tolerance: Option<f64>,
    pub min_block_weight: Option<f64>,
    pub allow_degenerate_rotation: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialScoringConfig {
    pub alignment_weight: Option<f64>,
    pub bond_weight: Option<f64>,
    pub sybyl_weight: Option<f64>,
    pub element_mismatch_penalty: Option<f64>,
}

/// A reaction problem as written in a TOML problem file.
///
/// Top-level keys (`reactant-groups`, `product-groups`, `match`, `bond-limits`) come before the
/// `[[reactants]]`/`[[products]]` atom tables. Missing groups are derived from connectivity and
/// a missing match matrix pairs atoms of equal element.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ProblemFile {
    pub reactants: Vec<FileAtom>,
    pub products: Vec<FileAtom>,
    pub reactant_groups: Option<Vec<Vec<usize>>>,
    pub product_groups: Option<Vec<Vec<usize>>>,
    #[serde(rename = "match")]
    pub match_matrix: Option<Vec<Vec<f64>>>,
    /// TOML file of bond-length limits overriding the built-in table for group detection.
    pub bond_limits: Option<PathBuf>,
    #[serde(default)]
    pub alignment: PartialAlignmentConfig,
    #[serde(default)]
    pub scoring: PartialScoringConfig,
}

impl ProblemFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading problem from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn to_reaction(&self) -> Result<Reaction> {
        let registry = match &self.bond_limits {
            Some(path) => {
                BondLimitRegistry::load(path).map_err(|e| CliError::FileParsing {
                    path: path.clone(),
                    source: e.into(),
                })?
            }
            None => BondLimitRegistry::default(),
        };
        let reactants = build_side(&self.reactants, self.reactant_groups.as_ref(), &registry)?;
        let products = build_side(&self.products, self.product_groups.as_ref(), &registry)?;
        debug!(
            reactant_groups = reactants.num_groups(),
            product_groups = products.num_groups(),
            "Reaction sides assembled."
        );
        Ok(Reaction::new(reactants, products))
    }

    pub fn match_matrix(&self, reaction: &Reaction) -> Result<DMatrix<f64>> {
        let Some(rows) = &self.match_matrix else {
            debug!("No match matrix given; pairing atoms of equal element.");
            return Ok(element_matches(reaction));
        };
        let (num_reactants, num_products) = reaction.shape();
        if rows.len() != num_reactants {
            return Err(CliError::Problem(format!(
                "match matrix has {} rows but there are {} reactant atoms",
                rows.len(),
                num_reactants
            )));
        }
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != num_products)
        {
            return Err(CliError::Problem(format!(
                "match matrix row {} has {} entries but there are {} product atoms",
                row,
                values.len(),
                num_products
            )));
        }
        Ok(DMatrix::from_fn(num_reactants, num_products, |a, i| {
            rows[a][i]
        }))
    }

    /// Resolves the scoring configuration: defaults, then the file, then command-line flags.
    pub fn scoring_config(&self, args: &ScoreArgs) -> Result<ScoringConfig> {
        let file = &self.alignment;
        let mut alignment = AlignmentConfigBuilder::new();
        if let Some(v) = args.max_iterations.or(file.max_iterations) {
            alignment = alignment.max_iterations(v);
        }
        if let Some(v) = file.inner_max_iterations {
            alignment = alignment.inner_max_iterations(v);
        }
        if let Some(v) = file.objective_tolerance {
            alignment = alignment.objective_tolerance(v);
        }
        if let Some(v) = args.tolerance.or(file.gradient_tolerance) {
            alignment = alignment.gradient_tolerance(v);
        }
        if let Some(v) = args.tolerance.or(file.constraint_tolerance) {
            alignment = alignment.constraint_tolerance(v);
        }
        if let Some(v) = file.dual_bound {
            alignment = alignment.dual_bound(v);
        }
        if let Some(v) = file.rotation_bound {
            alignment = alignment.rotation_bound(v);
        }
        if let Some(v) = file.degeneracy_tolerance {
            alignment = alignment.degeneracy_tolerance(v);
        }
        if let Some(v) = file.min_block_weight {
            alignment = alignment.min_block_weight(v);
        }
        let allow = args.allow_degenerate || file.allow_degenerate_rotation.unwrap_or(false);
        alignment = alignment.allow_degenerate_rotation(allow);
        let alignment = alignment.build().map_err(EngineError::from)?;

        let file = &self.scoring;
        let mut scoring = ScoringConfigBuilder::new().alignment(alignment);
        if let Some(v) = file.alignment_weight {
            scoring = scoring.alignment_weight(v);
        }
        if let Some(v) = file.bond_weight {
            scoring = scoring.bond_weight(v);
        }
        if let Some(v) = file.sybyl_weight {
            scoring = scoring.sybyl_weight(v);
        }
        if let Some(v) = file.element_mismatch_penalty {
            scoring = scoring.element_mismatch_penalty(v);
        }
        Ok(scoring.build().map_err(EngineError::from)?)
    }
}

fn build_side(
    atoms: &[FileAtom],
    groups: Option<&Vec<Vec<usize>>>,
    registry: &BondLimitRegistry,
) -> Result<ReactionSide> {
    let atoms: Vec<Atom> = atoms.iter().map(Atom::from).collect();
    match groups {
        Some(groups) => {
            Ok(ReactionSide::with_groups(atoms, groups.clone()).map_err(EngineError::from)?)
        }
        None => Ok(ReactionSide::from_atoms_with_registry(atoms, registry)),
    }
}
