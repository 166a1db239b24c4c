use super::atom::Atom;
use super::topology::Bond;
use crate::core::topology::connectivity;
use crate::core::topology::registry::BondLimitRegistry;
use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ModelError {
    #[error("Atom index {index} is out of range for a side with {num_atoms} atoms")]
    AtomIndexOutOfRange { index: usize, num_atoms: usize },

    #[error("Atom {atom} is assigned to more than one rigid group")]
    DuplicateGroupMember { atom: usize },

    #[error("Atom {atom} is not assigned to any rigid group")]
    UngroupedAtom { atom: usize },

    #[error("Rigid group {group} is empty")]
    EmptyGroup { group: usize },

    #[error("Bond ({atom1}, {atom2}) connects an atom to itself")]
    SelfBond { atom1: usize, atom2: usize },
}

/// One side (reactants or products) of a reaction.
///
/// The atoms are partitioned into rigid groups: disjoint index sets, covering every atom, whose
/// members move together under a single rigid transform during alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionSide {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    groups: Vec<Vec<usize>>,
}

impl ReactionSide {
    /// Creates a side from explicit bonds and rigid groups, validating both.
    pub fn new(
        atoms: Vec<Atom>,
        bonds: Vec<Bond>,
        groups: Vec<Vec<usize>>,
    ) -> Result<Self, ModelError> {
        let num_atoms = atoms.len();
        for bond in &bonds {
            if bond.atom1 == bond.atom2 {
                return Err(ModelError::SelfBond {
                    atom1: bond.atom1,
                    atom2: bond.atom2,
                });
            }
            if bond.atom2 >= num_atoms {
                return Err(ModelError::AtomIndexOutOfRange {
                    index: bond.atom2,
                    num_atoms,
                });
            }
        }
        validate_partition(num_atoms, &groups)?;
        Ok(Self {
            atoms,
            bonds,
            groups,
        })
    }

    /// Infers bonds with the built-in bond-length table and uses the connected components of the
    /// resulting bond graph as rigid groups.
    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        Self::from_atoms_with_registry(atoms, &BondLimitRegistry::default())
    }

    pub fn from_atoms_with_registry(atoms: Vec<Atom>, registry: &BondLimitRegistry) -> Self {
        let bonds = connectivity::infer_bonds(&atoms, registry);
        let groups = connectivity::connected_components(atoms.len(), &bonds);
        Self {
            atoms,
            bonds,
            groups,
        }
    }

    /// Infers bonds from distances but keeps a caller-supplied group partition.
    pub fn with_groups(atoms: Vec<Atom>, groups: Vec<Vec<usize>>) -> Result<Self, ModelError> {
        let bonds = connectivity::infer_bonds(&atoms, &BondLimitRegistry::default());
        Self::new(atoms, bonds, groups)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|atom| atom.position).collect()
    }

    /// Indices of the atoms bonded to `atom`.
    pub fn neighbors(&self, atom: usize) -> Vec<usize> {
        self.bonds
            .iter()
            .filter_map(|bond| bond.partner(atom))
            .collect()
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.bonds.iter().filter(|bond| bond.contains(atom)).count()
    }
}

/// Checks that `groups` is a partition of `0..num_atoms` into non-empty sets.
pub fn validate_partition(num_atoms: usize, groups: &[Vec<usize>]) -> Result<(), ModelError> {
    let mut seen = vec![false; num_atoms];
    for (group_idx, group) in groups.iter().enumerate() {
        if group.is_empty() {
            return Err(ModelError::EmptyGroup { group: group_idx });
        }
        for &atom in group {
            if atom >= num_atoms {
                return Err(ModelError::AtomIndexOutOfRange {
                    index: atom,
                    num_atoms,
                });
            }
            if seen[atom] {
                return Err(ModelError::DuplicateGroupMember { atom });
            }
            seen[atom] = true;
        }
    }
    match seen.iter().position(|&covered| !covered) {
        Some(atom) => Err(ModelError::UngroupedAtom { atom }),
        None => Ok(()),
    }
}

/// The reactant and product sides of one transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub reactants: ReactionSide,
    pub products: ReactionSide,
}

impl Reaction {
    pub fn new(reactants: ReactionSide, products: ReactionSide) -> Self {
        Self {
            reactants,
            products,
        }
    }

    /// Shape of every reactant-by-product matrix for this reaction.
    pub fn shape(&self) -> (usize, usize) {
        (self.reactants.len(), self.products.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methanol_and_chloride() -> Vec<Atom> {
        vec![
            Atom::new("C", Point3::new(0.0, 0.0, 0.0)),
            Atom::new("O", Point3::new(1.43, 0.0, 0.0)),
            Atom::new("H", Point3::new(1.75, 0.9, 0.0)),
            Atom::new("Cl", Point3::new(8.0, 0.0, 0.0)),
        ]
    }

    #[test]
    fn from_atoms_groups_connected_components() {
        let side = ReactionSide::from_atoms(methanol_and_chloride());

        assert_eq!(side.len(), 4);
        assert_eq!(side.num_groups(), 2);
        assert_eq!(side.groups().to_vec(), vec![vec![0usize, 1, 2], vec![3]]);
        assert_eq!(side.degree(1), 2);
        assert_eq!(side.neighbors(0), vec![1]);
    }

    #[test]
    fn new_accepts_valid_partition() {
        let side = ReactionSide::new(
            methanol_and_chloride(),
            vec![Bond::new(0, 1)],
            vec![vec![0, 1], vec![2, 3]],
        )
        .unwrap();
        assert_eq!(side.num_groups(), 2);
        assert_eq!(side.positions()[1], Point3::new(1.43, 0.0, 0.0));
    }

    #[test]
    fn new_rejects_duplicate_member() {
        let result = ReactionSide::new(
            methanol_and_chloride(),
            vec![],
            vec![vec![0, 1], vec![1, 2, 3]],
        );
        assert_eq!(result, Err(ModelError::DuplicateGroupMember { atom: 1 }));
    }

    #[test]
    fn new_rejects_uncovered_atom() {
        let result = ReactionSide::new(methanol_and_chloride(), vec![], vec![vec![0, 1, 2]]);
        assert_eq!(result, Err(ModelError::UngroupedAtom { atom: 3 }));
    }

    #[test]
    fn new_rejects_empty_group_and_bad_indices() {
        let atoms = methanol_and_chloride();
        assert_eq!(
            ReactionSide::new(atoms.clone(), vec![], vec![vec![0, 1, 2, 3], vec![]]),
            Err(ModelError::EmptyGroup { group: 1 })
        );
        assert_eq!(
            ReactionSide::new(atoms.clone(), vec![], vec![vec![0, 1, 2, 3, 4]]),
            Err(ModelError::AtomIndexOutOfRange {
                index: 4,
                num_atoms: 4
            })
        );
        assert_eq!(
            ReactionSide::new(atoms, vec![Bond::new(2, 2)], vec![vec![0, 1, 2, 3]]),
            Err(ModelError::SelfBond { atom1: 2, atom2: 2 })
        );
    }

    #[test]
    fn reaction_shape_is_reactants_by_products() {
        let reactants = ReactionSide::from_atoms(methanol_and_chloride());
        let products = ReactionSide::from_atoms(methanol_and_chloride()[..3].to_vec());
        let reaction = Reaction::new(reactants, products);
        assert_eq!(reaction.shape(), (4, 3));
    }
}
