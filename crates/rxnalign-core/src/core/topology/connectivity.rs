use super::registry::BondLimitRegistry;
use crate::core::models::atom::Atom;
use crate::core::models::topology::Bond;

/// Infers bonds from interatomic distances.
///
/// Two atoms are bonded when their element pair has tabulated limits and their distance lies
/// inside the outer window of those limits. Pairs without limits never bond.
pub fn infer_bonds(atoms: &[Atom], registry: &BondLimitRegistry) -> Vec<Bond> {
    let mut bonds = Vec::new();
    for i in 0..atoms.len() {
        for j in (i + 1)..atoms.len() {
            let Some(limits) = registry.get(&atoms[i].element, &atoms[j].element) else {
                continue;
            };
            let distance = (atoms[i].position - atoms[j].position).norm();
            if limits.admits(distance) {
                bonds.push(Bond::new(i, j));
            }
        }
    }
    bonds
}

/// Partitions `num_atoms` atoms into the connected components of the bond graph.
///
/// Components are returned with sorted members, ordered by their smallest atom index. Atoms
/// without bonds form singleton components.
pub fn connected_components(num_atoms: usize, bonds: &[Bond]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..num_atoms).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for bond in bonds {
        if bond.atom2 >= num_atoms {
            continue;
        }
        let a = find(&mut parent, bond.atom1);
        let b = find(&mut parent, bond.atom2);
        if a != b {
            parent[a.max(b)] = a.min(b);
        }
    }

    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut component_of_root = vec![usize::MAX; num_atoms];
    for atom in 0..num_atoms {
        let root = find(&mut parent, atom);
        if component_of_root[root] == usize::MAX {
            component_of_root[root] = components.len();
            components.push(Vec::new());
        }
        components[component_of_root[root]].push(atom);
    }
    components
}
