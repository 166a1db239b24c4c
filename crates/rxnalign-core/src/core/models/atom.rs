use nalgebra::Point3;

/// Represents an atom on one side of a reaction.
///
/// The element symbol is stored in canonical capitalization (`"C"`, `"Cl"`), so that two atoms
/// can be compared for elemental compatibility with a plain string comparison. The SYBYL type is
/// optional because coordinate-only inputs do not carry one.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The element symbol (e.g., "C", "Cl").
    pub element: String,
    /// The SYBYL atom type (e.g., "C.3", "N.ar"), if known.
    pub sybyl_type: Option<String>,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    /// Creates a new `Atom` without a SYBYL type.
    ///
    /// # Arguments
    ///
    /// * `element` - The element symbol, in any capitalization.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(element: &str, position: Point3<f64>) -> Self {
        Self {
            element: normalize_element_symbol(element),
            sybyl_type: None,
            position,
        }
    }

    /// Attaches a SYBYL type to the atom.
    pub fn with_sybyl_type(mut self, sybyl_type: &str) -> Self {
        self.sybyl_type = Some(sybyl_type.to_string());
        self
    }
}

/// Converts an element symbol to its canonical capitalization ("CL" -> "Cl").
pub fn normalize_element_symbol(symbol: &str) -> String {
    let trimmed = symbol.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let atom = Atom::new("C", Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.element, "C");
        assert_eq!(atom.sybyl_type, None);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn element_symbols_are_normalized() {
        assert_eq!(Atom::new("CL", Point3::origin()).element, "Cl");
        assert_eq!(Atom::new(" br ", Point3::origin()).element, "Br");
        assert_eq!(Atom::new("o", Point3::origin()).element, "O");
        assert_eq!(normalize_element_symbol(""), "");
    }

    #[test]
    fn sybyl_type_is_attached() {
        let atom = Atom::new("N", Point3::origin()).with_sybyl_type("N.ar");
        assert_eq!(atom.sybyl_type.as_deref(), Some("N.ar"));
    }

    #[test]
    fn atom_equality_and_clone_works() {
        let atom1 = Atom::new("S", Point3::new(0.5, 0.0, -1.0)).with_sybyl_type("S.3");
        let atom2 = atom1.clone();
        assert_eq!(atom1, atom2);
    }
}
