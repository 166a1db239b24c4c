//! Static bond-length limits for the elements commonly found in organic
//! reactions.
//!
//! The limits come from a survey of the CCDC 2016 database. Hydrogen bond lengths were taken from
//! neutron diffraction data, which contains few S-H contacts, so the S-H entry is an estimate.

use phf::phf_map;
use serde::Deserialize;

/// Distance limits (Angstrom) for a bond between two elements.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BondLimits {
    pub loose_lower: f64,
    pub lower: f64,
    pub loose_upper: f64,
    pub upper: f64,
}

impl BondLimits {
    const fn new(loose_lower: f64, lower: f64, loose_upper: f64, upper: f64) -> Self {
        Self {
            loose_lower,
            lower,
            loose_upper,
            upper,
        }
    }

    /// Whether `distance` lies inside the outer (`loose_lower`, `upper`) window.
    pub fn admits(&self, distance: f64) -> bool {
        distance >= self.loose_lower && distance <= self.upper
    }
}

static BOND_LIMITS: phf::Map<&'static str, BondLimits> = phf_map! {
    "As-As" => BondLimits::new(2.20, 2.30, 2.65, 2.80),
    "As-Br" => BondLimits::new(2.20, 2.30, 3.30, 3.40),
    "As-Cl" => BondLimits::new(2.10, 2.15, 2.40, 3.30),
    "As-C" => BondLimits::new(1.75, 1.80, 2.10, 2.20),
    "As-F" => BondLimits::new(1.50, 1.60, 1.80, 2.10),
    "As-I" => BondLimits::new(2.30, 2.40, 3.70, 3.80),
    "As-N" => BondLimits::new(1.60, 1.70, 2.05, 2.70),
    "As-O" => BondLimits::new(1.40, 1.60, 2.00, 2.30),
    "As-P" => BondLimits::new(2.10, 2.20, 2.40, 2.60),
    "As-S" => BondLimits::new(1.90, 2.00, 2.40, 3.10),
    "Br-Br" => BondLimits::new(2.20, 2.20, 2.80, 4.00),
    "Br-C" => BondLimits::new(1.75, 1.80, 2.00, 2.10),
    "Br-I" => BondLimits::new(2.50, 2.55, 3.00, 3.50),
    "Br-P" => BondLimits::new(2.00, 2.10, 2.70, 3.00),
    "C-Cl" => BondLimits::new(1.60, 1.65, 1.85, 2.00),
    "C-C" => BondLimits::new(1.10, 1.25, 1.70, 1.80),
    "C-F" => BondLimits::new(1.20, 1.25, 1.45, 1.50),
    "C-H" => BondLimits::new(0.85, 0.95, 1.15, 1.25),
    "C-I" => BondLimits::new(1.90, 2.00, 2.20, 2.25),
    "C-N" => BondLimits::new(1.00, 1.10, 1.60, 1.70),
    "C-O" => BondLimits::new(1.00, 1.15, 1.50, 1.60),
    "C-P" => BondLimits::new(1.45, 1.65, 1.95, 2.00),
    "C-S" => BondLimits::new(1.50, 1.60, 1.90, 2.00),
    "Cl-I" => BondLimits::new(2.30, 2.35, 2.75, 3.10),
    "Cl-N" => BondLimits::new(1.60, 1.65, 1.80, 1.90),
    "Cl-O" => BondLimits::new(1.20, 1.30, 1.50, 1.60),
    "Cl-P" => BondLimits::new(1.90, 1.95, 2.20, 2.40),
    "Cl-S" => BondLimits::new(1.90, 1.95, 2.45, 3.10),
    "F-I" => BondLimits::new(1.80, 1.90, 2.15, 3.00),
    "F-P" => BondLimits::new(1.40, 1.50, 1.65, 1.70),
    "F-S" => BondLimits::new(1.40, 1.45, 1.75, 1.80),
    "H-N" => BondLimits::new(0.80, 0.95, 1.10, 1.25),
    "H-O" => BondLimits::new(0.70, 0.85, 1.10, 1.30),
    "H-S" => BondLimits::new(1.20, 1.30, 1.40, 1.50),
    "I-I" => BondLimits::new(2.60, 2.70, 3.20, 3.60),
    "I-N" => BondLimits::new(1.90, 1.95, 2.55, 2.65),
    "I-O" => BondLimits::new(1.55, 1.60, 2.60, 3.00),
    "I-P" => BondLimits::new(2.30, 2.35, 2.60, 3.00),
    "I-S" => BondLimits::new(2.30, 2.40, 2.95, 3.25),
    "N-N" => BondLimits::new(1.00, 1.10, 1.50, 1.60),
    "N-O" => BondLimits::new(1.10, 1.15, 1.50, 1.60),
    "N-P" => BondLimits::new(1.40, 1.50, 1.80, 2.10),
    "N-S" => BondLimits::new(1.40, 1.50, 1.75, 1.85),
    "O-O" => BondLimits::new(1.20, 1.25, 1.55, 1.60),
    "O-P" => BondLimits::new(1.35, 1.40, 1.80, 1.90),
    "O-S" => BondLimits::new(1.35, 1.40, 1.65, 1.80),
    "P-P" => BondLimits::new(1.95, 2.00, 2.35, 2.60),
    "P-S" => BondLimits::new(1.75, 1.85, 2.20, 2.30),
    "S-S" => BondLimits::new(1.90, 2.00, 2.40, 2.60),
};

fn canonical(element: &str) -> &str {
    if element == "D" { "H" } else { element }
}

/// Builds the order-independent table key for an element pair ("H", "C" -> "C-H").
pub fn pair_key(element1: &str, element2: &str) -> String {
    let (a, b) = (canonical(element1), canonical(element2));
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

/// Looks up the bond-length limits for an element pair in either order.
pub fn lookup(element1: &str, element2: &str) -> Option<BondLimits> {
    BOND_LIMITS.get(pair_key(element1, element2).as_str()).copied()
}
