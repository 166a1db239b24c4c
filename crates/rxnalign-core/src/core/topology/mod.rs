//! # Topology Module
//!
//! Structural knowledge used to turn bare coordinates into rigid groups.
//!
//! ## Key Components
//!
//! - [`bond_limits`] - Built-in bond-length limits per element pair, keyed independently of
//!   element order
//! - [`registry`] - The built-in limits with optional overrides loaded from a TOML file
//! - [`connectivity`] - Distance-based bond inference and the connected components that serve
//!   as rigid groups
//!
//! ## Usage
//!
//! ```ignore
//! use rxnalign::core::topology::{connectivity, registry::BondLimitRegistry};
//!
//! let registry = BondLimitRegistry::load("bond_limits.toml")?;
//! let bonds = connectivity::infer_bonds(&atoms, &registry);
//! let groups = connectivity::connected_components(atoms.len(), &bonds);
//! ```

pub mod bond_limits;
pub mod connectivity;
pub mod registry;
