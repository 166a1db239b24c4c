//! # Models Module
//!
//! Data structures describing the atoms on each side of a reaction.
//!
//! - [`atom`] - A single atom: element, optional SYBYL type, and position
//! - [`topology`] - Undirected bonds between atom indices
//! - [`side`] - One side of a reaction (`ReactionSide`) with its rigid-group partition, and the
//!   `Reaction` that pairs reactants with products
//!
//! Atoms are addressed by their index within their side. Every scorer in the engine relies on
//! that ordering to index the rows (reactants) and columns (products) of its matrices.

pub mod atom;
pub mod side;
pub mod topology;
