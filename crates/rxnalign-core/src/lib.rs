//! # rxnalign Core Library
//!
//! Geometric scoring of candidate atom-to-atom correspondences between the reactant and
//! product sides of a chemical transformation.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Atom`, `ReactionSide`), the
//!   bond-length table used to derive rigid groups, and the quaternion transform algebra.
//!
//! - **[`engine`]: The Logic Core.** The stateful alignment scorer with its closed-form
//!   single-body solver and its constrained multi-body solver, the generic equality-constrained
//!   optimizer it relies on, and the compatibility objectives that are combined with it.
//!
//! - **[`workflows`]: The Public API.** One-call entry points that assemble every objective for a
//!   reaction and return the combined score matrix.

pub mod core;
pub mod engine;
pub mod workflows;
