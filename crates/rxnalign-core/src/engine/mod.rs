//! # Engine Module
//!
//! The stateful scoring machinery of rxnalign.
//!
//! ## Overview
//!
//! Given a reaction and a soft reactant-by-product match matrix, the engine produces score
//! matrices in which lower is better. The central piece is the geometric [`alignment`] scorer,
//! which superimposes the rigid groups of both sides and reports the squared distance of every
//! atom pair. Its multi-body path is solved by the generic equality-constrained [`optimizer`].
//! The simpler compatibility scores live in [`objectives`], together with the weighted
//! combination of all scores.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Solver tolerances, bounds and objective weights
//! - **State Tracking** ([`state`]) - The transform estimate reused as a warm start across calls
//! - **Error Handling** ([`error`]) - Alignment and engine error types

pub mod alignment;
pub mod config;
pub mod error;
pub mod objectives;
pub mod optimizer;
pub mod state;
