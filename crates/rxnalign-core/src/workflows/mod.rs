//! # Workflows Module
//!
//! High-level entry points that assemble every objective for a reaction and evaluate them in one
//! call.
//!
//! - **Scoring Workflow** ([`score`]) - Atomic, bond and alignment scores for one match matrix,
//!   combined with the configured weights.

pub mod score;
