//! # Core Module
//!
//! Stateless building blocks shared by the scoring engine.
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, and one side of a reaction
//!   partitioned into rigid groups
//! - **Structural Knowledge** ([`topology`]) - Bond-length limits and
//!   connectivity-derived rigid groups
//! - **Transform Algebra** ([`utils::quaternion`]) - Quaternion representation matrices and the
//!   dual-quaternion encoding of rigid transforms

pub mod models;
pub mod topology;
pub mod utils;
