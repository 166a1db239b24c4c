pub mod geometry;
pub mod quaternion;
