//! Nodes that produce images without inputs of their own.

mod solid;

pub use solid::SolidGenerator;
