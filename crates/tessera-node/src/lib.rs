//! # tessera-node
//!
//! The node evaluation core. A [`Node`] exposes typed input and output
//! ports; asking a node for an output's [`Value`] over a time window
//! recursively evaluates whatever is connected upstream and composites the
//! results on the render instance carried by the [`EvalContext`]. Every node
//! can also describe its per-pixel work as a generated kernel through
//! [`Node::code`].

pub mod blend;
pub mod catalog;
pub mod context;
pub mod generator;
pub mod node;
pub mod port;
pub mod render;
pub mod value;

pub use blend::AlphaOverBlend;
pub use catalog::{NodeCatalog, NodeDescriptor};
pub use context::{with_current_instance, EvalContext};
pub use generator::SolidGenerator;
pub use node::{unhandled_output, Node};
pub use port::{Input, Output, PortKind};
pub use render::render_frame;
pub use value::Value;
