use std::collections::BTreeMap;
use std::fmt;

use crate::blend::AlphaOverBlend;
use crate::generator::SolidGenerator;
use crate::node::Node;

/// Metadata and constructor for one node type.
#[derive(Clone, Copy)]
pub struct NodeDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    constructor: fn() -> Box<dyn Node>,
}

impl NodeDescriptor {
    /// Describe `T`, reading its metadata from a default instance.
    pub fn of<T: Node + Default + 'static>() -> Self {
        let probe = T::default();
        Self {
            id: probe.id(),
            name: probe.name(),
            description: probe.description(),
            constructor: construct::<T>,
        }
    }

    pub fn create(&self) -> Box<dyn Node> {
        (self.constructor)()
    }
}

fn construct<T: Node + Default + 'static>() -> Box<dyn Node> {
    Box::new(T::default())
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.id, self.description)
    }
}

/// Node types by id.
#[derive(Debug, Default)]
pub struct NodeCatalog {
    entries: BTreeMap<&'static str, NodeDescriptor>,
}

impl NodeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the node types shipped with Tessera.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(NodeDescriptor::of::<AlphaOverBlend>());
        catalog.register(NodeDescriptor::of::<SolidGenerator>());
        catalog
    }

    /// Register a node type, replacing any entry with the same id.
    pub fn register(&mut self, descriptor: NodeDescriptor) -> Option<NodeDescriptor> {
        tracing::debug!(node = descriptor.id, "registered node type");
        self.entries.insert(descriptor.id, descriptor)
    }

    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.entries.get(id)
    }

    /// Instantiate the node type registered under `id`.
    pub fn create(&self, id: &str) -> Option<Box<dyn Node>> {
        self.get(id).map(NodeDescriptor::create)
    }

    /// All registered node types, ordered by id.
    pub fn list(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
