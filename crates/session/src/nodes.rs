//! Pipeline node registry
//!
//! Tracks the nodes a received pipeline description declares, together
//! with the runtime handles they resolved to. The registry is owned
//! exclusively by its session and dies with it.

use std::collections::HashMap;

use offload_core::{Error, Result};
use pipeline_runtime::{ElementHandle, SinkHandle};

/// Declared kind of a pipeline node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Node driving model training; resolves to an element handle
    Training,

    /// Node emitting training output; resolves to a registered sink
    Output,
}

/// A declared pipeline node and its resolved runtime handle
#[derive(Debug, Clone)]
pub struct NodeInfo {
    name: String,
    kind: NodeKind,
    element: Option<ElementHandle>,
    sink: Option<SinkHandle>,
}

impl NodeInfo {
    /// Training node resolved to an element handle
    pub fn training(name: impl Into<String>, element: ElementHandle) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Training,
            element: Some(element),
            sink: None,
        }
    }

    /// Output node resolved to a registered sink
    pub fn output(name: impl Into<String>, sink: SinkHandle) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Output,
            element: None,
            sink: Some(sink),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn element(&self) -> Option<ElementHandle> {
        self.element
    }

    pub fn sink(&self) -> Option<SinkHandle> {
        self.sink
    }
}

/// Registry of declared pipeline nodes, unique by name
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, NodeInfo>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; a second registration under the same name is a
    /// configuration error and leaves the first one intact
    pub fn register(&mut self, node: NodeInfo) -> Result<()> {
        if self.nodes.contains_key(node.name()) {
            return Err(Error::DuplicateNode {
                name: node.name().to_string(),
            });
        }

        self.nodes.insert(node.name().to_string(), node);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
