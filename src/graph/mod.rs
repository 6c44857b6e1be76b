pub mod dependency_graph;
pub mod node;

pub use dependency_graph::{DependencyGraph, GraphSummary, NodeRef};
pub use node::{DependencyNode, NodeId};
