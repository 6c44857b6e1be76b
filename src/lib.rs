//! # depgraph-engine
//!
//! Dependency graph construction for a financial analytics engine.
//!
//! Callers request values (a present value, a risk sensitivity) on
//! computation targets such as securities, positions or portfolio nodes.
//! The builder works out which functions must run, on which targets, in
//! which order, and which inputs come straight from live market data.
//!
//! ## Architecture
//!
//! - **core**: Targets, value requirements and specifications, properties, errors
//! - **function**: Function definitions, the repository, candidate resolution, live data
//! - **graph**: The dependency graph and its nodes, pruning, ordering, inspection
//! - **builder**: Requirement resolution and per-configuration compilation
//! - **simulation**: Random function catalogs for benchmarks and property tests

pub mod builder;
pub mod core;
pub mod function;
pub mod graph;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::builder::{BuilderConfig, DependencyGraphBuilder, GraphCompiler};
    pub use crate::core::error::{DependencyGraphError, ResolutionFailure};
    pub use crate::core::properties::ValueProperties;
    pub use crate::core::target::{
        ComputationTarget, ComputationTargetSpecification, ComputationTargetType,
        MapTargetResolver, TargetResolver, UniqueId,
    };
    pub use crate::core::value::{ValuePropertyNames, ValueRequirement, ValueSpecification};
    pub use crate::function::definition::{
        FunctionDefinition, FunctionId, LiveDataSourcingFunction, SimpleFunction,
    };
    pub use crate::function::live_data::{FixedLiveDataOracle, LiveDataOracle, LiveDataPolicy};
    pub use crate::function::repository::FunctionRepository;
    pub use crate::function::resolver::{DefaultFunctionResolver, FunctionResolver};
    pub use crate::graph::{DependencyGraph, DependencyNode, NodeId};
}
