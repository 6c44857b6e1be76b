pub mod compilation;
pub mod config;
pub mod dependency_graph_builder;

pub use compilation::GraphCompiler;
pub use config::BuilderConfig;
pub use dependency_graph_builder::DependencyGraphBuilder;
