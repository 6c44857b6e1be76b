use crate::builder::config::BuilderConfig;
use crate::builder::dependency_graph_builder::DependencyGraphBuilder;
use crate::core::error::DependencyGraphError;
use crate::core::target::{ComputationTarget, TargetResolver};
use crate::core::value::ValueRequirement;
use crate::function::live_data::LiveDataOracle;
use crate::function::resolver::FunctionResolver;
use crate::graph::DependencyGraph;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds one dependency graph per calculation configuration.
///
/// Every configuration gets its own [`DependencyGraphBuilder`]; they share
/// the function resolver, live data oracle and target resolver but no
/// graph state, so a failure in one configuration never touches another.
pub struct GraphCompiler {
    template: BuilderConfig,
    function_resolver: Arc<dyn FunctionResolver>,
    live_data: Option<Arc<dyn LiveDataOracle>>,
    target_resolver: Option<Arc<dyn TargetResolver>>,
    builders: BTreeMap<String, DependencyGraphBuilder>,
}

impl GraphCompiler {
    /// `template` supplies the policy and depth limit for every
    /// configuration; its name is replaced per configuration.
    pub fn new(template: BuilderConfig, function_resolver: Arc<dyn FunctionResolver>) -> Self {
        Self {
            template,
            function_resolver,
            live_data: None,
            target_resolver: None,
            builders: BTreeMap::new(),
        }
    }

    pub fn with_live_data(mut self, live_data: Arc<dyn LiveDataOracle>) -> Self {
        self.live_data = Some(live_data);
        self
    }

    pub fn with_target_resolver(mut self, target_resolver: Arc<dyn TargetResolver>) -> Self {
        self.target_resolver = Some(target_resolver);
        self
    }

    /// Add requirements to the named configuration, creating it on first use.
    pub fn add_target<I>(
        &mut self,
        configuration: &str,
        target: &ComputationTarget,
        requirements: I,
    ) -> Result<(), DependencyGraphError>
    where
        I: IntoIterator<Item = ValueRequirement>,
    {
        if configuration.is_empty() {
            return Err(DependencyGraphError::InvalidArgument(
                "calculation configuration name is empty".to_string(),
            ));
        }
        if !self.builders.contains_key(configuration) {
            let builder = self.new_builder(configuration);
            self.builders.insert(configuration.to_string(), builder);
        }
        match self.builders.get_mut(configuration) {
            Some(builder) => builder.add_target(target, requirements),
            None => Err(DependencyGraphError::InvalidArgument(format!(
                "unknown calculation configuration {}",
                configuration
            ))),
        }
    }

    pub fn builder(&self, configuration: &str) -> Option<&DependencyGraphBuilder> {
        self.builders.get(configuration)
    }

    /// Configuration names, sorted.
    pub fn configurations(&self) -> impl Iterator<Item = &str> + '_ {
        self.builders.keys().map(String::as_str)
    }

    /// Finish compilation, optionally pruning each graph to the values its
    /// callers asked for.
    pub fn compile(self, prune: bool) -> BTreeMap<String, DependencyGraph> {
        self.builders
            .into_iter()
            .map(|(name, builder)| {
                let mut graph = builder.into_graph();
                if prune {
                    graph.remove_unnecessary_values();
                }
                info!(
                    "compiled [{}]: {} node(s), {} terminal output(s)",
                    name,
                    graph.node_count(),
                    graph.terminal_output_values().len()
                );
                (name, graph)
            })
            .collect()
    }

    fn new_builder(&self, configuration: &str) -> DependencyGraphBuilder {
        let config = BuilderConfig {
            calculation_configuration: configuration.to_string(),
            ..self.template.clone()
        };
        let mut builder = DependencyGraphBuilder::new(config, Arc::clone(&self.function_resolver));
        if let Some(live_data) = &self.live_data {
            builder = builder.with_live_data(Arc::clone(live_data));
        }
        if let Some(target_resolver) = &self.target_resolver {
            builder = builder.with_target_resolver(Arc::clone(target_resolver));
        }
        builder
    }
}
