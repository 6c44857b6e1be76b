use crate::builder::config::BuilderConfig;
use crate::core::error::{DependencyGraphError, ResolutionFailure};
use crate::core::target::{ComputationTarget, ComputationTargetSpecification, TargetResolver};
use crate::core::value::{ValueRequirement, ValueSpecification};
use crate::function::definition::{FunctionDefinition, LiveDataSourcingFunction};
use crate::function::live_data::{FixedLiveDataOracle, LiveDataOracle, LiveDataPolicy};
use crate::function::resolver::{FunctionResolver, ResolutionCandidate};
use crate::graph::dependency_graph::Checkpoint;
use crate::graph::{DependencyGraph, NodeId};
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builds a [`DependencyGraph`] from requested values.
///
/// Each requirement is resolved depth first: from live data if the oracle
/// has it (see [`LiveDataPolicy`]), otherwise by the first candidate
/// function whose own inputs can all be resolved. Resolutions are memoized
/// for the builder's lifetime, and a function applied to a target always
/// maps to a single node.
///
/// Every [`add_target`](Self::add_target) call is atomic: if any of its
/// requirements cannot be resolved, the graph is left exactly as it was.
///
/// A builder mutates its graph across calls and must not be shared between
/// threads without external locking. Independent builders share nothing
/// mutable.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use depgraph_engine::prelude::*;
///
/// let mut repo = FunctionRepository::new();
/// repo.add_function(
///     SimpleFunction::new("pv", ComputationTargetType::Security)
///         .producing("PresentValue")
///         .requiring("MarketPrice"),
/// ).unwrap();
///
/// let mut builder = DependencyGraphBuilder::new(
///     BuilderConfig::default(),
///     Arc::new(DefaultFunctionResolver::new(repo)),
/// )
/// .with_live_data(Arc::new(FixedLiveDataOracle::new().with_value_name("MarketPrice")));
///
/// let bond = ComputationTarget::new(ComputationTargetType::Security, UniqueId::of("Sec", "1"));
/// builder.add_target(&bond, [ValueRequirement::on("PresentValue", &bond)]).unwrap();
///
/// let graph = builder.graph();
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.leaf_nodes().len(), 1);
/// ```
pub struct DependencyGraphBuilder {
    config: BuilderConfig,
    function_resolver: Arc<dyn FunctionResolver>,
    live_data: Arc<dyn LiveDataOracle>,
    target_resolver: Option<Arc<dyn TargetResolver>>,
    live_data_function: Arc<dyn FunctionDefinition>,
    graph: DependencyGraph,
    resolved: HashMap<ValueRequirement, ValueSpecification>,
}

impl DependencyGraphBuilder {
    pub fn new(config: BuilderConfig, function_resolver: Arc<dyn FunctionResolver>) -> Self {
        let graph = DependencyGraph::new(config.calculation_configuration.clone());
        Self {
            config,
            function_resolver,
            live_data: Arc::new(FixedLiveDataOracle::new()),
            target_resolver: None,
            live_data_function: Arc::new(LiveDataSourcingFunction::new()),
            graph,
            resolved: HashMap::new(),
        }
    }

    pub fn with_live_data(mut self, live_data: Arc<dyn LiveDataOracle>) -> Self {
        self.live_data = live_data;
        self
    }

    /// Resolver for inputs that live on a different target from the one
    /// requiring them. Without one, such inputs are unresolvable.
    pub fn with_target_resolver(mut self, target_resolver: Arc<dyn TargetResolver>) -> Self {
        self.target_resolver = Some(target_resolver);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn calculation_configuration_name(&self) -> &str {
        &self.config.calculation_configuration
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Mutable access, e.g. to prune between calls to `add_target`.
    pub fn graph_mut(&mut self) -> &mut DependencyGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> DependencyGraph {
        self.graph
    }

    /// Requirement to specification, for every resolution still backed by
    /// a node in the graph.
    pub fn value_requirement_mapping(&self) -> HashMap<ValueRequirement, ValueSpecification> {
        self.resolved
            .iter()
            .filter(|(_, spec)| self.graph.contains_output(spec))
            .map(|(req, spec)| (req.clone(), spec.clone()))
            .collect()
    }

    /// Resolve `requirements` on `target` and add them to the graph as
    /// terminal outputs.
    ///
    /// Either every requirement resolves, or the call fails and the graph
    /// is unchanged.
    pub fn add_target<I>(
        &mut self,
        target: &ComputationTarget,
        requirements: I,
    ) -> Result<(), DependencyGraphError>
    where
        I: IntoIterator<Item = ValueRequirement>,
    {
        let requirements: Vec<ValueRequirement> = requirements.into_iter().collect();
        validate(target, &requirements)?;

        let mut resolution = Resolution::begin(self);
        if let Err(err) = resolution.resolve_terminals(target, &requirements) {
            resolution.abort();
            return Err(err);
        }
        resolution.commit();
        debug!(
            "[{}] added {} requirement(s) on {}; graph has {} node(s)",
            self.config.calculation_configuration,
            requirements.len(),
            target,
            self.graph.node_count()
        );
        Ok(())
    }

    /// Add a single requirement, resolving its target through the target
    /// resolver.
    pub fn add_requirement(&mut self, requirement: ValueRequirement) -> Result<(), DependencyGraphError> {
        let spec = requirement.target_specification();
        let target = self
            .target_resolver
            .as_ref()
            .and_then(|resolver| resolver.resolve(spec))
            .ok_or_else(|| {
                DependencyGraphError::InvalidArgument(format!("cannot resolve target {}", spec))
            })?;
        self.add_target(&target, [requirement])
    }
}

impl std::fmt::Debug for DependencyGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraphBuilder")
            .field("config", &self.config)
            .field("nodes", &self.graph.node_count())
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

fn validate(
    target: &ComputationTarget,
    requirements: &[ValueRequirement],
) -> Result<(), DependencyGraphError> {
    for requirement in requirements {
        if requirement.value_name().is_empty() {
            return Err(DependencyGraphError::InvalidArgument(format!(
                "requirement on {} has an empty value name",
                target
            )));
        }
        if requirement.target_specification() != target.specification() {
            return Err(DependencyGraphError::InvalidArgument(format!(
                "requirement {} does not refer to target {}",
                requirement, target
            )));
        }
    }
    Ok(())
}

/// State of one `add_target` call. Graph and memo changes are journaled
/// so a rejected candidate, or the whole call, can be undone.
struct Resolution<'a> {
    config: &'a BuilderConfig,
    function_resolver: &'a dyn FunctionResolver,
    live_data: &'a dyn LiveDataOracle,
    target_resolver: Option<&'a dyn TargetResolver>,
    live_data_function: &'a Arc<dyn FunctionDefinition>,
    graph: &'a mut DependencyGraph,
    resolved: &'a mut HashMap<ValueRequirement, ValueSpecification>,
    /// Memo entries overwritten since `begin`, with their previous value.
    memo_log: Vec<(ValueRequirement, Option<ValueSpecification>)>,
    path: HashSet<ValueRequirement>,
}

#[derive(Clone, Copy)]
struct Savepoint {
    graph: Checkpoint,
    memo: usize,
}

/// A resolved input: what was asked for, who produces it, and what it is.
struct ResolvedInput {
    requirement: ValueRequirement,
    node: NodeId,
    specification: ValueSpecification,
}

impl<'a> Resolution<'a> {
    fn begin(builder: &'a mut DependencyGraphBuilder) -> Self {
        builder.graph.begin();
        Self {
            config: &builder.config,
            function_resolver: builder.function_resolver.as_ref(),
            live_data: builder.live_data.as_ref(),
            target_resolver: builder.target_resolver.as_deref(),
            live_data_function: &builder.live_data_function,
            graph: &mut builder.graph,
            resolved: &mut builder.resolved,
            memo_log: Vec::new(),
            path: HashSet::new(),
        }
    }

    fn commit(self) {
        self.graph.commit();
    }

    fn abort(mut self) {
        self.rollback(Savepoint {
            graph: Checkpoint::default(),
            memo: 0,
        });
        self.graph.commit();
    }

    fn savepoint(&self) -> Savepoint {
        Savepoint {
            graph: self.graph.checkpoint(),
            memo: self.memo_log.len(),
        }
    }

    fn rollback(&mut self, savepoint: Savepoint) {
        self.graph.rollback(savepoint.graph);
        let undone = self.memo_log.split_off(savepoint.memo.min(self.memo_log.len()));
        for (requirement, previous) in undone.into_iter().rev() {
            match previous {
                Some(specification) => {
                    self.resolved.insert(requirement, specification);
                }
                None => {
                    self.resolved.remove(&requirement);
                }
            }
        }
    }

    fn remember(&mut self, requirement: &ValueRequirement, specification: Option<ValueSpecification>) {
        let previous = match specification {
            Some(specification) => self.resolved.insert(requirement.clone(), specification),
            None => self.resolved.remove(requirement),
        };
        self.memo_log.push((requirement.clone(), previous));
    }

    fn resolve_terminals(
        &mut self,
        target: &ComputationTarget,
        requirements: &[ValueRequirement],
    ) -> Result<(), DependencyGraphError> {
        let config = self.config;
        for requirement in requirements {
            let (_, specification) = self.resolve(target, requirement).map_err(|cause| {
                warn!(
                    "[{}] unsatisfiable: {} on {}",
                    config.calculation_configuration, requirement, target
                );
                DependencyGraphError::UnsatisfiableDependency {
                    requirement: requirement.clone(),
                    target: target.to_specification(),
                    cause,
                }
            })?;
            self.graph
                .add_terminal_output(specification, requirement.clone())?;
        }
        Ok(())
    }

    fn resolve(
        &mut self,
        target: &ComputationTarget,
        requirement: &ValueRequirement,
    ) -> Result<(NodeId, ValueSpecification), ResolutionFailure> {
        if let Some(specification) = self.resolved.get(requirement).cloned() {
            if let Some(node) = self.graph.producer_of(&specification) {
                trace!("memo hit for {}", requirement);
                return Ok((node, specification));
            }
            // Pruned since it was resolved.
            self.remember(requirement, None);
        }
        if self.path.contains(requirement) {
            debug!("cycle detected at {}", requirement);
            return Err(ResolutionFailure::CyclicDependency {
                requirement: requirement.clone(),
            });
        }
        if self.path.len() >= self.config.max_depth {
            return Err(ResolutionFailure::DepthExceeded {
                requirement: requirement.clone(),
                depth: self.config.max_depth,
            });
        }

        self.path.insert(requirement.clone());
        let result = self.resolve_uncached(target, requirement);
        self.path.remove(requirement);

        if let Ok((_, specification)) = &result {
            self.remember(requirement, Some(specification.clone()));
        }
        result
    }

    fn resolve_uncached(
        &mut self,
        target: &ComputationTarget,
        requirement: &ValueRequirement,
    ) -> Result<(NodeId, ValueSpecification), ResolutionFailure> {
        let policy = self.config.live_data_policy;
        if policy == LiveDataPolicy::Strict && self.live_data.is_available(requirement) {
            return Ok(self.add_live_data_leaf(target, requirement));
        }

        let candidates = self.function_resolver.resolve(target, requirement);
        trace!("{} candidate(s) for {}", candidates.len(), requirement);
        let mut attempts = Vec::new();
        for candidate in &candidates {
            let savepoint = self.savepoint();
            match self.apply_candidate(target, requirement, candidate) {
                Ok(resolved) => return Ok(resolved),
                Err(failure) => {
                    // Inputs it did resolve must not outlive it.
                    self.rollback(savepoint);
                    debug!(
                        "candidate {} rejected for {}: {}",
                        candidate.function.short_name(),
                        requirement,
                        failure
                    );
                    attempts.push(failure);
                }
            }
        }

        if policy == LiveDataPolicy::Fallback && self.live_data.is_available(requirement) {
            return Ok(self.add_live_data_leaf(target, requirement));
        }
        if attempts.is_empty() {
            Err(ResolutionFailure::NoCandidates {
                requirement: requirement.clone(),
            })
        } else {
            Err(ResolutionFailure::CandidatesExhausted {
                requirement: requirement.clone(),
                attempts,
            })
        }
    }

    fn add_live_data_leaf(
        &mut self,
        target: &ComputationTarget,
        requirement: &ValueRequirement,
    ) -> (NodeId, ValueSpecification) {
        let specification = LiveDataSourcingFunction::specification_for(requirement);
        let node = self
            .graph
            .add_node(Arc::clone(self.live_data_function), target);
        let node = self.graph.claim_output(node, specification.clone());
        trace!("live data leaf for {}", requirement);
        (node, specification)
    }

    fn apply_candidate(
        &mut self,
        target: &ComputationTarget,
        requirement: &ValueRequirement,
        candidate: &ResolutionCandidate,
    ) -> Result<(NodeId, ValueSpecification), ResolutionFailure> {
        let function = &candidate.function;
        let declared = function.requirements(target, requirement).ok_or_else(|| {
            ResolutionFailure::RequirementsDeclined {
                function: function.id().to_string(),
                requirement: requirement.clone(),
            }
        })?;

        let mut inputs = Vec::with_capacity(declared.len());
        self.resolve_inputs(function.as_ref(), target, declared, &mut inputs)?;

        let input_specs: Vec<ValueSpecification> =
            inputs.iter().map(|i| i.specification.clone()).collect();
        let satisfying: Vec<ValueSpecification> = function
            .late_results(target, &input_specs)
            .into_iter()
            .filter(|result| requirement.is_satisfied_by(result))
            .map(|result| result.compose(requirement))
            .collect();
        let specification = satisfying
            .iter()
            .find(|spec| **spec == candidate.specification)
            .or_else(|| satisfying.first())
            .cloned()
            .ok_or_else(|| ResolutionFailure::ResultsRejected {
                function: function.id().to_string(),
                requirement: requirement.clone(),
            })?;

        let additional =
            function.additional_requirements(target, &input_specs, std::slice::from_ref(&specification));
        if !additional.is_empty() {
            self.resolve_inputs(function.as_ref(), target, additional, &mut inputs)?;
        }

        if let Some(producer) = self.graph.producer_of(&specification) {
            return Ok((producer, specification));
        }

        if let Some(existing) = self.graph.find_node(function.id(), target.specification()) {
            if inputs
                .iter()
                .any(|input| self.graph.depends_on(input.node, existing))
            {
                return Err(ResolutionFailure::CyclicDependency {
                    requirement: requirement.clone(),
                });
            }
            trace!("reusing node for {} on {}", function.short_name(), target);
        }

        let node = self.graph.add_node(Arc::clone(function), target);
        let node = self.graph.claim_output(node, specification.clone());
        for input in inputs {
            self.graph
                .wire_input(node, input.node, input.requirement, input.specification);
        }
        Ok((node, specification))
    }

    fn resolve_inputs(
        &mut self,
        function: &dyn FunctionDefinition,
        target: &ComputationTarget,
        requirements: Vec<ValueRequirement>,
        resolved: &mut Vec<ResolvedInput>,
    ) -> Result<(), ResolutionFailure> {
        let input_unresolved = |cause: ResolutionFailure| ResolutionFailure::InputUnresolved {
            function: function.id().to_string(),
            cause: Box::new(cause),
        };
        for requirement in requirements {
            let input_target = self
                .target_for(target, requirement.target_specification())
                .map_err(input_unresolved)?;
            let (node, specification) = self
                .resolve(&input_target, &requirement)
                .map_err(input_unresolved)?;
            resolved.push(ResolvedInput {
                requirement,
                node,
                specification,
            });
        }
        Ok(())
    }

    fn target_for(
        &self,
        current: &ComputationTarget,
        specification: &ComputationTargetSpecification,
    ) -> Result<ComputationTarget, ResolutionFailure> {
        if current.specification() == specification {
            return Ok(current.clone());
        }
        self.target_resolver
            .and_then(|resolver| resolver.resolve(specification))
            .ok_or_else(|| ResolutionFailure::TargetNotFound {
                target: specification.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::properties::ValueProperties;
    use crate::core::target::{ComputationTargetType, MapTargetResolver, UniqueId};
    use crate::function::definition::SimpleFunction;
    use crate::function::repository::FunctionRepository;
    use crate::function::resolver::DefaultFunctionResolver;

    fn target() -> ComputationTarget {
        ComputationTarget::primitive(UniqueId::of("Target", "1"))
    }

    fn req(name: &str) -> ValueRequirement {
        ValueRequirement::on(name, &target())
    }

    fn builder(functions: Vec<SimpleFunction>) -> DependencyGraphBuilder {
        let mut repo = FunctionRepository::new();
        for f in functions {
            repo.add_function(f).unwrap();
        }
        DependencyGraphBuilder::new(
            BuilderConfig::default(),
            Arc::new(DefaultFunctionResolver::new(repo)),
        )
    }

    fn primitive(id: &str) -> SimpleFunction {
        SimpleFunction::new(id, ComputationTargetType::Primitive)
    }

    #[test]
    fn test_memo_reuses_resolution() {
        let mut b = builder(vec![primitive("f1").producing("A").requiring("B"), primitive("f2").producing("B")]);
        b.add_target(&target(), [req("A")]).unwrap();
        b.add_target(&target(), [req("B"), req("A")]).unwrap();
        assert_eq!(b.graph().node_count(), 2);
        assert_eq!(b.graph().edge_count(), 1);
        assert_eq!(b.graph().terminal_output_values().len(), 2);
        assert_eq!(b.value_requirement_mapping().len(), 2);
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let mut b = builder(vec![primitive("f1").producing("A")]);
        let other = ComputationTarget::primitive(UniqueId::of("Target", "2"));
        let err = b
            .add_target(&target(), [ValueRequirement::on("A", &other)])
            .unwrap_err();
        assert!(matches!(err, DependencyGraphError::InvalidArgument(_)));
        let err = b.add_target(&target(), [req("")]).unwrap_err();
        assert!(matches!(err, DependencyGraphError::InvalidArgument(_)));
        assert!(b.graph().is_empty());
    }

    #[test]
    fn test_atomic_failure_discards_partial_work() {
        let mut b = builder(vec![primitive("f1").producing("A"), primitive("f2").producing("B")]);
        b.add_target(&target(), [req("A")]).unwrap();
        let err = b.add_target(&target(), [req("B"), req("Missing")]).unwrap_err();
        assert!(matches!(err, DependencyGraphError::UnsatisfiableDependency { .. }));
        assert_eq!(b.graph().node_count(), 1);
        assert!(!b.value_requirement_mapping().contains_key(&req("B")));
    }

    #[test]
    fn test_self_cycle_is_unsatisfiable() {
        let mut b = builder(vec![primitive("loop").producing("A").requiring("A")]);
        let err = b.add_target(&target(), [req("A")]).unwrap_err();
        assert!(err.resolution_failure().unwrap().involves_cycle());
        assert!(b.graph().is_empty());
    }

    #[test]
    fn test_cycle_falls_back_to_next_candidate() {
        let mut b = builder(vec![
            primitive("loop").producing("A").requiring("B"),
            primitive("b-from-a").producing("B").requiring("A"),
            primitive("plain").producing("A"),
        ]);
        b.add_target(&target(), [req("A")]).unwrap();
        let ids: Vec<String> = b.graph().nodes().map(|n| n.function_id().to_string()).collect();
        assert_eq!(ids, vec!["plain".to_string()]);
    }

    #[test]
    fn test_rejected_candidate_rolls_back_graph_and_memo() {
        let mut b = builder(vec![
            primitive("partial").producing("A").requiring("X").requiring("Y"),
            primitive("fx").producing("X"),
            primitive("whole").producing("A"),
        ]);
        b.add_target(&target(), [req("A")]).unwrap();
        assert_eq!(b.graph().node_count(), 1);
        assert_eq!(b.graph().edge_count(), 0);
        assert!(!b.resolved.contains_key(&req("X")));
        assert_eq!(b.resolved.len(), 1);

        let err = b.add_target(&target(), [req("X"), req("Y")]).unwrap_err();
        assert!(matches!(err, DependencyGraphError::UnsatisfiableDependency { .. }));
        assert_eq!(b.resolved.len(), 1);
        assert_eq!(b.graph().node_count(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut repo = FunctionRepository::new();
        for i in 0..5 {
            repo.add_function(
                primitive(&format!("f{}", i))
                    .producing(format!("V{}", i))
                    .requiring(format!("V{}", i + 1)),
            )
            .unwrap();
        }
        repo.add_function(primitive("leaf").producing("V5")).unwrap();
        let resolver: Arc<dyn FunctionResolver> = Arc::new(DefaultFunctionResolver::new(repo));

        let mut shallow = DependencyGraphBuilder::new(
            BuilderConfig::default().with_max_depth(3),
            Arc::clone(&resolver),
        );
        let err = shallow.add_target(&target(), [req("V0")]).unwrap_err();
        let leaves = err.resolution_failure().unwrap().leaves();
        assert!(matches!(
            leaves[..],
            [ResolutionFailure::DepthExceeded { depth: 3, .. }]
        ));

        let mut deep = DependencyGraphBuilder::new(BuilderConfig::default(), resolver);
        deep.add_target(&target(), [req("V0")]).unwrap();
        assert_eq!(deep.graph().depth(), 6);
    }

    #[test]
    fn test_cross_target_input_needs_target_resolver() {
        let curve = ComputationTarget::primitive(UniqueId::of("Curve", "USD"));
        let functions = vec![
            primitive("pv")
                .producing("PV")
                .requiring_value(ValueRequirement::on("Curve", &curve)),
            primitive("curve").producing("Curve"),
        ];

        let mut without = builder(functions.clone());
        let err = without.add_target(&target(), [req("PV")]).unwrap_err();
        let leaves = err.resolution_failure().unwrap().leaves();
        assert!(matches!(leaves[..], [ResolutionFailure::TargetNotFound { .. }]));

        let resolver: MapTargetResolver = vec![curve.clone()].into_iter().collect();
        let mut with = builder(functions).with_target_resolver(Arc::new(resolver));
        with.add_target(&target(), [req("PV")]).unwrap();
        let graph = with.graph();
        assert_eq!(graph.node_count(), 2);
        let curve_node = graph
            .find_node(&"curve".into(), curve.specification())
            .unwrap();
        assert_eq!(graph.dependent_nodes(curve_node).len(), 1);
    }

    #[test]
    fn test_add_requirement_uses_target_resolver() {
        let resolver: MapTargetResolver = vec![target()].into_iter().collect();
        let mut b = builder(vec![primitive("f1").producing("A")]).with_target_resolver(Arc::new(resolver));
        b.add_requirement(req("A")).unwrap();
        assert_eq!(b.graph().node_count(), 1);

        let unknown = ComputationTarget::primitive(UniqueId::of("Target", "9"));
        let err = b.add_requirement(ValueRequirement::on("A", &unknown)).unwrap_err();
        assert!(matches!(err, DependencyGraphError::InvalidArgument(_)));
    }

    #[test]
    fn test_constraint_selects_producer() {
        let mut b = builder(vec![
            primitive("usd").producing_with("PV", ValueProperties::new().with("Currency", "USD")),
            primitive("eur").producing_with("PV", ValueProperties::new().with("Currency", "EUR")),
        ]);
        b.add_target(&target(), [req("PV").with_constraint("Currency", "EUR")])
            .unwrap();
        let ids: Vec<String> = b.graph().nodes().map(|n| n.function_id().to_string()).collect();
        assert_eq!(ids, vec!["eur".to_string()]);
    }
}
