use crate::core::error::DependencyGraphError;
use crate::core::target::{ComputationTarget, ComputationTargetSpecification, ComputationTargetType};
use crate::core::value::{ValueRequirement, ValueSpecification};
use crate::function::definition::{FunctionDefinition, FunctionId};
use crate::graph::node::{DependencyNode, NodeId};
use log::{debug, trace};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::stable_graph::{EdgeIndex, StableDiGraph};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::io;
use std::ops::Deref;
use std::sync::Arc;

/// The resolved graph of function invocations for one calculation
/// configuration.
///
/// Nodes live in an arena keyed by [`NodeId`]; an edge runs from an input
/// node to the node that consumes it. The graph also records the terminal
/// outputs callers asked for, which drive
/// [`remove_unnecessary_values`](Self::remove_unnecessary_values).
///
/// Invariants maintained by every mutating method:
///
/// - at most one node per `(function, target)` pair;
/// - every output specification has exactly one producing node;
/// - no node depends on itself, directly or transitively.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use depgraph_engine::core::target::{ComputationTarget, UniqueId};
/// use depgraph_engine::core::value::{ValueRequirement, ValueSpecification};
/// use depgraph_engine::function::definition::{LiveDataSourcingFunction, SimpleFunction};
/// use depgraph_engine::core::target::ComputationTargetType;
/// use depgraph_engine::graph::DependencyGraph;
///
/// let target = ComputationTarget::primitive(UniqueId::of("Target", "1"));
/// let mut graph = DependencyGraph::new("Default");
///
/// let live = graph.add_node(Arc::new(LiveDataSourcingFunction::new()), &target);
/// let spot = LiveDataSourcingFunction::specification_for(&ValueRequirement::on("Spot", &target));
/// graph.add_output_value(live, spot.clone()).unwrap();
///
/// let f = SimpleFunction::new("fwd", ComputationTargetType::Primitive).producing("Forward");
/// let fwd = graph.add_node(Arc::new(f), &target);
/// let forward = ValueSpecification::from_requirement(&ValueRequirement::on("Forward", &target), "fwd");
/// graph.add_output_value(fwd, forward.clone()).unwrap();
/// graph.add_input_value(fwd, ValueRequirement::on("Spot", &target), spot).unwrap();
/// graph.add_input_node(fwd, live).unwrap();
/// graph.add_terminal_output(forward, ValueRequirement::on("Forward", &target)).unwrap();
///
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.execution_order().unwrap(), vec![live, fwd]);
/// ```
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    calculation_configuration: String,
    graph: StableDiGraph<DependencyNode, ()>,
    by_function_target: HashMap<(FunctionId, ComputationTargetSpecification), NodeId>,
    producers: HashMap<ValueSpecification, NodeId>,
    terminal_outputs: Vec<ValueSpecification>,
    terminal_requirements: HashMap<ValueSpecification, Vec<ValueRequirement>>,
    /// Open while a builder is resolving into this graph.
    journal: Option<Vec<Change>>,
}

/// A position in the change journal to roll back to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Checkpoint(usize);

/// One reversible mutation made while the journal is open.
#[derive(Debug, Clone)]
enum Change {
    NodeAdded(NodeId),
    OutputClaimed(NodeId, ValueSpecification),
    InputWired {
        dependent: NodeId,
        requirement: Option<ValueRequirement>,
        specification: Option<ValueSpecification>,
        edge: Option<EdgeIndex>,
    },
    TerminalAdded {
        specification: ValueSpecification,
        requirement: Option<ValueRequirement>,
        first: bool,
    },
}

impl DependencyGraph {
    pub fn new(calculation_configuration: impl Into<String>) -> Self {
        Self {
            calculation_configuration: calculation_configuration.into(),
            graph: StableDiGraph::new(),
            by_function_target: HashMap::new(),
            producers: HashMap::new(),
            terminal_outputs: Vec::new(),
            terminal_requirements: HashMap::new(),
            journal: None,
        }
    }

    pub fn calculation_configuration_name(&self) -> &str {
        &self.calculation_configuration
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.graph.node_weight(id).map(|node| NodeRef {
            graph: self,
            id,
            node,
        })
    }

    /// All nodes, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.graph.node_indices().map(move |id| NodeRef {
            graph: self,
            id,
            node: &self.graph[id],
        })
    }

    /// Nodes whose target is of the given type.
    pub fn nodes_for_type(&self, target_type: ComputationTargetType) -> Vec<NodeRef<'_>> {
        self.nodes()
            .filter(|n| n.target().target_type() == target_type)
            .collect()
    }

    /// The node for `function` applied to `target`, if one exists.
    pub fn find_node(
        &self,
        function: &FunctionId,
        target: &ComputationTargetSpecification,
    ) -> Option<NodeId> {
        self.by_function_target
            .get(&(function.clone(), target.clone()))
            .copied()
    }

    pub fn producer_of(&self, specification: &ValueSpecification) -> Option<NodeId> {
        self.producers.get(specification).copied()
    }

    pub fn contains_output(&self, specification: &ValueSpecification) -> bool {
        self.producers.contains_key(specification)
    }

    /// Every output of every node.
    pub fn output_values(&self) -> Vec<&ValueSpecification> {
        self.graph
            .node_indices()
            .flat_map(|id| self.graph[id].output_values().iter())
            .collect()
    }

    /// The outputs callers asked for, in the order first requested.
    pub fn terminal_output_values(&self) -> &[ValueSpecification] {
        &self.terminal_outputs
    }

    /// The caller requirements a terminal output answers.
    pub fn terminal_requirements(&self, specification: &ValueSpecification) -> &[ValueRequirement] {
        self.terminal_requirements
            .get(specification)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Input nodes of `id`, in the order the edges were added.
    pub fn input_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut inputs: Vec<NodeId> = self
            .graph
            .neighbors_directed(id, Direction::Incoming)
            .collect();
        inputs.sort_by_key(|&input| self.graph.find_edge(input, id));
        inputs
    }

    /// Nodes that consume an output of `id`.
    pub fn dependent_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut dependents: Vec<NodeId> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        dependents.sort_by_key(|&dependent| self.graph.find_edge(id, dependent));
        dependents
    }

    /// Nodes nothing depends on.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&id| {
                self.graph
                    .neighbors_directed(id, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Nodes with no inputs.
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&id| {
                self.graph
                    .neighbors_directed(id, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Get or create the node for `function` applied to `target`.
    pub fn add_node(&mut self, function: Arc<dyn FunctionDefinition>, target: &ComputationTarget) -> NodeId {
        let key = (function.id().clone(), target.to_specification());
        if let Some(&id) = self.by_function_target.get(&key) {
            return id;
        }
        let id = self
            .graph
            .add_node(DependencyNode::new(function, target.clone()));
        trace!("created node {:?}: {}", id, self.graph[id]);
        self.by_function_target.insert(key, id);
        self.record(Change::NodeAdded(id));
        id
    }

    /// Record that node `id` produces `specification`.
    ///
    /// Returns `Ok(false)` if the node already produced it, and an error if
    /// a different node does.
    pub fn add_output_value(
        &mut self,
        id: NodeId,
        specification: ValueSpecification,
    ) -> Result<bool, DependencyGraphError> {
        if let Some(&producer) = self.producers.get(&specification) {
            if producer == id {
                return Ok(false);
            }
            return Err(DependencyGraphError::InvalidArgument(format!(
                "{} is already produced by {}",
                specification, self.graph[producer]
            )));
        }
        let node = self
            .graph
            .node_weight_mut(id)
            .ok_or_else(|| unknown_node(id))?;
        node.add_output_value(specification.clone());
        self.producers.insert(specification, id);
        Ok(true)
    }

    /// Record that node `id` consumes `specification` to satisfy
    /// `requirement`.
    pub fn add_input_value(
        &mut self,
        id: NodeId,
        requirement: ValueRequirement,
        specification: ValueSpecification,
    ) -> Result<(), DependencyGraphError> {
        let node = self
            .graph
            .node_weight_mut(id)
            .ok_or_else(|| unknown_node(id))?;
        node.add_input_requirement(requirement);
        node.add_input_value(specification);
        Ok(())
    }

    /// Make `input` an input node of `dependent`.
    ///
    /// Idempotent: returns `Ok(false)` if the edge already exists, so the
    /// dependent back-reference on `input` is never duplicated. Fails if
    /// the edge would close a cycle.
    pub fn add_input_node(&mut self, dependent: NodeId, input: NodeId) -> Result<bool, DependencyGraphError> {
        for id in [dependent, input] {
            if !self.graph.contains_node(id) {
                return Err(unknown_node(id));
            }
        }
        if self.graph.find_edge(input, dependent).is_some() {
            return Ok(false);
        }
        if self.depends_on(input, dependent) {
            return Err(DependencyGraphError::CyclicGraph(format!(
                "{} cannot depend on {}",
                self.graph[dependent], self.graph[input]
            )));
        }
        self.graph.add_edge(input, dependent, ());
        Ok(true)
    }

    /// Record an input value and its edge in one step, for callers that
    /// already guarantee both nodes exist and the edge is acyclic.
    pub(crate) fn wire_input(
        &mut self,
        dependent: NodeId,
        input: NodeId,
        requirement: ValueRequirement,
        specification: ValueSpecification,
    ) {
        let mut added_requirement = None;
        let mut added_specification = None;
        if let Some(node) = self.graph.node_weight_mut(dependent) {
            if node.add_input_requirement(requirement.clone()) {
                added_requirement = Some(requirement);
            }
            if node.add_input_value(specification.clone()) {
                added_specification = Some(specification);
            }
        }
        let edge = match self.graph.find_edge(input, dependent) {
            Some(_) => None,
            None => Some(self.graph.add_edge(input, dependent, ())),
        };
        self.record(Change::InputWired {
            dependent,
            requirement: added_requirement,
            specification: added_specification,
            edge,
        });
    }

    /// Give `specification` to node `id` unless another node already
    /// produces it; returns the node that ends up producing it.
    pub(crate) fn claim_output(&mut self, id: NodeId, specification: ValueSpecification) -> NodeId {
        if let Some(&producer) = self.producers.get(&specification) {
            return producer;
        }
        if let Some(node) = self.graph.node_weight_mut(id) {
            node.add_output_value(specification.clone());
            self.producers.insert(specification.clone(), id);
            self.record(Change::OutputClaimed(id, specification));
        }
        id
    }

    /// Start journaling mutations so they can be rolled back.
    pub(crate) fn begin(&mut self) -> Checkpoint {
        self.journal.get_or_insert_with(Vec::new);
        self.checkpoint()
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.as_ref().map_or(0, Vec::len))
    }

    /// Keep everything done since [`begin`](Self::begin) and close the
    /// journal.
    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change made after `checkpoint`, newest first.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        let undone = match self.journal.as_mut() {
            Some(journal) if checkpoint.0 < journal.len() => journal.split_off(checkpoint.0),
            _ => return,
        };
        trace!("rolling back {} change(s)", undone.len());
        for change in undone.into_iter().rev() {
            self.undo(change);
        }
    }

    fn record(&mut self, change: Change) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(change);
        }
    }

    fn undo(&mut self, change: Change) {
        match change {
            Change::NodeAdded(id) => {
                if let Some(node) = self.graph.remove_node(id) {
                    self.by_function_target
                        .remove(&(node.function_id().clone(), node.target().to_specification()));
                }
            }
            Change::OutputClaimed(id, specification) => {
                if let Some(node) = self.graph.node_weight_mut(id) {
                    node.remove_output_value(&specification);
                }
                self.producers.remove(&specification);
            }
            Change::InputWired {
                dependent,
                requirement,
                specification,
                edge,
            } => {
                if let Some(edge) = edge {
                    self.graph.remove_edge(edge);
                }
                if let Some(node) = self.graph.node_weight_mut(dependent) {
                    if let Some(requirement) = requirement {
                        node.remove_input_requirement(&requirement);
                    }
                    if let Some(specification) = specification {
                        node.remove_input_value(&specification);
                    }
                }
            }
            Change::TerminalAdded {
                specification,
                requirement,
                first,
            } => {
                if let Some(requirement) = requirement {
                    let emptied = self
                        .terminal_requirements
                        .get_mut(&specification)
                        .map_or(false, |requirements| {
                            requirements.retain(|r| *r != requirement);
                            requirements.is_empty()
                        });
                    if emptied {
                        self.terminal_requirements.remove(&specification);
                    }
                }
                if first {
                    self.terminal_outputs.retain(|spec| *spec != specification);
                }
            }
        }
    }

    /// True if `dependent` is `input` or transitively consumes its outputs.
    pub fn depends_on(&self, dependent: NodeId, input: NodeId) -> bool {
        dependent == input || has_path_connecting(&self.graph, input, dependent, None)
    }

    /// Mark `specification` as a requested output answering `requirement`.
    pub fn add_terminal_output(
        &mut self,
        specification: ValueSpecification,
        requirement: ValueRequirement,
    ) -> Result<(), DependencyGraphError> {
        if !self.producers.contains_key(&specification) {
            return Err(DependencyGraphError::InvalidArgument(format!(
                "terminal output {} has no producing node",
                specification
            )));
        }
        let requirements = self
            .terminal_requirements
            .entry(specification.clone())
            .or_default();
        let added = if requirements.contains(&requirement) {
            None
        } else {
            requirements.push(requirement.clone());
            Some(requirement)
        };
        let first = !self.terminal_outputs.contains(&specification);
        if first {
            self.terminal_outputs.push(specification.clone());
        }
        self.record(Change::TerminalAdded {
            specification,
            requirement: added,
            first,
        });
        Ok(())
    }

    /// Drop every output not needed by a terminal output, then every node
    /// left with no outputs and no dependents.
    ///
    /// An output is needed if it is terminal or is consumed by a node that
    /// a terminal output transitively depends on. Edges between surviving
    /// nodes are untouched.
    pub fn remove_unnecessary_values(&mut self) {
        let mut retained: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = self
            .terminal_outputs
            .iter()
            .filter_map(|spec| self.producers.get(spec).copied())
            .collect();
        while let Some(id) = queue.pop_front() {
            if retained.insert(id) {
                queue.extend(self.graph.neighbors_directed(id, Direction::Incoming));
            }
        }

        let mut needed: HashSet<ValueSpecification> =
            self.terminal_outputs.iter().cloned().collect();
        for &id in &retained {
            needed.extend(self.graph[id].input_values().iter().cloned());
        }

        let mut dropped_values = 0;
        let ids: Vec<NodeId> = self.graph.node_indices().collect();
        for id in ids {
            let dropped = self.graph[id].retain_outputs(|spec| needed.contains(spec));
            for spec in dropped {
                trace!("pruned output {}", spec);
                self.producers.remove(&spec);
                dropped_values += 1;
            }
        }

        let mut removed_nodes = 0;
        loop {
            let unused: Vec<NodeId> = self
                .graph
                .node_indices()
                .filter(|&id| {
                    self.graph[id].output_values().is_empty()
                        && self
                            .graph
                            .neighbors_directed(id, Direction::Outgoing)
                            .next()
                            .is_none()
                })
                .collect();
            if unused.is_empty() {
                break;
            }
            for id in unused {
                if let Some(node) = self.graph.remove_node(id) {
                    trace!("pruned node {}", node);
                    self.by_function_target
                        .remove(&(node.function_id().clone(), node.target().to_specification()));
                    removed_nodes += 1;
                }
            }
        }

        debug!(
            "[{}] pruning removed {} output(s) and {} node(s); {} node(s) remain",
            self.calculation_configuration,
            dropped_values,
            removed_nodes,
            self.graph.node_count()
        );
    }

    /// Node ids ordered so every node comes after all of its inputs.
    pub fn execution_order(&self) -> Result<Vec<NodeId>, DependencyGraphError> {
        toposort(&self.graph, None).map_err(|cycle| {
            DependencyGraphError::CyclicGraph(format!(
                "cycle through {}",
                self.graph[cycle.node_id()]
            ))
        })
    }

    /// Length of the longest input chain, counted in nodes.
    pub fn depth(&self) -> usize {
        let order = match self.execution_order() {
            Ok(order) => order,
            Err(_) => return 0,
        };
        let mut levels: HashMap<NodeId, usize> = HashMap::with_capacity(order.len());
        let mut deepest = 0;
        for id in order {
            let level = 1 + self
                .graph
                .neighbors_directed(id, Direction::Incoming)
                .filter_map(|input| levels.get(&input).copied())
                .max()
                .unwrap_or(0);
            deepest = deepest.max(level);
            levels.insert(id, level);
        }
        deepest
    }

    /// Write an indented tree of the graph, starting from its roots.
    ///
    /// Shared inputs are printed in full once and referenced afterwards.
    pub fn dump_structure<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "Dependency graph [{}]: {} node(s), {} terminal output(s)",
            self.calculation_configuration,
            self.node_count(),
            self.terminal_outputs.len()
        )?;
        let mut printed = HashSet::new();
        for root in self.root_nodes() {
            self.dump_node(out, root, 1, &mut printed)?;
        }
        Ok(())
    }

    fn dump_node<W: io::Write>(
        &self,
        out: &mut W,
        id: NodeId,
        indent: usize,
        printed: &mut HashSet<NodeId>,
    ) -> io::Result<()> {
        let pad = "  ".repeat(indent);
        let node = &self.graph[id];
        if !printed.insert(id) {
            return writeln!(out, "{}{} (see above)", pad, node);
        }
        writeln!(out, "{}{}", pad, node)?;
        for spec in node.output_values() {
            writeln!(out, "{}  => {}", pad, spec)?;
        }
        for input in self.input_nodes(id) {
            self.dump_node(out, input, indent + 1, printed)?;
        }
        Ok(())
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            calculation_configuration: self.calculation_configuration.clone(),
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            live_data_node_count: self.nodes().filter(|n| n.is_live_data()).count(),
            output_value_count: self.producers.len(),
            terminal_output_count: self.terminal_outputs.len(),
            depth: self.depth(),
        }
    }
}

fn unknown_node(id: NodeId) -> DependencyGraphError {
    DependencyGraphError::InvalidArgument(format!("no node {:?} in graph", id))
}

/// Borrowed view of a node that can follow its edges.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    graph: &'a DependencyGraph,
    id: NodeId,
    node: &'a DependencyNode,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a DependencyNode {
        self.node
    }

    pub fn input_nodes(&self) -> Vec<NodeRef<'a>> {
        let graph = self.graph;
        graph
            .input_nodes(self.id)
            .into_iter()
            .filter_map(|id| graph.node(id))
            .collect()
    }

    /// Back-references: nodes that take an output of this one as input.
    pub fn dependent_nodes(&self) -> Vec<NodeRef<'a>> {
        let graph = self.graph;
        graph
            .dependent_nodes(self.id)
            .into_iter()
            .filter_map(|id| graph.node(id))
            .collect()
    }
}

impl Deref for NodeRef<'_> {
    type Target = DependencyNode;

    fn deref(&self) -> &DependencyNode {
        self.node
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("node", self.node)
            .finish()
    }
}

/// Headline statistics of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub calculation_configuration: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub live_data_node_count: usize,
    pub output_value_count: usize,
    pub terminal_output_count: usize,
    pub depth: usize,
}
