use crate::core::target::ComputationTarget;
use crate::core::value::{ValueRequirement, ValueSpecification};
use crate::function::definition::{FunctionDefinition, FunctionId};
use petgraph::stable_graph::NodeIndex;
use std::fmt;
use std::sync::Arc;

/// Stable handle to a node inside a [`DependencyGraph`](super::DependencyGraph).
///
/// Handles stay valid across pruning for the nodes that survive it.
pub type NodeId = NodeIndex;

/// One function invocation in the graph: a function applied to a target,
/// the values it outputs, and the values it consumes.
///
/// Edges to input and dependent nodes live in the owning graph; see
/// [`NodeRef`](super::NodeRef) for navigation.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    function: Arc<dyn FunctionDefinition>,
    target: ComputationTarget,
    /// Insertion ordered, no duplicates.
    output_values: Vec<ValueSpecification>,
    input_values: Vec<ValueSpecification>,
    input_requirements: Vec<ValueRequirement>,
}

impl DependencyNode {
    pub fn new(function: Arc<dyn FunctionDefinition>, target: ComputationTarget) -> Self {
        Self {
            function,
            target,
            output_values: Vec::new(),
            input_values: Vec::new(),
            input_requirements: Vec::new(),
        }
    }

    pub fn function(&self) -> &Arc<dyn FunctionDefinition> {
        &self.function
    }

    pub fn function_id(&self) -> &FunctionId {
        self.function.id()
    }

    pub fn target(&self) -> &ComputationTarget {
        &self.target
    }

    pub fn output_values(&self) -> &[ValueSpecification] {
        &self.output_values
    }

    pub fn input_values(&self) -> &[ValueSpecification] {
        &self.input_values
    }

    /// The requirements this node asked for, as declared by its function.
    pub fn input_requirements(&self) -> &[ValueRequirement] {
        &self.input_requirements
    }

    pub fn produces(&self, specification: &ValueSpecification) -> bool {
        self.output_values.contains(specification)
    }

    pub fn is_live_data(&self) -> bool {
        self.function.is_live_data_source()
    }

    pub(crate) fn add_output_value(&mut self, specification: ValueSpecification) -> bool {
        push_unique(&mut self.output_values, specification)
    }

    pub(crate) fn add_input_value(&mut self, specification: ValueSpecification) -> bool {
        push_unique(&mut self.input_values, specification)
    }

    pub(crate) fn add_input_requirement(&mut self, requirement: ValueRequirement) -> bool {
        push_unique(&mut self.input_requirements, requirement)
    }

    pub(crate) fn remove_output_value(&mut self, specification: &ValueSpecification) {
        self.output_values.retain(|spec| spec != specification);
    }

    pub(crate) fn remove_input_value(&mut self, specification: &ValueSpecification) {
        self.input_values.retain(|spec| spec != specification);
    }

    pub(crate) fn remove_input_requirement(&mut self, requirement: &ValueRequirement) {
        self.input_requirements.retain(|req| req != requirement);
    }

    /// Keep only the outputs accepted by `keep`; returns the dropped ones.
    pub(crate) fn retain_outputs<F>(&mut self, mut keep: F) -> Vec<ValueSpecification>
    where
        F: FnMut(&ValueSpecification) -> bool,
    {
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.output_values)
            .into_iter()
            .partition(|spec| keep(spec));
        self.output_values = kept;
        dropped
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.function.short_name(), self.target)
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        false
    } else {
        items.push(item);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::{ComputationTargetType, UniqueId};
    use crate::function::definition::SimpleFunction;

    fn node() -> DependencyNode {
        let f = SimpleFunction::new("fn", ComputationTargetType::Primitive).producing("A");
        DependencyNode::new(
            Arc::new(f),
            ComputationTarget::primitive(UniqueId::of("Target", "1")),
        )
    }

    fn spec(name: &str) -> ValueSpecification {
        let target = ComputationTarget::primitive(UniqueId::of("Target", "1"));
        ValueSpecification::from_requirement(&ValueRequirement::on(name, &target), "fn")
    }

    #[test]
    fn test_outputs_are_insertion_ordered_sets() {
        let mut n = node();
        assert!(n.add_output_value(spec("B")));
        assert!(n.add_output_value(spec("A")));
        assert!(!n.add_output_value(spec("B")));
        let names: Vec<&str> = n.output_values().iter().map(|s| s.value_name()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_retain_outputs_returns_dropped() {
        let mut n = node();
        n.add_output_value(spec("A"));
        n.add_output_value(spec("B"));
        let dropped = n.retain_outputs(|s| s.value_name() == "A");
        assert_eq!(dropped, vec![spec("B")]);
        assert_eq!(n.output_values(), &[spec("A")]);
        assert!(n.produces(&spec("A")));
        assert!(!n.produces(&spec("B")));
    }

    #[test]
    fn test_display() {
        assert_eq!(node().to_string(), "fn on PRIMITIVE[Target~1]");
    }
}
