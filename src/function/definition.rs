use crate::core::properties::ValueProperties;
use crate::core::target::{ComputationTarget, ComputationTargetSpecification, ComputationTargetType};
use crate::core::value::{ValuePropertyNames, ValueRequirement, ValueSpecification};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a function in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(String);

impl FunctionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A unit of computation with declared inputs and outputs.
///
/// The graph builder only ever talks to functions through this trait.
/// Implementations are expected to be cheap, pure queries: the same
/// target and inputs must always produce the same answers.
pub trait FunctionDefinition: fmt::Debug + Send + Sync {
    fn id(&self) -> &FunctionId;

    fn short_name(&self) -> &str {
        self.id().as_str()
    }

    /// Whether this function can be applied to `target` at all.
    fn can_apply_to(&self, target: &ComputationTarget) -> bool;

    /// The values this function can produce on `target`, before its
    /// inputs are known. Properties may be wildcards.
    fn results(&self, target: &ComputationTarget) -> Vec<ValueSpecification>;

    /// The inputs needed to produce `desired` on `target`, or `None` if
    /// this function declines to produce it.
    fn requirements(
        &self,
        target: &ComputationTarget,
        desired: &ValueRequirement,
    ) -> Option<Vec<ValueRequirement>>;

    /// The values this function produces once its inputs are resolved.
    fn late_results(
        &self,
        target: &ComputationTarget,
        _inputs: &[ValueSpecification],
    ) -> Vec<ValueSpecification> {
        self.results(target)
    }

    /// Further inputs that depend on the resolved inputs and outputs.
    fn additional_requirements(
        &self,
        _target: &ComputationTarget,
        _inputs: &[ValueSpecification],
        _outputs: &[ValueSpecification],
    ) -> Vec<ValueRequirement> {
        Vec::new()
    }

    /// Only the distinguished live data leaf answers `true`.
    fn is_live_data_source(&self) -> bool {
        false
    }
}

/// The zero-input function standing in for a value sourced directly from
/// market data.
#[derive(Debug, Clone)]
pub struct LiveDataSourcingFunction {
    id: FunctionId,
}

impl LiveDataSourcingFunction {
    pub const ID: &'static str = "LiveDataSourcingFunction";

    pub fn new() -> Self {
        Self {
            id: FunctionId::new(Self::ID),
        }
    }

    /// The specification a live data leaf outputs for `requirement`.
    pub fn specification_for(requirement: &ValueRequirement) -> ValueSpecification {
        ValueSpecification::from_requirement(requirement, Self::ID)
    }
}

impl Default for LiveDataSourcingFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionDefinition for LiveDataSourcingFunction {
    fn id(&self) -> &FunctionId {
        &self.id
    }

    fn can_apply_to(&self, _target: &ComputationTarget) -> bool {
        true
    }

    fn results(&self, _target: &ComputationTarget) -> Vec<ValueSpecification> {
        Vec::new()
    }

    fn requirements(
        &self,
        _target: &ComputationTarget,
        _desired: &ValueRequirement,
    ) -> Option<Vec<ValueRequirement>> {
        Some(Vec::new())
    }

    fn is_live_data_source(&self) -> bool {
        true
    }
}

/// A declarative function: fixed outputs and inputs, expressed relative
/// to whatever target it is applied to.
///
/// # Examples
///
/// ```
/// use depgraph_engine::core::target::{ComputationTarget, ComputationTargetType, UniqueId};
/// use depgraph_engine::core::value::ValueRequirement;
/// use depgraph_engine::function::definition::{FunctionDefinition, SimpleFunction};
///
/// let pv = SimpleFunction::new("pv", ComputationTargetType::Security)
///     .producing("PresentValue")
///     .requiring("DiscountCurve");
///
/// let bond = ComputationTarget::new(ComputationTargetType::Security, UniqueId::of("Sec", "1"));
/// let results = pv.results(&bond);
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].function_id(), Some("pv"));
///
/// let inputs = pv.requirements(&bond, &ValueRequirement::on("PresentValue", &bond)).unwrap();
/// assert_eq!(inputs, vec![ValueRequirement::on("DiscountCurve", &bond)]);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleFunction {
    id: FunctionId,
    target_type: ComputationTargetType,
    /// Restricts the function to a single target when set.
    target: Option<ComputationTargetSpecification>,
    outputs: Vec<(String, ValueProperties)>,
    inputs: Vec<(String, ValueProperties)>,
    fixed_inputs: Vec<ValueRequirement>,
}

impl SimpleFunction {
    pub fn new(id: impl Into<String>, target_type: ComputationTargetType) -> Self {
        Self {
            id: FunctionId::new(id),
            target_type,
            target: None,
            outputs: Vec::new(),
            inputs: Vec::new(),
            fixed_inputs: Vec::new(),
        }
    }

    /// A function bound to exactly one target.
    pub fn for_target(id: impl Into<String>, target: &ComputationTarget) -> Self {
        let mut function = Self::new(id, target.target_type());
        function.target = Some(target.to_specification());
        function
    }

    pub fn producing(self, value_name: impl Into<String>) -> Self {
        self.producing_with(value_name, ValueProperties::new())
    }

    pub fn producing_with(
        mut self,
        value_name: impl Into<String>,
        properties: ValueProperties,
    ) -> Self {
        self.outputs.push((value_name.into(), properties));
        self
    }

    pub fn requiring(self, value_name: impl Into<String>) -> Self {
        self.requiring_with(value_name, ValueProperties::new())
    }

    pub fn requiring_with(
        mut self,
        value_name: impl Into<String>,
        constraints: ValueProperties,
    ) -> Self {
        self.inputs.push((value_name.into(), constraints));
        self
    }

    /// An input on an explicit target, which may differ from the one the
    /// function is applied to.
    pub fn requiring_value(mut self, requirement: ValueRequirement) -> Self {
        self.fixed_inputs.push(requirement);
        self
    }

    pub fn target_type(&self) -> ComputationTargetType {
        self.target_type
    }
}

impl FunctionDefinition for SimpleFunction {
    fn id(&self) -> &FunctionId {
        &self.id
    }

    fn can_apply_to(&self, target: &ComputationTarget) -> bool {
        match &self.target {
            Some(spec) => spec == target.specification(),
            None => target.target_type() == self.target_type,
        }
    }

    fn results(&self, target: &ComputationTarget) -> Vec<ValueSpecification> {
        self.outputs
            .iter()
            .map(|(name, properties)| {
                ValueSpecification::new(
                    name.clone(),
                    target.to_specification(),
                    properties
                        .clone()
                        .with(ValuePropertyNames::FUNCTION, self.id.as_str()),
                )
            })
            .collect()
    }

    fn requirements(
        &self,
        target: &ComputationTarget,
        _desired: &ValueRequirement,
    ) -> Option<Vec<ValueRequirement>> {
        let relative = self.inputs.iter().map(|(name, constraints)| {
            ValueRequirement::with_constraints(
                name.clone(),
                target.to_specification(),
                constraints.clone(),
            )
        });
        Some(relative.chain(self.fixed_inputs.iter().cloned()).collect())
    }
}
