use crate::core::properties::ValueProperties;
use crate::core::target::{ComputationTarget, ComputationTargetSpecification};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known property names.
pub struct ValuePropertyNames;

impl ValuePropertyNames {
    /// Identifier of the function that produces a value.
    pub const FUNCTION: &'static str = "Function";
    pub const CURRENCY: &'static str = "Currency";
    pub const CALCULATION_CONFIGURATION: &'static str = "CalculationConfiguration";
}

/// A request for a named value computed with respect to a target.
///
/// Constraints disambiguate between producers. Requirements are plain
/// values: two requirements built independently are equal when their
/// name, target and constraints match.
///
/// # Examples
///
/// ```
/// use depgraph_engine::core::target::{ComputationTargetSpecification, UniqueId};
/// use depgraph_engine::core::value::ValueRequirement;
///
/// let target = ComputationTargetSpecification::primitive(UniqueId::of("Target", "1"));
/// let req = ValueRequirement::new("PresentValue", target.clone()).with_constraint("Currency", "USD");
/// assert_eq!(req.value_name(), "PresentValue");
/// assert_eq!(req.target_specification(), &target);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRequirement {
    value_name: String,
    target: ComputationTargetSpecification,
    #[serde(default)]
    constraints: ValueProperties,
}

impl ValueRequirement {
    pub fn new(value_name: impl Into<String>, target: ComputationTargetSpecification) -> Self {
        Self {
            value_name: value_name.into(),
            target,
            constraints: ValueProperties::new(),
        }
    }

    pub fn with_constraints(
        value_name: impl Into<String>,
        target: ComputationTargetSpecification,
        constraints: ValueProperties,
    ) -> Self {
        Self {
            value_name: value_name.into(),
            target,
            constraints,
        }
    }

    /// Requirement on a concrete target.
    pub fn on(value_name: impl Into<String>, target: &ComputationTarget) -> Self {
        Self::new(value_name, target.to_specification())
    }

    pub fn with_constraint(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints = self.constraints.with(name, value);
        self
    }

    pub fn with_any_constraint(mut self, name: impl Into<String>) -> Self {
        self.constraints = self.constraints.with_any(name);
        self
    }

    pub fn value_name(&self) -> &str {
        &self.value_name
    }

    pub fn target_specification(&self) -> &ComputationTargetSpecification {
        &self.target
    }

    pub fn constraints(&self) -> &ValueProperties {
        &self.constraints
    }

    /// True if `specification` is an acceptable answer to this request.
    pub fn is_satisfied_by(&self, specification: &ValueSpecification) -> bool {
        self.value_name == specification.value_name
            && self.target == specification.target
            && self.constraints.is_satisfied_by(&specification.properties)
    }
}

impl fmt::Display for ValueRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.value_name, self.target)?;
        if !self.constraints.is_empty() {
            write!(f, " {}", self.constraints)?;
        }
        Ok(())
    }
}

/// The concrete, resolved description of a value a function promises to
/// output.
///
/// The producing function is recorded as the
/// [`ValuePropertyNames::FUNCTION`] property, so equality over
/// `(name, target, properties)` also distinguishes producers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueSpecification {
    value_name: String,
    target: ComputationTargetSpecification,
    properties: ValueProperties,
}

impl ValueSpecification {
    pub fn new(
        value_name: impl Into<String>,
        target: ComputationTargetSpecification,
        properties: ValueProperties,
    ) -> Self {
        Self {
            value_name: value_name.into(),
            target,
            properties,
        }
    }

    /// Specification shaped like `requirement`, produced by `function_id`.
    ///
    /// The requirement's constraints become the specification's properties.
    pub fn from_requirement(requirement: &ValueRequirement, function_id: &str) -> Self {
        Self {
            value_name: requirement.value_name.clone(),
            target: requirement.target.clone(),
            properties: requirement
                .constraints
                .clone()
                .without(ValuePropertyNames::FUNCTION)
                .with(ValuePropertyNames::FUNCTION, function_id),
        }
    }

    pub fn value_name(&self) -> &str {
        &self.value_name
    }

    pub fn target_specification(&self) -> &ComputationTargetSpecification {
        &self.target
    }

    pub fn properties(&self) -> &ValueProperties {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.value(name)
    }

    pub fn function_id(&self) -> Option<&str> {
        self.properties.value(ValuePropertyNames::FUNCTION)
    }

    /// Narrow wildcard properties to what `requirement` constrains them to.
    pub fn compose(&self, requirement: &ValueRequirement) -> ValueSpecification {
        Self {
            value_name: self.value_name.clone(),
            target: self.target.clone(),
            properties: self.properties.compose(&requirement.constraints),
        }
    }

    /// A requirement that this specification (and only equivalent ones)
    /// would satisfy.
    pub fn to_requirement(&self) -> ValueRequirement {
        ValueRequirement::with_constraints(
            self.value_name.clone(),
            self.target.clone(),
            self.properties.clone(),
        )
    }
}

impl fmt::Display for ValueSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} {}", self.value_name, self.target, self.properties)
    }
}
