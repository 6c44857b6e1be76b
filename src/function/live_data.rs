use crate::core::value::ValueRequirement;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Answers whether a requirement can be observed directly from market
/// data, without computation.
pub trait LiveDataOracle: Send + Sync {
    fn is_available(&self, requirement: &ValueRequirement) -> bool;
}

impl<F> LiveDataOracle for F
where
    F: Fn(&ValueRequirement) -> bool + Send + Sync,
{
    fn is_available(&self, requirement: &ValueRequirement) -> bool {
        self(requirement)
    }
}

/// When the live data oracle is consulted relative to the function
/// resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveDataPolicy {
    /// Live data wins: the oracle is asked first and computed resolution
    /// is never attempted for an available value.
    #[default]
    Strict,
    /// Computation wins: the oracle is asked only once every candidate
    /// function has failed.
    Fallback,
}

/// Oracle over a fixed set of available values.
///
/// Values can be registered either as exact requirements or by value name
/// (available on every target).
#[derive(Debug, Clone, Default)]
pub struct FixedLiveDataOracle {
    requirements: HashSet<ValueRequirement>,
    value_names: HashSet<String>,
}

impl FixedLiveDataOracle {
    /// An oracle for which nothing is available.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_requirement(mut self, requirement: ValueRequirement) -> Self {
        self.add_requirement(requirement);
        self
    }

    pub fn with_value_name(mut self, value_name: impl Into<String>) -> Self {
        self.value_names.insert(value_name.into());
        self
    }

    pub fn add_requirement(&mut self, requirement: ValueRequirement) {
        self.requirements.insert(requirement);
    }
}

impl LiveDataOracle for FixedLiveDataOracle {
    fn is_available(&self, requirement: &ValueRequirement) -> bool {
        self.value_names.contains(requirement.value_name())
            || self.requirements.contains(requirement)
    }
}
