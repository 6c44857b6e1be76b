use crate::core::target::ComputationTarget;
use crate::core::value::{ValueRequirement, ValueSpecification};
use crate::function::definition::{FunctionDefinition, FunctionId};
use crate::function::repository::FunctionRepository;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A function able to produce a requirement, with the specification it
/// would produce for it.
#[derive(Debug, Clone)]
pub struct ResolutionCandidate {
    pub function: Arc<dyn FunctionDefinition>,
    pub specification: ValueSpecification,
    pub priority: i32,
}

/// Looks up the functions that can produce a value.
///
/// Candidates come back in the order they should be tried. An empty list
/// is not an error here: the builder decides what an unresolved
/// requirement means.
pub trait FunctionResolver: Send + Sync {
    fn resolve(
        &self,
        target: &ComputationTarget,
        requirement: &ValueRequirement,
    ) -> Vec<ResolutionCandidate>;
}

/// Ranks functions; higher values are tried first.
pub trait FunctionPriority: Send + Sync {
    fn priority(&self, function: &dyn FunctionDefinition) -> i32;
}

impl<F> FunctionPriority for F
where
    F: Fn(&dyn FunctionDefinition) -> i32 + Send + Sync,
{
    fn priority(&self, function: &dyn FunctionDefinition) -> i32 {
        self(function)
    }
}

/// Resolver over a [`FunctionRepository`].
///
/// A function is a candidate when it applies to the target and one of its
/// declared results satisfies the requirement; the candidate specification
/// is that result composed with the requirement's constraints. Candidates
/// are ordered by priority, highest first, with registration order
/// breaking ties.
pub struct DefaultFunctionResolver {
    repository: FunctionRepository,
    priority: Option<Box<dyn FunctionPriority>>,
    blacklist: HashSet<FunctionId>,
}

impl DefaultFunctionResolver {
    pub fn new(repository: FunctionRepository) -> Self {
        Self {
            repository,
            priority: None,
            blacklist: HashSet::new(),
        }
    }

    pub fn with_priority(mut self, priority: impl FunctionPriority + 'static) -> Self {
        self.priority = Some(Box::new(priority));
        self
    }

    /// Exclude a function from resolution without removing it from the
    /// repository.
    pub fn with_blacklisted(mut self, id: impl Into<FunctionId>) -> Self {
        self.blacklist.insert(id.into());
        self
    }

    pub fn repository(&self) -> &FunctionRepository {
        &self.repository
    }

    fn priority_of(&self, function: &dyn FunctionDefinition) -> i32 {
        self.priority.as_ref().map_or(0, |p| p.priority(function))
    }
}

impl fmt::Debug for DefaultFunctionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultFunctionResolver")
            .field("functions", &self.repository.len())
            .field("prioritised", &self.priority.is_some())
            .field("blacklist", &self.blacklist)
            .finish()
    }
}

impl FunctionResolver for DefaultFunctionResolver {
    fn resolve(
        &self,
        target: &ComputationTarget,
        requirement: &ValueRequirement,
    ) -> Vec<ResolutionCandidate> {
        let mut candidates = Vec::new();
        for function in self.repository.functions() {
            if self.blacklist.contains(function.id()) || !function.can_apply_to(target) {
                continue;
            }
            let priority = self.priority_of(function.as_ref());
            for result in function.results(target) {
                if requirement.is_satisfied_by(&result) {
                    candidates.push(ResolutionCandidate {
                        function: Arc::clone(function),
                        specification: result.compose(requirement),
                        priority,
                    });
                }
            }
        }
        // Stable sort keeps registration order among equal priorities.
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::properties::ValueProperties;
    use crate::core::target::{ComputationTargetType, UniqueId};
    use crate::function::definition::SimpleFunction;

    fn target() -> ComputationTarget {
        ComputationTarget::primitive(UniqueId::of("Target", "1"))
    }

    fn repository() -> FunctionRepository {
        let mut repo = FunctionRepository::new();
        repo.add_function(
            SimpleFunction::new("foo", ComputationTargetType::Primitive)
                .producing_with("A", ValueProperties::new().with("TEST", "Foo")),
        )
        .unwrap();
        repo.add_function(
            SimpleFunction::new("bar", ComputationTargetType::Primitive)
                .producing_with("A", ValueProperties::new().with("TEST", "Bar")),
        )
        .unwrap();
        repo.add_function(
            SimpleFunction::new("any", ComputationTargetType::Primitive)
                .producing_with("A", ValueProperties::new().with_any("TEST")),
        )
        .unwrap();
        repo
    }

    fn ids(candidates: &[ResolutionCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.function.id().as_str()).collect()
    }

    #[test]
    fn test_unconstrained_matches_all_in_registration_order() {
        let resolver = DefaultFunctionResolver::new(repository());
        let candidates = resolver.resolve(&target(), &ValueRequirement::on("A", &target()));
        assert_eq!(ids(&candidates), vec!["foo", "bar", "any"]);
    }

    #[test]
    fn test_constraints_filter_and_compose() {
        let resolver = DefaultFunctionResolver::new(repository());
        let req = ValueRequirement::on("A", &target()).with_constraint("TEST", "Bar");
        let candidates = resolver.resolve(&target(), &req);
        assert_eq!(ids(&candidates), vec!["bar", "any"]);
        assert_eq!(candidates[1].specification.property("TEST"), Some("Bar"));
    }

    #[test]
    fn test_priority_orders_candidates() {
        let resolver = DefaultFunctionResolver::new(repository()).with_priority(
            |f: &dyn FunctionDefinition| if f.id().as_str() == "any" { 1 } else { 0 },
        );
        let candidates = resolver.resolve(&target(), &ValueRequirement::on("A", &target()));
        assert_eq!(ids(&candidates), vec!["any", "foo", "bar"]);
    }

    #[test]
    fn test_blacklist_excludes() {
        let resolver = DefaultFunctionResolver::new(repository()).with_blacklisted("foo");
        let candidates = resolver.resolve(&target(), &ValueRequirement::on("A", &target()));
        assert_eq!(ids(&candidates), vec!["bar", "any"]);
    }

    #[test]
    fn test_no_candidates_is_empty() {
        let resolver = DefaultFunctionResolver::new(repository());
        assert!(resolver
            .resolve(&target(), &ValueRequirement::on("Missing", &target()))
            .is_empty());
    }
}
