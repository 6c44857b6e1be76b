use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The kind of thing a computation is performed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputationTargetType {
    /// An opaque identifier with no domain object behind it.
    Primitive,
    Security,
    Position,
    PortfolioNode,
    Trade,
}

impl fmt::Display for ComputationTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primitive => "PRIMITIVE",
            Self::Security => "SECURITY",
            Self::Position => "POSITION",
            Self::PortfolioNode => "PORTFOLIO_NODE",
            Self::Trade => "TRADE",
        };
        f.write_str(name)
    }
}

/// Scheme-qualified unique identifier, e.g. `Target~1`.
///
/// # Examples
///
/// ```
/// use depgraph_engine::core::target::UniqueId;
///
/// let id = UniqueId::of("Sec", "AAPL");
/// assert_eq!(id.to_string(), "Sec~AAPL");
/// assert_eq!(UniqueId::parse("Sec~AAPL"), Some(id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniqueId {
    scheme: String,
    value: String,
}

impl UniqueId {
    pub fn of(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }

    /// Parse the `scheme~value` form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let (scheme, value) = s.split_once('~')?;
        if scheme.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self::of(scheme, value))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.scheme, self.value)
    }
}

/// A reference to a computation target: its type plus its identifier.
///
/// Value requirements and specifications carry this rather than the
/// target itself so they stay small and comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComputationTargetSpecification {
    target_type: ComputationTargetType,
    id: UniqueId,
}

impl ComputationTargetSpecification {
    pub fn new(target_type: ComputationTargetType, id: UniqueId) -> Self {
        Self { target_type, id }
    }

    pub fn primitive(id: UniqueId) -> Self {
        Self::new(ComputationTargetType::Primitive, id)
    }

    pub fn target_type(&self) -> ComputationTargetType {
        self.target_type
    }

    pub fn id(&self) -> &UniqueId {
        &self.id
    }
}

impl fmt::Display for ComputationTargetSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.target_type, self.id)
    }
}

/// A typed, identified thing a computation is performed against.
///
/// Targets are produced by a [`TargetResolver`] and compared by
/// `(type, identity)`. Any resolved domain payload is carried as an
/// optional display name only; functions that need richer data look it
/// up through their own collaborators.
///
/// # Examples
///
/// ```
/// use depgraph_engine::core::target::{ComputationTarget, ComputationTargetType, UniqueId};
///
/// let a = ComputationTarget::new(ComputationTargetType::Security, UniqueId::of("Sec", "1"));
/// let b = ComputationTarget::new(ComputationTargetType::Security, UniqueId::of("Sec", "1"))
///     .with_name("Some bond");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationTarget {
    specification: ComputationTargetSpecification,
    name: Option<String>,
}

impl ComputationTarget {
    pub fn new(target_type: ComputationTargetType, id: UniqueId) -> Self {
        Self {
            specification: ComputationTargetSpecification::new(target_type, id),
            name: None,
        }
    }

    /// A primitive target around a bare identifier.
    pub fn primitive(id: UniqueId) -> Self {
        Self::new(ComputationTargetType::Primitive, id)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn target_type(&self) -> ComputationTargetType {
        self.specification.target_type
    }

    pub fn id(&self) -> &UniqueId {
        &self.specification.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn to_specification(&self) -> ComputationTargetSpecification {
        self.specification.clone()
    }

    pub fn specification(&self) -> &ComputationTargetSpecification {
        &self.specification
    }
}

impl PartialEq for ComputationTarget {
    fn eq(&self, other: &Self) -> bool {
        self.specification == other.specification
    }
}

impl Eq for ComputationTarget {}

impl std::hash::Hash for ComputationTarget {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.specification.hash(state);
    }
}

impl fmt::Display for ComputationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.specification, name),
            None => write!(f, "{}", self.specification),
        }
    }
}

/// Turns a target reference into a concrete target.
///
/// The builder consults this only for inputs that live on a different
/// target from the one that requires them.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, specification: &ComputationTargetSpecification) -> Option<ComputationTarget>;
}

/// In-memory [`TargetResolver`] backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapTargetResolver {
    targets: HashMap<ComputationTargetSpecification, ComputationTarget>,
}

impl MapTargetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_target(&mut self, target: ComputationTarget) {
        self.targets.insert(target.to_specification(), target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl FromIterator<ComputationTarget> for MapTargetResolver {
    fn from_iter<I: IntoIterator<Item = ComputationTarget>>(iter: I) -> Self {
        let mut resolver = Self::new();
        for target in iter {
            resolver.add_target(target);
        }
        resolver
    }
}

impl TargetResolver for MapTargetResolver {
    fn resolve(&self, specification: &ComputationTargetSpecification) -> Option<ComputationTarget> {
        self.targets.get(specification).cloned()
    }
}
