use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The values a single property may take.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValues {
    /// Wildcard: any value is acceptable (on a constraint) or can be
    /// produced (on a specification).
    Any,
    Values(BTreeSet<String>),
}

impl PropertyValues {
    pub fn single(value: impl Into<String>) -> Self {
        Self::Values(std::iter::once(value.into()).collect())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Values(values) => values.contains(value),
        }
    }

    /// True if some value is acceptable to both sides.
    fn intersects(&self, other: &PropertyValues) -> bool {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::Values(a), Self::Values(b)) => !a.is_disjoint(b),
        }
    }

    fn intersection(&self, other: &PropertyValues) -> PropertyValues {
        match (self, other) {
            (Self::Any, x) | (x, Self::Any) => x.clone(),
            (Self::Values(a), Self::Values(b)) => {
                Self::Values(a.intersection(b).cloned().collect())
            }
        }
    }
}

impl fmt::Display for PropertyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Values(values) => {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(","))
            }
        }
    }
}

/// A set of named properties, used both as constraints on a
/// [`ValueRequirement`](crate::core::value::ValueRequirement) and as the
/// concrete description of a
/// [`ValueSpecification`](crate::core::value::ValueSpecification).
///
/// Ordered maps keep equality and hashing structural, so two property sets
/// built independently compare equal when their contents match.
///
/// # Examples
///
/// ```
/// use depgraph_engine::core::properties::ValueProperties;
///
/// let constraints = ValueProperties::new().with("Currency", "USD");
/// let produced = ValueProperties::new().with_any("Currency").with("Curve", "OIS");
/// assert!(constraints.is_satisfied_by(&produced));
///
/// let composed = produced.compose(&constraints);
/// assert_eq!(composed.value("Currency"), Some("USD"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueProperties {
    properties: BTreeMap<String, PropertyValues>,
}

impl ValueProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single value to a property, creating it if needed.
    ///
    /// Adding to a wildcard property leaves it a wildcard.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.properties.entry(name.into()) {
            std::collections::btree_map::Entry::Vacant(e) => {
                e.insert(PropertyValues::single(value));
            }
            std::collections::btree_map::Entry::Occupied(mut e) => {
                if let PropertyValues::Values(values) = e.get_mut() {
                    values.insert(value);
                }
            }
        }
        self
    }

    pub fn with_values<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        for value in values {
            self = self.with(name.clone(), value);
        }
        self
    }

    /// Mark a property as a wildcard, replacing any values it had.
    pub fn with_any(mut self, name: impl Into<String>) -> Self {
        self.properties.insert(name.into(), PropertyValues::Any);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.properties.remove(name);
        self
    }

    pub fn values(&self, name: &str) -> Option<&PropertyValues> {
        self.properties.get(name)
    }

    /// The value of a property that has exactly one value.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.properties.get(name)? {
            PropertyValues::Values(values) if values.len() == 1 => {
                values.iter().next().map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValues)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Treating `self` as constraints, check whether `properties` can
    /// satisfy them: every constrained name must be defined and the value
    /// sets must overlap (a wildcard on either side always overlaps).
    pub fn is_satisfied_by(&self, properties: &ValueProperties) -> bool {
        self.properties.iter().all(|(name, wanted)| {
            properties
                .properties
                .get(name)
                .map_or(false, |offered| wanted.intersects(offered))
        })
    }

    /// Narrow these (produced) properties to what `constraints` asks for.
    ///
    /// Properties not mentioned by the constraints are left alone.
    pub fn compose(&self, constraints: &ValueProperties) -> ValueProperties {
        let mut composed = self.clone();
        for (name, wanted) in &constraints.properties {
            if let Some(offered) = composed.properties.get_mut(name) {
                let narrowed = offered.intersection(wanted);
                *offered = narrowed;
            }
        }
        composed
    }

    /// Merge two property sets; names present in both take the union of
    /// their values, a wildcard on either side wins.
    pub fn union(&self, other: &ValueProperties) -> ValueProperties {
        let mut merged = self.clone();
        for (name, values) in &other.properties {
            match (merged.properties.get_mut(name), values) {
                (None, _) => {
                    merged.properties.insert(name.clone(), values.clone());
                }
                (Some(existing), PropertyValues::Any) => *existing = PropertyValues::Any,
                (Some(PropertyValues::Values(existing)), PropertyValues::Values(more)) => {
                    existing.extend(more.iter().cloned());
                }
                (Some(PropertyValues::Any), PropertyValues::Values(_)) => {}
            }
        }
        merged
    }
}

impl fmt::Display for ValueProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, values)) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", name, values)?;
        }
        f.write_str("}")
    }
}
