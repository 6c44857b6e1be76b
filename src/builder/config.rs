use crate::function::live_data::LiveDataPolicy;
use serde::{Deserialize, Serialize};

/// Settings for a [`DependencyGraphBuilder`](super::DependencyGraphBuilder).
///
/// Missing fields take their defaults when deserialized.
///
/// # Examples
///
/// ```
/// use depgraph_engine::builder::config::BuilderConfig;
/// use depgraph_engine::function::live_data::LiveDataPolicy;
///
/// let config: BuilderConfig =
///     serde_json::from_str(r#"{ "live_data_policy": "fallback" }"#).unwrap();
/// assert_eq!(config.live_data_policy, LiveDataPolicy::Fallback);
/// assert_eq!(config.calculation_configuration, "Default");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Name of the calculation configuration the graph is built for.
    pub calculation_configuration: String,
    /// Whether live data is preferred over computed values.
    pub live_data_policy: LiveDataPolicy,
    /// Maximum nesting of requirement resolution.
    pub max_depth: usize,
}

impl BuilderConfig {
    pub const DEFAULT_CALCULATION_CONFIGURATION: &'static str = "Default";
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    pub fn for_configuration(name: impl Into<String>) -> Self {
        Self {
            calculation_configuration: name.into(),
            ..Self::default()
        }
    }

    pub fn with_live_data_policy(mut self, policy: LiveDataPolicy) -> Self {
        self.live_data_policy = policy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            calculation_configuration: Self::DEFAULT_CALCULATION_CONFIGURATION.to_string(),
            live_data_policy: LiveDataPolicy::Strict,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}
