//! Random function catalogs for benchmarks and property tests.
//!
//! Values are arranged in layers. Every producer of a layer `k` value
//! requires only values from layers below `k`, so any requested value is
//! resolvable. Optional "backward" alternatives require values from the
//! same or a higher layer and may close cycles the builder has to reject.

use crate::core::target::{ComputationTarget, UniqueId};
use crate::core::value::ValueRequirement;
use crate::function::definition::{FunctionDefinition, FunctionId, SimpleFunction};
use crate::function::live_data::FixedLiveDataOracle;
use crate::function::repository::FunctionRepository;
use crate::function::resolver::DefaultFunctionResolver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Shape of a generated catalog.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Number of value layers; layer 0 holds the leaves.
    pub layers: usize,
    /// Distinct value names per layer.
    pub values_per_layer: usize,
    /// Upper bound on the inputs of a single producer.
    pub max_inputs: usize,
    /// Producers per value beyond the first.
    pub alternatives: usize,
    /// Chance that a leaf value is sourced from live data.
    pub live_data_probability: f64,
    /// Chance that an alternative producer also requires a value from its
    /// own or a higher layer.
    pub backward_probability: f64,
    /// Fixed seed for reproducible catalogs; random when `None`.
    pub seed: Option<u64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            layers: 4,
            values_per_layer: 5,
            max_inputs: 3,
            alternatives: 1,
            live_data_probability: 0.5,
            backward_probability: 0.0,
            seed: None,
        }
    }
}

/// A generated catalog: the functions, the live data available, and the
/// target every function applies to.
#[derive(Debug, Clone)]
pub struct GeneratedCatalog {
    pub repository: FunctionRepository,
    pub live_data: FixedLiveDataOracle,
    pub target: ComputationTarget,
    pub priorities: HashMap<FunctionId, i32>,
    /// Value names by layer.
    pub layers: Vec<Vec<String>>,
}

impl GeneratedCatalog {
    /// A resolver ranking functions by their generated priorities.
    pub fn resolver(&self) -> DefaultFunctionResolver {
        let priorities = self.priorities.clone();
        DefaultFunctionResolver::new(self.repository.clone()).with_priority(
            move |function: &dyn FunctionDefinition| {
                priorities.get(function.id()).copied().unwrap_or(0)
            },
        )
    }

    /// Requirements for every value of the top layer.
    pub fn top_requirements(&self) -> Vec<ValueRequirement> {
        self.layers
            .last()
            .map(|names| {
                names
                    .iter()
                    .map(|name| ValueRequirement::on(name.as_str(), &self.target))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A requirement on any generated value.
    pub fn requirement(&self, layer: usize, index: usize) -> Option<ValueRequirement> {
        self.layers
            .get(layer)
            .and_then(|names| names.get(index))
            .map(|name| ValueRequirement::on(name.as_str(), &self.target))
    }
}

/// Generate a random layered catalog.
pub fn generate_random_catalog(config: &CatalogConfig) -> GeneratedCatalog {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let target = ComputationTarget::primitive(UniqueId::of("Catalog", "1")).with_name("catalog");
    let layer_count = config.layers.max(1);
    let width = config.values_per_layer.max(1);

    let layers: Vec<Vec<String>> = (0..layer_count)
        .map(|layer| (0..width).map(|i| format!("L{}V{:02}", layer, i)).collect())
        .collect();

    let mut repository = FunctionRepository::new();
    let mut live_data = FixedLiveDataOracle::new();
    let mut priorities = HashMap::new();
    let mut next_id = 0usize;

    for (layer, names) in layers.iter().enumerate() {
        for name in names {
            let producers = 1 + config.alternatives;
            for alternative in 0..producers {
                if layer == 0 && alternative == 0 && rng.gen_bool(config.live_data_probability) {
                    live_data = live_data.with_value_name(name.as_str());
                }

                let id = format!("fn{:04}", next_id);
                next_id += 1;
                let mut function =
                    SimpleFunction::new(id.as_str(), target.target_type()).producing(name.as_str());

                if layer > 0 {
                    let inputs = rng.gen_range(1..=config.max_inputs.max(1));
                    for _ in 0..inputs {
                        let input_layer = rng.gen_range(0..layer);
                        let input = &layers[input_layer][rng.gen_range(0..width)];
                        function = function.requiring(input.as_str());
                    }
                }
                if alternative > 0 && rng.gen_bool(config.backward_probability) {
                    let input_layer = rng.gen_range(layer..layer_count);
                    let input = &layers[input_layer][rng.gen_range(0..width)];
                    function = function.requiring(input.as_str());
                }

                priorities.insert(FunctionId::new(id), rng.gen_range(-2..=2));
                // Ids are generated unique.
                let _ = repository.add_function(function);
            }
        }
    }

    GeneratedCatalog {
        repository,
        live_data,
        target,
        priorities,
        layers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        let config = CatalogConfig {
            layers: 3,
            values_per_layer: 4,
            alternatives: 2,
            seed: Some(7),
            ..Default::default()
        };
        let catalog = generate_random_catalog(&config);
        assert_eq!(catalog.layers.len(), 3);
        assert_eq!(catalog.repository.len(), 3 * 4 * 3);
        assert_eq!(catalog.priorities.len(), catalog.repository.len());
        assert_eq!(catalog.top_requirements().len(), 4);
        assert!(catalog.requirement(3, 0).is_none());
    }

    #[test]
    fn test_seed_is_reproducible() {
        let config = CatalogConfig {
            seed: Some(42),
            ..Default::default()
        };
        let a = generate_random_catalog(&config);
        let b = generate_random_catalog(&config);
        assert_eq!(a.priorities, b.priorities);
        assert_eq!(
            format!("{:?}", a.repository.functions()),
            format!("{:?}", b.repository.functions())
        );
    }
}
