use depgraph_engine::prelude::*;
use depgraph_engine::simulation::{generate_random_catalog, CatalogConfig, GeneratedCatalog};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashSet;
use std::sync::Arc;

/// Small layered catalogs; `backward` allows alternatives that may close cycles.
fn arb_catalog_config(backward: bool) -> impl Strategy<Value = CatalogConfig> {
    let backward_scale = if backward { 1.0 } else { 0.0 };
    (
        any::<u64>(),
        1usize..5,
        1usize..6,
        1usize..4,
        0usize..3,
        0.0f64..=1.0,
        0.0f64..0.6,
    )
        .prop_map(
            move |(seed, layers, values_per_layer, max_inputs, alternatives, live, backward)| {
                CatalogConfig {
                    layers,
                    values_per_layer,
                    max_inputs,
                    alternatives,
                    live_data_probability: live,
                    backward_probability: backward * backward_scale,
                    seed: Some(seed),
                }
            },
        )
}

fn arb_policy() -> impl Strategy<Value = LiveDataPolicy> {
    prop::sample::select(vec![LiveDataPolicy::Strict, LiveDataPolicy::Fallback])
}

fn builder_for(catalog: &GeneratedCatalog, policy: LiveDataPolicy) -> DependencyGraphBuilder {
    DependencyGraphBuilder::new(
        BuilderConfig::default().with_live_data_policy(policy),
        Arc::new(catalog.resolver()),
    )
    .with_live_data(Arc::new(catalog.live_data.clone()))
}

/// Structural invariants every built graph must hold.
fn check_graph(graph: &DependencyGraph) -> Result<(), TestCaseError> {
    prop_assert!(graph.execution_order().is_ok(), "graph must be acyclic");

    let mut keys = HashSet::new();
    let mut outputs = HashSet::new();
    for node in graph.nodes() {
        prop_assert!(
            keys.insert((node.function_id().clone(), node.target().to_specification())),
            "duplicate node for {}",
            *node
        );
        for spec in node.output_values() {
            prop_assert!(outputs.insert(spec.clone()), "{} produced twice", spec);
            prop_assert_eq!(graph.producer_of(spec), Some(node.id()));
        }
        let input_nodes = graph.input_nodes(node.id());
        for spec in node.input_values() {
            if let Some(producer) = graph.producer_of(spec) {
                prop_assert!(
                    input_nodes.contains(&producer),
                    "input {} of {} is not wired to its producer",
                    spec,
                    *node
                );
            }
        }
    }
    for spec in graph.terminal_output_values() {
        prop_assert!(graph.contains_output(spec), "terminal {} has no producer", spec);
    }
    // Abandoned candidates leave nothing behind, so every root answers a
    // request.
    for root in graph.root_nodes() {
        let node = graph.node(root).unwrap();
        prop_assert!(
            node.output_values()
                .iter()
                .any(|spec| graph.terminal_output_values().contains(spec)),
            "root {} produces no terminal output",
            *node
        );
    }
    Ok(())
}

proptest! {
    // ===================================================================
    // INVARIANT 1: Layered catalogs always resolve.
    //
    // Every producer requires only lower-layer values, so every value of
    // the top layer has an acyclic resolution under either policy.
    // ===================================================================
    #[test]
    fn acyclic_catalog_always_resolves(
        config in arb_catalog_config(false),
        policy in arb_policy(),
    ) {
        let catalog = generate_random_catalog(&config);
        let mut builder = builder_for(&catalog, policy);
        let requirements = catalog.top_requirements();
        let result = builder.add_target(&catalog.target, requirements.clone());
        prop_assert!(result.is_ok(), "resolution failed: {:?}", result.err());
        prop_assert_eq!(
            builder.graph().terminal_output_values().len(),
            requirements.len()
        );
        for node in builder.graph().nodes() {
            prop_assert!(!node.output_values().is_empty(), "{} has no outputs", *node);
        }
    }

    // ===================================================================
    // INVARIANT 2: Built graphs are structurally sound.
    //
    // Acyclic, one node per (function, target), one producer per output,
    // and every consumed value wired to its producer, even when some
    // candidates would close cycles.
    // ===================================================================
    #[test]
    fn built_graph_is_sound(
        config in arb_catalog_config(true),
        policy in arb_policy(),
    ) {
        let catalog = generate_random_catalog(&config);
        let mut builder = builder_for(&catalog, policy);
        for requirement in catalog.top_requirements() {
            let _ = builder.add_target(&catalog.target, [requirement]);
        }
        check_graph(builder.graph())?;
    }

    // ===================================================================
    // INVARIANT 3: A failed add_target changes nothing.
    //
    // The graph and requirement mapping after a failure are exactly those
    // left by the previous successful calls.
    // ===================================================================
    #[test]
    fn failure_is_atomic(
        config in arb_catalog_config(true),
        policy in arb_policy(),
    ) {
        let catalog = generate_random_catalog(&config);
        let mut builder = builder_for(&catalog, policy);
        let _ = builder.add_target(&catalog.target, catalog.requirement(0, 0));

        let before = builder.graph().summary();
        let mapping = builder.value_requirement_mapping();
        let mut requirements = catalog.top_requirements();
        requirements.push(ValueRequirement::on("NotInCatalog", &catalog.target));

        let result = builder.add_target(&catalog.target, requirements);
        let is_unsatisfiable = matches!(
            result,
            Err(DependencyGraphError::UnsatisfiableDependency { .. })
        );
        prop_assert!(is_unsatisfiable);
        prop_assert_eq!(builder.graph().summary(), before);
        prop_assert_eq!(builder.value_requirement_mapping(), mapping);
    }

    // ===================================================================
    // INVARIANT 4: Pruning only shrinks, keeps requested outputs, and is
    // idempotent.
    // ===================================================================
    #[test]
    fn pruning_never_grows(
        config in arb_catalog_config(true),
        policy in arb_policy(),
    ) {
        let catalog = generate_random_catalog(&config);
        let mut builder = builder_for(&catalog, policy);
        for layer in 0..catalog.layers.len() {
            let _ = builder.add_target(&catalog.target, catalog.requirement(layer, 0));
        }
        let before = builder.graph().summary();
        let terminals = builder.graph().terminal_output_values().to_vec();

        let graph = builder.graph_mut();
        graph.remove_unnecessary_values();
        let after = graph.summary();
        prop_assert!(after.node_count <= before.node_count);
        prop_assert!(after.edge_count <= before.edge_count);
        prop_assert!(after.output_value_count <= before.output_value_count);
        prop_assert_eq!(graph.terminal_output_values(), terminals.as_slice());
        check_graph(graph)?;

        graph.remove_unnecessary_values();
        prop_assert_eq!(graph.summary(), after);
    }

    // ===================================================================
    // INVARIANT 5: Re-adding the same requirements is a no-op.
    // ===================================================================
    #[test]
    fn re_add_is_idempotent(
        config in arb_catalog_config(false),
        policy in arb_policy(),
    ) {
        let catalog = generate_random_catalog(&config);
        let mut builder = builder_for(&catalog, policy);
        builder
            .add_target(&catalog.target, catalog.top_requirements())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let first = builder.graph().summary();
        builder
            .add_target(&catalog.target, catalog.top_requirements())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(builder.graph().summary(), first);
    }
}
