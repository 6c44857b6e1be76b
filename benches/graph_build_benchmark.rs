use criterion::{black_box, criterion_group, criterion_main, Criterion};
use depgraph_engine::builder::{BuilderConfig, DependencyGraphBuilder};
use depgraph_engine::simulation::catalog_generator::{generate_random_catalog, CatalogConfig, GeneratedCatalog};
use std::sync::Arc;

fn build(catalog: &GeneratedCatalog) -> DependencyGraphBuilder {
    let mut builder = DependencyGraphBuilder::new(
        BuilderConfig::default(),
        Arc::new(catalog.resolver()),
    )
    .with_live_data(Arc::new(catalog.live_data.clone()));
    // Layered catalogs always resolve.
    let _ = builder.add_target(&catalog.target, catalog.top_requirements());
    builder
}

fn bench_build_small_catalog(c: &mut Criterion) {
    let catalog = generate_random_catalog(&CatalogConfig {
        layers: 4,
        values_per_layer: 5,
        seed: Some(1),
        ..Default::default()
    });

    c.bench_function("build_4x5_catalog", |b| b.iter(|| build(black_box(&catalog))));
}

fn bench_build_wide_catalog(c: &mut Criterion) {
    let catalog = generate_random_catalog(&CatalogConfig {
        layers: 6,
        values_per_layer: 50,
        max_inputs: 4,
        alternatives: 2,
        seed: Some(2),
        ..Default::default()
    });

    c.bench_function("build_6x50_catalog", |b| b.iter(|| build(black_box(&catalog))));
}

fn bench_build_with_cycles(c: &mut Criterion) {
    let catalog = generate_random_catalog(&CatalogConfig {
        layers: 6,
        values_per_layer: 20,
        alternatives: 3,
        backward_probability: 0.3,
        seed: Some(3),
        ..Default::default()
    });

    c.bench_function("build_6x20_catalog_with_cycles", |b| {
        b.iter(|| build(black_box(&catalog)))
    });
}

fn bench_prune(c: &mut Criterion) {
    let catalog = generate_random_catalog(&CatalogConfig {
        layers: 6,
        values_per_layer: 50,
        alternatives: 2,
        seed: Some(4),
        ..Default::default()
    });
    let built = build(&catalog);

    c.bench_function("prune_6x50_catalog", |b| {
        b.iter(|| {
            let mut graph = built.graph().clone();
            graph.remove_unnecessary_values();
            graph
        })
    });
}

criterion_group!(
    benches,
    bench_build_small_catalog,
    bench_build_wide_catalog,
    bench_build_with_cycles,
    bench_prune
);
criterion_main!(benches);
