//! Bond pricing graph with live market data leaves.
//!
//! A position's value needs the bond's present value, which needs a
//! discount curve (computed from live rates) and a live clean price.
//! Run with `RUST_LOG=debug` to watch resolution.

use depgraph_engine::prelude::*;
use std::error::Error;
use std::io;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("╔═══════════════════════════════════════════════╗");
    println!("║  depgraph-engine: Live Data Pricing Example   ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let bond = ComputationTarget::new(ComputationTargetType::Security, UniqueId::of("ISIN", "US912828XG55"))
        .with_name("UST 2.125% 2025");
    let curve = ComputationTarget::primitive(UniqueId::of("Curve", "USD-OIS"));
    let position = ComputationTarget::new(ComputationTargetType::Position, UniqueId::of("Pos", "42"))
        .with_name("Treasury book");

    let mut repo = FunctionRepository::new();
    repo.add_function(
        SimpleFunction::new("PositionValue", ComputationTargetType::Position)
            .producing("PositionValue")
            .requiring_value(ValueRequirement::on("PresentValue", &bond)),
    )?;
    repo.add_function(
        SimpleFunction::new("BondPV", ComputationTargetType::Security)
            .producing_with("PresentValue", ValueProperties::new().with("Currency", "USD"))
            .producing("Duration")
            .requiring("CleanPrice")
            .requiring_value(ValueRequirement::on("DiscountCurve", &curve)),
    )?;
    repo.add_function(
        SimpleFunction::for_target("CurveBootstrap", &curve)
            .producing("DiscountCurve")
            .requiring("OvernightRate")
            .requiring("SwapRates"),
    )?;

    let live = FixedLiveDataOracle::new()
        .with_value_name("CleanPrice")
        .with_value_name("OvernightRate")
        .with_value_name("SwapRates");
    let targets: MapTargetResolver = vec![bond.clone(), curve.clone(), position.clone()]
        .into_iter()
        .collect();

    let mut builder = DependencyGraphBuilder::new(
        BuilderConfig::for_configuration("EndOfDay"),
        Arc::new(DefaultFunctionResolver::new(repo)),
    )
    .with_live_data(Arc::new(live))
    .with_target_resolver(Arc::new(targets));

    builder.add_target(&position, [ValueRequirement::on("PositionValue", &position)])?;
    builder.add_target(&bond, [ValueRequirement::on("Duration", &bond)])?;

    println!("Resolved graph:");
    builder.graph().dump_structure(&mut io::stdout())?;

    println!("\nExecution order:");
    let graph = builder.graph();
    for (step, id) in graph.execution_order()?.into_iter().enumerate() {
        if let Some(node) = graph.node(id) {
            println!("  {:>2}. {}", step + 1, *node);
        }
    }

    // Both values are terminal, so only unrequested outputs go.
    builder.graph_mut().remove_unnecessary_values();
    println!("\nSummary: {}", serde_json::to_string_pretty(&builder.graph().summary())?);

    println!("\nAsking for a value nothing can produce:");
    match builder.add_target(&bond, [ValueRequirement::on("Convexity", &bond)]) {
        Ok(()) => println!("  unexpectedly resolved"),
        Err(err) => println!("  {}", err),
    }
    println!("  graph still has {} node(s)", builder.graph().node_count());

    Ok(())
}
