//! One graph per calculation configuration.
//!
//! The same function catalog compiled for two configurations under each
//! live data policy. Strict takes FxSpot straight from live data; fallback
//! computes it from the fixing.

use depgraph_engine::prelude::*;
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("╔═══════════════════════════════════════════════╗");
    println!("║  depgraph-engine: Multi-Configuration Example ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let fx_forward = ComputationTarget::new(ComputationTargetType::Trade, UniqueId::of("Trade", "FWD-7"));

    let mut repo = FunctionRepository::new();
    repo.add_function(
        SimpleFunction::new("FxForwardPV", ComputationTargetType::Trade)
            .producing("PresentValue")
            .requiring("FxSpot")
            .requiring("ForwardPoints"),
    )?;
    repo.add_function(
        SimpleFunction::new("SpotFromFixing", ComputationTargetType::Trade)
            .producing("FxSpot")
            .requiring("FxFixing"),
    )?;

    let live = FixedLiveDataOracle::new()
        .with_value_name("FxSpot")
        .with_value_name("FxFixing")
        .with_value_name("ForwardPoints");

    let resolver: Arc<dyn FunctionResolver> = Arc::new(DefaultFunctionResolver::new(repo));
    let requirements = [ValueRequirement::on("PresentValue", &fx_forward)];

    for policy in [LiveDataPolicy::Strict, LiveDataPolicy::Fallback] {
        let mut compiler = GraphCompiler::new(
            BuilderConfig::default().with_live_data_policy(policy),
            Arc::clone(&resolver),
        )
        .with_live_data(Arc::new(live.clone()));

        compiler.add_target("EndOfDay", &fx_forward, requirements.clone())?;
        compiler.add_target("Intraday", &fx_forward, requirements.clone())?;

        println!("━━━ Live data policy: {:?} ━━━\n", policy);
        for (name, graph) in compiler.compile(true) {
            let summary = graph.summary();
            println!(
                "  [{}] {} node(s), {} live, depth {}",
                name, summary.node_count, summary.live_data_node_count, summary.depth
            );
            for node in graph.nodes() {
                println!("    {}", *node);
            }
        }
        println!();
    }

    Ok(())
}
