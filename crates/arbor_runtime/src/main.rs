//! Arbor Runtime
//!
//! Boots an engine from settings, spawns a demo hierarchy and runs the fixed
//! tick loop: update, render and post-update per collection, then engine
//! post-update.

mod demo;

use anyhow::{Context, Result};
use arbor_core::{ComponentTypeDescriptor, ComponentTypeRegistry, Engine, PrototypeLibrary, SimulationClock};
use arbor_metrics::TickTimer;
use arbor_services::{LoggingSettings, Settings};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Arbor scene simulation demo", long_about = None)]
struct Arguments {
    #[arg(short = 'c', long = "config", help = "Path to a JSON settings file")]
    config: Option<PathBuf>,

    #[arg(short = 't', long, default_value_t = 600, help = "Number of ticks to simulate")]
    ticks: u64,

    #[arg(short = 'o', long, default_value_t = 64, help = "Number of spinning arms to spawn")]
    objects: u32,
}

fn init_logging(settings: &LoggingSettings) {
    // RUST_LOG wins over the settings file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(settings.ansi)
        .init();
}

fn main() -> Result<()> {
    let arguments = Arguments::parse();
    let settings = match &arguments.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    init_logging(&settings.logging);
    info!("Arbor v{}", arbor_core::VERSION);

    let mut registry = ComponentTypeRegistry::new();
    let spinner = registry.register(
        ComponentTypeDescriptor::new("spinner")
            .update_priority(0)
            .instance_user_data(false),
        demo::Spinner,
    )?;
    let lifetime = registry.register(
        ComponentTypeDescriptor::new("lifetime")
            .update_priority(10)
            .instance_user_data(false),
        demo::Lifetime,
    )?;

    let library = Arc::new(PrototypeLibrary::new());
    let arm = library.insert("/arm.proto", demo::arm_prototype(spinner)?);
    let debris = library.insert("/debris.proto", demo::debris_prototype(spinner, lifetime)?);

    let engine = Engine::new(settings.engine.clone(), registry, library)?;
    let collection = engine.new_collection("main", None)?;
    {
        let mut collection = collection.lock();
        let spawned = demo::populate(&mut collection, &arm, &debris, arguments.objects)?;
        info!(spawned, "demo hierarchy spawned");
        if !collection.init() {
            warn!("collection init reported failures");
        }
    }

    let mut clock = SimulationClock::default();
    let mut timer = TickTimer::new(120);
    for _ in 0..arguments.ticks {
        timer.begin();
        let context = clock.tick();
        for collection in engine.collections() {
            let mut collection = collection.lock();
            let ok = collection.update(&context) & collection.render() & collection.post_update();
            if !ok {
                warn!(tick = context.tick, collection = collection.name(), "tick reported failures");
            }
        }
        engine.post_update();
        timer.end();
    }

    let (min_ms, max_ms) = timer.tick_time_range_ms();
    info!(
        ticks = clock.tick_count(),
        simulated_secs = clock.elapsed().as_secs_f32(),
        tick_ms = timer.tick_time_ms(),
        min_ms,
        max_ms,
        "simulation finished"
    );
    {
        let collection = collection.lock();
        for (counter, value) in collection.counters().iter() {
            info!(counter, value, "collection counter");
        }
        for (scope, timing) in collection.profiler().report() {
            info!(
                scope,
                calls = timing.calls,
                total_ms = timing.total.as_secs_f64() * 1000.0,
                "component update timing"
            );
        }
    }

    engine.delete_collection(&collection);
    engine.post_update();
    info!(collections = engine.collection_count(), "shutdown complete");
    Ok(())
}
