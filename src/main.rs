//! Mana Search CLI - Run the seed search from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use mana_search::{
    compute::evolution::SearchEngine,
    schema::{SearchConfig, SearchProgress},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [threads]", args[0]);
        eprintln!();
        eprintln!("Search for seed patterns that maximize mana.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to search configuration file");
        eprintln!("  threads      Worker thread count (default: from config, else all cores)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut config: SearchConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Some(arg) = args.get(2) {
        match arg.parse::<usize>() {
            Ok(threads) => config.threads = Some(threads),
            Err(e) => {
                eprintln!("Invalid thread count '{}': {}", arg, e);
                std::process::exit(1);
            }
        }
    }

    let mut engine = SearchEngine::new(config);

    println!("Mana Search");
    println!("===========");
    println!("Threads: {}", engine.threads());
    println!(
        "Engine: {} ticks, {} mana/gen, cap {}, {:?}",
        engine.config().engine.max_ticks,
        engine.config().engine.mana_per_generation,
        engine.config().engine.mana_cap,
        engine.config().engine.scoring
    );
    if let Some(path) = &engine.config().snapshot_path {
        println!("Leader snapshot: {}", path.display());
    }
    println!();

    let result = engine.run_with_callback(print_progress).unwrap_or_else(|e| {
        eprintln!("Search failed: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Stopped: {:?}", result.stats.stop_reason);
    println!(
        "Iterations: {} in {:.1}s ({:.2} M/s)",
        result.stats.total_iterations,
        result.stats.elapsed_seconds,
        result.stats.iterations_per_second / 1.0e6
    );
    println!("Archive buckets occupied: {}", result.archive_occupancy);

    match &result.best {
        Some(best) => {
            let s = &best.summary;
            println!(
                "Best: mana {} | blocks {} | tick {} | {} | {:.2} blocks/min",
                s.mana, s.initial_blocks, s.ticks, s.symmetry, s.blocks_per_minute
            );
        }
        None => println!("No seed reached the trigger."),
    }

    let archive_path = config_path.with_extension("archive.json");
    match engine.archive().export_json(&archive_path) {
        Ok(()) => println!("Archive written to {}", archive_path.display()),
        Err(e) => eprintln!("Error writing archive: {}", e),
    }
}

fn print_progress(progress: &SearchProgress) {
    let leader = progress
        .leader
        .as_ref()
        .map(|l| format!("mana {} / {} blocks ({})", l.mana, l.initial_blocks, l.symmetry))
        .unwrap_or_else(|| "none".to_string());
    println!(
        "[{:>7.1}s] {} iterations, {:.2} M/s, archive {}, leader {}",
        progress.elapsed_seconds,
        progress.total_iterations,
        progress.million_iterations_per_second,
        progress.archive_occupancy,
        leader
    );
    for w in &progress.workers {
        println!(
            "  worker {:>2}: best mana {:>6} | blocks {:>3} | {} iterations",
            w.id, w.best_mana, w.best_blocks, w.iterations
        );
    }
}

fn print_example_config() {
    let config = SearchConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
