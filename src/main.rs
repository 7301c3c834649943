//! Maze evolution CLI - Evolve vehicle controllers headlessly from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use maze_evolution::{
    compute::{Environment, TickOutcome},
    persistence::{AgentRecord, load_from_file, save_to_file},
    schema::SimulationConfig,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Evolve maze-driving vehicles from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  generations  Number of runs to evolve (default: 50)");
        eprintln!();
        eprintln!("If config.agent exists it is loaded into population slot 0.");
        eprintln!("Example configuration is generated with --example flag.");
        process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let generations: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(50);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        process::exit(1);
    });

    let mut config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        process::exit(1);
    });
    config.auto_reset = true;

    println!("Maze Evolution");
    println!("==============");
    println!(
        "Track: {}x{} tiles, world {}",
        config.track.size, config.track.size, config.track.world_size
    );
    println!(
        "Population: {} ({} sensors, hidden width {})",
        config.population_size,
        config.vehicle.sensors.len(),
        config.network.hidden_width
    );
    println!("Ticks per run: {}", config.ticks_per_generation);
    println!("Runs: {}", generations);
    println!();

    let mut env = Environment::new(config).unwrap_or_else(|e| {
        eprintln!("Error creating environment: {}", e);
        process::exit(1);
    });

    // Load a previously saved agent
    let agent_path = config_path.with_extension("agent");
    if agent_path.exists() {
        let loaded = load_from_file(&agent_path)
            .map_err(|e| e.to_string())
            .and_then(|record| env.load_record(0, &record).map_err(|e| e.to_string()));
        match loaded {
            Ok(()) => println!("Loaded agent from {}", agent_path.display()),
            Err(e) => {
                eprintln!("Error loading agent: {}", e);
                process::exit(1);
            }
        }
    }

    println!("Evolving...");
    let start = Instant::now();
    let mut completed = 0u64;
    let mut total_ticks = 0u64;

    while completed < generations {
        let outcome = env.tick().unwrap_or_else(|e| {
            eprintln!("Error during run: {}", e);
            process::exit(1);
        });
        total_ticks += 1;

        let TickOutcome::RunEnded(summary) = outcome else {
            continue;
        };
        completed += 1;

        // Print progress every 10%
        if completed % (generations / 10).max(1) == 0 {
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Run {}/{}: size={}, finished={}, collided={}, best={:.3}, {:.0} ticks/s",
                completed,
                generations,
                summary.track_size,
                summary.finished,
                summary.collided,
                summary.best_fitness,
                total_ticks as f32 / elapsed
            );
        }
    }

    let elapsed = start.elapsed();
    let counters = env.counters();

    println!();
    println!("Final state:");
    println!("  Generation: {}", env.generation());
    println!("  Track size: {}", env.track().size());
    println!(
        "  Regenerations: {}, resizes: {}",
        counters.total_regenerations, counters.total_resizes
    );
    println!("  Mutation chance: {:.4}", env.mutation_chance());
    println!(
        "Time: {:.2}s ({:.1} runs/s)",
        elapsed.as_secs_f32(),
        completed as f32 / elapsed.as_secs_f32()
    );

    // Save the best agent and the experiment report
    let best = env.agents()[env.best_agent_index()].controller.clone();
    match save_to_file(&agent_path, &AgentRecord::from_controller(&best)) {
        Ok(()) => println!("Saved best agent to {}", agent_path.display()),
        Err(e) => eprintln!("Error saving agent: {}", e),
    }

    let report_path = config_path.with_extension("report.json");
    match env.report().write_json(&report_path) {
        Ok(()) => println!("Saved report to {}", report_path.display()),
        Err(e) => eprintln!("Error saving report: {}", e),
    }
}

fn print_example_config() {
    let config = SimulationConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
