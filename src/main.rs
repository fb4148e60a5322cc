//! BEES - CLI Entry Point
//!
//! Runs the foraging environment with a random policy.

use bees::policy::RandomPolicy;
use bees::sink::FileSink;
use bees::{benchmark, Config, Env};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "bees")]
#[command(version)]
#[command(about = "Multi-agent foraging environment with learned per-agent rewards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run episodes with a random policy
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of episodes
        #[arg(short, long, default_value = "1")]
        episodes: u64,

        /// Step limit per episode
        #[arg(short, long, default_value = "1000")]
        steps: u64,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Log directory (overrides the config)
        #[arg(short, long)]
        log_dir: Option<PathBuf>,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Run performance benchmark
    Bench {
        /// Number of episodes
        #[arg(short, long, default_value = "10")]
        episodes: u64,

        /// Step limit per episode
        #[arg(short, long, default_value = "500")]
        steps: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            episodes,
            steps,
            seed,
            log_dir,
        } => run_episodes(config, episodes, steps, seed, log_dir),

        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }

        Commands::Bench { episodes, steps } => {
            init_logging("warn");
            run_benchmark(episodes, steps)
        }
    }
}

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        Ok(Config::from_file(config_path)?)
    } else {
        Ok(Config::default())
    }
}

fn run_episodes(
    config_path: PathBuf,
    episodes: u64,
    steps: u64,
    seed: Option<u64>,
    log_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path)?;
    init_logging(&config.logging.log_level);

    if config_path.exists() {
        log::info!("Loaded config from {:?}", config_path);
    } else {
        log::info!("{:?} not found, using default configuration", config_path);
    }

    let log_dir = log_dir.unwrap_or_else(|| PathBuf::from(&config.logging.log_dir));
    std::fs::create_dir_all(&log_dir)?;
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let step_log = log_dir.join(format!("{}_repr_log.txt", timestamp));
    let reward_log = log_dir.join(format!("{}_rew_log.txt", timestamp));
    let sink = Box::new(FileSink::open(&step_log, &reward_log)?);

    let mut env = match seed {
        Some(s) => Env::new_with_seed(config.clone(), s, sink)?,
        None => Env::new(config.clone(), sink)?,
    };
    let mut policy = RandomPolicy::with_seed(env.seed().wrapping_add(1));

    println!("Starting run");
    println!("  Seed: {}", env.seed());
    println!("  Grid size: {}x{}", config.env.width, config.env.height);
    println!("  Agents: {}", config.env.num_agents);
    println!("  Foods: {}", env.initial_num_foods());
    println!("  Step log: {:?}", step_log);
    println!();

    let start = Instant::now();
    let mut total_steps = 0;

    for episode in 0..episodes {
        let summary = env.run_episode(&mut policy, steps)?;
        total_steps += summary.steps;
        println!(
            "Episode {}: {} steps, mean reward {:.4}, survivors {}, foods left {}{}",
            episode,
            summary.steps,
            summary.mean_total_reward,
            summary.survivors,
            summary.foods_left,
            if summary.finished { "" } else { " (step limit)" }
        );
    }

    let elapsed = start.elapsed();
    println!();
    println!("=== Run Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Steps: {}", total_steps);
    println!(
        "Speed: {:.1} steps/s",
        total_steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    let states: BTreeMap<_, _> = env
        .agents
        .iter()
        .map(|agent| (agent.id, agent.state()))
        .collect();
    let states_path = log_dir.join(format!("{}_agents.json", timestamp));
    std::fs::write(&states_path, serde_json::to_string_pretty(&states)?)?;
    println!("Agent states: {:?}", states_path);

    Ok(())
}

fn run_benchmark(episodes: u64, steps: u64) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== BEES Benchmark ===");
    println!("Episodes: {}", episodes);
    println!("Step limit: {}", steps);
    println!();

    let result = benchmark(episodes, steps, Config::default())?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}
