//! DCOP simulator CLI binary.
//!
//! # Commands
//!
//! - `generate` - Generate a random problem and write it as JSON
//! - `run` - Run DSA or MGM-2 on a generated or saved problem
//! - `compare` - Sweep problem toughness over several seeds, or print
//!   per-cycle cost curves with `--curves`

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dcop::{
    problem::{generate, GeneratorParams},
    simulation::experiment::{compare_toughness, cost_curves, default_toughness_values, ToughnessResult},
    AlgorithmKind, Config, Problem, Simulation, VERSION,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser)]
#[command(name = "dcop")]
#[command(version = VERSION)]
#[command(about = "Round-synchronous DCOP simulator - DSA and MGM-2", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random problem
    Generate {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generator seed (overrides constraints.seed)
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Run a simulation
    Run {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Problem file (default: generate from config)
        #[arg(short, long)]
        problem: Option<PathBuf>,

        /// Algorithm (dsa, mgm2)
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Number of algorithm cycles
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Agent seed (overrides environment.seed)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Report file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare final cost across problem toughness values
    Compare {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seeds per toughness value
        #[arg(short, long, default_value = "10")]
        runs: usize,

        /// Results file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report per-cycle cost curves instead of the toughness sweep
        #[arg(long)]
        curves: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            output,
            seed,
        } => cmd_generate(config, output, seed),

        Commands::Run {
            config,
            problem,
            algorithm,
            iterations,
            seed,
            output,
            verbose,
        } => cmd_run(config, problem, algorithm, iterations, seed, output, verbose),

        Commands::Compare {
            config,
            runs,
            output,
            curves,
            verbose,
        } => {
            if curves {
                cmd_curves(config, runs, output, verbose)
            } else {
                cmd_compare(config, runs, output, verbose)
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn generate_problem(config: &Config) -> anyhow::Result<Problem> {
    let params = GeneratorParams::from_config(&config.environment, &config.constraints);
    let mut rng = StdRng::seed_from_u64(config.constraints.seed);
    Ok(generate(&params, &mut rng)?)
}

fn cmd_generate(config: Option<PathBuf>, output: Option<PathBuf>, seed: Option<u64>) -> anyhow::Result<()> {
    let mut config = load_config(config)?;
    if let Some(seed) = seed {
        config.constraints.seed = seed;
    }

    let problem = generate_problem(&config)?;
    let topology = problem.topology();

    if let Some(path) = output {
        problem.save(&path)?;
        eprintln!(
            "Wrote {} agents, {} edges (max degree {}) to {}",
            problem.agents(),
            topology.edges,
            topology.max_degree,
            path.display()
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&problem)?);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    config: Option<PathBuf>,
    problem: Option<PathBuf>,
    algorithm: Option<String>,
    iterations: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose);

    let mut config = load_config(config)?;
    if let Some(algorithm) = algorithm {
        config.environment.algorithm = algorithm.parse::<AlgorithmKind>()?;
    }
    if let Some(iterations) = iterations {
        config.environment.iterations = iterations;
    }
    if let Some(seed) = seed {
        config.environment.seed = Some(seed);
    }
    config.validate()?;

    let problem = match problem {
        Some(path) => Problem::from_file(path)?,
        None => generate_problem(&config)?,
    };

    let agent_seed = config.environment.seed.unwrap_or(config.constraints.seed);
    let mut rng = StdRng::seed_from_u64(agent_seed);
    let mut sim = Simulation::from_problem(&problem, &config, &mut rng)?;
    let report = sim.run(config.rounds())?;

    println!("{}", report.summary());
    println!();
    println!("{:>6}  {:>12}", "cycle", "cost");
    for (cycle, cost) in report.cycle_costs().iter().enumerate() {
        println!("{cycle:>6}  {cost:>12.1}");
    }

    if let Some(path) = output {
        report.save(&path)?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}

fn cmd_compare(config: Option<PathBuf>, runs: usize, output: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    init_logging(verbose);

    let config = load_config(config)?;
    let results = compare_toughness(&config, &default_toughness_values(), runs)?;

    println!(
        "{} over {} runs, {} cycles each",
        config.environment.algorithm, runs, config.environment.iterations
    );
    println!();
    println!("{:>6}  {:>12}  {:>12}  {:>12}", "p2", "mean", "min", "max");
    for result in &results {
        print_row(result);
    }

    if let Some(path) = output {
        std::fs::write(&path, serde_json::to_string_pretty(&results)?)?;
        eprintln!("Results written to {}", path.display());
    }

    Ok(())
}

fn cmd_curves(config: Option<PathBuf>, runs: usize, output: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    init_logging(verbose);

    let config = load_config(config)?;
    let curves = cost_curves(&config, runs)?;

    println!(
        "{} over {} runs, p2 = {}",
        config.environment.algorithm, runs, config.constraints.toughness
    );
    println!();
    print!("{:>6}", "cycle");
    for run in 0..curves.len() {
        print!("  {:>10}", format!("run {run}"));
    }
    println!();

    let cycles = curves.iter().map(Vec::len).max().unwrap_or(0);
    for cycle in 0..cycles {
        print!("{cycle:>6}");
        for curve in &curves {
            match curve.get(cycle) {
                Some(cost) => print!("  {cost:>10.1}"),
                None => print!("  {:>10}", "-"),
            }
        }
        println!();
    }

    if let Some(path) = output {
        std::fs::write(&path, serde_json::to_string_pretty(&curves)?)?;
        eprintln!("Curves written to {}", path.display());
    }

    Ok(())
}

fn print_row(result: &ToughnessResult) {
    println!(
        "{:>6.1}  {:>12.1}  {:>12.1}  {:>12.1}",
        result.toughness,
        result.mean(),
        result.min(),
        result.max()
    );
}
