mod logging;

use anyhow::{Context, Result};
use boids_core::config::{FlockConfig, NeighborSearch};
use boids_core::flock::Flock;
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Search {
    BruteForce,
    RTree,
}

impl From<Search> for NeighborSearch {
    fn from(search: Search) -> Self {
        match search {
            Search::BruteForce => NeighborSearch::BruteForce,
            Search::RTree => NeighborSearch::RTree,
        }
    }
}

/// Run a headless flock and write a JSON run summary.
#[derive(Parser, Debug)]
#[command(name = "boids", version)]
struct Args {
    /// JSON config file; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the agent count.
    #[arg(long)]
    agents: Option<usize>,
    #[arg(long, default_value_t = 1000)]
    frames: usize,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 10)]
    sample_every: usize,
    #[arg(long, value_enum)]
    search: Option<Search>,
    /// Decide agents on the rayon thread pool.
    #[arg(long)]
    parallel: bool,
    /// Write the summary here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print the effective config and exit.
    #[arg(long)]
    print_config: bool,
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<FlockConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            FlockConfig::from_json(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => FlockConfig::default(),
    };
    if let Some(agents) = args.agents {
        config.agent_count = agents;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(search) = args.search {
        config.neighbor_search = search.into();
    }
    if args.parallel {
        config.parallel = true;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", config.to_json());
        return Ok(());
    }

    let mut flock = Flock::spawn(config).context("creating flock")?;
    let start = Instant::now();
    let summary = flock
        .try_run_experiment(args.frames, args.sample_every)
        .context("running flock")?;
    log::info!(
        "{} frames of {} agents in {:?}",
        summary.frames,
        summary.agent_count,
        start.elapsed()
    );

    let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            log::info!("summary written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "boids",
            "--agents",
            "12",
            "--seed",
            "3",
            "--search",
            "r-tree",
            "--parallel",
        ])
        .expect("valid flags");
        let config = load_config(&args).expect("valid config");
        assert_eq!(config.agent_count, 12);
        assert_eq!(config.seed, 3);
        assert_eq!(config.neighbor_search, NeighborSearch::RTree);
        assert!(config.parallel);
        assert_eq!(config.visible_range, FlockConfig::default().visible_range);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = Args::try_parse_from(["boids", "--config", "/nonexistent/boids.json"])
            .expect("valid flags");
        let err = load_config(&args).expect_err("missing file must fail");
        assert!(err.to_string().contains("reading config"));
    }

    #[test]
    fn invalid_override_fails_validation() {
        let args = Args::try_parse_from(["boids", "--agents", "1000000"]).expect("valid flags");
        assert!(load_config(&args).is_err());
    }
}
