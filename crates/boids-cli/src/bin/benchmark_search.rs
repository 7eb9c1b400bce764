use boids_core::config::{FlockConfig, NeighborSearch};
use boids_core::flock::{self, Flock};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::time::{Duration, Instant};

fn run(agents: &[boids_core::Agent], config: &FlockConfig, frames: usize) -> Duration {
    let mut flock = Flock::new(agents.to_vec(), config.clone());
    let start = Instant::now();
    for _ in 0..frames {
        flock.step();
    }
    start.elapsed()
}

fn main() {
    let agent_count = 2_000;
    let frames = 20;
    println!("Benchmarking {} agents over {} frames", agent_count, frames);

    let base = FlockConfig {
        agent_count,
        seed: 42,
        // Spread the flock so the R-tree has something to prune.
        spawn_extent: 40.0,
        ..FlockConfig::default()
    };
    let mut rng = ChaCha12Rng::seed_from_u64(base.seed);
    let agents = flock::spawn(agent_count, &base, &mut rng);

    let variants = [
        ("brute force", NeighborSearch::BruteForce, false),
        ("brute force, parallel", NeighborSearch::BruteForce, true),
        ("r-tree", NeighborSearch::RTree, false),
        ("r-tree, parallel", NeighborSearch::RTree, true),
    ];
    for (label, neighbor_search, parallel) in variants {
        let config = FlockConfig {
            neighbor_search,
            parallel,
            ..base.clone()
        };
        let elapsed = run(&agents, &config, frames);
        println!(
            "{:<24} total {:?}, per frame {:?}",
            label,
            elapsed,
            elapsed / frames as u32
        );
    }
}
