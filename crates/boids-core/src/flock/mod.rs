pub mod metrics;
pub mod steering;

pub use metrics::*;

use crate::agent::{Agent, Motion, Perception};
use crate::config::{FlockConfig, SimConfigError};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use std::time::Instant;
use std::{error::Error, fmt};
use steering::{Decision, Neighborhood};

/// Create `count` agents with random positions and unit headings.
pub fn spawn<R: Rng + ?Sized>(count: usize, config: &FlockConfig, rng: &mut R) -> Vec<Agent> {
    (0..count).map(|_| Agent::random(rng, config)).collect()
}

/// Jitter stream for agent `index`. Independent of evaluation order, so serial
/// and parallel frames draw identical numbers.
fn jitter_stream(frame_seed: u64, index: usize) -> ChaCha12Rng {
    let mut rng = ChaCha12Rng::seed_from_u64(frame_seed);
    rng.set_stream(index as u64);
    rng
}

/// Compute every agent's next velocity from the current, unmodified snapshot,
/// classifying neighbors with the perception `config` describes.
pub fn decide_all(agents: &[Agent], config: &FlockConfig, frame_seed: u64) -> Vec<Decision> {
    let neighborhood = Neighborhood::build(agents, config.neighbor_search);
    decide_with(&neighborhood, agents, config, frame_seed)
}

fn decide_with(
    neighborhood: &Neighborhood,
    agents: &[Agent],
    config: &FlockConfig,
    frame_seed: u64,
) -> Vec<Decision> {
    let decide_one = |i: usize| {
        let mut rng = jitter_stream(frame_seed, i);
        neighborhood.decide(agents, i, config, &mut rng)
    };
    if config.parallel {
        (0..agents.len()).into_par_iter().map(decide_one).collect()
    } else {
        (0..agents.len()).map(decide_one).collect()
    }
}

/// Apply decided velocities, then integrate positions. Strictly after all decisions.
pub fn commit(agents: &mut [Agent], decisions: &[Decision], motion: &Motion) {
    debug_assert_eq!(agents.len(), decisions.len());
    for (agent, decision) in agents.iter_mut().zip(decisions) {
        agent.set_velocity(decision.velocity);
        agent.integrate_position(motion);
    }
}

/// One simulated frame over `agents` in place. Perception comes from `config`,
/// not from the agents. An empty slice is a no-op.
pub fn advance_frame(agents: &mut [Agent], config: &FlockConfig, frame_seed: u64) -> FrameReport {
    if agents.is_empty() {
        return FrameReport::default();
    }
    let decisions = decide_all(agents, config, frame_seed);
    commit(agents, &decisions, &Motion::from_config(config));
    FrameReport::from_decisions(&decisions)
}

pub struct Flock {
    pub agents: Vec<Agent>,
    config: FlockConfig,
    motion: Motion,
    rng: ChaCha12Rng,
    frame_index: usize,
    last_report: FrameReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlockInitError {
    Config(SimConfigError),
    AgentCountMismatch { expected: usize, actual: usize },
    NonFiniteAgent { index: usize },
}

impl fmt::Display for FlockInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlockInitError::Config(e) => write!(f, "{}", e),
            FlockInitError::AgentCountMismatch { expected, actual } => write!(
                f,
                "agents.len() ({actual}) must match agent_count ({expected})"
            ),
            FlockInitError::NonFiniteAgent { index } => {
                write!(f, "agent {index} has a non-finite position or velocity")
            }
        }
    }
}

impl From<SimConfigError> for FlockInitError {
    fn from(err: SimConfigError) -> Self {
        FlockInitError::Config(err)
    }
}

impl Error for FlockInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FlockInitError::Config(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManyFrames { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManyFrames { max, actual } => {
                write!(f, "frames ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(
                    f,
                    "sample count ({actual}) exceeds supported maximum ({max})"
                )
            }
        }
    }
}

impl Error for ExperimentError {}

impl Flock {
    pub const MAX_EXPERIMENT_FRAMES: usize = 1_000_000;
    pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;

    pub fn new(agents: Vec<Agent>, config: FlockConfig) -> Self {
        Self::try_new(agents, config).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Wrap an existing population. `config.agent_count` must equal `agents.len()`.
    /// Every agent takes its perception from `config`.
    pub fn try_new(mut agents: Vec<Agent>, config: FlockConfig) -> Result<Self, FlockInitError> {
        config.validate()?;
        if agents.len() != config.agent_count {
            return Err(FlockInitError::AgentCountMismatch {
                expected: config.agent_count,
                actual: agents.len(),
            });
        }
        if let Some(index) = agents
            .iter()
            .position(|a| !(a.position.is_finite() && a.velocity.is_finite()))
        {
            return Err(FlockInitError::NonFiniteAgent { index });
        }
        let perception = Perception::from_config(&config);
        for agent in &mut agents {
            agent.perception = perception;
        }

        let rng = ChaCha12Rng::seed_from_u64(config.seed);
        Ok(Self::assemble(agents, config, rng))
    }

    /// Spawn `config.agent_count` random agents from `config.seed`.
    pub fn spawn(config: FlockConfig) -> Result<Self, FlockInitError> {
        config.validate()?;
        let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
        let agents = spawn(config.agent_count, &config, &mut rng);
        Ok(Self::assemble(agents, config, rng))
    }

    fn assemble(agents: Vec<Agent>, config: FlockConfig, rng: ChaCha12Rng) -> Self {
        log::info!(
            "flock ready: {} agents, {:?} boundary extent {}, {:?} search{}",
            agents.len(),
            config.boundary_shape,
            config.boundary_extent,
            config.neighbor_search,
            if config.parallel { ", parallel" } else { "" }
        );
        Self {
            agents,
            motion: Motion::from_config(&config),
            config,
            rng,
            frame_index: 0,
            last_report: FrameReport::default(),
        }
    }

    pub fn config(&self) -> &FlockConfig {
        &self.config
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.agents.iter().map(|a| a.position.to_array()).collect()
    }

    pub fn velocities(&self) -> Vec<[f64; 3]> {
        self.agents.iter().map(|a| a.velocity.to_array()).collect()
    }

    /// One drawable segment per agent, position to position + unit heading.
    pub fn segments(&self) -> Vec<[[f64; 3]; 2]> {
        self.agents
            .iter()
            .map(|a| {
                let [start, end] = a.segment();
                [start.to_array(), end.to_array()]
            })
            .collect()
    }

    pub fn step(&mut self) -> StepTimings {
        let total_start = Instant::now();
        let frame_seed: u64 = self.rng.random();

        // 1. Build neighbor search over the frozen snapshot
        let t0 = Instant::now();
        let neighborhood = Neighborhood::build(&self.agents, self.config.neighbor_search);
        let neighborhood_build_us = t0.elapsed().as_micros() as u64;

        // 2. Decide every agent against the snapshot
        let t1 = Instant::now();
        let decisions = decide_with(&neighborhood, &self.agents, &self.config, frame_seed);
        let decide_us = t1.elapsed().as_micros() as u64;

        // 3. Commit velocities and integrate
        let t2 = Instant::now();
        commit(&mut self.agents, &decisions, &self.motion);
        let commit_us = t2.elapsed().as_micros() as u64;

        self.last_report = FrameReport::from_decisions(&decisions);
        self.frame_index += 1;
        log::debug!(
            "frame {}: {} close links, {} divergences, {} collision events",
            self.frame_index,
            self.last_report.close_flockmate_links,
            self.last_report.divergences,
            self.last_report.collision_events
        );

        StepTimings {
            neighborhood_build_us,
            decide_us,
            commit_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }

    pub fn run_experiment(&mut self, frames: usize, sample_every: usize) -> RunSummary {
        self.try_run_experiment(frames, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment(
        &mut self,
        frames: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if frames > Self::MAX_EXPERIMENT_FRAMES {
            return Err(ExperimentError::TooManyFrames {
                max: Self::MAX_EXPERIMENT_FRAMES,
                actual: frames,
            });
        }
        let estimated_samples = if frames == 0 {
            0
        } else {
            ((frames - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_EXPERIMENT_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_EXPERIMENT_SAMPLES,
                actual: estimated_samples,
            });
        }

        let mut samples = Vec::with_capacity(estimated_samples);
        for frame in 1..=frames {
            self.step();
            if frame % sample_every == 0 || frame == frames {
                samples.push(self.collect_frame_metrics());
            }
        }
        log::info!(
            "experiment finished: {frames} frames, {} samples",
            samples.len()
        );
        Ok(RunSummary {
            schema_version: 1,
            frames,
            sample_every,
            agent_count: self.agents.len(),
            config: self.config.clone(),
            samples,
            final_positions: self.positions(),
        })
    }
}
