use super::steering::Decision;
use super::Flock;
use crate::config::FlockConfig;
use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct StepTimings {
    pub neighborhood_build_us: u64,
    pub decide_us: u64,
    pub commit_us: u64,
    pub total_us: u64,
}

/// Counters gathered while deciding one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    pub agent_count: usize,
    /// Sum over agents of close flockmates seen (each pair may count twice).
    pub close_flockmate_links: usize,
    pub divergences: usize,
    pub collision_events: usize,
}

impl FrameReport {
    pub fn from_decisions(decisions: &[Decision]) -> Self {
        decisions.iter().fold(
            FrameReport {
                agent_count: decisions.len(),
                ..FrameReport::default()
            },
            |mut report, d| {
                report.close_flockmate_links += d.close_flockmates;
                report.divergences += usize::from(d.diverged_from.is_some());
                report.collision_events += d.collisions;
                report
            },
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FrameMetrics {
    pub frame: usize,
    pub mean_speed: f64,
    pub speed_std: f64,
    /// Length of the mean unit heading: 1.0 when every agent points the same way.
    pub polarization: f64,
    pub mean_close_flockmates: f64,
    pub divergence_count: usize,
    pub collision_events: usize,
    pub centroid: [f64; 3],
    pub max_radius: f64,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub frames: usize,
    pub sample_every: usize,
    pub agent_count: usize,
    pub config: FlockConfig,
    pub samples: Vec<FrameMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub final_positions: Vec<[f64; 3]>,
}

impl Flock {
    pub(crate) fn collect_frame_metrics(&self) -> FrameMetrics {
        let n = self.agents.len();
        if n == 0 {
            return FrameMetrics {
                frame: self.frame_index,
                ..FrameMetrics::default()
            };
        }
        let denom = n as f64;

        let speeds: Vec<f64> = self.agents.iter().map(|a| a.velocity.length()).collect();
        let mean_speed = speeds.iter().sum::<f64>() / denom;
        let speed_std = if n < 2 {
            0.0
        } else {
            let var =
                speeds.iter().map(|s| (s - mean_speed).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        };

        let heading_sum = self
            .agents
            .iter()
            .filter_map(|a| a.heading())
            .fold(DVec3::ZERO, |acc, h| acc + h);
        let centroid = self
            .agents
            .iter()
            .fold(DVec3::ZERO, |acc, a| acc + a.position)
            / denom;
        let max_radius = self
            .agents
            .iter()
            .map(|a| a.position.length())
            .fold(0.0f64, f64::max);

        let report = &self.last_report;
        FrameMetrics {
            frame: self.frame_index,
            mean_speed,
            speed_std,
            polarization: heading_sum.length() / denom,
            mean_close_flockmates: report.close_flockmate_links as f64 / denom,
            divergence_count: report.divergences,
            collision_events: report.collision_events,
            centroid: centroid.to_array(),
            max_radius,
        }
    }
}
