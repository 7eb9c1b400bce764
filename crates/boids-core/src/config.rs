use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Shape of the volume agents bounce inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryShape {
    /// Radial bound: the whole velocity reverses when the projected position
    /// leaves the ball of radius `boundary_extent`.
    #[default]
    Sphere,
    /// Axis-aligned cube of half-extent `boundary_extent`, reflected per axis.
    Cube,
}

/// How candidate neighbors are found each frame. Both modes yield identical results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearch {
    #[default]
    BruteForce,
    RTree,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlockConfig {
    pub agent_count: usize,
    pub seed: u64,
    /// Half-cone, in degrees, measured from the heading.
    pub field_of_view: f64,
    pub visible_range: f64,
    pub flock_range: f64,
    pub boundary_shape: BoundaryShape,
    pub boundary_extent: f64,
    /// Position advances by `velocity / step_divisor` each frame.
    pub step_divisor: f64,
    pub collision_threshold: f64,
    pub jitter_scale: f64,
    pub spawn_extent: f64,
    pub neighbor_search: NeighborSearch,
    pub parallel: bool,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            agent_count: 250,
            seed: 42,
            field_of_view: 160.0,
            visible_range: 9.0,
            flock_range: 3.0,
            boundary_shape: BoundaryShape::Sphere,
            boundary_extent: 50.0,
            step_divisor: 6.0,
            collision_threshold: 2.0,
            jitter_scale: 0.03,
            spawn_extent: 10.0,
            neighbor_search: NeighborSearch::BruteForce,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    InvalidFieldOfView,
    InvalidVisibleRange,
    InvalidFlockRange,
    FlockRangeNotBelowVisibleRange { flock_range: f64, visible_range: f64 },
    InvalidBoundaryExtent,
    InvalidStepDivisor,
    InvalidCollisionThreshold,
    InvalidJitterScale,
    InvalidSpawnExtent,
    TooManyAgents { max: usize, actual: usize },
    Parse(String),
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::InvalidFieldOfView => {
                write!(f, "field_of_view must be finite and within (0, 180]")
            }
            SimConfigError::InvalidVisibleRange => {
                write!(f, "visible_range must be positive and finite")
            }
            SimConfigError::InvalidFlockRange => {
                write!(f, "flock_range must be positive and finite")
            }
            SimConfigError::FlockRangeNotBelowVisibleRange {
                flock_range,
                visible_range,
            } => write!(
                f,
                "flock_range ({flock_range}) must be less than visible_range ({visible_range})"
            ),
            SimConfigError::InvalidBoundaryExtent => {
                write!(f, "boundary_extent must be positive and finite")
            }
            SimConfigError::InvalidStepDivisor => {
                write!(f, "step_divisor must be positive and finite")
            }
            SimConfigError::InvalidCollisionThreshold => {
                write!(f, "collision_threshold must be non-negative and finite")
            }
            SimConfigError::InvalidJitterScale => {
                write!(f, "jitter_scale must be non-negative and finite")
            }
            SimConfigError::InvalidSpawnExtent => {
                write!(f, "spawn_extent must be positive and finite")
            }
            SimConfigError::TooManyAgents { max, actual } => {
                write!(f, "agent_count ({actual}) exceeds supported maximum ({max})")
            }
            SimConfigError::Parse(msg) => write!(f, "invalid config JSON: {msg}"),
        }
    }
}

impl Error for SimConfigError {}

fn positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative_finite(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

impl FlockConfig {
    pub const MAX_TOTAL_AGENTS: usize = 100_000;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if !(positive_finite(self.field_of_view) && self.field_of_view <= 180.0) {
            return Err(SimConfigError::InvalidFieldOfView);
        }
        if !positive_finite(self.visible_range) {
            return Err(SimConfigError::InvalidVisibleRange);
        }
        if !positive_finite(self.flock_range) {
            return Err(SimConfigError::InvalidFlockRange);
        }
        if self.flock_range >= self.visible_range {
            return Err(SimConfigError::FlockRangeNotBelowVisibleRange {
                flock_range: self.flock_range,
                visible_range: self.visible_range,
            });
        }
        if !positive_finite(self.boundary_extent) {
            return Err(SimConfigError::InvalidBoundaryExtent);
        }
        if !positive_finite(self.step_divisor) {
            return Err(SimConfigError::InvalidStepDivisor);
        }
        if !non_negative_finite(self.collision_threshold) {
            return Err(SimConfigError::InvalidCollisionThreshold);
        }
        if !non_negative_finite(self.jitter_scale) {
            return Err(SimConfigError::InvalidJitterScale);
        }
        if !positive_finite(self.spawn_extent) {
            return Err(SimConfigError::InvalidSpawnExtent);
        }
        if self.agent_count > Self::MAX_TOTAL_AGENTS {
            return Err(SimConfigError::TooManyAgents {
                max: Self::MAX_TOTAL_AGENTS,
                actual: self.agent_count,
            });
        }
        Ok(())
    }

    /// Parse a JSON document; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, SimConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SimConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(FlockConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_flock_range_at_or_above_visible_range() {
        let config = FlockConfig {
            flock_range: 9.0,
            visible_range: 9.0,
            ..FlockConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::FlockRangeNotBelowVisibleRange { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_and_out_of_range_values() {
        let cases = [
            FlockConfig {
                field_of_view: 181.0,
                ..FlockConfig::default()
            },
            FlockConfig {
                field_of_view: f64::NAN,
                ..FlockConfig::default()
            },
            FlockConfig {
                step_divisor: 0.0,
                ..FlockConfig::default()
            },
            FlockConfig {
                boundary_extent: f64::INFINITY,
                ..FlockConfig::default()
            },
            FlockConfig {
                jitter_scale: -0.1,
                ..FlockConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "expected {config:?} to fail");
        }
    }

    #[test]
    fn rejects_too_many_agents() {
        let config = FlockConfig {
            agent_count: FlockConfig::MAX_TOTAL_AGENTS + 1,
            ..FlockConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::TooManyAgents { .. })
        ));
    }

    #[test]
    fn from_json_fills_missing_fields_with_defaults() {
        let config = FlockConfig::from_json(r#"{"agent_count": 12, "boundary_shape": "cube"}"#)
            .expect("partial config should parse");
        assert_eq!(config.agent_count, 12);
        assert_eq!(config.boundary_shape, BoundaryShape::Cube);
        assert_eq!(config.visible_range, 9.0);
    }

    #[test]
    fn from_json_reports_parse_and_validation_errors() {
        assert!(matches!(
            FlockConfig::from_json("{not json"),
            Err(SimConfigError::Parse(_))
        ));
        assert!(matches!(
            FlockConfig::from_json(r#"{"flock_range": 20.0}"#),
            Err(SimConfigError::FlockRangeNotBelowVisibleRange { .. })
        ));
    }
}
