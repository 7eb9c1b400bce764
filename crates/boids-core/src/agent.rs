use crate::config::{BoundaryShape, FlockConfig};
use glam::DVec3;
use rand::Rng;

/// Perception limits of a single agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perception {
    /// Degrees. Compared against [`Agent::bearing_degrees`].
    pub field_of_view: f64,
    pub visible_range: f64,
    pub flock_range: f64,
}

impl Default for Perception {
    fn default() -> Self {
        Self::from_config(&FlockConfig::default())
    }
}

impl Perception {
    pub fn from_config(config: &FlockConfig) -> Self {
        Self {
            field_of_view: config.field_of_view,
            visible_range: config.visible_range,
            flock_range: config.flock_range,
        }
    }
}

/// Boundary policy and step size used by [`Agent::integrate_position`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub shape: BoundaryShape,
    pub extent: f64,
    pub step_divisor: f64,
}

impl Default for Motion {
    fn default() -> Self {
        Self::from_config(&FlockConfig::default())
    }
}

impl Motion {
    pub fn from_config(config: &FlockConfig) -> Self {
        Self {
            shape: config.boundary_shape,
            extent: config.boundary_extent,
            step_divisor: config.step_divisor,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub position: DVec3,
    pub velocity: DVec3,
    pub perception: Perception,
}

impl Agent {
    pub fn new(position: DVec3, velocity: DVec3) -> Self {
        Self {
            position,
            velocity,
            perception: Perception::default(),
        }
    }

    pub fn with_perception(mut self, perception: Perception) -> Self {
        self.perception = perception;
        self
    }

    /// Uniform position in `[-extent, extent)^3` and a unit velocity whose
    /// components are drawn from the same cube before normalizing.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, config: &FlockConfig) -> Self {
        let extent = config.spawn_extent;
        let draw = |rng: &mut R| {
            DVec3::new(
                rng.random_range(-extent..extent),
                rng.random_range(-extent..extent),
                rng.random_range(-extent..extent),
            )
        };
        let position = draw(rng);
        let velocity = loop {
            if let Some(unit) = draw(rng).try_normalize() {
                break unit;
            }
        };
        Self::new(position, velocity).with_perception(Perception::from_config(config))
    }

    /// Angle in degrees between this agent's heading and the direction from
    /// `other` toward this agent. 0 means `other` sits directly behind.
    ///
    /// Returns NaN when the velocity is zero or the positions coincide, so every
    /// `<` comparison against it is false.
    pub fn bearing_degrees(&self, other: &Agent) -> f64 {
        let from_other = self.position - other.position;
        let denom = self.velocity.length() * from_other.length();
        if denom == 0.0 {
            return f64::NAN;
        }
        let cos = (self.velocity.dot(from_other) / denom).clamp(-1.0, 1.0);
        cos.acos().to_degrees()
    }

    pub fn in_field_of_view(&self, other: &Agent) -> bool {
        self.bearing_degrees(other) < self.perception.field_of_view
    }

    pub fn distance_to(&self, other: &Agent) -> f64 {
        self.position.distance(other.position)
    }

    pub fn in_visible_range(&self, other: &Agent) -> bool {
        self.distance_to(other) < self.perception.visible_range
    }

    pub fn in_flock_range(&self, other: &Agent) -> bool {
        self.distance_to(other) < self.perception.flock_range
    }

    pub fn set_velocity(&mut self, velocity: DVec3) {
        self.velocity = velocity;
    }

    /// Position after a full unscaled step; used for bounce and collision checks.
    pub fn projected_position(&self) -> DVec3 {
        self.position + self.velocity
    }

    /// Reflect off the boundary if the full projected step would leave it, then
    /// advance by `velocity / step_divisor`.
    pub fn integrate_position(&mut self, motion: &Motion) {
        let projected = self.projected_position();
        match motion.shape {
            BoundaryShape::Sphere => {
                if !(projected.length() <= motion.extent) {
                    self.velocity = -self.velocity;
                }
            }
            BoundaryShape::Cube => {
                for axis in 0..3 {
                    if !(projected[axis].abs() <= motion.extent) {
                        self.velocity[axis] = -self.velocity[axis];
                    }
                }
            }
        }
        self.position += self.velocity / motion.step_divisor;
    }

    /// Unit heading, or `None` for a zero or non-finite velocity.
    pub fn heading(&self) -> Option<DVec3> {
        self.velocity.try_normalize()
    }

    /// Line segment a renderer draws for this agent: from its position one unit
    /// along its heading.
    pub fn segment(&self) -> [DVec3; 2] {
        let tip = self.position + self.heading().unwrap_or(DVec3::ZERO);
        [self.position, tip]
    }
}
