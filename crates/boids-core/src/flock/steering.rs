use crate::agent::{Agent, Perception};
use crate::config::{FlockConfig, NeighborSearch};
use crate::spatial::{self, AgentLocation};
use glam::DVec3;
use rand::Rng;
use rstar::RTree;

/// Jitter components are drawn from `{-JITTER_STEPS, ..., JITTER_STEPS}` and
/// scaled so the extreme step equals `jitter_scale`.
pub const JITTER_STEPS: i32 = 3;

/// Neighbors of one agent, split by perception. Both lists ascend by index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub close_flockmates: Vec<usize>,
    pub distant_visible: Vec<usize>,
}

/// Everything computed for one agent in one frame, before commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    /// `(matched + avoidance) / 2`, the velocity to commit.
    pub velocity: DVec3,
    pub matched: DVec3,
    pub avoidance: DVec3,
    pub close_flockmates: usize,
    /// Neighbor chosen by the divergence rule, if it fired.
    pub diverged_from: Option<usize>,
    pub collisions: usize,
}

/// Split every `j != i` visible under `perception` into close flockmates and
/// distant visible agents. The perception stored on `agents[i]` is ignored.
pub fn classify(
    agents: &[Agent],
    i: usize,
    candidates: &[usize],
    perception: &Perception,
) -> Classification {
    let me = agents[i].with_perception(*perception);
    let mut classification = Classification::default();
    for &j in candidates {
        if j == i {
            continue;
        }
        let other = &agents[j];
        let visible = me.in_field_of_view(other) && me.in_visible_range(other);
        if !visible {
            continue;
        }
        if me.in_flock_range(other) {
            classification.close_flockmates.push(j);
        } else {
            classification.distant_visible.push(j);
        }
    }
    classification
}

/// Average own velocity with close flockmates; with none, steer along the
/// first distant visible agent scaled by its distance. Returns the matched
/// velocity and the divergence target, if any.
pub fn match_velocity(
    agents: &[Agent],
    i: usize,
    classification: &Classification,
) -> (DVec3, Option<usize>) {
    let me = &agents[i];
    if !classification.close_flockmates.is_empty() {
        let sum = classification
            .close_flockmates
            .iter()
            .fold(me.velocity, |acc, &j| acc + agents[j].velocity);
        let count = classification.close_flockmates.len() + 1;
        return (sum / count as f64, None);
    }

    match classification.distant_visible.first() {
        Some(&j) => {
            let other = &agents[j];
            let toward = (other.position - me.position).try_normalize().unwrap_or(DVec3::ZERO);
            (toward * me.distance_to(other), Some(j))
        }
        None => (me.velocity, None),
    }
}

/// Jitter own velocity once per agent whose projected position comes within
/// `threshold` of ours, then normalize. A zero sum has no heading and yields
/// the zero vector.
pub fn avoid_collisions<R: Rng + ?Sized>(
    agents: &[Agent],
    i: usize,
    candidates: &[usize],
    threshold: f64,
    jitter_scale: f64,
    rng: &mut R,
) -> (DVec3, usize) {
    let me = &agents[i];
    let projected = me.projected_position();
    let mut acc = me.velocity;
    let mut collisions = 0;
    for &j in candidates {
        if j == i {
            continue;
        }
        if projected.distance(agents[j].projected_position()) < threshold {
            acc += jitter(rng, jitter_scale);
            collisions += 1;
        }
    }
    (acc.try_normalize().unwrap_or(DVec3::ZERO), collisions)
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> DVec3 {
    let mut component = || {
        rng.random_range(-JITTER_STEPS..=JITTER_STEPS) as f64 / JITTER_STEPS as f64 * scale
    };
    DVec3::new(component(), component(), component())
}

/// Full per-agent decision with an exhaustive scan of the population.
pub fn decide<R: Rng + ?Sized>(
    agents: &[Agent],
    i: usize,
    config: &FlockConfig,
    rng: &mut R,
) -> Decision {
    Neighborhood::Exhaustive.decide(agents, i, config, rng)
}

/// Source of candidate neighbors for one frame.
pub(crate) enum Neighborhood {
    Exhaustive,
    Indexed {
        positions: RTree<AgentLocation>,
        projected: RTree<AgentLocation>,
    },
}

impl Neighborhood {
    pub(crate) fn build(agents: &[Agent], search: NeighborSearch) -> Self {
        match search {
            NeighborSearch::BruteForce => Neighborhood::Exhaustive,
            NeighborSearch::RTree => Neighborhood::Indexed {
                positions: spatial::build_position_index(agents),
                projected: spatial::build_projected_index(agents),
            },
        }
    }

    fn perception_candidates(
        &self,
        agents: &[Agent],
        i: usize,
        visible_range: f64,
    ) -> Vec<usize> {
        match self {
            Neighborhood::Exhaustive => others(agents.len(), i),
            Neighborhood::Indexed { positions, .. } => spatial::query_candidates(
                positions,
                agents[i].position,
                visible_range,
                i,
            ),
        }
    }

    fn collision_candidates(&self, agents: &[Agent], i: usize, threshold: f64) -> Vec<usize> {
        match self {
            Neighborhood::Exhaustive => others(agents.len(), i),
            Neighborhood::Indexed { projected, .. } => spatial::query_candidates(
                projected,
                agents[i].projected_position(),
                threshold,
                i,
            ),
        }
    }

    pub(crate) fn decide<R: Rng + ?Sized>(
        &self,
        agents: &[Agent],
        i: usize,
        config: &FlockConfig,
        rng: &mut R,
    ) -> Decision {
        let perception = Perception::from_config(config);
        let candidates = self.perception_candidates(agents, i, perception.visible_range);
        let classification = classify(agents, i, &candidates, &perception);
        let (matched, diverged_from) = match_velocity(agents, i, &classification);
        if let Some(j) = diverged_from {
            log::trace!("agent {i} diverging along agent {j}");
        }

        let (avoidance, collisions) = avoid_collisions(
            agents,
            i,
            &self.collision_candidates(agents, i, config.collision_threshold),
            config.collision_threshold,
            config.jitter_scale,
            rng,
        );

        Decision {
            velocity: (matched + avoidance) / 2.0,
            matched,
            avoidance,
            close_flockmates: classification.close_flockmates.len(),
            diverged_from,
            collisions,
        }
    }
}

fn others(len: usize, i: usize) -> Vec<usize> {
    (0..len).filter(|&j| j != i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn agent(position: [f64; 3], velocity: [f64; 3]) -> Agent {
        Agent::new(DVec3::from_array(position), DVec3::from_array(velocity))
    }

    fn close(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-12
    }

    #[test]
    fn classify_splits_by_flock_range_and_skips_hidden() {
        let agents = vec![
            agent([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            agent([-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]), // behind, close
            agent([-5.0, 0.0, 0.0], [1.0, 0.0, 0.0]), // behind, distant
            agent([2.0, 0.0, 0.0], [1.0, 0.0, 0.0]),  // ahead: outside field of view
            agent([-20.0, 0.0, 0.0], [1.0, 0.0, 0.0]), // out of range
        ];
        let candidates = others(agents.len(), 0);
        let classification = classify(&agents, 0, &candidates, &Perception::default());
        assert_eq!(classification.close_flockmates, vec![1]);
        assert_eq!(classification.distant_visible, vec![2]);
    }

    #[test]
    fn classify_uses_the_given_perception_over_the_stored_one() {
        let wide = Perception {
            field_of_view: 180.0,
            visible_range: 30.0,
            flock_range: 10.0,
        };
        let agents = vec![
            agent([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]).with_perception(wide),
            agent([-5.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        ];
        let narrow = Perception {
            field_of_view: 160.0,
            visible_range: 4.0,
            flock_range: 1.0,
        };
        assert_eq!(classify(&agents, 0, &[1], &narrow), Classification::default());
        let classification = classify(&agents, 0, &[1], &Perception::default());
        assert_eq!(classification.distant_visible, vec![1]);
    }

    #[test]
    fn matching_averages_self_with_close_flockmates() {
        let agents = vec![
            agent([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            agent([-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            agent([-1.0, 1.0, 0.0], [0.0, 0.0, 4.0]),
        ];
        let classification = Classification {
            close_flockmates: vec![1, 2],
            distant_visible: vec![],
        };
        let (matched, diverged) = match_velocity(&agents, 0, &classification);
        assert!(close(matched, DVec3::new(1.0, 1.0, 4.0) / 3.0));
        assert_eq!(diverged, None);
    }

    #[test]
    fn divergence_takes_first_distant_in_index_order() {
        let agents = vec![
            agent([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            agent([-8.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            agent([-4.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        ];
        let classification =
            classify(&agents, 0, &others(agents.len(), 0), &Perception::default());
        assert_eq!(classification.distant_visible, vec![1, 2]);
        let (matched, diverged) = match_velocity(&agents, 0, &classification);
        assert_eq!(diverged, Some(1), "first match wins, not the closest");
        assert!(close(matched, DVec3::new(-8.0, 0.0, 0.0)));
    }

    #[test]
    fn matching_without_neighbors_keeps_own_velocity() {
        let agents = vec![agent([0.0, 0.0, 0.0], [0.5, 0.25, 0.0])];
        let (matched, diverged) = match_velocity(&agents, 0, &Classification::default());
        assert_eq!(matched, DVec3::new(0.5, 0.25, 0.0));
        assert_eq!(diverged, None);
    }

    #[test]
    fn avoidance_without_collisions_is_normalized_velocity() {
        let agents = vec![
            agent([0.0, 0.0, 0.0], [3.0, 0.0, 4.0]),
            agent([30.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        ];
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let (heading, collisions) = avoid_collisions(&agents, 0, &[1], 2.0, 0.03, &mut rng);
        assert_eq!(collisions, 0);
        assert!(close(heading, DVec3::new(0.6, 0.0, 0.8)));
    }

    #[test]
    fn avoidance_counts_every_projected_collision() {
        let agents = vec![
            agent([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            agent([1.5, 0.0, 0.0], [0.0, 0.0, 0.0]),
            agent([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
            agent([10.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
        ];
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let (heading, collisions) =
            avoid_collisions(&agents, 0, &others(agents.len(), 0), 2.0, 0.03, &mut rng);
        assert_eq!(collisions, 2);
        assert!((heading.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn avoidance_of_zero_velocity_without_jitter_has_no_heading() {
        let agents = vec![agent([0.0, 0.0, 0.0], [0.0, 0.0, 0.0])];
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let (heading, _) = avoid_collisions(&agents, 0, &[], 2.0, 0.03, &mut rng);
        assert_eq!(heading, DVec3::ZERO);
    }

    #[test]
    fn jitter_components_stay_on_the_scaled_grid() {
        let mut rng = ChaCha12Rng::seed_from_u64(8);
        for _ in 0..200 {
            let j = jitter(&mut rng, 0.03);
            for axis in 0..3 {
                let steps = j[axis] / 0.01;
                assert!((steps - steps.round()).abs() < 1e-9);
                assert!(j[axis].abs() <= 0.03 + 1e-12);
            }
        }
    }

    #[test]
    fn decide_blends_matching_and_avoidance() {
        let agents = vec![agent([0.0, 0.0, 0.0], [2.0, 0.0, 0.0])];
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let decision = decide(&agents, 0, &FlockConfig::default(), &mut rng);
        assert!(close(decision.matched, DVec3::new(2.0, 0.0, 0.0)));
        assert!(close(decision.avoidance, DVec3::new(1.0, 0.0, 0.0)));
        assert!(close(decision.velocity, DVec3::new(1.5, 0.0, 0.0)));
        assert_eq!(decision.close_flockmates, 0);
        assert_eq!(decision.collisions, 0);
    }
}
