use crate::agent::Agent;
use glam::DVec3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Relative slack added to query radii so float rounding in the squared-distance
/// test never drops a candidate the exact predicate would accept.
const RADIUS_SLACK: f64 = 1e-9;

/// An agent's index paired with one of its points (current or projected).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentLocation {
    pub index: usize,
    pub position: [f64; 3],
}

impl RTreeObject for AgentLocation {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for AgentLocation {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        DVec3::from_array(self.position).distance_squared(DVec3::from_array(*point))
    }
}

/// Build an R*-tree over current positions via bulk_load (O(n log n)).
pub fn build_position_index(agents: &[Agent]) -> RTree<AgentLocation> {
    bulk_load(agents, |agent| agent.position)
}

/// Build an R*-tree over positions projected one full step ahead.
pub fn build_projected_index(agents: &[Agent]) -> RTree<AgentLocation> {
    bulk_load(agents, Agent::projected_position)
}

// Non-finite points can never satisfy a distance predicate, so they stay out of the tree.
fn bulk_load(agents: &[Agent], point: impl Fn(&Agent) -> DVec3) -> RTree<AgentLocation> {
    let locations = agents
        .iter()
        .enumerate()
        .map(|(index, agent)| (index, point(agent)))
        .filter(|(_, position)| position.is_finite())
        .map(|(index, position)| AgentLocation {
            index,
            position: position.to_array(),
        })
        .collect();
    RTree::bulk_load(locations)
}

/// Indices within `radius` of `center`, excluding `exclude`, in ascending order.
///
/// The result is a superset of the strict `distance < radius` set; callers apply
/// their own exact predicate afterwards.
pub fn query_candidates(
    tree: &RTree<AgentLocation>,
    center: DVec3,
    radius: f64,
    exclude: usize,
) -> Vec<usize> {
    if !(radius.is_finite() && center.is_finite()) {
        return Vec::new();
    }
    let padded = radius * (1.0 + RADIUS_SLACK) + RADIUS_SLACK;
    let mut indices: Vec<usize> = tree
        .locate_within_distance(center.to_array(), padded * padded)
        .map(|location| location.index)
        .filter(|&index| index != exclude)
        .collect();
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(x: f64, vx: f64) -> Agent {
        Agent::new(DVec3::new(x, 0.0, 0.0), DVec3::new(vx, 0.0, 0.0))
    }

    #[test]
    fn query_returns_sorted_indices_without_self() {
        let agents: Vec<Agent> = [5.0, 0.0, 1.0, 2.5, 40.0]
            .iter()
            .map(|&x| agent(x, 1.0))
            .collect();
        let tree = build_position_index(&agents);
        let found = query_candidates(&tree, agents[1].position, 3.0, 1);
        assert_eq!(found, vec![2, 3]);
    }

    #[test]
    fn boundary_distance_is_kept_as_candidate() {
        let agents = vec![agent(0.0, 1.0), agent(3.0, 1.0)];
        let tree = build_position_index(&agents);
        assert_eq!(query_candidates(&tree, agents[0].position, 3.0, 0), vec![1]);
    }

    #[test]
    fn projected_index_uses_position_plus_velocity() {
        let agents = vec![agent(0.0, 10.0), agent(20.0, -9.0)];
        let tree = build_projected_index(&agents);
        let found = query_candidates(&tree, agents[0].projected_position(), 2.0, 0);
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn non_finite_center_yields_nothing() {
        let agents = vec![agent(0.0, 1.0), agent(1.0, 1.0)];
        let tree = build_position_index(&agents);
        let center = DVec3::new(f64::NAN, 0.0, 0.0);
        assert!(query_candidates(&tree, center, 3.0, 0).is_empty());
    }
}
