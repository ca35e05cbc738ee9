use rstar::AABB;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::geometry::project_onto_polyline;
use crate::graph::GraphSnapshot;
use crate::{Coordinate, EdgeId, Length, NodeId, RoutingProfile};

/// Envelope radius grows by this many sigmas per iteration.
const GROWTH_SIGMAS: f64 = 10.0;

/// The search gives up past this many growth steps (50 sigma).
const MAX_GROWTH_STEPS: usize = 5;

/// A plausible location on the graph near a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    pub edge: EdgeId,
    /// Squared distance from the query point to the projection.
    pub distance_2: f64,
    /// The projected point on the edge geometry.
    pub point: Coordinate,
    /// Distance from the edge start to the projection, along the edge.
    pub distance_along: Length,
    /// Set when the snap coincides with an edge endpoint (tower node).
    pub node: Option<NodeId>,
}

/// Finds candidate snap locations for a query point under a measurement
/// uncertainty of `sigma`, growing the search envelope in coarse steps and
/// stopping at the first iteration that yields any snap.
///
/// Growing coarsely rather than one unit at a time trades precision for the
/// chance of collecting several genuine alternatives before giving up; the
/// matcher disambiguates across the whole point sequence.
///
/// Candidate edges only need one permitted travel direction for the profile.
/// Edges on isolated network fragments are deliberately not filtered out:
/// the reference network contains many small disconnected pieces that must
/// still be matchable.
pub fn find_snaps(
    graph: &GraphSnapshot,
    profile: RoutingProfile,
    query: Coordinate,
    sigma: Length,
) -> Vec<Snap> {
    for step in 1..=MAX_GROWTH_STEPS {
        let radius = sigma.meters() * GROWTH_SIGMAS * step as f64;
        let snaps = find_snaps_within(graph, profile, query, radius);

        if !snaps.is_empty() {
            trace!(
                "Found {} snaps for ({}, {}) at radius {radius}",
                snaps.len(),
                query.x,
                query.y
            );
            return snaps;
        }
    }

    debug!(
        "No snap for ({}, {}) within {} sigmas",
        query.x,
        query.y,
        GROWTH_SIGMAS * MAX_GROWTH_STEPS as f64
    );
    vec![]
}

fn find_snaps_within(
    graph: &GraphSnapshot,
    profile: RoutingProfile,
    query: Coordinate,
    radius: f64,
) -> Vec<Snap> {
    let envelope = AABB::from_corners(
        [query.x - radius, query.y - radius],
        [query.x + radius, query.y + radius],
    );

    // interior snaps keep only the closest projection per edge,
    // tower snaps keep only the first one per node
    let mut interior: FxHashMap<EdgeId, Snap> = FxHashMap::default();
    let mut towers: FxHashMap<NodeId, Snap> = FxHashMap::default();
    let mut seen_nodes: FxHashSet<NodeId> = FxHashSet::default();

    for edge_id in graph.edges_within(envelope) {
        let edge = graph.edge(edge_id);

        if !edge.access.allows_any(profile) {
            trace!("Edge {edge_id:?} not accessible for {profile}");
            continue;
        }

        let Some(projection) = project_onto_polyline(&query, &edge.geometry) else {
            continue;
        };

        // the projection itself must fall inside the queried envelope
        if (projection.point.x - query.x).abs() > radius
            || (projection.point.y - query.y).abs() > radius
        {
            continue;
        }

        let node = if projection.point == edge.start_point() {
            Some(edge.nodes[0])
        } else if projection.point == edge.end_point() {
            Some(edge.nodes[1])
        } else {
            None
        };

        let snap = Snap {
            edge: edge_id,
            distance_2: projection.distance_2,
            point: projection.point,
            distance_along: projection.distance_along,
            node,
        };

        match node {
            Some(node) => {
                if seen_nodes.insert(node) {
                    towers.insert(node, snap);
                }
            }
            None => {
                let best = interior.entry(edge_id).or_insert(snap);
                if snap.distance_2 < best.distance_2 {
                    *best = snap;
                }
            }
        }
    }

    let mut snaps: Vec<Snap> = interior.into_values().chain(towers.into_values()).collect();
    snaps.sort_by(|a, b| a.distance_2.total_cmp(&b.distance_2));
    snaps
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::graph::attribution::attribute_graph;
    use crate::graph::{AccessFlags, ProfileAccess, WayRecord, WayTags};
    use crate::{Polyline, WayId};

    fn c(x: f64, y: f64) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn way(id: i64, points: Vec<Coordinate>) -> WayRecord {
        WayRecord {
            id: WayId(id),
            geometry: Polyline::from(points),
            tags: WayTags::default(),
        }
    }

    const SIGMA: Length = Length::from_meters(5.0);

    #[test]
    fn snap_search_finds_nearby_edge_001() {
        let graph = attribute_graph(&[way(1, vec![c(0.0, 0.0), c(100.0, 0.0)])]);

        let snaps = find_snaps(&graph, RoutingProfile::Bike, c(50.0, 10.0), SIGMA);

        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].point, c(50.0, 0.0));
        assert_eq!(snaps[0].distance_2, 100.0);
        assert_eq!(snaps[0].distance_along, Length::from_meters(50.0));
        assert_eq!(snaps[0].node, None);
    }

    #[test]
    fn snap_search_grows_envelope_001() {
        // first iterations (radius 50, 100) find nothing, the edge only
        // enters the envelope at 150m
        let graph = attribute_graph(&[way(1, vec![c(0.0, 120.0), c(100.0, 120.0)])]);

        let snaps = find_snaps(&graph, RoutingProfile::Bike, c(50.0, 0.0), SIGMA);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].point, c(50.0, 120.0));
    }

    #[test]
    fn snap_search_gives_up_beyond_max_radius_001() {
        let graph = attribute_graph(&[way(1, vec![c(0.0, 1000.0), c(100.0, 1000.0)])]);

        // 50 sigma = 250m, the edge is 1000m away
        let snaps = find_snaps(&graph, RoutingProfile::Bike, c(50.0, 0.0), SIGMA);
        assert!(snaps.is_empty());
    }

    #[test]
    fn snap_search_isolated_fragment_is_matchable_001() {
        // a fragment disconnected from everything else must still snap
        let graph = attribute_graph(&[
            way(1, vec![c(0.0, 0.0), c(100.0, 0.0)]),
            way(2, vec![c(5000.0, 0.0), c(5100.0, 0.0)]),
        ]);

        let snaps = find_snaps(&graph, RoutingProfile::Bike, c(5050.0, 5.0), SIGMA);
        assert_eq!(snaps.len(), 1);
        assert_eq!(graph.edge(snaps[0].edge).way, WayId(2));
    }

    #[test]
    fn snap_search_access_filter_001() {
        let mut record = way(1, vec![c(0.0, 0.0), c(100.0, 0.0)]);
        record.tags.access = ProfileAccess {
            bike: AccessFlags {
                forward: false,
                backward: false,
            },
            foot: AccessFlags::BOTH,
        };

        let graph = attribute_graph(&[record]);

        assert!(find_snaps(&graph, RoutingProfile::Bike, c(50.0, 5.0), SIGMA).is_empty());
        assert_eq!(
            find_snaps(&graph, RoutingProfile::Foot, c(50.0, 5.0), SIGMA).len(),
            1
        );
    }

    #[test]
    fn snap_search_tower_node_deduplicated_001() {
        // two edges share a node; snapping onto the shared endpoint must
        // yield a single tower snap, not one per edge
        let graph = attribute_graph(&[
            way(1, vec![c(0.0, 0.0), c(100.0, 0.0)]),
            way(2, vec![c(100.0, 0.0), c(200.0, 0.0)]),
        ]);

        let snaps = find_snaps(&graph, RoutingProfile::Bike, c(100.0, 3.0), SIGMA);

        let tower_snaps: Vec<_> = snaps.iter().filter(|s| s.node.is_some()).collect();
        assert_eq!(tower_snaps.len(), 1);
        assert_eq!(tower_snaps[0].point, c(100.0, 0.0));
    }

    #[test]
    fn snap_search_multiple_candidates_001() {
        // parallel edges both within reach produce multiple candidates
        let graph = attribute_graph(&[
            way(1, vec![c(0.0, 10.0), c(100.0, 10.0)]),
            way(2, vec![c(0.0, -10.0), c(100.0, -10.0)]),
        ]);

        let snaps = find_snaps(&graph, RoutingProfile::Bike, c(50.0, 0.0), SIGMA);
        assert_eq!(snaps.len(), 2);
        assert!(snaps[0].distance_2 <= snaps[1].distance_2);
    }
}
