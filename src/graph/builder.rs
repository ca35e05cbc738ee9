use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::geometry::{CoordKey, dedup_points};
use crate::graph::{EdgeRecord, GraphSnapshot, WayRecord};
use crate::{Coordinate, EdgeAttribution, EdgeId, NodeId, WayId};

/// One edge produced for a way during graph construction, handed to
/// observers before the snapshot is assembled.
#[derive(Debug, Clone, Copy)]
pub struct CreatedEdge<'a> {
    pub id: EdgeId,
    pub geometry: &'a [Coordinate],
}

/// Build-time extension point: invoked once per source way, after the
/// builder has split it into directed edges. This replaces any privileged
/// access to builder internals.
pub trait EdgeCreationObserver {
    fn on_way_processed(&mut self, way: &WayRecord, edges: &[CreatedEdge<'_>]);
}

/// Builds a graph snapshot from source way records, splitting each way into
/// edges at barriers and shared topology nodes, and notifying the observer
/// per processed way. The returned snapshot carries no edge attribution;
/// use [`attribute_graph`](crate::attribute_graph) for the common case.
pub fn build_graph(
    ways: &[WayRecord],
    observer: &mut dyn EdgeCreationObserver,
) -> GraphBuildOutput {
    info!("Building graph from {} ways", ways.len());

    let junctions = collect_junctions(ways);

    let mut nodes: Vec<Coordinate> = Vec::new();
    let mut node_ids: FxHashMap<CoordKey, NodeId> = FxHashMap::default();
    let mut edges: Vec<EdgeRecord> = Vec::new();
    let mut way_edges: FxHashMap<WayId, Vec<EdgeId>> = FxHashMap::default();

    let mut node_at = |point: Coordinate, nodes: &mut Vec<Coordinate>| {
        *node_ids.entry(CoordKey::from(&point)).or_insert_with(|| {
            let id = NodeId(nodes.len() as u32);
            nodes.push(point);
            id
        })
    };

    for way in ways {
        let points = dedup_points(&way.geometry);

        if points.len() < 2 {
            debug!("Skipping way {:?}: fewer than 2 distinct points", way.id);
            continue;
        }

        let barriers: FxHashSet<CoordKey> =
            way.tags.barriers.iter().map(CoordKey::from).collect();

        // split at the way ends, at shared topology nodes and at barriers
        let mut split_indices = vec![0];
        for (index, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
            let key = CoordKey::from(point);
            if junctions.contains(&key) || barriers.contains(&key) {
                split_indices.push(index);
            }
        }
        split_indices.push(points.len() - 1);

        let first_edge = edges.len();

        for window in split_indices.windows(2) {
            let segment = &points[window[0]..=window[1]];
            debug_assert!(segment.len() >= 2);

            let id = EdgeId(edges.len() as u32);
            let from = node_at(segment[0], &mut nodes);
            let to = node_at(segment[segment.len() - 1], &mut nodes);

            edges.push(EdgeRecord {
                way: way.id,
                nodes: [from, to],
                geometry: segment.to_vec(),
                length: segment.windows(2).map(|w| w[0].distance(&w[1])).sum(),
                access: way.tags.access,
            });
            way_edges.entry(way.id).or_default().push(id);
        }

        let created: Vec<CreatedEdge<'_>> = edges[first_edge..]
            .iter()
            .enumerate()
            .map(|(offset, edge)| CreatedEdge {
                id: EdgeId((first_edge + offset) as u32),
                geometry: &edge.geometry,
            })
            .collect();

        observer.on_way_processed(way, &created);
    }

    info!(
        "Graph built: {} nodes, {} edges",
        nodes.len(),
        edges.len()
    );

    GraphBuildOutput {
        nodes,
        edges,
        way_edges,
    }
}

/// Intermediate build result, turned into a snapshot once the attribution
/// map is known.
#[derive(Debug)]
pub struct GraphBuildOutput {
    nodes: Vec<Coordinate>,
    edges: Vec<EdgeRecord>,
    way_edges: FxHashMap<WayId, Vec<EdgeId>>,
}

impl GraphBuildOutput {
    pub fn into_snapshot(
        self,
        attributions: FxHashMap<EdgeId, EdgeAttribution>,
    ) -> GraphSnapshot {
        GraphSnapshot::assemble(self.nodes, self.edges, self.way_edges, attributions)
    }
}

/// A coordinate is a junction when it appears in more than one way, or more
/// than once overall (self-intersections), or as a way endpoint.
fn collect_junctions(ways: &[WayRecord]) -> FxHashSet<CoordKey> {
    let mut occurrences: FxHashMap<CoordKey, u32> = FxHashMap::default();

    for way in ways {
        let points = dedup_points(&way.geometry);
        for (index, point) in points.iter().enumerate() {
            let key = CoordKey::from(point);
            let endpoint = index == 0 || index == points.len() - 1;
            *occurrences.entry(key).or_default() += if endpoint { 2 } else { 1 };
        }
    }

    occurrences
        .into_iter()
        .filter_map(|(key, count)| (count >= 2).then_some(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::graph::WayTags;
    use crate::{Polyline, RoutingProfile};

    struct NoopObserver;

    impl EdgeCreationObserver for NoopObserver {
        fn on_way_processed(&mut self, _: &WayRecord, _: &[CreatedEdge<'_>]) {}
    }

    fn way(id: i64, points: Vec<Coordinate>) -> WayRecord {
        WayRecord {
            id: WayId(id),
            geometry: Polyline::from(points),
            tags: WayTags::default(),
        }
    }

    fn c(x: f64, y: f64) -> Coordinate {
        Coordinate::new(x, y)
    }

    #[test]
    fn graph_builder_splits_at_shared_node_001() {
        // way 2 touches the midpoint of way 1, splitting it into two edges
        let ways = [
            way(1, vec![c(0.0, 0.0), c(150.0, 0.0), c(300.0, 0.0)]),
            way(2, vec![c(150.0, 0.0), c(150.0, 200.0)]),
        ];

        let graph = build_graph(&ways, &mut NoopObserver).into_snapshot(Default::default());

        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.way_edges(WayId(1)).len(), 2);
        assert_eq!(graph.way_edges(WayId(2)).len(), 1);

        let [first, second] = [graph.way_edges(WayId(1))[0], graph.way_edges(WayId(1))[1]];
        assert_eq!(graph.edge(first).geometry, [c(0.0, 0.0), c(150.0, 0.0)]);
        assert_eq!(graph.edge(second).geometry, [c(150.0, 0.0), c(300.0, 0.0)]);
    }

    #[test]
    fn graph_builder_splits_at_barrier_001() {
        let mut record = way(7, vec![c(0.0, 0.0), c(50.0, 0.0), c(100.0, 0.0)]);
        record.tags.barriers = vec![c(50.0, 0.0)];

        let graph = build_graph(&[record], &mut NoopObserver).into_snapshot(Default::default());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn graph_builder_skips_degenerate_way_001() {
        let ways = [
            way(1, vec![c(5.0, 5.0), c(5.0, 5.0), c(5.0, 5.0)]),
            way(2, vec![c(0.0, 0.0), c(10.0, 0.0)]),
        ];

        let graph = build_graph(&ways, &mut NoopObserver).into_snapshot(Default::default());

        assert_eq!(graph.edge_count(), 1);
        assert!(graph.way_edges(WayId(1)).is_empty());
    }

    #[test]
    fn graph_builder_adjacency_001() {
        let ways = [
            way(1, vec![c(0.0, 0.0), c(100.0, 0.0)]),
            way(2, vec![c(100.0, 0.0), c(200.0, 0.0)]),
        ];

        let graph = build_graph(&ways, &mut NoopObserver).into_snapshot(Default::default());

        let shared = (0..graph.node_count() as u32)
            .map(NodeId)
            .find(|&n| graph.node_coordinate(n) == c(100.0, 0.0))
            .unwrap();

        let neighbors: Vec<_> = graph.edges_from(shared, RoutingProfile::Bike).collect();
        assert_eq!(neighbors.len(), 2);
    }
}
