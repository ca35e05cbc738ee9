use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::graph::GraphSnapshot;
use crate::snap::find_snaps;
use crate::{
    Coordinate, Direction, EdgeId, Length, MatchError, NodeId, Polyline, RoutingProfile,
    RoutingResult, WayTraversal,
};

/// Cancellation is polled once per this many settled heap elements.
const CANCEL_POLL_INTERVAL: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Measurement uncertainty used when snapping waypoints to the graph.
    pub snap_sigma: Length,
    /// Upper bound for a single shortest-path expansion.
    pub max_route_length: Length,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            snap_sigma: Length::from_meters(20.0),
            max_route_length: Length::from_meters(100_000.0),
        }
    }
}

/// A position on a directed edge, measured along the edge's own orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePosition {
    pub edge: EdgeId,
    pub distance_along: Length,
}

/// One traversed edge of a path, with the traveled span measured along the
/// traversal orientation (0 at the point the traversal enters the edge).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeTraversal {
    pub edge: EdgeId,
    pub direction: Direction,
    pub start: Length,
    pub end: Length,
}

impl EdgeTraversal {
    fn full(graph: &GraphSnapshot, edge: EdgeId, direction: Direction) -> Self {
        Self {
            edge,
            direction,
            start: Length::ZERO,
            end: graph.edge(edge).length,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPath {
    pub length: Length,
    pub traversals: Vec<EdgeTraversal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapElement {
    /// Best distance found so far from the origin seeds to this node.
    distance: Length,
    node: NodeId,
}

// std::BinaryHeap pops the greatest element first, so the ordering is
// reversed here to make it behave as a min heap, with the node id as a
// deterministic tie break.
impl Ord for HeapElement {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Computes the shortest path between two edge positions for the profile,
/// bounded by `max_length`. Returns None when the destination is not
/// reachable within the bound.
pub fn shortest_path(
    graph: &GraphSnapshot,
    profile: RoutingProfile,
    origin: EdgePosition,
    destination: EdgePosition,
    max_length: Length,
    cancel: &CancelToken,
) -> Option<RoutedPath> {
    if origin.edge == destination.edge
        && let Some(path) = same_edge_path(graph, profile, origin, destination)
    {
        return (path.length <= max_length).then_some(path);
    }

    let origin_edge = graph.edge(origin.edge);
    let destination_edge = graph.edge(destination.edge);

    // seed the node search from the origin position: continuing forward
    // reaches the edge end, going back against the orientation reaches the
    // edge start, each direction only when the profile may travel it
    let mut seeds: Vec<(NodeId, Length, EdgeTraversal)> = Vec::with_capacity(2);

    if origin_edge.access.allows(profile, Direction::Forward) {
        seeds.push((
            origin_edge.nodes[1],
            origin_edge.length - origin.distance_along,
            EdgeTraversal {
                edge: origin.edge,
                direction: Direction::Forward,
                start: origin.distance_along,
                end: origin_edge.length,
            },
        ));
    }

    if origin_edge.access.allows(profile, Direction::Backward) {
        seeds.push((
            origin_edge.nodes[0],
            origin.distance_along,
            EdgeTraversal {
                edge: origin.edge,
                direction: Direction::Backward,
                start: origin_edge.length - origin.distance_along,
                end: origin_edge.length,
            },
        ));
    }

    // entering the destination edge at its start travels forward to the
    // position, entering at its end travels backward to it
    let mut exits: FxHashMap<NodeId, (Length, EdgeTraversal)> = FxHashMap::default();

    if destination_edge.access.allows(profile, Direction::Forward) {
        exits.insert(
            destination_edge.nodes[0],
            (
                destination.distance_along,
                EdgeTraversal {
                    edge: destination.edge,
                    direction: Direction::Forward,
                    start: Length::ZERO,
                    end: destination.distance_along,
                },
            ),
        );
    }

    if destination_edge.access.allows(profile, Direction::Backward) {
        exits.insert(
            destination_edge.nodes[1],
            (
                destination_edge.length - destination.distance_along,
                EdgeTraversal {
                    edge: destination.edge,
                    direction: Direction::Backward,
                    start: Length::ZERO,
                    end: destination_edge.length - destination.distance_along,
                },
            ),
        );
    }

    if seeds.is_empty() || exits.is_empty() {
        return None;
    }

    // (current) shortest distance from the origin to this node
    let mut shortest_distances: FxHashMap<NodeId, Length> = FxHashMap::default();

    // previous traversal on the current best known path to this node,
    // None marks a seeded node
    let mut prev: FxHashMap<NodeId, Option<(EdgeTraversal, NodeId)>> = FxHashMap::default();
    let mut seed_traversals: FxHashMap<NodeId, EdgeTraversal> = FxHashMap::default();

    let mut frontier = BinaryHeap::new();

    for (node, distance, traversal) in seeds {
        if distance < *shortest_distances.get(&node).unwrap_or(&Length::MAX) {
            shortest_distances.insert(node, distance);
            prev.insert(node, None);
            seed_traversals.insert(node, traversal);
            frontier.push(HeapElement { distance, node });
        }
    }

    let mut best: Option<(Length, NodeId)> = None;
    let mut settled = 0usize;

    while let Some(element) = frontier.pop() {
        settled += 1;
        if settled % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            return None;
        }

        // stale heap entry, a shorter path to this node was already settled
        let shortest = *shortest_distances.get(&element.node).unwrap_or(&Length::MAX);
        if element.distance > shortest {
            continue;
        }

        if let Some(&(tail, _)) = exits.get(&element.node) {
            let total = element.distance + tail;
            if total <= max_length && best.is_none_or(|(length, _)| total < length) {
                best = Some((total, element.node));
            }
        }

        // once the frontier is past the best known total, it cannot improve
        if let Some((length, _)) = best
            && element.distance >= length
        {
            break;
        }

        for (edge, direction, node_to) in graph.edges_from(element.node, profile) {
            let distance = element.distance + graph.edge(edge).length;
            if distance > max_length {
                continue;
            }

            let shortest = *shortest_distances.get(&node_to).unwrap_or(&Length::MAX);
            // relax the neighbor when this path improves on its known distance
            if distance < shortest {
                shortest_distances.insert(node_to, distance);
                prev.insert(
                    node_to,
                    Some((EdgeTraversal::full(graph, edge, direction), element.node)),
                );
                frontier.push(HeapElement {
                    distance,
                    node: node_to,
                });
            }
        }
    }

    let (length, exit_node) = best?;
    let (_, exit_traversal) = exits[&exit_node];

    // unpack from the exit node back to the seeded node
    let mut traversals = vec![exit_traversal];
    let mut next = exit_node;

    loop {
        match prev.get(&next) {
            Some(Some((traversal, previous))) => {
                traversals.push(*traversal);
                next = *previous;
            }
            Some(None) => {
                traversals.push(seed_traversals[&next]);
                break;
            }
            None => return None,
        }
    }

    traversals.reverse();
    Some(RoutedPath { length, traversals })
}

fn same_edge_path(
    graph: &GraphSnapshot,
    profile: RoutingProfile,
    origin: EdgePosition,
    destination: EdgePosition,
) -> Option<RoutedPath> {
    let edge = graph.edge(origin.edge);

    if destination.distance_along >= origin.distance_along {
        let length = destination.distance_along - origin.distance_along;
        edge.access
            .allows(profile, Direction::Forward)
            .then_some(RoutedPath {
                length,
                traversals: vec![EdgeTraversal {
                    edge: origin.edge,
                    direction: Direction::Forward,
                    start: origin.distance_along,
                    end: destination.distance_along,
                }],
            })
    } else {
        let length = origin.distance_along - destination.distance_along;
        edge.access
            .allows(profile, Direction::Backward)
            .then_some(RoutedPath {
                length,
                traversals: vec![EdgeTraversal {
                    edge: origin.edge,
                    direction: Direction::Backward,
                    start: edge.length - origin.distance_along,
                    end: edge.length - destination.distance_along,
                }],
            })
    }
}

/// The points of one traversal: the edge geometry oriented by the traversal
/// direction and clipped to the traveled span.
pub(crate) fn traversal_points(graph: &GraphSnapshot, traversal: &EdgeTraversal) -> Vec<Coordinate> {
    let edge = graph.edge(traversal.edge);

    let oriented: Vec<Coordinate> = match traversal.direction {
        Direction::Forward => edge.geometry.clone(),
        Direction::Backward => edge.geometry.iter().rev().copied().collect(),
    };

    clip_oriented(&oriented, traversal.start, traversal.end)
}

fn clip_oriented(points: &[Coordinate], start: Length, end: Length) -> Vec<Coordinate> {
    let mut clipped = Vec::new();
    let mut acc = Length::ZERO;

    for window in points.windows(2) {
        let segment = window[0].distance(&window[1]);
        let segment_end = acc + segment;

        if segment_end >= start && acc <= end && segment > Length::ZERO {
            let from_t = ((start - acc).meters() / segment.meters()).clamp(0.0, 1.0);
            let to_t = ((end - acc).meters() / segment.meters()).clamp(0.0, 1.0);

            let interpolate = |t: f64| {
                Coordinate::new(
                    window[0].x + (window[1].x - window[0].x) * t,
                    window[0].y + (window[1].y - window[0].y) * t,
                )
            };

            let first = interpolate(from_t);
            if clipped.last() != Some(&first) {
                clipped.push(first);
            }

            let last = interpolate(to_t);
            if clipped.last() != Some(&last) {
                clipped.push(last);
            }
        }

        acc = segment_end;
    }

    clipped
}

/// Collapses a traversal sequence into the way list: a new entry only when
/// the way differs from the previous one, or the traversal direction does.
/// An immediate reversal on the same way is a boundary. Zero-extent
/// traversals (a position sitting exactly on a node produces one as a seed
/// or exit) cover no path and contribute no entry.
pub(crate) fn ways_from_traversals(
    graph: &GraphSnapshot,
    traversals: &[EdgeTraversal],
) -> Vec<WayTraversal> {
    let mut ways: Vec<WayTraversal> = Vec::new();

    for traversal in traversals {
        if traversal.start == traversal.end {
            continue;
        }

        let entry = WayTraversal {
            way: graph.edge(traversal.edge).way,
            direction: traversal.direction,
        };

        if ways.last() != Some(&entry) {
            ways.push(entry);
        }
    }

    ways
}

/// Elevation collaborator. Routing results carry gain and loss computed
/// from whatever model the caller supplies; the core never looks up
/// elevation itself.
pub trait ElevationModel: Send + Sync {
    fn elevation_at(&self, point: Coordinate) -> Option<f64>;
}

/// Model without relief; every routing result reports zero gain and loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatElevation;

impl ElevationModel for FlatElevation {
    fn elevation_at(&self, _: Coordinate) -> Option<f64> {
        None
    }
}

/// Computes a shortest path through all waypoints in order, snapping each
/// waypoint to the graph first.
pub fn route_via(
    graph: &GraphSnapshot,
    profile: RoutingProfile,
    waypoints: &[Coordinate],
    config: &RouterConfig,
    elevation: &dyn ElevationModel,
    cancel: &CancelToken,
) -> Result<RoutingResult, MatchError> {
    info!("Routing via {} waypoints with {profile}", waypoints.len());

    if waypoints.len() < 2 {
        return Err(MatchError::DegenerateGeometry);
    }

    let positions: Vec<EdgePosition> = waypoints
        .iter()
        .map(|&waypoint| {
            find_snaps(graph, profile, waypoint, config.snap_sigma)
                .first()
                .map(|snap| EdgePosition {
                    edge: snap.edge,
                    distance_along: snap.distance_along,
                })
                .ok_or_else(|| MatchError::no_route("no counterpart found"))
        })
        .collect::<Result<_, _>>()?;

    let mut traversals: Vec<EdgeTraversal> = Vec::new();

    for window in positions.windows(2) {
        cancel.checked()?;

        let leg = shortest_path(
            graph,
            profile,
            window[0],
            window[1],
            config.max_route_length,
            cancel,
        )
        .ok_or_else(|| {
            debug!("No route between {:?} and {:?}", window[0], window[1]);
            MatchError::no_route("waypoints are not connected in the reference network")
        })?;

        traversals.extend(leg.traversals);
    }

    cancel.checked()?;

    let mut points: Vec<Coordinate> = Vec::new();
    for traversal in &traversals {
        for point in traversal_points(graph, traversal) {
            if points.last() != Some(&point) {
                points.push(point);
            }
        }
    }

    if points.len() < 2 {
        return Err(MatchError::no_route("routed path has no extent"));
    }

    let (ascent, descent) = elevation_profile(&points, elevation);

    Ok(RoutingResult {
        geometry: Polyline::from(points),
        ways: ways_from_traversals(graph, &traversals),
        ascent,
        descent,
    })
}

fn elevation_profile(points: &[Coordinate], elevation: &dyn ElevationModel) -> (Length, Length) {
    let mut ascent = 0.0;
    let mut descent = 0.0;
    let mut previous: Option<f64> = None;

    for point in points {
        let Some(current) = elevation.elevation_at(*point) else {
            continue;
        };

        if let Some(previous) = previous {
            let delta = current - previous;
            if delta > 0.0 {
                ascent += delta;
            } else {
                descent -= delta;
            }
        }

        previous = Some(current);
    }

    (Length::from_meters(ascent), Length::from_meters(descent))
}
