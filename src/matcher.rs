use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use crate::cancel::CancelToken;
use crate::geometry::dedup_points;
use crate::graph::GraphSnapshot;
use crate::routing::{
    EdgePosition, EdgeTraversal, RoutedPath, shortest_path, traversal_points,
    ways_from_traversals,
};
use crate::snap::{Snap, find_snaps};
use crate::{
    Coordinate, EdgeDetail, Length, MatchError, MatchResult, Polyline, RoutingProfile,
};

#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// Measurement uncertainty of the query points.
    pub sigma: Length,
    /// Scale of the transition penalty: how many meters of detour between
    /// two consecutive candidates cost one unit of log-probability.
    pub transition_beta: f64,
    /// Bound for the on-network route between consecutive candidates, as a
    /// factor of their straight-line distance.
    pub max_route_distance_factor: f64,
    /// Snaps considered per query point, closest first.
    pub max_candidates: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            sigma: Length::from_meters(10.0),
            transition_beta: 2.0,
            max_route_distance_factor: 10.0,
            max_candidates: 8,
        }
    }
}

/// Aligns an ordered sequence of query points to the most probable connected
/// path in the graph.
///
/// Per-point candidates come from the snap search; a Viterbi pass over the
/// candidate lattice scores each candidate by its snap distance (emission)
/// and each candidate pair by how much the on-network route between them
/// deviates from the straight-line distance (transition).
///
/// All scratch state lives in the call frame, so one matcher instance is
/// safe to share between threads; instances for different profiles run
/// fully in parallel over the same graph snapshot.
#[derive(Debug, Clone)]
pub struct NetworkMatcher {
    profile: RoutingProfile,
    config: MatcherConfig,
}

/// One candidate lattice layer: a query point with its snaps.
#[derive(Debug)]
struct Layer {
    query: Coordinate,
    snaps: Vec<Snap>,
}

impl NetworkMatcher {
    pub fn new(profile: RoutingProfile, config: MatcherConfig) -> Self {
        Self { profile, config }
    }

    pub const fn profile(&self) -> RoutingProfile {
        self.profile
    }

    /// Matches the query points to a connected path.
    pub fn match_points(
        &self,
        graph: &GraphSnapshot,
        points: &[Coordinate],
        cancel: &CancelToken,
    ) -> Result<MatchResult, MatchError> {
        info!("Matching {} points with {}", points.len(), self.profile);

        let points = dedup_points(points);
        if points.len() < 2 {
            return Err(MatchError::DegenerateGeometry);
        }

        let layers = self.build_layers(graph, &points);
        if layers.len() < 2 {
            return Err(MatchError::no_match(
                "geometry or parts not part of reference network",
            ));
        }

        let mut scratch = TransitionScratch::default();
        let chosen = self.viterbi(graph, &layers, &mut scratch, cancel)?;

        self.assemble(graph, &layers, &chosen, &mut scratch, cancel)
    }

    /// Query points without any snap are dropped from the lattice; matching
    /// only fails once fewer than two layers remain.
    fn build_layers(&self, graph: &GraphSnapshot, points: &[Coordinate]) -> Vec<Layer> {
        points
            .iter()
            .filter_map(|&query| {
                let mut snaps = find_snaps(graph, self.profile, query, self.config.sigma);
                if snaps.is_empty() {
                    debug!("Dropping query point ({}, {}): no snap", query.x, query.y);
                    return None;
                }

                snaps.truncate(self.config.max_candidates);
                Some(Layer { query, snaps })
            })
            .collect()
    }

    /// Emission score of a snap under the measurement uncertainty.
    fn emission(&self, snap: &Snap) -> f64 {
        let sigma = self.config.sigma.meters();
        -0.5 * snap.distance_2 / (sigma * sigma)
    }

    /// Transition score between candidates of two consecutive layers, based
    /// on how far the on-network route deviates from the straight line.
    fn transition(
        &self,
        graph: &GraphSnapshot,
        scratch: &mut TransitionScratch,
        layer: usize,
        from: (usize, &Snap),
        to: (usize, &Snap),
        straight: Length,
        cancel: &CancelToken,
    ) -> Option<f64> {
        let route = scratch
            .route(graph, self.profile, layer, from, to, straight, self.config, cancel)
            .as_ref()?;

        let deviation = (route.length.meters() - straight.meters()).abs();
        Some(-deviation / self.config.transition_beta)
    }

    fn viterbi(
        &self,
        graph: &GraphSnapshot,
        layers: &[Layer],
        scratch: &mut TransitionScratch,
        cancel: &CancelToken,
    ) -> Result<Vec<usize>, MatchError> {
        // score and back pointer per candidate of the current layer
        let mut scores: Vec<f64> = layers[0].snaps.iter().map(|s| self.emission(s)).collect();
        let mut back_pointers: Vec<Vec<usize>> = Vec::with_capacity(layers.len());

        for (layer_index, window) in layers.windows(2).enumerate() {
            cancel.checked()?;

            let [current, next] = [&window[0], &window[1]];
            let straight = current.query.distance(&next.query);

            let mut next_scores = vec![f64::NEG_INFINITY; next.snaps.len()];
            let mut pointers = vec![0usize; next.snaps.len()];

            for (j, snap_to) in next.snaps.iter().enumerate() {
                let emission = self.emission(snap_to);

                for (i, snap_from) in current.snaps.iter().enumerate() {
                    if scores[i] == f64::NEG_INFINITY {
                        continue;
                    }

                    let Some(transition) = self.transition(
                        graph,
                        scratch,
                        layer_index,
                        (i, snap_from),
                        (j, snap_to),
                        straight,
                        cancel,
                    ) else {
                        continue;
                    };

                    let score = scores[i] + transition + emission;
                    if score > next_scores[j] {
                        next_scores[j] = score;
                        pointers[j] = i;
                    }
                }

                trace!("Layer {layer_index} candidate {j}: score {}", next_scores[j]);
            }

            scores = next_scores;
            back_pointers.push(pointers);
        }

        let (mut best, best_score) = scores
            .iter()
            .enumerate()
            .max_by_key(|&(_, &score)| OrderedFloat(score))
            .map(|(index, &score)| (index, score))
            .unwrap_or((0, f64::NEG_INFINITY));

        if best_score == f64::NEG_INFINITY {
            return Err(MatchError::no_match("no counterpart found"));
        }

        let mut chosen = vec![best; layers.len()];
        for (layer_index, pointers) in back_pointers.iter().enumerate().rev() {
            best = pointers[best];
            chosen[layer_index] = best;
        }

        Ok(chosen)
    }

    /// Builds the result path by routing between the chosen candidates and
    /// concatenating the traversals, merging contiguous spans on one edge.
    fn assemble(
        &self,
        graph: &GraphSnapshot,
        layers: &[Layer],
        chosen: &[usize],
        scratch: &mut TransitionScratch,
        cancel: &CancelToken,
    ) -> Result<MatchResult, MatchError> {
        let mut traversals: Vec<EdgeTraversal> = Vec::new();

        for (layer_index, window) in layers.windows(2).enumerate() {
            let [current, next] = [&window[0], &window[1]];
            let straight = current.query.distance(&next.query);

            let [i, j] = [chosen[layer_index], chosen[layer_index + 1]];
            let leg = scratch
                .route(
                    graph,
                    self.profile,
                    layer_index,
                    (i, &current.snaps[i]),
                    (j, &next.snaps[j]),
                    straight,
                    self.config,
                    cancel,
                )
                .clone()
                .ok_or_else(|| MatchError::no_match("no counterpart found"))?;

            for traversal in leg.traversals {
                match traversals.last_mut() {
                    Some(last)
                        if last.edge == traversal.edge
                            && last.direction == traversal.direction
                            && last.end == traversal.start =>
                    {
                        last.end = traversal.end;
                    }
                    _ => traversals.push(traversal),
                }
            }
        }

        let mut points: Vec<Coordinate> = Vec::new();
        let mut details: Vec<EdgeDetail> = Vec::new();

        for traversal in &traversals {
            if traversal.start == traversal.end {
                continue;
            }

            let traversal_geometry = traversal_points(graph, traversal);
            let first_point = match points.last() {
                Some(last) if traversal_geometry.first() == Some(last) => points.len() - 1,
                _ => points.len(),
            };

            for point in traversal_geometry {
                if points.last() != Some(&point) {
                    points.push(point);
                }
            }

            if points.len() > first_point {
                details.push(EdgeDetail {
                    edge: traversal.edge,
                    first_point,
                    last_point: points.len() - 1,
                });
            }
        }

        if points.len() < 2 {
            return Err(MatchError::no_match("matched path has no extent"));
        }

        Ok(MatchResult {
            geometry: Polyline::from(points),
            ways: ways_from_traversals(graph, &traversals),
            details,
        })
    }
}

/// Per-call scratch: memoized routes between lattice candidates, so the
/// assembly pass reuses what the scoring pass already computed.
#[derive(Debug, Default)]
struct TransitionScratch {
    routes: FxHashMap<(usize, usize, usize), Option<RoutedPath>>,
}

impl TransitionScratch {
    #[allow(clippy::too_many_arguments)]
    fn route(
        &mut self,
        graph: &GraphSnapshot,
        profile: RoutingProfile,
        layer: usize,
        from: (usize, &Snap),
        to: (usize, &Snap),
        straight: Length,
        config: MatcherConfig,
        cancel: &CancelToken,
    ) -> &Option<RoutedPath> {
        self.routes.entry((layer, from.0, to.0)).or_insert_with(|| {
            let max_length =
                straight * config.max_route_distance_factor + config.sigma * 50.0;

            shortest_path(
                graph,
                profile,
                EdgePosition {
                    edge: from.1.edge,
                    distance_along: from.1.distance_along,
                },
                EdgePosition {
                    edge: to.1.edge,
                    distance_along: to.1.distance_along,
                },
                max_length,
                cancel,
            )
        })
    }
}
