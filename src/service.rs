use std::sync::Arc;

use tracing::{debug, info};

use crate::boundary::{RegionBoundary, Unbounded, clip_to_region};
use crate::cancel::CancelToken;
use crate::geometry::{deviation_runs, has_uturn, remove_artificial_uturns, simplify_for_routing};
use crate::graph::GraphSnapshot;
use crate::graph::attribution::attribute_graph;
use crate::graph::store::GraphStore;
use crate::graph::WayRecord;
use crate::matcher::{MatcherConfig, NetworkMatcher};
use crate::properties::reduce_properties;
use crate::routing::{ElevationModel, FlatElevation, RouterConfig, route_via};
use crate::{
    Coordinate, Length, MatchError, MatchResult, Polyline, ProfileMatchResult, RoutingProfile,
};

#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Vertex spacing the routing fallback simplifies the query towards.
    pub simplify_target_spacing: Length,
    /// Simplification tolerance added per attempt.
    pub simplify_tolerance_step: f64,
    pub simplify_max_attempts: usize,
    /// Result vertices further than this from the query geometry are
    /// reported as deviations.
    pub deviation_tolerance: Length,
    /// Fractional gap up to which equal-valued property spans still merge.
    pub property_merge_tolerance: f64,
    pub matcher: MatcherConfig,
    pub router: RouterConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            simplify_target_spacing: Length::from_meters(200.0),
            simplify_tolerance_step: 10.0,
            simplify_max_attempts: 10,
            deviation_tolerance: Length::from_meters(20.0),
            property_merge_tolerance: 0.0,
            matcher: MatcherConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

/// How the pipeline arrived at a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    /// The query geometry was aligned directly.
    Matched,
    /// Alignment failed and the result comes from routing between
    /// simplified waypoints.
    Routed,
}

/// Informational findings about a result, never a failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostics {
    pub has_uturn: bool,
    /// Runs of result vertices deviating from the query geometry, as
    /// (first, last) vertex index pairs into the result.
    pub deviations: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOutcome {
    pub result: ProfileMatchResult,
    pub method: MatchMethod,
    pub diagnostics: Diagnostics,
}

/// Entry point tying the pipeline together: match first, fall back to
/// routing, clip to the operating region and retry once when both fail.
///
/// The graph snapshot is pinned once per call, so a concurrent graph swap
/// never changes the data mid-call. The service itself is immutable and
/// shared freely between threads.
pub struct MatchService {
    store: Arc<GraphStore>,
    boundary: Box<dyn RegionBoundary>,
    elevation: Box<dyn ElevationModel>,
    config: ServiceConfig,
    bike: NetworkMatcher,
    foot: NetworkMatcher,
}

impl MatchService {
    pub fn new(store: Arc<GraphStore>, config: ServiceConfig) -> Self {
        Self {
            store,
            boundary: Box::new(Unbounded),
            elevation: Box::new(FlatElevation),
            config,
            bike: NetworkMatcher::new(RoutingProfile::Bike, config.matcher),
            foot: NetworkMatcher::new(RoutingProfile::Foot, config.matcher),
        }
    }

    pub fn with_boundary(mut self, boundary: impl RegionBoundary + 'static) -> Self {
        self.boundary = Box::new(boundary);
        self
    }

    pub fn with_elevation(mut self, elevation: impl ElevationModel + 'static) -> Self {
        self.elevation = Box::new(elevation);
        self
    }

    /// Builds a fresh snapshot from source ways and publishes it. In-flight
    /// calls keep the snapshot they pinned.
    pub fn rebuild_graph(&self, ways: &[WayRecord]) {
        self.store.swap(attribute_graph(ways));
    }

    /// Aligns the query geometry to the reference network, falling back to
    /// routing between simplified waypoints when direct matching fails.
    ///
    /// When the first attempt fails and parts of the query lie outside the
    /// operating region, the geometry is clipped to its in-region run and
    /// the pipeline runs once more. A query that crosses the region boundary
    /// more than once is rejected as ambiguous.
    pub fn match_or_route(
        &self,
        profile: RoutingProfile,
        points: &[Coordinate],
        cancel: &CancelToken,
    ) -> Result<ServiceOutcome, MatchError> {
        let graph = self.store.load();

        match self.attempt(&graph, profile, points, cancel) {
            Ok(outcome) => Ok(outcome),
            Err(error @ (MatchError::NoMatchFound(_) | MatchError::NoRouteFound(_))) => {
                let Some(range) = clip_to_region(points, self.boundary.as_ref())? else {
                    return Err(MatchError::DegenerateGeometry);
                };

                let clipped = &points[*range.start()..=*range.end()];
                if clipped.len() == points.len() {
                    return Err(error);
                }

                info!(
                    "Retrying with {} of {} points inside the operating region",
                    clipped.len(),
                    points.len()
                );
                self.attempt(&graph, profile, clipped, cancel)
            }
            Err(error) => Err(error),
        }
    }

    fn attempt(
        &self,
        graph: &GraphSnapshot,
        profile: RoutingProfile,
        points: &[Coordinate],
        cancel: &CancelToken,
    ) -> Result<ServiceOutcome, MatchError> {
        match self.try_match(graph, profile, points, cancel) {
            Ok(outcome) => Ok(outcome),
            Err(error @ MatchError::Cancelled) => Err(error),
            Err(error) => {
                debug!("Matching failed ({error}), falling back to routing");
                self.try_route(graph, profile, points, cancel)
            }
        }
    }

    fn try_match(
        &self,
        graph: &GraphSnapshot,
        profile: RoutingProfile,
        points: &[Coordinate],
        cancel: &CancelToken,
    ) -> Result<ServiceOutcome, MatchError> {
        let matched = self.matcher(profile).match_points(graph, points, cancel)?;
        let matched = self.without_uturns(graph, profile, matched, cancel);

        Ok(self.outcome(graph, matched, points, MatchMethod::Matched))
    }

    fn try_route(
        &self,
        graph: &GraphSnapshot,
        profile: RoutingProfile,
        points: &[Coordinate],
        cancel: &CancelToken,
    ) -> Result<ServiceOutcome, MatchError> {
        let waypoints = simplify_for_routing(
            &Polyline::from(points.to_vec()),
            self.config.simplify_target_spacing,
            self.config.simplify_tolerance_step,
            self.config.simplify_max_attempts,
        );

        let routed = route_via(
            graph,
            profile,
            &waypoints,
            &self.config.router,
            self.elevation.as_ref(),
            cancel,
        )?;

        // align the routed geometry so the result carries details and
        // properties; keep the raw route when that fails
        let cleaned = remove_artificial_uturns(&routed.geometry);
        match self.matcher(profile).match_points(graph, &cleaned, cancel) {
            Ok(matched) => Ok(self.outcome(graph, matched, points, MatchMethod::Routed)),
            Err(error) => {
                debug!("Routed geometry did not re-match ({error})");
                let result = ProfileMatchResult {
                    geometry: Polyline::from(cleaned),
                    ways: routed.ways,
                    properties: vec![],
                };
                let diagnostics = self.diagnose(&result.geometry, points);

                Ok(ServiceOutcome {
                    result,
                    method: MatchMethod::Routed,
                    diagnostics,
                })
            }
        }
    }

    /// Collapses snapping spurs out of the matched geometry and re-matches
    /// the cleaned geometry, so the way list and details agree with it.
    /// The original result stands when the re-match fails.
    fn without_uturns(
        &self,
        graph: &GraphSnapshot,
        profile: RoutingProfile,
        matched: MatchResult,
        cancel: &CancelToken,
    ) -> MatchResult {
        let cleaned = remove_artificial_uturns(&matched.geometry);
        if cleaned[..] == matched.geometry[..] {
            return matched;
        }

        debug!(
            "Collapsed artificial u-turns: {} of {} points remain",
            cleaned.len(),
            matched.geometry.len()
        );

        match self.matcher(profile).match_points(graph, &cleaned, cancel) {
            Ok(rematched) => rematched,
            Err(error) => {
                debug!("Cleaned geometry did not re-match ({error})");
                matched
            }
        }
    }

    fn outcome(
        &self,
        graph: &GraphSnapshot,
        matched: MatchResult,
        query: &[Coordinate],
        method: MatchMethod,
    ) -> ServiceOutcome {
        let properties =
            reduce_properties(graph, &matched, self.config.property_merge_tolerance);
        let diagnostics = self.diagnose(&matched.geometry, query);

        ServiceOutcome {
            result: ProfileMatchResult {
                geometry: matched.geometry,
                ways: matched.ways,
                properties,
            },
            method,
            diagnostics,
        }
    }

    fn diagnose(&self, geometry: &Polyline, query: &[Coordinate]) -> Diagnostics {
        Diagnostics {
            has_uturn: has_uturn(geometry),
            deviations: deviation_runs(geometry, query, self.config.deviation_tolerance),
        }
    }

    const fn matcher(&self, profile: RoutingProfile) -> &NetworkMatcher {
        match profile {
            RoutingProfile::Bike => &self.bike,
            RoutingProfile::Foot => &self.foot,
        }
    }
}
