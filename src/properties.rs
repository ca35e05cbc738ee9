use tracing::debug;

use crate::geometry::{FractionIndex, project_onto_polyline};
use crate::graph::GraphSnapshot;
use crate::{Coordinate, Direction, LinearReference, LinearReferencedProperty, MatchResult};

/// Reduces the per-edge attribution of a matched path to a sorted list of
/// side-resolved property spans over the path geometry.
///
/// Each edge detail contributes the span of path length it covers; adjacent
/// spans carrying identical values are merged, so the output is maximal:
/// consecutive entries always differ in at least one value. Spans whose gap
/// does not exceed `merge_tolerance` (a fraction of the path length) still
/// merge across attribution holes.
///
/// Edges without attribution are logged and skipped rather than failing the
/// whole path.
pub fn reduce_properties(
    graph: &GraphSnapshot,
    result: &MatchResult,
    merge_tolerance: f64,
) -> Vec<LinearReferencedProperty> {
    let Some(index) = FractionIndex::build(&result.geometry) else {
        return vec![];
    };

    let mut properties: Vec<LinearReferencedProperty> = Vec::new();

    for detail in &result.details {
        let Some(attribution) = graph.attribution(detail.edge) else {
            debug!("Edge {:?} has no attribution, skipping", detail.edge);
            continue;
        };

        let edge = graph.edge(detail.edge);
        let direction = traversal_direction(
            &result.geometry[detail.first_point],
            &result.geometry[detail.last_point],
            &edge.geometry,
        );

        let from = index.fraction_at(detail.first_point);
        let to = index.fraction_at(detail.last_point);
        let Some(span) = LinearReference::new(from, to) else {
            debug!("Edge {:?} covers no path extent, skipping", detail.edge);
            continue;
        };

        properties.push(LinearReferencedProperty {
            surface: attribution.properties.surface.resolve(direction).clone(),
            infrastructure: attribution
                .properties
                .infrastructure
                .resolve(direction)
                .clone(),
            span,
        });
    }

    properties.sort_by(|a, b| a.span.from().total_cmp(&b.span.from()));
    merge_adjacent(properties, merge_tolerance)
}

/// Direction the detail traverses its edge in, recovered by comparing where
/// its first and last path point fall along the edge geometry.
fn traversal_direction(
    first: &Coordinate,
    last: &Coordinate,
    edge_geometry: &[Coordinate],
) -> Direction {
    let along_first = project_onto_polyline(first, edge_geometry)
        .map(|p| p.distance_along)
        .unwrap_or_default();
    let along_last = project_onto_polyline(last, edge_geometry)
        .map(|p| p.distance_along)
        .unwrap_or_default();

    if along_first <= along_last {
        Direction::Forward
    } else {
        Direction::Backward
    }
}

fn merge_adjacent(
    properties: Vec<LinearReferencedProperty>,
    merge_tolerance: f64,
) -> Vec<LinearReferencedProperty> {
    let mut merged: Vec<LinearReferencedProperty> = Vec::with_capacity(properties.len());

    for property in properties {
        match merged.last_mut() {
            Some(last)
                if last.surface == property.surface
                    && last.infrastructure == property.infrastructure
                    && property.span.from() - last.span.to() <= merge_tolerance =>
            {
                last.span = last.span.extended_to(&property.span);
            }
            _ => merged.push(property),
        }
    }

    merged
}
