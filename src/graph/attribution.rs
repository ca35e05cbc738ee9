use rustc_hash::FxHashMap;
use tracing::debug;

use crate::geometry::{FractionIndex, dedup_points, find_subsequence};
use crate::graph::builder::{CreatedEdge, EdgeCreationObserver};
use crate::graph::WayRecord;
use crate::{EdgeAttribution, EdgeId, LinearReference, ProfileProperties};

/// Records an [`EdgeAttribution`] per directed edge while the graph is
/// built: the source way id, the edge's fractional span along the way and
/// the way's side-bound profile properties.
///
/// Attribution is best-effort: an edge whose point list cannot be located
/// inside the concatenated way geometry, or whose span degenerates, is
/// skipped and logged rather than attributed with an invalid reference.
#[derive(Debug, Default)]
pub struct EdgeAttributor {
    attributions: FxHashMap<EdgeId, EdgeAttribution>,
}

impl EdgeAttributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_attributions(self) -> FxHashMap<EdgeId, EdgeAttribution> {
        self.attributions
    }
}

impl EdgeCreationObserver for EdgeAttributor {
    fn on_way_processed(&mut self, way: &WayRecord, edges: &[CreatedEdge<'_>]) {
        // concatenated way geometry, rebuilt from the edges in creation
        // order with exact duplicates removed
        let way_points = dedup_points(
            &edges
                .iter()
                .flat_map(|edge| edge.geometry.iter().copied())
                .collect::<Vec<_>>(),
        );

        if way_points.len() < 2 {
            debug!("Way {:?} degenerates after dedup, no attribution", way.id);
            return;
        }

        let Some(index) = FractionIndex::build(&way_points) else {
            debug!("Way {:?} has no extent, no attribution", way.id);
            return;
        };

        let properties = ProfileProperties {
            surface: way.tags.surface.clone(),
            infrastructure: way.tags.infrastructure.clone(),
        };

        for edge in edges {
            let edge_points = dedup_points(edge.geometry);

            let Some(start) = find_subsequence(&way_points, &edge_points) else {
                debug!(
                    "Edge {:?} of way {:?} not found in way geometry, skipped",
                    edge.id, way.id
                );
                continue;
            };

            let from = index.fraction_at(start);
            let to = index.fraction_at(start + edge_points.len() - 1);

            let Some(on_way) = LinearReference::new(from, to) else {
                debug!(
                    "Edge {:?} of way {:?} spans a degenerate reference ({from}, {to}), skipped",
                    edge.id, way.id
                );
                continue;
            };

            self.attributions.insert(
                edge.id,
                EdgeAttribution {
                    way: way.id,
                    on_way,
                    properties: properties.clone(),
                },
            );
        }
    }
}

/// Builds a graph snapshot from way records with full build-time edge
/// attribution. This is the build entry point used by import jobs.
pub fn attribute_graph(ways: &[WayRecord]) -> crate::graph::GraphSnapshot {
    let mut attributor = EdgeAttributor::new();
    let output = crate::graph::builder::build_graph(ways, &mut attributor);
    output.into_snapshot(attributor.into_attributions())
}
