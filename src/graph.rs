use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    Coordinate, Direction, EdgeAttribution, EdgeId, Length, LinearReference, NodeId, Polyline,
    PropertyValue, RoutingProfile, SideValues, WayId, WayTraversal,
};

pub mod attribution;
pub mod builder;
pub mod store;

/// Travel permissions of one edge, per direction of its own orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlags {
    pub forward: bool,
    pub backward: bool,
}

impl AccessFlags {
    pub const BOTH: Self = Self {
        forward: true,
        backward: true,
    };

    pub const fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.forward,
            Direction::Backward => self.backward,
        }
    }
}

impl Default for AccessFlags {
    fn default() -> Self {
        Self::BOTH
    }
}

/// Per-profile travel permissions declared by the way tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileAccess {
    pub bike: AccessFlags,
    pub foot: AccessFlags,
}

impl ProfileAccess {
    pub const fn allows(&self, profile: RoutingProfile, direction: Direction) -> bool {
        match profile {
            RoutingProfile::Bike => self.bike.allows(direction),
            RoutingProfile::Foot => self.foot.allows(direction),
        }
    }

    /// True if at least one travel direction is permitted for the profile.
    pub const fn allows_any(&self, profile: RoutingProfile) -> bool {
        self.allows(profile, Direction::Forward) || self.allows(profile, Direction::Backward)
    }
}

/// Declared tags of a source way, as far as the core reads them.
/// Attribute values are opaque and passed through unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WayTags {
    pub surface: SideValues<PropertyValue>,
    pub infrastructure: SideValues<PropertyValue>,
    pub access: ProfileAccess,
    /// Locations along the way where a barrier forces an edge split.
    pub barriers: Vec<Coordinate>,
}

/// A source network entity as supplied by the upstream feature source.
#[derive(Debug, Clone, PartialEq)]
pub struct WayRecord {
    pub id: WayId,
    pub geometry: Polyline,
    pub tags: WayTags,
}

/// One directed edge created at build time by splitting a way at barriers
/// and shared topology nodes. The geometry is stored oriented with the way.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub way: WayId,
    pub nodes: [NodeId; 2],
    pub geometry: Vec<Coordinate>,
    pub length: Length,
    pub access: ProfileAccess,
}

impl EdgeRecord {
    pub fn start_point(&self) -> Coordinate {
        self.geometry[0]
    }

    pub fn end_point(&self) -> Coordinate {
        self.geometry[self.geometry.len() - 1]
    }

    /// The node the traversal enters at.
    pub const fn node_entering(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => self.nodes[0],
            Direction::Backward => self.nodes[1],
        }
    }

    /// The node the traversal exits at.
    pub const fn node_exiting(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => self.nodes[1],
            Direction::Backward => self.nodes[0],
        }
    }
}

#[derive(Debug)]
struct SpatialEdge {
    edge: EdgeId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SpatialEdge {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Immutable graph snapshot: topology, spatial index and build-time edge
/// attribution. Shared read-only by all concurrent match and route calls
/// and replaced wholesale on rebuild.
#[derive(Debug)]
pub struct GraphSnapshot {
    nodes: Vec<Coordinate>,
    edges: Vec<EdgeRecord>,
    /// Per node: traversals leaving it as (edge, orientation, target node).
    adjacency: Vec<Vec<(EdgeId, Direction, NodeId)>>,
    spatial: RTree<SpatialEdge>,
    attributions: FxHashMap<EdgeId, EdgeAttribution>,
    /// Edges of each way in along-way creation order.
    way_edges: FxHashMap<WayId, Vec<EdgeId>>,
}

impl GraphSnapshot {
    pub(crate) fn assemble(
        nodes: Vec<Coordinate>,
        edges: Vec<EdgeRecord>,
        way_edges: FxHashMap<WayId, Vec<EdgeId>>,
        attributions: FxHashMap<EdgeId, EdgeAttribution>,
    ) -> Self {
        let mut adjacency = vec![Vec::new(); nodes.len()];

        for (index, edge) in edges.iter().enumerate() {
            let id = EdgeId(index as u32);
            adjacency[edge.nodes[0].0 as usize].push((id, Direction::Forward, edge.nodes[1]));
            adjacency[edge.nodes[1].0 as usize].push((id, Direction::Backward, edge.nodes[0]));
        }

        let spatial = RTree::bulk_load(
            edges
                .iter()
                .enumerate()
                .map(|(index, edge)| SpatialEdge {
                    edge: EdgeId(index as u32),
                    envelope: geometry_envelope(&edge.geometry),
                })
                .collect(),
        );

        Self {
            nodes,
            edges,
            adjacency,
            spatial,
            attributions,
            way_edges,
        }
    }

    pub fn edge(&self, edge: EdgeId) -> &EdgeRecord {
        &self.edges[edge.0 as usize]
    }

    pub fn node_coordinate(&self, node: NodeId) -> Coordinate {
        self.nodes[node.0 as usize]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    /// Traversals leaving the node that the profile is permitted to use.
    pub fn edges_from(
        &self,
        node: NodeId,
        profile: RoutingProfile,
    ) -> impl Iterator<Item = (EdgeId, Direction, NodeId)> + '_ {
        self.adjacency[node.0 as usize]
            .iter()
            .copied()
            .filter(move |&(edge, direction, _)| {
                self.edge(edge).access.allows(profile, direction)
            })
    }

    /// All edges whose bounding box intersects the envelope, regardless of
    /// network connectivity. Isolated fragments are intentionally included.
    pub fn edges_within(&self, envelope: AABB<[f64; 2]>) -> impl Iterator<Item = EdgeId> + '_ {
        self.spatial
            .locate_in_envelope_intersecting(&envelope)
            .map(|spatial| spatial.edge)
    }

    /// Build-time attribution of the edge, if the attributor produced one.
    pub fn attribution(&self, edge: EdgeId) -> Option<&EdgeAttribution> {
        self.attributions.get(&edge)
    }

    /// Edges of a way in along-way order, empty if the way is unknown to
    /// this snapshot.
    pub fn way_edges(&self, way: WayId) -> &[EdgeId] {
        self.way_edges.get(&way).map_or(&[], Vec::as_slice)
    }
}

fn geometry_envelope(points: &[Coordinate]) -> AABB<[f64; 2]> {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];

    for point in points {
        min[0] = min[0].min(point.x);
        min[1] = min[1].min(point.y);
        max[0] = max[0].max(point.x);
        max[1] = max[1].max(point.y);
    }

    AABB::from_corners(min, max)
}

/// Externally persisted form of a matched or routed path: the edges of the
/// traversed ways resolved against the current graph snapshot, each with a
/// full span. Edge ids are not stable across rebuilds, so this is rebuilt
/// from the way list whenever the snapshot changes.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkReference(pub Vec<(EdgeId, LinearReference)>);

impl NetworkReference {
    pub fn resolve(graph: &GraphSnapshot, ways: &[WayTraversal]) -> Self {
        let mut references = Vec::new();

        for traversal in ways {
            let edges = graph.way_edges(traversal.way);
            if edges.is_empty() {
                debug!("Way {:?} is unknown to the current graph", traversal.way);
                continue;
            }

            match traversal.direction {
                Direction::Forward => {
                    references.extend(edges.iter().map(|&e| (e, LinearReference::FULL)));
                }
                Direction::Backward => {
                    references.extend(edges.iter().rev().map(|&e| (e, LinearReference::FULL)));
                }
            }
        }

        Self(references)
    }
}
