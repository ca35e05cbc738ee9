#![doc = include_str!("../README.md")]

mod boundary;
mod cancel;
mod error;
mod geometry;
mod graph;
mod matcher;
mod model;
mod properties;
mod routing;
mod service;
mod snap;

pub use boundary::{RegionBoundary, Unbounded, clip_to_region};
pub use cancel::CancelToken;
pub use error::MatchError;
pub use geometry::{
    FractionIndex, Projection, dedup_points, deviation_runs, find_subsequence, has_uturn,
    project_onto_polyline, remove_artificial_uturns, simplify_for_routing,
};
pub use graph::attribution::{EdgeAttributor, attribute_graph};
pub use graph::builder::{CreatedEdge, EdgeCreationObserver, GraphBuildOutput, build_graph};
pub use graph::store::GraphStore;
pub use graph::{
    AccessFlags, EdgeRecord, GraphSnapshot, NetworkReference, ProfileAccess, WayRecord, WayTags,
};
pub use matcher::{MatcherConfig, NetworkMatcher};
pub use model::{
    Coordinate, Direction, EdgeAttribution, EdgeDetail, EdgeId, Length, LinearReference,
    LinearReferencedProperty, MatchResult, NodeId, Polyline, ProfileMatchResult,
    ProfileProperties, PropertyValue, RoutingProfile, RoutingResult, SideValues, WayId,
    WayTraversal,
};
pub use properties::reduce_properties;
pub use routing::{
    EdgePosition, EdgeTraversal, ElevationModel, FlatElevation, RoutedPath, RouterConfig,
    route_via, shortest_path,
};
pub use service::{Diagnostics, MatchMethod, MatchService, ServiceConfig, ServiceOutcome};
pub use snap::{Snap, find_snaps};
