use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Deref, Mul, Sub};
use std::sync::Arc;

use approx::abs_diff_eq;

/// Stable external identifier of a source network entity ("way").
/// Owned by the upstream network data, the core only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WayId(pub i64);

/// Internal directed-edge identifier, only valid for the lifetime of the
/// graph snapshot that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub u32);

/// Internal tower-node identifier, only valid for one graph snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// Traversal direction relative to the orientation of the underlying way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub const fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Routing profile the matcher and router operate with.
/// Bike respects one-way restrictions, foot does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum RoutingProfile {
    Bike,
    Foot,
}

/// Length in meters of the planar projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Length(f64);

impl Length {
    pub const ZERO: Self = Self(0.0);
    pub const MAX: Self = Self(f64::MAX);

    pub const fn from_meters(meters: f64) -> Self {
        Self(meters)
    }

    pub const fn meters(&self) -> f64 {
        self.0
    }

    pub fn round(&self) -> Self {
        Self(self.0.round())
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

impl PartialEq for Length {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0).is_eq()
    }
}

impl Eq for Length {}

impl PartialOrd for Length {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Length {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add for Length {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Length {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Mul<f64> for Length {
    type Output = Self;
    fn mul(self, factor: f64) -> Self {
        Self(self.0 * factor)
    }
}

impl Sum for Length {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, l| acc + l)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}m", self.0)
    }
}

/// Planar coordinate in a fixed metric projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> Length {
        Length::from_meters(self.distance_2(other).sqrt())
    }

    pub fn distance_2(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        const EPSILON: f64 = 1e-6;
        abs_diff_eq!(self.x, other.x, epsilon = EPSILON)
            && abs_diff_eq!(self.y, other.y, epsilon = EPSILON)
    }
}

impl From<Coordinate> for geo::Coord {
    fn from(c: Coordinate) -> Self {
        geo::coord! { x: c.x, y: c.y }
    }
}

impl From<geo::Coord> for Coordinate {
    fn from(c: geo::Coord) -> Self {
        Self { x: c.x, y: c.y }
    }
}

/// Ordered sequence of planar coordinates, non-empty for all public entry
/// points. Consecutive coordinates may be equal only transiently during
/// construction and must be de-duplicated before use by indexing algorithms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polyline(Vec<Coordinate>);

impl Polyline {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn into_points(self) -> Vec<Coordinate> {
        self.0
    }

    /// Removes every point that is identical to its immediate predecessor.
    pub fn deduplicated(self) -> Self {
        Self(crate::geometry::dedup_points(&self.0))
    }

    pub fn length(&self) -> Length {
        self.0.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    pub fn to_line_string(&self) -> geo::LineString {
        geo::LineString::from_iter(self.0.iter().copied().map(geo::Coord::from))
    }
}

impl Deref for Polyline {
    type Target = [Coordinate];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Coordinate>> for Polyline {
    fn from(points: Vec<Coordinate>) -> Self {
        Self(points)
    }
}

impl FromIterator<Coordinate> for Polyline {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fractional span along some reference line, with `from < to`.
/// Degenerate or inverted spans are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearReference {
    from: f64,
    to: f64,
}

impl LinearReference {
    /// The full span of the reference line.
    pub const FULL: Self = Self { from: 0.0, to: 1.0 };

    /// Returns None unless `0 <= from < to <= 1`.
    pub fn new(from: f64, to: f64) -> Option<Self> {
        (from >= 0.0 && to <= 1.0 && from < to).then_some(Self { from, to })
    }

    pub const fn from(&self) -> f64 {
        self.from
    }

    pub const fn to(&self) -> f64 {
        self.to
    }

    /// Extends this span so it ends where `other` ends.
    pub(crate) const fn extended_to(&self, other: &Self) -> Self {
        Self {
            from: self.from,
            to: other.to,
        }
    }
}

/// Opaque attribute value passed through from the source network tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyValue(Arc<str>);

impl PropertyValue {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        Self(Arc::from("unknown"))
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable pair of side-bound values, constant across a whole directed edge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SideValues<T> {
    pub left: T,
    pub right: T,
}

impl<T> SideValues<T> {
    pub fn both(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            left: value.clone(),
            right: value,
        }
    }

    /// Traveling forward along the edge's own orientation reads the right
    /// side, traveling against it reads the left side.
    pub const fn resolve(&self, direction: Direction) -> &T {
        match direction {
            Direction::Forward => &self.right,
            Direction::Backward => &self.left,
        }
    }
}

/// Side-bound surface and infrastructure values of one way,
/// identical for every edge split from it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileProperties {
    pub surface: SideValues<PropertyValue>,
    pub infrastructure: SideValues<PropertyValue>,
}

/// Per-edge record created once at graph build time and replaced wholesale
/// when the graph is rebuilt, never mutated edge-by-edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAttribution {
    pub way: WayId,
    /// Fractional span of the edge along its source way.
    pub on_way: LinearReference,
    pub properties: ProfileProperties,
}

/// One entry of the traversed-ways list: a way together with the direction
/// it was traveled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WayTraversal {
    pub way: WayId,
    pub direction: Direction,
}

/// Maps one traversed edge to the span of path points it produced.
/// `first_point` and `last_point` index into the matched path geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeDetail {
    pub edge: EdgeId,
    pub first_point: usize,
    pub last_point: usize,
}

/// Result of aligning a query geometry to a connected path in the graph.
/// Consecutive entries of `ways` repeating the same way in the same direction
/// are collapsed; a direction reversal on the same way is a new entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub geometry: Polyline,
    pub ways: Vec<WayTraversal>,
    pub details: Vec<EdgeDetail>,
}

/// Side-resolved property values over a span of the result geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearReferencedProperty {
    pub surface: PropertyValue,
    pub infrastructure: PropertyValue,
    pub span: LinearReference,
}

/// Match result together with the reduced, linearly referenced property list.
/// Properties are sorted by their span start, non-overlapping and maximal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatchResult {
    pub geometry: Polyline,
    pub ways: Vec<WayTraversal>,
    pub properties: Vec<LinearReferencedProperty>,
}

/// Result of shortest-path routing between waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingResult {
    pub geometry: Polyline,
    pub ways: Vec<WayTraversal>,
    pub ascent: Length,
    pub descent: Length,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_linear_reference_validity_001() {
        assert_eq!(LinearReference::new(0.0, 1.0), Some(LinearReference::FULL));
        assert!(LinearReference::new(0.25, 0.75).is_some());

        // degenerate and inverted spans are rejected, not passed through
        assert_eq!(LinearReference::new(0.5, 0.5), None);
        assert_eq!(LinearReference::new(0.7, 0.3), None);
        assert_eq!(LinearReference::new(-0.1, 0.5), None);
        assert_eq!(LinearReference::new(0.5, 1.1), None);
    }

    #[test]
    fn model_side_values_resolution_001() {
        let sides = SideValues {
            left: PropertyValue::new("gravel"),
            right: PropertyValue::new("asphalt"),
        };

        assert_eq!(sides.resolve(Direction::Forward).as_str(), "asphalt");
        assert_eq!(sides.resolve(Direction::Backward).as_str(), "gravel");
    }

    #[test]
    fn model_polyline_length_001() {
        let polyline = Polyline::from(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(3.0, 4.0),
            Coordinate::new(3.0, 14.0),
        ]);

        assert_eq!(polyline.length(), Length::from_meters(15.0));
    }
}
