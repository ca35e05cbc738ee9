use std::ops::RangeInclusive;

use geo::Contains;
use tracing::debug;

use crate::{Coordinate, MatchError};

/// Region the reference network covers. Queries are clipped against it
/// before matching, so geometry far outside the network never reaches the
/// snap search.
pub trait RegionBoundary: Send + Sync {
    fn contains(&self, point: &Coordinate) -> bool;
}

impl RegionBoundary for geo::Polygon {
    fn contains(&self, point: &Coordinate) -> bool {
        Contains::contains(self, &geo::Point::new(point.x, point.y))
    }
}

impl RegionBoundary for geo::MultiPolygon {
    fn contains(&self, point: &Coordinate) -> bool {
        Contains::contains(self, &geo::Point::new(point.x, point.y))
    }
}

/// A boundary containing everything. Stands in where no region is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl RegionBoundary for Unbounded {
    fn contains(&self, _: &Coordinate) -> bool {
        true
    }
}

/// Clips a query geometry to the single contiguous run of points inside the
/// region.
///
/// Returns the inclusive index range of that run, or `None` when no point
/// lies inside. A geometry that leaves and re-enters the region has no
/// unambiguous clipped form and is rejected instead of silently bridging the
/// outside portion.
pub fn clip_to_region(
    points: &[Coordinate],
    boundary: &dyn RegionBoundary,
) -> Result<Option<RangeInclusive<usize>>, MatchError> {
    let mut runs: Vec<RangeInclusive<usize>> = Vec::new();
    let mut current: Option<(usize, usize)> = None;

    for (index, point) in points.iter().enumerate() {
        if boundary.contains(point) {
            current = match current {
                Some((first, _)) => Some((first, index)),
                None => Some((index, index)),
            };
        } else if let Some((first, last)) = current.take() {
            runs.push(first..=last);
        }
    }

    if let Some((first, last)) = current {
        runs.push(first..=last);
    }

    match runs.len() {
        0 => {
            debug!("No query point inside the region");
            Ok(None)
        }
        1 => Ok(Some(runs.remove(0))),
        crossings => {
            debug!("Query crosses the region boundary {crossings} times");
            Err(MatchError::AmbiguousBoundaryCrossing)
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use test_log::test;

    use super::*;

    fn c(x: f64, y: f64) -> Coordinate {
        Coordinate::new(x, y)
    }

    /// Axis-aligned 100x100 square at the origin.
    fn square() -> geo::Polygon {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 100.0, y: 0.0),
            (x: 100.0, y: 100.0),
            (x: 0.0, y: 100.0),
        ]
    }

    #[test]
    fn boundary_clip_leading_outside_run_001() {
        let points = [c(-50.0, 50.0), c(-10.0, 50.0), c(10.0, 50.0), c(90.0, 50.0)];

        let clipped = clip_to_region(&points, &square()).unwrap();
        assert_eq!(clipped, Some(2..=3));
    }

    #[test]
    fn boundary_clip_fully_inside_001() {
        let points = [c(10.0, 10.0), c(50.0, 50.0), c(90.0, 90.0)];

        let clipped = clip_to_region(&points, &square()).unwrap();
        assert_eq!(clipped, Some(0..=2));
    }

    #[test]
    fn boundary_clip_fully_outside_001() {
        let points = [c(-50.0, 50.0), c(-10.0, 50.0)];

        let clipped = clip_to_region(&points, &square()).unwrap();
        assert_eq!(clipped, None);
    }

    #[test]
    fn boundary_clip_ambiguous_crossing_001() {
        // in, out, in again: no single clipped form exists
        let points = [c(10.0, 50.0), c(150.0, 50.0), c(90.0, 50.0)];

        let clipped = clip_to_region(&points, &square());
        assert_eq!(clipped, Err(MatchError::AmbiguousBoundaryCrossing));
    }

    #[test]
    fn boundary_unbounded_contains_everything_001() {
        let points = [c(-1e9, -1e9), c(1e9, 1e9)];

        let clipped = clip_to_region(&points, &Unbounded).unwrap();
        assert_eq!(clipped, Some(0..=1));
    }
}
