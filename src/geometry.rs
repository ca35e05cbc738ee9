use geo::SimplifyVwPreserve;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::{Coordinate, Length, Polyline};

/// Quantized coordinate key used wherever points act as map keys.
/// The quantum is well below the equality epsilon of [`Coordinate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CoordKey(i64, i64);

impl CoordKey {
    const SCALE: f64 = 1e6;

    pub(crate) fn from(c: &Coordinate) -> Self {
        Self(
            (c.x * Self::SCALE).round() as i64,
            (c.y * Self::SCALE).round() as i64,
        )
    }
}

/// Removes every point that is identical to its immediate predecessor.
/// Sub-sequence search and fraction indexing are undefined on repeated
/// coincident points, so this runs before both.
pub fn dedup_points(points: &[Coordinate]) -> Vec<Coordinate> {
    let mut deduped: Vec<Coordinate> = Vec::with_capacity(points.len());

    for &point in points {
        if deduped.last() != Some(&point) {
            deduped.push(point);
        }
    }

    deduped
}

/// Monotonically increasing map from point index to cumulative-length
/// fraction in [0, 1] along a polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct FractionIndex {
    fractions: Vec<f64>,
    total: Length,
}

impl FractionIndex {
    /// Builds the index over a de-duplicated point list.
    /// Returns None for geometries with no extent.
    pub fn build(points: &[Coordinate]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut acc = 0.0;
        cumulative.push(0.0);

        for window in points.windows(2) {
            acc += window[0].distance(&window[1]).meters();
            cumulative.push(acc);
        }

        if acc <= 0.0 {
            return None;
        }

        let fractions = cumulative.into_iter().map(|c| c / acc).collect();
        Some(Self {
            fractions,
            total: Length::from_meters(acc),
        })
    }

    pub fn fraction_at(&self, index: usize) -> f64 {
        self.fractions[index]
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    pub const fn total_length(&self) -> Length {
        self.total
    }
}

/// Locates `needle` as a contiguous sub-sequence of `haystack`.
/// This is an exact sequence match, not a geometric nearest-match.
pub fn find_subsequence(haystack: &[Coordinate], needle: &[Coordinate]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    (0..=haystack.len() - needle.len())
        .find(|&start| haystack[start..start + needle.len()] == *needle)
}

/// Projection of a query point onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub point: Coordinate,
    pub distance_2: f64,
    /// Distance from the polyline start to the projected point, following
    /// the polyline.
    pub distance_along: Length,
}

fn project_onto_segment(p: &Coordinate, a: &Coordinate, b: &Coordinate) -> (Coordinate, f64) {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_2 = abx * abx + aby * aby;

    if len_2 <= 0.0 {
        return (*a, 0.0);
    }

    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_2).clamp(0.0, 1.0);
    (Coordinate::new(a.x + t * abx, a.y + t * aby), t)
}

/// Projects the query point onto the closest location of the polyline.
pub fn project_onto_polyline(query: &Coordinate, points: &[Coordinate]) -> Option<Projection> {
    let mut best: Option<Projection> = None;
    let mut distance_acc = Length::ZERO;

    for window in points.windows(2) {
        let (point, t) = project_onto_segment(query, &window[0], &window[1]);
        let distance_2 = query.distance_2(&point);

        if best.is_none_or(|b| distance_2 < b.distance_2) {
            best = Some(Projection {
                point,
                distance_2,
                distance_along: distance_acc + window[0].distance(&window[1]) * t,
            });
        }

        distance_acc += window[0].distance(&window[1]);
    }

    best
}

/// Drops every maximal subsequence of the path that departs from and returns
/// to the same point without net displacement. Such spurs are snapping
/// artifacts introduced by the matcher near the start and end of a path.
pub fn remove_artificial_uturns(points: &[Coordinate]) -> Vec<Coordinate> {
    let mut kept: Vec<Coordinate> = Vec::with_capacity(points.len());
    let mut seen: FxHashMap<CoordKey, usize> = FxHashMap::default();

    for &point in points {
        let key = CoordKey::from(&point);

        if let Some(&index) = seen.get(&key) {
            // back at a point already on the path: the spur in between has
            // no net displacement, drop it
            for dropped in kept.drain(index + 1..) {
                seen.remove(&CoordKey::from(&dropped));
            }
            trace!("Collapsed spur returning to point {index}");
        } else {
            seen.insert(key, kept.len());
            kept.push(point);
        }
    }

    kept
}

/// Detects whether the path visits a point twice with a direction reversal
/// at the same location. Informational only, never a failure.
pub fn has_uturn(points: &[Coordinate]) -> bool {
    // immediate backtrack
    if points
        .windows(3)
        .any(|w| CoordKey::from(&w[0]) == CoordKey::from(&w[2]))
    {
        return true;
    }

    let mut first_visit: FxHashMap<CoordKey, usize> = FxHashMap::default();

    for (j, point) in points.iter().enumerate() {
        let key = CoordKey::from(point);

        match first_visit.get(&key) {
            None => {
                first_visit.insert(key, j);
            }
            Some(&i) if i + 1 < points.len() && j > 0 => {
                let outgoing = (points[i + 1].x - points[i].x, points[i + 1].y - points[i].y);
                let incoming = (points[j].x - points[j - 1].x, points[j].y - points[j - 1].y);

                // a revisit only counts as a U-turn when the heading turns
                // back by more than 120 degrees
                let dot = outgoing.0 * incoming.0 + outgoing.1 * incoming.1;
                let norm = outgoing.0.hypot(outgoing.1) * incoming.0.hypot(incoming.1);
                if norm > 0.0 && dot < -0.5 * norm {
                    return true;
                }
            }
            Some(_) => {}
        }
    }

    false
}

/// Contiguous runs of result vertices that deviate from the original input
/// geometry by more than the tolerance. Returned as (first, last) vertex
/// index pairs into `result`.
pub fn deviation_runs(
    result: &[Coordinate],
    original: &[Coordinate],
    tolerance: Length,
) -> Vec<(usize, usize)> {
    let tolerance_2 = tolerance.meters() * tolerance.meters();
    let mut runs = Vec::new();
    let mut current: Option<(usize, usize)> = None;

    for (i, point) in result.iter().enumerate() {
        let deviates = project_onto_polyline(point, original)
            .is_none_or(|projection| projection.distance_2 > tolerance_2);

        match (deviates, current) {
            (true, Some((first, _))) => current = Some((first, i)),
            (true, None) => current = Some((i, i)),
            (false, Some(run)) => {
                runs.push(run);
                current = None;
            }
            (false, None) => {}
        }
    }

    if let Some(run) = current {
        runs.push(run);
    }

    runs
}

/// Simplifies the input with a topology-preserving simplifier until roughly
/// one vertex per `target_spacing` remains, growing the tolerance by
/// `tolerance_step` per attempt.
pub fn simplify_for_routing(
    polyline: &Polyline,
    target_spacing: Length,
    tolerance_step: f64,
    max_attempts: usize,
) -> Polyline {
    let target_count = ((polyline.length().meters() / target_spacing.meters()).ceil() as usize)
        .max(2);

    let mut simplified = polyline.clone();

    for attempt in 1..=max_attempts {
        let tolerance = attempt as f64 * tolerance_step;
        let line_string = polyline.to_line_string().simplify_vw_preserve(&tolerance);

        simplified = line_string.into_iter().map(Coordinate::from).collect();
        trace!(
            "Simplification attempt {attempt}: tolerance={tolerance} vertices={}",
            simplified.len()
        );

        if simplified.len() <= target_count {
            break;
        }
    }

    simplified
}
