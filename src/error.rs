use thiserror::Error;

/// Typed outcomes of the match-or-route pipeline. All of these are expected,
/// recoverable results; none is fatal to the process. Callers decide whether
/// a failure is retried, logged or suppressed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// The matcher exhausted all candidates or transitions.
    #[error("no match found: {0}")]
    NoMatchFound(String),
    /// The routing fallback could not connect the waypoints.
    #[error("no route found: {0}")]
    NoRouteFound(String),
    /// The input geometry enters, exits and re-enters the operating boundary,
    /// so an unambiguous in-region sub-run cannot be chosen.
    #[error("geometry crosses the operating boundary more than once")]
    AmbiguousBoundaryCrossing,
    /// Fewer than two distinct points remain after geometry cleanup.
    #[error("geometry degenerates to fewer than two distinct points")]
    DegenerateGeometry,
    /// The caller's cancellation token was triggered mid-call.
    #[error("operation cancelled by caller")]
    Cancelled,
}

impl MatchError {
    pub fn no_match(reason: impl Into<String>) -> Self {
        Self::NoMatchFound(reason.into())
    }

    pub fn no_route(reason: impl Into<String>) -> Self {
        Self::NoRouteFound(reason.into())
    }
}
