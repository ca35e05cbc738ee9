mod network;

use network::{NETWORK, c};
use test_log::test;
use velomatch::{
    CancelToken, Direction, FlatElevation, Length, MatchError, RouterConfig, RoutingProfile,
    WayId, WayTraversal, route_via,
};

#[test]
fn route_across_grid_001() {
    // the connector is shorter than going around via way 40
    let result = route_via(
        &NETWORK,
        RoutingProfile::Bike,
        &[c(10.0, 2.0), c(560.0, 290.0)],
        &RouterConfig::default(),
        &FlatElevation,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(
        result.ways,
        [
            WayTraversal {
                way: WayId(10),
                direction: Direction::Forward
            },
            WayTraversal {
                way: WayId(30),
                direction: Direction::Forward
            },
            WayTraversal {
                way: WayId(20),
                direction: Direction::Forward
            }
        ]
    );
}

#[test]
fn route_oneway_profiles_diverge_001() {
    let waypoints = [c(598.0, 290.0), c(598.0, 10.0)];

    let foot = route_via(
        &NETWORK,
        RoutingProfile::Foot,
        &waypoints,
        &RouterConfig::default(),
        &FlatElevation,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(
        foot.ways,
        [WayTraversal {
            way: WayId(40),
            direction: Direction::Backward
        }]
    );

    let bike = route_via(
        &NETWORK,
        RoutingProfile::Bike,
        &waypoints,
        &RouterConfig::default(),
        &FlatElevation,
        &CancelToken::new(),
    )
    .unwrap();

    assert!(bike.ways.contains(&WayTraversal {
        way: WayId(20),
        direction: Direction::Backward
    }));
    assert!(!bike.ways.contains(&WayTraversal {
        way: WayId(40),
        direction: Direction::Backward
    }));
}

#[test]
fn route_respects_length_bound_001() {
    let config = RouterConfig {
        max_route_length: Length::from_meters(100.0),
        ..RouterConfig::default()
    };

    let result = route_via(
        &NETWORK,
        RoutingProfile::Bike,
        &[c(10.0, 2.0), c(560.0, 290.0)],
        &config,
        &FlatElevation,
        &CancelToken::new(),
    );

    assert!(matches!(result, Err(MatchError::NoRouteFound(_))));
}

#[test]
fn route_disconnected_fragment_001() {
    let result = route_via(
        &NETWORK,
        RoutingProfile::Bike,
        &[c(10.0, 2.0), c(2050.0, 3.0)],
        &RouterConfig::default(),
        &FlatElevation,
        &CancelToken::new(),
    );

    assert!(matches!(result, Err(MatchError::NoRouteFound(_))));
}
