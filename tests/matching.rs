mod network;

use network::{NETWORK, c};
use test_log::test;
use velomatch::{
    CancelToken, Direction, MatcherConfig, NetworkMatcher, RoutingProfile, WayId, WayTraversal,
};

fn matcher(profile: RoutingProfile) -> NetworkMatcher {
    NetworkMatcher::new(profile, MatcherConfig::default())
}

#[test]
fn match_across_grid_001() {
    // along the main street, up the connector, onto the river path
    let result = matcher(RoutingProfile::Bike)
        .match_points(
            &NETWORK,
            &[
                c(10.0, 2.0),
                c(290.0, -2.0),
                c(302.0, 150.0),
                c(305.0, 298.0),
                c(560.0, 302.0),
            ],
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

    // details tile the geometry without gaps
    assert_eq!(result.details[0].first_point, 0);
    for window in result.details.windows(2) {
        assert_eq!(window[0].last_point, window[1].first_point);
    }
    assert_eq!(
        result.details.last().unwrap().last_point,
        result.geometry.len() - 1
    );
}

#[test]
fn match_oneway_profiles_diverge_001() {
    // heading south along the northbound-only way 40
    let points = [c(598.0, 290.0), c(598.0, 10.0)];

    // foot ignores the restriction and takes way 40 directly
    let foot = matcher(RoutingProfile::Foot)
        .match_points(&NETWORK, &points, &CancelToken::new())
        .unwrap();
    assert_eq!(
        foot.ways,
        [WayTraversal {
            way: WayId(40),
            direction: Direction::Backward
        }]
    );

    // bike has to come down through the grid instead
    let bike = matcher(RoutingProfile::Bike)
        .match_points(&NETWORK, &points, &CancelToken::new())
        .unwrap();

    assert!(bike.ways.len() > 1);
    assert!(bike.ways.contains(&WayTraversal {
        way: WayId(30),
        direction: Direction::Backward
    }));
    assert!(!bike.ways.contains(&WayTraversal {
        way: WayId(40),
        direction: Direction::Backward
    }));
}

#[test]
fn match_isolated_fragment_001() {
    // the fragment is disconnected from the grid but still matchable
    let result = matcher(RoutingProfile::Bike)
        .match_points(
            &NETWORK,
            &[c(2010.0, 3.0), c(2090.0, -3.0)],
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(
        result.ways,
        [WayTraversal {
            way: WayId(60),
            direction: Direction::Forward
        }]
    );
}

#[test]
fn match_geometry_lies_on_network_001() {
    let result = matcher(RoutingProfile::Bike)
        .match_points(
            &NETWORK,
            &[c(10.0, 4.0), c(290.0, -4.0)],
            &CancelToken::new(),
        )
        .unwrap();

    for point in result.geometry.iter() {
        assert!(point.y.abs() < 1e-6, "point off the street: {point:?}");
    }
}
