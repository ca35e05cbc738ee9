#![allow(dead_code)]

use std::sync::LazyLock;

use velomatch::{
    AccessFlags, Coordinate, GraphSnapshot, Polyline, ProfileAccess, PropertyValue, SideValues,
    WayId, WayRecord, WayTags, attribute_graph,
};

/// Shared fixture network, built once per test binary.
///
/// ```text
///                     (300,450)
///                         | way 50 (dead end, gravel)
///  (0,300) ---- way 20 ---+---- way 20 ----- (600,300)
///                         |                      |
///                      way 30                 way 40 (oneway north
///                         |                      |    for bike)
///  (0,0) ------ way 10 ---+---- way 10 ------ (600,0)
///
///  way 60: isolated fragment at x = 2000
/// ```
pub static NETWORK: LazyLock<GraphSnapshot> = LazyLock::new(|| attribute_graph(&network_ways()));

pub fn network_ways() -> Vec<WayRecord> {
    vec![
        tagged(
            10,
            vec![c(0.0, 0.0), c(300.0, 0.0), c(600.0, 0.0)],
            "asphalt",
            "lane",
            ProfileAccess::default(),
        ),
        tagged(
            20,
            vec![c(0.0, 300.0), c(300.0, 300.0), c(600.0, 300.0)],
            "gravel",
            "track",
            ProfileAccess::default(),
        ),
        tagged(
            30,
            vec![c(300.0, 0.0), c(300.0, 300.0)],
            "paving_stones",
            "path",
            ProfileAccess::default(),
        ),
        // northbound only for bike, both ways on foot
        tagged(
            40,
            vec![c(600.0, 0.0), c(600.0, 300.0)],
            "asphalt",
            "lane",
            ProfileAccess {
                bike: AccessFlags {
                    forward: true,
                    backward: false,
                },
                foot: AccessFlags::BOTH,
            },
        ),
        tagged(
            50,
            vec![c(300.0, 300.0), c(300.0, 450.0)],
            "gravel",
            "path",
            ProfileAccess::default(),
        ),
        tagged(
            60,
            vec![c(2000.0, 0.0), c(2100.0, 0.0)],
            "dirt",
            "path",
            ProfileAccess::default(),
        ),
    ]
}

pub fn c(x: f64, y: f64) -> Coordinate {
    Coordinate::new(x, y)
}

fn tagged(
    id: i64,
    points: Vec<Coordinate>,
    surface: &str,
    infrastructure: &str,
    access: ProfileAccess,
) -> WayRecord {
    WayRecord {
        id: WayId(id),
        geometry: Polyline::from(points),
        tags: WayTags {
            surface: SideValues::both(PropertyValue::new(surface)),
            infrastructure: SideValues::both(PropertyValue::new(infrastructure)),
            access,
            barriers: vec![],
        },
    }
}
