use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::graph::GraphSnapshot;

/// Shared handle to the current graph snapshot.
///
/// Many readers, rare atomic replace: every call pins the snapshot once via
/// [`GraphStore::load`] and holds that `Arc` for its whole duration, so a
/// concurrent [`GraphStore::swap`] never exposes a half-replaced graph. The
/// previous snapshot is dropped when the last in-flight call releases it.
#[derive(Debug)]
pub struct GraphStore {
    current: ArcSwap<GraphSnapshot>,
}

impl GraphStore {
    pub fn new(snapshot: GraphSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// The snapshot to use for one complete call.
    pub fn load(&self) -> Arc<GraphSnapshot> {
        self.current.load_full()
    }

    /// Publishes a freshly built snapshot, returning the previous one.
    pub fn swap(&self, snapshot: GraphSnapshot) -> Arc<GraphSnapshot> {
        info!(
            "Swapping graph snapshot: {} nodes, {} edges",
            snapshot.node_count(),
            snapshot.edge_count()
        );
        self.current.swap(Arc::new(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::graph::attribution::attribute_graph;
    use crate::graph::{WayRecord, WayTags};
    use crate::{Coordinate, Polyline, WayId};

    fn snapshot(edge_count: usize) -> GraphSnapshot {
        let ways: Vec<_> = (0..edge_count)
            .map(|i| WayRecord {
                id: WayId(i as i64),
                geometry: Polyline::from(vec![
                    Coordinate::new(i as f64 * 1000.0, 0.0),
                    Coordinate::new(i as f64 * 1000.0 + 100.0, 0.0),
                ]),
                tags: WayTags::default(),
            })
            .collect();

        attribute_graph(&ways)
    }

    #[test]
    fn graph_store_swap_001() {
        let store = GraphStore::new(snapshot(1));

        let pinned = store.load();
        assert_eq!(pinned.edge_count(), 1);

        let previous = store.swap(snapshot(3));
        assert_eq!(previous.edge_count(), 1);

        // the pinned snapshot stays consistent for the in-flight call
        assert_eq!(pinned.edge_count(), 1);
        assert_eq!(store.load().edge_count(), 3);
    }
}
