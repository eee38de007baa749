//! Incrementally maintained derived views.
//!
//! Each corrector owns one output (border flags, landmark actions,
//! construction marks, fog counters) and a queue of dirty-tile
//! notifications. A pass reads the layers immutably through
//! [`LayerRefs`] and writes only its own output, so passes never race
//! with each other or with the simulation thread's writes.
//!
//! Dirty queues are bounded. When a queue is full the notification is
//! dropped and an overflow flag is raised; the next pass then rescans the
//! whole grid instead of trusting the queue.

pub mod borders;
pub mod construction;
pub mod fog;
pub mod landmarks;

pub use borders::BorderCorrector;
pub use construction::{ConstructionCorrector, ConstructionQuery};
pub use fog::{FogCorrector, FogEvent, FogNotifier, Visibility};
pub use landmarks::{LandmarkAction, LandmarkCorrector};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::coords::TilePos;
use crate::layers::{ObjectLayer, OccupancyLayer, TerrainLayer, UnitLayer};
use crate::partition::PartitionEngine;

/// Borrowed view of every persistent layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerRefs<'a> {
    /// Terrain.
    pub terrain: &'a TerrainLayer,
    /// Flags.
    pub occupancy: &'a OccupancyLayer,
    /// Objects.
    pub objects: &'a ObjectLayer,
    /// Units.
    pub units: &'a UnitLayer,
    /// Ownership.
    pub partitions: &'a PartitionEngine,
}

/// What a corrector pass has to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dirty {
    /// Only these tiles (sorted, deduplicated).
    Tiles(Vec<TilePos>),
    /// Everything; the queue overflowed.
    Rescan,
}

impl Dirty {
    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Tiles(tiles) if tiles.is_empty())
    }
}

/// Cloneable sending side of a [`DirtyQueue`].
#[derive(Debug, Clone)]
pub struct DirtyNotifier {
    tx: Sender<TilePos>,
    overflow: Arc<AtomicBool>,
    name: &'static str,
}

impl DirtyNotifier {
    /// Report a changed tile. Never blocks.
    pub fn notify(&self, pos: TilePos) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(pos) {
            if !self.overflow.swap(true, Ordering::AcqRel) {
                warn!(corrector = self.name, "Dirty queue full; next pass rescans the grid");
            }
        }
    }
}

/// Bounded queue of dirty tiles feeding one corrector.
#[derive(Debug)]
pub struct DirtyQueue {
    notifier: DirtyNotifier,
    rx: Receiver<TilePos>,
}

impl DirtyQueue {
    /// Create a queue holding at most `capacity` pending tiles.
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            notifier: DirtyNotifier {
                tx,
                overflow: Arc::new(AtomicBool::new(false)),
                name,
            },
            rx,
        }
    }

    /// A handle other threads may use to report changes.
    #[must_use]
    pub fn notifier(&self) -> DirtyNotifier {
        self.notifier.clone()
    }

    /// Report a changed tile.
    pub fn notify(&self, pos: TilePos) {
        self.notifier.notify(pos);
    }

    /// Force the next pass to rescan everything.
    pub fn request_rescan(&self) {
        self.notifier.overflow.store(true, Ordering::Release);
    }

    /// Take everything pending.
    pub fn drain(&self) -> Dirty {
        let mut tiles: Vec<TilePos> = self.rx.try_iter().collect();
        if self.notifier.overflow.swap(false, Ordering::AcqRel) {
            // Anything queued after the flag was raised is covered by the rescan.
            self.rx.try_iter().for_each(drop);
            return Dirty::Rescan;
        }
        tiles.sort_unstable();
        tiles.dedup();
        Dirty::Tiles(tiles)
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Bare layers for corrector tests.

    use super::LayerRefs;
    use crate::coords::GridDims;
    use crate::layers::{ObjectLayer, OccupancyLayer, TerrainLayer, UnitLayer};
    use crate::partition::PartitionEngine;

    pub struct Layers {
        pub terrain: TerrainLayer,
        pub occupancy: OccupancyLayer,
        pub objects: ObjectLayer,
        pub units: UnitLayer,
        pub partitions: PartitionEngine,
    }

    impl Layers {
        pub fn new(dims: GridDims) -> Self {
            Self {
                terrain: TerrainLayer::new(dims),
                occupancy: OccupancyLayer::new(dims),
                objects: ObjectLayer::new(dims),
                units: UnitLayer::new(dims),
                partitions: PartitionEngine::new(dims),
            }
        }

        pub fn refs(&self) -> LayerRefs<'_> {
            LayerRefs {
                terrain: &self.terrain,
                occupancy: &self.occupancy,
                objects: &self.objects,
                units: &self.units,
                partitions: &self.partitions,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_sorts_and_dedups() {
        let queue = DirtyQueue::new("test", 8);
        queue.notify(TilePos::new(2, 0));
        queue.notify(TilePos::new(1, 0));
        queue.notify(TilePos::new(2, 0));
        assert_eq!(
            queue.drain(),
            Dirty::Tiles(vec![TilePos::new(1, 0), TilePos::new(2, 0)])
        );
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_overflow_requests_rescan_once() {
        let queue = DirtyQueue::new("test", 2);
        for x in 0..5 {
            queue.notify(TilePos::new(x, 0));
        }
        assert_eq!(queue.drain(), Dirty::Rescan);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_notifier_works_from_another_thread() {
        let queue = DirtyQueue::new("test", 16);
        let notifier = queue.notifier();
        std::thread::spawn(move || notifier.notify(TilePos::new(3, 3)))
            .join()
            .unwrap();
        assert_eq!(queue.drain(), Dirty::Tiles(vec![TilePos::new(3, 3)]));
    }
}
