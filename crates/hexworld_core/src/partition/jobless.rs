//! Per-role queues of idle workers.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::components::UnitId;
use crate::coords::TilePos;
use crate::unit_kind::WorkerRole;

/// An idle worker waiting for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoblessWorker {
    /// External unit id.
    pub unit: UnitId,
    /// Where the worker waits.
    pub pos: TilePos,
}

/// FIFO pools of idle workers, one per role.
///
/// Assignment is pulled by callers; the pools only store and iterate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoblessPools {
    pools: BTreeMap<WorkerRole, VecDeque<JoblessWorker>>,
}

impl JoblessPools {
    /// Enqueue a worker at the back of its role's pool.
    pub fn add(&mut self, role: WorkerRole, worker: JoblessWorker) {
        self.pools.entry(role).or_default().push_back(worker);
    }

    /// Pop the longest-waiting worker of `role`.
    pub fn take(&mut self, role: WorkerRole) -> Option<JoblessWorker> {
        self.pools.get_mut(&role).and_then(VecDeque::pop_front)
    }

    /// Pop the worker of `role` closest to `target` (ties: longest waiting).
    pub fn take_nearest(&mut self, role: WorkerRole, target: TilePos) -> Option<JoblessWorker> {
        let pool = self.pools.get_mut(&role)?;
        let idx = pool
            .iter()
            .enumerate()
            .min_by_key(|(i, w)| (w.pos.hex_distance(target), *i))
            .map(|(i, _)| i)?;
        pool.remove(idx)
    }

    /// Remove a worker from every pool. Returns whether it was queued.
    pub fn remove(&mut self, unit: UnitId) -> bool {
        let mut found = false;
        for pool in self.pools.values_mut() {
            let before = pool.len();
            pool.retain(|w| w.unit != unit);
            found |= pool.len() != before;
        }
        found
    }

    /// Waiting workers of `role`, front first.
    pub fn iter(&self, role: WorkerRole) -> impl Iterator<Item = &JoblessWorker> + '_ {
        self.pools.get(&role).into_iter().flatten()
    }

    /// Number of waiting workers of `role`.
    #[must_use]
    pub fn len(&self, role: WorkerRole) -> usize {
        self.pools.get(&role).map_or(0, VecDeque::len)
    }

    /// Whether no worker waits in any pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.values().all(VecDeque::is_empty)
    }

    /// Move out the workers standing where `pred` holds, keeping order.
    pub fn extract_where(&mut self, mut pred: impl FnMut(TilePos) -> bool) -> Self {
        let mut out = Self::default();
        for (role, pool) in &mut self.pools {
            let (moved, kept): (VecDeque<_>, VecDeque<_>) =
                pool.drain(..).partition(|w| pred(w.pos));
            *pool = kept;
            if !moved.is_empty() {
                out.pools.insert(*role, moved);
            }
        }
        out
    }

    /// Append every worker of `other` behind the current ones.
    pub fn absorb(&mut self, other: Self) {
        for (role, workers) in other.pools {
            self.pools.entry(role).or_default().extend(workers);
        }
    }
}
