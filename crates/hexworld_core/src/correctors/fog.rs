//! Fog of war.
//!
//! Observers (units) report where they appear and vanish; each report
//! adjusts a per-player visibility counter over a hex circle. A tile is
//! visible while its counter is positive and stays explored once it has
//! been seen.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::components::PlayerId;
use crate::coords::{hex_circle, GridDims, TilePos};
use crate::error::{GridError, Result};

/// Visibility of a tile to one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Seen right now.
    Visible,
    /// Seen before.
    Explored,
    /// Never seen.
    Unexplored,
}

/// Observer movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FogEvent {
    /// An observer started seeing around `pos`.
    Appear {
        /// Observing player.
        player: PlayerId,
        /// Observer position.
        pos: TilePos,
        /// Vision radius.
        radius: u32,
    },
    /// An observer stopped seeing around `pos`.
    Vanish {
        /// Observing player.
        player: PlayerId,
        /// Observer position.
        pos: TilePos,
        /// Vision radius.
        radius: u32,
    },
}

/// Cloneable sending side of the fog corrector.
#[derive(Debug, Clone)]
pub struct FogNotifier {
    tx: Sender<FogEvent>,
}

impl FogNotifier {
    /// Report an observer change.
    pub fn send(&self, event: FogEvent) {
        // The receiver lives as long as the corrector; a send can only fail
        // during teardown.
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, Default)]
struct PlayerFog {
    counts: Vec<u16>,
    explored: Vec<bool>,
}

/// Fog-of-war corrector.
#[derive(Debug)]
pub struct FogCorrector {
    dims: GridDims,
    players: Vec<PlayerFog>,
    tx: Sender<FogEvent>,
    rx: Receiver<FogEvent>,
}

impl FogCorrector {
    /// Create a corrector where nothing has been seen.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        let (tx, rx) = unbounded();
        Self {
            dims,
            players: Vec::new(),
            tx,
            rx,
        }
    }

    /// A handle other threads may use to report observers.
    #[must_use]
    pub fn notifier(&self) -> FogNotifier {
        FogNotifier {
            tx: self.tx.clone(),
        }
    }

    /// Report an observer change.
    pub fn send(&self, event: FogEvent) {
        // Both ends are owned by `self`.
        let _ = self.tx.send(event);
    }

    /// Apply every pending event. Returns the number of events applied.
    pub fn run(&mut self) -> usize {
        let events: Vec<FogEvent> = self.rx.try_iter().collect();
        for &event in &events {
            self.apply(event);
        }
        if !events.is_empty() {
            debug!(events = events.len(), "Fog pass");
        }
        events.len()
    }

    /// Visibility of `pos` for `player`.
    pub fn visibility(&self, player: PlayerId, pos: TilePos) -> Result<Visibility> {
        let index = self.dims.index(pos)?;
        let Some(fog) = self.players.get(usize::from(player.0)) else {
            return Ok(Visibility::Unexplored);
        };
        Ok(if fog.counts[index] > 0 {
            Visibility::Visible
        } else if fog.explored[index] {
            Visibility::Explored
        } else {
            Visibility::Unexplored
        })
    }

    /// Explored bits per player, for persistence.
    #[must_use]
    pub fn explored(&self) -> Vec<Vec<bool>> {
        self.players.iter().map(|f| f.explored.clone()).collect()
    }

    /// Replace explored bits and clear every counter. Observers must be
    /// re-announced afterwards.
    pub fn restore_explored(&mut self, explored: Vec<Vec<bool>>) -> Result<()> {
        let count = self.dims.tile_count();
        if let Some(bad) = explored.iter().find(|e| e.len() != count) {
            return Err(GridError::Snapshot(format!(
                "fog layer has {} tiles, expected {count}",
                bad.len()
            )));
        }
        self.rx.try_iter().for_each(drop);
        self.players = explored
            .into_iter()
            .map(|explored| PlayerFog {
                counts: vec![0; count],
                explored,
            })
            .collect();
        Ok(())
    }

    fn player_mut(&mut self, player: PlayerId) -> &mut PlayerFog {
        let slot = usize::from(player.0);
        if self.players.len() <= slot {
            let count = self.dims.tile_count();
            self.players.resize_with(slot + 1, || PlayerFog {
                counts: vec![0; count],
                explored: vec![false; count],
            });
        }
        &mut self.players[slot]
    }

    fn apply(&mut self, event: FogEvent) {
        let dims = self.dims;
        match event {
            FogEvent::Appear {
                player,
                pos,
                radius,
            } => {
                let fog = self.player_mut(player);
                for tile in hex_circle(pos, radius) {
                    if let Ok(index) = dims.index(tile) {
                        fog.counts[index] = fog.counts[index].saturating_add(1);
                        fog.explored[index] = true;
                    }
                }
            }
            FogEvent::Vanish {
                player,
                pos,
                radius,
            } => {
                let fog = self.player_mut(player);
                let mut underflow = false;
                for tile in hex_circle(pos, radius) {
                    if let Ok(index) = dims.index(tile) {
                        match fog.counts[index].checked_sub(1) {
                            Some(n) => fog.counts[index] = n,
                            None => underflow = true,
                        }
                    }
                }
                if underflow {
                    warn!(player = player.0, x = pos.x, y = pos.y, "Fog observer vanished twice");
                }
            }
        }
    }
}
