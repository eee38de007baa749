//! Material offer/request board of one partition.
//!
//! Offers are counted per (position, material) in insertion order.
//! Requests are ordered by priority (highest first), then by the global
//! sequence number they were created with, so merging two boards keeps
//! the original order of both.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::components::RequestId;
use crate::coords::TilePos;
use crate::layers::MaterialType;

/// An open request for material delivered to `pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequest {
    /// Request identity; also its sequence number.
    pub id: RequestId,
    /// Delivery position.
    pub pos: TilePos,
    /// Requested material.
    pub material: MaterialType,
    /// Higher is served first.
    pub priority: u8,
    /// Units still to deliver.
    pub remaining: u32,
}

/// A matched offer and request, handed to a bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialTransfer {
    /// The request being served.
    pub request: RequestId,
    /// Where to pick the material up.
    pub from: TilePos,
    /// Where to deliver it.
    pub to: TilePos,
    /// The material.
    pub material: MaterialType,
}

type RequestKey = (u8, u64);

fn request_key(request: &MaterialRequest) -> RequestKey {
    (u8::MAX - request.priority, request.id.0)
}

/// Offer/request board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialMarket {
    offers: IndexMap<(TilePos, MaterialType), u32>,
    requests: BTreeMap<RequestKey, MaterialRequest>,
}

impl MaterialMarket {
    /// Add `amount` units of `material` offered at `pos`.
    pub fn offer(&mut self, pos: TilePos, material: MaterialType, amount: u32) {
        if amount > 0 {
            *self.offers.entry((pos, material)).or_insert(0) += amount;
        }
    }

    /// Withdraw one offered unit. Returns whether there was one.
    pub fn remove_offer(&mut self, pos: TilePos, material: MaterialType) -> bool {
        let key = (pos, material);
        match self.offers.get_mut(&key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.offers.shift_remove(&key);
                true
            }
            None => false,
        }
    }

    /// Units of `material` offered at `pos`.
    #[must_use]
    pub fn offered(&self, pos: TilePos, material: MaterialType) -> u32 {
        self.offers.get(&(pos, material)).copied().unwrap_or(0)
    }

    /// Place a request.
    pub fn request(&mut self, request: MaterialRequest) {
        if request.remaining > 0 {
            self.requests.insert(request_key(&request), request);
        }
    }

    /// Cancel a request. Returns whether it was open.
    pub fn cancel_request(&mut self, id: RequestId) -> bool {
        let before = self.requests.len();
        self.requests.retain(|_, r| r.id != id);
        self.requests.len() != before
    }

    /// Drop every request for `material` at `pos`. Returns how many were open.
    pub fn release_requests_at(&mut self, pos: TilePos, material: MaterialType) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|_, r| !(r.pos == pos && r.material == material));
        before - self.requests.len()
    }

    /// Open requests in service order.
    pub fn requests(&self) -> impl Iterator<Item = &MaterialRequest> + '_ {
        self.requests.values()
    }

    /// Offers in insertion order as `(pos, material, count)`.
    pub fn offers(&self) -> impl Iterator<Item = (TilePos, MaterialType, u32)> + '_ {
        self.offers.iter().map(|(&(pos, m), &count)| (pos, m, count))
    }

    /// Match the first satisfiable request with its nearest offer.
    ///
    /// Requests are tried in service order; among offers of the right
    /// material the closest wins, ties going to the older offer. The
    /// matched unit is consumed from both sides.
    pub fn next_transfer(&mut self) -> Option<MaterialTransfer> {
        let (key, from) = self.requests.iter().find_map(|(key, request)| {
            self.offers
                .iter()
                .enumerate()
                .filter(|(_, (&(_, m), &count))| m == request.material && count > 0)
                .min_by_key(|(i, (&(pos, _), _))| (pos.hex_distance(request.pos), *i))
                .map(|(_, (&(pos, _), _))| (*key, pos))
        })?;

        let request = self.requests.get_mut(&key)?;
        let transfer = MaterialTransfer {
            request: request.id,
            from,
            to: request.pos,
            material: request.material,
        };
        request.remaining -= 1;
        if request.remaining == 0 {
            self.requests.remove(&key);
        }
        self.remove_offer(from, transfer.material);
        Some(transfer)
    }

    /// Move out offers and requests located where `pred` holds.
    pub fn extract_where(&mut self, mut pred: impl FnMut(TilePos) -> bool) -> Self {
        let mut out = Self::default();
        let mut kept = IndexMap::with_capacity(self.offers.len());
        for (key, count) in self.offers.drain(..) {
            if pred(key.0) {
                out.offers.insert(key, count);
            } else {
                kept.insert(key, count);
            }
        }
        self.offers = kept;

        let (moved, stay): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(&mut self.requests)
                .into_iter()
                .partition(|(_, r)| pred(r.pos));
        self.requests = stay;
        out.requests = moved;
        out
    }

    /// Merge another board into this one.
    pub fn absorb(&mut self, other: Self) {
        for ((pos, material), count) in other.offers {
            self.offer(pos, material, count);
        }
        self.requests.extend(other.requests);
    }

    /// Whether the board holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty() && self.requests.is_empty()
    }
}
