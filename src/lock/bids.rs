//! Registry of outstanding bids for exclusive locks.
//!
//! Bids arbitrate contention at the moment of acquisition: a non-renewing
//! exclusive request carrying a bid only succeeds if its amount is the lowest
//! among the live bids for the same object and lock name. Bids are kept in
//! memory for the life of the registry and are never persisted.
//!
//! Requests against unrelated objects share one registry, so it sits behind a
//! single mutex. The mutex is only held for map arithmetic, never across an
//! attribute store call.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// One bidder's standing offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bid {
    /// Priority; lower wins.
    pub amount: i32,
    pub expiration: DateTime<Utc>,
}

impl Bid {
    /// A bid stays live through the instant it expires, so a zero-length bid
    /// still counts for the request that placed it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration < now
    }
}

/// bidder -> bid
type BidderBids = BTreeMap<String, Bid>;
/// lock name -> bidders
type LockBids = BTreeMap<String, BidderBids>;

/// Object-and-lock scoped table of bids.
#[derive(Debug, Default)]
pub struct BidRegistry {
    objects: Mutex<BTreeMap<String, LockBids>>,
}

impl BidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `bidder`'s bid for a lock.
    pub fn record(&self, object_id: &str, lock_name: &str, bidder: &str, bid: Bid) {
        self.lock()
            .entry(object_id.to_string())
            .or_default()
            .entry(lock_name.to_string())
            .or_default()
            .insert(bidder.to_string(), bid);
    }

    /// Whether `amount` is at or below every live bid for the lock.
    ///
    /// Expired bids for this lock are purged on the way, along with any table
    /// they leave empty. Ties pass, so two bidders with the same lowest amount
    /// both qualify here and the lock record decides between them.
    pub fn is_lowest(&self, object_id: &str, lock_name: &str, amount: i32, now: DateTime<Utc>) -> bool {
        let mut objects = self.lock();
        let Some(locks) = objects.get_mut(object_id) else {
            return true;
        };
        let Some(bidders) = locks.get_mut(lock_name) else {
            return true;
        };

        bidders.retain(|_, bid| !bid.is_expired(now));
        let best = bidders
            .values()
            .map(|bid| bid.amount)
            .fold(amount, i32::min);

        if bidders.is_empty() {
            locks.remove(lock_name);
            if locks.is_empty() {
                objects.remove(object_id);
            }
        }

        amount == best
    }

    /// Drop at most `limit` expired bids from anywhere in the registry, along
    /// with the tables they leave empty. Returns how many were dropped.
    pub fn sweep_some(&self, now: DateTime<Utc>, limit: usize) -> usize {
        let mut objects = self.lock();
        let expired: Vec<(String, String, String)> = objects
            .iter()
            .flat_map(move |(object_id, locks)| {
                locks.iter().flat_map(move |(lock_name, bidders)| {
                    bidders
                        .iter()
                        .filter(move |(_, bid)| bid.is_expired(now))
                        .map(move |(bidder, _)| {
                            (object_id.clone(), lock_name.clone(), bidder.clone())
                        })
                })
            })
            .take(limit)
            .collect();

        for (object_id, lock_name, bidder) in &expired {
            let Some(locks) = objects.get_mut(object_id) else {
                continue;
            };
            if let Some(bidders) = locks.get_mut(lock_name) {
                bidders.remove(bidder);
                if bidders.is_empty() {
                    locks.remove(lock_name);
                }
            }
            if locks.is_empty() {
                objects.remove(object_id);
            }
        }

        expired.len()
    }

    /// Number of objects with at least one recorded bid.
    pub fn object_count(&self) -> usize {
        self.lock().len()
    }

    /// The current bid of one bidder, expired or not.
    pub fn get(&self, object_id: &str, lock_name: &str, bidder: &str) -> Option<Bid> {
        self.lock()
            .get(object_id)
            .and_then(|locks| locks.get(lock_name))
            .and_then(|bidders| bidders.get(bidder))
            .copied()
    }

    /// Drop every expired bid and any table left empty. Returns how many bids
    /// were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut objects = self.lock();
        let mut removed = 0;

        objects.retain(|_, locks| {
            locks.retain(|_, bidders| {
                let before = bidders.len();
                bidders.retain(|_, bid| !bid.is_expired(now));
                removed += before - bidders.len();
                !bidders.is_empty()
            });
            !locks.is_empty()
        });

        removed
    }

    /// Number of recorded bids, live or expired.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .flat_map(|locks| locks.values())
            .map(|bidders| bidders.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, LockBids>> {
        self.objects.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}
