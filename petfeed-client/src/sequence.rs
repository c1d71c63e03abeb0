use std::collections::HashMap;

use crate::api::CommentId;

/// What a fetch is filling in
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FetchKey {
    Window,
    Replies(CommentId),
}

/// Stamp carried by an in-flight request
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ticket {
    pub key: FetchKey,
    pub seq: u64,
    pub epoch: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Freshness {
    Current,
    /// A newer request for the same key was issued since
    Stale,
    /// The session was reset since
    Abandoned,
}

/// Per-key monotonic counters, so that only the latest request for a key gets
/// applied whatever the completion order
///
/// Counters are never removed during an epoch: restarting a key at 0 would let
/// an old request look current again.
#[derive(Clone, Debug, Default)]
pub struct Sequencer {
    epoch: u64,
    latest: HashMap<FetchKey, u64>,
}

impl Sequencer {
    pub fn issue(&mut self, key: FetchKey) -> Ticket {
        let seq = self.bump(key);
        Ticket {
            key,
            seq,
            epoch: self.epoch,
        }
    }

    /// Make every in-flight request for `key` stale
    pub fn supersede(&mut self, key: FetchKey) {
        self.bump(key);
    }

    fn bump(&mut self, key: FetchKey) -> u64 {
        let seq = self.latest.entry(key).or_insert(0);
        *seq += 1;
        *seq
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn check(&self, t: &Ticket) -> Freshness {
        if t.epoch != self.epoch {
            return Freshness::Abandoned;
        }
        match self.latest.get(&t.key) {
            Some(seq) if *seq == t.seq => Freshness::Current,
            _ => Freshness::Stale,
        }
    }

    /// Abandon everything in flight
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.latest.clear();
    }
}
