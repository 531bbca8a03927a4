use super::types::PendingSearch;
use crate::node::types::ConnectionId;
use std::collections::HashMap;

/// Outcome of recording one end-of-search message.
#[derive(Debug)]
pub enum EndOutcome {
    /// No pending search under that identifier; the search may already have
    /// been cancelled locally.
    Unknown,
    /// Recorded; more replies are still outstanding.
    Pending,
    /// That was the last outstanding reply; the record has been removed and
    /// the caller must send the terminal marker to the requester.
    Complete(PendingSearch),
}

/// What a peer-link teardown did to the pending table.
#[derive(Debug, Default)]
pub struct PeerDownOutcome {
    /// Searches satisfied by treating the dropped peer as an empty reply;
    /// the caller must send their terminal markers.
    pub finalized: Vec<PendingSearch>,
    /// Searches the dropped peer itself had requested, destroyed silently.
    pub cancelled: usize,
}

/// The pending-search table, keyed by search identifier. Owned by the
/// dispatcher task; every transition here runs between two commands.
#[derive(Default)]
pub struct RemoteSearches {
    pending: HashMap<String, PendingSearch>,
}

impl RemoteSearches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, search: PendingSearch) {
        self.pending.insert(search.id.clone(), search);
    }

    pub fn get(&self, id: &str) -> Option<&PendingSearch> {
        self.pending.get(id)
    }

    /// Record one end-of-search reply for `id`.
    pub fn note_end(&mut self, id: &str) -> EndOutcome {
        let Some(search) = self.pending.get_mut(id) else {
            return EndOutcome::Unknown;
        };
        search.received += 1;
        if search.is_satisfied() {
            let search = self.pending.remove(id).unwrap();
            EndOutcome::Complete(search)
        } else {
            EndOutcome::Pending
        }
    }

    /// A peer link went down: every pending search expects one reply fewer,
    /// searches the peer itself requested are destroyed, and searches the
    /// decrement satisfied are handed back for finalization.
    pub fn peer_down(&mut self, conn: &ConnectionId) -> PeerDownOutcome {
        let mut outcome = PeerDownOutcome::default();
        self.pending.retain(|_, search| {
            if &search.conn == conn {
                outcome.cancelled += 1;
                return false;
            }
            search.expected = search.expected.saturating_sub(1);
            if search.is_satisfied() {
                outcome.finalized.push(search.clone());
                return false;
            }
            true
        });
        outcome
    }

    /// A client requester went down: its pending searches are destroyed
    /// without notification, nobody is listening anymore.
    pub fn requester_down(&mut self, conn: &ConnectionId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, search| &search.conn != conn);
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
