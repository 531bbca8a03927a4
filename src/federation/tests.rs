//! Federation Module Tests
//!
//! Validates the pending-search table transitions: completion accounting,
//! peer-loss decrements and requester cancellation.

#[cfg(test)]
mod tests {
    use crate::federation::coordinator::{EndOutcome, RemoteSearches};
    use crate::federation::types::{PendingSearch, new_search_id};
    use crate::node::types::{ConnectionId, LinkClass};

    fn pending(id: &str, conn: &ConnectionId, expected: usize) -> PendingSearch {
        PendingSearch {
            id: id.to_string(),
            conn: conn.clone(),
            requester_class: LinkClass::Client,
            nick: "alice".to_string(),
            expected,
            received: 0,
        }
    }

    #[test]
    fn test_search_id_shape() {
        let id = new_search_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_end_for_unknown_id_is_dropped() {
        let mut searches = RemoteSearches::new();
        assert!(matches!(searches.note_end("cafef00d"), EndOutcome::Unknown));
    }

    #[test]
    fn test_completion_after_all_expected_replies() {
        let mut searches = RemoteSearches::new();
        let requester = ConnectionId::new();
        searches.register(pending("aa11bb22", &requester, 2));

        assert!(matches!(searches.note_end("aa11bb22"), EndOutcome::Pending));
        match searches.note_end("aa11bb22") {
            EndOutcome::Complete(search) => {
                assert_eq!(search.received, 2);
                assert_eq!(search.conn, requester);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(searches.is_empty());
    }

    #[test]
    fn test_peer_down_counts_as_empty_reply() {
        let mut searches = RemoteSearches::new();
        let requester = ConnectionId::new();
        let peer = ConnectionId::new();
        searches.register(pending("11112222", &requester, 2));

        // first peer drops: expected 2 -> 1, still pending
        let outcome = searches.peer_down(&peer);
        assert!(outcome.finalized.is_empty());
        assert_eq!(searches.len(), 1);

        // the remaining peer reports end-of-search: complete
        assert!(matches!(
            searches.note_end("11112222"),
            EndOutcome::Complete(_)
        ));
    }

    #[test]
    fn test_peer_down_finalizes_satisfied_searches() {
        let mut searches = RemoteSearches::new();
        let requester = ConnectionId::new();
        let peer = ConnectionId::new();
        searches.register(pending("33334444", &requester, 1));

        let outcome = searches.peer_down(&peer);
        assert_eq!(outcome.finalized.len(), 1);
        assert_eq!(outcome.finalized[0].id, "33334444");
        assert!(searches.is_empty());
    }

    #[test]
    fn test_peer_down_cancels_its_own_requests_silently() {
        let mut searches = RemoteSearches::new();
        let peer = ConnectionId::new();
        // the dropped peer is itself the requester of this relayed search
        searches.register(pending("55556666", &peer, 3));

        let outcome = searches.peer_down(&peer);
        assert!(outcome.finalized.is_empty());
        assert_eq!(outcome.cancelled, 1);
        assert!(searches.is_empty());
    }

    #[test]
    fn test_requester_down_destroys_without_touching_others() {
        let mut searches = RemoteSearches::new();
        let leaving = ConnectionId::new();
        let staying = ConnectionId::new();
        searches.register(pending("77778888", &leaving, 2));
        searches.register(pending("9999aaaa", &staying, 2));

        assert_eq!(searches.requester_down(&leaving), 1);
        assert_eq!(searches.len(), 1);
        let survivor = searches.get("9999aaaa").unwrap();
        // untouched accounting on the surviving search
        assert_eq!(survivor.expected, 2);
        assert_eq!(survivor.received, 0);
    }
}
