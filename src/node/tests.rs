//! Node Dispatch Tests
//!
//! Drives the dispatcher through decoded command frames with fake
//! connections and asserts on the frames queued back, covering the full
//! share / search / scatter / teardown flow without sockets.

#[cfg(test)]
mod tests {
    use crate::node::dispatch::DirectoryNode;
    use crate::node::links::Links;
    use crate::node::types::{ConnectionId, LinkClass, NodeConfig, OutFrame};
    use crate::protocol::{
        MSG_CLIENT_ADD_FILE, MSG_CLIENT_BROWSE, MSG_CLIENT_LOGIN, MSG_CLIENT_REMOVE_FILE,
        MSG_CLIENT_SEARCH, MSG_SERVER_BROWSE_END, MSG_SERVER_BROWSE_RESPONSE,
        MSG_SERVER_NOSUCH, MSG_SERVER_REMOTE_SEARCH, MSG_SERVER_REMOTE_SEARCH_END,
        MSG_SERVER_REMOTE_SEARCH_RESULT, MSG_SERVER_SEARCH_END, MSG_SERVER_SEARCH_RESULT,
        MSG_SERVER_STATS, MSG_SERVER_USER_JOINED, pop_field,
    };
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    struct TestConn {
        conn: ConnectionId,
        rx: UnboundedReceiver<OutFrame>,
    }

    fn attach(links: &Links, class: LinkClass) -> TestConn {
        let (tx, rx) = unbounded_channel();
        let conn = ConnectionId::new();
        links.register(conn.clone(), class, "127.0.0.1:9999".parse().unwrap(), tx);
        TestConn { conn, rx }
    }

    fn drain(test_conn: &mut TestConn) -> Vec<OutFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = test_conn.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn node() -> (DirectoryNode, Links) {
        let links = Links::new();
        (DirectoryNode::new(NodeConfig::default(), links.clone()), links)
    }

    fn login(node: &mut DirectoryNode, client: &TestConn, nick: &str, speed: u32) {
        node.handle_frame(
            &client.conn,
            MSG_CLIENT_LOGIN,
            &format!("{nick} secret 6699 \"test-client\" {speed}"),
        );
    }

    fn share_song(node: &mut DirectoryNode, client: &TestConn, path: &str) {
        node.handle_frame(
            &client.conn,
            MSG_CLIENT_ADD_FILE,
            &format!("\"{path}\" abc123 4000000 128 44100 200"),
        );
    }

    // ============================================================
    // SESSION AND CATALOGUE TESTS
    // ============================================================

    #[test]
    fn test_login_share_and_stats() {
        let (mut node, links) = node();
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        assert_eq!(links.class_of(&alice.conn), LinkClass::Client);

        share_song(&mut node, &alice, "C:\\Music\\song.mp3");
        assert_eq!(node.total_files(), 1);
        assert_eq!(node.users().get("alice").unwrap().shared, 1);

        node.handle_frame(&alice.conn, MSG_SERVER_STATS, "");
        let frames = drain(&mut alice);
        let stats = frames
            .iter()
            .find(|(tag, _)| *tag == MSG_SERVER_STATS)
            .unwrap();
        assert_eq!(stats.1, "1 1 0");
    }

    #[test]
    fn test_duplicate_share_gets_error_line() {
        let (mut node, links) = node();
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        share_song(&mut node, &alice, "song.mp3");
        drain(&mut alice);

        share_song(&mut node, &alice, "song.mp3");
        let frames = drain(&mut alice);
        assert_eq!(frames, vec![(MSG_SERVER_NOSUCH, "duplicate file".to_string())]);
        assert_eq!(node.total_files(), 1);
    }

    #[test]
    fn test_share_without_login_is_rejected() {
        let (mut node, links) = node();
        let mut stranger = attach(&links, LinkClass::Unknown);
        share_song(&mut node, &stranger, "song.mp3");
        let frames = drain(&mut stranger);
        assert_eq!(
            frames,
            vec![(MSG_SERVER_NOSUCH, "you are not logged in".to_string())]
        );
    }

    #[test]
    fn test_remove_share_withdraws_from_owner_table() {
        let (mut node, links) = node();
        let alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        share_song(&mut node, &alice, "C:\\Music\\song.mp3");
        node.handle_frame(
            &alice.conn,
            MSG_CLIENT_REMOVE_FILE,
            "\"C:\\Music\\song.mp3\"",
        );
        assert_eq!(node.total_files(), 0);
        assert!(node.index().owner_files("alice").is_none());
    }

    #[test]
    fn test_browse_streams_catalogue() {
        let (mut node, links) = node();
        let mut alice = attach(&links, LinkClass::Unknown);
        let mut bob = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        login(&mut node, &bob, "bob", 3);
        share_song(&mut node, &alice, "first.mp3");
        share_song(&mut node, &alice, "second.mp3");
        drain(&mut bob);

        node.handle_frame(&bob.conn, MSG_CLIENT_BROWSE, "alice");
        let frames = drain(&mut bob);
        let rows: Vec<_> = frames
            .iter()
            .filter(|(tag, _)| *tag == MSG_SERVER_BROWSE_RESPONSE)
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|(_, line)| line.starts_with("alice ")));
        assert_eq!(frames.last().unwrap(), &(MSG_SERVER_BROWSE_END, "alice".to_string()));
    }

    // ============================================================
    // LOCAL SEARCH TESTS
    // ============================================================

    #[test]
    fn test_search_scenario_alice_and_bob() {
        let (mut node, links) = node();
        let mut alice = attach(&links, LinkClass::Unknown);
        let mut bob = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        login(&mut node, &bob, "bob", 3);
        share_song(&mut node, &alice, "C:\\Music\\song.mp3");
        drain(&mut alice);
        drain(&mut bob);

        node.handle_frame(&bob.conn, MSG_CLIENT_SEARCH, "FILENAME CONTAINS \"song\"");
        let frames = drain(&mut bob);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, MSG_SERVER_SEARCH_RESULT);
        assert_eq!(
            frames[0].1,
            "\"C:\\Music\\song.mp3\" abc123 4000000 128 44100 200 alice 127.0.0.1 5"
        );
        assert_eq!(frames[1], (MSG_SERVER_SEARCH_END, String::new()));

        // the same search by the owner matches nothing
        node.handle_frame(&alice.conn, MSG_CLIENT_SEARCH, "FILENAME CONTAINS \"song\"");
        let frames = drain(&mut alice);
        assert_eq!(frames, vec![(MSG_SERVER_SEARCH_END, String::new())]);
    }

    #[test]
    fn test_malformed_search_gets_error_and_end() {
        let (mut node, links) = node();
        let mut bob = attach(&links, LinkClass::Unknown);
        login(&mut node, &bob, "bob", 3);
        drain(&mut bob);

        node.handle_frame(&bob.conn, MSG_CLIENT_SEARCH, "FILENAME BLAH \"song\"");
        let frames = drain(&mut bob);
        assert_eq!(
            frames,
            vec![
                (MSG_SERVER_NOSUCH, "invalid search request".to_string()),
                (MSG_SERVER_SEARCH_END, String::new()),
            ]
        );
        assert_eq!(node.searches().len(), 0);
    }

    #[test]
    fn test_max_results_zero_falls_back_to_server_cap() {
        let (mut node, links) = node();
        let mut alice = attach(&links, LinkClass::Unknown);
        let mut bob = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        login(&mut node, &bob, "bob", 3);
        share_song(&mut node, &alice, "song.mp3");
        drain(&mut bob);

        node.handle_frame(
            &bob.conn,
            MSG_CLIENT_SEARCH,
            "FILENAME CONTAINS \"song\" MAX_RESULTS 0",
        );
        let frames = drain(&mut bob);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, MSG_SERVER_SEARCH_RESULT);
        assert_eq!(frames[1].0, MSG_SERVER_SEARCH_END);
    }

    #[test]
    fn test_disconnect_invalidates_shares() {
        let (mut node, links) = node();
        let mut alice = attach(&links, LinkClass::Unknown);
        let mut bob = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        login(&mut node, &bob, "bob", 3);
        share_song(&mut node, &alice, "song.mp3");
        drain(&mut bob);

        node.handle_disconnect(&alice.conn);
        assert!(node.users().get("alice").is_none());

        // dead entries are invisible to searches even before the sweep
        node.handle_frame(&bob.conn, MSG_CLIENT_SEARCH, "FILENAME CONTAINS \"song\"");
        let frames = drain(&mut bob);
        assert_eq!(frames, vec![(MSG_SERVER_SEARCH_END, String::new())]);
        assert!(node.index().posting("song").is_some());

        node.periodic_gc();
        assert!(node.index().posting("song").is_none());
        assert_eq!(node.index().stored_records(), 0);
    }

    // ============================================================
    // SCATTER/GATHER TESTS
    // ============================================================

    fn scattered_id(frames: &[OutFrame]) -> String {
        let (_, payload) = frames
            .iter()
            .find(|(tag, _)| *tag == MSG_SERVER_REMOTE_SEARCH)
            .expect("no scatter frame");
        let (_nick, rest) = pop_field(payload).unwrap();
        let (id, _) = pop_field(rest).unwrap();
        id.to_string()
    }

    #[test]
    fn test_search_scatters_to_peer_and_gathers() {
        let (mut node, links) = node();
        let mut peer = attach(&links, LinkClass::Peer);
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        drain(&mut alice);
        drain(&mut peer);

        // zero local matches: the query is scattered with expected = 1
        node.handle_frame(&alice.conn, MSG_CLIENT_SEARCH, "FILENAME CONTAINS \"rarity\"");
        let peer_frames = drain(&mut peer);
        let id = scattered_id(&peer_frames);
        assert_eq!(node.searches().len(), 1);
        assert_eq!(node.searches().get(&id).unwrap().expected, 1);
        assert!(drain(&mut alice).is_empty());

        // the peer announces the matching user, then streams its result
        node.handle_frame(&peer.conn, MSG_SERVER_USER_JOINED, "carol 10.1.1.1 7");
        node.handle_frame(
            &peer.conn,
            MSG_SERVER_REMOTE_SEARCH_RESULT,
            &format!("{id} carol \"rarity.mp3\" ffff00 1234 128 44100 60"),
        );
        node.handle_frame(&peer.conn, MSG_SERVER_REMOTE_SEARCH_END, &id);

        let frames = drain(&mut alice);
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0],
            (
                MSG_SERVER_SEARCH_RESULT,
                "\"rarity.mp3\" ffff00 1234 128 44100 60 carol 10.1.1.1 7".to_string()
            )
        );
        assert_eq!(frames[1], (MSG_SERVER_SEARCH_END, String::new()));
        assert_eq!(node.searches().len(), 0);
    }

    #[test]
    fn test_peer_drop_counts_as_empty_reply() {
        let (mut node, links) = node();
        let mut peer_one = attach(&links, LinkClass::Peer);
        let mut peer_two = attach(&links, LinkClass::Peer);
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        drain(&mut alice);
        drain(&mut peer_one);
        drain(&mut peer_two);

        node.handle_frame(&alice.conn, MSG_CLIENT_SEARCH, "FILENAME CONTAINS \"rarity\"");
        let id = scattered_id(&drain(&mut peer_two));
        assert_eq!(node.searches().get(&id).unwrap().expected, 2);

        node.handle_disconnect(&peer_one.conn);
        assert_eq!(node.searches().get(&id).unwrap().expected, 1);
        assert!(drain(&mut alice).is_empty());

        node.handle_frame(&peer_two.conn, MSG_SERVER_REMOTE_SEARCH_END, &id);
        assert_eq!(drain(&mut alice), vec![(MSG_SERVER_SEARCH_END, String::new())]);
        assert_eq!(node.searches().len(), 0);
    }

    #[test]
    fn test_last_peer_drop_finalizes_immediately() {
        let (mut node, links) = node();
        let mut peer = attach(&links, LinkClass::Peer);
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        drain(&mut alice);
        drain(&mut peer);

        node.handle_frame(&alice.conn, MSG_CLIENT_SEARCH, "FILENAME CONTAINS \"rarity\"");
        drain(&mut peer);
        assert_eq!(node.searches().len(), 1);

        node.handle_disconnect(&peer.conn);
        assert_eq!(drain(&mut alice), vec![(MSG_SERVER_SEARCH_END, String::new())]);
        assert_eq!(node.searches().len(), 0);
    }

    #[test]
    fn test_requester_disconnect_cancels_silently() {
        let (mut node, links) = node();
        let mut peer = attach(&links, LinkClass::Peer);
        let alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        drain(&mut peer);

        node.handle_frame(&alice.conn, MSG_CLIENT_SEARCH, "FILENAME CONTAINS \"rarity\"");
        drain(&mut peer);
        assert_eq!(node.searches().len(), 1);

        node.handle_disconnect(&alice.conn);
        assert_eq!(node.searches().len(), 0);
    }

    #[test]
    fn test_relayed_search_streams_results_to_peer() {
        let (mut node, links) = node();
        let mut peer = attach(&links, LinkClass::Peer);
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        share_song(&mut node, &alice, "song.mp3");
        drain(&mut alice);
        drain(&mut peer);

        node.handle_frame(&peer.conn, MSG_SERVER_USER_JOINED, "carol 10.1.1.1 7");
        node.handle_frame(
            &peer.conn,
            MSG_SERVER_REMOTE_SEARCH,
            "carol cafe0001 FILENAME CONTAINS \"song\" MAX_RESULTS 10",
        );

        let frames = drain(&mut peer);
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0],
            (
                MSG_SERVER_REMOTE_SEARCH_RESULT,
                "cafe0001 alice \"song.mp3\" abc123 4000000 128 44100 200".to_string()
            )
        );
        // no other peer to scatter to: the end marker follows at once
        assert_eq!(
            frames[1],
            (MSG_SERVER_REMOTE_SEARCH_END, "cafe0001".to_string())
        );
        assert_eq!(node.searches().len(), 0);
    }

    #[test]
    fn test_relayed_search_for_unknown_requester_ends_immediately() {
        let (mut node, links) = node();
        let mut peer = attach(&links, LinkClass::Peer);

        node.handle_frame(
            &peer.conn,
            MSG_SERVER_REMOTE_SEARCH,
            "ghost feed0002 FILENAME CONTAINS \"song\"",
        );
        assert_eq!(
            drain(&mut peer),
            vec![(MSG_SERVER_REMOTE_SEARCH_END, "feed0002".to_string())]
        );
    }

    #[test]
    fn test_unknown_search_id_is_dropped() {
        let (mut node, links) = node();
        let mut peer = attach(&links, LinkClass::Peer);
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        drain(&mut alice);
        drain(&mut peer);

        node.handle_frame(
            &peer.conn,
            MSG_SERVER_REMOTE_SEARCH_RESULT,
            "0badc0de carol \"x.mp3\" ff 1 128 44100 10",
        );
        node.handle_frame(&peer.conn, MSG_SERVER_REMOTE_SEARCH_END, "0badc0de");
        assert!(drain(&mut alice).is_empty());
        assert!(drain(&mut peer).is_empty());
    }

    #[test]
    fn test_peer_loss_parts_its_users() {
        let (mut node, links) = node();
        let mut peer = attach(&links, LinkClass::Peer);
        let mut alice = attach(&links, LinkClass::Unknown);
        login(&mut node, &alice, "alice", 5);
        drain(&mut alice);
        drain(&mut peer);

        node.handle_frame(&peer.conn, MSG_SERVER_USER_JOINED, "carol 10.1.1.1 7");
        assert!(node.users().get("carol").is_some());

        node.handle_disconnect(&peer.conn);
        assert!(node.users().get("carol").is_none());
        assert!(node.users().get("alice").is_some());
    }
}
