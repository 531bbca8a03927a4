use super::links::Links;
use super::types::{ConnectionId, Event, LinkClass, NodeConfig};
use super::users::{UserInfo, UserTable};
use crate::error::DirectoryError;
use crate::federation::coordinator::{EndOutcome, RemoteSearches};
use crate::federation::types::{PendingSearch, new_search_id};
use crate::library::{Library, SavedShare};
use crate::protocol::{
    MSG_CLIENT_ADD_FILE, MSG_CLIENT_BROWSE, MSG_CLIENT_LOGIN, MSG_CLIENT_REMOVE_FILE,
    MSG_CLIENT_SEARCH, MSG_CLIENT_SHARE_FILE, MSG_SERVER_BROWSE_END,
    MSG_SERVER_BROWSE_RESPONSE, MSG_SERVER_LINK, MSG_SERVER_LOGIN_ACK, MSG_SERVER_NOSUCH,
    MSG_SERVER_REMOTE_SEARCH, MSG_SERVER_REMOTE_SEARCH_END, MSG_SERVER_REMOTE_SEARCH_RESULT,
    MSG_SERVER_SEARCH_END, MSG_SERVER_SEARCH_RESULT, MSG_SERVER_STATS,
    MSG_SERVER_USER_JOINED, MSG_SERVER_USER_PARTED, pop_field, split_fields,
};
use crate::search::index::FileIndex;
use crate::search::query::{SearchRequest, evaluate, forward_request};
use crate::search::types::{BITRATES, ContentType, SAMPLE_RATES, split_path};
use std::collections::HashMap;

const MAX_NICK_LEN: usize = 32;

/// One directory node: the local catalogue, the user table, the
/// pending-search table and the dispatch path tying them to the wire.
///
/// All of this state is owned by the dispatcher task; every inbound command
/// runs to completion before the next one is considered, so the operations
/// below are atomic with respect to each other without any locking. The only
/// shared structure is the [`Links`] registry, which just routes outbound
/// frames into per-connection queues.
pub struct DirectoryNode {
    config: NodeConfig,
    links: Links,
    index: FileIndex,
    users: UserTable,
    conn_users: HashMap<ConnectionId, String>,
    searches: RemoteSearches,
    library: Option<Library>,
    total_files: usize,
    total_kb: u64,
}

impl DirectoryNode {
    pub fn new(config: NodeConfig, links: Links) -> Self {
        let library = config.library.clone().and_then(|path| {
            Library::open(path)
                .map_err(|e| tracing::warn!("could not open share library: {}", e))
                .ok()
        });
        Self {
            index: FileIndex::new(config.index_hashes),
            users: UserTable::new(),
            conn_users: HashMap::new(),
            searches: RemoteSearches::new(),
            library,
            total_files: 0,
            total_kb: 0,
            config,
            links,
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Frame { conn, tag, payload } => self.handle_frame(&conn, tag, &payload),
            Event::Disconnected { conn } => self.handle_disconnect(&conn),
        }
    }

    /// Dispatch one decoded command frame.
    pub fn handle_frame(&mut self, conn: &ConnectionId, tag: u16, payload: &str) {
        match tag {
            MSG_CLIENT_LOGIN => self.login(conn, payload),
            MSG_SERVER_LINK => self.peer_link(conn, payload),
            MSG_CLIENT_ADD_FILE => self.add_file(conn, payload),
            MSG_CLIENT_SHARE_FILE => self.share_typed_file(conn, payload),
            MSG_CLIENT_REMOVE_FILE => self.remove_file(conn, payload),
            MSG_CLIENT_SEARCH => self.client_search(conn, payload),
            MSG_CLIENT_BROWSE => self.browse(conn, payload),
            MSG_SERVER_STATS => self.stats(conn),
            MSG_SERVER_USER_JOINED => self.user_joined(conn, payload),
            MSG_SERVER_USER_PARTED => self.user_parted(conn, payload),
            MSG_SERVER_REMOTE_SEARCH => self.remote_search(conn, payload),
            MSG_SERVER_REMOTE_SEARCH_RESULT => self.handle_remote_result(conn, payload),
            MSG_SERVER_REMOTE_SEARCH_END => self.handle_remote_end(payload),
            other => tracing::debug!("unhandled tag {} from {}", other, conn.0),
        }
    }

    // --- session handling ---

    fn login(&mut self, conn: &ConnectionId, payload: &str) {
        if self.links.class_of(conn) == LinkClass::Peer {
            tracing::warn!("login frame on a peer link, ignoring");
            return;
        }
        if self.conn_users.contains_key(conn) {
            self.links.send(
                conn,
                MSG_SERVER_NOSUCH,
                "you are already logged in".to_string(),
            );
            return;
        }
        let fields = match split_fields(payload) {
            Ok(fields) => fields,
            Err(e) => {
                self.error_to(conn, &e);
                return;
            }
        };
        // <nick> <pass> <port> "<client-info>" <speed>; extra fields from
        // newer clients are tolerated
        if fields.len() < 5 {
            tracing::debug!("login: too few parameters");
            self.error_to(conn, &DirectoryError::WrongFieldCount);
            return;
        }
        let nick = fields[0];
        let speed: u32 = fields[4].parse().unwrap_or(0);
        if invalid_nick(nick) {
            self.error_to(conn, &DirectoryError::InvalidNick);
            return;
        }
        let host = self
            .links
            .addr_of(conn)
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let user = UserInfo {
            nick: nick.to_string(),
            host: host.clone(),
            speed,
            conn: conn.clone(),
            local: true,
            shared: 0,
            lib_kb: 0,
        };
        if let Err(e) = self.users.add(user) {
            self.error_to(conn, &e);
            return;
        }
        self.conn_users.insert(conn.clone(), nick.to_string());
        self.links.set_class(conn, LinkClass::Client);
        self.links.send(
            conn,
            MSG_SERVER_LOGIN_ACK,
            format!("anon@{}", self.config.server_name),
        );
        self.links.broadcast_peers(
            None,
            MSG_SERVER_USER_JOINED,
            &format!("{nick} {host} {speed}"),
        );
        tracing::info!("{} logged in from {} at speed {}", nick, host, speed);
        self.reapply_library(nick);
    }

    fn peer_link(&mut self, conn: &ConnectionId, payload: &str) {
        match self.links.class_of(conn) {
            LinkClass::Client => {
                tracing::warn!("client sent a server-link frame, ignoring");
            }
            LinkClass::Unknown => {
                self.links.set_class(conn, LinkClass::Peer);
                tracing::info!("peer link established with {}", payload.trim());
                self.links
                    .send(conn, MSG_SERVER_LINK, self.config.server_name.clone());
                self.sync_users_to(conn);
            }
            LinkClass::Peer => {
                // the link we dialed confirmed itself; share our users now
                tracing::info!("peer link confirmed by {}", payload.trim());
                self.sync_users_to(conn);
            }
        }
    }

    /// Announce every locally-connected user to a freshly-linked peer, so it
    /// can resolve owner host and speed when relaying our search results.
    fn sync_users_to(&self, conn: &ConnectionId) {
        for user in self.users.iter() {
            if user.local {
                self.links.send(
                    conn,
                    MSG_SERVER_USER_JOINED,
                    format!("{} {} {}", user.nick, user.host, user.speed),
                );
            }
        }
    }

    fn user_joined(&mut self, conn: &ConnectionId, payload: &str) {
        if self.links.class_of(conn) != LinkClass::Peer {
            tracing::debug!("user announcement from non-peer, ignoring");
            return;
        }
        let fields = match split_fields(payload) {
            Ok(fields) if fields.len() == 3 => fields,
            _ => {
                tracing::debug!("malformed user announcement: {}", payload);
                return;
            }
        };
        let (nick, host) = (fields[0], fields[1]);
        let speed: u32 = fields[2].parse().unwrap_or(0);
        if let Some(existing) = self.users.get_mut(nick) {
            if existing.local {
                tracing::warn!("peer announced nick {} which is connected here", nick);
            } else {
                existing.host = host.to_string();
                existing.speed = speed;
                existing.conn = conn.clone();
            }
            return;
        }
        let _ = self.users.add(UserInfo {
            nick: nick.to_string(),
            host: host.to_string(),
            speed,
            conn: conn.clone(),
            local: false,
            shared: 0,
            lib_kb: 0,
        });
        tracing::debug!("learned remote user {} via peer {}", nick, conn.0);
    }

    fn user_parted(&mut self, conn: &ConnectionId, payload: &str) {
        if self.links.class_of(conn) != LinkClass::Peer {
            return;
        }
        let nick = payload.trim();
        let known_remote = self
            .users
            .get(nick)
            .is_some_and(|user| !user.local && user.conn == *conn);
        if known_remote {
            self.part_user(nick);
        }
    }

    // --- catalogue commands ---

    fn add_file(&mut self, conn: &ConnectionId, payload: &str) {
        let Some(nick) = self.conn_users.get(conn).cloned() else {
            self.error_to(conn, &DirectoryError::NotLoggedIn);
            return;
        };
        let fields = match split_fields(payload) {
            Ok(fields) => fields,
            Err(e) => {
                self.error_to(conn, &e);
                return;
            }
        };
        if fields.len() != 6 {
            tracing::debug!("add_file from {}: wrong number of fields", nick);
            self.error_to(conn, &DirectoryError::WrongFieldCount);
            return;
        }
        let size: u64 = fields[2].parse().unwrap_or(0);
        let bitrate: u32 = fields[3].parse().unwrap_or(0);
        let freq: u32 = fields[4].parse().unwrap_or(0);
        let duration: u32 = fields[5].parse().unwrap_or(0);
        if let Err(e) = self.insert_share(
            &nick,
            fields[0],
            fields[1],
            size,
            bitrate,
            freq,
            duration,
            ContentType::Mp3,
        ) {
            tracing::debug!("add_file from {}: {}", nick, e);
            self.error_to(conn, &e);
        }
    }

    fn share_typed_file(&mut self, conn: &ConnectionId, payload: &str) {
        let Some(nick) = self.conn_users.get(conn).cloned() else {
            self.error_to(conn, &DirectoryError::NotLoggedIn);
            return;
        };
        let fields = match split_fields(payload) {
            Ok(fields) => fields,
            Err(e) => {
                self.error_to(conn, &e);
                return;
            }
        };
        if fields.len() != 4 {
            tracing::debug!("share_file from {}: wrong number of fields", nick);
            self.error_to(conn, &DirectoryError::WrongFieldCount);
            return;
        }
        let Some(content_type) = ContentType::parse(fields[3]) else {
            self.error_to(conn, &DirectoryError::InvalidType(fields[3].to_string()));
            return;
        };
        let size: u64 = fields[1].parse().unwrap_or(0);
        if let Err(e) =
            self.insert_share(&nick, fields[0], fields[2], size, 0, 0, 0, content_type)
        {
            tracing::debug!("share_file from {}: {}", nick, e);
            self.error_to(conn, &e);
        }
    }

    fn remove_file(&mut self, conn: &ConnectionId, payload: &str) {
        let Some(nick) = self.conn_users.get(conn).cloned() else {
            self.error_to(conn, &DirectoryError::NotLoggedIn);
            return;
        };
        let fields = match split_fields(payload) {
            Ok(fields) => fields,
            Err(e) => {
                self.error_to(conn, &e);
                return;
            }
        };
        let Some(path) = fields.first() else {
            self.error_to(conn, &DirectoryError::WrongFieldCount);
            return;
        };
        let basename = split_path(path).1;
        self.remove_share(&nick, basename);
    }

    fn browse(&mut self, conn: &ConnectionId, payload: &str) {
        if self.conn_users.get(conn).is_none() {
            self.error_to(conn, &DirectoryError::NotLoggedIn);
            return;
        }
        let target = payload.trim().trim_matches('"');
        let Some(user) = self.users.get(target) else {
            self.error_to(conn, &DirectoryError::NoSuchUser(target.to_string()));
            return;
        };
        let nick = user.nick.clone();
        if let Some(table) = self.index.owner_files(&nick) {
            for &id in table.values() {
                if let Some(record) = self.index.record(id)
                    && record.valid
                {
                    self.links.send(
                        conn,
                        MSG_SERVER_BROWSE_RESPONSE,
                        format!(
                            "{} \"{}\" {} {} {} {} {}",
                            nick,
                            record.full_name(),
                            record.hash,
                            record.size,
                            record.bitrate_value(),
                            record.sample_rate_value(),
                            record.duration
                        ),
                    );
                }
            }
        }
        self.links.send(conn, MSG_SERVER_BROWSE_END, nick);
    }

    fn stats(&mut self, conn: &ConnectionId) {
        self.links.send(
            conn,
            MSG_SERVER_STATS,
            format!(
                "{} {} {}",
                self.users.len(),
                self.total_files,
                self.total_kb / (1024 * 1024)
            ),
        );
    }

    // --- searching ---

    fn client_search(&mut self, conn: &ConnectionId, payload: &str) {
        let Some(nick) = self.conn_users.get(conn).cloned() else {
            self.error_to(conn, &DirectoryError::NotLoggedIn);
            return;
        };
        self.run_search(conn, &nick, payload, None);
    }

    fn remote_search(&mut self, conn: &ConnectionId, payload: &str) {
        if self.links.class_of(conn) != LinkClass::Peer {
            tracing::debug!("remote search from non-peer, ignoring");
            return;
        }
        let Some((nick, rest)) = pop_field(payload) else {
            tracing::debug!("remote search: too few parameters");
            return;
        };
        let Some((id, clauses)) = pop_field(rest) else {
            tracing::debug!("remote search: too few parameters");
            return;
        };
        if self.users.get(nick).is_none() {
            // requester unknown here; report an empty contribution right away
            tracing::debug!("remote search: could not locate user {}", nick);
            self.links
                .send(conn, MSG_SERVER_REMOTE_SEARCH_END, id.to_string());
            return;
        }
        let (nick, id) = (nick.to_string(), id.to_string());
        self.run_search(conn, &nick, clauses, Some(id));
    }

    /// Evaluate a search locally, streaming matches back to the requester,
    /// then scatter the remaining capacity to peers if the local catalogue
    /// could not satisfy it. `remote_id` is set when the search was relayed
    /// from a peer, in which case that peer is excluded from the scatter.
    pub fn run_search(
        &mut self,
        conn: &ConnectionId,
        nick: &str,
        raw: &str,
        remote_id: Option<String>,
    ) {
        let from_peer = remote_id.is_some();
        let request = match SearchRequest::parse(raw, self.config.max_results) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("search from {} rejected: {}", nick, e);
                match &remote_id {
                    None => {
                        self.error_to(conn, &e);
                        self.send_search_end(conn, None);
                    }
                    // a relayed search still owes its peer an end marker
                    Some(id) => {
                        self.links
                            .send(conn, MSG_SERVER_REMOTE_SEARCH_END, id.clone())
                    }
                }
                return;
            }
        };

        let links = &self.links;
        let hits = match &remote_id {
            Some(id) => evaluate(&self.index, &self.users, &request, nick, |record, owner| {
                links.send(
                    conn,
                    MSG_SERVER_REMOTE_SEARCH_RESULT,
                    format!(
                        "{} {} \"{}\" {} {} {} {} {}",
                        id,
                        owner.nick,
                        record.full_name(),
                        record.hash,
                        record.size,
                        record.bitrate_value(),
                        record.sample_rate_value(),
                        record.duration
                    ),
                );
                true
            }),
            None => evaluate(&self.index, &self.users, &request, nick, |record, owner| {
                links.send(
                    conn,
                    MSG_SERVER_SEARCH_RESULT,
                    format!(
                        "\"{}\" {} {} {} {} {} {} {} {}",
                        record.full_name(),
                        record.hash,
                        record.size,
                        record.bitrate_value(),
                        record.sample_rate_value(),
                        record.duration,
                        owner.nick,
                        owner.host,
                        owner.speed
                    ),
                );
                true
            }),
        };

        let cap = request.max_results;
        let satisfied = cap > 0 && hits >= cap;
        let eligible = self
            .links
            .peer_count()
            .saturating_sub(usize::from(from_peer));
        if !satisfied && eligible > 0 {
            let id = remote_id.clone().unwrap_or_else(new_search_id);
            let remaining = if cap > 0 { cap - hits } else { 0 };
            let forwarded = forward_request(&request, remaining);
            self.searches.register(PendingSearch {
                id: id.clone(),
                conn: conn.clone(),
                requester_class: self.links.class_of(conn),
                nick: nick.to_string(),
                expected: eligible,
                received: 0,
            });
            self.links.broadcast_peers(
                from_peer.then_some(conn),
                MSG_SERVER_REMOTE_SEARCH,
                &format!("{nick} {id} {forwarded}"),
            );
            tracing::debug!(
                "search {} scattered to {} peers after {} local hits",
                id,
                eligible,
                hits
            );
        } else {
            self.send_search_end(conn, remote_id.as_deref());
        }
    }

    /// Relay a tagged partial result toward the original requester.
    pub fn handle_remote_result(&mut self, conn: &ConnectionId, payload: &str) {
        let fields = match split_fields(payload) {
            Ok(fields) if fields.len() == 8 => fields,
            Ok(_) => {
                tracing::debug!("remote result: wrong number of fields");
                return;
            }
            Err(e) => {
                tracing::debug!("remote result from {}: {}", conn.0, e);
                return;
            }
        };
        let id = fields[0];
        let Some(search) = self.searches.get(id) else {
            tracing::debug!("result for unknown search id {}", id);
            return;
        };
        match search.requester_class {
            LinkClass::Client => {
                // resolve the matching user for host and speed
                let Some(owner) = self.users.get(fields[1]) else {
                    tracing::debug!("remote result: could not find user {}", fields[1]);
                    return;
                };
                let line = format!(
                    "\"{}\" {} {} {} {} {} {} {} {}",
                    fields[2],
                    fields[3],
                    fields[4],
                    fields[5],
                    fields[6],
                    fields[7],
                    owner.nick,
                    owner.host,
                    owner.speed
                );
                self.links.send(&search.conn, MSG_SERVER_SEARCH_RESULT, line);
            }
            _ => {
                // relayed search: pass the tagged result upstream unchanged
                self.links.send(
                    &search.conn,
                    MSG_SERVER_REMOTE_SEARCH_RESULT,
                    payload.to_string(),
                );
            }
        }
    }

    /// Record a peer's end-of-search; finalizes once every scattered peer
    /// has reported or disconnected.
    pub fn handle_remote_end(&mut self, payload: &str) {
        let id = payload.trim();
        match self.searches.note_end(id) {
            EndOutcome::Unknown => tracing::debug!("end for unknown search id {}", id),
            EndOutcome::Pending => {}
            EndOutcome::Complete(search) => self.finalize_search(&search),
        }
    }

    fn finalize_search(&self, search: &PendingSearch) {
        match search.requester_class {
            LinkClass::Client => {
                self.links
                    .send(&search.conn, MSG_SERVER_SEARCH_END, String::new())
            }
            _ => self.links.send(
                &search.conn,
                MSG_SERVER_REMOTE_SEARCH_END,
                search.id.clone(),
            ),
        }
    }

    fn send_search_end(&self, conn: &ConnectionId, remote_id: Option<&str>) {
        match remote_id {
            None => self
                .links
                .send(conn, MSG_SERVER_SEARCH_END, String::new()),
            Some(id) => self
                .links
                .send(conn, MSG_SERVER_REMOTE_SEARCH_END, id.to_string()),
        }
    }

    // --- boundary operations ---

    /// Register one shared file for a known user, updating share statistics
    /// and the library snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_share(
        &mut self,
        owner: &str,
        path: &str,
        hash: &str,
        size: u64,
        bitrate: u32,
        sample_rate: u32,
        duration: u32,
        content_type: ContentType,
    ) -> Result<(), DirectoryError> {
        let local = {
            let Some(user) = self.users.get(owner) else {
                return Err(DirectoryError::NoSuchUser(owner.to_string()));
            };
            let max = self.config.max_shared;
            if max > 0 && user.shared >= max {
                return Err(DirectoryError::ShareLimit(max));
            }
            user.local
        };
        if bitrate > BITRATES[BITRATES.len() - 1] {
            tracing::warn!("{} reported bitrate {}, clamping", owner, bitrate);
        }
        if sample_rate > SAMPLE_RATES[SAMPLE_RATES.len() - 1] {
            tracing::warn!("{} reported sample rate {}, clamping", owner, sample_rate);
        }
        self.index.insert(
            owner,
            path,
            hash,
            size,
            bitrate,
            sample_rate,
            duration,
            content_type,
        )?;
        let kb = size / 1024;
        if let Some(user) = self.users.get_mut(owner) {
            user.shared += 1;
            user.lib_kb += kb;
        }
        self.total_files += 1;
        self.total_kb += kb;
        if local && let Some(library) = &mut self.library {
            library.record(SavedShare {
                owner: owner.to_string(),
                path: path.to_string(),
                hash: hash.to_string(),
                size,
                bitrate,
                sample_rate,
                duration,
                content_type,
            });
        }
        Ok(())
    }

    /// Withdraw one shared file by basename.
    pub fn remove_share(&mut self, owner: &str, basename: &str) {
        match self.index.remove(owner, basename) {
            Some(size) => {
                let kb = size / 1024;
                let mut local = false;
                if let Some(user) = self.users.get_mut(owner) {
                    user.shared = user.shared.saturating_sub(1);
                    user.lib_kb = user.lib_kb.saturating_sub(kb);
                    local = user.local;
                }
                self.total_files = self.total_files.saturating_sub(1);
                self.total_kb = self.total_kb.saturating_sub(kb);
                if local && let Some(library) = &mut self.library {
                    library.remove(owner, basename);
                }
            }
            None => tracing::debug!("{} removed unknown file {}", owner, basename),
        }
    }

    /// Connection teardown: cancels the affected pending searches, parts the
    /// users the connection carried, and invalidates their catalogues.
    pub fn handle_disconnect(&mut self, conn: &ConnectionId) {
        match self.links.class_of(conn) {
            LinkClass::Client => {
                let cancelled = self.searches.requester_down(conn);
                if cancelled > 0 {
                    tracing::debug!("cancelled {} searches for a leaving client", cancelled);
                }
                if let Some(nick) = self.conn_users.remove(conn) {
                    self.part_user(&nick);
                    self.links
                        .broadcast_peers(None, MSG_SERVER_USER_PARTED, &nick);
                    tracing::info!("{} disconnected", nick);
                }
            }
            LinkClass::Peer => {
                let outcome = self.searches.peer_down(conn);
                for search in &outcome.finalized {
                    tracing::debug!("sending final ack for search {}", search.id);
                    self.finalize_search(search);
                }
                if outcome.cancelled > 0 {
                    tracing::debug!(
                        "dropped {} searches requested by the lost peer",
                        outcome.cancelled
                    );
                }
                for nick in self.users.on_connection(conn) {
                    self.part_user(&nick);
                }
                tracing::info!("peer link {} closed", conn.0);
            }
            LinkClass::Unknown => {}
        }
        self.links.unregister(conn);
    }

    fn part_user(&mut self, nick: &str) {
        if let Some(user) = self.users.remove(nick) {
            self.total_files = self.total_files.saturating_sub(user.shared);
            self.total_kb = self.total_kb.saturating_sub(user.lib_kb);
        }
        // files are only marked dead here; the sweep unlinks the postings
        let (files, _) = self.index.drop_owner(nick);
        if files > 0 {
            tracing::debug!("{} invalidated {} shared files", nick, files);
        }
    }

    /// Timer entry point: sweep dead entries out of the posting tables.
    pub fn periodic_gc(&mut self) {
        tracing::debug!("collecting garbage");
        let reaped = self.index.collect();
        if reaped > 0 {
            tracing::info!("garbage collection reaped {} dead entries", reaped);
        }
    }

    /// Timer entry point: one-line health summary.
    pub fn log_stats(&self) {
        tracing::info!(
            "{} users, {} files ({} GB), {} peer links, {} searches pending",
            self.users.len(),
            self.total_files,
            self.total_kb / (1024 * 1024),
            self.links.peer_count(),
            self.searches.len()
        );
    }

    /// Timer entry point: persist the share library if it changed.
    pub fn flush_library(&mut self) {
        if let Some(library) = &mut self.library
            && library.is_dirty()
            && let Err(e) = library.flush()
        {
            tracing::warn!("library flush failed: {}", e);
        }
    }

    fn reapply_library(&mut self, nick: &str) {
        let Some(library) = &self.library else {
            return;
        };
        let Some(rows) = library.shares_for(nick) else {
            return;
        };
        let rows: Vec<SavedShare> = rows.to_vec();
        let mut restored = 0;
        for row in rows {
            if self
                .insert_share(
                    nick,
                    &row.path,
                    &row.hash,
                    row.size,
                    row.bitrate,
                    row.sample_rate,
                    row.duration,
                    row.content_type,
                )
                .is_ok()
            {
                restored += 1;
            }
        }
        if restored > 0 {
            tracing::info!("restored {} saved shares for {}", restored, nick);
        }
    }

    /// Error line to a directly-connected requester; peers never get these.
    fn error_to(&self, conn: &ConnectionId, error: &DirectoryError) {
        if self.links.class_of(conn) != LinkClass::Peer {
            self.links.send(conn, MSG_SERVER_NOSUCH, error.to_string());
        }
    }

    // --- inspection (used by the dispatcher loop and tests) ---

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn users(&self) -> &UserTable {
        &self.users
    }

    pub fn searches(&self) -> &RemoteSearches {
        &self.searches
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }
}

fn invalid_nick(nick: &str) -> bool {
    nick.is_empty()
        || nick.len() > MAX_NICK_LEN
        || nick
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == ':')
}
