use super::types::ConnectionId;
use crate::error::DirectoryError;
use std::collections::HashMap;

/// One user visible in the overlay: a locally-connected client, or a remote
/// user learned from a peer's join announcement. Remote users are needed to
/// resolve the owner host and link speed of scattered search results.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub nick: String,
    pub host: String,
    pub speed: u32,
    /// The client's own connection, or the peer link this user came from.
    pub conn: ConnectionId,
    pub local: bool,
    pub shared: usize,
    pub lib_kb: u64,
}

/// Every known user, keyed case-insensitively by nick.
#[derive(Default)]
pub struct UserTable {
    users: HashMap<String, UserInfo>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, info: UserInfo) -> Result<(), DirectoryError> {
        let key = info.nick.to_ascii_lowercase();
        if self.users.contains_key(&key) {
            return Err(DirectoryError::NickTaken);
        }
        self.users.insert(key, info);
        Ok(())
    }

    pub fn get(&self, nick: &str) -> Option<&UserInfo> {
        self.users.get(&nick.to_ascii_lowercase())
    }

    pub fn get_mut(&mut self, nick: &str) -> Option<&mut UserInfo> {
        self.users.get_mut(&nick.to_ascii_lowercase())
    }

    pub fn remove(&mut self, nick: &str) -> Option<UserInfo> {
        self.users.remove(&nick.to_ascii_lowercase())
    }

    /// Nicks owned by one connection: a client's own user, or every remote
    /// user learned from a given peer link.
    pub fn on_connection(&self, conn: &ConnectionId) -> Vec<String> {
        self.users
            .values()
            .filter(|user| &user.conn == conn)
            .map(|user| user.nick.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserInfo> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
