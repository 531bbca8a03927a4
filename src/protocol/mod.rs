//! Wire protocol for the directory overlay.
//!
//! Every message is a small binary frame: a 2-byte little-endian payload
//! length, a 2-byte little-endian numeric tag, then `length` bytes of
//! argument text. Arguments are space-separated; a field that begins with a
//! double quote runs to the closing quote and may contain spaces.
//!
//! Tags below 10000 are exchanged with clients; the 10000+ range is reserved
//! for node-to-node traffic.

use crate::error::DirectoryError;

/// Size of the length + tag frame header.
pub const HEADER_LEN: usize = 4;

// --- Client commands ---

/// `<nick> <pass> <port> "<client-info>" <speed>` — register a session.
pub const MSG_CLIENT_LOGIN: u16 = 2;
/// Login acknowledgment sent back to the client.
pub const MSG_SERVER_LOGIN_ACK: u16 = 3;
/// `"<filename>" <md5> <size> <bitrate> <freq> <duration>` — share an mp3.
pub const MSG_CLIENT_ADD_FILE: u16 = 100;
/// `"<filename>"` — withdraw a shared file.
pub const MSG_CLIENT_REMOVE_FILE: u16 = 102;
/// Search request; see the clause grammar in `search::query`.
pub const MSG_CLIENT_SEARCH: u16 = 200;
/// `"<filename>" <md5> <size> <bitrate> <freq> <duration> <nick> <host> <speed>`
pub const MSG_SERVER_SEARCH_RESULT: u16 = 201;
/// Empty payload; terminates a result stream.
pub const MSG_SERVER_SEARCH_END: u16 = 202;
/// `<nick>` — list one user's catalogue.
pub const MSG_CLIENT_BROWSE: u16 = 211;
/// `<nick> "<filename>" <md5> <size> <bitrate> <freq> <duration>`
pub const MSG_SERVER_BROWSE_RESPONSE: u16 = 212;
/// `<nick>` — terminates a browse stream.
pub const MSG_SERVER_BROWSE_END: u16 = 213;
/// Reply: `<users> <files> <gigs>`.
pub const MSG_SERVER_STATS: u16 = 214;
/// Error line shown to the client.
pub const MSG_SERVER_NOSUCH: u16 = 404;
/// `"<filename>" <size> <md5> <type>` — share with an explicit content type.
pub const MSG_CLIENT_SHARE_FILE: u16 = 10300;

// --- Node-to-node messages ---

/// `<server-name>` — classifies the connection as a peer link.
pub const MSG_SERVER_LINK: u16 = 10010;
/// `<nick> <host> <speed>` — a user appeared on the sending node.
pub const MSG_SERVER_USER_JOINED: u16 = 10012;
/// `<nick>` — a user left the sending node.
pub const MSG_SERVER_USER_PARTED: u16 = 10013;
/// `<nick> <id> <clauses>` — scatter a search to a peer.
pub const MSG_SERVER_REMOTE_SEARCH: u16 = 10015;
/// `<id> <nick> "<filename>" <md5> <size> <bitrate> <freq> <duration>`
pub const MSG_SERVER_REMOTE_SEARCH_RESULT: u16 = 10016;
/// `<id>` — a peer finished evaluating the identified search.
pub const MSG_SERVER_REMOTE_SEARCH_END: u16 = 10017;

/// Encode one outbound frame.
pub fn encode_frame(tag: u16, payload: &str) -> Vec<u8> {
    let body = payload.as_bytes();
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
    frame.extend_from_slice(&tag.to_le_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Decode a frame header into (payload length, tag).
pub fn decode_header(header: [u8; HEADER_LEN]) -> (usize, u16) {
    let len = u16::from_le_bytes([header[0], header[1]]) as usize;
    let tag = u16::from_le_bytes([header[2], header[3]]);
    (len, tag)
}

/// Split an argument string into fields. Quoted fields keep their internal
/// spaces and drop the quotes.
pub fn split_fields(line: &str) -> Result<Vec<&str>, DirectoryError> {
    let mut fields = Vec::new();
    let mut rest = line;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return Ok(fields);
        }
        if let Some(body) = rest.strip_prefix('"') {
            match body.find('"') {
                Some(end) => {
                    fields.push(&body[..end]);
                    rest = &body[end + 1..];
                }
                None => return Err(DirectoryError::UnterminatedQuote),
            }
        } else {
            let end = rest.find(' ').unwrap_or(rest.len());
            fields.push(&rest[..end]);
            rest = &rest[end..];
        }
    }
}

/// Pop the first space-separated field off an argument string, returning the
/// field and the remainder. Used for headers (nick, search id) that precede
/// a quoted clause body.
pub fn pop_field(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start_matches(' ');
    if line.is_empty() {
        return None;
    }
    match line.find(' ') {
        Some(at) => Some((&line[..at], &line[at + 1..])),
        None => Some((line, "")),
    }
}
