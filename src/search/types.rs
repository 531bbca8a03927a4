use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Closed set of content-type tags a shared file can carry. `Mp3` is its own
/// tag, distinct from generic `Audio`, because mp3 shares arrive through the
/// plain add-file command and carry encoding metadata the other types lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Mp3,
    Audio,
    Video,
    Application,
    Image,
    Text,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Mp3 => "mp3",
            ContentType::Audio => "audio",
            ContentType::Video => "video",
            ContentType::Application => "application",
            ContentType::Image => "image",
            ContentType::Text => "text",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Some(ContentType::Mp3),
            "audio" => Some(ContentType::Audio),
            "video" => Some(ContentType::Video),
            "application" => Some(ContentType::Application),
            "image" => Some(ContentType::Image),
            "text" => Some(ContentType::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard mp3 encoding bitrates, kbit/s. Shared bitrates are normalized to
/// the nearest table value at or above the reported number.
pub const BITRATES: [u32; 18] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

/// Standard sample rates, Hz.
pub const SAMPLE_RATES: [u32; 9] = [
    0, 8000, 11025, 16000, 22050, 24000, 32000, 44100, 48000,
];

fn class_at_or_above(table: &[u32], n: u32) -> u8 {
    table
        .iter()
        .position(|&v| v >= n)
        .unwrap_or(table.len() - 1) as u8
}

/// Class index of the nearest standard bitrate at or above `n`; values past
/// the top of the table clamp to the highest class.
pub fn bitrate_class(n: u32) -> u8 {
    class_at_or_above(&BITRATES, n)
}

/// Class index of the nearest standard sample rate at or above `n`.
pub fn sample_rate_class(n: u32) -> u8 {
    class_at_or_above(&SAMPLE_RATES, n)
}

/// Stable, generation-checked handle into the [`FileStore`] arena. A handle
/// outlives the record it pointed at only inside posting lists awaiting
/// garbage collection; the generation check turns such stale handles into
/// `None` lookups instead of aliased records.
///
/// [`FileStore`]: crate::search::index::FileStore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

/// Indexed metadata for one shared file.
///
/// Reachable from exactly `refcount` index structures: the owner table, up
/// to [`MAX_FILE_TOKENS`] word posting lists, and (when enabled) the hash
/// table. `valid == false` means logically deleted, pending reclamation by
/// the next garbage-collection sweep.
///
/// [`MAX_FILE_TOKENS`]: crate::search::index::MAX_FILE_TOKENS
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub basename: String,
    /// Shared by reference: one allocation per distinct directory.
    pub directory: Arc<str>,
    pub owner: String,
    pub hash: String,
    pub size: u64,
    /// Class index into [`BITRATES`].
    pub bitrate: u8,
    /// Class index into [`SAMPLE_RATES`].
    pub sample_rate: u8,
    pub duration: u32,
    pub content_type: ContentType,
    pub(crate) refcount: u32,
    pub(crate) valid: bool,
}

impl FileRecord {
    /// The full shared path as the owner announced it.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.directory, self.basename)
    }

    pub fn bitrate_value(&self) -> u32 {
        BITRATES[self.bitrate as usize]
    }

    pub fn sample_rate_value(&self) -> u32 {
        SAMPLE_RATES[self.sample_rate as usize]
    }

    pub fn is_live(&self) -> bool {
        self.valid
    }
}

/// Split a shared path into (directory prefix, basename). The prefix keeps
/// its trailing separator so the full name is a plain concatenation. Both
/// separator conventions occur in the wild since clients report native
/// paths.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\']) {
        Some(at) => (&path[..at + 1], &path[at + 1..]),
        None => ("", path),
    }
}
