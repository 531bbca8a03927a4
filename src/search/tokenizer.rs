use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

// A word is a maximal run of alphanumerics; apostrophes belong to the word
// since they carry no meaning on their own.
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9']+").unwrap());

// Common English words plus path fragments ("mp3", "music", drive letters)
// that appear in so many shared paths they cannot narrow a search. The
// garbage collector reports oversized posting lists, which is where new
// candidates for this list come from.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "a", "i", "the", "and", "in", "of", "you", "me", "to", "on", "my", "new",
        "mp3", "mp3s", "mp3's", "c", "d", "e", "2", "napster", "music", "program",
        "files", "windows", "songs", "desktop", "documents", "rock", "winamp",
        "scour", "media", "agent", "stuff",
    ])
});

/// Split `text` into distinct lowercase word tokens, preserving first-seen
/// order. Stop words and punctuation are dropped. Pure function; empty input
/// yields an empty vector.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut tokens = Vec::new();
    for word in WORD.find_iter(&lowered) {
        let word = word.as_str();
        if STOP_WORDS.contains(word) {
            continue;
        }
        if seen.insert(word) {
            tokens.push(word.to_string());
        }
    }
    tokens
}
