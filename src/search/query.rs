use super::index::FileIndex;
use super::tokenizer::tokenize;
use super::types::{ContentType, FileId, FileRecord};
use crate::error::DirectoryError;
use crate::node::users::{UserInfo, UserTable};
use crate::protocol::split_fields;

/// Upper bound of the link-speed scale clients report at login.
pub const MAX_SPEED: u32 = 10;
const MAX_BITRATE: u32 = 0xffff;
const MAX_FREQUENCY: u32 = 0xffff;

/// A parsed search: AND-ed filename tokens plus field filters.
///
/// Clause grammar (fields are space-separated, quoted segments keep their
/// spaces):
///
/// ```text
/// FILENAME CONTAINS "<words>"        repeatable, ANDed together
/// MAX_RESULTS <n>                    0 means "no explicit cap"
/// TYPE <mp3|audio|video|application|image|text|any>
/// BITRATE   {"AT LEAST"|"AT MOST"|"EQUAL TO"} <n>
/// FREQ      {"AT LEAST"|"AT MOST"|"EQUAL TO"} <n>
/// LINESPEED {"AT LEAST"|"AT MOST"|"EQUAL TO"} <n>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub tokens: Vec<String>,
    /// 0 means unlimited (possible only when the server-wide cap is 0 too).
    pub max_results: usize,
    pub min_bitrate: u32,
    pub max_bitrate: u32,
    pub min_freq: u32,
    pub max_freq: u32,
    pub min_speed: u32,
    pub max_speed: u32,
    /// `None` matches any type; the default is mp3.
    pub content_type: Option<ContentType>,
}

impl SearchRequest {
    fn with_cap(cap: usize) -> Self {
        Self {
            tokens: Vec::new(),
            max_results: cap,
            min_bitrate: 0,
            max_bitrate: MAX_BITRATE,
            min_freq: 0,
            max_freq: MAX_FREQUENCY,
            min_speed: 0,
            max_speed: MAX_SPEED,
            content_type: Some(ContentType::Mp3),
        }
    }

    /// Parse a raw clause string. `server_cap` is the server-wide result
    /// limit (0 = unlimited); explicit MAX_RESULTS values are clamped to it
    /// and `MAX_RESULTS 0` falls back to it.
    pub fn parse(raw: &str, server_cap: usize) -> Result<Self, DirectoryError> {
        let fields = split_fields(raw)?;
        let mut request = Self::with_cap(server_cap);
        let mut i = 0;
        while i < fields.len() {
            let field = fields[i];
            if field.eq_ignore_ascii_case("filename") {
                i += 1;
                if fields
                    .get(i)
                    .is_none_or(|f| !f.eq_ignore_ascii_case("contains"))
                {
                    return Err(DirectoryError::MalformedSearch);
                }
                i += 1;
                let words = fields.get(i).ok_or(DirectoryError::MalformedSearch)?;
                // multiple FILENAME CONTAINS clauses are an implicit AND
                request.tokens.extend(tokenize(words));
            } else if field.eq_ignore_ascii_case("max_results") {
                i += 1;
                let n: usize = fields
                    .get(i)
                    .ok_or(DirectoryError::MalformedSearch)?
                    .parse()
                    .unwrap_or(0);
                if n == 0 {
                    request.max_results = server_cap;
                } else if server_cap > 0 && n > server_cap {
                    tracing::debug!("client requested a maximum of {} results", n);
                    request.max_results = server_cap;
                } else {
                    request.max_results = n;
                }
            } else if field.eq_ignore_ascii_case("type") {
                i += 1;
                let name = fields.get(i).ok_or(DirectoryError::MalformedSearch)?;
                if name.eq_ignore_ascii_case("any") {
                    request.content_type = None;
                } else {
                    request.content_type = Some(
                        ContentType::parse(name)
                            .ok_or_else(|| DirectoryError::InvalidType(name.to_string()))?,
                    );
                }
            } else if field.eq_ignore_ascii_case("bitrate")
                || field.eq_ignore_ascii_case("freq")
                || field.eq_ignore_ascii_case("linespeed")
            {
                if i + 2 >= fields.len() {
                    return Err(DirectoryError::NotEnoughParameters);
                }
                let comparison = fields[i + 1];
                let n: u32 = fields[i + 2].parse().unwrap_or(0);
                let (min, max) = if field.eq_ignore_ascii_case("bitrate") {
                    (&mut request.min_bitrate, &mut request.max_bitrate)
                } else if field.eq_ignore_ascii_case("freq") {
                    (&mut request.min_freq, &mut request.max_freq)
                } else {
                    (&mut request.min_speed, &mut request.max_speed)
                };
                match comparison.to_ascii_lowercase().as_str() {
                    "at least" => *min = n,
                    "at most" => *max = n,
                    "equal to" => {
                        *min = n;
                        *max = n;
                    }
                    _ => {
                        return Err(DirectoryError::UnknownComparison(comparison.to_string()));
                    }
                }
                i += 2;
            } else {
                tracing::debug!("unknown search field: {}", field);
                return Err(DirectoryError::MalformedSearch);
            }
            i += 1;
        }
        Ok(request)
    }
}

/// Evaluate a search against the local catalogue, streaming matches into
/// `sink` synchronously. The sink reports whether it accepted the match;
/// accepted matches count toward the cap. Returns the accepted count.
///
/// A record matches when it is live, its full filename contains every token
/// as a case-insensitive substring, its owner is not the requester, and
/// bitrate / sample rate / owner link speed / content type pass the request
/// filters.
pub fn evaluate<F>(
    index: &FileIndex,
    users: &UserTable,
    request: &SearchRequest,
    requester: &str,
    mut sink: F,
) -> usize
where
    F: FnMut(&FileRecord, &UserInfo) -> bool,
{
    // The smallest posting list drives the scan; a token with no posting
    // list at all means no file can match, without touching another list.
    let mut driver: Option<&[FileId]> = None;
    for token in &request.tokens {
        let Some(list) = index.posting(token) else {
            return 0;
        };
        if driver.is_none_or(|d| list.len() < d.len()) {
            driver = Some(list);
        }
    }
    let Some(driver) = driver else {
        return 0;
    };

    let mut hits = 0;
    for &id in driver {
        let Some(record) = index.record(id) else {
            continue;
        };
        if !record.valid {
            continue;
        }
        let full = record.full_name().to_lowercase();
        if !request.tokens.iter().all(|t| full.contains(t.as_str())) {
            continue;
        }
        // a user never matches their own files
        if record.owner.eq_ignore_ascii_case(requester) {
            continue;
        }
        let Some(owner) = users.get(&record.owner) else {
            continue;
        };
        let bitrate = record.bitrate_value();
        if bitrate < request.min_bitrate || bitrate > request.max_bitrate {
            continue;
        }
        let freq = record.sample_rate_value();
        if freq < request.min_freq || freq > request.max_freq {
            continue;
        }
        if owner.speed < request.min_speed || owner.speed > request.max_speed {
            continue;
        }
        if let Some(wanted) = request.content_type
            && record.content_type != wanted
        {
            continue;
        }
        if sink(record, owner) {
            hits += 1;
            if request.max_results > 0 && hits == request.max_results {
                break;
            }
        }
    }
    hits
}

/// Rebuild the clause string for scattering a partially-satisfied search to
/// peers, with the remaining capacity substituted for MAX_RESULTS.
pub fn forward_request(request: &SearchRequest, remaining: usize) -> String {
    let mut out = String::from("FILENAME CONTAINS \"");
    for token in &request.tokens {
        out.push_str(token);
        out.push(' ');
    }
    out.push('"');
    out.push_str(&format!(" MAX_RESULTS {remaining}"));
    match request.content_type {
        Some(ContentType::Mp3) => {}
        Some(other) => out.push_str(&format!(" TYPE {other}")),
        None => out.push_str(" TYPE any"),
    }
    qualifier(&mut out, "BITRATE", request.min_bitrate, request.max_bitrate, MAX_BITRATE);
    qualifier(&mut out, "FREQ", request.min_freq, request.max_freq, MAX_FREQUENCY);
    qualifier(&mut out, "LINESPEED", request.min_speed, request.max_speed, MAX_SPEED);
    out
}

fn qualifier(out: &mut String, attr: &str, min: u32, max: u32, hard_max: u32) {
    if min > 0 {
        let comparison = if min == max { "EQUAL TO" } else { "AT LEAST" };
        out.push_str(&format!(" {attr} \"{comparison}\" {min}"));
    } else if max < hard_max {
        out.push_str(&format!(" {attr} \"AT MOST\" {max}"));
    }
}
