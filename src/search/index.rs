use super::tokenizer::tokenize;
use super::types::{
    bitrate_class, sample_rate_class, ContentType, FileId, FileRecord, split_path,
};
use crate::error::DirectoryError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A record is indexed under at most this many word tokens. Filenames that
/// tokenize longer keep their *last* tokens, since trailing words are
/// usually the most specific part of a path.
pub const MAX_FILE_TOKENS: usize = 30;

/// Posting lists at or above this size are reported during garbage
/// collection; their tokens are candidates for the stop-word list.
const LARGE_LIST_THRESHOLD: usize = 5000;

#[derive(Default)]
struct Slot {
    generation: u32,
    record: Option<FileRecord>,
}

/// Arena that is the sole owner of every [`FileRecord`]. Posting lists and
/// owner tables hold [`FileId`] handles; a slot is vacated only once its
/// record's reference count reaches zero, and the generation bump turns any
/// handle still in flight into a dead lookup.
#[derive(Default)]
pub struct FileStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl FileStore {
    fn insert(&mut self, record: FileRecord) -> FileId {
        match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.record = Some(record);
                FileId {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    record: Some(record),
                });
                FileId {
                    slot,
                    generation: 0,
                }
            }
        }
    }

    pub fn get(&self, id: FileId) -> Option<&FileRecord> {
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_ref()
    }

    fn get_mut(&mut self, id: FileId) -> Option<&mut FileRecord> {
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_mut()
    }

    fn release(&mut self, id: FileId) {
        let slot = &mut self.slots[id.slot as usize];
        if slot.generation == id.generation && slot.record.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.slot);
        }
    }

    /// Drop one reference; vacates the slot at refcount zero.
    fn unref(&mut self, id: FileId) {
        let emptied = match self.get_mut(id) {
            Some(record) => {
                record.refcount = record.refcount.saturating_sub(1);
                record.refcount == 0
            }
            None => false,
        };
        if emptied {
            self.release(id);
        }
    }

    /// Number of occupied slots, live or pending reclamation.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The local catalogue: a record arena plus three token-keyed tables.
///
/// - `words`: token -> posting list over every shared filename.
/// - `hashes`: content hash -> posting list (optional, for duplicate-content
///   lookups).
/// - `owners`: per-user basename -> record table enforcing filename
///   uniqueness per owner.
///
/// Removal is asymmetric: owner-table delisting is eager, word/hash
/// delisting is deferred to [`FileIndex::collect`]. A heavy sharer
/// disconnecting therefore costs O(their files), not O(their postings).
pub struct FileIndex {
    store: FileStore,
    words: HashMap<String, Vec<FileId>>,
    hashes: HashMap<String, Vec<FileId>>,
    owners: HashMap<String, HashMap<String, FileId>>,
    directories: HashSet<Arc<str>>,
    index_hashes: bool,
}

impl FileIndex {
    pub fn new(index_hashes: bool) -> Self {
        Self {
            store: FileStore::default(),
            words: HashMap::new(),
            hashes: HashMap::new(),
            owners: HashMap::new(),
            directories: HashSet::new(),
            index_hashes,
        }
    }

    /// Register a shared file. Bitrate and sample rate are raw values as the
    /// client reported them; they are snapped to their encoding class here.
    /// Rejects a basename the owner already shares without touching any
    /// posting list.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        owner: &str,
        path: &str,
        hash: &str,
        size: u64,
        bitrate: u32,
        sample_rate: u32,
        duration: u32,
        content_type: ContentType,
    ) -> Result<FileId, DirectoryError> {
        let (dir, base) = split_path(path);
        let owner_key = owner.to_ascii_lowercase();
        if let Some(table) = self.owners.get(&owner_key)
            && table.contains_key(base)
        {
            return Err(DirectoryError::DuplicateFile);
        }

        let mut tokens = tokenize(path);
        let skip = tokens.len().saturating_sub(MAX_FILE_TOKENS);
        if skip > 0 {
            tokens.drain(..skip);
        }

        // One reference per index structure the record lands in.
        let refcount = 1 + tokens.len() as u32 + u32::from(self.index_hashes);
        let record = FileRecord {
            basename: base.to_string(),
            directory: self.intern_directory(dir),
            owner: owner.to_string(),
            hash: hash.to_string(),
            size,
            bitrate: bitrate_class(bitrate),
            sample_rate: sample_rate_class(sample_rate),
            duration,
            content_type,
            refcount,
            valid: true,
        };
        let id = self.store.insert(record);

        self.owners
            .entry(owner_key)
            .or_default()
            .insert(base.to_string(), id);
        for token in tokens {
            self.words.entry(token).or_default().push(id);
        }
        if self.index_hashes {
            self.hashes
                .entry(hash.to_ascii_lowercase())
                .or_default()
                .push(id);
        }
        Ok(id)
    }

    /// Withdraw one shared file. The owner table entry goes away now; word
    /// and hash postings linger until the next sweep. Returns the file size
    /// for the caller's statistics, or `None` if nothing was shared under
    /// that basename.
    pub fn remove(&mut self, owner: &str, basename: &str) -> Option<u64> {
        let owner_key = owner.to_ascii_lowercase();
        let table = self.owners.get_mut(&owner_key)?;
        let id = table.remove(basename)?;
        if table.is_empty() {
            self.owners.remove(&owner_key);
        }
        let mut size = None;
        if let Some(record) = self.store.get_mut(id) {
            record.valid = false;
            size = Some(record.size);
        }
        self.store.unref(id);
        size
    }

    /// Invalidate every file an owner shares, destroying their table. The
    /// stale postings are reaped by the next [`FileIndex::collect`] pass.
    /// Returns (files invalidated, bytes they covered).
    pub fn drop_owner(&mut self, owner: &str) -> (usize, u64) {
        let Some(table) = self.owners.remove(&owner.to_ascii_lowercase()) else {
            return (0, 0);
        };
        let mut files = 0;
        let mut bytes = 0;
        for id in table.into_values() {
            if let Some(record) = self.store.get_mut(id) {
                record.valid = false;
                files += 1;
                bytes += record.size;
            }
            self.store.unref(id);
        }
        (files, bytes)
    }

    /// Sweep every posting list, unlinking entries whose record is no longer
    /// live and destroying lists that become empty. This is the only place
    /// word/hash posting memory referencing dead records is reclaimed.
    /// Returns the number of entries reaped.
    pub fn collect(&mut self) -> usize {
        let mut reaped = sweep(&mut self.words, &mut self.store);
        reaped += sweep(&mut self.hashes, &mut self.store);
        reaped
    }

    /// Posting list for one word token, if any file contains it.
    pub fn posting(&self, token: &str) -> Option<&[FileId]> {
        self.words.get(token).map(Vec::as_slice)
    }

    pub fn record(&self, id: FileId) -> Option<&FileRecord> {
        self.store.get(id)
    }

    /// The basename table of one owner, if they share anything.
    pub fn owner_files(&self, owner: &str) -> Option<&HashMap<String, FileId>> {
        self.owners.get(&owner.to_ascii_lowercase())
    }

    /// Live records sharing a content hash. Empty when hash indexing is off.
    pub fn lookup_hash(&self, hash: &str) -> impl Iterator<Item = &FileRecord> {
        self.hashes
            .get(&hash.to_ascii_lowercase())
            .into_iter()
            .flatten()
            .filter_map(|&id| self.store.get(id))
            .filter(|record| record.valid)
    }

    /// Occupied arena slots (live records plus those pending reclamation).
    pub fn stored_records(&self) -> usize {
        self.store.len()
    }

    fn intern_directory(&mut self, dir: &str) -> Arc<str> {
        match self.directories.get(dir) {
            Some(shared) => Arc::clone(shared),
            None => {
                let shared: Arc<str> = Arc::from(dir);
                self.directories.insert(Arc::clone(&shared));
                shared
            }
        }
    }
}

fn sweep(table: &mut HashMap<String, Vec<FileId>>, store: &mut FileStore) -> usize {
    let mut reaped = 0;
    table.retain(|token, list| {
        if list.len() >= LARGE_LIST_THRESHOLD {
            tracing::warn!(
                "posting list for \"{}\" exceeds {} entries",
                token,
                LARGE_LIST_THRESHOLD
            );
        }
        list.retain(|&id| {
            let live = store.get(id).is_some_and(|record| record.valid);
            if !live {
                store.unref(id);
                reaped += 1;
            }
            live
        });
        !list.is_empty()
    });
    reaped
}
