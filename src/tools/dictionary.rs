//! Dual-indexed string table for LZW coding.
//!
//! The table stores strings as (prefix code, trailing byte) pairs that
//! chain back to the empty prefix. Lookups have to be fast in both
//! directions: the encoder searches by (prefix, byte) to extend a match,
//! while the decoder searches by code to walk a chain. We keep a dense
//! array indexed by code next to an open-addressed hash index over
//! (prefix, byte) with linear probing, the same shape on both sides so the
//! two stay in lockstep.
//!
//! Codes below `FIRST_CODE` are controls that travel in-band with the data
//! codes and never name a table entry.

use crate::tools::recency::Recency;

/// announces a literal byte that has no code yet, followed by 8 raw bits
pub const ESCAPE_CODE: usize = 0;
/// announces that the code width increases by one, sent at the old width
pub const GROW_CODE: usize = 1;
/// announces that the table has been pruned and rebuilt
pub const PRUNE_CODE: usize = 2;
/// announces the end of the code stream
pub const STOP_CODE: usize = 3;
/// codes below this are reserved for controls, table entries start here
pub const FIRST_CODE: usize = 4;

/// The prefix of a table entry: another entry's code, or nothing for a
/// single byte string. Keeping this a variant rather than a reserved
/// integer keeps the control codes out of the prefix namespace.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum Prefix {
    Empty,
    Code(usize)
}

impl Prefix {
    /// numeric key used by the hash index, the empty prefix keys as 0
    fn key(&self) -> usize {
        match self {
            Prefix::Empty => 0,
            Prefix::Code(c) => *c
        }
    }
}

/// One string in the table: the string named by `prefix` extended by `k`.
#[derive(Clone,Copy)]
pub struct Entry {
    pub prefix: Prefix,
    pub k: u8,
    pub code: usize
}

/// The string table itself. Entries are only ever appended; the whole
/// table is replaced at once when a prune rebuilds it.
pub struct Dictionary {
    /// dense store, the entry with code c sits at index c - FIRST_CODE
    entries: Vec<Entry>,
    /// hash slots hold codes into `entries`, None marks a free slot
    hash: Vec<Option<usize>>,
    /// maximum number of codes, 1 << max_bits
    capacity: usize,
    /// whether the stream uses escapes, meaning the table starts empty
    escape: bool
}

impl Dictionary {
    /// Allocate a table that can hold `1 << max_bits` codes. Without
    /// escapes every single byte string gets a code up front, in byte
    /// order, so both sides assign them identically.
    pub fn new(max_bits: usize,escape: bool) -> Self {
        Self::with_capacity(1 << max_bits,escape)
    }
    fn with_capacity(capacity: usize,escape: bool) -> Self {
        let mut table = Self {
            entries: Vec::new(),
            hash: vec![None;capacity * 2 + 1],
            capacity,
            escape
        };
        if !escape {
            for k in 0..=255 {
                table.add(Prefix::Empty,k);
            }
        }
        table
    }
    /// code of the newest entry, FIRST_CODE - 1 when the table is empty
    pub fn highest_code(&self) -> usize {
        FIRST_CODE - 1 + self.entries.len()
    }
    pub fn is_full(&self) -> bool {
        self.highest_code() == self.capacity - 1
    }
    fn hash_index(&self,prefix: Prefix,k: u8) -> usize {
        (prefix.key() << 8 | k as usize) % self.hash.len()
    }
    /// Insert the string (prefix, k). Returns the entry's code paired with
    /// whether a new entry was created: an existing pair returns its old
    /// code, and a full table returns (0, false) without mutating.
    pub fn add(&mut self,prefix: Prefix,k: u8) -> (usize,bool) {
        if let Some(e) = self.find_by_pair(prefix,k) {
            return (e.code,false);
        }
        if self.is_full() {
            return (0,false);
        }
        let code = self.highest_code() + 1;
        self.entries.push(Entry { prefix, k, code });
        // the hash always has free slots since it holds 2x capacity + 1
        let mut idx = self.hash_index(prefix,k);
        while self.hash[idx].is_some() {
            idx = (idx + 1) % self.hash.len();
        }
        self.hash[idx] = Some(code);
        (code,true)
    }
    /// find an entry by its (prefix, byte) pair
    pub fn find_by_pair(&self,prefix: Prefix,k: u8) -> Option<Entry> {
        let mut idx = self.hash_index(prefix,k);
        while let Some(code) = self.hash[idx] {
            let e = self.entries[code - FIRST_CODE];
            if e.prefix == prefix && e.k == k {
                return Some(e);
            }
            idx = (idx + 1) % self.hash.len();
        }
        None
    }
    /// find an entry by its code, control codes have no entry
    pub fn find_by_code(&self,code: usize) -> Option<Entry> {
        if code < FIRST_CODE || code > self.highest_code() {
            None
        } else {
            Some(self.entries[code - FIRST_CODE])
        }
    }
    /// Rebuild the table, keeping only entries observed within the last
    /// `window` observations. The live tracker is reset and retention is
    /// judged against its pre-prune values, comparing with the same
    /// unsigned arithmetic on both sides. An entry whose prefix was not
    /// itself retained still pulls the whole chain in, since the chain is
    /// reachable through it. Codes are reassigned in ascending order of
    /// their old values, so encoder and decoder rebuild identical tables.
    /// If `pending` names an old code that survives, it is rewritten to
    /// the entry's new code.
    pub fn prune(&self,recency: &mut Recency,window: u64,pending: &mut Prefix) -> Dictionary {
        let old_seen = recency.reset();
        let horizon = recency.counter().wrapping_sub(window);
        let mut rebuilt = Dictionary::with_capacity(self.capacity,self.escape);
        for code in FIRST_CODE..=self.highest_code() {
            if old_seen[code] > horizon {
                let entry = self.find_by_code(code).unwrap(); // in range by the loop bounds
                let new_code = rebuilt.readd_chain(self,entry,&old_seen,recency);
                if *pending == Prefix::Code(code) {
                    *pending = Prefix::Code(new_code);
                }
            }
        }
        log::debug!("rebuilt table keeps {} of {} entries",rebuilt.entries.len(),self.entries.len());
        rebuilt
    }
    /// re-add an old entry and all its prefixes, carrying their recency
    /// over, and return the entry's code in the rebuilt table
    fn readd_chain(&mut self,old: &Dictionary,entry: Entry,old_seen: &[u64],recency: &mut Recency) -> usize {
        let prefix = match entry.prefix {
            Prefix::Empty => Prefix::Empty,
            Prefix::Code(c) => {
                let parent = old.find_by_code(c).unwrap(); // chains only reference real entries
                Prefix::Code(self.readd_chain(old,parent,old_seen,recency))
            }
        };
        let (code,_) = self.add(prefix,entry.k);
        recency.carry(code,old_seen[entry.code]);
        code
    }
}

// *************** TESTS *****************

#[test]
fn single_bytes_preloaded() {
    let table = Dictionary::new(12,false);
    assert_eq!(table.highest_code(),FIRST_CODE - 1 + 256);
    let e = table.find_by_pair(Prefix::Empty,0x41).expect("missing entry");
    assert_eq!(e.code,FIRST_CODE + 0x41);
    assert!(table.find_by_code(STOP_CODE).is_none());
}

#[test]
fn escape_table_starts_empty() {
    let table = Dictionary::new(12,true);
    assert_eq!(table.highest_code(),FIRST_CODE - 1);
    assert!(table.find_by_pair(Prefix::Empty,0).is_none());
}

#[test]
fn add_and_find() {
    let mut table = Dictionary::new(12,false);
    let a = FIRST_CODE + 0x41;
    assert_eq!(table.add(Prefix::Code(a),0x42),(260,true));
    let e = table.find_by_code(260).expect("missing entry");
    assert_eq!(e.prefix,Prefix::Code(a));
    assert_eq!(e.k,0x42);
    // re-adding the same pair returns the old code without mutating
    assert_eq!(table.add(Prefix::Code(a),0x42),(260,false));
    assert_eq!(table.highest_code(),260);
}

#[test]
fn fills_up() {
    let mut table = Dictionary::new(8,true);
    for k in 0..252 {
        assert_eq!(table.add(Prefix::Empty,k as u8),(FIRST_CODE + k,true));
    }
    assert!(table.is_full());
    assert_eq!(table.add(Prefix::Empty,0xfe),(0,false));
    assert_eq!(table.highest_code(),255);
}

#[test]
fn prune_retains_recent_chains() {
    let mut table = Dictionary::new(8,true);
    let mut recency = Recency::new(256);
    table.add(Prefix::Empty,b'a'); // 4
    table.add(Prefix::Empty,b'b'); // 5
    table.add(Prefix::Code(4),b'c'); // 6
    table.add(Prefix::Code(6),b'd'); // 7
    recency.observe(4);
    recency.observe(6);
    recency.observe(7);
    // window 2 with counter 4 retains only code 7, whose chain pulls 6 and 4 back in
    let mut pending = Prefix::Code(7);
    let rebuilt = table.prune(&mut recency,2,&mut pending);
    assert_eq!(rebuilt.highest_code(),6);
    let e = rebuilt.find_by_code(6).expect("missing entry");
    assert_eq!((e.prefix,e.k),(Prefix::Code(5),b'd'));
    let e = rebuilt.find_by_code(5).expect("missing entry");
    assert_eq!((e.prefix,e.k),(Prefix::Code(4),b'c'));
    let e = rebuilt.find_by_code(4).expect("missing entry");
    assert_eq!((e.prefix,e.k),(Prefix::Empty,b'a'));
    assert!(rebuilt.find_by_pair(Prefix::Empty,b'b').is_none());
    // recency was carried over and the pending code was remapped
    assert_eq!(pending,Prefix::Code(6));
    assert_eq!(recency.counter(),4);
    assert_eq!(recency.last_seen(4),1);
    assert_eq!(recency.last_seen(5),2);
    assert_eq!(recency.last_seen(6),3);
}

#[test]
fn prune_discards_unseen() {
    let mut table = Dictionary::new(8,true);
    let mut recency = Recency::new(256);
    table.add(Prefix::Empty,b'a'); // 4
    table.add(Prefix::Empty,b'b'); // 5, never observed
    for _i in 0..5 {
        recency.observe(4);
    }
    let mut pending = Prefix::Empty;
    let rebuilt = table.prune(&mut recency,3,&mut pending);
    assert_eq!(rebuilt.highest_code(),4);
    assert!(rebuilt.find_by_pair(Prefix::Empty,b'a').is_some());
    assert!(rebuilt.find_by_pair(Prefix::Empty,b'b').is_none());
    assert_eq!(pending,Prefix::Empty);
}
