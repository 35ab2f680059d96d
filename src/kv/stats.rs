//! Substrate Statistics Module
//!
//! Counts substrate operations. Reads are counted per key, so a batched read of
//! ten keys counts as ten reads.

// == KV Stats ==
/// Operation counters for the in-memory substrate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvStats {
    /// Keys read (single and batched reads)
    pub reads: u64,
    /// Successful writes, including successful check-and-set
    pub writes: u64,
    /// Delete calls
    pub deletes: u64,
    /// Check-and-set calls rejected because the versionstamp moved
    pub cas_conflicts: u64,
    /// Entries dropped because their TTL elapsed
    pub expired: u64,
    /// Current number of live entries
    pub total_entries: usize,
}

impl KvStats {
    pub fn record_reads(&mut self, count: usize) {
        self.reads += count as u64;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_cas_conflict(&mut self) {
        self.cas_conflicts += 1;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
