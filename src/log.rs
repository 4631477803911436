//! The Log Port: an externally-owned, ordered, 1-based index store of
//! `LogEntry` values. The real persistence layer lives outside this crate;
//! `MemoryLog` below is a minimal in-memory stand-in used only by this
//! crate's own tests.

use crate::protos::{LogEntry, LogIndex, Term};

/// The contract the Active Role State Machine, the Commit Applier, and the
/// Membership Rebalancer consume. Implementations are exclusively owned by a
/// single node: the log is an exclusive resource of the node.
pub trait LogStorage: Send + Sync {
    fn is_empty(&self) -> bool;

    /// Index of the oldest readable entry. Meaningless if `is_empty()`.
    fn first_index(&self) -> LogIndex;

    /// Index of the newest entry. `0` if `is_empty()`.
    fn last_index(&self) -> LogIndex;

    /// Whether `index` currently names a readable slot (false for gaps
    /// opened by `skip`, indices below `first_index`, or indices above
    /// `last_index`).
    fn contains_index(&self, index: LogIndex) -> bool;

    /// Reads the entry at `index`, if any is currently present.
    fn get_entry(&self, index: LogIndex) -> Option<LogEntry>;

    /// Convenience: the term of the entry at `index`, or `0` if absent.
    /// `0` is a valid sentinel since real terms start at 1 once any election
    /// has occurred.
    fn term(&self, index: LogIndex) -> Term {
        self.get_entry(index).map(|e| e.term).unwrap_or(0)
    }

    /// Appends `entry` at the next slot. The caller is responsible for
    /// having set `entry.index` to `last_index() + 1` beforehand (after any
    /// `skip`).
    fn create_entry(&mut self, entry: LogEntry);

    /// Reserves `n` empty (absent) indices beyond `last_index()`, such that
    /// the next `create_entry` call lands at `last_index() + n + 1`.
    fn skip(&mut self, n: u64);

    /// Retains all entries with `index <= i`, discarding everything after.
    /// Implementations must refuse (see `errors::ErrorKind::InvariantViolation`)
    /// to truncate below a caller-tracked commit index; this port itself has
    /// no notion of commit index, so that check lives in the caller
    /// (`active::handle_append`).
    fn truncate(&mut self, i: LogIndex);

    /// Releases storage for all indices `<= i`. Entries at those indices
    /// become unreadable (`get_entry` returns `None`, `contains_index`
    /// returns `false`) without changing `first_index`/`last_index`
    /// semantics for anything above `i`.
    fn recycle(&mut self, i: LogIndex);
}

/// A simple `Vec`-backed `LogStorage` used by this crate's own tests. Gaps
/// opened by `skip` are represented as `None` slots; recycled entries are
/// also `None` but recorded below `recycled_through`, so `contains_index`
/// reads both "never written" gaps and "written then recycled" entries
/// back as absent.
#[derive(Debug, Default)]
pub struct MemoryLog {
    /// `slots[i]` holds the entry for index `i + first_index`.
    slots: Vec<Option<LogEntry>>,
    first_index: LogIndex,
    recycled_through: LogIndex,
}

impl MemoryLog {
    pub fn new() -> Self {
        MemoryLog {
            slots: Vec::new(),
            first_index: 1,
            recycled_through: 0,
        }
    }

    fn slot_of(&self, index: LogIndex) -> Option<usize> {
        if index < self.first_index || index == 0 {
            return None;
        }
        let offset = (index - self.first_index) as usize;
        if offset >= self.slots.len() {
            None
        } else {
            Some(offset)
        }
    }
}

impl LogStorage for MemoryLog {
    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn first_index(&self) -> LogIndex {
        self.first_index
    }

    fn last_index(&self) -> LogIndex {
        if self.slots.is_empty() {
            0
        } else {
            self.first_index + self.slots.len() as LogIndex - 1
        }
    }

    fn contains_index(&self, index: LogIndex) -> bool {
        if index <= self.recycled_through {
            return false;
        }
        match self.slot_of(index) {
            Some(off) => self.slots[off].is_some(),
            None => false,
        }
    }

    fn get_entry(&self, index: LogIndex) -> Option<LogEntry> {
        if index <= self.recycled_through {
            return None;
        }
        self.slot_of(index).and_then(|off| self.slots[off].clone())
    }

    fn create_entry(&mut self, entry: LogEntry) {
        let expected = self.last_index() + 1;
        assert_eq!(entry.index, expected, "create_entry must land at the next slot");
        self.slots.push(Some(entry));
    }

    fn skip(&mut self, n: u64) {
        for _ in 0..n {
            self.slots.push(None);
        }
    }

    fn truncate(&mut self, i: LogIndex) {
        if i < self.first_index {
            self.slots.clear();
            return;
        }
        let keep = (i - self.first_index + 1) as usize;
        self.slots.truncate(keep);
    }

    fn recycle(&mut self, i: LogIndex) {
        if i > self.recycled_through {
            self.recycled_through = i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protos::LogEntryType;

    fn entry(index: LogIndex, term: Term) -> LogEntry {
        LogEntry {
            index,
            term,
            entry_type: LogEntryType::Command,
            key: vec![],
            payload: vec![],
        }
    }

    #[test]
    fn empty_log_reports_zero_last_index() {
        let log = MemoryLog::new();
        assert!(log.is_empty());
        assert_eq!(log.last_index(), 0);
        assert_eq!(log.term(0), 0);
    }

    #[test]
    fn skip_opens_a_gap_that_contains_index_treats_as_absent() {
        let mut log = MemoryLog::new();
        log.skip(2);
        log.create_entry(entry(3, 1));
        assert_eq!(log.last_index(), 3);
        assert!(!log.contains_index(1));
        assert!(!log.contains_index(2));
        assert!(log.contains_index(3));
    }

    #[test]
    fn truncate_discards_everything_after_i() {
        let mut log = MemoryLog::new();
        log.create_entry(entry(1, 1));
        log.create_entry(entry(2, 1));
        log.create_entry(entry(3, 2));
        log.truncate(1);
        assert_eq!(log.last_index(), 1);
        assert!(!log.contains_index(2));
    }

    #[test]
    fn recycle_makes_low_indices_unreadable() {
        let mut log = MemoryLog::new();
        log.create_entry(entry(1, 1));
        log.create_entry(entry(2, 1));
        log.recycle(1);
        assert!(!log.contains_index(1));
        assert!(log.contains_index(2));
        assert!(log.get_entry(1).is_none());
    }
}
