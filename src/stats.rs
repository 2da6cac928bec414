//! Snapshot-oriented pagination over the ranked sender list.
//!
//! The session is an explicit object owned by the caller; it holds at most
//! one completed scan and serves offset/limit windows from it. Serving a
//! window never recomputes anything: a fresh scan happens only when no
//! snapshot exists yet or when the caller explicitly asks for one, which
//! bounds the cost of paging through a large sender table. Responses
//! therefore reflect a prior snapshot of the store, identified by its scan
//! sequence number.

use crate::aggregate::{scan, ScanSnapshot, SenderAggregate};
use crate::store::MailStore;
use regex::Regex;

pub struct StatsSession {
    snapshot: Option<ScanSnapshot>,
    next_seq: u64,
    busy: bool,
}

/// One offset/limit window over a snapshot. Truncated at the end of the
/// ranked list, never padded.
pub struct StatsPage<'a> {
    pub senders: &'a [SenderAggregate],
    pub total: usize,
    pub total_emails: u64,
    pub offset: usize,
    pub limit: usize,
    pub scan_seq: u64,
    pub scanned_at: &'a str,
}

impl StatsSession {
    pub fn new() -> Self {
        StatsSession {
            snapshot: None,
            next_seq: 0,
            busy: false,
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn last_scan_seq(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.seq)
    }

    /// Refuse to start a scan or delete pass while another is in flight.
    /// The request loop is serial, so this mostly guards against re-entry
    /// bugs, but callers are required to check it before heavy operations.
    pub fn begin_exclusive(&mut self) -> Result<(), String> {
        if self.busy {
            return Err("another scan or delete is in progress".to_string());
        }
        self.busy = true;
        Ok(())
    }

    pub fn end_exclusive(&mut self) {
        self.busy = false;
    }

    /// Drop the held snapshot so the next page request triggers a scan.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }

    /// Serve a window, scanning first if no snapshot exists or `refresh` is
    /// set. `offset` past the end yields an empty window; `limit` must be
    /// validated as positive by the caller before getting here.
    pub fn page(
        &mut self,
        stores: &[Box<dyn MailStore>],
        inbox_regex: &Regex,
        offset: usize,
        limit: usize,
        refresh: bool,
    ) -> StatsPage<'_> {
        if refresh || self.snapshot.is_none() {
            self.next_seq += 1;
            self.snapshot = Some(scan(stores, inbox_regex, self.next_seq));
        }

        // A snapshot was just installed if one was missing.
        let snapshot = self.snapshot.as_ref().unwrap();
        let total = snapshot.senders.len();
        let start = offset.min(total);
        let end = offset.saturating_add(limit).min(total);

        StatsPage {
            senders: &snapshot.senders[start..end],
            total,
            total_emails: snapshot.total_emails,
            offset,
            limit,
            scan_seq: snapshot.seq,
            scanned_at: &snapshot.scanned_at,
        }
    }
}

impl Default for StatsSession {
    fn default() -> Self {
        Self::new()
    }
}
