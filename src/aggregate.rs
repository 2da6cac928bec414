//! The sender-aggregation engine.
//!
//! A scan drains the inbox of every account on every connected store, folds
//! each message's normalized author into a count map, and produces a ranked
//! snapshot: senders sorted by count descending, ties in first-encountered
//! order. The snapshot is immutable once built and tagged with a sequence
//! number and timestamp so callers can tell how stale it is; there is no
//! incremental delta tracking, a fresh scan is the only way to catch up
//! with the store.

use crate::log;
use crate::normalize::normalize;
use crate::store::{drain_folder, FolderRef, MailStore, StoreAccount};
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SenderAggregate {
    pub email: String,
    pub display_name: Option<String>,
    pub count: u64,
}

/// The completed result of one scan over a best-effort snapshot of the
/// store. `total_emails` equals the sum of all counts; messages without an
/// author contribute to neither.
#[derive(Debug)]
pub struct ScanSnapshot {
    pub seq: u64,
    pub scanned_at: String,
    pub senders: Vec<SenderAggregate>,
    pub total_emails: u64,
}

/// Pick the folder a scan reads for one account: the folder with the inbox
/// role, or failing that the first folder whose name matches `inbox_regex`.
pub fn inbox_folder<'a>(account: &'a StoreAccount, inbox_regex: &Regex) -> Option<&'a FolderRef> {
    account
        .folders
        .iter()
        .find(|f| f.role.as_deref() == Some("inbox"))
        .or_else(|| account.folders.iter().find(|f| inbox_regex.is_match(&f.name)))
}

/// Visit every inbox message across all stores, in store-then-account order,
/// calling `visit` for each. Unreachable accounts contribute nothing.
pub fn walk_inboxes<F>(stores: &[Box<dyn MailStore>], inbox_regex: &Regex, mut visit: F)
where
    F: FnMut(usize, &crate::store::MessageRef),
{
    for (store_idx, store) in stores.iter().enumerate() {
        let accounts = match store.list_accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                log_warn!("[{}] account listing failed, skipping: {}", store.label(), e);
                continue;
            }
        };

        for account in &accounts {
            let folder = match inbox_folder(account, inbox_regex) {
                Some(f) => f,
                None => {
                    log_warn!(
                        "[{}] no inbox folder found for account {}",
                        store.label(),
                        account.id
                    );
                    continue;
                }
            };

            for message in drain_folder(store.as_ref(), &folder.id) {
                visit(store_idx, &message);
            }
        }
    }
}

/// Run a full aggregation scan. O(full store listing); pagination windows
/// are served from the finished snapshot, never streamed.
pub fn scan(stores: &[Box<dyn MailStore>], inbox_regex: &Regex, seq: u64) -> ScanSnapshot {
    let mut by_email: HashMap<String, usize> = HashMap::new();
    let mut senders: Vec<SenderAggregate> = Vec::new();
    let mut total_emails = 0u64;

    walk_inboxes(stores, inbox_regex, |_, message| {
        let author = match &message.author {
            Some(a) => a,
            None => return, // authorless messages count toward nothing
        };
        let identity = normalize(author);
        total_emails += 1;

        match by_email.get(&identity.email) {
            Some(&idx) => senders[idx].count += 1,
            None => {
                by_email.insert(identity.email.clone(), senders.len());
                // First-seen display name wins; later names for the same
                // address are discarded.
                senders.push(SenderAggregate {
                    email: identity.email,
                    display_name: identity.display_name,
                    count: 1,
                });
            }
        }
    });

    // Stable sort: equal counts keep first-encountered order.
    senders.sort_by(|a, b| b.count.cmp(&a.count));

    log_info!(
        "scan #{} complete: {} sender(s), {} email(s)",
        seq,
        senders.len(),
        total_emails
    );

    ScanSnapshot {
        seq,
        scanned_at: log::now(),
        senders,
        total_emails,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemStore;

    fn inbox_re() -> Regex {
        Regex::new("^INBOX$").unwrap()
    }

    fn boxed(store: MemStore) -> Vec<Box<dyn MailStore>> {
        vec![Box::new(store)]
    }

    #[test]
    fn test_counts_and_ranking() {
        let stores = boxed(MemStore::new(&[
            Some("A <a@x.com>"),
            Some("b@y.com"),
            Some("Alpha <a@x.com>"),
            Some("a@x.com"),
        ]));
        let snapshot = scan(&stores, &inbox_re(), 1);

        assert_eq!(snapshot.senders.len(), 2);
        assert_eq!(snapshot.senders[0].email, "a@x.com");
        assert_eq!(snapshot.senders[0].count, 3);
        assert_eq!(snapshot.senders[1].email, "b@y.com");
        assert_eq!(snapshot.senders[1].count, 1);
        assert_eq!(snapshot.total_emails, 4);
    }

    #[test]
    fn test_first_seen_display_name_wins() {
        let stores = boxed(MemStore::new(&[
            Some("A <a@x.com>"),
            Some("Alpha <a@x.com>"),
        ]));
        let snapshot = scan(&stores, &inbox_re(), 1);
        assert_eq!(snapshot.senders[0].display_name.as_deref(), Some("A"));
    }

    #[test]
    fn test_authorless_messages_skipped() {
        let stores = boxed(MemStore::new(&[Some("a@x.com"), None, None]));
        let snapshot = scan(&stores, &inbox_re(), 1);
        assert_eq!(snapshot.total_emails, 1);
        assert_eq!(snapshot.senders.len(), 1);
    }

    #[test]
    fn test_sum_of_counts_equals_total() {
        let stores = boxed(MemStore::new(&[
            Some("a@x.com"),
            Some("b@y.com"),
            Some("a@x.com"),
            None,
            Some("c@z.com"),
        ]));
        let snapshot = scan(&stores, &inbox_re(), 1);
        let sum: u64 = snapshot.senders.iter().map(|s| s.count).sum();
        assert_eq!(sum, snapshot.total_emails);
        assert_eq!(sum, 4);
    }

    #[test]
    fn test_ties_keep_first_encountered_order() {
        let stores = boxed(MemStore::new(&[
            Some("b@y.com"),
            Some("a@x.com"),
            Some("c@z.com"),
        ]));
        let snapshot = scan(&stores, &inbox_re(), 1);
        let emails: Vec<&str> = snapshot.senders.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["b@y.com", "a@x.com", "c@z.com"]);
    }

    #[test]
    fn test_truncated_listing_aggregates_partial_set() {
        let mut store = MemStore::new(&[
            Some("a@x.com"),
            Some("b@y.com"),
            Some("c@z.com"),
            Some("d@w.com"),
        ]);
        store.fail_from_page = Some(1); // page one succeeds, page two fails
        let snapshot = scan(&boxed(store), &inbox_re(), 1);
        assert_eq!(snapshot.total_emails, 2);
        let emails: Vec<&str> = snapshot.senders.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.com", "b@y.com"]);
    }

    #[test]
    fn test_unreachable_store_yields_empty_snapshot() {
        let stores: Vec<Box<dyn MailStore>> = Vec::new();
        let snapshot = scan(&stores, &inbox_re(), 7);
        assert_eq!(snapshot.seq, 7);
        assert!(snapshot.senders.is_empty());
        assert_eq!(snapshot.total_emails, 0);
    }

    #[test]
    fn test_aggregation_spans_multiple_stores() {
        let mut first = MemStore::new(&[Some("a@x.com")]);
        first.label = "one".to_string();
        let mut second = MemStore::new(&[Some("a@x.com"), Some("b@y.com")]);
        second.label = "two".to_string();
        let stores: Vec<Box<dyn MailStore>> = vec![Box::new(first), Box::new(second)];

        let snapshot = scan(&stores, &inbox_re(), 1);
        assert_eq!(snapshot.senders[0].email, "a@x.com");
        assert_eq!(snapshot.senders[0].count, 2);
        assert_eq!(snapshot.total_emails, 3);
    }
}
