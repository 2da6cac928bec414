//! Sender query index and the operations built on it.
//!
//! Deleting or previewing "everything from X" must act on exactly the set
//! of messages the stats table counted for X. Both therefore re-walk the
//! same folders and match on the same normalized email, byte for byte —
//! any divergence between this path and the aggregation path would let the
//! count shown and the messages acted on disagree.

use crate::aggregate::walk_inboxes;
use crate::normalize::normalize;
use crate::store::{MailStore, MessageDetail, MessageRef, StoreError};
use regex::Regex;

/// All currently-listed messages whose normalized author email equals
/// `email`, paired with the index of the store they came from.
pub fn messages_from(
    stores: &[Box<dyn MailStore>],
    inbox_regex: &Regex,
    email: &str,
) -> Vec<(usize, MessageRef)> {
    let mut matches = Vec::new();
    walk_inboxes(stores, inbox_regex, |store_idx, message| {
        if let Some(author) = &message.author {
            if normalize(author).email == email {
                matches.push((store_idx, message.clone()));
            }
        }
    });
    matches
}

/// Delete every message from `email` across all stores.
///
/// Returns the number of ids submitted for deletion. The store's delete is
/// fire-and-collect with no per-id acknowledgement, so this is a count of
/// attempts, not confirmations. Zero targets means the store is never
/// invoked. Not transactional: an error from one store leaves earlier
/// submissions in place, and the caller's stats snapshot is not touched —
/// a refreshed scan is the way to see the corrected counts.
pub fn delete_all_from(
    stores: &[Box<dyn MailStore>],
    inbox_regex: &Regex,
    email: &str,
) -> Result<u64, StoreError> {
    let targets = messages_from(stores, inbox_regex, email);
    if targets.is_empty() {
        return Ok(0);
    }

    let mut per_store: Vec<Vec<String>> = vec![Vec::new(); stores.len()];
    for (store_idx, message) in targets {
        per_store[store_idx].push(message.id);
    }

    let mut submitted = 0u64;
    for (store_idx, ids) in per_store.into_iter().enumerate() {
        if ids.is_empty() {
            continue;
        }
        let store = &stores[store_idx];
        log_info!(
            "[{}] deleting {} message(s) from {}",
            store.label(),
            ids.len(),
            email
        );
        store.delete_messages(&ids)?;
        submitted += ids.len() as u64;
    }

    Ok(submitted)
}

/// Newest-first previews of messages from `email`, truncated to `limit`.
/// Details are only fetched for the messages that survive truncation.
pub fn previews_from(
    stores: &[Box<dyn MailStore>],
    inbox_regex: &Regex,
    email: &str,
    limit: usize,
) -> Result<Vec<MessageDetail>, StoreError> {
    let mut matches = messages_from(stores, inbox_regex, email);

    // ISO-8601 dates compare correctly as strings; undated messages sort last.
    matches.sort_by(|(_, a), (_, b)| match (&b.received_at, &a.received_at) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => std::cmp::Ordering::Equal,
    });
    matches.truncate(limit);

    let mut previews = Vec::with_capacity(matches.len());
    for (store_idx, message) in matches {
        previews.push(stores[store_idx].get_message_detail(&message.id)?);
    }
    Ok(previews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::scan;
    use crate::store::testing::MemStore;

    fn inbox_re() -> Regex {
        Regex::new("^INBOX$").unwrap()
    }

    #[test]
    fn test_query_index_matches_aggregate_count() {
        let stores: Vec<Box<dyn MailStore>> = vec![Box::new(MemStore::new(&[
            Some("A <a@x.com>"),
            Some("b@y.com"),
            Some("Alpha <a@x.com>"),
            None,
            Some("a@x.com"),
        ]))];

        let snapshot = scan(&stores, &inbox_re(), 1);
        let aggregate = snapshot
            .senders
            .iter()
            .find(|s| s.email == "a@x.com")
            .unwrap();

        let matches = messages_from(&stores, &inbox_re(), "a@x.com");
        assert_eq!(matches.len() as u64, aggregate.count);
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        let stores: Vec<Box<dyn MailStore>> =
            vec![Box::new(MemStore::new(&[Some("A <a@x.com>"), Some("A <A@x.com>")]))];
        let matches = messages_from(&stores, &inbox_re(), "a@x.com");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].1.id, "m1");
    }

    #[test]
    fn test_delete_all_from_submits_and_counts() {
        let store = MemStore::new(&[
            Some("a@x.com"),
            Some("b@y.com"),
            Some("Ann <a@x.com>"),
        ]);
        let stores: Vec<Box<dyn MailStore>> = vec![Box::new(store)];

        let deleted = delete_all_from(&stores, &inbox_re(), "a@x.com").unwrap();
        assert_eq!(deleted, 2);

        // A rescan over the mutated store no longer lists the sender.
        let snapshot = scan(&stores, &inbox_re(), 2);
        assert!(snapshot.senders.iter().all(|s| s.email != "a@x.com"));
        assert_eq!(snapshot.total_emails, 1);
    }

    #[test]
    fn test_delete_with_no_targets_returns_zero() {
        let store = MemStore::new(&[Some("a@x.com")]);
        let stores: Vec<Box<dyn MailStore>> = vec![Box::new(store)];
        assert_eq!(
            delete_all_from(&stores, &inbox_re(), "nobody@x.com").unwrap(),
            0
        );
        // MemStore records every submission; none should have happened.
        let snapshot = scan(&stores, &inbox_re(), 2);
        assert_eq!(snapshot.total_emails, 1);
    }

    #[test]
    fn test_previews_newest_first_and_truncated() {
        let store = MemStore::new(&[
            Some("a@x.com"), // m1, 2026-01-01
            Some("a@x.com"), // m2, 2026-01-02
            Some("b@y.com"),
            Some("a@x.com"), // m4, 2026-01-04
        ]);
        let stores: Vec<Box<dyn MailStore>> = vec![Box::new(store)];

        let previews = previews_from(&stores, &inbox_re(), "a@x.com", 2).unwrap();
        let ids: Vec<&str> = previews.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["m4", "m2"]);
        assert!(previews[0].preview.as_deref().unwrap().contains("m4"));
    }
}
