//! The boundary between the aggregation engine and the host mail store.
//!
//! Everything the engine needs from a mail store fits in five operations:
//! enumerate accounts and their folders, list a folder's messages in
//! cursor-paginated batches, continue a listing, fetch one message's detail,
//! and submit a best-effort bulk delete. The JMAP implementation lives in
//! `crate::jmap::store`; tests use an in-memory fake.

use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    Http(String),
    Parse(String),
    Api(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Http(e) => write!(f, "HTTP error: {}", e),
            StoreError::Parse(e) => write!(f, "Parse error: {}", e),
            StoreError::Api(e) => write!(f, "API error: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FolderRef {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreAccount {
    pub id: String,
    pub label: String,
    pub folders: Vec<FolderRef>,
}

/// A message as listed by the store. Owned by the store; the engine only
/// reads and classifies it.
#[derive(Debug, Clone)]
pub struct MessageRef {
    pub id: String,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub received_at: Option<String>,
    pub read: bool,
    pub folder_id: String,
}

/// One bounded batch of a folder listing. `continuation` is `None` when the
/// listing is exhausted; otherwise it is an opaque token for the next batch.
#[derive(Debug)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    pub continuation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageDetail {
    pub id: String,
    pub subject: Option<String>,
    pub preview: Option<String>,
    pub received_at: Option<String>,
    pub read: bool,
}

pub trait MailStore {
    /// Human-readable label for log lines (the config account name).
    fn label(&self) -> &str;

    fn list_accounts(&self) -> Result<Vec<StoreAccount>, StoreError>;

    fn list_inbox_messages(&self, folder_id: &str) -> Result<MessagePage, StoreError>;

    fn continue_messages(&self, token: &str) -> Result<MessagePage, StoreError>;

    fn get_message_detail(&self, id: &str) -> Result<MessageDetail, StoreError>;

    /// Best-effort bulk delete. The store gives no per-id acknowledgement;
    /// an `Ok` means the batch was submitted, nothing more.
    fn delete_messages(&self, ids: &[String]) -> Result<(), StoreError>;
}

/// Drain one folder's listing into a complete in-memory sequence.
///
/// Batches are concatenated in arrival order. A failed page fetch ends the
/// walk and returns whatever was accumulated: "no more pages" and "listing
/// failed" are both end-of-stream here, so callers always get a usable
/// (possibly truncated) listing instead of an error.
pub fn drain_folder(store: &dyn MailStore, folder_id: &str) -> Vec<MessageRef> {
    let mut messages = Vec::new();

    let mut page = match store.list_inbox_messages(folder_id) {
        Ok(p) => p,
        Err(e) => {
            log_warn!(
                "[{}] listing failed for folder {}: {}",
                store.label(),
                folder_id,
                e
            );
            return messages;
        }
    };

    loop {
        messages.extend(page.messages);
        let token = match page.continuation {
            Some(t) => t,
            None => break,
        };
        page = match store.continue_messages(&token) {
            Ok(p) => p,
            Err(e) => {
                log_warn!(
                    "[{}] listing truncated for folder {} after {} message(s): {}",
                    store.label(),
                    folder_id,
                    messages.len(),
                    e
                );
                break;
            }
        };
    }

    messages
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// In-memory store: one account, one inbox, messages served in pages of
    /// `page_size`. `fail_from_page` makes every batch at or past that index
    /// fail, for truncated-walk tests. Deleted ids are recorded and removed.
    pub struct MemStore {
        pub label: String,
        pub page_size: usize,
        pub fail_from_page: Option<usize>,
        pub messages: RefCell<Vec<MessageRef>>,
        pub deleted: RefCell<Vec<String>>,
    }

    impl MemStore {
        pub fn new(authors: &[Option<&str>]) -> Self {
            let messages = authors
                .iter()
                .enumerate()
                .map(|(i, author)| MessageRef {
                    id: format!("m{}", i + 1),
                    author: author.map(|a| a.to_string()),
                    subject: Some(format!("subject {}", i + 1)),
                    received_at: Some(format!("2026-01-{:02}T00:00:00Z", i + 1)),
                    read: false,
                    folder_id: "inbox".to_string(),
                })
                .collect();
            MemStore {
                label: "mem".to_string(),
                page_size: 2,
                fail_from_page: None,
                messages: RefCell::new(messages),
                deleted: RefCell::new(Vec::new()),
            }
        }

        fn page_at(&self, start: usize, page_index: usize) -> Result<MessagePage, StoreError> {
            if let Some(fail_from) = self.fail_from_page {
                if page_index >= fail_from {
                    return Err(StoreError::Http("simulated page failure".to_string()));
                }
            }
            let messages = self.messages.borrow();
            let start = start.min(messages.len());
            let end = (start + self.page_size).min(messages.len());
            let batch = messages[start..end].to_vec();
            let continuation = if end < messages.len() {
                Some(format!("{}:{}", end, page_index + 1))
            } else {
                None
            };
            Ok(MessagePage {
                messages: batch,
                continuation,
            })
        }
    }

    impl MailStore for MemStore {
        fn label(&self) -> &str {
            &self.label
        }

        fn list_accounts(&self) -> Result<Vec<StoreAccount>, StoreError> {
            Ok(vec![StoreAccount {
                id: "acc".to_string(),
                label: self.label.clone(),
                folders: vec![FolderRef {
                    id: "inbox".to_string(),
                    name: "INBOX".to_string(),
                    role: Some("inbox".to_string()),
                }],
            }])
        }

        fn list_inbox_messages(&self, _folder_id: &str) -> Result<MessagePage, StoreError> {
            self.page_at(0, 0)
        }

        fn continue_messages(&self, token: &str) -> Result<MessagePage, StoreError> {
            let (start, page_index) = token
                .split_once(':')
                .and_then(|(s, p)| Some((s.parse().ok()?, p.parse().ok()?)))
                .ok_or_else(|| StoreError::Api(format!("bad token '{}'", token)))?;
            self.page_at(start, page_index)
        }

        fn get_message_detail(&self, id: &str) -> Result<MessageDetail, StoreError> {
            let messages = self.messages.borrow();
            let msg = messages
                .iter()
                .find(|m| m.id == id)
                .ok_or_else(|| StoreError::Api(format!("no such message '{}'", id)))?;
            Ok(MessageDetail {
                id: msg.id.clone(),
                subject: msg.subject.clone(),
                preview: Some(format!("preview of {}", msg.id)),
                received_at: msg.received_at.clone(),
                read: msg.read,
            })
        }

        fn delete_messages(&self, ids: &[String]) -> Result<(), StoreError> {
            self.deleted.borrow_mut().extend(ids.iter().cloned());
            self.messages.borrow_mut().retain(|m| !ids.contains(&m.id));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemStore;
    use super::*;

    #[test]
    fn test_drain_concatenates_all_pages_in_order() {
        let store = MemStore::new(&[Some("a@x"), Some("b@y"), Some("c@z"), Some("d@w"), Some("e@v")]);
        let messages = drain_folder(&store, "inbox");
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4", "m5"]);
    }

    #[test]
    fn test_drain_single_page() {
        let mut store = MemStore::new(&[Some("a@x")]);
        store.page_size = 10;
        let messages = drain_folder(&store, "inbox");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_failed_continuation_yields_partial_listing() {
        let mut store = MemStore::new(&[Some("a@x"), Some("b@y"), Some("c@z"), Some("d@w")]);
        store.fail_from_page = Some(1);
        let messages = drain_folder(&store, "inbox");
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn test_failed_first_page_yields_empty_listing() {
        let mut store = MemStore::new(&[Some("a@x"), Some("b@y")]);
        store.fail_from_page = Some(0);
        assert!(drain_folder(&store, "inbox").is_empty());
    }
}
