//! `MailStore` over a JMAP connection.
//!
//! JMAP paginates with a numeric query position rather than a server-issued
//! cursor, so the continuation token here encodes `mailbox:next-position`.
//! Tokens are opaque to everything above this module.

use crate::store::{
    FolderRef, MailStore, MessageDetail, MessagePage, MessageRef, StoreAccount, StoreError,
};

use super::client::JmapClient;
use super::types::Email;

pub struct JmapStore {
    client: JmapClient,
    label: String,
    page_size: u32,
}

impl JmapStore {
    pub fn new(client: JmapClient, label: String, page_size: u32) -> Self {
        JmapStore {
            client,
            label,
            page_size,
        }
    }

    fn message_ref(email: Email, folder_id: &str) -> MessageRef {
        MessageRef {
            author: email.author(),
            read: email.is_read(),
            id: email.id,
            subject: email.subject,
            received_at: email.received_at,
            folder_id: folder_id.to_string(),
        }
    }

    fn fetch_page(&self, folder_id: &str, position: u32) -> Result<MessagePage, StoreError> {
        let page = self.client.query_page(folder_id, position, self.page_size)?;
        let fetched = page.ids.len() as u32;
        let emails = self.client.get_emails(&page.ids)?;

        let next_position = page.position + fetched;
        let has_more = fetched > 0
            && match page.total {
                Some(total) => next_position < total,
                // Without a total, a full page is the only hint of more
                None => fetched == self.page_size,
            };

        Ok(MessagePage {
            messages: emails
                .into_iter()
                .map(|e| Self::message_ref(e, folder_id))
                .collect(),
            continuation: has_more.then(|| format!("{}:{}", folder_id, next_position)),
        })
    }
}

impl MailStore for JmapStore {
    fn label(&self) -> &str {
        &self.label
    }

    fn list_accounts(&self) -> Result<Vec<StoreAccount>, StoreError> {
        let mailboxes = self.client.get_mailboxes()?;
        Ok(vec![StoreAccount {
            id: self.client.account_id().to_string(),
            label: self.label.clone(),
            folders: mailboxes
                .into_iter()
                .map(|m| FolderRef {
                    id: m.id,
                    name: m.name,
                    role: m.role,
                })
                .collect(),
        }])
    }

    fn list_inbox_messages(&self, folder_id: &str) -> Result<MessagePage, StoreError> {
        self.fetch_page(folder_id, 0)
    }

    fn continue_messages(&self, token: &str) -> Result<MessagePage, StoreError> {
        let (folder_id, position) = token
            .rsplit_once(':')
            .and_then(|(f, p)| Some((f, p.parse::<u32>().ok()?)))
            .ok_or_else(|| StoreError::Api(format!("malformed continuation token '{}'", token)))?;
        self.fetch_page(folder_id, position)
    }

    fn get_message_detail(&self, id: &str) -> Result<MessageDetail, StoreError> {
        let emails = self.client.get_emails(&[id.to_string()])?;
        let email = emails
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Api(format!("message '{}' not found", id)))?;
        Ok(MessageDetail {
            read: email.is_read(),
            id: email.id,
            subject: email.subject,
            preview: email.preview,
            received_at: email.received_at,
        })
    }

    fn delete_messages(&self, ids: &[String]) -> Result<(), StoreError> {
        self.client.destroy_emails(ids)
    }
}
