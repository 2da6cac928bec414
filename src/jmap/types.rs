use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// JMAP session document (from .well-known/jmap)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JmapSession {
    pub username: String,
    pub api_url: String,
    #[serde(default)]
    pub primary_accounts: HashMap<String, String>,
    #[serde(default)]
    pub accounts: HashMap<String, JmapAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JmapAccount {
    pub name: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub is_personal: bool,
}

impl JmapSession {
    pub fn mail_account_id(&self) -> Option<&str> {
        if let Some(id) = self.primary_accounts.get("urn:ietf:params:jmap:mail") {
            return Some(id.as_str());
        }
        // No primaryAccounts entry; a single-account session is unambiguous
        if self.accounts.len() == 1 {
            return self.accounts.keys().next().map(|s| s.as_str());
        }
        None
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JmapRequest {
    pub using: Vec<&'static str>,
    pub method_calls: Vec<MethodCall>,
}

#[derive(Debug, Serialize)]
pub struct MethodCall(pub &'static str, pub serde_json::Value, pub String);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JmapResponse {
    pub method_responses: Vec<MethodResponse>,
}

#[derive(Debug, Deserialize)]
pub struct MethodResponse(
    pub String,
    pub serde_json::Value,
    #[allow(dead_code)] pub String,
);

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub total_emails: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxGetResponse {
    pub list: Vec<Mailbox>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailQueryResponse {
    pub ids: Vec<String>,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub total: Option<u32>,
}

/// Email with only the properties the aggregation engine reads; everything
/// a full client would want (bodies, threads, attachments) stays off the
/// wire.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub from: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub received_at: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub keywords: HashMap<String, bool>,
}

impl Email {
    pub fn is_read(&self) -> bool {
        self.keywords.contains_key("$seen")
    }

    /// The first From address rendered as a free-text author header, the
    /// form the normalizer expects ("Name <addr>", bare address, or name).
    /// An entry with neither name nor email renders empty and counts as
    /// absent.
    pub fn author(&self) -> Option<String> {
        self.from
            .as_ref()
            .and_then(|addrs| addrs.first())
            .map(|a| a.to_string())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => write!(f, "{} <{}>", name, email),
            (None, Some(email)) => write!(f, "{}", email),
            (Some(name), None) => write!(f, "{}", name),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailGetResponse {
    pub list: Vec<Email>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSetResponse {
    #[serde(default)]
    pub destroyed: Option<Vec<String>>,
    #[serde(default)]
    pub not_destroyed: Option<HashMap<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mail_account_id_primary() {
        let session: JmapSession = serde_json::from_value(json!({
            "username": "u@e.com",
            "apiUrl": "https://api.e.com/jmap",
            "primaryAccounts": { "urn:ietf:params:jmap:mail": "primary-id" },
            "accounts": {
                "primary-id": { "name": "Main", "isPersonal": true },
                "other-id": { "name": "Other" }
            }
        }))
        .unwrap();
        assert_eq!(session.mail_account_id(), Some("primary-id"));
    }

    #[test]
    fn test_mail_account_id_single_account_fallback() {
        let session: JmapSession = serde_json::from_value(json!({
            "username": "u@e.com",
            "apiUrl": "https://api.e.com/jmap",
            "accounts": { "only-one": { "name": "Solo" } }
        }))
        .unwrap();
        assert_eq!(session.mail_account_id(), Some("only-one"));
    }

    #[test]
    fn test_mail_account_id_ambiguous_is_none() {
        let session: JmapSession = serde_json::from_value(json!({
            "username": "u@e.com",
            "apiUrl": "https://api.e.com/jmap",
            "accounts": {
                "acc-1": { "name": "A" },
                "acc-2": { "name": "B" }
            }
        }))
        .unwrap();
        assert_eq!(session.mail_account_id(), None);
    }

    #[test]
    fn test_email_author_rendering() {
        let email: Email = serde_json::from_value(json!({
            "id": "e1",
            "from": [{"name": "Alice", "email": "alice@example.com"}]
        }))
        .unwrap();
        assert_eq!(email.author().as_deref(), Some("Alice <alice@example.com>"));
    }

    #[test]
    fn test_email_author_bare_address() {
        let email: Email = serde_json::from_value(json!({
            "id": "e1",
            "from": [{"email": "alice@example.com"}]
        }))
        .unwrap();
        assert_eq!(email.author().as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_email_author_absent() {
        let email: Email = serde_json::from_value(json!({ "id": "e1" })).unwrap();
        assert_eq!(email.author(), None);

        let email: Email = serde_json::from_value(json!({ "id": "e1", "from": [] })).unwrap();
        assert_eq!(email.author(), None);

        // An address object with neither name nor email is as good as no From
        let email: Email = serde_json::from_value(json!({ "id": "e1", "from": [{}] })).unwrap();
        assert_eq!(email.author(), None);
    }

    #[test]
    fn test_email_is_read() {
        let email: Email = serde_json::from_value(json!({
            "id": "e1",
            "keywords": { "$seen": true }
        }))
        .unwrap();
        assert!(email.is_read());
    }

    #[test]
    fn test_query_response_defaults() {
        let resp: EmailQueryResponse = serde_json::from_value(json!({
            "accountId": "a",
            "ids": ["e1", "e2"]
        }))
        .unwrap();
        assert_eq!(resp.ids.len(), 2);
        assert_eq!(resp.position, 0);
        assert_eq!(resp.total, None);
    }

    #[test]
    fn test_email_set_response() {
        let resp: EmailSetResponse = serde_json::from_value(json!({
            "accountId": "a",
            "destroyed": ["e1"],
            "notDestroyed": { "e2": { "type": "notFound" } }
        }))
        .unwrap();
        assert_eq!(resp.destroyed.unwrap(), vec!["e1"]);
        assert!(resp.not_destroyed.unwrap().contains_key("e2"));
    }
}
