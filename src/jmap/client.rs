use crate::store::StoreError;
use base64::Engine;
use serde_json::json;

use super::types::{
    Email, EmailGetResponse, EmailQueryResponse, EmailSetResponse, JmapRequest, JmapResponse,
    JmapSession, Mailbox, MailboxGetResponse, MethodCall,
};

const USING: [&str; 2] = ["urn:ietf:params:jmap:core", "urn:ietf:params:jmap:mail"];

/// Properties fetched per message. Bodies stay server-side; `preview` is
/// the server-computed snippet the drill-down view shows.
const MESSAGE_PROPERTIES: [&str; 6] = ["id", "from", "subject", "receivedAt", "preview", "keywords"];

fn truncate_str(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One JMAP query page: the ids in window order plus enough bookkeeping to
/// decide whether another page exists.
#[derive(Debug)]
pub struct QueryPage {
    pub ids: Vec<String>,
    pub position: u32,
    pub total: Option<u32>,
}

pub struct JmapClient {
    username: String,
    password: String,
    api_url: String,
    account_id: String,
}

impl JmapClient {
    fn auth_header(username: &str, password: &str) -> String {
        let credentials = format!("{}:{}", username, password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        format!("Basic {}", encoded)
    }

    /// Fetch a URL following redirects manually so the Authorization header
    /// survives cross-path hops (ureq drops it on its own redirects).
    fn fetch_with_auth(url: &str, auth: &str, max_redirects: u32) -> Result<String, StoreError> {
        let agent = ureq::AgentBuilder::new().redirects(0).build();
        let mut current_url = url.to_string();

        for _ in 0..max_redirects {
            let response = agent.get(&current_url).set("Authorization", auth).call();

            match response {
                Ok(resp) if (300..400).contains(&resp.status()) => {
                    let status = resp.status();
                    match resp.header("location") {
                        Some(location) => {
                            log_debug!("[jmap] following redirect {} -> {}", status, location);
                            current_url = Self::resolve_redirect(&current_url, location);
                        }
                        None => {
                            return Err(StoreError::Http(format!(
                                "redirect {} without Location header",
                                status
                            )))
                        }
                    }
                }
                Ok(resp) => {
                    return resp
                        .into_string()
                        .map_err(|e| StoreError::Parse(format!("failed to read response: {}", e)));
                }
                Err(ureq::Error::Status(code, resp)) if (300..400).contains(&code) => {
                    match resp.header("location") {
                        Some(location) => {
                            log_debug!("[jmap] following redirect {} -> {}", code, location);
                            current_url = Self::resolve_redirect(&current_url, location);
                        }
                        None => {
                            return Err(StoreError::Http(format!(
                                "redirect {} without Location header",
                                code
                            )))
                        }
                    }
                }
                Err(ureq::Error::Status(401, _)) => {
                    return Err(StoreError::Http(
                        "authentication failed (401 Unauthorized)".to_string(),
                    ));
                }
                Err(ureq::Error::Status(code, resp)) => {
                    let body = resp.into_string().unwrap_or_default();
                    return Err(StoreError::Http(format!(
                        "HTTP {}: {}",
                        code,
                        truncate_str(&body, 200)
                    )));
                }
                Err(e) => return Err(StoreError::Http(e.to_string())),
            }
        }

        Err(StoreError::Http("too many redirects".to_string()))
    }

    fn resolve_redirect(base_url: &str, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if location.starts_with('/') {
            if let Some(idx) = base_url.find("://") {
                let after_scheme = &base_url[idx + 3..];
                match after_scheme.find('/') {
                    Some(path_start) => {
                        format!("{}{}", &base_url[..idx + 3 + path_start], location)
                    }
                    None => format!("{}{}", base_url, location),
                }
            } else {
                location.to_string()
            }
        } else if let Some(last_slash) = base_url.rfind('/') {
            format!("{}/{}", &base_url[..last_slash], location)
        } else {
            location.to_string()
        }
    }

    /// Discover the JMAP session and resolve the primary mail account.
    pub fn discover(
        well_known_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, StoreError> {
        log_info!("[jmap] discovering session from: {}", well_known_url);
        let auth = Self::auth_header(username, password);
        let response_text = Self::fetch_with_auth(well_known_url, &auth, 5)?;

        let session: JmapSession = serde_json::from_str(&response_text).map_err(|e| {
            StoreError::Parse(format!(
                "failed to parse session: {}. Response was: {}",
                e,
                truncate_str(&response_text, 500)
            ))
        })?;

        let account_id = session
            .mail_account_id()
            .ok_or_else(|| {
                StoreError::Api(format!(
                    "no mail account in session response: {}",
                    truncate_str(&response_text, 500)
                ))
            })?
            .to_string();

        log_info!("[jmap] discovery successful, account_id: {}", account_id);

        Ok(JmapClient {
            username: username.to_string(),
            password: password.to_string(),
            api_url: session.api_url,
            account_id,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    fn call(&self, request: JmapRequest) -> Result<JmapResponse, StoreError> {
        let auth = Self::auth_header(&self.username, &self.password);

        let response = ureq::post(&self.api_url)
            .set("Authorization", &auth)
            .set("Content-Type", "application/json")
            .send_json(&request)
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let response_text = response
            .into_string()
            .map_err(|e| StoreError::Parse(format!("failed to read response: {}", e)))?;

        serde_json::from_str(&response_text).map_err(|e| {
            StoreError::Parse(format!(
                "failed to parse response: {} ({})",
                e,
                truncate_str(&response_text, 500)
            ))
        })
    }

    /// Run a single-method request and hand back its response arguments.
    fn call_single(
        &self,
        method: &'static str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        let request = JmapRequest {
            using: USING.to_vec(),
            method_calls: vec![MethodCall(method, args, "0".to_string())],
        };

        let response = self.call(request)?;
        match response.method_responses.into_iter().next() {
            Some(method_response) if method_response.0 == method => Ok(method_response.1),
            Some(method_response) => Err(StoreError::Api(format!(
                "expected {} response, got {}: {}",
                method,
                method_response.0,
                truncate_str(&method_response.1.to_string(), 300)
            ))),
            None => Err(StoreError::Api("empty method response".to_string())),
        }
    }

    pub fn get_mailboxes(&self) -> Result<Vec<Mailbox>, StoreError> {
        let args = self.call_single(
            "Mailbox/get",
            json!({
                "accountId": self.account_id,
                "ids": null
            }),
        )?;

        let parsed: MailboxGetResponse =
            serde_json::from_value(args).map_err(|e| StoreError::Parse(e.to_string()))?;
        log_debug!("[jmap] Mailbox/get returned {} mailboxes", parsed.list.len());
        Ok(parsed.list)
    }

    /// One page of message ids for a mailbox, newest first.
    pub fn query_page(
        &self,
        mailbox_id: &str,
        position: u32,
        limit: u32,
    ) -> Result<QueryPage, StoreError> {
        let args = self.call_single(
            "Email/query",
            json!({
                "accountId": self.account_id,
                "filter": { "inMailbox": mailbox_id },
                "sort": [{ "property": "receivedAt", "isAscending": false }],
                "limit": limit,
                "position": position
            }),
        )?;

        let parsed: EmailQueryResponse =
            serde_json::from_value(args).map_err(|e| StoreError::Parse(e.to_string()))?;
        log_debug!(
            "[jmap] Email/query {} ids at position {} (total: {:?})",
            parsed.ids.len(),
            parsed.position,
            parsed.total
        );
        Ok(QueryPage {
            ids: parsed.ids,
            position: parsed.position,
            total: parsed.total,
        })
    }

    pub fn get_emails(&self, ids: &[String]) -> Result<Vec<Email>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let args = self.call_single(
            "Email/get",
            json!({
                "accountId": self.account_id,
                "ids": ids,
                "properties": MESSAGE_PROPERTIES
            }),
        )?;

        let parsed: EmailGetResponse =
            serde_json::from_value(args).map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(parsed.list)
    }

    /// Permanently destroy a batch of messages. Ids the server reports as
    /// notDestroyed are logged but do not fail the batch; the caller only
    /// learns that the batch was submitted.
    pub fn destroy_emails(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let args = self.call_single(
            "Email/set",
            json!({
                "accountId": self.account_id,
                "destroy": ids
            }),
        )?;

        let parsed: EmailSetResponse =
            serde_json::from_value(args).map_err(|e| StoreError::Parse(e.to_string()))?;
        if let Some(not_destroyed) = parsed.not_destroyed {
            if !not_destroyed.is_empty() {
                log_warn!(
                    "[jmap] Email/set left {} of {} id(s) undestroyed",
                    not_destroyed.len(),
                    ids.len()
                );
            }
        }
        Ok(())
    }
}
