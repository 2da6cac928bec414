//! JSON-over-stdin/stdout request/response mode.
//!
//! One JSON object per line in, one per line out. Every response carries the
//! uniform envelope: `{"success": true, ...}` or `{"success": false,
//! "error": "..."}`. No panic or error type crosses this boundary; store and
//! engine failures are flattened to the error string here.

use crate::aggregate::SenderAggregate;
use crate::config::Config;
use crate::normalize::normalize;
use crate::query::{delete_all_from, previews_from};
use crate::stats::StatsSession;
use crate::store::{MailStore, MessageDetail};
use regex::Regex;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};

struct CliState {
    config: Config,
    inbox_regex: Regex,
    stores: Vec<Box<dyn MailStore>>,
    connected_accounts: Vec<String>,
    session: StatsSession,
    active_filter: Option<String>,
}

impl CliState {
    fn require_connected(&self) -> Result<(), String> {
        if self.stores.is_empty() {
            return Err("not connected (run the connect command first)".to_string());
        }
        Ok(())
    }
}

fn ok_response(data: Value) -> Value {
    let mut obj = match data {
        Value::Object(m) => m,
        _ => {
            let mut m = serde_json::Map::new();
            m.insert("data".to_string(), data);
            m
        }
    };
    obj.insert("success".to_string(), Value::Bool(true));
    Value::Object(obj)
}

fn err_response(msg: &str) -> Value {
    json!({"success": false, "error": msg})
}

fn serialize_sender(sender: &SenderAggregate) -> Value {
    json!({
        "email": sender.email,
        "name": sender.display_name,
        "count": sender.count,
    })
}

fn serialize_preview(detail: &MessageDetail) -> Value {
    json!({
        "id": detail.id,
        "subject": detail.subject,
        "preview": detail.preview,
        "date": detail.received_at,
        "read": detail.read,
    })
}

/// Parse an optional field that must be a non-negative integer.
fn parse_offset(input: &Value) -> Result<usize, String> {
    match input.get("offset") {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| "'offset' must be a non-negative integer".to_string()),
    }
}

/// Parse an optional field that must be a positive integer.
fn parse_limit(input: &Value, field: &str, default: u32) -> Result<usize, String> {
    match input.get(field) {
        None | Some(Value::Null) => Ok(default as usize),
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => Ok(n as usize),
            _ => Err(format!("'{}' must be a positive integer", field)),
        },
    }
}

fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, String> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing '{}' field", field))
}

fn dispatch(state: &mut CliState, input: &Value) -> Value {
    let command = match input.get("command").and_then(|v| v.as_str()) {
        Some(c) => c,
        None => return err_response("missing 'command' field"),
    };

    match command {
        "list_accounts" => cmd_list_accounts(state),
        "connect" => cmd_connect(state, input),
        "status" => cmd_status(state),
        "get_sender_stats" => cmd_get_sender_stats(state, input),
        "filter_by_sender" => cmd_filter_by_sender(state, input),
        "delete_from_sender" => cmd_delete_from_sender(state, input),
        "get_previews" => cmd_get_previews(state, input),
        _ => err_response(&format!("unknown command '{}'", command)),
    }
}

// --- Command handlers ---

fn cmd_list_accounts(state: &CliState) -> Value {
    let accounts: Vec<Value> = state
        .config
        .accounts
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "username": a.username,
                "well_known_url": a.well_known_url,
            })
        })
        .collect();
    ok_response(json!({"accounts": accounts}))
}

/// Connect the named account, or every configured account when none is
/// given. Accounts that fail to connect are reported but do not fail the
/// command as long as at least one connects.
fn cmd_connect(state: &mut CliState, input: &Value) -> Value {
    let wanted = input.get("account").and_then(|v| v.as_str());

    let accounts: Vec<_> = match wanted {
        Some(name) => match state.config.accounts.iter().find(|a| a.name == name) {
            Some(a) => vec![a.clone()],
            None => return err_response(&format!("unknown account '{}'", name)),
        },
        None => state.config.accounts.clone(),
    };

    let mut stores: Vec<Box<dyn MailStore>> = Vec::new();
    let mut connected = Vec::new();
    let mut failed = Vec::new();

    for account in &accounts {
        match crate::connect_account(account, state.config.stats.scan_page_size) {
            Ok(store) => {
                connected.push(account.name.clone());
                stores.push(Box::new(store));
            }
            Err(e) => {
                log_warn!("connect failed for account {}: {}", account.name, e);
                failed.push(json!({"account": account.name, "error": e}));
            }
        }
    }

    if stores.is_empty() {
        return err_response(&format!(
            "no account reachable ({} attempted)",
            accounts.len()
        ));
    }

    state.stores = stores;
    state.connected_accounts = connected.clone();
    // Any held snapshot was computed over the previous connections
    state.session.invalidate();

    ok_response(json!({"connected": connected, "failed": failed}))
}

fn cmd_status(state: &CliState) -> Value {
    ok_response(json!({
        "connected": !state.stores.is_empty(),
        "accounts": state.connected_accounts,
        "has_snapshot": state.session.has_snapshot(),
        "scan_seq": state.session.last_scan_seq(),
        "active_filter": state.active_filter,
    }))
}

fn cmd_get_sender_stats(state: &mut CliState, input: &Value) -> Value {
    if let Err(e) = state.require_connected() {
        return err_response(&e);
    }
    let offset = match parse_offset(input) {
        Ok(o) => o,
        Err(e) => return err_response(&e),
    };
    let limit = match parse_limit(input, "limit", state.config.stats.page_size) {
        Ok(l) => l,
        Err(e) => return err_response(&e),
    };
    let refresh = input
        .get("refresh")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if let Err(e) = state.session.begin_exclusive() {
        return err_response(&e);
    }
    let page = state
        .session
        .page(&state.stores, &state.inbox_regex, offset, limit, refresh);

    let response = ok_response(json!({
        "senders": page.senders.iter().map(serialize_sender).collect::<Vec<_>>(),
        "total": page.total,
        "total_emails": page.total_emails,
        "offset": page.offset,
        "limit": page.limit,
        "scan_seq": page.scan_seq,
        "scanned_at": page.scanned_at,
    }));
    state.session.end_exclusive();
    response
}

/// Record the active quick filter. Applying the filter to the host mail
/// client's message list is the caller's side effect, not ours; accepting
/// a full author string here keeps the filter target consistent with how
/// the stats table grouped it.
fn cmd_filter_by_sender(state: &mut CliState, input: &Value) -> Value {
    let author = match required_str(input, "email") {
        Ok(s) => s,
        Err(e) => return err_response(&e),
    };

    let email = normalize(author).email;
    state.active_filter = Some(email.clone());
    ok_response(json!({"email": email}))
}

fn cmd_delete_from_sender(state: &mut CliState, input: &Value) -> Value {
    if let Err(e) = state.require_connected() {
        return err_response(&e);
    }
    let email = match required_str(input, "email") {
        Ok(s) => s.to_string(),
        Err(e) => return err_response(&e),
    };

    if let Err(e) = state.session.begin_exclusive() {
        return err_response(&e);
    }
    let result = delete_all_from(&state.stores, &state.inbox_regex, &email);
    state.session.end_exclusive();

    match result {
        // Submitted count, not a verified count: the store's delete has no
        // per-id acknowledgement. A rescan with refresh shows the outcome.
        Ok(deleted_count) => ok_response(json!({"deleted_count": deleted_count})),
        Err(e) => err_response(&format!("deletion failed: {}", e)),
    }
}

fn cmd_get_previews(state: &mut CliState, input: &Value) -> Value {
    if let Err(e) = state.require_connected() {
        return err_response(&e);
    }
    let email = match required_str(input, "email") {
        Ok(s) => s.to_string(),
        Err(e) => return err_response(&e),
    };
    let limit = match parse_limit(input, "limit", state.config.stats.preview_limit) {
        Ok(l) => l,
        Err(e) => return err_response(&e),
    };

    match previews_from(&state.stores, &state.inbox_regex, &email, limit) {
        Ok(previews) => ok_response(json!({
            "previews": previews.iter().map(serialize_preview).collect::<Vec<_>>(),
        })),
        Err(e) => err_response(&format!("preview fetch failed: {}", e)),
    }
}

pub fn run_cli(config: Config) {
    // Validated at config load; compiling again here cannot fail
    let inbox_regex = Regex::new(&config.stats.inbox_regex).expect("invalid inbox_regex");

    let mut state = CliState {
        config,
        inbox_regex,
        stores: Vec::new(),
        connected_accounts: Vec::new(),
        session: StatsSession::new(),
        active_filter: None,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let input: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                let resp = err_response(&format!("JSON parse error: {}", e));
                let _ = serde_json::to_writer(&mut stdout, &resp);
                let _ = stdout.write_all(b"\n");
                let _ = stdout.flush();
                continue;
            }
        };

        let response = dispatch(&mut state, &input);
        let _ = serde_json::to_writer(&mut stdout, &response);
        let _ = stdout.write_all(b"\n");
        let _ = stdout.flush();
    }
}

pub fn print_help_cli() {
    print!(
        r#"sst --cli: JSON-over-stdin/stdout mode
======================================

Protocol: Newline-Delimited JSON (NDJSON)
- Send one JSON object per line to stdin
- Receive one JSON response per line from stdout
- Responses have {{"success": true, ...}} on success or
  {{"success": false, "error": "..."}} on failure

Connection Flow
---------------
1. List configured accounts:
   > {{"command": "list_accounts"}}
   < {{"success": true, "accounts": [{{"name": "personal", "username": "me@example.com", ...}}]}}

2. Connect (all accounts, or one with "account": "NAME"):
   > {{"command": "connect"}}
   < {{"success": true, "connected": ["personal"], "failed": []}}

3. Check status:
   > {{"command": "status"}}
   < {{"success": true, "connected": true, "accounts": ["personal"], "has_snapshot": false, "scan_seq": null, "active_filter": null}}

Sender Statistics
-----------------
get_sender_stats: One page of the ranked sender table. The first call runs
a full inbox scan; later pages are served from that snapshot. Pass
"refresh": true to force a new scan.
   > {{"command": "get_sender_stats", "offset": 0, "limit": 50}}
   < {{"success": true, "senders": [{{"email": "a@x.com", "name": "A", "count": 3}}, ...],
      "total": 12, "total_emails": 40, "offset": 0, "limit": 50,
      "scan_seq": 1, "scanned_at": "2026-01-01T00:00:00.000Z"}}
   "limit" must be positive. "offset" past the end returns an empty page.

filter_by_sender: Record the active quick filter for the caller to apply.
Accepts a bare address or a full author string; the extracted address is
echoed back and shown in status.
   > {{"command": "filter_by_sender", "email": "Jane <jane@x.com>"}}
   < {{"success": true, "email": "jane@x.com"}}

delete_from_sender: Delete every inbox message from a sender, across all
connected accounts. Returns the number of ids submitted to the store
(best-effort, no per-id acknowledgement). Re-request stats with
"refresh": true afterwards to see corrected counts.
   > {{"command": "delete_from_sender", "email": "a@x.com"}}
   < {{"success": true, "deleted_count": 3}}

get_previews: Newest-first message previews for one sender.
   > {{"command": "get_previews", "email": "a@x.com", "limit": 10}}
   < {{"success": true, "previews": [{{"id": "...", "subject": "...", "preview": "...", "date": "...", "read": false}}]}}
"#
    );
}
