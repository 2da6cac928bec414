//! Sender identity extraction from free-text author headers.
//!
//! Author strings arrive from the mail store as whatever the message header
//! carried: `"Jane Doe <jane@x.com>"`, a bare address, or junk. Extraction is
//! best effort and total: every string maps to an identity, and two authors
//! with the same extracted email are the same sender no matter how their
//! display names differ. Counting and acting on messages must both go
//! through this function.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub email: String,
    pub display_name: Option<String>,
}

/// Extract `(email, display_name)` from an author header string.
///
/// The email is the content of the first non-empty `<...>` pair; empty
/// pairs (`<>`) carry no address and are skipped. Without a usable pair
/// (none at all, unclosed `<`, or only empty ones) the whole string is
/// taken as the email, so a non-empty input never yields an empty email.
/// The display name is the trimmed text before the first `<`, or `None`
/// when absent or empty.
pub fn normalize(author: &str) -> SenderIdentity {
    if let Some(first_open) = author.find('<') {
        let name = author[..first_open].trim();
        let display_name = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };

        let mut open = first_open;
        loop {
            match author[open + 1..].find('>') {
                Some(0) => match author[open + 1..].find('<') {
                    Some(next_rel) => open = open + 1 + next_rel,
                    None => break,
                },
                Some(close_rel) => {
                    return SenderIdentity {
                        email: author[open + 1..open + 1 + close_rel].to_string(),
                        display_name,
                    };
                }
                None => break,
            }
        }
    }

    SenderIdentity {
        email: author.to_string(),
        display_name: None,
    }
}
