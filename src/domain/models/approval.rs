//! Approval token vocabulary.
//!
//! Gate approval is an explicit act. Only a small fixed set of tokens is
//! accepted; casual affirmatives ("ok", "sure") are rejected with a distinct
//! error so a throwaway reply in a review thread never approves a gate.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Tokens that count as an explicit approval.
pub const ACCEPTED_TOKENS: [&str; 4] = ["approved", "approve", "yes", "accept"];

/// A validated approval token. Construction is the validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalToken(String);

impl ApprovalToken {
    /// Case-insensitive match against the accepted vocabulary. Anything
    /// else, known-casual or unknown, is `AmbiguousApproval`.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalized = raw.trim().to_lowercase();
        if ACCEPTED_TOKENS.contains(&normalized.as_str()) {
            Ok(Self(normalized))
        } else {
            Err(DomainError::AmbiguousApproval {
                token: raw.trim().to_string(),
                accepted: ACCEPTED_TOKENS.join(", "),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
