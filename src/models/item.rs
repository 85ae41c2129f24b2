//! Item data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::extract_handle;

/// A unit of upstream activity. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Globally unique id within the source
    pub id: String,

    /// Creation time reported by the source (UTC)
    pub created_at: DateTime<Utc>,

    /// Handle of the account being evaluated, if the source knows it
    pub subject: Option<String>,

    /// Source-specific fields needed to render a notification
    pub payload: Payload,
}

/// Source-specific token fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Payload {
    /// Token display name
    pub name: String,

    /// Ticker symbol
    pub symbol: String,

    /// On-chain contract address
    pub address: String,

    /// Free-text description, may embed a creator profile link
    #[serde(default)]
    pub description: String,
}

impl Item {
    /// The handle to evaluate: the explicit subject, or one recovered
    /// from a profile link embedded in the description.
    pub fn effective_subject(&self) -> Option<String> {
        match &self.subject {
            Some(handle) if !handle.trim().is_empty() => Some(handle.clone()),
            _ => extract_handle(&self.payload.description),
        }
    }
}
