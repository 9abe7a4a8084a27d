//! Sync task record: the persisted unit of deferred work.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filter value that disables the token type predicate.
pub const TOKEN_TYPE_BOTH: &str = "both";

/// Token standard of the task's token (e.g. `ERC721`, `ERC1155`).
///
/// Kept open as a string: producers may add new standards without a release here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenType(String);

impl TokenType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which token types a dispatcher picks up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TokenTypeFilter {
    /// No type predicate (`"both"`).
    #[default]
    Both,
    /// Exact match on the stored token type.
    Only(TokenType),
}

impl TokenTypeFilter {
    pub fn matches(&self, token_type: &TokenType) -> bool {
        match self {
            TokenTypeFilter::Both => true,
            TokenTypeFilter::Only(expected) => expected == token_type,
        }
    }
}

impl FromStr for TokenTypeFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == TOKEN_TYPE_BOTH {
            Ok(TokenTypeFilter::Both)
        } else {
            Ok(TokenTypeFilter::Only(TokenType::new(s)))
        }
    }
}

impl fmt::Display for TokenTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenTypeFilter::Both => f.write_str(TOKEN_TYPE_BOTH),
            TokenTypeFilter::Only(t) => t.fmt(f),
        }
    }
}

/// Composite key identifying one task (contract + token + task id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub contract_address: String,
    pub token_id: String,
    pub task_id: String,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contract: {} - tokenId: {} - taskId: {}",
            self.contract_address, self.token_id, self.task_id
        )
    }
}

/// A pending synchronization job as stored by the task store.
///
/// Serialized with camelCase keys so seed files and store rows share the
/// producers' field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTask {
    pub contract_address: String,
    pub token_id: String,
    pub token_type: TokenType,
    pub task_id: String,

    /// Higher is dispatched first.
    #[serde(default)]
    pub priority: i64,

    pub created_at: DateTime<Utc>,

    /// Claim flag. `None` means the producer never set it.
    #[serde(default)]
    pub is_processing: Option<bool>,

    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl SyncTask {
    pub fn new(
        contract_address: impl Into<String>,
        token_id: impl Into<String>,
        token_type: TokenType,
        task_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            contract_address: contract_address.into(),
            token_id: token_id.into(),
            token_type,
            task_id: task_id.into(),
            priority: 0,
            created_at,
            is_processing: None,
            sent_at: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            contract_address: self.contract_address.clone(),
            token_id: self.token_id.clone(),
            task_id: self.task_id.clone(),
        }
    }

    pub fn matches_key(&self, key: &TaskKey) -> bool {
        self.contract_address == key.contract_address
            && self.token_id == key.token_id
            && self.task_id == key.task_id
    }

    /// Unset or explicitly false.
    pub fn is_unclaimed(&self) -> bool {
        !matches!(self.is_processing, Some(true))
    }

    pub fn is_eligible(&self, filter: &TokenTypeFilter) -> bool {
        self.is_unclaimed() && filter.matches(&self.token_type)
    }

    /// Claim transition: processing flag on, stamped with the send time.
    pub fn mark_claimed(&mut self, now: DateTime<Utc>) {
        self.is_processing = Some(true);
        self.sent_at = Some(now);
    }
}

/// Selection order: priority desc, then created_at desc (newest first).
pub fn dispatch_order(a: &SyncTask, b: &SyncTask) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn task(id: &str, priority: i64, minutes: i64) -> SyncTask {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        SyncTask::new("0xabc", "1", TokenType::new("ERC721"), id, base + Duration::minutes(minutes))
            .with_priority(priority)
    }

    #[rstest]
    #[case::unset(None, true)]
    #[case::explicit_false(Some(false), true)]
    #[case::claimed(Some(true), false)]
    fn unclaimed_is_tri_state(#[case] flag: Option<bool>, #[case] expected: bool) {
        let mut t = task("A", 0, 0);
        t.is_processing = flag;
        assert_eq!(t.is_unclaimed(), expected);
    }

    #[rstest]
    #[case::both("both", "ERC1155", true)]
    #[case::exact("ERC721", "ERC721", true)]
    #[case::other("ERC721", "ERC1155", false)]
    #[case::case_sensitive("erc721", "ERC721", false)]
    fn filter_matches(#[case] filter: &str, #[case] token_type: &str, #[case] expected: bool) {
        let filter: TokenTypeFilter = filter.parse().unwrap();
        assert_eq!(filter.matches(&TokenType::new(token_type)), expected);
    }

    #[test]
    fn dispatch_order_prefers_priority_then_newest() {
        let mut tasks = vec![task("old-low", 1, 0), task("new-low", 1, 10), task("high", 2, 0)];
        tasks.sort_by(dispatch_order);

        let ids: Vec<_> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "new-low", "old-low"]);
    }

    #[test]
    fn mark_claimed_sets_flag_and_sent_at() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut t = task("A", 0, 0);
        t.mark_claimed(now);

        assert_eq!(t.is_processing, Some(true));
        assert_eq!(t.sent_at, Some(now));
        assert!(!t.is_eligible(&TokenTypeFilter::Both));
    }

    #[test]
    fn deserializes_store_shape_with_missing_claim_fields() {
        let json = r#"{
            "contractAddress": "0xabc",
            "tokenId": "42",
            "tokenType": "ERC1155",
            "taskId": "t-1",
            "createdAt": "2024-01-01T00:00:00Z"
        }"#;
        let t: SyncTask = serde_json::from_str(json).expect("deserialize");
        assert_eq!(t.priority, 0);
        assert_eq!(t.is_processing, None);
        assert_eq!(t.token_type.as_str(), "ERC1155");
    }
}
