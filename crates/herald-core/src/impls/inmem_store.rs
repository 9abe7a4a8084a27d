//! InMemoryTaskStore - 開発用・テスト用の TaskStore
//!
//! # 実装詳細
//! - `Vec<SyncTask>` を tokio::sync::Mutex で保護
//! - claim 時刻は注入した Clock から取る
//! - JSON ファイル（SyncTask の配列）から初期データを読み込める
//! - テスト用に fetch / claim の失敗を注入できる

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::{StoreError, SyncTask, TaskKey, TokenTypeFilter, dispatch_order};
use crate::ports::{Clock, SystemClock, TaskStore, effective_limit};

#[derive(Default)]
struct StoreState {
    tasks: Vec<SyncTask>,
    fail_next_finds: usize,
    /// task_id whose claim write fails.
    failing_claims: HashSet<String>,
}

pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<SyncTask>) -> Self {
        self.state.get_mut().tasks = tasks;
        self
    }

    /// JSON 配列のファイルから読み込む
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
        let tasks: Vec<SyncTask> = serde_json::from_str(&content)
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), tasks = tasks.len(), "seeded in-memory task store");
        Ok(Self::new().with_tasks(tasks))
    }

    pub async fn insert(&self, task: SyncTask) {
        self.state.lock().await.tasks.push(task);
    }

    pub async fn snapshot(&self) -> Vec<SyncTask> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn get(&self, key: &TaskKey) -> Option<SyncTask> {
        let state = self.state.lock().await;
        state.tasks.iter().find(|t| t.matches_key(key)).cloned()
    }

    pub async fn fail_next_finds(&self, n: usize) {
        self.state.lock().await.fail_next_finds = n;
    }

    pub async fn fail_claims_for(&self, task_id: impl Into<String>) {
        self.state.lock().await.failing_claims.insert(task_id.into());
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_unclaimed(
        &self,
        limit: usize,
        filter: &TokenTypeFilter,
    ) -> Result<Vec<SyncTask>, StoreError> {
        let mut state = self.state.lock().await;
        if state.fail_next_finds > 0 {
            state.fail_next_finds -= 1;
            return Err(StoreError::Unavailable("injected find failure".to_string()));
        }

        let mut eligible: Vec<SyncTask> = state
            .tasks
            .iter()
            .filter(|t| t.is_eligible(filter))
            .cloned()
            .collect();
        eligible.sort_by(dispatch_order);
        eligible.truncate(effective_limit(limit));
        Ok(eligible)
    }

    async fn mark_claimed(&self, key: &TaskKey) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        if state.failing_claims.contains(&key.task_id) {
            return Err(StoreError::Query(format!("injected claim failure for {key}")));
        }

        info!(task = %key, "set task in processing");
        // findOneAndUpdate 相当: 最初の 1 件だけ更新、なければ no-op
        if let Some(task) = state.tasks.iter_mut().find(|t| t.matches_key(key)) {
            task.mark_claimed(now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TokenType;
    use crate::ports::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rstest::rstest;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn task(id: &str, token_type: &str, priority: i64, minutes: i64) -> SyncTask {
        SyncTask::new("0xabc", "1", TokenType::new(token_type), id, base() + Duration::minutes(minutes))
            .with_priority(priority)
    }

    fn ids(tasks: &[SyncTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.task_id.as_str()).collect()
    }

    #[tokio::test]
    async fn priority_beats_recency() {
        let store = InMemoryTaskStore::new()
            .with_tasks(vec![task("A", "ERC721", 1, 1), task("B", "ERC721", 2, 2)]);

        let found = store.find_unclaimed(2, &TokenTypeFilter::Both).await.unwrap();

        assert_eq!(ids(&found), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn equal_priority_returns_newest_first() {
        let store = InMemoryTaskStore::new().with_tasks(vec![
            task("old", "ERC721", 0, 0),
            task("new", "ERC721", 0, 30),
            task("mid", "ERC721", 0, 15),
        ]);

        let found = store.find_unclaimed(3, &TokenTypeFilter::Both).await.unwrap();

        assert_eq!(ids(&found), vec!["new", "mid", "old"]);
    }

    #[rstest]
    #[case::zero(0, 1)]
    #[case::one(1, 1)]
    #[case::more_than_pool(10, 3)]
    #[tokio::test]
    async fn limit_is_respected(#[case] limit: usize, #[case] expected: usize) {
        let store = InMemoryTaskStore::new().with_tasks(vec![
            task("A", "ERC721", 0, 0),
            task("B", "ERC721", 0, 1),
            task("C", "ERC721", 0, 2),
        ]);

        let found = store.find_unclaimed(limit, &TokenTypeFilter::Both).await.unwrap();

        assert_eq!(found.len(), expected);
    }

    #[tokio::test]
    async fn claimed_tasks_are_never_returned() {
        let mut claimed = task("claimed", "ERC721", 9, 9);
        claimed.is_processing = Some(true);
        let mut reset = task("reset", "ERC721", 0, 0);
        reset.is_processing = Some(false);
        let store = InMemoryTaskStore::new().with_tasks(vec![claimed, reset, task("fresh", "ERC721", 0, 1)]);

        let found = store.find_unclaimed(10, &TokenTypeFilter::Both).await.unwrap();

        assert_eq!(ids(&found), vec!["fresh", "reset"]);
        assert!(found.iter().all(|t| t.is_processing != Some(true)));
    }

    #[rstest]
    #[case::both("both", vec!["b", "a"])]
    #[case::only_a("ERC721", vec!["a"])]
    #[case::only_b("ERC1155", vec!["b"])]
    #[case::unknown("ERC20", vec![])]
    #[tokio::test]
    async fn token_type_filter(#[case] filter: &str, #[case] expected: Vec<&str>) {
        let store = InMemoryTaskStore::new()
            .with_tasks(vec![task("a", "ERC721", 0, 0), task("b", "ERC1155", 0, 1)]);
        let filter: TokenTypeFilter = filter.parse().unwrap();

        let found = store.find_unclaimed(10, &filter).await.unwrap();

        assert_eq!(ids(&found), expected);
    }

    #[tokio::test]
    async fn empty_pool_is_not_an_error() {
        let store = InMemoryTaskStore::new();
        let found = store.find_unclaimed(5, &TokenTypeFilter::Both).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn mark_claimed_stamps_task_with_clock() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let store = InMemoryTaskStore::with_clock(Arc::new(FixedClock::new(now)))
            .with_tasks(vec![task("A", "ERC721", 0, 0)]);
        let key = task("A", "ERC721", 0, 0).key();

        store.mark_claimed(&key).await.unwrap();

        let stored = store.get(&key).await.unwrap();
        assert_eq!(stored.is_processing, Some(true));
        assert_eq!(stored.sent_at, Some(now));
    }

    #[tokio::test]
    async fn mark_claimed_on_missing_key_is_noop() {
        let store = InMemoryTaskStore::new().with_tasks(vec![task("A", "ERC721", 0, 0)]);
        let missing = task("nope", "ERC721", 0, 0).key();

        store.mark_claimed(&missing).await.unwrap();

        assert_eq!(store.snapshot().await[0].is_processing, None);
    }

    #[tokio::test]
    async fn seeds_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"[{"contractAddress":"0xabc","tokenId":"1","tokenType":"ERC721","taskId":"t-1","priority":3,"createdAt":"2024-01-01T00:00:00Z"}]"#,
        )
        .unwrap();

        let store = InMemoryTaskStore::from_json_file(&path).await.unwrap();

        let tasks = store.snapshot().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, 3);
    }

    #[tokio::test]
    async fn bad_seed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "not json").unwrap();

        let err = InMemoryTaskStore::from_json_file(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Seed(_)));
    }
}
