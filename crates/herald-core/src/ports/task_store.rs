//! TaskStore port - タスクの正本（source of truth）
//!
//! スキーマや接続管理はこのクレートの外側の責務です。
//! ここでは dispatch サイクルが必要とする 2 つのクエリだけを定義します。

use async_trait::async_trait;

use crate::domain::{StoreError, SyncTask, TaskKey, TokenTypeFilter};

/// TaskStore は未 claim のタスク取得と claim 書き込みを提供
///
/// # 契約
/// - `find_unclaimed`: `is_processing` が未設定または false のタスクを
///   priority desc, created_at desc で最大 `limit` 件返す。`limit == 0` は 1 扱い。
///   該当なしは空の Vec（エラーではない）。
/// - `mark_claimed`: 複合キーに一致するタスクを `is_processing = true`,
///   `sent_at = now` にする。一致なしは no-op。読み取りとは別トランザクション。
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_unclaimed(
        &self,
        limit: usize,
        filter: &TokenTypeFilter,
    ) -> Result<Vec<SyncTask>, StoreError>;

    async fn mark_claimed(&self, key: &TaskKey) -> Result<(), StoreError>;
}

/// `limit` の正規化（0 は 1 件）
pub fn effective_limit(limit: usize) -> usize {
    limit.max(1)
}
