//! Errors - エラー型と分類
//!
//! サイクル内のエラーはすべてサイクル境界で捕捉され、ログに残ります。
//! スケジューラまで伝播するものはありません。

use thiserror::Error;

use super::task::TaskKey;

/// ErrorKind は運用上の分類（ログのフィールドに使う）
///
/// - Transient: 次の tick で自然にリトライされる
/// - Infrastructure: ストア・キューなど外部システムの障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

/// TaskStore からのエラー
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task store unavailable: {0}")]
    Unavailable(String),

    #[error("task store query failed: {0}")]
    Query(String),

    #[error("failed to load seed tasks: {0}")]
    Seed(String),
}

/// 送信キュー（transport）からのエラー
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("queue rejected batch: {0}")]
    Rejected(String),

    #[error("queue unreachable: {0}")]
    Unreachable(String),
}

/// 1 サイクル内で起こりうる失敗
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("fetch unclaimed tasks failed: {0}")]
    Fetch(#[source] StoreError),

    #[error("publish failed: {0}")]
    Publish(#[source] TransportError),

    #[error("claim failed for {key}: {source}")]
    Claim {
        key: TaskKey,
        #[source]
        source: StoreError,
    },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Publish(TransportError::Encode(_)) => ErrorKind::Transient,
            DispatchError::Fetch(_) | DispatchError::Publish(_) | DispatchError::Claim { .. } => {
                ErrorKind::Infrastructure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_error_message_names_the_task() {
        let err = DispatchError::Claim {
            key: TaskKey {
                contract_address: "0xabc".into(),
                token_id: "1".into(),
                task_id: "t-1".into(),
            },
            source: StoreError::Query("timeout".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("0xabc"));
        assert!(msg.contains("t-1"));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }
}
