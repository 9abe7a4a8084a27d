//! InMemoryTransport - 開発用の送信キュー
//!
//! # 実装詳細
//! - 受け取ったバッチをそのまま記録（テストで検証できる）
//! - deduplication_id が既出のメッセージは receipt だけ返して積まない
//! - group_id ごとに sequence number を振る
//! - `fail_next_sends(n)` で次の n リクエストを失敗させられる

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{SendReceipt, TransportError, WireMessage};
use crate::ports::MessageTransport;

#[derive(Default)]
struct TransportState {
    /// リクエスト単位の記録
    batches: Vec<Vec<WireMessage>>,
    /// 実際にキューに積まれたメッセージ
    accepted: Vec<WireMessage>,
    seen_dedup_ids: HashSet<String>,
    /// Last sequence number per group.
    sequences: HashMap<String, u64>,
    next_message_id: u64,
    fail_next: usize,
}

#[derive(Default)]
pub struct InMemoryTransport {
    state: Mutex<TransportState>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next_sends(&self, n: usize) {
        self.state.lock().await.fail_next = n;
    }

    /// 成功したリクエストのバッチ
    pub async fn batches(&self) -> Vec<Vec<WireMessage>> {
        self.state.lock().await.batches.clone()
    }

    /// 重複排除後にキューに積まれたメッセージ
    pub async fn sent(&self) -> Vec<WireMessage> {
        self.state.lock().await.accepted.clone()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn send_batch(&self, batch: Vec<WireMessage>) -> Result<Vec<SendReceipt>, TransportError> {
        let mut state = self.state.lock().await;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransportError::Unreachable(
                "injected in-memory transport failure".to_string(),
            ));
        }

        let mut receipts = Vec::with_capacity(batch.len());
        for message in &batch {
            state.next_message_id += 1;
            let message_id = format!("mem-{}", state.next_message_id);

            if !state.seen_dedup_ids.insert(message.deduplication_id.clone()) {
                debug!(id = %message.id, "duplicate deduplication id, not enqueued");
                receipts.push(SendReceipt {
                    id: message.id.clone(),
                    message_id,
                    sequence_number: None,
                });
                continue;
            }

            let seq = state.sequences.entry(message.group_id.clone()).or_insert(0);
            *seq += 1;
            let sequence_number = Some(seq.to_string());

            state.accepted.push(message.clone());
            receipts.push(SendReceipt {
                id: message.id.clone(),
                message_id,
                sequence_number,
            });
        }
        state.batches.push(batch);
        Ok(receipts)
    }
}
