//! MessagePublisher - タスクを送信メッセージに変換してキューへ送る
//!
//! # フロー
//! 1. compose(): SyncTask → OutboundMessage（新しい ID を採番）
//! 2. send(): body を文字列に正規化 → `max_batch_entries` 件ずつ transport へ
//! 3. transport の receipt を送信順に連結して返す
//!
//! transport のエラーは加工せずに呼び出し側（DispatchLoop）へ返します。

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{OutboundMessage, SendReceipt, SyncTask, TransportError, WireMessage};
use crate::ports::{IdGenerator, MAX_BATCH_ENTRIES, MessageTransport};

pub struct MessagePublisher {
    transport: Arc<dyn MessageTransport>,
    id_gen: Arc<dyn IdGenerator>,
    max_batch_entries: usize,
}

impl MessagePublisher {
    pub fn new(transport: Arc<dyn MessageTransport>, id_gen: Arc<dyn IdGenerator>) -> Self {
        Self {
            transport,
            id_gen,
            max_batch_entries: MAX_BATCH_ENTRIES,
        }
    }

    /// 1..=MAX_BATCH_ENTRIES に丸める
    pub fn with_max_batch_entries(mut self, n: usize) -> Self {
        self.max_batch_entries = n.clamp(1, MAX_BATCH_ENTRIES);
        self
    }

    pub fn compose(&self, tasks: &[SyncTask]) -> Vec<OutboundMessage> {
        tasks
            .iter()
            .map(|task| {
                info!(
                    contract_address = %task.contract_address,
                    token_id = %task.token_id,
                    task_id = %task.task_id,
                    "found unclaimed task, will be sent"
                );
                OutboundMessage::for_task(self.id_gen.generate_message_id(), task)
            })
            .collect()
    }

    pub async fn send(
        &self,
        messages: Vec<OutboundMessage>,
    ) -> Result<Vec<SendReceipt>, TransportError> {
        let wire = messages
            .into_iter()
            .map(OutboundMessage::into_wire)
            .collect::<Result<Vec<WireMessage>, _>>()?;

        let mut receipts = Vec::with_capacity(wire.len());
        let mut pending = wire.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<WireMessage> = pending.by_ref().take(self.max_batch_entries).collect();
            debug!(entries = batch.len(), "sending batch");
            receipts.extend(self.transport.send_batch(batch).await?);
        }
        Ok(receipts)
    }

    pub async fn send_one(&self, message: OutboundMessage) -> Result<SendReceipt, TransportError> {
        self.send(vec![message])
            .await?
            .pop()
            .ok_or_else(|| TransportError::Rejected("queue returned no receipt".to_string()))
    }
}
