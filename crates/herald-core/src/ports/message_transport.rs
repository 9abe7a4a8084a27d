//! MessageTransport port - 順序付き送信キュー（FIFO キューなど）
//!
//! transport はワイヤプロトコルの詳細を隠します。
//! group_id 内の順序保証と deduplication_id による重複排除はキュー側の責務で、
//! このクレートは入力を用意するだけです。

use async_trait::async_trait;

use crate::domain::{SendReceipt, TransportError, WireMessage};

/// Upper bound on entries per batch request for ordered queues.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// MessageTransport はバッチ送信の境界
///
/// # 設計原則
/// - 1 回の呼び出し = 1 リクエスト（分割は publisher 側）
/// - 成功時はメッセージごとの receipt を送信順で返す
/// - transport レベルのエラーは加工せずに返す
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_batch(&self, batch: Vec<WireMessage>) -> Result<Vec<SendReceipt>, TransportError>;
}
