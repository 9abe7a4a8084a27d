//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: seed ファイルから読める TaskStore
//! - **InMemoryTransport**: バッチを記録するだけの MessageTransport
//!
//! # 本番用実装
//! 本番用の adapter（ドキュメントストア、FIFO キュー）は別クレートに置きます。

pub mod inmem_store;
pub mod inmem_transport;

pub use self::inmem_store::InMemoryTaskStore;
pub use self::inmem_transport::InMemoryTransport;
