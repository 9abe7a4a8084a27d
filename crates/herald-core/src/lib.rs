//! herald-core
//!
//! Dispatch relay: moves unclaimed tasks from a task store onto an ordered
//! outbound queue, one guarded cycle per tick.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（SyncTask, OutboundMessage, ids, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, MessageTransport, IdGenerator, Clock, LivenessSink）
//! - **app**: アプリケーションロジック（DispatchLoop, ConcurrencyGuard, Watchdog, MessagePublisher）
//! - **impls**: 実装（InMemoryTaskStore, InMemoryTransport など開発用）
//! - **config**: YAML + 環境変数の設定読み込み
//! - **logging**: tracing subscriber の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod logging;
pub mod ports;
