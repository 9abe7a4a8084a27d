//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（タスクストア、送信キュー、プロセス supervisor）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod liveness;
pub mod message_transport;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::liveness::{
    EXIT_LIVENESS_FAILURE, LivenessFailure, LivenessSink, LogLivenessSink, WatchLivenessSink,
};
pub use self::message_transport::{MAX_BATCH_ENTRIES, MessageTransport};
pub use self::task_store::{TaskStore, effective_limit};
