//! App - アプリケーション層
//!
//! ports を組み合わせて dispatch サイクルを実装します。
//!
//! # 主要コンポーネント
//! - **DispatchLoop**: tick → guard → fetch → publish → claim
//! - **ConcurrencyGuard**: 非再入ガード + skip カウンタ
//! - **Watchdog**: skip 上限で再起動を要求
//! - **MessagePublisher**: タスク → メッセージ → 送信キュー

pub mod dispatch_loop;
pub mod guard;
pub mod publisher;
pub mod watchdog;

// 主要な型を再エクスポート
pub use self::dispatch_loop::{CycleReport, DispatchLoop, DispatchSettings, LoopExit, TickOutcome};
pub use self::guard::{Admission, ConcurrencyGuard, GuardPermit};
pub use self::publisher::MessagePublisher;
pub use self::watchdog::Watchdog;
