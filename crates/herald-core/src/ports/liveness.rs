//! LivenessSink port - 再起動シグナルの出口
//!
//! watchdog が skip 上限に達したとき、プロセス内で自分を再起動するのではなく、
//! 外部の supervisor が観測できる形でシグナルを出します。
//!
//! # 実装
//! - **WatchLivenessSink**: tokio::sync::watch で binary に通知（binary が専用 exit code で終了）
//! - **LogLivenessSink**: ログのみ

use tokio::sync::watch;
use tracing::error;

/// Exit status the binary uses for a liveness failure (EX_TEMPFAIL).
pub const EXIT_LIVENESS_FAILURE: i32 = 75;

/// LivenessSink は再起動要求を受け取る
pub trait LivenessSink: Send + Sync {
    /// `skipped`: 連続して skip された tick の数
    fn restart_requested(&self, skipped: u32);
}

/// Liveness failure as seen by whoever owns the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessFailure {
    pub skipped: u32,
}

/// watch channel に最初の失敗を書き込む
pub struct WatchLivenessSink {
    tx: watch::Sender<Option<LivenessFailure>>,
}

impl WatchLivenessSink {
    pub fn channel() -> (Self, watch::Receiver<Option<LivenessFailure>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl LivenessSink for WatchLivenessSink {
    fn restart_requested(&self, skipped: u32) {
        // 最初の 1 回だけ記録する
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(LivenessFailure { skipped });
            true
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogLivenessSink;

impl LivenessSink for LogLivenessSink {
    fn restart_requested(&self, skipped: u32) {
        error!(skipped, "dispatcher is wedged, restart requested");
    }
}
