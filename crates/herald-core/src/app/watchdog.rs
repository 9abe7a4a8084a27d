//! Watchdog - skip 上限での再起動要求
//!
//! 独自のタイマーは持たず、ConcurrencyGuard の skip カウンタを見るだけです。
//! 戻ってこないサイクル（タイムアウトのない I/O など）はガードの内側からは解放できないので、
//! tick の粒度で外側から検出し、LivenessSink 経由で supervisor に再起動を任せます。

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::error;

use crate::ports::LivenessSink;

pub struct Watchdog {
    sink: Arc<dyn LivenessSink>,
    trips: AtomicU32,
}

impl Watchdog {
    pub fn new(sink: Arc<dyn LivenessSink>) -> Self {
        Self {
            sink,
            trips: AtomicU32::new(0),
        }
    }

    /// 上限到達の tick ごとに 1 回だけ呼ぶ
    pub fn trip(&self, skipped: u32, limit: u32) {
        self.trips.fetch_add(1, Ordering::AcqRel);
        error!(
            skipped,
            limit, "skipping counter reached its limit, requesting process restart"
        );
        self.sink.restart_requested(skipped);
    }

    pub fn trips(&self) -> u32 {
        self.trips.load(Ordering::Acquire)
    }
}
