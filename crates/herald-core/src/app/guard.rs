//! ConcurrencyGuard - 非再入ガード + skip カウンタ
//!
//! # 状態
//! - Idle: state word が 0
//! - Running: `RUNNING` ビットが立っている（permit が生きている間）
//!
//! running フラグと skip カウンタは 1 つの `AtomicU32` にまとめてあり、
//! acquire / skip / release はどれも 1 回のアトミック操作です。
//! Idle に戻るときは常にカウンタ 0 で戻ります。
//!
//! ブロッキングロックではありません。実行中なら待たずに skip します。
//! サイクルが成功しても失敗しても（panic しても）permit の drop で必ず解放されます。

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

const RUNNING: u32 = 1 << 31;
const COUNT_MASK: u32 = RUNNING - 1;

/// Result of asking the guard for a new cycle.
#[derive(Debug)]
pub enum Admission {
    /// Guard acquired. Dropping the permit releases it.
    Acquired(GuardPermit),

    /// A cycle is running; the counter was incremented to `skipped`.
    Skipped { skipped: u32, limit: u32 },

    /// A cycle is running and one more skip would reach `limit`.
    /// The counter is left at `skipped`.
    LimitReached { skipped: u32, limit: u32 },
}

/// ConcurrencyGuard はループ 1 つにつき 1 個（プロセス共有しない）
#[derive(Debug)]
pub struct ConcurrencyGuard {
    /// `RUNNING` ビット + 下位 31 ビットの skip カウンタ
    state: AtomicU32,
    limit: u32,
}

impl ConcurrencyGuard {
    /// `limit` は 1 以上、カウンタのビット幅以下に丸める
    pub fn new(limit: u32) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU32::new(0),
            limit: limit.clamp(1, COUNT_MASK),
        })
    }

    pub fn try_acquire(self: &Arc<Self>) -> Admission {
        let limit = self.limit;
        let result = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                if state & RUNNING == 0 {
                    Some(RUNNING)
                } else if (state & COUNT_MASK) + 1 < limit {
                    Some(state + 1)
                } else {
                    None
                }
            });

        match result {
            Ok(prev) if prev & RUNNING == 0 => Admission::Acquired(GuardPermit {
                guard: Arc::clone(self),
            }),
            Ok(prev) => Admission::Skipped {
                skipped: (prev & COUNT_MASK) + 1,
                limit,
            },
            Err(current) => Admission::LimitReached {
                skipped: current & COUNT_MASK,
                limit,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) & RUNNING != 0
    }

    pub fn skipped(&self) -> u32 {
        self.state.load(Ordering::Acquire) & COUNT_MASK
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Proof of guard ownership for one cycle.
#[derive(Debug)]
pub struct GuardPermit {
    guard: Arc<ConcurrencyGuard>,
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        // フラグとカウンタを同時に落とす
        self.guard.state.store(0, Ordering::Release);
    }
}
