//! DispatchLoop - 未処理タスクを拾って送信キューへ流すループ
//!
//! # フロー（1 サイクル）
//! 1. TaskStore::find_unclaimed() で未処理タスクを取得（空ならそこで終了）
//! 2. MessagePublisher::compose() → send()
//! 3. 送信に成功したタスクを 1 件ずつ TaskStore::mark_claimed()
//!
//! # 実装詳細
//! - tick ごとに ConcurrencyGuard を試し、取れたらサイクルを tokio task で走らせる
//!   （サイクルが I/O で止まっていても次の tick は届く）
//! - 取れなければ skip。上限に達したら Watchdog が再起動を要求し、`run()` は
//!   `LoopExit::LivenessFailure` で抜ける
//! - サイクル内のエラーは CycleReport に入れてログに残すだけ。スケジューラには伝播しない
//! - 送信に失敗したタスクは claim しない（次の tick で同じタスクがまた取れる）
//! - shutdown 時の待ち時間は watchdog と同じ予算。止まったサイクルは abort する

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::app::guard::{Admission, ConcurrencyGuard};
use crate::app::publisher::MessagePublisher;
use crate::app::watchdog::Watchdog;
use crate::domain::{DispatchError, TokenTypeFilter};
use crate::ports::{LivenessSink, TaskStore};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Tasks fetched per cycle (0 is treated as 1 by the store).
    pub message_num: usize,
    pub token_type: TokenTypeFilter,
    pub tick_interval: Duration,
    pub skipping_counter_limit: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            message_num: 1,
            token_type: TokenTypeFilter::Both,
            tick_interval: Duration::from_secs(5),
            skipping_counter_limit: 10,
        }
    }
}

/// What one cycle did. Errors never leave the cycle; they end up here.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub fetched: usize,
    pub published: usize,
    pub claimed: usize,
    pub claim_failures: Vec<DispatchError>,
    /// Fetch or publish failure that ended the cycle early.
    pub error: Option<DispatchError>,
}

#[derive(Debug)]
pub enum TickOutcome {
    Started(JoinHandle<CycleReport>),
    Skipped { skipped: u32, limit: u32 },
    RestartRequested { skipped: u32, limit: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    LivenessFailure { skipped: u32 },
    /// Shutdown was requested but the in-flight cycle did not finish within
    /// `tick_interval * skipping_counter_limit`; it was aborted.
    DrainTimedOut,
}

pub struct DispatchLoop {
    store: Arc<dyn TaskStore>,
    publisher: MessagePublisher,
    guard: Arc<ConcurrencyGuard>,
    watchdog: Watchdog,
    settings: DispatchSettings,
}

impl DispatchLoop {
    pub fn new(
        store: Arc<dyn TaskStore>,
        publisher: MessagePublisher,
        sink: Arc<dyn LivenessSink>,
        settings: DispatchSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            publisher,
            guard: ConcurrencyGuard::new(settings.skipping_counter_limit),
            watchdog: Watchdog::new(sink),
            settings,
        })
    }

    pub fn guard(&self) -> &ConcurrencyGuard {
        &self.guard
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// 1 tick 分の処理。ブロックしない（サイクルは spawn される）
    pub fn tick(self: &Arc<Self>) -> TickOutcome {
        match self.guard.try_acquire() {
            Admission::Acquired(permit) => {
                let this = Arc::clone(self);
                TickOutcome::Started(tokio::spawn(async move {
                    // permit はサイクル終了（panic 含む）で drop される
                    let _permit = permit;
                    this.run_cycle().await
                }))
            }
            Admission::Skipped { skipped, limit } => {
                warn!(skipped, limit, "previous cycle still running, skipping tick");
                TickOutcome::Skipped { skipped, limit }
            }
            Admission::LimitReached { skipped, limit } => {
                self.watchdog.trip(skipped, limit);
                TickOutcome::RestartRequested { skipped, limit }
            }
        }
    }

    /// 1 サイクルだけ回して結果を待つ。ガードが取れない・サイクルが panic した場合は None
    pub async fn run_once(self: &Arc<Self>) -> Option<CycleReport> {
        match self.tick() {
            TickOutcome::Started(handle) => match handle.await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!(error = %e, "dispatch cycle task failed");
                    None
                }
            },
            TickOutcome::Skipped { .. } | TickOutcome::RestartRequested { .. } => None,
        }
    }

    /// shutdown か liveness failure までループする
    ///
    /// 最初の tick は `tick_interval` 後。shutdown 時は実行中のサイクルを
    /// `tick_interval * skipping_counter_limit` まで待ち、終わらなければ abort して
    /// `LoopExit::DrainTimedOut` を返す。
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> LoopExit {
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval の 1 回目は即時なので捨てる
        ticker.tick().await;

        info!(
            interval_ms = self.settings.tick_interval.as_millis() as u64,
            message_num = self.settings.message_num,
            token_type = %self.settings.token_type,
            limit = self.guard.limit(),
            "dispatch loop started"
        );

        let mut in_flight: Option<JoinHandle<CycleReport>> = None;
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    // sender が drop されたら止める
                    if changed.is_err() {
                        break;
                    }
                }

                _ = ticker.tick() => match self.tick() {
                    TickOutcome::Started(handle) => in_flight = Some(handle),
                    TickOutcome::Skipped { .. } => {}
                    TickOutcome::RestartRequested { skipped, .. } => {
                        return LoopExit::LivenessFailure { skipped };
                    }
                },
            }
        }

        if let Some(mut handle) = in_flight.take() {
            let budget = self.drain_budget();
            debug!(budget_ms = budget.as_millis() as u64, "waiting for in-flight cycle before shutdown");
            match tokio::time::timeout(budget, &mut handle).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(error = %e, "dispatch cycle task failed"),
                Err(_) => {
                    handle.abort();
                    error!(
                        budget_ms = budget.as_millis() as u64,
                        "in-flight cycle did not finish before shutdown, aborted"
                    );
                    return LoopExit::DrainTimedOut;
                }
            }
        }
        info!("dispatch loop stopped");
        LoopExit::Shutdown
    }

    /// ちょうど watchdog が再起動を要求するまでの時間
    fn drain_budget(&self) -> Duration {
        self.settings.tick_interval.saturating_mul(self.guard.limit())
    }

    async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        if let Err(err) = self.dispatch(&mut report).await {
            error!(kind = err.kind().as_str(), error = %err, "dispatch cycle aborted");
            report.error = Some(err);
        }
        report
    }

    async fn dispatch(&self, report: &mut CycleReport) -> Result<(), DispatchError> {
        let tasks = self
            .store
            .find_unclaimed(self.settings.message_num, &self.settings.token_type)
            .await
            .map_err(DispatchError::Fetch)?;
        report.fetched = tasks.len();
        if tasks.is_empty() {
            debug!("no unclaimed tasks");
            return Ok(());
        }
        info!(fetched = tasks.len(), "found {} unclaimed tasks", tasks.len());

        let messages = self.publisher.compose(&tasks);
        let receipts = self
            .publisher
            .send(messages)
            .await
            .map_err(DispatchError::Publish)?;
        report.published = receipts.len();
        info!(sent = receipts.len(), "sent {} messages", receipts.len());

        // 1 件の失敗で残りを止めない
        for task in &tasks {
            let key = task.key();
            match self.store.mark_claimed(&key).await {
                Ok(()) => report.claimed += 1,
                Err(source) => {
                    let err = DispatchError::Claim { key, source };
                    warn!(kind = err.kind().as_str(), error = %err, "failed to set task in processing");
                    report.claim_failures.push(err);
                }
            }
        }
        Ok(())
    }
}
