//! tracing subscriber の初期化
//!
//! `log_level` が EnvFilter として解釈できなければ `RUST_LOG`、それも無ければ `info`。

use tracing_subscriber::EnvFilter;

/// fmt subscriber を global に入れる。すでに入っていれば何もしない
pub fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already initialized, skipping");
    }
}
