// モジュール定義
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
mod state;

pub use state::SyncRuntime;

/// ログ設定の初期化。`RUST_LOG` があればそれを使う。
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // 二重初期化（テストや埋め込み先）は無視する
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recordsync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
