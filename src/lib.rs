pub mod config;
pub mod models;
pub mod db;
pub mod pipeline;
pub mod worker;

use tracing_subscriber::EnvFilter;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for binaries and long-running hosts.
/// Library consumers that install their own subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("labtrail starting v{}", APP_VERSION);
}
