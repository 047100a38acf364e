use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

/// Env var with log filter directives, e.g. `lifecycle=debug,db=info`
pub const LOG_ENV: &str = "LIFECYCLE_LOG";

/// Installs global stderr subscriber. Subsequent calls do nothing.
pub fn setup() {
    static FLAG: AtomicBool = AtomicBool::new(false);
    if FLAG.swap(true, Ordering::SeqCst) {
        return;
    }
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(err) = res {
        // someone (e.g. test harness) already installed a subscriber
        eprintln!("warning: logging not initialized: {}", err);
    }
}
