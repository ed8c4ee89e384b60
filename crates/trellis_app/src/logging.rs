//! Log output setup

use tracing_subscriber::EnvFilter;

/// Install a formatted `tracing` subscriber filtered by `filter`.
///
/// `RUST_LOG`, when set and valid, replaces `filter`. Only the first call in
/// a process installs anything; returns whether this call did.
pub fn init(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("info");
        assert!(!init("debug"));
    }
}
