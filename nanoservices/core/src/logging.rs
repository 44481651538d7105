use tracing_subscriber::EnvFilter;

/// Directives applied when `RUST_LOG` is unset. Connection-level chatter from
/// the HTTP stack is kept at `warn`.
pub const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_DIRECTIVES`]. Safe to call repeatedly;
/// only the first call installs anything.
pub fn init() {
    init_with(DEFAULT_DIRECTIVES);
}

/// Like [`init`], with caller-chosen defaults for when `RUST_LOG` is unset.
pub fn init_with(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init_with("debug");
        tracing::info!(stage = "fetch", "logging still works after repeated init");
    }
}
