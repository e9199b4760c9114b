//! Tracing subscriber setup for the binary and for ad hoc debugging in tests.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, otherwise the given default level.
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the global subscriber.
///
/// Safe to call more than once; later calls are reported on stderr and
/// otherwise ignored.
pub fn init_tracing(default_level: &str, json: bool) {
    let filter = build_filter(default_level);

    let result = if json {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .finish(),
        )
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Create a span carrying the provider and tool being called.
#[macro_export]
macro_rules! tool_span {
    ($name:expr, $provider:expr, $tool:expr) => {
        tracing::info_span!($name, mcp.provider = $provider, mcp.tool = $tool)
    };
}
