use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `EQUIBATCH_LOG` first, then `RUST_LOG`, then a default.
///
/// Log field contract:
/// - Flush events carry `sample_count` and `reason` (`footprint`, `size` or `end_of_input`).
/// - Oversized-sample warnings carry the offending `length` and the configured `max_footprint`.
pub fn init_tracing() {
    let filter = env_filter();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("EQUIBATCH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
