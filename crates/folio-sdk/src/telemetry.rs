//! Tracing setup for hosts embedding the SDK

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `level` for the
/// Folio crates when `RUST_LOG` is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(level: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("folio_sdk={level},folio_client={level},info").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init_tracing("debug");
        assert!(!init_tracing("debug"));
    }
}
