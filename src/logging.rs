// SPDX-License-Identifier: MPL-2.0

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "shutter=info";

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
/// Calling it again is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_keeps_first_subscriber() {
        init();
        init();
        assert!(tracing::dispatcher::has_been_set());
        tracing::info!("logging ready");
    }
}
