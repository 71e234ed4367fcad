use std::{sync::OnceLock, time::Duration};

use tracing::{debug, warn};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the shared `reqwest::Client` used for device polling and notifications.
///
/// Miners sit on the local network, so proxies from the environment are ignored.
pub fn build_client(request_timeout: Duration) -> reqwest::Client {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("miner-sentry/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(request_timeout.min(Duration::from_secs(5)))
        .pool_max_idle_per_host(2)
        .no_proxy();

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    builder.build().unwrap_or_else(|error| {
        warn!(
            error = %error,
            "Failed to create configured HTTP client; falling back to reqwest defaults"
        );
        reqwest::Client::new()
    })
}
