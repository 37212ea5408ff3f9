//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//! Scrapes are served on `/metrics` at `metrics.listen_addr:metrics.port`.

use std::net::SocketAddr;

use anyhow::Result;
use ironscan_core::config::MetricsConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Parse the configured listen address.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call at most once per process; a second install fails.
///
/// # Errors
///
/// - Listen address does not parse
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                ironscan_core::metrics::CONTROLLER_SCAN_DURATION_SECONDS.to_owned(),
            ),
            &ironscan_core::metrics::SCAN_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    ironscan_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_and_ipv6_addresses() {
        let config = MetricsConfig {
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            ..Default::default()
        };
        assert_eq!(listen_addr(&config).unwrap().port(), 9464);

        let config = MetricsConfig {
            listen_addr: "[::1]".to_owned(),
            ..Default::default()
        };
        assert!(listen_addr(&config).unwrap().is_ipv6());
    }

    #[test]
    fn rejects_garbage_address() {
        let config = MetricsConfig {
            listen_addr: "not an address".to_owned(),
            ..Default::default()
        };
        assert!(listen_addr(&config).is_err());
    }
}
