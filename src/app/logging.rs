// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Transport crates that are chatty at debug level.
const QUIET_MODULES: &[&str] = &[
    "h2",
    "hyper",
    "hyper_util",
    "reqwest",
    "alloy_transport_http",
    "alloy_rpc_client",
];

/// Expands a bare level (e.g. "debug") with quiet defaults for transport crates.
/// Directive strings (with ',' or '=') are kept as-is.
pub fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.contains(',') || normalized.contains('=') {
        return normalized.to_string();
    }
    let base = if normalized.is_empty() { "info" } else { normalized };
    let quiet = QUIET_MODULES
        .iter()
        .map(|m| format!("{m}=info"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{base},{quiet}")
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    let spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let installed = if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false);
        subscriber.with(json_layer).try_init().is_ok()
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).try_init().is_ok()
    };

    if installed {
        tracing::info!(
            base = spec.split(',').next().unwrap_or("info"),
            format = if json_format { "json" } else { "compact" },
            "Logging initialized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_gets_quiet_transport_defaults() {
        let spec = filter_spec("debug");
        assert!(spec.starts_with("debug,"));
        assert!(spec.contains("hyper=info"));
        assert!(spec.contains("alloy_transport_http=info"));
    }

    #[test]
    fn custom_directives_are_untouched() {
        assert_eq!(filter_spec("warn,fleetops=trace"), "warn,fleetops=trace");
        assert!(filter_spec("  ").starts_with("info,"));
    }
}
