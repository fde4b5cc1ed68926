//! `traceability health`: inspect a running instance.
//!
//! Fetches `/health` and `/modules` and prints the handler state, the
//! request counters, and every registered module. With `--json` both
//! payloads are printed as a single document.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;

use crate::cli::HealthArgs;
use crate::error::{BoxError, TraceabilityError};
use crate::health::HealthResponse;
use crate::registry::ModuleInfo;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

pub async fn execute(args: HealthArgs) -> Result<(), TraceabilityError> {
    let base = args.url.trim_end_matches('/');
    let client: HttpClient = Client::builder(TokioExecutor::new()).build_http();

    if args.json {
        let health: serde_json::Value = fetch(&client, base, "/health").await?;
        let modules: serde_json::Value = fetch(&client, base, "/modules").await?;
        println!("{}", serde_json::json!({ "health": health, "modules": modules }));
    } else {
        let health: HealthResponse = fetch(&client, base, "/health").await?;
        let modules: Vec<ModuleInfo> = fetch(&client, base, "/modules").await?;
        println!("{}", render(base, &health, &modules));
    }
    Ok(())
}

/// GET `base` + `path` and decode the JSON body.
async fn fetch<T: DeserializeOwned>(
    client: &HttpClient,
    base: &str,
    path: &str,
) -> Result<T, TraceabilityError> {
    let uri: Uri = format!("{base}{path}").parse().map_err(
        |e: hyper::http::uri::InvalidUri| TraceabilityError::UriParse { source: e.into() },
    )?;

    let (status, body) = tokio::time::timeout(REQUEST_TIMEOUT, get(client, uri))
        .await
        .map_err(|_| TraceabilityError::HttpRequest {
            source: format!("GET {path} timed out after {}s", REQUEST_TIMEOUT.as_secs()).into(),
        })?
        .map_err(|source| TraceabilityError::HttpRequest { source })?;

    if !status.is_success() {
        return Err(TraceabilityError::HealthCheckFailed(status));
    }
    serde_json::from_slice(&body).map_err(|e| TraceabilityError::HttpRequest { source: e.into() })
}

async fn get(client: &HttpClient, uri: Uri) -> Result<(StatusCode, Bytes), BoxError> {
    let response = client.get(uri).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, body))
}

fn render(base: &str, health: &HealthResponse, modules: &[ModuleInfo]) -> String {
    let handler = if health.config.traceability_enabled {
        "enabled"
    } else {
        "disabled"
    };
    let stats = &health.stats;

    let mut lines = vec![
        format!(
            "\u{2713} {base} is {} (v{}, up {})",
            health.status,
            health.version,
            format_uptime(health.uptime_seconds)
        ),
        format!(
            "  traceability {handler}, config {} @ {}",
            health.config.source, health.config.version
        ),
        format!(
            "  requests: {} handled, {} traced, {} failed; {} reloads",
            stats.requests_handled,
            stats.requests_traced,
            stats.requests_failed,
            stats.config_reloads
        ),
        format!("  modules ({}):", modules.len()),
    ];
    lines.extend(
        modules
            .iter()
            .map(|m| format!("    {:<14} {}  {}", m.name, m.class, m.config)),
    );
    lines.join("\n")
}

/// Two most significant units, e.g. `1d 2h` or `3m 5s`.
fn format_uptime(seconds: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "d"), (3_600, "h"), (60, "m"), (1, "s")];

    let parts: Vec<String> = UNITS
        .iter()
        .scan(seconds, |rest, &(size, suffix)| {
            let count = *rest / size;
            *rest %= size;
            Some((count, suffix))
        })
        .skip_while(|&(count, _)| count == 0)
        .take(2)
        .map(|(count, suffix)| format!("{count}{suffix}"))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{ConfigHealth, StatsResponse};

    #[test]
    fn uptime_keeps_two_largest_units() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(42), "42s");
        assert_eq!(format_uptime(125), "2m 5s");
        assert_eq!(format_uptime(3_725), "1h 2m");
        assert_eq!(format_uptime(3_600), "1h 0m");
        assert_eq!(format_uptime(90_061), "1d 1h");
    }

    #[test]
    fn report_lists_handler_state_and_modules() {
        let health = HealthResponse {
            status: "healthy".into(),
            version: "0.1.0".into(),
            uptime_seconds: 65,
            config: ConfigHealth {
                source: "file".into(),
                version: "abc1234".into(),
                loaded_ago_seconds: 3,
                traceability_enabled: false,
            },
            stats: StatsResponse {
                requests_handled: 10,
                requests_traced: 4,
                requests_failed: 1,
                config_reloads: 2,
            },
        };
        let modules = vec![ModuleInfo {
            name: "traceability".into(),
            class: "traceability::middleware::traceability::TraceabilityHandler".into(),
            config: serde_json::json!({ "enabled": false }),
            masks: None,
        }];

        let report = render("http://localhost:3000", &health, &modules);

        assert!(report.contains("http://localhost:3000 is healthy (v0.1.0, up 1m 5s)"));
        assert!(report.contains("traceability disabled, config file @ abc1234"));
        assert!(report.contains("10 handled, 4 traced, 1 failed; 2 reloads"));
        assert!(report.contains("modules (1):"));
        assert!(report.contains(r#"TraceabilityHandler  {"enabled":false}"#));
    }
}
