//! Health command - asks a running server which backend it serves from.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::cli::HealthArgs;

/// Body of `GET /health`
#[derive(Debug, Deserialize)]
struct HealthReport {
    status: String,
    #[serde(default)]
    backend: Option<String>,
}

/// Resolve the health endpoint from a server base URL or the endpoint itself.
fn health_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    if !url.path().trim_end_matches('/').ends_with("/health") {
        let path = format!("{}/health", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }
    Ok(url)
}

/// Run the health check command
pub async fn run(args: &HealthArgs) -> Result<(), Box<dyn std::error::Error>> {
    let url = health_url(&args.url)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("unhealthy: failed to connect to {url}: {e}");
            std::process::exit(1);
        }
    };
    if !response.status().is_success() {
        eprintln!("unhealthy: server returned HTTP status {}", response.status());
        std::process::exit(1);
    }

    let report: HealthReport = response.json().await?;
    let backend = report.backend.as_deref().unwrap_or("unknown");
    if report.status != "healthy" {
        eprintln!("unhealthy: server reported {} (backend {backend})", report.status);
        std::process::exit(1);
    }
    println!("healthy: {backend} backend at {url}");
    Ok(())
}
