//! CLI Status Command
//!
//! Queries a running bridge's `/health` endpoint.

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

pub fn health_url(bind: &str, port: u16) -> String {
    let host = match bind.trim_start_matches('[').trim_end_matches(']') {
        "0.0.0.0" | "" => "127.0.0.1".to_string(),
        "::" => "[::1]".to_string(),
        v6 if v6.contains(':') => format!("[{v6}]"),
        other => other.to_string(),
    };
    format!("http://{host}:{port}/health")
}

/// One-line summary of a `/health` body.
pub fn summarize(health: &Value) -> String {
    let field = |key: &str| health[key].as_str().unwrap_or("?").to_string();
    let busy = if health["busy"].as_bool().unwrap_or(false) {
        "busy"
    } else {
        "idle"
    };
    format!(
        "tier {} ({}) is {}, {}",
        field("tier"),
        field("model"),
        field("status"),
        busy
    )
}

/// Returns `false` when the bridge is unreachable.
pub async fn run(bind: &str, port: u16) -> Result<bool> {
    println!("\n📊 OCR Bridge Status\n");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    match client.get(health_url(bind, port)).send().await {
        Ok(resp) => {
            let body: Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            println!("\n{}", summarize(&body));
            Ok(true)
        }
        Err(_) => {
            println!("OCR bridge is not running on port {port}");
            Ok(false)
        }
    }
}
