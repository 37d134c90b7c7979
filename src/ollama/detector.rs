use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::utils::error_chain;

/// Candidate base URLs for a configured Ollama URL.
///
/// The configured URL comes first, followed by its `localhost` <-> `127.0.0.1`
/// substitutions, with duplicates removed.
pub fn candidate_urls(configured: &str) -> Vec<String> {
    let configured = configured.trim_end_matches('/');
    let variants = [
        configured.to_string(),
        configured.replace("localhost", "127.0.0.1"),
        configured.replace("127.0.0.1", "localhost"),
    ];

    let mut unique: Vec<String> = Vec::with_capacity(variants.len());
    for url in variants {
        if !unique.contains(&url) {
            unique.push(url);
        }
    }
    unique
}

/// Probe each candidate's tag endpoint in order, each with its own timeout.
///
/// Returns the first URL answering with a success status, or `None` when no
/// candidate is reachable.
pub async fn probe(client: &Client, candidates: &[String], timeout: Duration) -> Option<String> {
    for url in candidates {
        debug!("Checking if Ollama is running at {}...", url);

        match client.get(format!("{}/api/tags", url)).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Connected to Ollama at {}", url);
                return Some(url.clone());
            },
            Ok(response) => {
                debug!("Ollama at {} answered with status {}", url, response.status());
            },
            Err(err) => {
                let message = error_chain(&err);
                debug!("Ollama check error at {}: {}", url, message);
                if is_ipv6_loopback_refusal(&message) {
                    info!("Connection to the IPv6 loopback was refused; trying the next candidate");
                }
            },
        }
    }

    warn!("Could not connect to Ollama on any of: {}", candidates.join(", "));
    None
}

fn is_ipv6_loopback_refusal(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    (lower.contains("connection refused") || lower.contains("econnrefused")) && lower.contains("::1")
}
