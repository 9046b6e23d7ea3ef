//! Dead-link removal for model replies.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use wayfarer_core::config::LinksConfig;

const MAX_PARALLELISM_BASIS: usize = 16;

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"https?://[^\s\)\]"'<>]+"#).ok()).as_ref()
}

/// Unique URLs in order of first appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    let Some(pattern) = url_pattern() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    pattern
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Drops reference lines that cite `dead` and unwraps inline links to it.
pub fn strip_dead_links(text: &str, dead: &[String]) -> String {
    let mut content = text.to_string();
    for url in dead {
        let escaped = regex::escape(url);
        if let Ok(reference) = Regex::new(&format!(r"\n\[?\d*\]?:?\s*{escaped}[^\n]*")) {
            content = reference.replace_all(&content, "").into_owned();
        }
        if let Ok(inline) = Regex::new(&format!(r"\[([^\]]+)\]\({escaped}\)")) {
            content = inline.replace_all(&content, "$1").into_owned();
        }
    }
    content.trim().to_string()
}

fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism().map(usize::from).unwrap_or(4);
    cpus.min(MAX_PARALLELISM_BASIS) * 2
}

pub struct LinkValidator {
    http: Client,
    permits: Arc<Semaphore>,
}

impl LinkValidator {
    pub fn from_config(config: &LinksConfig) -> Result<Self, reqwest::Error> {
        let concurrency =
            if config.max_concurrency == 0 { default_concurrency() } else { config.max_concurrency };
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::limited(10))
            .pool_max_idle_per_host((concurrency / 2).max(1))
            .build()?;

        Ok(Self { http, permits: Arc::new(Semaphore::new(concurrency)) })
    }

    async fn is_alive(&self, url: &str) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            return false;
        };
        match self.http.head(url).send().await {
            Ok(response) => response.status().as_u16() < 400,
            Err(error) => {
                debug!(event_name = "agent.links.check_failed", url, error = %error);
                false
            }
        }
    }

    /// Returns `content` with unreachable links removed.
    pub async fn validate(&self, content: &str) -> String {
        let urls = extract_urls(content);
        if urls.is_empty() {
            return content.to_string();
        }

        let checks = urls.iter().map(|url| async move { (url, self.is_alive(url).await) });
        let dead: Vec<String> = join_all(checks)
            .await
            .into_iter()
            .filter(|(_, alive)| !alive)
            .map(|(url, _)| url.clone())
            .collect();

        if dead.is_empty() {
            debug!(event_name = "agent.links.all_alive", checked = urls.len());
            return content.to_string();
        }

        info!(
            event_name = "agent.links.removed",
            checked = urls.len(),
            removed = dead.len(),
            "dead links removed from reply"
        );
        if dead.len() == urls.len() {
            warn!(event_name = "agent.links.none_reachable", "no cited link was reachable");
        }
        strip_dead_links(content, &dead)
    }
}
