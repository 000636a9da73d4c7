//! Paced HTTP client for the live audits.
//!
//! One request in flight at a time; consecutive requests are spaced by at
//! least `crawl.delay_ms`. There are no retries: a failed fetch is reported
//! by the caller as an audit issue.

use anyhow::{bail, Context, Result};
use bagsite_core::pace::Throttle;
use std::time::{Duration, Instant};

use crate::config::CrawlConfig;

/// Status and `Location` of a request made without following redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    pub status: u16,
    pub location: Option<String>,
}

impl RedirectHop {
    /// 301 or 308.
    pub fn is_permanent(&self) -> bool {
        self.status == 301 || self.status == 308
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    no_redirect: reqwest::Client,
    throttle: Throttle,
}

impl Fetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        let no_redirect = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            no_redirect,
            throttle: Throttle::new(Duration::from_millis(config.delay_ms)),
        })
    }

    async fn pace(&mut self) {
        let wait = self.throttle.wait_time(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.throttle.try_acquire(Instant::now());
    }

    /// GET `url` following redirects; non-2xx responses are errors.
    pub async fn get_text(&mut self, url: &str) -> Result<String> {
        self.pace().await;
        tracing::debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {} for {}", status.as_u16(), url);
        }
        resp.text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }

    /// GET `url` without following redirects.
    pub async fn get_no_follow(&mut self, url: &str) -> Result<RedirectHop> {
        self.pace().await;
        tracing::debug!(url, "GET (manual redirect)");
        let resp = self
            .no_redirect
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(RedirectHop {
            status: resp.status().as_u16(),
            location,
        })
    }
}
