use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::debug;

use super::RenderError;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Loads the HTML of one URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, RenderError>;
}

/// Plain HTTP. Enough for server-rendered inventories.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, RenderError> {
        let nav = |e: reqwest::Error| RenderError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "fr-CA,fr;q=0.9,en;q=0.8")
            .send()
            .await
            .map_err(nav)?
            .error_for_status()
            .map_err(nav)?;

        debug!("GET {} -> {}", url, response.status());
        response.text().await.map_err(nav)
    }
}

/// JS-rendered HTML through spider.cloud.
pub struct SpiderFetcher {
    spider: Spider,
}

impl SpiderFetcher {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .map_err(|_| anyhow::anyhow!("SPIDER_API_KEY environment variable must be set"))?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        Ok(Self { spider })
    }
}

#[async_trait]
impl PageFetcher for SpiderFetcher {
    async fn fetch(&self, url: &str) -> Result<String, RenderError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        // Responses sometimes arrive as a JSON string wrapping the array.
        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        let status = first
            .and_then(|obj| obj.get("status"))
            .and_then(|s| s.as_i64());
        if let Some(code) = status.filter(|c| *c >= 400) {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason: format!("spider returned status {}", code),
            });
        }

        first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| RenderError::Navigation {
                url: url.to_string(),
                reason: "no content in spider response".to_string(),
            })
    }
}

/// Backend chosen at runtime.
pub enum Fetcher {
    Http(HttpFetcher),
    Spider(SpiderFetcher),
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String, RenderError> {
        match self {
            Fetcher::Http(f) => f.fetch(url).await,
            Fetcher::Spider(f) => f.fetch(url).await,
        }
    }
}
