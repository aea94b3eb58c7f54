use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::config::FetchConfig;
use crate::constants;
use crate::error::Result;

/// Sequential HTTP helper shared by every provider adapter.
///
/// Every request is followed by an unconditional courtesy delay, after
/// success and failure alike; this is the only self-throttling in the
/// system.
pub struct HttpFetcher {
    client: reqwest::Client,
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            delay: Duration::from_millis(cfg.delay_ms),
        })
    }

    pub async fn get_text(
        &self,
        url: &str,
        params: &[(&str, String)],
        referer: &str,
    ) -> Result<String> {
        self.text(self.client.get(url).query(params).header(REFERER, referer))
            .await
    }

    pub async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        referer: &str,
    ) -> Result<Value> {
        self.json(self.client.get(url).query(params).header(REFERER, referer))
            .await
    }

    pub async fn post_form_text(
        &self,
        url: &str,
        form: &[(&str, String)],
        referer: &str,
    ) -> Result<String> {
        self.text(self.client.post(url).form(form).header(REFERER, referer))
            .await
    }

    pub async fn post_form_json(
        &self,
        url: &str,
        form: &[(&str, String)],
        referer: &str,
    ) -> Result<Value> {
        self.json(self.client.post(url).form(form).header(REFERER, referer))
            .await
    }

    async fn text(&self, request: RequestBuilder) -> Result<String> {
        let result = async {
            let response = request.send().await?.error_for_status()?;
            Ok(response.text().await?)
        }
        .await;
        tokio::time::sleep(self.delay).await;
        result
    }

    async fn json(&self, request: RequestBuilder) -> Result<Value> {
        let result = async {
            let response = request.send().await?.error_for_status()?;
            Ok(response.json::<Value>().await?)
        }
        .await;
        tokio::time::sleep(self.delay).await;
        result
    }
}
