//! API client for communicating with the prewarm agent

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prewarm_lib::{DemandEstimate, ExecutionReport, ManagerStats};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// API client for the prewarm agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send_post(path, body)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a POST request whose response carries no body
    pub async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        self.send_post(path, body).await.map(|_| ())
    }

    async fn send_post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response).await
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => anyhow::bail!("API error ({}): {} [{}]", status, err.error, err.code),
            Err(_) => anyhow::bail!("API error ({}): {}", status, body),
        }
    }

    pub async fn report_invocation(
        &self,
        function_id: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let report = InvocationReport {
            function_id: function_id.to_string(),
            timestamp,
        };
        self.post_empty("api/v1/invocations", &report).await
    }

    pub async fn invoke(&self, function_id: &str, input: Value) -> Result<ExecutionReport> {
        let path = format!("api/v1/functions/{}/invoke", function_id);
        self.post(&path, &InvokeRequest { input }).await
    }

    pub async fn prediction(&self, function_id: &str) -> Result<PredictionResponse> {
        let path = format!("api/v1/functions/{}/prediction", function_id);
        self.get(&path).await
    }

    pub async fn prewarm(&self, function_id: &str) -> Result<PrewarmResponse> {
        let path = format!("api/v1/functions/{}/prewarm", function_id);
        self.post(&path, &Value::Null).await
    }

    pub async fn evict(&self, function_id: &str) -> Result<EvictResponse> {
        let path = format!("api/v1/functions/{}/evict", function_id);
        self.post(&path, &Value::Null).await
    }

    pub async fn pool(&self) -> Result<ManagerStats> {
        self.get("api/v1/pool").await
    }
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationReport {
    pub function_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub input: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub function_id: String,
    pub at: DateTime<Utc>,
    pub estimate: DemandEstimate,
    pub warm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrewarmResponse {
    pub function_id: String,
    pub prewarmed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evicted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictResponse {
    pub function_id: String,
    pub evicted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
