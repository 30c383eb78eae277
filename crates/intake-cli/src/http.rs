use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use intake_spec::spec::WebhookSpec;
use intake_spec::{ConfigError, Delivery, DeliveryError, DeliveryPayload};
use reqwest::{Client, Method};
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("brand-intake/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Read the raw form config from a local path or an http(s) URL.
pub async fn fetch_source(source: &str) -> Result<String, ConfigError> {
    if !is_remote(source) {
        return fs::read_to_string(source).map_err(ConfigError::Read);
    }

    debug!(url = source, "fetching form config");
    let client = client().map_err(|err| ConfigError::Fetch(err.to_string()))?;
    let response = client
        .get(source)
        .send()
        .await
        .map_err(|err| ConfigError::Fetch(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ConfigError::Fetch(format!("{} returned {}", source, status)));
    }
    response
        .text()
        .await
        .map_err(|err| ConfigError::Fetch(err.to_string()))
}

/// Posts finished reports to the form's configured webhook.
pub struct HttpDelivery {
    client: Client,
    webhook: WebhookSpec,
}

impl HttpDelivery {
    pub fn new(webhook: WebhookSpec) -> Result<Self, DeliveryError> {
        let client = client().map_err(|err| DeliveryError::Network(err.to_string()))?;
        Ok(Self { client, webhook })
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), DeliveryError> {
        let method = Method::from_bytes(self.webhook.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| DeliveryError::Method(self.webhook.method.clone()))?;

        let mut request = self
            .client
            .request(method, &self.webhook.url)
            .header("Content-Type", "application/json");
        for (name, value) in &self.webhook.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let body = serde_json::to_vec(payload).map_err(|err| DeliveryError::Encode(err.to_string()))?;
        let response = request
            .body(body)
            .send()
            .await
            .map_err(|err| DeliveryError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        info!(url = %self.webhook.url, status = status.as_u16(), "webhook accepted report");
        Ok(())
    }
}
