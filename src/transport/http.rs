//! HTTP implementation of [`StoreTransport`].

use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::model::Configuration;
use crate::transport::{StoreTransport, TransportError};

const CONFIG_PATH: &str = "/api/config";
const WS_PATH: &str = "/api/ws";

/// Talks to the Store's REST API.
#[derive(Clone)]
pub struct HttpStoreClient {
    client: Client,
    base: Url,
}

impl HttpStoreClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn config_url(&self) -> Result<Url, TransportError> {
        Ok(self.base.join(CONFIG_PATH)?)
    }

    /// The broadcast endpoint, with `http(s)` mapped to `ws(s)`.
    pub fn ws_url(&self) -> Result<Url, TransportError> {
        let url = self.base.join(WS_PATH)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        let rest = &url.as_str()[url.scheme().len()..];
        Ok(Url::parse(&format!("{scheme}{rest}"))?)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

impl StoreTransport for HttpStoreClient {
    async fn fetch(&self) -> Result<Configuration, TransportError> {
        let response = self.client.get(self.config_url()?).send().await?;
        let config = check(response).await?.json::<Configuration>().await?;
        tracing::debug!(settings = config.len(), "Fetched configuration");
        Ok(config)
    }

    async fn push(&self, update: Configuration) -> Result<(), TransportError> {
        let response = self.client.post(self.config_url()?).json(&update).send().await?;
        check(response).await?;
        Ok(())
    }
}
