//! SDP offer/answer exchange over HTTP.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use super::{TransportError, TransportResult};
use crate::config::CallConfig;

/// Exchanges a local SDP offer for the remote answer.
#[async_trait]
pub trait SdpNegotiator: Send + Sync {
    async fn negotiate(
        &self,
        offer_sdp: &str,
        client_secret: &str,
        model: &str,
    ) -> TransportResult<String>;
}

/// Negotiator that POSTs the offer to the realtime negotiation endpoint.
pub struct HttpSdpNegotiator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSdpNegotiator {
    pub fn new(config: &CallConfig) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            base_url: config.negotiation_url.clone(),
            client,
        })
    }

    /// Negotiation URL for `model`.
    pub fn url_for(&self, model: &str) -> TransportResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.query_pairs_mut().append_pair("model", model);
        Ok(url)
    }
}

#[async_trait]
impl SdpNegotiator for HttpSdpNegotiator {
    async fn negotiate(
        &self,
        offer_sdp: &str,
        client_secret: &str,
        model: &str,
    ) -> TransportResult<String> {
        let url = self.url_for(model)?;
        debug!(url = %url, offer_len = offer_sdp.len(), "Posting SDP offer");

        let response = self
            .client
            .post(url)
            .bearer_auth(client_secret)
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "SDP negotiation rejected");
            return Err(TransportError::Negotiation {
                status: status.as_u16(),
                message: body,
            });
        }

        let answer = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        if answer.trim().is_empty() {
            return Err(TransportError::Negotiation {
                status: status.as_u16(),
                message: "empty SDP answer".to_string(),
            });
        }
        Ok(answer)
    }
}
