//! Transactional email delivery via a Resend-compatible HTTP API.
//!
//! The provider is held behind the [`Mailer`] trait so the dispatch handler
//! can be exercised against a fake in tests; any provider with an
//! equivalent "send one message" operation is substitutable.

use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use log::{error, info};
use serde::{Deserialize, Serialize};

type HttpsConn = hyper_rustls::HttpsConnector<HttpConnector>;
type MailerHttpClient = Client<HttpsConn, Full<Bytes>>;

/// One outgoing message, in the provider's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
}

/// Provider acknowledgment for an accepted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
}

/// Structured error body returned by the provider on rejection.
#[derive(Debug, Clone, Deserialize)]
struct ProviderError {
    #[allow(dead_code)] // decoded for completeness; only `message` is surfaced
    #[serde(default)]
    name: String,
    message: String,
}

/// Capability interface over the email provider's single send operation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<SendReceipt>;
}

/// Mailer backed by the Resend HTTP API.
#[derive(Debug)]
pub struct ResendMailer {
    client: MailerHttpClient,
    api_url: String,
    api_key: String,
    user_agent: String,
}

impl ResendMailer {
    /// Builds the HTTPS client and validates the configured credential.
    ///
    /// A missing, empty, or non-header-safe API key is an initialization
    /// failure; the caller decides whether that aborts the process or puts
    /// the service into a degraded state.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .resend_api_key
            .clone()
            .ok_or_else(|| anyhow!("Resend API key is not configured"))?;

        if api_key.is_empty() {
            return Err(anyhow!("Resend API key is empty"));
        }
        // The key is sent as an Authorization header value; reject anything
        // that cannot legally appear there.
        if !api_key.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(anyhow!("Resend API key contains invalid characters"));
        }

        let https = {
            let connector = HttpsConnectorBuilder::new()
                .with_native_roots()
                .context("Failed to load native root certificates for hyper-rustls")?;
            #[cfg(debug_assertions)]
            let connector = connector.https_or_http();
            #[cfg(not(debug_assertions))]
            let connector = connector.https_only();
            connector.enable_http1().build()
        };

        let client: MailerHttpClient = Client::builder(TokioExecutor::new()).build(https);

        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

        Ok(Self {
            client,
            api_url: config.resend_api_url.clone(),
            api_key,
            user_agent,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<SendReceipt> {
        info!(
            "Dispatching email to {} (reply-to '{}') with subject: '{}'",
            email.to.join(", "),
            email.reply_to,
            email.subject
        );

        let json_body = serde_json::to_string(&email)?;

        let request = Request::builder()
            .method(hyper::Method::POST)
            .uri(&self.api_url)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("user-agent", &self.user_agent)
            .body(Full::new(Bytes::from(json_body)))?;

        let response = self.client.request(request).await?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .context("Failed to read provider response body")?
            .to_bytes();

        if !status.is_success() {
            // Prefer the provider's structured {name, message} error; fall
            // back to the raw body when it isn't JSON.
            let detail = match serde_json::from_slice::<ProviderError>(&body) {
                Ok(provider_error) => provider_error.message,
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            error!(
                "Provider request to {} failed with status {}: {}",
                self.api_url, status, detail
            );
            return Err(anyhow!(detail));
        }

        let receipt: SendReceipt = serde_json::from_slice(&body)
            .context("Provider returned a success response without a message id")?;

        info!(
            "Email accepted by provider {}, id: {}",
            self.api_url, receipt.id
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests;
