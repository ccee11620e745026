//! The contact form widget as a headless state machine.
//!
//! Holds field values, per-field errors, and submission status exactly as
//! the floating chat-style form does in the browser: local validation runs
//! before any network traffic, and the transport is pluggable so the state
//! machine can be driven without a server.

use crate::server::{DispatchOutcome, DispatchRequest, DISPATCH_PATH};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

type HttpsConn = hyper_rustls::HttpsConnector<HttpConnector>;
type WidgetHttpClient = Client<HttpsConn, Full<Bytes>>;

pub const EMPTY_EMAIL_ERROR: &str = "Oops! Email cannot be empty.";
pub const INVALID_EMAIL_ERROR: &str = "Please enter a valid email address";
pub const EMPTY_MESSAGE_ERROR: &str = "Oops! Message cannot be empty.";
pub const SUCCESS_MESSAGE: &str = "Thanks for reaching out! I'll get back to you soon.";
pub const SUBMIT_FAILED_ERROR: &str = "Something went wrong. Please try again later.";

// Standard email-shape check, not RFC 5322-complete; it knowingly rejects
// some valid-but-unusual addresses.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email regex is valid")
});

fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// The two user-editable fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Message,
}

/// One field's value together with its inline validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldState {
    pub value: String,
    pub error: Option<String>,
}

/// The observable states of the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Closed,
    OpenIdle,
    OpenSubmitting,
    OpenSuccess,
    OpenError,
}

/// Transport used by [`ContactForm::submit`] to reach the dispatch
/// endpoint. Tests substitute a recording fake.
#[async_trait]
pub trait DispatchTransport: Send + Sync {
    /// Posts one submission; `Err` covers network failures and non-2xx
    /// responses alike.
    async fn send(&self, request: &DispatchRequest) -> Result<DispatchOutcome>;
}

/// The form widget's entire mutable state. Owned by one widget instance,
/// never shared.
#[derive(Debug, Clone, Default)]
pub struct ContactForm {
    pub open: bool,
    pub email: FieldState,
    pub message: FieldState,
    pub loading: bool,
    pub success: Option<String>,
    pub error: Option<String>,
}

impl ContactForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// The derived state-machine view of the raw flags.
    pub fn state(&self) -> WidgetState {
        if !self.open {
            WidgetState::Closed
        } else if self.loading {
            WidgetState::OpenSubmitting
        } else if self.success.is_some() {
            WidgetState::OpenSuccess
        } else if self.error.is_some() {
            WidgetState::OpenError
        } else {
            WidgetState::OpenIdle
        }
    }

    /// Flips closed ⇄ open and resets every field and status flag.
    pub fn toggle(&mut self) {
        self.open = !self.open;
        self.email = FieldState::default();
        self.message = FieldState::default();
        self.loading = false;
        self.success = None;
        self.error = None;
    }

    /// Sets a field's value and clears that field's error only.
    pub fn update_field(&mut self, field: Field, value: &str) {
        let slot = match field {
            Field::Email => &mut self.email,
            Field::Message => &mut self.message,
        };
        slot.value = value.to_string();
        slot.error = None;
    }

    /// Runs client-side validation in fixed order. The first failing rule
    /// sets its field's error and short-circuits; no other field is
    /// checked.
    fn validate(&mut self) -> bool {
        if self.email.value.is_empty() {
            self.email.error = Some(EMPTY_EMAIL_ERROR.to_string());
            return false;
        }
        if !is_valid_email(&self.email.value) {
            self.email.error = Some(INVALID_EMAIL_ERROR.to_string());
            return false;
        }
        if self.message.value.is_empty() {
            self.message.error = Some(EMPTY_MESSAGE_ERROR.to_string());
            return false;
        }
        true
    }

    /// Validates locally, then submits through the transport. A validation
    /// failure issues no network call at all.
    pub async fn submit<T: DispatchTransport + ?Sized>(&mut self, transport: &T) {
        if !self.validate() {
            return;
        }

        self.loading = true;
        self.success = None;
        self.error = None;

        let request = DispatchRequest {
            email: self.email.value.clone(),
            message: self.message.value.clone(),
        };

        match transport.send(&request).await {
            Ok(outcome) if outcome.success => {
                self.success = Some(SUCCESS_MESSAGE.to_string());
                self.email.value.clear();
                self.message.value.clear();
            }
            Ok(outcome) => {
                warn!(
                    "Dispatch endpoint reported failure: {}",
                    outcome.error.as_deref().unwrap_or(&outcome.message)
                );
                self.error = Some(SUBMIT_FAILED_ERROR.to_string());
            }
            Err(e) => {
                warn!("Contact form submission failed: {:#}", e);
                self.error = Some(SUBMIT_FAILED_ERROR.to_string());
            }
        }

        self.loading = false;
    }
}

/// [`DispatchTransport`] over HTTP, pointed at a running dispatch endpoint.
pub struct HttpDispatchTransport {
    client: WidgetHttpClient,
    endpoint_url: String,
    user_agent: String,
}

impl HttpDispatchTransport {
    /// `base_url` is the server origin, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: &str) -> Self {
        let https = {
            let connector = HttpsConnectorBuilder::new()
                .with_native_roots()
                .expect("Failed to load native root certificates for hyper-rustls");
            #[cfg(debug_assertions)]
            let connector = connector.https_or_http();
            #[cfg(not(debug_assertions))]
            let connector = connector.https_only();
            connector.enable_http1().build()
        };

        let client: WidgetHttpClient = Client::builder(TokioExecutor::new()).build(https);

        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

        Self {
            client,
            endpoint_url: format!("{}{}", base_url.trim_end_matches('/'), DISPATCH_PATH),
            user_agent,
        }
    }
}

#[async_trait]
impl DispatchTransport for HttpDispatchTransport {
    async fn send(&self, request: &DispatchRequest) -> Result<DispatchOutcome> {
        let json_body = serde_json::to_string(request)?;

        let http_request = Request::builder()
            .method(hyper::Method::POST)
            .uri(&self.endpoint_url)
            .header("content-type", "application/json")
            .header("user-agent", &self.user_agent)
            .body(Full::new(Bytes::from(json_body)))?;

        let response = self.client.request(http_request).await?;

        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(anyhow!(
                "Dispatch request to {} failed with status: {}",
                self.endpoint_url,
                status
            ));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
