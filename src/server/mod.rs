//! The mail dispatch endpoint: a stateless HTTP handler that validates
//! contact-form submissions and forwards them to the email provider.

use crate::config::{Config, Mode};
use crate::mailer::{Mailer, OutgoingEmail};
use anyhow::Result;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// The single dispatch entry point.
pub const DISPATCH_PATH: &str = "/api/send-email";

// Verified sandbox identities used in development mode. The provider
// restricts unverified accounts to these, so the configured production
// recipient is deliberately ignored there.
const TEST_FROM_ADDRESS: &str = "Portfolio Contact <onboarding@resend.dev>";
const TEST_RECIPIENT: &str = "delivered@resend.dev";

const SUBJECT: &str = "New message from your portfolio contact form";

// --- Wire types ---

/// The JSON payload accepted by `POST /api/send-email`.
///
/// Missing fields deserialize as empty strings so presence validation is
/// uniform for absent, null-ish, and empty values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchRequest {
    pub email: String,
    pub message: String,
}

/// The JSON body returned by the dispatch endpoint, as seen by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// --- Shared per-process state ---

/// Read-only state shared by every request.
///
/// `mailer` is `None` when provider initialization failed at startup; every
/// request then observes the same "not initialized" failure until restart.
pub struct ServerState {
    pub config: Config,
    pub mailer: Option<Arc<dyn Mailer>>,
}

// --- Request handling ---

async fn handle_request<B>(state: Arc<ServerState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: http_body::Body,
    B::Error: std::fmt::Display,
{
    let cors = allowed_origin(&state.config, req.headers());

    match (req.method(), req.uri().path()) {
        (&Method::OPTIONS, DISPATCH_PATH) => with_cors(empty_response(StatusCode::OK), cors),
        (&Method::POST, DISPATCH_PATH) => with_cors(dispatch(state, req).await, cors),
        (_, DISPATCH_PATH) => with_cors(
            json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "message": "Method not allowed" }),
            ),
            cors,
        ),
        (&Method::GET, "/health") => empty_response(StatusCode::OK),
        _ => json_response(StatusCode::NOT_FOUND, json!({ "message": "Not found" })),
    }
}

/// Outer boundary of the dispatch path: nothing propagates as an unhandled
/// fault, every failure becomes a structured JSON response.
async fn dispatch<B>(state: Arc<ServerState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: http_body::Body,
    B::Error: std::fmt::Display,
{
    match dispatch_inner(state, req).await {
        Ok(response) => response,
        Err(e) => {
            error!("Unhandled failure while dispatching email: {:#}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "success": false,
                    "message": "Failed to send email",
                    "error": e.to_string(),
                }),
            )
        }
    }
}

async fn dispatch_inner<B>(
    state: Arc<ServerState>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>>
where
    B: http_body::Body,
    B::Error: std::fmt::Display,
{
    // Provider readiness comes first, before the body is touched.
    let mailer = match &state.mailer {
        Some(mailer) => Arc::clone(mailer),
        None => {
            error!("Dispatch rejected: email provider client was never initialized");
            return Ok(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "success": false,
                    "message": "Email service not initialized",
                    "error": "Internal server error",
                }),
            ));
        }
    };

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read dispatch request body: {}", e);
            return Ok(missing_fields_response());
        }
    };

    // A body that is not valid JSON validates the same as one with both
    // fields absent.
    let request: DispatchRequest = serde_json::from_slice(&body).unwrap_or_default();

    if request.email.is_empty() || request.message.is_empty() {
        return Ok(missing_fields_response());
    }

    let recipient = match state
        .config
        .recipient_email
        .as_deref()
        .filter(|r| !r.is_empty())
    {
        Some(recipient) => recipient.to_string(),
        None => {
            error!("Dispatch rejected: no recipient email is configured");
            return Ok(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "message": "Email service configuration error",
                    "details": "Recipient email is missing",
                }),
            ));
        }
    };

    let email = compose_email(&state.config, &recipient, &request);

    match mailer.send(email).await {
        Ok(receipt) => {
            info!(
                "Contact submission from '{}' dispatched, provider id: {}",
                request.email, receipt.id
            );
            Ok(json_response(
                StatusCode::OK,
                json!({
                    "success": true,
                    "message": "Email sent successfully",
                    "id": receipt.id,
                }),
            ))
        }
        Err(e) => {
            error!(
                "Provider rejected contact submission from '{}': {:#}",
                request.email, e
            );
            Ok(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "success": false,
                    "message": "Failed to send email",
                    "error": e.to_string(),
                }),
            ))
        }
    }
}

// --- Email composition ---

fn compose_email(config: &Config, recipient: &str, request: &DispatchRequest) -> OutgoingEmail {
    let (from, to, subject) = match config.mode {
        Mode::Development => (
            TEST_FROM_ADDRESS.to_string(),
            TEST_RECIPIENT.to_string(),
            format!("[TEST] {}", SUBJECT),
        ),
        Mode::Production => (
            config.from_address.clone(),
            recipient.to_string(),
            SUBJECT.to_string(),
        ),
    };

    OutgoingEmail {
        from,
        to: vec![to],
        // Replies from the site owner's mail client go straight back to
        // the visitor.
        reply_to: request.email.clone(),
        subject,
        html: render_html(request),
    }
}

fn render_html(request: &DispatchRequest) -> String {
    // User content is interpolated verbatim; only newlines are rewritten.
    let message_html = request.message.replace('\n', "<br />");
    format!(
        "<div>\
            <h2>New portfolio contact</h2>\
            <p><strong>From:</strong> {}</p>\
            <p>{}</p>\
        </div>",
        request.email, message_html
    )
}

// --- CORS ---

/// Returns the origin to echo back, or `None` when the caller is not in
/// the allow-list (the browser then blocks the cross-origin read).
fn allowed_origin(config: &Config, headers: &header::HeaderMap) -> Option<String> {
    let origin = headers.get(header::ORIGIN)?.to_str().ok()?;
    if origin == config.site_origin
        || origin == config.dev_origin
        || config.mode == Mode::Development
    {
        Some(origin.to_string())
    } else {
        None
    }
}

fn with_cors(
    mut response: Response<Full<Bytes>>,
    origin: Option<String>,
) -> Response<Full<Bytes>> {
    if let Some(origin) = origin {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("POST, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            );
        }
    }
    response
}

// --- Response helpers ---

fn missing_fields_response() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        json!({ "message": "Email and message are required" }),
    )
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("static response construction cannot fail")
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .expect("static response construction cannot fail")
}

// --- Server loop ---

/// Binds the listener and serves connections until the token is cancelled.
pub async fn run_server(
    config: Config,
    mailer: Option<Arc<dyn Mailer>>,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let state = Arc::new(ServerState { config, mailer });

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind contact relay server to {}: {}", addr, e);
        anyhow::anyhow!("Failed to bind contact relay server: {}", e)
    })?;

    info!("Contact relay listening on {}", addr);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, remote_addr)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move {
                                    Ok::<_, Infallible>(handle_request(state, req).await)
                                }
                            });
                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                tracing::error!("Error serving connection from {}: {:#}", remote_addr, e);
                            }
                        });
                    }
                    Err(e) => tracing::error!("Error accepting connection: {:?}", e),
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("HTTP listener shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}
