use super::*;
use crate::config::{Config, Mode};

fn test_config(api_key: Option<&str>) -> Config {
    Config {
        site_origin: "https://example.dev".to_string(),
        dev_origin: "http://localhost:3000".to_string(),
        resend_api_key: api_key.map(|k| k.to_string()),
        recipient_email: Some("owner@example.dev".to_string()),
        from_address: "Portfolio Contact <no-reply@example.dev>".to_string(),
        resend_api_url: "https://api.resend.com/emails".to_string(),
        bind_address: "127.0.0.1".to_string(),
        port: 8080,
        mode: Mode::Production,
    }
}

fn init_crypto() {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .ok();
}

#[test]
fn test_mailer_user_agent() {
    init_crypto();
    let mailer = ResendMailer::new(&test_config(Some("re_test_key"))).unwrap();

    let expected_user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    assert_eq!(mailer.user_agent, expected_user_agent);
}

#[test]
fn test_mailer_rejects_missing_key() {
    init_crypto();
    let err = ResendMailer::new(&test_config(None)).unwrap_err();
    assert!(err.to_string().contains("not configured"));
}

#[test]
fn test_mailer_rejects_empty_key() {
    init_crypto();
    let err = ResendMailer::new(&test_config(Some(""))).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn test_mailer_rejects_malformed_key() {
    init_crypto();
    // A newline in the key would be rejected at header construction time
    // anyway; catch it up front so the failure is a clear init error.
    let err = ResendMailer::new(&test_config(Some("re_bad\nkey"))).unwrap_err();
    assert!(err.to_string().contains("invalid characters"));
}

#[test]
fn test_outgoing_email_wire_shape() {
    let email = OutgoingEmail {
        from: "Portfolio Contact <no-reply@example.dev>".to_string(),
        to: vec!["owner@example.dev".to_string()],
        reply_to: "visitor@example.com".to_string(),
        subject: "New message from your portfolio".to_string(),
        html: "<p>hi</p>".to_string(),
    };

    let json = serde_json::to_value(&email).expect("Serialization failed");

    // Field names must match the provider's API exactly.
    assert_eq!(json["from"], "Portfolio Contact <no-reply@example.dev>");
    assert_eq!(json["to"], serde_json::json!(["owner@example.dev"]));
    assert_eq!(json["reply_to"], "visitor@example.com");
    assert_eq!(json["subject"], "New message from your portfolio");
    assert_eq!(json["html"], "<p>hi</p>");
}

#[test]
fn test_provider_error_decoding() {
    let body = r#"{"statusCode":422,"name":"validation_error","message":"The `from` address is not verified."}"#;
    let decoded: ProviderError = serde_json::from_str(body).expect("Deserialization failed");
    assert_eq!(decoded.message, "The `from` address is not verified.");
    assert_eq!(decoded.name, "validation_error");
}

#[test]
fn test_send_receipt_decoding() {
    let body = r#"{"id":"abc123"}"#;
    let receipt: SendReceipt = serde_json::from_str(body).expect("Deserialization failed");
    assert_eq!(receipt.id, "abc123");
}
