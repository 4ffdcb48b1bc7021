//! Security response headers
//!
//! Sets the usual hardening headers with `SetResponseHeaderLayer::if_not_present`,
//! so a handler that chose its own value keeps it. The service never
//! terminates TLS itself, so HSTS is left to the proxy in front of it.

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityHeadersConfig;

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Wrap `app` in one header layer per enabled header
pub fn apply_security_headers(mut app: Router, config: &SecurityHeadersConfig) -> Router {
    if !config.enabled {
        return app;
    }

    if config.x_content_type_options {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));
    }

    if let Some(value) = header_value("X-Frame-Options", &config.x_frame_options) {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            value,
        ));
    }

    // browsers' XSS auditor is off; CSP is the replacement
    if config.x_xss_protection {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("0"),
        ));
    }

    if let Some(value) = header_value("Referrer-Policy", &config.referrer_policy) {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            value,
        ));
    }

    if let Some(policy) = &config.permissions_policy {
        if let Some(value) = header_value("Permissions-Policy", policy) {
            app = app.layer(SetResponseHeaderLayer::if_not_present(
                PERMISSIONS_POLICY,
                value,
            ));
        }
    }

    app
}

/// An empty setting disables the header; an invalid one is skipped with a warning
fn header_value(name: &str, raw: &str) -> Option<HeaderValue> {
    if raw.is_empty() {
        return None;
    }
    match HeaderValue::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {} value: {:?}", name, raw);
            None
        }
    }
}
