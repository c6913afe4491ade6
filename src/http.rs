//! HTTP client construction and response checks.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use tracing::warn;

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build the long-lived HTTP client for a set of transport options.
///
/// The bearer token and any extra headers become default headers, so they
/// are set once here and sent with every request. No client-wide timeout is
/// configured: callers apply the timeout per request.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&transport_options)?;
/// ```
pub fn build_http_client(options: &TransportOptions) -> Result<Client, ClientError> {
    let api_key = options.api_key.expose_secret();
    if api_key.trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "API key must not be empty".to_string(),
        ));
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|_| ClientError::Config("Invalid API key".to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    if let Some(extra) = &options.extra_headers {
        for (key, value) in extra {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| ClientError::Config(format!("Invalid header name: {key}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::Config(format!("Invalid value for header {key}")))?;
            headers.insert(name, value);
        }
    }

    let mut builder = Client::builder().default_headers(headers);

    if let Some(proxy_url) = &options.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("Invalid proxy {proxy_url}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Join a base URL and an endpoint path, tolerating a trailing `/` on the base.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Pass successful responses through; turn anything else into
/// [`ClientError::Status`] carrying the full body text.
pub async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = error_body(status, response.text().await);
    warn!(%status, %body, "DeepSeek request failed");
    Err(ClientError::Status { status, body })
}

fn error_body(status: StatusCode, text: Result<String, reqwest::Error>) -> String {
    match text {
        Ok(body) => body,
        Err(e) => {
            warn!(%status, error = %e, "could not read error body");
            format!("<unreadable body: {e}>")
        }
    }
}
