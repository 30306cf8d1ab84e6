// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport with authentication and `ETag` handling.

use reqwest::{Client, Method, RequestBuilder};

use crate::config::{AuthMethod, CalDavConfig};
use crate::error::CalDavError;
use crate::types::ETag;

/// A decoded HTTP response.
///
/// Statuses are carried through rather than turned into errors here: the
/// planner and the sync engine interpret 404 and 4xx statuses differently
/// depending on which step produced them.
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// `ETag` header value, if present.
    pub etag: Option<ETag>,
    /// Response body.
    pub body: String,
}

impl WireResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether the resource was reported missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Transport seam between the planner and the wire.
///
/// Production code uses [`HttpClient`]; tests may substitute a scripted
/// transport.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends one request and returns the decoded response.
    ///
    /// Transport-level failures (connection refused, timeout) are errors;
    /// any HTTP status is a successful round-trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the response body
    /// cannot be read.
    async fn send(
        &self,
        method: &str,
        url: &str,
        depth: Option<&str>,
        body: Option<String>,
    ) -> Result<WireResponse, CalDavError>;
}

/// HTTP client for `CalDAV` operations.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: CalDavConfig,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: CalDavConfig) -> Result<Self, CalDavError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    /// Builds a request with authentication headers.
    fn build_request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url);

        match &self.config.auth {
            AuthMethod::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            AuthMethod::Bearer { token } => {
                req = req.bearer_auth(token);
            }
            AuthMethod::None => {}
        }

        req
    }
}

impl Transport for HttpClient {
    async fn send(
        &self,
        method: &str,
        url: &str,
        depth: Option<&str>,
        body: Option<String>,
    ) -> Result<WireResponse, CalDavError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| CalDavError::Http(format!("invalid method: {method}")))?;

        let mut req = self.build_request(method, url);
        if let Some(depth) = depth {
            req = req.header("Depth", depth);
        }
        if let Some(body) = body {
            req = req
                .header("Content-Type", "application/xml; charset=utf-8")
                .body(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let etag = resp
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|s| ETag::new(s.to_string()));
        let body = resp.text().await?;

        Ok(WireResponse { status, etag, body })
    }
}
