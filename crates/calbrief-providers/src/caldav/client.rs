//! HTTP client for CalDAV operations.
//!
//! Handles PROPFIND and REPORT requests, authentication challenges and TLS
//! configuration. Once a scheme has been negotiated, later requests carry
//! the Authorization header up front.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{ProviderError, ProviderResult};

use super::auth::AuthScheme;
use super::config::CalDavConfig;

/// HTTP client for CalDAV operations.
pub struct CalDavClient {
    client: Client,
    config: CalDavConfig,
    /// Negotiated authentication scheme, if any.
    scheme: Mutex<Option<AuthScheme>>,
}

impl CalDavClient {
    /// Creates a new CalDAV client with the given configuration.
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::network("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            client,
            config,
            scheme: Mutex::new(None),
        })
    }

    /// Performs a PROPFIND request.
    pub async fn propfind(&self, url: &str, body: &str, depth: u8) -> ProviderResult<String> {
        self.request(method("PROPFIND")?, url, body, depth).await
    }

    /// Performs a REPORT request.
    pub async fn report(&self, url: &str, body: &str) -> ProviderResult<String> {
        self.request(method("REPORT")?, url, body, 1).await
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: &str,
        depth: u8,
    ) -> ProviderResult<String> {
        let authorization = self.authorization(&method, url).await;
        let response = self
            .send(method.clone(), url, body, depth, authorization)
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return self.handle_response(response).await;
        }

        let Some(credentials) = self.config.credentials.as_ref() else {
            return Err(ProviderError::authentication(
                "server requires authentication but no credentials are configured",
            ));
        };

        let challenges: Vec<&str> = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let Some(mut scheme) = AuthScheme::from_challenges(challenges) else {
            return Err(ProviderError::authentication(
                "server requires authentication but offers no supported scheme",
            ));
        };
        debug!(?scheme, "Received 401, authenticating");

        let header = scheme.authorize(method.as_str(), &request_uri(url), credentials);
        *self.scheme.lock().await = Some(scheme);

        let response = self.send(method, url, body, depth, Some(header)).await?;
        self.handle_response(response).await
    }

    /// Builds the Authorization header if a scheme was already negotiated.
    async fn authorization(&self, method: &Method, url: &str) -> Option<String> {
        let credentials = self.config.credentials.as_ref()?;
        let mut scheme = self.scheme.lock().await;
        scheme
            .as_mut()
            .map(|s| s.authorize(method.as_str(), &request_uri(url), credentials))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: &str,
        depth: u8,
        authorization: Option<String>,
    ) -> ProviderResult<Response> {
        trace!(%method, %url, authenticated = authorization.is_some(), "Sending request");

        let mut request = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .header("Depth", depth.to_string())
            .body(body.to_string());
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        request
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("request to {url} failed")).with_source(e))
    }

    /// Maps the response status and extracts the body.
    async fn handle_response(&self, response: Response) -> ProviderResult<String> {
        let status = response.status();
        trace!(status = %status, "Received response");

        match status {
            StatusCode::OK | StatusCode::MULTI_STATUS => response.text().await.map_err(|e| {
                ProviderError::network("failed to read response body").with_source(e)
            }),
            StatusCode::UNAUTHORIZED => Err(ProviderError::authentication(
                "authentication failed: invalid credentials",
            )),
            StatusCode::FORBIDDEN => Err(ProviderError::authorization("access denied")),
            StatusCode::NOT_FOUND => Err(ProviderError::not_found("calendar or resource not found")),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::rate_limited("too many requests")),
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::server(format!("server error ({s}): {body}")))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %s, body = %body, "Unexpected response status");
                Err(ProviderError::invalid_response(format!(
                    "unexpected status {s}: {body}"
                )))
            }
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CalDavConfig {
        &self.config
    }
}

fn method(name: &str) -> ProviderResult<Method> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| ProviderError::internal(format!("invalid HTTP method {name}")).with_source(e))
}

/// The request-target used in Digest computations: path plus query.
fn request_uri(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn client_creation() {
        let config = CalDavConfig::new("https://dav.example.com/")
            .unwrap()
            .with_credentials("user", "pass")
            .with_timeout(Duration::from_secs(10));

        let client = CalDavClient::new(config).unwrap();
        assert_eq!(client.config().url.as_str(), "https://dav.example.com/");
    }

    #[test]
    fn request_uri_keeps_query() {
        assert_eq!(request_uri("https://dav.example.com/cal/work/"), "/cal/work/");
        assert_eq!(request_uri("https://dav.example.com/cal/?x=1"), "/cal/?x=1");
    }

    #[test]
    fn webdav_methods_are_valid() {
        assert_eq!(method("PROPFIND").unwrap().as_str(), "PROPFIND");
        assert_eq!(method("REPORT").unwrap().as_str(), "REPORT");
    }
}
