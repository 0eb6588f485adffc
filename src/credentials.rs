//! Access token acquisition.
//!
//! A token is taken from the page address when it carries a `token` query
//! parameter (the parameter is then stripped so a reload or a shared link
//! does not leak it), otherwise it is requested from the token endpoint.

use async_trait::async_trait;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::error::CredentialError;

/// Opaque access token. Not `Clone`: a token is moved into exactly one device.
pub struct Token(SecretString);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token([REDACTED])")
    }
}

/// Where a token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    PageAddress,
    Endpoint,
}

/// Supplies a fresh token each time it is asked
#[async_trait]
pub trait TokenSource: Send {
    async fn token(&mut self) -> Result<(Token, TokenOrigin), CredentialError>;
}

/// The hosting page's visible address
pub trait AddressBar: Send + Sync {
    fn current(&self) -> Url;

    /// Rewrite the visible address without reloading the page
    fn replace(&self, url: Url);
}

/// Address bar kept in memory, for hosts without a real one
#[derive(Debug, Clone)]
pub struct MemoryAddressBar {
    url: Arc<Mutex<Url>>,
}

impl MemoryAddressBar {
    pub fn new(url: Url) -> Self {
        Self {
            url: Arc::new(Mutex::new(url)),
        }
    }
}

impl AddressBar for MemoryAddressBar {
    fn current(&self) -> Url {
        match self.url.lock() {
            Ok(url) => url.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, url: Url) {
        match self.url.lock() {
            Ok(mut current) => *current = url,
            Err(poisoned) => *poisoned.into_inner() = url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Token source backed by the page address and the `voice-token` endpoint
pub struct CredentialProvider {
    address_bar: Box<dyn AddressBar>,
    http: reqwest::Client,
    token_path: String,
}

impl CredentialProvider {
    pub fn new(
        address_bar: Box<dyn AddressBar>,
        token_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CredentialError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            address_bar,
            http,
            token_path: token_path.into(),
        })
    }

    /// Take the `token` query parameter out of the page address, if present.
    ///
    /// The address bar is rewritten with every other parameter intact.
    pub fn take_address_token(&self) -> Option<Token> {
        let mut url = self.address_bar.current();
        let mut token = None;
        let remaining: Vec<(String, String)> = url
            .query_pairs()
            .filter_map(|(key, value)| {
                if key == "token" {
                    if token.is_none() && !value.is_empty() {
                        token = Some(value.into_owned());
                    }
                    None
                } else {
                    Some((key.into_owned(), value.into_owned()))
                }
            })
            .collect();

        let token = token?;
        if remaining.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(remaining);
        }
        debug!("Stripping token from page address, now {}", url);
        self.address_bar.replace(url);
        Some(Token::new(token))
    }

    /// `GET <page>/voice-token` and parse `{ "token": "..." }`.
    pub async fn fetch_token(&self) -> Result<Token, CredentialError> {
        let endpoint = self.address_bar.current().join(&self.token_path)?;
        info!("Requesting access token from {}", endpoint);

        let response = self
            .http
            .get(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Token endpoint returned {}", status);
            return Err(CredentialError::Status(status));
        }

        let body: TokenResponse = response.json().await?;
        if body.token.is_empty() {
            return Err(CredentialError::MissingToken);
        }
        Ok(Token::new(body.token))
    }
}

#[async_trait]
impl TokenSource for CredentialProvider {
    async fn token(&mut self) -> Result<(Token, TokenOrigin), CredentialError> {
        if let Some(token) = self.take_address_token() {
            info!("Using access token from page address");
            return Ok((token, TokenOrigin::PageAddress));
        }
        let token = self.fetch_token().await?;
        Ok((token, TokenOrigin::Endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(page: &str) -> (CredentialProvider, MemoryAddressBar) {
        let bar = MemoryAddressBar::new(Url::parse(page).unwrap());
        let provider =
            CredentialProvider::new(Box::new(bar.clone()), "voice-token", Duration::from_secs(5)).unwrap();
        (provider, bar)
    }

    #[tokio::test]
    async fn address_token_is_used_once_and_stripped() {
        let (mut provider, bar) = provider("http://localhost:9/index.html?token=abc123");

        let (token, origin) = provider.token().await.unwrap();
        assert_eq!(token.expose(), "abc123");
        assert_eq!(origin, TokenOrigin::PageAddress);
        assert_eq!(bar.current().as_str(), "http://localhost:9/index.html");
        assert!(provider.take_address_token().is_none());
    }

    #[test]
    fn stripping_keeps_other_parameters() {
        let (provider, bar) = provider("http://localhost/index.html?lang=en&token=xyz&debug=1");

        let token = provider.take_address_token().unwrap();
        assert_eq!(token.expose(), "xyz");
        assert_eq!(bar.current().as_str(), "http://localhost/index.html?lang=en&debug=1");
    }

    #[test]
    fn empty_token_parameter_is_ignored() {
        let (provider, bar) = provider("http://localhost/index.html?token=");
        assert!(provider.take_address_token().is_none());
        assert_eq!(bar.current().as_str(), "http://localhost/index.html?token=");
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::new("secret-value");
        assert!(!format!("{:?}", token).contains("secret-value"));
    }

    #[tokio::test]
    async fn fetches_token_from_endpoint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/voice-token"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "fresh-token" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let (mut provider, _bar) = provider(&format!("{}/index.html", mock_server.uri()));
        let (token, origin) = provider.token().await.unwrap();
        assert_eq!(token.expose(), "fresh-token");
        assert_eq!(origin, TokenOrigin::Endpoint);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/voice-token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let (provider, _bar) = provider(&format!("{}/index.html", mock_server.uri()));
        let result = provider.fetch_token().await;
        assert!(matches!(result, Err(CredentialError::Status(s)) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/voice-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let (provider, _bar) = provider(&format!("{}/index.html", mock_server.uri()));
        assert!(matches!(provider.fetch_token().await, Err(CredentialError::Http(_))));
    }

    #[tokio::test]
    async fn empty_token_in_body_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/voice-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "" })))
            .mount(&mock_server)
            .await;

        let (provider, _bar) = provider(&format!("{}/index.html", mock_server.uri()));
        assert!(matches!(provider.fetch_token().await, Err(CredentialError::MissingToken)));
    }
}
