use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};

use crate::core::error::{ConfigError, Error};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A request as seen by the transport: everything already serialised.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<String>,
    pub bearer: Option<String>,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("authorized", &self.bearer.is_some())
            .finish()
    }
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_owned(),
            query: None,
            body: None,
            bearer: None,
        }
    }

    pub fn with_query(mut self, query: String) -> Self {
        self.query = if query.is_empty() { None } else { Some(query) };
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries a request to the server and returns whatever came back. Any HTTP
/// status is a response; only a missing response is an error.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send {
        (**self).execute(request)
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl HttpTransport {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        let base_url = Url::parse(base_url).map_err(|e| ConfigError::BaseUrl(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, request: &ApiRequest) -> Result<Url, Error> {
        let mut url = self
            .base_url
            .join(&request.path)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        url.set_query(request.query.as_deref());

        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let url = self.url(&request)?;

        tracing::debug!("{} {}", request.method, request.path);

        let mut builder = self
            .client
            .request(request.method, url)
            .header(ACCEPT, "application/json");

        if let Some(token) = request.bearer {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let status = resp.status().as_u16();

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(
            "https://map.example.org",
            "ldprotest-client/test",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_url_joins_path_and_query() {
        let request = ApiRequest::new(Method::GET, "/api/pins")
            .with_query("SW=1%2C2&NE=3%2C4".to_owned());

        let url = transport().url(&request).unwrap();

        assert_eq!(
            url.as_str(),
            "https://map.example.org/api/pins?SW=1%2C2&NE=3%2C4"
        );
    }

    #[test]
    fn test_empty_query_is_dropped() {
        let request = ApiRequest::new(Method::GET, "/api/whoami").with_query(String::new());

        assert_eq!(request.query, None);
        assert_eq!(
            transport().url(&request).unwrap().as_str(),
            "https://map.example.org/api/whoami"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let request = ApiRequest::new(Method::POST, "/api/logout")
            .with_bearer(Some("secret.token.value".to_owned()));

        assert!(!format!("{:?}", request).contains("secret"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpTransport::new("not a url", "ua", Duration::from_secs(1)),
            Err(ConfigError::BaseUrl(_))
        ));
    }
}
