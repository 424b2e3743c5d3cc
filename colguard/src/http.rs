//! Uniform HTTP request/response envelope for the REST API.
//!
//! [`HttpPorter::send`] never fails: transport problems come back as an
//! [`HttpResponse`] with status [`TRANSPORT_FAILURE`] and the error text as a
//! JSON string body, so callers branch on the status code alone.

use crate::config::{self, ApiSettings};
use crate::error::{ConfigError, Error};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, warn};
use url::Url;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Status reported when the request never got an HTTP answer.
pub const TRANSPORT_FAILURE: i32 = -1;

/// Header naming the intended verb when PATCH is sent as PUT.
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

const JSON_CONTENT: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Verb used on the wire. PATCH travels as PUT.
    fn wire_method(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put | Self::Patch => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code plus parsed body of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status_code: i32,
    pub body: Value,
}

impl HttpResponse {
    fn transport_failure(message: impl Into<String>) -> Self {
        Self { status_code: TRANSPORT_FAILURE, body: Value::String(message.into()) }
    }

    /// Builds a response from raw body text.
    ///
    /// Empty text becomes `{}`; text that is not JSON is kept as a JSON string.
    #[must_use]
    pub fn from_text(status_code: i32, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status_code, body }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        self.status_code == TRANSPORT_FAILURE
    }

    /// Server supplied error text: the `error` field, a plain string body, or
    /// the body as compact JSON.
    #[must_use]
    pub fn error_message(&self) -> String {
        match &self.body {
            Value::String(text) => text.clone(),
            body => body
                .get("error")
                .and_then(Value::as_str)
                .map_or_else(|| body.to_string(), str::to_string),
        }
    }
}

/// Value of the `Authorization` header.
#[derive(Debug, Clone)]
pub struct Authorization(SecretString);

impl Authorization {
    #[must_use]
    pub fn basic(user: &str, password: &SecretString) -> Self {
        let encoded = STANDARD.encode(format!("{user}:{}", password.expose_secret()));
        Self(SecretString::new(format!("Basic {encoded}")))
    }

    #[must_use]
    pub fn bearer(token: &SecretString) -> Self {
        Self(SecretString::new(format!("Bearer {}", token.expose_secret())))
    }

    /// Builds the header from `ionic.authorizationtype` and its credentials.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authorization` if the type is unknown or its
    /// credentials are not set.
    pub fn from_settings(api: &ApiSettings) -> Result<Self, Error> {
        match api.authorization_type.as_str() {
            "Basic" => match (&api.basic_user, &api.basic_password) {
                (Some(user), Some(password)) => Ok(Self::basic(user, password)),
                _ => Err(Error::Authorization("Basic Authorization not set".to_string())),
            },
            "Bearer" => api
                .bearer_token
                .as_ref()
                .map(Self::bearer)
                .ok_or_else(|| Error::Authorization("Bearer Authorization not set".to_string())),
            other => Err(Error::Authorization(format!("Unrecognized Authorization type '{other}'"))),
        }
    }

    #[must_use]
    pub fn header_value(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Tenant-scoped base URL plus the credentials used against it.
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    base_url: String,
    authorization: Authorization,
}

impl ApiEndpoint {
    /// Endpoint rooted at `{api_url}/v2/{tenant_id}`.
    #[must_use]
    pub fn new(api_url: &str, tenant_id: &str, authorization: Authorization) -> Self {
        let base_url = format!("{}/v2/{tenant_id}", api_url.trim_end_matches('/'));
        Self { base_url, authorization }
    }

    /// # Errors
    ///
    /// Returns `Error::Config` if the API URL or tenant id is unset, or
    /// `Error::Authorization` if no authorization header can be built.
    pub fn from_settings(api: &ApiSettings) -> Result<Self, Error> {
        let url = api.url.as_deref().ok_or(ConfigError::Missing(config::API_URL))?;
        let tenant_id = api.tenant_id.as_deref().ok_or(ConfigError::Missing(config::API_TENANT_ID))?;
        Ok(Self::new(url, tenant_id, Authorization::from_settings(api)?))
    }

    /// Absolute URL of `path` under the tenant root.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub const fn authorization(&self) -> &Authorization {
        &self.authorization
    }
}

/// Sends JSON requests and wraps every outcome in an [`HttpResponse`].
#[derive(Debug, Clone)]
pub struct HttpPorter {
    client: Client,
    allow_plain_http: bool,
}

impl HttpPorter {
    /// Creates a porter that only talks HTTPS.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the TLS client cannot be initialized.
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
        Ok(Self { client, allow_plain_http: false })
    }

    /// Also accepts `http://` URLs, for local servers.
    #[must_use]
    pub fn allow_plain_http(mut self) -> Self {
        self.allow_plain_http = true;
        self
    }

    fn check_url(&self, url: &str) -> Result<Url, String> {
        let parsed = Url::parse(url).map_err(|e| format!("Failed to set url {url} {e}"))?;
        match parsed.scheme() {
            "https" => Ok(parsed),
            "http" if self.allow_plain_http => Ok(parsed),
            scheme => Err(format!("Failed to set url {url} unsupported scheme '{scheme}'")),
        }
    }

    /// Sends one request.
    ///
    /// PATCH is sent as PUT with `X-HTTP-Method-Override: PATCH`. A non-empty
    /// body is sent as `application/json`.
    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        authorization: Option<&Authorization>,
        body: Option<&str>,
    ) -> HttpResponse {
        let target = match self.check_url(url) {
            Ok(target) => target,
            Err(message) => {
                eprintln!("ERROR: {message}");
                return HttpResponse::transport_failure(message);
            }
        };
        debug!("{method} {target}");

        let mut request =
            self.client.request(method.wire_method(), target).header(ACCEPT, JSON_CONTENT);
        if method == HttpMethod::Patch {
            request = request.header(METHOD_OVERRIDE_HEADER, HttpMethod::Patch.as_str());
        }
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization.header_value());
        }
        if let Some(body) = body.filter(|body| !body.is_empty()) {
            request = request.header(CONTENT_TYPE, JSON_CONTENT).body(body.to_string());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                eprintln!("ERROR: Failed to connect to {url} {e}");
                return HttpResponse::transport_failure(e.to_string());
            }
        };

        let status_code = i32::from(response.status().as_u16());
        let text = response.text().await.unwrap_or_else(|e| {
            warn!("failed to read response body from {url}: {e}");
            String::new()
        });
        debug!("{method} {url} -> {status_code}");
        HttpResponse::from_text(status_code, &text)
    }
}
