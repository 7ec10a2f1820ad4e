//! HTTP client for the IONOS Cloud REST APIs
//!
//! One `ApiClient` is shared by every product service. Each call receives
//! the endpoint it targets, so TLS settings and base URLs never leak from one
//! request into another.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use stratus_core::provider::{ProviderError, ProviderResult};

use crate::config::{Credentials, ENV_PASSWORD, ENV_TOKEN, ENV_USERNAME};
use crate::endpoint::ResolvedEndpoint;

/// Maximum length of a response body written to the debug log
const MAX_LOG_BODY_LENGTH: usize = 512;

const USER_AGENT: &str = concat!("stratus-provider-ionoscloud/", env!("CARGO_PKG_VERSION"));

/// Truncate a body for logging and drop control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| c.is_control() && c != ' ', "")
}

/// Error body returned by the IONOS APIs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    http_status: Option<u16>,
    #[serde(default)]
    messages: Vec<ApiErrorMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorMessage {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Human readable message from an error response body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.messages.is_empty() => parsed
            .messages
            .iter()
            .map(|m| match (&m.error_code, &m.message) {
                (Some(code), Some(msg)) => format!("{} ({})", msg, code),
                (None, Some(msg)) => msg.clone(),
                (Some(code), None) => code.clone(),
                (None, None) => "unknown error".to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Ok(parsed) => parsed
            .http_status
            .map(|s| format!("HTTP {}", s))
            .unwrap_or_else(|| sanitize_for_log(body)),
        Err(_) => sanitize_for_log(body),
    }
}

/// Key of a TLS-customised client: URL, skip-verify flag and CA data
type TlsKey = (String, bool, Option<String>);

/// Shared REST client
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    /// Clients for endpoints with their own TLS settings
    tls_clients: Arc<DashMap<TlsKey, Client>>,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("credentials", &self.credentials)
            .field("tls_clients", &self.tls_clients.len())
            .finish()
    }
}

impl ApiClient {
    /// Client for the REST APIs. Without credentials every request fails
    /// with a configuration error before anything is sent.
    pub fn new(credentials: Option<Credentials>) -> ProviderResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ProviderError::configuration("Failed to create HTTP client").with_cause(e)
            })?;
        Ok(Self {
            http,
            tls_clients: Arc::new(DashMap::new()),
            credentials,
        })
    }

    /// HTTP client honoring the endpoint's TLS settings
    fn http_for(&self, endpoint: &ResolvedEndpoint) -> ProviderResult<Client> {
        if !endpoint.skip_tls_verify && endpoint.certificate_authority.is_none() {
            return Ok(self.http.clone());
        }

        let key = (
            endpoint.url.clone(),
            endpoint.skip_tls_verify,
            endpoint.certificate_authority.clone(),
        );
        if let Some(client) = self.tls_clients.get(&key) {
            return Ok(client.clone());
        }
        let client = Self::build_tls_client(endpoint)?;
        self.tls_clients.insert(key, client.clone());
        Ok(client)
    }

    fn build_tls_client(endpoint: &ResolvedEndpoint) -> ProviderResult<Client> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if endpoint.skip_tls_verify {
            log::debug!("TLS verification disabled for {}", endpoint.url);
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(data) = &endpoint.certificate_authority {
            builder = builder.add_root_certificate(decode_certificate(data)?);
        }
        builder.build().map_err(|e| {
            ProviderError::configuration(format!(
                "Failed to create HTTP client for {}",
                endpoint.url
            ))
            .with_cause(e)
        })
    }

    fn authorize(&self, request: RequestBuilder) -> ProviderResult<RequestBuilder> {
        match &self.credentials {
            Some(Credentials::Token(token)) => Ok(request.bearer_auth(token)),
            Some(Credentials::Basic { username, password }) => {
                Ok(request.basic_auth(username, Some(password)))
            }
            None => Err(ProviderError::configuration(format!(
                "Missing credentials: set {} or {} and {}",
                ENV_TOKEN, ENV_USERNAME, ENV_PASSWORD
            ))),
        }
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &ResolvedEndpoint,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> ProviderResult<String> {
        let url = format!("{}{}", endpoint.url, path);
        log::debug!("{} {}", method, url);

        let mut request = self
            .authorize(self.http_for(endpoint)?.request(method.clone(), &url))?
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            ProviderError::new(format!("{} {} failed: {}", method, url, e)).with_cause(e)
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ProviderError::new(format!("Failed to read response of {} {}", method, url))
                .with_cause(e)
        })?;
        log::debug!("{} {} -> {}: {}", method, url, status, sanitize_for_log(&text));

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(format!(
                "{} {} returned 404: {}",
                method,
                path,
                error_message(&text)
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::new(format!(
                "{} {} failed with status {}: {}",
                method,
                path,
                status.as_u16(),
                error_message(&text)
            )));
        }
        Ok(text)
    }

    fn parse<T: DeserializeOwned>(path: &str, text: &str) -> ProviderResult<T> {
        let text = if text.trim().is_empty() { "null" } else { text };
        serde_json::from_str(text).map_err(|e| {
            ProviderError::invalid_response(format!("Failed to parse response of {}: {}", path, e))
                .with_cause(e)
        })
    }

    fn to_body<B: Serialize + ?Sized>(body: &B) -> ProviderResult<serde_json::Value> {
        serde_json::to_value(body).map_err(|e| {
            ProviderError::validation(format!("Failed to encode request body: {}", e)).with_cause(e)
        })
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &ResolvedEndpoint,
        path: &str,
    ) -> ProviderResult<T> {
        self.get_query(endpoint, path, &[]).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        endpoint: &ResolvedEndpoint,
        path: &str,
        query: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let text = self.send(Method::GET, endpoint, path, query, None).await?;
        Self::parse(path, &text)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &ResolvedEndpoint,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let body = Self::to_body(body)?;
        let text = self.send(Method::POST, endpoint, path, &[], Some(body)).await?;
        Self::parse(path, &text)
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &ResolvedEndpoint,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let body = Self::to_body(body)?;
        let text = self.send(Method::PUT, endpoint, path, &[], Some(body)).await?;
        Self::parse(path, &text)
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &ResolvedEndpoint,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let body = Self::to_body(body)?;
        let text = self.send(Method::PATCH, endpoint, path, &[], Some(body)).await?;
        Self::parse(path, &text)
    }

    pub async fn delete(&self, endpoint: &ResolvedEndpoint, path: &str) -> ProviderResult<()> {
        self.send(Method::DELETE, endpoint, path, &[], None).await?;
        Ok(())
    }
}

/// Decode base64-encoded PEM certificate authority data
pub fn decode_certificate(data: &str) -> ProviderResult<reqwest::Certificate> {
    let pem = BASE64.decode(data.trim()).map_err(|e| {
        ProviderError::configuration("Certificate authority data is not valid base64").with_cause(e)
    })?;
    reqwest::Certificate::from_pem(&pem).map_err(|e| {
        ProviderError::configuration("Certificate authority data is not a valid PEM certificate")
            .with_cause(e)
    })
}
