use anyhow::Context;

pub mod client;
pub use client::Client;

pub mod models;
pub mod pagination;

// api_exec runs a request, debug-logs it, and turns non-success status into an anyhow::Error.
pub async fn api_exec<T>(b: reqwest::RequestBuilder) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    tracing::debug!(req = ?b, "built request to execute");

    let resp = b.send().await?;
    let status = resp.status();

    if status.is_success() {
        let body = resp.text().await?;
        // Deletions and some mutations answer with an empty body.
        let v: serde_json::Value = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&body).context("parsing response body")?
        };

        tracing::trace!(response_body = %v, status = %status, "got successful response");
        let t: T = serde_json::from_value(v).context("deserializing response body")?;
        Ok(t)
    } else {
        let body = resp.text().await?;
        anyhow::bail!("{status}: {body}");
    }
}

/// The kind of a bearer token handed to the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// A Permit API key, as issued from the dashboard.
    ApiToken,
    /// A user session access token (JWT).
    AccessToken,
    Unknown,
}

pub const API_KEY_PREFIX: &str = "permit_key_";

/// Classify a token by its shape. Nothing is verified against the API.
pub fn token_type(token: &str) -> TokenType {
    let token = token.trim();

    if token.starts_with(API_KEY_PREFIX) && token.len() > API_KEY_PREFIX.len() {
        TokenType::ApiToken
    } else if token.split('.').count() == 3 && token.split('.').all(|part| !part.is_empty()) {
        TokenType::AccessToken
    } else {
        TokenType::Unknown
    }
}

lazy_static::lazy_static! {
    pub static ref DEFAULT_API_URL: url::Url = url::Url::parse("https://api.permit.io/").unwrap();

    // Used only when profile is "local".
    pub static ref LOCAL_API_URL: url::Url = url::Url::parse("http://localhost:8000/").unwrap();
}
