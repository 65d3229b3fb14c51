//! HTTP token lookup against the backend's `auth/token/lookup-self` endpoint.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;
use url::Url;

use super::{parse_lookup_response, LookupError, TokenLookup, TokenSecret};
use crate::config::LookupConfig;
use crate::workload::Credential;

const LOOKUP_SELF_PATH: &str = "v1/auth/token/lookup-self";
const TOKEN_HEADER: &str = "X-Vault-Token";
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Token lookup client for a single backend address.
#[derive(Debug, Clone)]
pub struct VaultTokenClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl VaultTokenClient {
    /// Create a client for the backend at `address`.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::InvalidAddress` if `address` is not an absolute
    /// http(s) URL.
    pub fn new(address: &str) -> Result<Self, LookupError> {
        Ok(Self {
            endpoint: lookup_endpoint(address)?,
            client: reqwest::Client::new(),
        })
    }

    /// Create a client from lookup settings.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::InvalidAddress` if the configured address is unusable.
    pub fn from_config(config: &LookupConfig) -> Result<Self, LookupError> {
        Self::new(&config.address)
    }

    /// Full URL the client calls.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Resolve the `lookup-self` URL under a backend base address.
///
/// # Errors
///
/// Returns `LookupError::InvalidAddress` for unparsable or non-http(s) addresses.
pub fn lookup_endpoint(address: &str) -> Result<Url, LookupError> {
    let invalid = |reason: String| LookupError::InvalidAddress {
        address: address.to_owned(),
        reason,
    };

    let mut base = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(LOOKUP_SELF_PATH)
        .map_err(|e| invalid(e.to_string()))
}

#[async_trait]
impl TokenLookup for VaultTokenClient {
    async fn lookup(&self, credential: &Credential) -> Result<TokenSecret, LookupError> {
        debug!(endpoint = %self.endpoint, "looking up token");

        let response = self
            .client
            .get(self.endpoint.clone())
            .header(TOKEN_HEADER, credential.expose())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            return Err(LookupError::HttpStatus {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }
        parse_lookup_response(&body)
    }
}

/// Collapse whitespace, mask anything shaped like a token, and cap the length.
pub fn sanitize_error_body(raw: &str) -> String {
    let mut sanitized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    for pattern in [r"hvs\.[A-Za-z0-9_\-]{20,}", r"\bs\.[A-Za-z0-9]{20,}"] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let mut shortened: String = sanitized.chars().take(MAX_ERROR_BODY_CHARS).collect();
        shortened.push_str("...");
        return shortened;
    }
    sanitized
}
