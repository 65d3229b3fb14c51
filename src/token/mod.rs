//! Credential lookup against the secrets backend.
//!
//! Defines the [`TokenLookup`] trait and the [`TokenSecret`] metadata it
//! returns. Two implementations ship:
//! - [`client::VaultTokenClient`] — HTTP `lookup-self` against the backend
//! - [`InMemoryTokenLookup`] — registered tokens, for tests and local runs

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::workload::Credential;

pub mod client;

/// Policy name that grants unrestricted access.
pub const ROOT_POLICY: &str = "root";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from a credential lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// HTTP transport failure.
    #[error("lookup request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Backend answered with a non-success status.
    #[error("backend returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitised response body.
        body: String,
    },
    /// The credential is unknown to the backend or has been revoked.
    #[error("token not found or permission denied")]
    NotFound,
    /// Response did not match the expected schema.
    #[error("lookup response parse error: {0}")]
    Parse(String),
    /// Configured backend address is unusable.
    #[error("invalid backend address {address}: {reason}")]
    InvalidAddress {
        /// The configured address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The caller cancelled the admission request.
    #[error("lookup cancelled")]
    Cancelled,
    /// The lookup did not complete in time.
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

// ---------------------------------------------------------------------------
// Token metadata
// ---------------------------------------------------------------------------

/// Metadata for a looked-up credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenSecret {
    /// Token accessor, safe to log.
    pub accessor: String,
    /// Policies attached to the token. `None` when the backend sent none.
    pub policies: Option<Vec<String>>,
    /// Policies inherited through the token's identity.
    pub identity_policies: Option<Vec<String>>,
    /// Namespace the token was created in. Empty means the root namespace.
    pub namespace_path: String,
    /// Expiry, when the token is not periodic.
    pub expire_time: Option<DateTime<Utc>>,
}

impl TokenSecret {
    /// Build token metadata carrying the given policies in the root namespace.
    pub fn with_policies<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            policies: Some(policies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Set the namespace path the token belongs to.
    #[must_use]
    pub fn in_namespace(mut self, namespace_path: impl Into<String>) -> Self {
        self.namespace_path = namespace_path.into();
        self
    }

    /// Union of token and identity policies.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::Parse` when the lookup carried no policy data.
    pub fn policies(&self) -> Result<BTreeSet<String>, LookupError> {
        if self.policies.is_none() && self.identity_policies.is_none() {
            return Err(LookupError::Parse(
                "token lookup returned no policy data".to_owned(),
            ));
        }
        Ok(self
            .policies
            .iter()
            .chain(self.identity_policies.iter())
            .flatten()
            .cloned()
            .collect())
    }

    /// True when the token carries the root policy.
    pub fn is_root(&self) -> bool {
        self.policies
            .iter()
            .chain(self.identity_policies.iter())
            .flatten()
            .any(|p| p == ROOT_POLICY)
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    data: Option<TokenSecret>,
}

/// Parse a `lookup-self` response body into token metadata.
///
/// # Errors
///
/// Returns `LookupError::Parse` if the body is not a lookup response.
pub fn parse_lookup_response(body: &str) -> Result<TokenSecret, LookupError> {
    let resp: LookupResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;
    resp.data
        .ok_or_else(|| LookupError::Parse("lookup response has no data".to_owned()))
}

// ---------------------------------------------------------------------------
// Lookup trait
// ---------------------------------------------------------------------------

/// Resolves a submitted credential to its token metadata.
///
/// Implementations must not retry internally. Callers cancel a lookup by
/// dropping its future.
#[async_trait]
pub trait TokenLookup: Send + Sync {
    /// Look up the credential.
    async fn lookup(&self, credential: &Credential) -> Result<TokenSecret, LookupError>;
}

/// Token lookup backed by an in-memory table.
#[derive(Debug, Default)]
pub struct InMemoryTokenLookup {
    tokens: RwLock<HashMap<String, TokenSecret>>,
}

impl InMemoryTokenLookup {
    /// Create an empty lookup table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for a credential, replacing any previous entry.
    pub async fn insert(&self, credential: &Credential, secret: TokenSecret) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(credential.expose().to_owned(), secret);
    }

    /// Forget a credential.
    pub async fn revoke(&self, credential: &Credential) {
        let mut tokens = self.tokens.write().await;
        tokens.remove(credential.expose());
    }
}

#[async_trait]
impl TokenLookup for InMemoryTokenLookup {
    async fn lookup(&self, credential: &Credential) -> Result<TokenSecret, LookupError> {
        let tokens = self.tokens.read().await;
        tokens
            .get(credential.expose())
            .cloned()
            .ok_or(LookupError::NotFound)
    }
}
