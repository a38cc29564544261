//! "Sign in with Google" identity check.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config;
use crate::error::{Result, ServerError};
use crate::ml::upstream_error;

const SERVICE: &str = "identity provider";
const ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Verified identity asserted by the provider.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    pub email: String,
    pub name: String,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Check an ID token issued by the provider.
    async fn verify(&self, credential: &str) -> Result<Identity>;
}

/// Claims returned by the `tokeninfo` endpoint.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    iss: String,
    email: Option<String>,
    /// Google sends either `"true"` or `true`.
    #[serde(default)]
    email_verified: serde_json::Value,
    name: Option<String>,
}

impl TokenInfo {
    fn into_identity(self, client_id: &str) -> Result<Identity> {
        let verified = matches!(&self.email_verified, serde_json::Value::Bool(true))
            || self.email_verified.as_str() == Some("true");

        if self.aud != client_id || !ISSUERS.contains(&self.iss.as_str()) || !verified {
            tracing::debug!(aud = %self.aud, iss = %self.iss, verified, "google token rejected");
            return Err(ServerError::InvalidIdentity);
        }

        let email = self.email.ok_or(ServerError::InvalidIdentity)?;
        let name = self.name.unwrap_or_else(|| email.clone());
        Ok(Identity { email, name })
    }
}

pub struct GoogleIdentityVerifier {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
}

impl GoogleIdentityVerifier {
    /// Create a new [`GoogleIdentityVerifier`].
    pub fn new(config: &config::Google, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: config.tokeninfo_endpoint.clone(),
            client_id: config.client_id.clone(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|err| upstream_error(SERVICE, err))?;

        // an invalid token is answered with 400.
        if response.status().is_client_error() {
            return Err(ServerError::InvalidIdentity);
        }

        response
            .error_for_status()
            .map_err(|err| upstream_error(SERVICE, err))?
            .json::<TokenInfo>()
            .await
            .map_err(|err| upstream_error(SERVICE, err))?
            .into_identity(&self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "1234.apps.googleusercontent.com";

    fn info(body: serde_json::Value) -> TokenInfo {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let identity = info(serde_json::json!({
            "aud": CLIENT_ID,
            "iss": "https://accounts.google.com",
            "email": "alice@gmail.com",
            "email_verified": "true",
            "name": "Alice"
        }))
        .into_identity(CLIENT_ID)
        .unwrap();

        assert_eq!(identity.email, "alice@gmail.com");
        assert_eq!(identity.name, "Alice");
    }

    #[test]
    fn test_wrong_audience() {
        let result = info(serde_json::json!({
            "aud": "someone-else",
            "iss": "accounts.google.com",
            "email": "alice@gmail.com",
            "email_verified": true
        }))
        .into_identity(CLIENT_ID);

        assert!(matches!(result, Err(ServerError::InvalidIdentity)));
    }

    #[test]
    fn test_unverified_email() {
        let result = info(serde_json::json!({
            "aud": CLIENT_ID,
            "iss": "accounts.google.com",
            "email": "alice@gmail.com",
            "email_verified": "false"
        }))
        .into_identity(CLIENT_ID);

        assert!(matches!(result, Err(ServerError::InvalidIdentity)));
    }
}
