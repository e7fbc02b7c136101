use std::collections::HashMap;

use anyhow::{anyhow, Result};
use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

/// Signing keys of the notification issuer, keyed by `kid`.
///
/// Fetched once at process start and read-only afterwards. A `kid` that is
/// not in the set fails validation without triggering a re-fetch.
pub struct SigningKeys {
    keys: HashMap<String, DecodingKey>,
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
pub struct JwkEntry {
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

impl SigningKeys {
    pub fn from_jwks(body: JwksResponse) -> Result<Self> {
        let mut keys = HashMap::new();
        for entry in body.keys {
            if entry.kty.as_str() != "RSA" {
                continue;
            }
            let (kid, n, e) = match (entry.kid, entry.n, entry.e) {
                (Some(kid), Some(n), Some(e)) => (kid, n, e),
                _ => continue,
            };
            match DecodingKey::from_rsa_components(&n, &e) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => {
                    warn!(error = %err, "failed to parse jwk entry; skipping");
                }
            }
        }

        if keys.is_empty() {
            return Err(anyhow!("no usable keys in JWKS response"));
        }

        Ok(Self { keys })
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }
}

/// Fetch the issuer's signing keys through the discovery-document chain:
/// the OpenID configuration names the JWKS endpoint, which holds the keys.
pub async fn fetch_signing_keys(client: &Client, discovery_url: &str) -> Result<SigningKeys> {
    let response = client.get(discovery_url).send().await?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "openid configuration fetch failed: status {}",
            response.status()
        ));
    }
    let config: OpenIdConfig = response.json().await?;

    let response = client.get(&config.jwks_uri).send().await?;
    if !response.status().is_success() {
        return Err(anyhow!("jwks fetch failed: status {}", response.status()));
    }
    let body: JwksResponse = response.json().await?;

    SigningKeys::from_jwks(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_non_rsa_and_incomplete_entries() {
        let body: JwksResponse = serde_json::from_value(serde_json::json!({
            "keys": [
                { "kid": "ec-key", "kty": "EC" },
                { "kid": "no-components", "kty": "RSA" },
                { "kid": "good", "kty": "RSA",
                  "n": crate::auth::fixtures::TEST_N,
                  "e": crate::auth::fixtures::TEST_E },
            ]
        }))
        .unwrap();

        let keys = SigningKeys::from_jwks(body).unwrap();
        assert!(keys.get("good").is_some());
        assert!(keys.get("ec-key").is_none());
        assert!(keys.get("no-components").is_none());
    }

    #[test]
    fn empty_key_set_is_an_error() {
        let body = JwksResponse { keys: Vec::new() };
        assert!(SigningKeys::from_jwks(body).is_err());
    }
}
