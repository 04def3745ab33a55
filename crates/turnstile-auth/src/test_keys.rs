//! P-256 signing keys for token tests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

pub struct TestKey {
    kid: String,
    encoding: EncodingKey,
    x: String,
    y: String,
}

impl TestKey {
    pub fn generate(kid: &str) -> Self {
        let pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let encoding = EncodingKey::from_ec_pem(pair.serialize_pem().as_bytes()).unwrap();

        // Uncompressed point: 0x04 || x || y
        let point = pair.public_key_raw();
        assert_eq!(point.len(), 65);

        Self {
            kid: kid.to_string(),
            encoding,
            x: URL_SAFE_NO_PAD.encode(&point[1..33]),
            y: URL_SAFE_NO_PAD.encode(&point[33..]),
        }
    }

    pub fn jwk(&self) -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "x": self.x,
            "y": self.y,
            "kid": self.kid,
            "alg": "ES256",
            "use": "sig",
        }))
        .unwrap()
    }

    pub fn jwk_set(&self) -> JwkSet {
        JwkSet {
            keys: vec![self.jwk()],
        }
    }

    pub fn sign(&self, claims: &impl Serialize) -> String {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.encoding).unwrap()
    }
}

/// Standard claims valid for five minutes.
pub fn claims(issuer: &str, audience: &str, extra: serde_json::Value) -> serde_json::Value {
    let mut claims = serde_json::json!({
        "iss": issuer,
        "aud": audience,
        "exp": chrono::Utc::now().timestamp() + 300,
    });
    if let (Some(base), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    claims
}

/// Serves a fixed key set.
pub struct StaticJwks(pub JwkSet);

#[async_trait::async_trait]
impl crate::jwks::JwksFetcher for StaticJwks {
    async fn fetch(&self, _url: &str) -> Result<JwkSet, crate::error::AuthError> {
        Ok(self.0.clone())
    }
}

/// A cache that always serves `key`.
pub fn cache_for(key: &TestKey) -> std::sync::Arc<crate::jwks::JwksCache> {
    std::sync::Arc::new(crate::jwks::JwksCache::new(
        std::sync::Arc::new(StaticJwks(key.jwk_set())),
        &turnstile_core::JwksConfig::default(),
    ))
}
