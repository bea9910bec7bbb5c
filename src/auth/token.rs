//! Signed bearer tokens.
//!
//! A token is `base64url(claims json) . base64url(hmac-sha512)` over the
//! payload. Verification checks the signature before looking at the expiry,
//! so a tampered token is always `Invalid`, never `Expired`. There is no
//! revocation list; the short lifetime bounds the exposure of a leaked token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;

use crate::db::models::{Account, Role};

type HmacSha512 = Hmac<Sha512>;

/// Verified token payload: the actor identity every protected request runs as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub role: Role,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

pub struct TokenSigner {
    key: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            key: secret.to_vec(),
            ttl_secs,
        }
    }

    /// Issue a token for an account, expiring `ttl_secs` from now.
    pub fn issue(&self, account: &Account) -> String {
        let claims = Claims {
            sub: account.id,
            name: account.display_name.clone(),
            role: account.role,
            exp: Utc::now().timestamp() + self.ttl_secs,
        };
        self.issue_claims(&claims)
    }

    fn issue_claims(&self, claims: &Claims) -> String {
        let json = serde_json::to_vec(claims).expect("claims serialize to JSON");
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes()));
        format!("{payload}.{signature}")
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Invalid)?;

        let mut mac = HmacSha512::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Invalid)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Invalid)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Invalid)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha512::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}
