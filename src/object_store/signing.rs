//! HMAC-signed capability URLs for backends that serve object bytes through
//! this process rather than through a provider's own presigning.

use chrono::{DateTime, Utc};
use ring::hmac;
use serde::Deserialize;
use thiserror::Error;

use super::PresignOp;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Capability URL has expired")]
    Expired,
    #[error("Capability URL signature is invalid")]
    BadSignature,
}

/// Query parameters carried by a signed URL.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedParams {
    pub op: String,
    pub expires: i64,
    pub signature: String,
}

pub struct UrlSigner {
    key: hmac::Key,
    base_url: String,
}

impl UrlSigner {
    pub fn new(secret: &[u8], base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build a URL granting `op` on `key` until `expires_at`.
    pub fn sign(&self, op: &PresignOp, key: &str, expires_at: DateTime<Utc>) -> String {
        let expires = expires_at.timestamp();
        let tag = hmac::sign(&self.key, string_to_sign(op, key, expires).as_bytes());
        format!(
            "{}/blob/{}?op={}&expires={}&signature={}",
            self.base_url,
            urlencoding::encode(key),
            op_name(op),
            expires,
            hex::encode(tag.as_ref())
        )
    }

    /// Check that `params` authorise `op` on `key` at time `now`.
    pub fn verify(
        &self,
        op: &PresignOp,
        key: &str,
        params: &SignedParams,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        if params.op != op_name(op) {
            return Err(SignatureError::BadSignature);
        }
        let signature =
            hex::decode(&params.signature).map_err(|_| SignatureError::BadSignature)?;
        hmac::verify(
            &self.key,
            string_to_sign(op, key, params.expires).as_bytes(),
            &signature,
        )
        .map_err(|_| SignatureError::BadSignature)?;

        if now.timestamp() > params.expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }
}

fn op_name(op: &PresignOp) -> &'static str {
    match op {
        PresignOp::Get => "get",
        PresignOp::Put { .. } => "put",
    }
}

fn string_to_sign(op: &PresignOp, key: &str, expires: i64) -> String {
    let content_type = match op {
        PresignOp::Get => "",
        PresignOp::Put { content_type } => content_type.as_str(),
    };
    format!("{}\n{}\n{}\n{}", op_name(op), key, expires, content_type)
}
