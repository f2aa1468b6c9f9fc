use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// The typed grant a token carries. One variant per token kind; the gate
/// matches exhaustively, so a new kind is a compile-time decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenPayload {
    /// Authenticated account session.
    User { username: String },
    /// Share grant over an explicit file list (vpath-prefixed, no leading slash).
    Share { allowed_files: Vec<String> },
    /// Federation invite grant.
    Invite,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    payload: TokenPayload,
    /// Unix seconds. Absent means the grant does not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Signs and verifies bearer tokens: base64url(claims) "." base64url(mac).
/// Pure function of the process secret and its input; no server-side state.
#[derive(Clone)]
pub struct TokenCodec {
    key: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self { key: secret.as_bytes().to_vec() }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.key).expect("hmac key")
    }

    pub fn issue(&self, payload: &TokenPayload) -> String {
        self.encode(Claims { payload: payload.clone(), exp: None })
    }

    pub fn issue_expiring(&self, payload: &TokenPayload, expires_at: DateTime<Utc>) -> String {
        self.encode(Claims { payload: payload.clone(), exp: Some(expires_at.timestamp()) })
    }

    fn encode(&self, claims: Claims) -> String {
        let body = serde_json::to_vec(&claims).expect("token claims serialize");
        let mut mac = self.mac();
        mac.update(&body);
        let sig = mac.finalize().into_bytes();
        format!("{}.{}", URL_SAFE_NO_PAD.encode(&body), URL_SAFE_NO_PAD.encode(sig))
    }

    /// Check signature and structure, then expiry. Decides authenticity only;
    /// what the payload is allowed to do is the gate's problem.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let (body_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let body = URL_SAFE_NO_PAD.decode(body_b64).map_err(|_| TokenError::Malformed)?;
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac();
        mac.update(&body);
        mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;
        let claims: Claims = serde_json::from_slice(&body).map_err(|_| TokenError::Malformed)?;
        if let Some(exp) = claims.exp {
            if Utc::now().timestamp() >= exp {
                return Err(TokenError::Expired);
            }
        }
        Ok(claims.payload)
    }
}
