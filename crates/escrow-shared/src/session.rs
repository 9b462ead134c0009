//! Stateless bearer tokens for the dashboard API.
//!
//! A token is `base64url(claims_json) "." base64url(signature)` where the
//! signature is Ed25519 over `SESSION_TOKEN_PREFIX || claims_json`. Any server
//! process configured with the same secret derives the same key, so no
//! session table is needed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::constants::{KDF_CONTEXT_SESSION_KEY, SESSION_TOKEN_PREFIX};
use crate::error::SessionError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    pub valid_until: DateTime<Utc>,
}

/// Issues and checks session tokens with a key derived from a shared secret.
#[derive(Clone)]
pub struct SessionSigner {
    signing_key: SigningKey,
}

impl SessionSigner {
    pub fn from_secret(secret: &str) -> Self {
        let seed = blake3::derive_key(KDF_CONTEXT_SESSION_KEY, secret.as_bytes());
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn issue(&self, user_id: &str, email: &str, valid_until: DateTime<Utc>) -> String {
        let claims = SessionClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            valid_until,
        };
        create_session_token(&claims, &self.signing_key)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        verify_session_token_with_key(token, &self.verifying_key_bytes())
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("verifying_key", &hex::encode(self.verifying_key_bytes()))
            .finish()
    }
}

fn signed_payload(claims_json: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(SESSION_TOKEN_PREFIX.len() + claims_json.len());
    payload.extend_from_slice(SESSION_TOKEN_PREFIX);
    payload.extend_from_slice(claims_json);
    payload
}

pub fn create_session_token(claims: &SessionClaims, signing_key: &SigningKey) -> String {
    // Serializing a struct of strings and a timestamp cannot fail.
    let claims_json = serde_json::to_vec(claims).unwrap_or_default();
    let signature = signing_key.sign(&signed_payload(&claims_json));

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&claims_json),
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    )
}

pub fn verify_session_token_with_key(
    token: &str,
    verifying_key: &[u8; 32],
) -> Result<SessionClaims, SessionError> {
    let (claims_part, signature_part) = token.split_once('.').ok_or(SessionError::Malformed)?;

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_part)
        .map_err(|_| SessionError::Malformed)?;
    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature_part)
        .map_err(|_| SessionError::Malformed)?;

    let verifying_key =
        VerifyingKey::from_bytes(verifying_key).map_err(|_| SessionError::InvalidKey)?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| SessionError::Malformed)?;

    verifying_key
        .verify(&signed_payload(&claims_json), &signature)
        .map_err(|_| SessionError::BadSignature)?;

    let claims: SessionClaims =
        serde_json::from_slice(&claims_json).map_err(|_| SessionError::Malformed)?;

    if Utc::now() > claims.valid_until {
        return Err(SessionError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_token_valid() {
        let signer = SessionSigner::from_secret("test-secret");
        let token = signer.issue("usr_1000", "scott@example.com", Utc::now() + Duration::hours(1));

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.user_id, "usr_1000");
        assert_eq!(claims.email, "scott@example.com");
    }

    #[test]
    fn test_session_token_expired() {
        let signer = SessionSigner::from_secret("test-secret");
        let token = signer.issue("usr_1000", "scott@example.com", Utc::now() - Duration::minutes(1));

        assert_eq!(signer.verify(&token), Err(SessionError::Expired));
    }

    #[test]
    fn test_session_token_wrong_secret() {
        let signer = SessionSigner::from_secret("test-secret");
        let other = SessionSigner::from_secret("other-secret");
        let token = signer.issue("usr_1000", "scott@example.com", Utc::now() + Duration::hours(1));

        assert_eq!(other.verify(&token), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_session_token_tampered_claims() {
        let signer = SessionSigner::from_secret("test-secret");
        let token = signer.issue("usr_1000", "scott@example.com", Utc::now() + Duration::hours(1));
        let (_, signature) = token.split_once('.').unwrap();

        let forged = SessionClaims {
            user_id: "usr_1001".to_string(),
            email: "scott@example.com".to_string(),
            valid_until: Utc::now() + Duration::hours(1),
        };
        let forged_json = serde_json::to_vec(&forged).unwrap();
        let forged_token = format!("{}.{}", URL_SAFE_NO_PAD.encode(forged_json), signature);

        assert_eq!(signer.verify(&forged_token), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_session_token_garbage() {
        let signer = SessionSigner::from_secret("test-secret");
        assert_eq!(signer.verify("not-a-token"), Err(SessionError::Malformed));
        assert_eq!(signer.verify("abc.def"), Err(SessionError::Malformed));
    }
}
