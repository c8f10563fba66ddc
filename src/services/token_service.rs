//! Device token issuing and verification.
//!
//! Tokens are compact JWTs signed with HMAC-SHA256 (`HS256`):
//!
//! ```text
//! base64url(header) . base64url(claims) . base64url(signature)
//! ```
//!
//! The signing secret is loaded once at startup. Changing it invalidates all
//! outstanding tokens, which is acceptable because they live for a day.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Why a presented token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token is missing")]
    Missing,

    #[error("Token has expired")]
    Expired,

    #[error("Token is invalid")]
    Invalid,
}

impl TokenError {
    /// Machine-readable code used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Missing => "token_missing",
            TokenError::Expired => "token_expired",
            TokenError::Invalid => "token_invalid",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Claims carried by a device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClaims {
    /// Device identifier the token was issued to
    pub sub: String,

    /// License the device was bound to at issuance
    pub license_id: Uuid,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Signs and verifies device tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenIssuer {
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer from a secret and token lifetime.
    ///
    /// HMAC accepts keys of any length, so this only fails on an empty secret.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Invalid);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Invalid)?;

        Ok(Self { mac, ttl })
    }

    /// Generate a random 32 byte secret (64 hex characters).
    pub fn generate_secret() -> String {
        let bytes: [u8; 32] = rand::random();
        hex::encode(bytes)
    }

    /// Issue a token for `device_id` valid until `now + ttl`.
    pub fn issue(&self, device_id: &str, license_id: Uuid) -> String {
        self.issue_at(device_id, license_id, Utc::now())
    }

    pub fn issue_at(&self, device_id: &str, license_id: Uuid, now: DateTime<Utc>) -> String {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let claims = DeviceClaims {
            sub: device_id.to_string(),
            license_id,
            iat: now.timestamp(),
            exp: ceil_timestamp(now + self.ttl),
        };

        // Serializing plain structs of strings and integers cannot fail
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap_or_default());
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
        let signing_input = format!("{}.{}", header, claims);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&signing_input));

        format!("{}.{}", signing_input, signature)
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<DeviceClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<DeviceClaims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Invalid);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Invalid)?;

        // Constant-time comparison
        let mut mac = self.mac.clone();
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(claims.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Invalid)?;

        let header: Header = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Invalid);
        }

        let claims: DeviceClaims = decode_segment(claims)?;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, signing_input: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Unix seconds rounded up, so a token never expires before `now + ttl`.
fn ceil_timestamp(instant: DateTime<Utc>) -> i64 {
    instant.timestamp() + i64::from(instant.timestamp_subsec_nanos() > 0)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Invalid)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret", Duration::hours(24)).unwrap()
    }

    #[test]
    fn issued_token_verifies_and_carries_claims() {
        let issuer = issuer();
        let license_id = Uuid::new_v4();
        let now = Utc::now();

        let token = issuer.issue_at("dev1", license_id, now);
        let claims = issuer.verify_at(&token, now).unwrap();

        assert_eq!(claims.sub, "dev1");
        assert_eq!(claims.license_id, license_id);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, ceil_timestamp(now + Duration::hours(24)));
    }

    #[test]
    fn fractional_issue_time_does_not_shorten_the_window() {
        let issuer = issuer();
        let issued = DateTime::from_timestamp(1_700_000_000, 900_000_000).unwrap();
        let token = issuer.issue_at("dev1", Uuid::new_v4(), issued);
        let window = Duration::hours(24);

        assert!(issuer
            .verify_at(&token, issued + window - Duration::milliseconds(500))
            .is_ok());
        assert!(issuer
            .verify_at(&token, issued + window - Duration::milliseconds(1))
            .is_ok());
        assert_eq!(
            issuer.verify_at(&token, issued + window + Duration::milliseconds(500)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn whole_second_issue_time_expires_exactly_at_the_window() {
        let issuer = issuer();
        let issued = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = issuer.issue_at("dev1", Uuid::new_v4(), issued);
        let window = Duration::hours(24);

        assert!(issuer
            .verify_at(&token, issued + window - Duration::milliseconds(1))
            .is_ok());
        assert_eq!(
            issuer.verify_at(&token, issued + window),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn token_is_valid_until_the_end_of_its_window() {
        let issuer = issuer();
        let issued = Utc::now();
        let token = issuer.issue_at("dev1", Uuid::new_v4(), issued);
        let window = Duration::hours(24);
        let epsilon = Duration::seconds(1);

        assert!(issuer.verify_at(&token, issued + window - epsilon).is_ok());
        assert_eq!(
            issuer.verify_at(&token, issued + window + epsilon),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let token = issuer.issue_at("dev1", Uuid::new_v4(), now);
        let other = issuer.issue_at("dev2", Uuid::new_v4(), now);

        // Splice dev2's claims under dev1's signature
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(issuer.verify_at(&forged, now), Err(TokenError::Invalid));
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let now = Utc::now();
        let foreign = TokenIssuer::new(b"rotated-secret", Duration::hours(24))
            .unwrap()
            .issue_at("dev1", Uuid::new_v4(), now);

        assert_eq!(issuer().verify_at(&foreign, now), Err(TokenError::Invalid));
    }

    #[test]
    fn malformed_tokens_are_invalid_and_empty_is_missing() {
        let issuer = issuer();
        let now = Utc::now();

        assert_eq!(issuer.verify_at("", now), Err(TokenError::Missing));
        for token in ["abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert_eq!(issuer.verify_at(token, now), Err(TokenError::Invalid), "{}", token);
        }
    }

    #[test]
    fn signed_token_with_unexpected_algorithm_is_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&DeviceClaims {
                sub: "dev1".into(),
                license_id: Uuid::new_v4(),
                iat: now.timestamp(),
                exp: now.timestamp() + 60,
            })
            .unwrap(),
        );
        let signing_input = format!("{}.{}", header, claims);
        let signature = URL_SAFE_NO_PAD.encode(issuer.sign(&signing_input));

        assert_eq!(
            issuer.verify_at(&format!("{}.{}", signing_input, signature), now),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(TokenIssuer::new(b"", Duration::hours(1)).is_err());
        assert_eq!(TokenIssuer::generate_secret().len(), 64);
    }
}
