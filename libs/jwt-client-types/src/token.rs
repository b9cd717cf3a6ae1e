use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::TokenError;

/// Claims of a per-request access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Hex SHA-256 of the JSON-serialized request payload
    pub checksum: String,

    /// Token issued at (Unix timestamp)
    pub iat: i64,
}

/// Hex-encoded SHA-256 of the payload's JSON serialization.
pub fn payload_checksum<T: Serialize + ?Sized>(payload: &T) -> Result<String, TokenError> {
    let serialized = serde_json::to_string(payload)?;
    Ok(hex::encode(Sha256::digest(serialized.as_bytes())))
}

/// Signs an HS256 access token binding `payload` through its checksum.
///
/// # Arguments
/// * `payload` - The exact data sent with the request (body or query)
/// * `service_token` - Shared HMAC key of the calling service
pub fn sign_access_token<T: Serialize + ?Sized>(
    payload: &T,
    service_token: &str,
) -> Result<String, TokenError> {
    let claims = AccessTokenClaims {
        checksum: payload_checksum(payload)?,
        iat: OffsetDateTime::now_utc().unix_timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(service_token.as_bytes()),
    )?;

    Ok(token)
}

/// Verifies an access token against the payload that arrived with it.
///
/// Tokens carry no `exp`; freshness is enforced with `max_age_seconds`
/// against `iat` when given.
pub fn verify_access_token<T: Serialize + ?Sized>(
    token: &str,
    service_token: &str,
    payload: &T,
    max_age_seconds: Option<u64>,
) -> Result<AccessTokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;

    let token_data = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(service_token.as_bytes()),
        &validation,
    )?;
    let claims = token_data.claims;

    if claims.checksum != payload_checksum(payload)? {
        return Err(TokenError::ChecksumMismatch);
    }

    if let Some(max_age) = max_age_seconds {
        let age = OffsetDateTime::now_utc().unix_timestamp() - claims.iat;
        if age > max_age as i64 {
            return Err(TokenError::Expired { age, max_age });
        }
    }

    Ok(claims)
}
