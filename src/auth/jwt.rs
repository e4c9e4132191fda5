//! JWT session tokens
//!
//! HS256 tokens carrying the user's document id, email, and token version.
//! Bumping the stored token_version invalidates every outstanding token.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{AstraError, Result};

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User document id (hex)
    pub sub: String,
    /// User email at issue time
    pub email: String,
    /// Token version the user record held at issue time
    pub token_version: i32,
    /// Issued-at (unix seconds)
    pub iat: u64,
    /// Expiry (unix seconds)
    pub exp: u64,
}

/// Generates and validates session tokens
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: String, expiry_seconds: u64) -> Self {
        Self {
            secret,
            expiry_seconds,
        }
    }

    /// Issue a token for a user
    pub fn generate(&self, user_id: &str, email: &str, token_version: i32) -> Result<(String, u64)> {
        let now = unix_now();
        let exp = now + self.expiry_seconds;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            token_version,
            iat: now,
            exp,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AstraError::Internal(format!("Token encoding failed: {}", e)))?;

        Ok((token, exp))
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AstraError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(data.claims)
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> JwtValidator {
        JwtValidator::new("test-secret".to_string(), 3600)
    }

    #[test]
    fn test_token_round_trip() {
        let v = validator();
        let (token, exp) = v.generate("user-1", "a@example.com", 1).unwrap();
        let claims = v.validate(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.token_version, 1);
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let v = validator();
        let (token, _) = v.generate("user-1", "a@example.com", 1).unwrap();

        let other = JwtValidator::new("other-secret".to_string(), 3600);
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(extract_token_from_header("Bearer "), None);
        assert_eq!(extract_token_from_header("Basic abc"), None);
    }
}
