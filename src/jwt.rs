//! Access token signing and validation.
//!
//! Access tokens are short-lived HS256 JWTs carrying only the user id and an
//! absolute expiry. They are never stored server-side.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token type marker, so a token minted for another purpose with the same key
/// is never accepted as an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: i64,
}

/// Result of generating an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: i64,
    /// Token duration in seconds
    pub duration: i64,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and access token lifetime.
    pub fn new(secret: &[u8], access_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: access_ttl_secs,
        }
    }

    /// Sign an access token for `user_id`, valid from `now` for the configured lifetime.
    pub fn generate_access_token(
        &self,
        user_id: &str,
        now: i64,
    ) -> Result<AccessTokenResult, JwtError> {
        let exp = now + self.access_ttl;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult {
            token,
            expires_at: exp,
            duration: self.access_ttl,
        })
    }

    /// Verify the signature and decode an access token, then check its claims
    /// against `now`. A token is rejected once `exp <= now`.
    pub fn validate_access_token(&self, token: &str, now: i64) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
                .map_err(JwtError::Decoding)?;

        let claims = token_data.claims;

        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        if claims.sub.is_empty() {
            return Err(JwtError::MissingSubject);
        }

        if claims.exp <= now {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature or malformed token
    Decoding(jsonwebtoken::errors::Error),
    /// Token has no subject
    MissingSubject,
    /// Expiry is not in the future
    Expired,
    /// Token was not minted as an access token
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::MissingSubject => write!(f, "Token has no subject"),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn config() -> JwtConfig {
        JwtConfig::new(b"test-secret-key-for-testing", 300)
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = config();

        let result = config.generate_access_token("uuid-123", NOW).unwrap();
        assert_eq!(result.duration, 300);
        assert_eq!(result.expires_at, NOW + 300);

        let claims = config.validate_access_token(&result.token, NOW).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + 300);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_token_valid_until_last_second() {
        let config = config();
        let result = config.generate_access_token("uuid-123", NOW).unwrap();

        assert!(config.validate_access_token(&result.token, NOW + 299).is_ok());
        assert!(matches!(
            config.validate_access_token(&result.token, NOW + 300),
            Err(JwtError::Expired)
        ));
        assert!(matches!(
            config.validate_access_token(&result.token, NOW + 301),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let result = config().validate_access_token("invalid-token", NOW);
        assert!(matches!(result, Err(JwtError::Decoding(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1", 300);
        let config2 = JwtConfig::new(b"secret-2", 300);

        let result = config1.generate_access_token("uuid-123", NOW).unwrap();

        assert!(config2.validate_access_token(&result.token, NOW).is_err());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let config = config();
        let token = config.generate_access_token("uuid-123", NOW).unwrap().token;

        let sig_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        bytes[sig_start] = if bytes[sig_start] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(config.validate_access_token(&tampered, NOW).is_err());
    }

    #[test]
    fn test_empty_subject_rejected() {
        let config = config();
        let result = config.generate_access_token("", NOW).unwrap();

        assert!(matches!(
            config.validate_access_token(&result.token, NOW),
            Err(JwtError::MissingSubject)
        ));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let secret = b"test-secret-key-for-testing";
        let claims = AccessClaims {
            sub: "uuid-123".to_string(),
            token_type: TokenType::Access,
            iat: NOW,
            exp: NOW + 300,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        assert!(config().validate_access_token(&token, NOW).is_err());
    }
}
