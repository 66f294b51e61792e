use crate::types::{AppError, AuthError, Claims, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

/// Issues and verifies HS256 session tokens.
///
/// Tokens carry only `{sub, iat, exp}`. Expiry is checked here against an
/// explicit clock rather than inside `jsonwebtoken`, so verification is
/// deterministic for a given key and instant.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Creates an issuer signing with the given shared secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issues a token for `user_id` valid for `ttl` from now.
    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String> {
        self.issue_at(user_id, ttl, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(&self, user_id: Uuid, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a token and returns the user id it was issued for.
    pub fn verify(&self, token: &str) -> std::result::Result<Uuid, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Uuid, AuthError> {
        let claims = self.verify_claims_at(token, now)?;
        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)
    }

    /// Checks signature first, then expiry, and returns the full claim set.
    pub fn verify_claims_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Claims, AuthError> {
        // jsonwebtoken only splits off the last segment, so count them here.
        if token.split('.').count() != 3 {
            return Err(AuthError::MalformedToken);
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::ExpiredToken);
        }

        Ok(claims)
    }
}
