use crate::{auth::TokenPair, config::Config, error::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which half of a token pair a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token accepted on every API request.
    Access,
    /// Long-lived token only accepted by the refresh endpoint.
    Refresh,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user id.
    pub sub: i32,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: usize,
    /// Unique token id.
    pub jti: Uuid,
    pub token_type: TokenType,
}

/// Signs and verifies tokens with a shared HS256 secret.
///
/// Built once at startup from [`Config`] and shared through `web::Data` and the
/// authentication middleware.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    /// Generates a signed token of the given type for `user_id`.
    pub fn issue(&self, user_id: i32, token_type: TokenType) -> Result<String, AppError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::InternalServerError("Token lifetime overflow".into()))?;

        let claims = Claims {
            sub: user_id,
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4(),
            token_type,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Issues the `{refresh, access}` pair returned by login.
    pub fn issue_pair(&self, user_id: i32) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            refresh: self.issue(user_id, TokenType::Refresh)?,
            access: self.issue(user_id, TokenType::Access)?,
        })
    }

    /// Verifies signature and expiry, and checks that the token is of the `expected` type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)?;
        if claims.token_type != expected {
            return Err(AppError::Unauthorized(format!(
                "Invalid token: expected a {} token",
                expected.as_str()
            )));
        }
        Ok(claims)
    }

    /// Exchanges a valid refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        self.issue(claims.sub, TokenType::Access)
    }
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}
