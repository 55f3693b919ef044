pub mod credentials;
pub mod extractors;
pub mod middleware;
pub mod permissions;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

// Re-export necessary items
pub use credentials::{authenticate, hash_password, verify_password};
pub use extractors::{Actor, AuthenticatedUser};
pub use middleware::AuthMiddleware;
pub use permissions::Denied;
pub use token::{Claims, TokenIssuer, TokenType};

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required, length(min = 1))]
    pub username: Option<String>,
    #[validate(required, length(min = 1))]
    pub password: Option<String>,
}

/// Returned by a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    /// Long-lived token, only accepted by the refresh endpoint.
    pub refresh: String,
    /// Bearer token for API requests.
    pub access: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(required, length(min = 1))]
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_validation() {
        let valid = LoginRequest {
            username: Some("usuario".to_string()),
            password: Some("1234".to_string()),
        };
        assert!(valid.validate().is_ok());

        let blank_password = LoginRequest {
            username: Some("usuario".to_string()),
            password: Some("".to_string()),
        };
        assert!(blank_password.validate().is_err());

        let missing_username = LoginRequest { username: None, password: Some("1234".to_string()) };
        let errors = missing_username.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
    }

    #[test]
    fn test_token_pair_wire_names() {
        let json = serde_json::to_value(TokenPair {
            refresh: "r".into(),
            access: "a".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "refresh": "r", "access": "a" }));
    }
}
