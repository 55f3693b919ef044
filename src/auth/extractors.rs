use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::Claims;
use crate::error::AppError;

/// Who is making the request.
///
/// `AuthMiddleware` inserts verified `Claims` into the request extensions when a valid
/// bearer token is present. Requests without a token reach the handlers as `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(i32),
}

impl Actor {
    pub fn user_id(&self) -> Option<i32> {
        match self {
            Actor::Anonymous => None,
            Actor::User(id) => Some(*id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    fn from_request_extensions(req: &HttpRequest) -> Actor {
        req.extensions()
            .get::<Claims>()
            .map(|claims| Actor::User(claims.sub))
            .unwrap_or(Actor::Anonymous)
    }
}

impl FromRequest for Actor {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Actor::from_request_extensions(req)))
    }
}

/// The id of an authenticated user. Rejects anonymous requests with 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub i32);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match Actor::from_request_extensions(req) {
            Actor::User(user_id) => ready(Ok(AuthenticatedUser(user_id))),
            Actor::Anonymous => {
                let err = AppError::Unauthorized(
                    "Authentication credentials were not provided.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenType;
    use actix_web::dev::Payload;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use uuid::Uuid;

    fn claims(sub: i32) -> Claims {
        Claims {
            sub,
            exp: 0,
            iat: 0,
            jti: Uuid::new_v4(),
            token_type: TokenType::Access,
        }
    }

    #[actix_rt::test]
    async fn test_actor_from_claims() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(claims(123));

        let mut payload = Payload::None;
        let actor = Actor::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(actor, Actor::User(123));
        assert!(actor.is_authenticated());
    }

    #[actix_rt::test]
    async fn test_actor_defaults_to_anonymous() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let actor = Actor::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(actor, Actor::Anonymous);
        assert_eq!(actor.user_id(), None);
    }

    #[actix_rt::test]
    async fn test_authenticated_user_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(claims(7));

        let mut payload = Payload::None;
        let user = AuthenticatedUser::from_request(&req, &mut payload).await;
        assert_eq!(user.unwrap().0, 7);
    }

    #[actix_rt::test]
    async fn test_authenticated_user_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let result = AuthenticatedUser::from_request(&req, &mut payload).await;
        assert!(result.is_err());

        let response = result.unwrap_err().error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
