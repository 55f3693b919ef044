use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::{TokenIssuer, TokenType};
use crate::error::AppError;

/// Resolves the bearer token, if any, into request `Claims`.
///
/// Authentication is optional at this layer: requests without an `Authorization`
/// header pass through as anonymous and the handlers' policies decide. A header that
/// is present but malformed, expired, or carries a refresh token is rejected with 401.
pub struct AuthMiddleware {
    issuer: TokenIssuer,
}

impl AuthMiddleware {
    pub fn new(issuer: TokenIssuer) -> Self {
        AuthMiddleware { issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            issuer: self.issuer.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    issuer: TokenIssuer,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header = match req.headers().get(AUTHORIZATION) {
            None => return Box::pin(self.service.call(req)),
            Some(value) => value.to_str().ok().map(str::to_owned),
        };

        let token = header
            .as_deref()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            let app_err = AppError::Unauthorized("Malformed Authorization header".into());
            return Box::pin(async move { Err(app_err.into()) });
        };

        match self.issuer.verify(token, TokenType::Access) {
            Ok(claims) => {
                log::debug!("authenticated user {} for {}", claims.sub, req.path());
                req.extensions_mut().insert(claims);
                Box::pin(self.service.call(req))
            }
            Err(app_err) => {
                log::info!("rejected bearer token for {}: {}", req.path(), app_err);
                Box::pin(async move { Err(app_err.into()) })
            }
        }
    }
}
