use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web::Data,
};

use crate::auth::auth::{authenticate, request_token};
use crate::config::Config;
use crate::error::AppError;

/// Rejects the request with 401 unless it carries a valid access token.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| AppError::internal("App config missing", "auth_middleware"))?;

    let token = match request_token(req.request()) {
        Some(t) => t,
        None => {
            let resp = AppError::unauthorized("Missing auth token").error_response();
            return Ok(req.into_response(resp));
        }
    };

    let auth_user = match authenticate(&token, &config) {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(error = %e, path = %req.path(), "Rejected request token");
            return Ok(req.into_response(e.error_response()));
        }
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
