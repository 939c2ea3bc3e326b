use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    cookie::{Cookie, SameSite, time::Duration},
    dev::Payload,
    web::Data,
};
use futures::future::{Ready, ready};

use crate::{
    auth::jwt::{TokenType, verify_token},
    config::Config,
    error::AppError,
    model::role::Role,
};

/// Header and cookie name carrying the session token.
pub const AUTH_TOKEN: &str = "auth-token";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub user_name: String,
    pub role: Role,
}

/// `auth-token` header, then `Authorization: Bearer`, then the `auth-token` cookie.
pub fn request_token(req: &HttpRequest) -> Option<String> {
    let headers = req.headers();

    if let Some(token) = headers
        .get(AUTH_TOKEN)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    if let Some(token) = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    req.cookie(AUTH_TOKEN)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Validates an access token and resolves its role.
pub fn authenticate(token: &str, config: &Config) -> Result<AuthUser, AppError> {
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::unauthorized("Access token required"));
    }

    let role = Role::from_id(claims.role).ok_or_else(|| AppError::unauthorized("Invalid role"))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        user_name: claims.sub,
        role,
    })
}

pub fn session_cookie(token: &str, config: &Config) -> Cookie<'static> {
    Cookie::build(AUTH_TOKEN, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(Duration::seconds(config.access_token_ttl as i64))
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(AUTH_TOKEN, "").path("/").finish();
    cookie.make_removal();
    cookie
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(token) = request_token(req) else {
            return ready(Err(AppError::unauthorized("Missing token").into()));
        };

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(AppError::internal("Config missing", "AuthUser extraction").into()));
        };

        ready(authenticate(&token, config).map_err(Into::into))
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    /// Admins see everything, everyone else only their own records.
    pub fn can_access(&self, owner_id: u64) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::test_support::test_config;
    use actix_web::test::TestRequest;

    #[test]
    fn header_token_wins_over_bearer_and_cookie() {
        let req = TestRequest::default()
            .insert_header((AUTH_TOKEN, "from-header"))
            .insert_header(("Authorization", "Bearer from-bearer"))
            .cookie(Cookie::new(AUTH_TOKEN, "from-cookie"))
            .to_http_request();
        assert_eq!(request_token(&req).as_deref(), Some("from-header"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer from-bearer"))
            .cookie(Cookie::new(AUTH_TOKEN, "from-cookie"))
            .to_http_request();
        assert_eq!(request_token(&req).as_deref(), Some("from-bearer"));

        let req = TestRequest::default()
            .cookie(Cookie::new(AUTH_TOKEN, "from-cookie"))
            .to_http_request();
        assert_eq!(request_token(&req).as_deref(), Some("from-cookie"));

        assert_eq!(request_token(&TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn refresh_tokens_do_not_authenticate_requests() {
        let config = test_config();
        let (refresh, _) =
            generate_refresh_token(1, "jane", Role::Employee, &config.jwt_secret, 60).expect("token");
        assert!(authenticate(&refresh, &config).is_err());

        let access =
            generate_access_token(1, "jane", Role::Employee, &config.jwt_secret, 60).expect("token");
        let user = authenticate(&access, &config).expect("authenticated");
        assert_eq!(user.user_name, "jane");
        assert!(!user.is_admin());
        assert!(user.can_access(1));
        assert!(!user.can_access(2));
    }
}
