use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{
        auth::{AuthUser, removal_cookie, request_token, session_cookie},
        jwt::{TokenType, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_against_dummy, verify_password},
    },
    config::Config,
    db::Repository,
    error::AppError,
    model::{
        role::Role,
        user::{NewUser, UniqueField, User, UserView},
    },
    utils::identity_index::IdentityIndex,
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane")]
    pub user_name: String,
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    #[schema(example = 8801712345678u64)]
    pub phone_number: u64,
    #[schema(example = "correct horse battery staple")]
    pub password: String,
    /// defaults to employee
    #[serde(default)]
    pub role: Option<Role>,
    /// required when `role` is admin
    #[serde(default)]
    pub admin_key: Option<String>,
}

impl SignUpRequest {
    /// Trims and lower-cases the unique handles, rejects blank fields.
    fn normalized(&self) -> Result<(String, String, String), AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("name is required"));
        }

        let user_name = UniqueField::UserName.normalize(&self.user_name);
        if user_name.is_empty() {
            return Err(AppError::bad_request("userName is required"));
        }

        let email = UniqueField::Email.normalize(&self.email);
        if email.is_empty() {
            return Err(AppError::bad_request("email is required"));
        }
        if !email.contains('@') {
            return Err(AppError::bad_request("email is invalid"));
        }

        if self.phone_number == 0 {
            return Err(AppError::bad_request("phoneNumber is required"));
        }

        if self.password.trim().is_empty() {
            return Err(AppError::bad_request("password is required"));
        }

        Ok((name.to_string(), user_name, email))
    }

    fn requested_role(&self, config: &Config) -> Result<Role, AppError> {
        match self.role.unwrap_or_default() {
            Role::Employee => Ok(Role::Employee),
            Role::Admin => match (&config.admin_signup_key, &self.admin_key) {
                (Some(expected), Some(given)) if expected == given => Ok(Role::Admin),
                _ => Err(AppError::forbidden("Admin sign-up not permitted")),
            },
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// user name or email
    #[schema(example = "jane")]
    pub user_name: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub auth_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub auth_token: String,
    pub refresh_token: String,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    /// true when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<bool>,
}

/// Issues an access/refresh pair and records the refresh jti.
async fn issue_tokens(user: &User, repo: &dyn Repository, config: &Config) -> Result<TokenPair, AppError> {
    let auth_token = generate_access_token(
        user.id,
        &user.user_name,
        user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::internal(e, "Failed to sign access token"))?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user.id,
        &user.user_name,
        user.role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| AppError::internal(e, "Failed to sign refresh token"))?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    let expires_at = Utc::now() + Duration::seconds(config.refresh_token_ttl as i64);
    repo.store_refresh_token(user.id, &refresh_claims.jti, expires_at)
        .await?;

    Ok(TokenPair {
        auth_token,
        refresh_token,
    })
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/user/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully",
            "user": { "id": 1, "name": "Jane Doe", "userName": "jane" }
        })),
        (status = 400, description = "Missing or blank field"),
        (status = 403, description = "Admin sign-up not permitted"),
        (status = 409, description = "userName, email or phoneNumber already exists", body = Object, example = json!({
            "error": "email already exists",
            "field": "email"
        }))
    ),
    tag = "User"
)]
#[instrument(
    name = "user_signup",
    skip(payload, repo, index, config),
    fields(user_name = %payload.user_name)
)]
pub async fn signup(
    payload: web::Json<SignUpRequest>,
    repo: web::Data<dyn Repository>,
    index: web::Data<IdentityIndex>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let role = payload.requested_role(&config)?;
    let (name, user_name, email) = payload.normalized()?;
    let phone = payload.phone_number.to_string();

    // Fast path only; the store's unique constraints decide.
    for (field, value) in [
        (UniqueField::UserName, user_name.as_str()),
        (UniqueField::Email, email.as_str()),
        (UniqueField::PhoneNumber, phone.as_str()),
    ] {
        if !index.is_available(repo.get_ref(), field, value).await? {
            info!(%field, "Sign-up rejected: value already taken");
            return Err(AppError::duplicate(field));
        }
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| AppError::internal(e, "Failed to hash password"))?;

    let user = repo
        .insert_user(NewUser {
            name,
            user_name,
            email,
            phone_number: payload.phone_number,
            password_hash,
            role,
        })
        .await?;

    index.insert(&user.identity()).await;
    info!(user_id = user.id, role = %user.role, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": UserView::from(&user),
    })))
}

/// Check whether user name, email or phone number are still free
#[utoipa::path(
    get,
    path = "/user/availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Availability per requested field", body = AvailabilityResponse),
        (status = 400, description = "No field given, or phoneNumber is not a positive integer")
    ),
    tag = "User"
)]
pub async fn availability(
    query: web::Query<AvailabilityQuery>,
    repo: web::Data<dyn Repository>,
    index: web::Data<IdentityIndex>,
) -> Result<HttpResponse, AppError> {
    if query.user_name.is_none() && query.email.is_none() && query.phone_number.is_none() {
        return Err(AppError::bad_request(
            "one of userName, email or phoneNumber is required",
        ));
    }

    let mut response = AvailabilityResponse {
        user_name: None,
        email: None,
        phone_number: None,
    };

    if let Some(value) = &query.user_name {
        response.user_name = Some(
            index
                .is_available(repo.get_ref(), UniqueField::UserName, value)
                .await?,
        );
    }
    if let Some(value) = &query.email {
        response.email = Some(
            index
                .is_available(repo.get_ref(), UniqueField::Email, value)
                .await?,
        );
    }
    if let Some(value) = &query.phone_number {
        let phone = value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| AppError::bad_request("phoneNumber must be a positive integer"))?;
        response.phone_number = Some(
            index
                .is_available(repo.get_ref(), UniqueField::PhoneNumber, &phone.to_string())
                .await?,
        );
    }

    Ok(HttpResponse::Ok().json(response))
}

/// Log in with user name (or email) and password
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; also sets the auth-token cookie", body = LoginResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "User"
)]
#[instrument(
    name = "user_login",
    skip(payload, repo, config),
    fields(user_name = %payload.user_name)
)]
pub async fn login(
    payload: web::Json<LoginRequest>,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let login = UniqueField::UserName.normalize(&payload.user_name);
    if login.is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty userName or password");
        return Err(AppError::bad_request("userName and password are required"));
    }

    let user = match repo.find_user_by_login(&login).await? {
        Some(user) => user,
        None => {
            verify_against_dummy(&payload.password);
            info!("Invalid credentials: user not found");
            return Err(AppError::unauthorized("Invalid credentials"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash) {
        info!(user_id = user.id, "Invalid credentials: password mismatch");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let tokens = issue_tokens(&user, repo.get_ref(), &config).await?;
    info!(user_id = user.id, "Login successful");

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&tokens.auth_token, &config))
        .json(LoginResponse {
            auth_token: tokens.auth_token,
            refresh_token: tokens.refresh_token,
            user: UserView::from(&user),
        }))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/user/refresh",
    responses(
        (status = 200, description = "New token pair; the presented refresh token is revoked", body = TokenPair),
        (status = 401, description = "Missing, invalid, revoked or non-refresh token")
    ),
    security(("auth_token" = [])),
    tag = "User"
)]
pub async fn refresh_token(
    req: HttpRequest,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = request_token(&req).ok_or_else(|| AppError::unauthorized("Missing token"))?;

    let claims = verify_token(&token, &config.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::unauthorized("Refresh token required"));
    }

    // revoke-or-fail makes each refresh token single use
    if !repo.revoke_refresh_token(&claims.jti).await? {
        info!(user_id = claims.user_id, jti = %claims.jti, "Refresh token reuse or unknown jti");
        return Err(AppError::unauthorized("Refresh token revoked"));
    }

    // role may have changed since the token was issued
    let user = repo
        .find_user_by_id(claims.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;

    let tokens = issue_tokens(&user, repo.get_ref(), &config).await?;

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&tokens.auth_token, &config))
        .json(tokens))
}

/// Log out: revoke the refresh token and clear the session cookie
#[utoipa::path(
    post,
    path = "/user/logout",
    responses((status = 204, description = "Logged out, even if the token was unknown")),
    security(("auth_token" = [])),
    tag = "User"
)]
pub async fn logout(
    req: HttpRequest,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
) -> HttpResponse {
    let refresh_claims = request_token(&req)
        .and_then(|token| verify_token(&token, &config.jwt_secret).ok())
        .filter(|claims| claims.token_type == TokenType::Refresh);

    if let Some(claims) = refresh_claims {
        // idempotent
        if let Err(e) = repo.revoke_refresh_token(&claims.jti).await {
            tracing::error!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    HttpResponse::NoContent().cookie(removal_cookie()).finish()
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/user/me",
    responses(
        (status = 200, description = "Profile of the token holder", body = Object, example = json!({
            "user": { "id": 1, "name": "Jane Doe", "userName": "jane", "email": "jane@company.com" }
        })),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User no longer exists")
    ),
    security(("auth_token" = [])),
    tag = "User"
)]
pub async fn me(auth: AuthUser, repo: web::Data<dyn Repository>) -> Result<HttpResponse, AppError> {
    let user = repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({ "user": UserView::from(&user) })))
}
