use crate::{
    api::{layout, leave_request, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    db::Repository,
    error::{json_error_handler, path_error_handler, query_error_handler},
    layout::{Templates, pages},
    utils::identity_index::IdentityIndex,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{
    HttpResponse, Responder,
    middleware::{Condition, from_fn},
    web::{self, Data},
};
use anyhow::{Context, anyhow};
use serde_json::json;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP quotas, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimiters {
    pub enabled: bool,
    login: Limiter,
    signup: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            enabled: config.rate_limit_enabled,
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            signup: Arc::new(build_limiter(config.rate_signup_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

fn build_limiter(
    requests_per_min: u32,
) -> anyhow::Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {} requests/min", requests_per_min))?;

    Ok(Governor::new(&cfg))
}

/// Everything a worker's `App` needs.
#[derive(Clone)]
pub struct AppState {
    pub config: Data<Config>,
    pub repo: Data<dyn Repository>,
    pub index: Data<IdentityIndex>,
    pub templates: Data<Templates>,
    pub limiters: RateLimiters,
}

impl AppState {
    pub fn new(config: Config, repo: Arc<dyn Repository>) -> anyhow::Result<Self> {
        let limiters = RateLimiters::from_config(&config)?;
        let templates = Templates::new().context("Failed to load page templates")?;
        Ok(Self {
            config: Data::new(config),
            repo: Data::from(repo),
            index: Data::new(IdentityIndex::new()),
            templates: Data::new(templates),
            limiters,
        })
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let limits = &state.limiters;
    let limited = |limiter: &Limiter| Condition::new(limits.enabled, limiter.clone());

    cfg.app_data(state.config.clone())
        .app_data(state.repo.clone())
        .app_data(state.index.clone())
        .app_data(state.templates.clone())
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler));

    cfg.route("/health", web::get().to(health));

    // Server-rendered dashboard shell
    cfg.service(web::resource("/signInUp").route(web::get().to(pages::sign_in_page)))
        .service(web::resource("/signout").route(web::get().to(pages::sign_out)))
        .service(
            web::resource(["/admin", "/admin/{tail:.*}"])
                .route(web::get().to(pages::dashboard_page)),
        )
        .service(
            web::resource(["/employee", "/employee/{tail:.*}"])
                .route(web::get().to(pages::dashboard_page)),
        );

    // Accounts and sessions
    cfg.service(
        web::scope("/user")
            .service(
                web::resource("/signup")
                    .wrap(limited(&limits.signup))
                    .route(web::post().to(handlers::signup)),
            )
            .service(
                web::resource("/availability")
                    .wrap(limited(&limits.signup))
                    .route(web::get().to(handlers::availability)),
            )
            .service(
                web::resource("/login")
                    .wrap(limited(&limits.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limited(&limits.refresh))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limited(&limits.login))
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/me")
                    .wrap(from_fn(auth_middleware))
                    .wrap(limited(&limits.protected))
                    .route(web::get().to(handlers::me)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&state.config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limited(&limits.protected)) // rate limiting
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    // /leave/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    // /leave/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    // /leave/{id}/cancel
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    ),
            )
            .service(web::resource("/dashboard").route(web::get().to(leave_request::leave_summary)))
            .service(web::resource("/users").route(web::get().to(users::list_users)))
            .service(web::resource("/layout").route(web::get().to(layout::layout_model))),
    );
}

// LOGIN
//  ├─ authToken (15 min, also set as auth-token cookie)
//  └─ refreshToken (7 days)

// API REQUEST
//  └─ auth-token: <authToken>   (or Authorization: Bearer <authToken>)

// ACCESS EXPIRED
//  └─ POST /user/refresh with refreshToken
//       └─ returns a new pair, old refreshToken revoked
