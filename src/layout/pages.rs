use actix_web::{
    HttpRequest, HttpResponse,
    http::header::{self, ContentType},
    web,
};
use serde::Deserialize;
use tracing::{debug, error};

use super::{Area, SIGN_IN_PATH, Shell, Templates};
use crate::{
    auth::auth::{authenticate, removal_cookie, request_token},
    config::Config,
    db::Repository,
    error::AppError,
};

#[derive(Debug, Deserialize)]
pub struct ShellQuery {
    /// `collapsed` narrows the sidebar to icons only
    pub sidebar: Option<String>,
}

impl ShellQuery {
    pub fn sidebar_open(&self) -> bool {
        self.sidebar.as_deref() != Some("collapsed")
    }
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Display name for the greeting. Lookup failures are logged and shown as "Loading...".
pub async fn profile_name(repo: &dyn Repository, user_id: u64) -> Option<String> {
    match repo.find_user_by_id(user_id).await {
        Ok(Some(user)) => Some(user.name),
        Ok(None) => {
            error!(user_id, "Error fetching user data: user not found");
            None
        }
        Err(e) => {
            error!(error = %e, user_id, "Error fetching user data");
            None
        }
    }
}

/// Every `/admin/*` and `/employee/*` page: the shell around the page content.
pub async fn dashboard_page(
    req: HttpRequest,
    query: web::Query<ShellQuery>,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse, AppError> {
    let Some(token) = request_token(&req) else {
        return Ok(redirect(SIGN_IN_PATH));
    };

    let auth = match authenticate(&token, &config) {
        Ok(auth) => auth,
        Err(e) => {
            debug!(error = %e, path = %req.path(), "Stale session, redirecting to sign-in");
            let mut resp = redirect(SIGN_IN_PATH);
            if let Err(e) = resp.add_cookie(&removal_cookie()) {
                error!(error = %e, "Failed to clear session cookie");
            }
            return Ok(resp);
        }
    };

    let path = req.path();
    if Area::from_path(path) == Area::Admin && !auth.is_admin() {
        return Ok(redirect(Area::Employee.home()));
    }

    let name = profile_name(repo.get_ref(), auth.user_id).await;
    let shell = Shell::new(path, name, query.sidebar_open());
    let html = templates
        .render_shell(&shell)
        .map_err(|e| AppError::internal(e, "Failed to render dashboard shell"))?;

    Ok(HttpResponse::Ok().content_type(ContentType::html()).body(html))
}

pub async fn sign_out() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, SIGN_IN_PATH))
        .cookie(removal_cookie())
        .finish()
}

pub async fn sign_in_page(templates: web::Data<Templates>) -> Result<HttpResponse, AppError> {
    let html = templates
        .render_sign_in()
        .map_err(|e| AppError::internal(e, "Failed to render sign-in page"))?;

    Ok(HttpResponse::Ok().content_type(ContentType::html()).body(html))
}
