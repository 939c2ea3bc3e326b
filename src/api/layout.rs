use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::auth::AuthUser,
    db::Repository,
    layout::{Area, Shell, pages::profile_name},
};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LayoutQuery {
    /// Page path the shell is rendered for; defaults to the caller's dashboard
    pub path: Option<String>,
    /// `collapsed` narrows the sidebar
    pub sidebar: Option<String>,
}

/// Dashboard shell model (title, greeting, sidebar links) for a page path
#[utoipa::path(
    get,
    path = "/api/layout",
    params(LayoutQuery),
    responses(
        (status = 200, description = "Shell model", body = Shell),
        (status = 401, description = "Unauthorized")
    ),
    security(("auth_token" = [])),
    tag = "Layout"
)]
pub async fn layout_model(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    query: web::Query<LayoutQuery>,
) -> HttpResponse {
    let home = if auth.is_admin() {
        Area::Admin.home()
    } else {
        Area::Employee.home()
    };
    let path = query.path.as_deref().unwrap_or(home);

    let name = profile_name(repo.get_ref(), auth.user_id).await;
    let shell = Shell::new(path, name, query.sidebar.as_deref() != Some("collapsed"));

    HttpResponse::Ok().json(shell)
}
