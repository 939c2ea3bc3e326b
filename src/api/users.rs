use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    db::{Page, Repository},
    error::AppError,
    model::user::UserView,
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Search by name, user name or email
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub data: Vec<UserView>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 42)]
    pub total: i64,
}

/// Manage Employees: list accounts
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated user list", body = UserListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("auth_token" = [])),
    tag = "User"
)]
pub async fn list_users(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let (page, per_page, window) = Page::from_query(query.page, query.per_page);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    debug!(?search, page, per_page, "Listing users");
    let (users, total) = repo.list_users(search, window).await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        data: users.iter().map(UserView::from).collect(),
        page,
        per_page,
        total,
    }))
}
