use crate::{
    auth::auth::AuthUser,
    db::{Page, Repository},
    error::AppError,
    model::leave_request::{LeaveFilter, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const MAX_REASON_LEN: usize = 500;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    #[schema(example = "Flu")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeaveQuery {
    /// Filter by user ID (admins only, ignored for employees)
    pub user_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    #[schema(example = 1)]
    /// leave application id
    pub id: u64,
    /// user the leave is applied for
    #[schema(example = 1000)]
    pub user_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// inclusive day count
    #[schema(example = 3)]
    pub days: i64,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    /// admin who approved or rejected
    pub decided_by: Option<u64>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<&LeaveRequest> for LeaveResponse {
    fn from(leave: &LeaveRequest) -> Self {
        Self {
            id: leave.id,
            user_id: leave.user_id,
            leave_type: leave.leave_type,
            start_date: leave.start_date,
            end_date: leave.end_date,
            days: leave.days(),
            reason: leave.reason.clone(),
            status: leave.status,
            decided_by: leave.decided_by,
            created_at: leave.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

fn clean_reason(reason: Option<&str>) -> Result<Option<String>, AppError> {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) if r.chars().count() > MAX_REASON_LEN => Err(AppError::bad_request(format!(
            "reason must be at most {} characters",
            MAX_REASON_LEN
        ))),
        Some(r) => Ok(Some(r.to_string())),
        None => Ok(None),
    }
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = Object,
         example = json!({
            "message": "Leave request submitted",
            "leave": { "id": 1, "status": "pending", "days": 3 }
         })
        ),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps a pending or approved request")
    ),
    security(("auth_token" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, AppError> {
    // 1️⃣ validate dates
    if payload.start_date > payload.end_date {
        return Err(AppError::bad_request("startDate cannot be after endDate"));
    }

    let reason = clean_reason(payload.reason.as_deref())?;

    // 2️⃣ insert unless it overlaps a request that still holds the days
    let leave = repo
        .insert_leave_if_free(NewLeaveRequest {
            user_id: auth.user_id,
            leave_type: payload.leave_type,
            start_date: payload.start_date,
            end_date: payload.end_date,
            reason,
        })
        .await?
        .ok_or_else(|| {
            AppError::conflict("Leave request overlaps an existing pending or approved request")
        })?;

    info!(leave_id = leave.id, user_id = auth.user_id, days = leave.days(), "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "leave": LeaveResponse::from(&leave),
    })))
}

/// Moves a pending request to `to` on behalf of an admin.
async fn decide(
    auth: &AuthUser,
    repo: &dyn Repository,
    leave_id: u64,
    to: LeaveStatus,
) -> Result<LeaveRequest, AppError> {
    auth.require_admin()?;

    let processed = || AppError::bad_request("Leave request not found or already processed");

    let leave = repo.find_leave(leave_id).await?.ok_or_else(processed)?;
    if leave.user_id == auth.user_id {
        return Err(AppError::forbidden("Cannot decide your own leave request"));
    }

    if !repo
        .transition_leave(leave_id, LeaveStatus::Pending, to, Some(auth.user_id))
        .await?
    {
        return Err(processed());
    }

    info!(leave_id, admin_id = auth.user_id, status = %to, "Leave request decided");

    repo.find_leave(leave_id).await?.ok_or_else(processed)
}

/* =========================
Approve leave (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved successfully", body = Object, example = json!({
            "message": "Leave approved"
        })),
        (status = 400, description = "Leave request not found or already processed", body = Object, example = json!({
            "error": "Leave request not found or already processed"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("auth_token" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave = decide(&auth, repo.get_ref(), path.into_inner(), LeaveStatus::Approved).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved",
        "leave": LeaveResponse::from(&leave),
    })))
}

/* =========================
Reject leave (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected successfully", body = Object, example = json!({
            "message": "Leave rejected"
        })),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("auth_token" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave = decide(&auth, repo.get_ref(), path.into_inner(), LeaveStatus::Rejected).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave rejected",
        "leave": LeaveResponse::from(&leave),
    })))
}

/* =========================
Cancel leave (owner)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of your own pending leave request")
    ),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave cancelled"
        })),
        (status = 403, description = "Not your request"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Only pending requests can be cancelled")
    ),
    security(("auth_token" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();

    let leave = repo
        .find_leave(leave_id)
        .await?
        .ok_or_else(|| AppError::not_found("Leave request not found"))?;

    if leave.user_id != auth.user_id {
        return Err(AppError::forbidden("Only the requester can cancel a leave request"));
    }

    if !repo
        .transition_leave(leave_id, LeaveStatus::Pending, LeaveStatus::Cancelled, None)
        .await?
    {
        return Err(AppError::conflict("Only pending requests can be cancelled"));
    }

    info!(leave_id, user_id = auth.user_id, "Leave request cancelled");

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave cancelled" })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "error": "Leave request not found"
        }))
    ),
    security(("auth_token" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave = repo
        .find_leave(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Leave request not found"))?;

    if !auth.can_access(leave.user_id) {
        return Err(AppError::forbidden("Not your leave request"));
    }

    Ok(HttpResponse::Ok().json(LeaveResponse::from(&leave)))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveQuery),
    responses(
        (status = 200, description = "Paginated leave list, newest first", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("auth_token" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
    query: web::Query<LeaveQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, window) = Page::from_query(query.page, query.per_page);

    // employees only ever see their own requests
    let filter = LeaveFilter {
        user_id: if auth.is_admin() {
            query.user_id
        } else {
            Some(auth.user_id)
        },
        status: query.status,
    };

    let (leaves, total) = repo.list_leaves(&filter, window).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves.iter().map(LeaveResponse::from).collect(),
        page,
        per_page,
        total,
    }))
}

/// Leave counts per status for the dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Counts across all users for admins, own counts otherwise", body = LeaveCounts),
        (status = 401, description = "Unauthorized")
    ),
    security(("auth_token" = [])),
    tag = "Leave"
)]
pub async fn leave_summary(
    auth: AuthUser,
    repo: web::Data<dyn Repository>,
) -> Result<HttpResponse, AppError> {
    let scope = if auth.is_admin() {
        None
    } else {
        Some(auth.user_id)
    };

    Ok(HttpResponse::Ok().json(repo.count_leaves(scope).await?))
}
