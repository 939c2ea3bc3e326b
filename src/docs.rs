use crate::api::leave_request::{CreateLeave, LeaveListResponse, LeaveResponse};
use crate::api::users::UserListResponse;
use crate::auth::handlers::{
    AvailabilityResponse, LoginRequest, LoginResponse, SignUpRequest, TokenPair,
};
use crate::layout::{Area, NavIcon, NavLink, Shell};
use crate::model::leave_request::{LeaveCounts, LeaveStatus, LeaveType};
use crate::model::role::Role;
use crate::model::user::{UniqueField, UserView};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flexi Leave API",
        version = "1.0.0",
        description = r#"
## Flexi Leave

Leave management for small teams: employees submit leave requests, admins approve or reject them.

### 🔹 Key Features
- **Accounts**
  - Sign up with a unique user name, email and phone number
  - Log in, rotate refresh tokens, log out
- **Leave Management**
  - Apply for leave, approve/reject/cancel requests, and view leave history
- **Dashboards**
  - Role-based admin/employee shell with per-status leave counts

### 🔐 Security
Protected endpoints take the access token in the `auth-token` header
(`Authorization: Bearer` is accepted too). Approving and rejecting leave and
listing users are **Admin** only.

### 📦 Response Format
- JSON with camelCase fields, errors as `{"error": "..."}`
- Pagination supported for list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::signup,
        crate::auth::handlers::availability,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::leave_summary,

        crate::api::users::list_users,
        crate::api::layout::layout_model
    ),
    components(
        schemas(
            SignUpRequest,
            LoginRequest,
            LoginResponse,
            TokenPair,
            AvailabilityResponse,
            UserView,
            UserListResponse,
            UniqueField,
            Role,
            CreateLeave,
            LeaveResponse,
            LeaveListResponse,
            LeaveCounts,
            LeaveStatus,
            LeaveType,
            Shell,
            NavLink,
            NavIcon,
            Area
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "User", description = "Accounts, sessions and user management"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Layout", description = "Dashboard shell"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "auth_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("auth-token"))),
            );
        }
    }
}
