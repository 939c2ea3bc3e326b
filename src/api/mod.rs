pub mod layout;
pub mod leave_request;
pub mod users;
