//! Persistence ports and adapter selection.
//!
//! Handlers depend on [`Repository`] only. `mysql://` URLs select the sqlx
//! adapter, `memory://` selects the in-process one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::model::{
    leave_request::{LeaveCounts, LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest},
    user::{Identity, NewUser, UniqueField, User},
};

pub mod memory;
pub mod mysql;

pub use memory::MemoryRepository;
pub use mysql::MySqlRepository;

#[derive(Debug, Display)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[display(fmt = "duplicate value for {}", _0)]
    Duplicate(UniqueField),
    #[display(fmt = "database error: {}", _0)]
    Database(String),
}

impl std::error::Error for StoreError {}

/// Limit/offset window for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    /// 1-based page number, `per_page` clamped to 1..=100 (10 by default).
    pub fn from_query(page: Option<u64>, per_page: Option<u64>) -> (u64, u64, Self) {
        let per_page = per_page.unwrap_or(10).clamp(1, 100);
        let page = page.unwrap_or(1).max(1);
        let offset = (page - 1).saturating_mul(per_page);
        (
            page,
            per_page,
            Page {
                limit: per_page,
                offset,
            },
        )
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when a unique field is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: u64) -> Result<Option<User>, StoreError>;

    /// Looks up by user name or email; `login` is already normalized.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;

    async fn identity_taken(&self, field: UniqueField, value: &str) -> Result<bool, StoreError>;

    async fn list_users(
        &self,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<User>, i64), StoreError>;

    /// Identities ordered by id, used to warm the identity index in batches.
    async fn identities(&self, page: Page) -> Result<Vec<Identity>, StoreError>;
}

#[async_trait]
pub trait LeaveRepository: Send + Sync {
    /// Inserts unless a pending or approved request of the same user intersects
    /// `[start_date, end_date]`; `None` on overlap. Check and insert are atomic.
    async fn insert_leave_if_free(
        &self,
        leave: NewLeaveRequest,
    ) -> Result<Option<LeaveRequest>, StoreError>;

    async fn find_leave(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError>;

    /// Newest first, with the unpaginated total.
    async fn list_leaves(
        &self,
        filter: &LeaveFilter,
        page: Page,
    ) -> Result<(Vec<LeaveRequest>, i64), StoreError>;

    /// Compare-and-set on status. Returns false when the request is missing or not in `from`.
    async fn transition_leave(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        decided_by: Option<u64>,
    ) -> Result<bool, StoreError>;

    async fn count_leaves(&self, user_id: Option<u64>) -> Result<LeaveCounts, StoreError>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Also drops the user's revoked and expired tokens.
    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Revokes an active token. Returns false if it was unknown or already revoked.
    async fn revoke_refresh_token(&self, jti: &str) -> Result<bool, StoreError>;
}

pub trait Repository: UserRepository + LeaveRepository + RefreshTokenRepository {}

impl<T> Repository for T where T: UserRepository + LeaveRepository + RefreshTokenRepository {}

pub async fn init_db(database_url: &str) -> anyhow::Result<Arc<dyn Repository>> {
    if database_url.starts_with("memory://") {
        tracing::warn!("Using in-memory repository, data is lost on restart");
        return Ok(Arc::new(MemoryRepository::new()));
    }

    let repo = MySqlRepository::connect(database_url).await?;
    Ok(Arc::new(repo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 1, 10, 0)]
    #[case(Some(0), Some(0), 1, 1, 0)]
    #[case(Some(3), Some(500), 3, 100, 200)]
    #[case(Some(u64::MAX), Some(100), u64::MAX, 100, u64::MAX)]
    fn page_window_is_clamped(
        #[case] page: Option<u64>,
        #[case] per_page: Option<u64>,
        #[case] expected_page: u64,
        #[case] expected_per_page: u64,
        #[case] expected_offset: u64,
    ) {
        let (page, per_page, window) = Page::from_query(page, per_page);

        assert_eq!(page, expected_page);
        assert_eq!(per_page, expected_per_page);
        assert_eq!(window.limit, expected_per_page);
        assert_eq!(window.offset, expected_offset);
    }
}
