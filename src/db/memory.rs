use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{LeaveRepository, Page, RefreshTokenRepository, StoreError, UserRepository};
use crate::model::{
    leave_request::{LeaveCounts, LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest},
    user::{Identity, NewUser, UniqueField, User},
};

struct RefreshRecord {
    user_id: u64,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    leaves: Vec<LeaveRequest>,
    refresh_tokens: HashMap<String, RefreshRecord>,
    next_user_id: u64,
    next_leave_id: u64,
}

/// Process-local repository enforcing the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("memory store poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("memory store poisoned".into()))
    }
}

fn window<T: Clone>(items: &[T], page: Page) -> Vec<T> {
    items
        .iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .cloned()
        .collect()
}

fn holds(user: &User, field: UniqueField, value: &str) -> bool {
    UniqueField::value_of(field, &user.identity()) == value
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.write()?;

        let candidate = Identity {
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number,
        };
        for field in UniqueField::ALL {
            let value = field.value_of(&candidate);
            if state.users.iter().any(|u| holds(u, field, &value)) {
                return Err(StoreError::Duplicate(field));
            }
        }

        state.next_user_id += 1;
        let created = User {
            id: state.next_user_id,
            name: user.name,
            user_name: user.user_name,
            email: user.email,
            phone_number: user.phone_number,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| u.user_name == login || u.email == login)
            .cloned())
    }

    async fn identity_taken(&self, field: UniqueField, value: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.users.iter().any(|u| holds(u, field, value)))
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<User>, i64), StoreError> {
        let state = self.read()?;
        let needle = search.map(str::to_lowercase);

        let mut matching: Vec<User> = state
            .users
            .iter()
            .filter(|u| match &needle {
                Some(n) => {
                    u.name.to_lowercase().contains(n)
                        || u.user_name.contains(n)
                        || u.email.contains(n)
                }
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        let total = matching.len() as i64;
        Ok((window(&matching, page), total))
    }

    async fn identities(&self, page: Page) -> Result<Vec<Identity>, StoreError> {
        let state = self.read()?;
        let identities: Vec<Identity> = state.users.iter().map(User::identity).collect();
        Ok(window(&identities, page))
    }
}

#[async_trait]
impl LeaveRepository for MemoryRepository {
    async fn insert_leave_if_free(
        &self,
        leave: NewLeaveRequest,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        // one write guard covers the overlap check and the insert
        let mut state = self.write()?;
        if state.leaves.iter().any(|l| {
            l.user_id == leave.user_id
                && l.status.blocks_dates()
                && l.overlaps(leave.start_date, leave.end_date)
        }) {
            return Ok(None);
        }

        state.next_leave_id += 1;

        let created = LeaveRequest {
            id: state.next_leave_id,
            user_id: leave.user_id,
            leave_type: leave.leave_type,
            start_date: leave.start_date,
            end_date: leave.end_date,
            reason: leave.reason,
            status: LeaveStatus::Pending,
            decided_by: None,
            created_at: Utc::now(),
        };
        state.leaves.push(created.clone());
        Ok(Some(created))
    }

    async fn find_leave(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError> {
        Ok(self.read()?.leaves.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leaves(
        &self,
        filter: &LeaveFilter,
        page: Page,
    ) -> Result<(Vec<LeaveRequest>, i64), StoreError> {
        let state = self.read()?;

        let mut matching: Vec<LeaveRequest> = state
            .leaves
            .iter()
            .filter(|l| filter.user_id.is_none_or(|id| l.user_id == id))
            .filter(|l| filter.status.is_none_or(|s| l.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        Ok((window(&matching, page), total))
    }

    async fn transition_leave(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        decided_by: Option<u64>,
    ) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state
            .leaves
            .iter_mut()
            .find(|l| l.id == id && l.status == from)
        {
            Some(leave) => {
                leave.status = to;
                if decided_by.is_some() {
                    leave.decided_by = decided_by;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_leaves(&self, user_id: Option<u64>) -> Result<LeaveCounts, StoreError> {
        let state = self.read()?;
        let mut counts = LeaveCounts::default();
        for leave in state
            .leaves
            .iter()
            .filter(|l| user_id.is_none_or(|id| l.user_id == id))
        {
            counts.add(leave.status, 1);
        }
        Ok(counts)
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRepository {
    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut state = self.write()?;
        state
            .refresh_tokens
            .retain(|_, r| r.user_id != user_id || (!r.revoked && r.expires_at > now));
        state.refresh_tokens.insert(
            jti.to_string(),
            RefreshRecord {
                user_id,
                expires_at,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state.refresh_tokens.get_mut(jti) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{leave_request::LeaveType, role::Role};
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    fn sick_day(user_id: u64, day: u32) -> NewLeaveRequest {
        let date = NaiveDate::from_ymd_opt(2026, 5, day).expect("date");
        NewLeaveRequest {
            user_id,
            leave_type: LeaveType::Sick,
            start_date: date,
            end_date: date,
            reason: None,
        }
    }

    fn new_user(user_name: &str, email: &str, phone: u64) -> NewUser {
        NewUser {
            name: "Someone".into(),
            user_name: user_name.into(),
            email: email.into(),
            phone_number: phone,
            password_hash: "hash".into(),
            role: Role::Employee,
        }
    }

    #[rstest]
    #[case(new_user("jane", "other@x.io", 2), UniqueField::UserName)]
    #[case(new_user("other", "jane@x.io", 2), UniqueField::Email)]
    #[case(new_user("other", "other@x.io", 1), UniqueField::PhoneNumber)]
    #[actix_web::test]
    async fn insert_rejects_duplicate_identity(#[case] dup: NewUser, #[case] field: UniqueField) {
        let repo = MemoryRepository::new();
        repo.insert_user(new_user("jane", "jane@x.io", 1))
            .await
            .expect("first insert");

        match repo.insert_user(dup).await {
            Err(StoreError::Duplicate(f)) => assert_eq!(f, field),
            other => panic!("expected duplicate {field}, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn transition_is_compare_and_set() {
        let repo = MemoryRepository::new();
        let leave = repo
            .insert_leave_if_free(sick_day(1, 4))
            .await
            .expect("insert")
            .expect("free");

        assert!(
            repo.transition_leave(leave.id, LeaveStatus::Pending, LeaveStatus::Approved, Some(9))
                .await
                .expect("transition")
        );
        assert!(
            !repo
                .transition_leave(leave.id, LeaveStatus::Pending, LeaveStatus::Rejected, Some(9))
                .await
                .expect("transition")
        );

        let stored = repo.find_leave(leave.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, LeaveStatus::Approved);
        assert_eq!(stored.decided_by, Some(9));
    }

    #[actix_web::test]
    async fn refresh_token_revokes_once() {
        let repo = MemoryRepository::new();
        repo.store_refresh_token(1, "jti-1", Utc::now())
            .await
            .expect("store");

        assert!(repo.revoke_refresh_token("jti-1").await.expect("revoke"));
        assert!(!repo.revoke_refresh_token("jti-1").await.expect("revoke"));
        assert!(!repo.revoke_refresh_token("unknown").await.expect("revoke"));
    }

    #[actix_web::test]
    async fn concurrent_overlapping_inserts_admit_one() {
        let repo = MemoryRepository::new();

        let results = futures::future::join_all(
            (0..4).map(|_| repo.insert_leave_if_free(sick_day(1, 4))),
        )
        .await;
        let admitted = results
            .into_iter()
            .map(|r| r.expect("insert"))
            .filter(Option::is_some)
            .count();
        assert_eq!(admitted, 1);

        // other users and other days are unaffected
        assert!(repo.insert_leave_if_free(sick_day(2, 4)).await.expect("insert").is_some());
        assert!(repo.insert_leave_if_free(sick_day(1, 5)).await.expect("insert").is_some());
    }

    #[actix_web::test]
    async fn storing_a_token_prunes_dead_ones_of_that_user() {
        let repo = MemoryRepository::new();
        let later = Utc::now() + Duration::hours(1);
        repo.store_refresh_token(1, "revoked", later).await.expect("store");
        repo.store_refresh_token(1, "expired", Utc::now() - Duration::hours(1))
            .await
            .expect("store");
        repo.store_refresh_token(2, "other-user", later).await.expect("store");
        repo.revoke_refresh_token("revoked").await.expect("revoke");

        repo.store_refresh_token(1, "fresh", later).await.expect("store");

        let state = repo.read().expect("state");
        let mut kept: Vec<&str> = state.refresh_tokens.keys().map(String::as_str).collect();
        kept.sort_unstable();
        assert_eq!(kept, ["fresh", "other-user"]);
    }
}
