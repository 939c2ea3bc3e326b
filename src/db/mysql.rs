use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::TryStreamExt;
use sqlx::{FromRow, MySqlPool, mysql::MySqlPoolOptions};

use super::{LeaveRepository, Page, RefreshTokenRepository, StoreError, UserRepository};
use crate::model::{
    leave_request::{LeaveCounts, LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest},
    role::Role,
    user::{Identity, NewUser, UniqueField, User},
};

const USER_COLUMNS: &str = "id, name, user_name, email, phone_number, password, role_id, created_at";
const LEAVE_COLUMNS: &str =
    "id, user_id, leave_type, start_date, end_date, reason, status, decided_by, created_at";

pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Connects and applies pending migrations from `migrations/`.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self { pool })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

fn column_of(field: UniqueField) -> &'static str {
    match field {
        UniqueField::UserName => "user_name",
        UniqueField::Email => "email",
        UniqueField::PhoneNumber => "phone_number",
    }
}

/// Index names from the initial migration.
fn index_of(field: UniqueField) -> &'static str {
    match field {
        UniqueField::UserName => "uq_users_user_name",
        UniqueField::Email => "uq_users_email",
        UniqueField::PhoneNumber => "uq_users_phone_number",
    }
}

/// MySQL reports `Duplicate entry 'x' for key 'users.uq_users_email'`.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            if let Some(field) = UniqueField::ALL
                .into_iter()
                .find(|f| message.contains(index_of(*f)))
            {
                return StoreError::Duplicate(field);
            }
        }
    }
    StoreError::Database(err.to_string())
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    name: String,
    user_name: String,
    email: String,
    phone_number: u64,
    password: String,
    role_id: u8,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_id(row.role_id)
            .ok_or_else(|| StoreError::Database(format!("unknown role id {}", row.role_id)))?;

        Ok(User {
            id: row.id,
            name: row.name,
            user_name: row.user_name,
            email: row.email,
            phone_number: row.phone_number,
            password_hash: row.password,
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    user_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<String>,
    status: String,
    decided_by: Option<u64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let leave_type = row
            .leave_type
            .parse()
            .map_err(|_| StoreError::Database(format!("unknown leave type {}", row.leave_type)))?;
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::Database(format!("unknown leave status {}", row.status)))?;

        Ok(LeaveRequest {
            id: row.id,
            user_id: row.user_id,
            leave_type,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            status,
            decided_by: row.decided_by,
            created_at: row.created_at,
        })
    }
}

/// Makes `%`, `_` and `\` match literally inside a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
}

#[async_trait]
impl UserRepository for MySqlRepository {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, user_name, email, phone_number, password, role_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.user_name)
        .bind(&user.email)
        .bind(user.phone_number)
        .bind(&user.password_hash)
        .bind(user.role.id())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        let id = result.last_insert_id();
        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| StoreError::Database(format!("user {} missing after insert", id)))
    }

    async fn find_user_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE user_name = ? OR email = ? LIMIT 1",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(login)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn identity_taken(&self, field: UniqueField, value: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM users WHERE {} = ? LIMIT 1)",
            column_of(field)
        );
        let query = sqlx::query_scalar::<_, i64>(&sql);
        let query = match field {
            UniqueField::PhoneNumber => match value.parse::<u64>() {
                Ok(phone) => query.bind(phone),
                Err(_) => return Ok(false),
            },
            _ => query.bind(value),
        };

        Ok(query.fetch_one(&self.pool).await? != 0)
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<User>, i64), StoreError> {
        let (where_sql, like) = match search {
            Some(term) => (
                r" WHERE name LIKE ? ESCAPE '\\' OR user_name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\'",
                Some(format!("%{}%", escape_like(&term.to_lowercase()))),
            ),
            None => ("", None),
        };

        let count_sql = format!("SELECT COUNT(*) FROM users{}", where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(like) = &like {
            count_q = count_q.bind(like).bind(like).bind(like);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT {} FROM users{} ORDER BY id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS, where_sql
        );
        let mut data_q = sqlx::query_as::<_, UserRow>(&data_sql);
        if let Some(like) = &like {
            data_q = data_q.bind(like).bind(like).bind(like);
        }
        let users = data_q
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total))
    }

    async fn identities(&self, page: Page) -> Result<Vec<Identity>, StoreError> {
        let identities: Vec<Identity> = sqlx::query_as::<_, Identity>(
            "SELECT user_name, email, phone_number FROM users ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch(&self.pool)
        .try_collect()
        .await?;

        Ok(identities)
    }
}

#[async_trait]
impl LeaveRepository for MySqlRepository {
    async fn insert_leave_if_free(
        &self,
        leave: NewLeaveRequest,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // serializes submissions of the same user until commit
        sqlx::query("SELECT id FROM users WHERE id = ? FOR UPDATE")
            .bind(leave.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let overlaps = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM leave_requests
                WHERE user_id = ?
                AND status IN ('pending', 'approved')
                AND start_date <= ?
                AND end_date >= ?
            )
            "#,
        )
        .bind(leave.user_id)
        .bind(leave.end_date)
        .bind(leave.start_date)
        .fetch_one(&mut *tx)
        .await?;

        if overlaps != 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, leave_type, start_date, end_date, reason)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(leave.user_id)
        .bind(leave.leave_type.to_string())
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(&leave.reason)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;

        let id = result.last_insert_id();
        self.find_leave(id)
            .await?
            .map(Some)
            .ok_or_else(|| StoreError::Database(format!("leave request {} missing after insert", id)))
    }

    async fn find_leave(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError> {
        let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", LEAVE_COLUMNS);
        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn list_leaves(
        &self,
        filter: &LeaveFilter,
        page: Page,
    ) -> Result<(Vec<LeaveRequest>, i64), StoreError> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(user_id) = filter.user_id {
            where_sql.push_str(" AND user_id = ?");
            args.push(FilterValue::U64(user_id));
        }

        if let Some(status) = filter.status {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Str(status.to_string()));
        }

        let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Str(s) => count_q.bind(s.as_str()),
            };
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            r#"
            SELECT {}
            FROM leave_requests
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            LEAVE_COLUMNS, where_sql
        );
        let mut data_q = sqlx::query_as::<_, LeaveRow>(&data_sql);
        for arg in &args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(*v),
                FilterValue::Str(s) => data_q.bind(s.as_str()),
            };
        }

        let leaves = data_q
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(LeaveRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((leaves, total))
    }

    async fn transition_leave(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        decided_by: Option<u64>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, decided_by = COALESCE(?, decided_by)
            WHERE id = ?
            AND status = ?
            "#,
        )
        .bind(to.to_string())
        .bind(decided_by)
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_leaves(&self, user_id: Option<u64>) -> Result<LeaveCounts, StoreError> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, (String, i64)>(
                    "SELECT status, COUNT(*) FROM leave_requests WHERE user_id = ? GROUP BY status",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, (String, i64)>(
                    "SELECT status, COUNT(*) FROM leave_requests GROUP BY status",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut counts = LeaveCounts::default();
        for (status, count) in rows {
            match status.parse::<LeaveStatus>() {
                Ok(status) => counts.add(status, count),
                Err(_) => tracing::warn!(%status, "Skipping unknown leave status"),
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl RefreshTokenRepository for MySqlRepository {
    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM refresh_tokens WHERE user_id = ? AND (revoked = 1 OR expires_at <= ?)",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND revoked = 0")
            .bind(jti)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_match_literally() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("jane"), "jane");
    }
}
