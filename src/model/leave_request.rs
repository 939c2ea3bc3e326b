use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Unpaid,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    /// Statuses that still reserve the requested days.
    pub fn blocks_dates(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

#[derive(Debug, Clone)]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub decided_by: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Inclusive number of calendar days covered.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Inclusive range intersection.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LeaveFilter {
    pub user_id: Option<u64>,
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({ "pending": 2, "approved": 5, "rejected": 1, "cancelled": 0 }))]
pub struct LeaveCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub cancelled: i64,
}

impl LeaveCounts {
    pub fn add(&mut self, status: LeaveStatus, count: i64) {
        match status {
            LeaveStatus::Pending => self.pending += count,
            LeaveStatus::Approved => self.approved += count,
            LeaveStatus::Rejected => self.rejected += count,
            LeaveStatus::Cancelled => self.cancelled += count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn leave(start: &str, end: &str) -> LeaveRequest {
        LeaveRequest {
            id: 1,
            user_id: 1,
            leave_type: LeaveType::Annual,
            start_date: date(start),
            end_date: date(end),
            reason: None,
            status: LeaveStatus::Pending,
            decided_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn days_are_inclusive() {
        assert_eq!(leave("2026-03-02", "2026-03-02").days(), 1);
        assert_eq!(leave("2026-03-02", "2026-03-06").days(), 5);
    }

    #[rstest]
    #[case("2026-03-01", "2026-03-02", true)]
    #[case("2026-03-06", "2026-03-09", true)]
    #[case("2026-03-03", "2026-03-04", true)]
    #[case("2026-02-20", "2026-03-01", false)]
    #[case("2026-03-07", "2026-03-10", false)]
    fn overlap_is_inclusive(#[case] start: &str, #[case] end: &str, #[case] expected: bool) {
        let existing = leave("2026-03-02", "2026-03-06");
        assert_eq!(existing.overlaps(date(start), date(end)), expected);
    }

    #[test]
    fn only_pending_and_approved_block_dates() {
        assert!(LeaveStatus::Pending.blocks_dates());
        assert!(LeaveStatus::Approved.blocks_dates());
        assert!(!LeaveStatus::Rejected.blocks_dates());
        assert!(!LeaveStatus::Cancelled.blocks_dates());
    }
}
