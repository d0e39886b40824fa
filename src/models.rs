use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::stats::CategoryBreakdown;

#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub marital_status: Option<String>,
    pub department: Option<String>,
    pub ministry_role: Option<String>,
    pub group_name: Option<String>,
    pub baptized_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VisitorRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub marital_status: Option<String>,
    pub source_channel: Option<String>,
    pub wants_devotional: bool,
    pub wants_agenda: bool,
    // A visit without a recorded date stays out of time-windowed counts but
    // still participates in categorical breakdowns.
    pub visited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ChildRecord {
    pub id: Uuid,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub class_name: Option<String>,
    pub guardian: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: Uuid,
    pub title: String,
    pub location: Option<String>,
    pub status: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Department row with its member headcount, both computed store-side.
#[derive(Debug, Clone)]
pub struct DepartmentSummary {
    pub name: String,
    pub leader: Option<String>,
    pub member_count: i64,
}

#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub name: String,
    pub leader: Option<String>,
    pub meeting_day: Option<String>,
    pub member_count: i64,
}

/// One tenant's row in the cross-tenant admin overview.
#[derive(Debug, Clone)]
pub struct ChurchOverview {
    pub tenant_id: String,
    pub name: String,
    pub city: Option<String>,
    pub member_count: i64,
    pub visitor_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Member,
    Visitor,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// A record that celebrates a birthday in the month under view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Birthday {
    pub name: String,
    pub day: u32,
    pub age: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub window_days: i64,
    pub current_members: i64,
    pub previous_members: i64,
    pub member_change_pct: i64,
    pub current_visitors: i64,
    pub previous_visitors: i64,
    pub visitor_change_pct: i64,
    pub birthdays: Vec<Birthday>,
    pub recent_activity: Vec<ActivityEntry>,
}

/// Derived member-page figures; everything here comes from fields the store
/// cannot compute (ages, birthday months) or from the fetched slice itself.
#[derive(Debug, Clone, Serialize)]
pub struct MemberProfile {
    pub total: usize,
    pub baptized: usize,
    pub serving_in_department: usize,
    pub with_ministry_role: usize,
    pub birthdays_this_month: usize,
    pub birthday_change_pct: i64,
    pub by_age_band: CategoryBreakdown,
    pub by_marital_status: CategoryBreakdown,
    pub by_department: CategoryBreakdown,
    pub by_ministry_role: CategoryBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitorProfile {
    pub total: usize,
    pub by_source_channel: CategoryBreakdown,
    pub by_age_band: CategoryBreakdown,
    pub by_marital_status: CategoryBreakdown,
}
