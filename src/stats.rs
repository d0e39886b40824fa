use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{
    ActivityEntry, ActivityKind, Birthday, MemberProfile, MemberRecord, VisitorProfile,
    VisitorRecord,
};

/// Bucket label for records whose grouping field is missing or blank.
/// Such records are never dropped; understating totals is not allowed.
pub const UNSPECIFIED_LABEL: &str = "unspecified";

/// A bounded interval over record timestamps. The lower bound is always
/// inclusive; the upper bound is exclusive unless `inclusive_end` is set
/// (calendar-month "so far" windows include the instant of `now`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub inclusive_end: bool,
}

impl TimeWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if ts < self.start {
            return false;
        }
        if self.inclusive_end {
            ts <= self.end
        } else {
            ts < self.end
        }
    }
}

/// Two consecutive, non-overlapping windows for period-over-period stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPair {
    pub current: TimeWindow,
    pub previous: TimeWindow,
}

/// Rolling comparison windows: `[now - days, now)` against the `days`
/// immediately before that. `current.start == previous.end` always holds.
pub fn rolling_windows(now: DateTime<Utc>, days: i64) -> WindowPair {
    let length = Duration::days(days.max(1));
    let boundary = now - length;
    WindowPair {
        current: TimeWindow {
            start: boundary,
            end: now,
            inclusive_end: false,
        },
        previous: TimeWindow {
            start: boundary - length,
            end: boundary,
            inclusive_end: false,
        },
    }
}

/// Calendar comparison windows: this month so far (through `now`,
/// inclusive) against the whole of last month. The previous window covers
/// last month's final day in full; its exclusive bound sits on the first
/// instant of the current month, so the pair stays adjacent.
pub fn calendar_month_windows(now: DateTime<Utc>) -> WindowPair {
    let today = now.date_naive();
    let first_of_this_month = today - Duration::days(i64::from(today.day()) - 1);
    let last_of_prev_month = first_of_this_month - Duration::days(1);
    let first_of_prev_month =
        last_of_prev_month - Duration::days(i64::from(last_of_prev_month.day()) - 1);

    let boundary = first_of_this_month.and_time(chrono::NaiveTime::MIN).and_utc();
    WindowPair {
        current: TimeWindow {
            start: boundary,
            end: now,
            inclusive_end: true,
        },
        previous: TimeWindow {
            start: first_of_prev_month.and_time(chrono::NaiveTime::MIN).and_utc(),
            end: boundary,
            inclusive_end: false,
        },
    }
}

/// Period-over-period change as a whole signed percentage.
///
/// Growth from a zero baseline reads as a full positive swing (+100) and a
/// flat zero-to-zero pair reads as no change; division by zero cannot
/// happen.
pub fn change_rate(current: i64, previous: i64) -> i64 {
    if previous == 0 {
        return if current > 0 { 100 } else { 0 };
    }
    (((current - previous) as f64 / previous as f64) * 100.0).round() as i64
}

/// Counts grouped by category label, plus the grand total. Bucket order
/// carries no meaning; display ordering belongs to the presentation layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryBreakdown {
    pub buckets: HashMap<String, usize>,
    pub total: usize,
}

impl CategoryBreakdown {
    pub fn record(&mut self, label: Option<&str>) {
        let label = match label.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => value,
            None => UNSPECIFIED_LABEL,
        };
        *self.buckets.entry(label.to_string()).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn count(&self, label: &str) -> usize {
        self.buckets.get(label).copied().unwrap_or(0)
    }
}

pub fn count_by<T>(items: &[T], key: impl Fn(&T) -> Option<&str>) -> CategoryBreakdown {
    let mut breakdown = CategoryBreakdown::default();
    for item in items {
        breakdown.record(key(item));
    }
    breakdown
}

/// Whole-year age, not exact to the day.
pub fn derived_age(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    today.year() - birth_date.year()
}

pub fn age_band(age: i32) -> &'static str {
    match age {
        i32::MIN..=25 => "18-25",
        26..=35 => "26-35",
        36..=45 => "36-45",
        46..=55 => "46-55",
        _ => "56+",
    }
}

pub fn age_breakdown<T>(
    items: &[T],
    birth_date: impl Fn(&T) -> Option<NaiveDate>,
    today: NaiveDate,
) -> CategoryBreakdown {
    let mut breakdown = CategoryBreakdown::default();
    for item in items {
        breakdown.record(birth_date(item).map(|born| age_band(derived_age(born, today))));
    }
    breakdown
}

/// Records whose birthday falls in `month` (year ignored), with derived age
/// attached, ordered by day of month. Records without a birth date have no
/// birthday to list and are left out here; the age breakdown still counts
/// them under "unspecified".
pub fn birthdays_in_month<T>(
    items: &[T],
    name: impl Fn(&T) -> &str,
    birth_date: impl Fn(&T) -> Option<NaiveDate>,
    month: u32,
    current_year: i32,
) -> Vec<Birthday> {
    let mut birthdays: Vec<Birthday> = items
        .iter()
        .filter_map(|item| {
            let born = birth_date(item)?;
            if born.month() != month {
                return None;
            }
            Some(Birthday {
                name: name(item).to_string(),
                day: born.day(),
                age: current_year - born.year(),
            })
        })
        .collect();

    birthdays.sort_by_key(|b| b.day);
    birthdays
}

/// Counts the records whose timestamp falls inside the window. Records
/// without a timestamp cannot be placed in any period and are skipped; they
/// still show up in categorical breakdowns and grand totals.
pub fn count_in_window<T>(
    items: &[T],
    timestamp: impl Fn(&T) -> Option<DateTime<Utc>>,
    window: &TimeWindow,
) -> usize {
    items
        .iter()
        .filter_map(timestamp)
        .filter(|ts| window.contains(*ts))
        .count()
}

fn previous_month(month: u32) -> u32 {
    if month == 1 { 12 } else { month - 1 }
}

fn has_value(field: Option<&str>) -> bool {
    field.map(str::trim).is_some_and(|s| !s.is_empty())
}

pub fn member_profile(members: &[MemberRecord], today: NaiveDate) -> MemberProfile {
    let month = today.month();
    let this_month = birthdays_in_month(
        members,
        |m| m.full_name.as_str(),
        |m| m.birth_date,
        month,
        today.year(),
    )
    .len();
    let last_month = birthdays_in_month(
        members,
        |m| m.full_name.as_str(),
        |m| m.birth_date,
        previous_month(month),
        today.year(),
    )
    .len();

    MemberProfile {
        total: members.len(),
        baptized: members.iter().filter(|m| m.baptized_on.is_some()).count(),
        serving_in_department: members
            .iter()
            .filter(|m| has_value(m.department.as_deref()))
            .count(),
        with_ministry_role: members
            .iter()
            .filter(|m| has_value(m.ministry_role.as_deref()))
            .count(),
        birthdays_this_month: this_month,
        birthday_change_pct: change_rate(this_month as i64, last_month as i64),
        by_age_band: age_breakdown(members, |m| m.birth_date, today),
        by_marital_status: count_by(members, |m| m.marital_status.as_deref()),
        by_department: count_by(members, |m| m.department.as_deref()),
        by_ministry_role: count_by(members, |m| m.ministry_role.as_deref()),
    }
}

pub fn visitor_profile(visitors: &[VisitorRecord], today: NaiveDate) -> VisitorProfile {
    VisitorProfile {
        total: visitors.len(),
        by_source_channel: count_by(visitors, |v| v.source_channel.as_deref()),
        by_age_band: age_breakdown(visitors, |v| v.birth_date, today),
        by_marital_status: count_by(visitors, |v| v.marital_status.as_deref()),
    }
}

/// Latest registrations across members and visitors, newest first. Visits
/// without a recorded date cannot be ordered and stay out of the feed.
pub fn recent_activity(
    members: &[MemberRecord],
    visitors: &[VisitorRecord],
    limit: usize,
) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = members
        .iter()
        .map(|m| ActivityEntry {
            id: m.id,
            kind: ActivityKind::Member,
            name: m.full_name.clone(),
            occurred_at: m.created_at,
        })
        .chain(visitors.iter().filter_map(|v| {
            let occurred_at = v.visited_at?;
            Some(ActivityEntry {
                id: v.id,
                kind: ActivityKind::Visitor,
                name: v.full_name.clone(),
                occurred_at,
            })
        }))
        .collect();

    entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid timestamp")
    }

    fn member(name: &str, birth: Option<NaiveDate>, created_at: DateTime<Utc>) -> MemberRecord {
        MemberRecord {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: None,
            birth_date: birth,
            marital_status: None,
            department: None,
            ministry_role: None,
            group_name: None,
            baptized_on: None,
            created_at,
        }
    }

    fn visitor(name: &str, visited_at: Option<DateTime<Utc>>) -> VisitorRecord {
        VisitorRecord {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: None,
            phone: None,
            whatsapp: None,
            birth_date: None,
            marital_status: None,
            source_channel: None,
            wants_devotional: false,
            wants_agenda: false,
            visited_at,
        }
    }

    #[test]
    fn change_rate_handles_zero_baseline() {
        assert_eq!(change_rate(0, 0), 0);
        assert_eq!(change_rate(1, 0), 100);
        assert_eq!(change_rate(37, 0), 100);
    }

    #[test]
    fn change_rate_rounds_to_whole_percent() {
        assert_eq!(change_rate(12, 10), 20);
        assert_eq!(change_rate(10, 12), -17);
        assert_eq!(change_rate(1, 3), -67);
        assert_eq!(change_rate(5, 5), 0);
    }

    #[test]
    fn rolling_windows_are_adjacent_and_disjoint() {
        let now = ts(2024, 3, 15, 12);
        let pair = rolling_windows(now, 30);
        assert_eq!(pair.current.start, pair.previous.end);
        assert_eq!(pair.current.end, now);
        assert_eq!(pair.previous.start, now - Duration::days(60));

        let boundary = pair.current.start;
        assert!(pair.current.contains(boundary));
        assert!(!pair.previous.contains(boundary));
    }

    #[test]
    fn calendar_windows_cover_whole_previous_month() {
        let now = ts(2024, 3, 15, 12);
        let pair = calendar_month_windows(now);
        assert_eq!(pair.current.start, ts(2024, 3, 1, 0));
        assert_eq!(pair.current.end, now);
        assert!(pair.current.inclusive_end);
        assert_eq!(pair.previous.start, ts(2024, 2, 1, 0));
        assert_eq!(pair.previous.end, ts(2024, 3, 1, 0));
        // leap-year February 29th, late in the day, still counts
        assert!(pair.previous.contains(ts(2024, 2, 29, 23)));
        assert!(!pair.previous.contains(ts(2024, 3, 1, 0)));
    }

    #[test]
    fn calendar_windows_wrap_the_year() {
        let pair = calendar_month_windows(ts(2024, 1, 10, 8));
        assert_eq!(pair.previous.start, ts(2023, 12, 1, 0));
        assert_eq!(pair.previous.end, ts(2024, 1, 1, 0));
    }

    #[test]
    fn breakdown_total_matches_record_count() {
        let labels = [Some("worship"), Some("media"), None, Some(""), Some("worship")];
        let breakdown = count_by(&labels, |l| *l);
        let bucket_sum: usize = breakdown.buckets.values().sum();
        assert_eq!(bucket_sum, labels.len());
        assert_eq!(breakdown.total, labels.len());
        assert_eq!(breakdown.count("worship"), 2);
        assert_eq!(breakdown.count(UNSPECIFIED_LABEL), 2);
    }

    #[test]
    fn blank_categories_count_as_unspecified_in_grand_total() {
        let labels = [Some("a"), Some("b"), Some("c"), None, None];
        let breakdown = count_by(&labels, |l| *l);
        assert_eq!(breakdown.total, 5);
        assert_eq!(breakdown.count(UNSPECIFIED_LABEL), 2);
    }

    #[test]
    fn age_bands_cover_the_scale() {
        assert_eq!(age_band(19), "18-25");
        assert_eq!(age_band(25), "18-25");
        assert_eq!(age_band(26), "26-35");
        assert_eq!(age_band(45), "36-45");
        assert_eq!(age_band(55), "46-55");
        assert_eq!(age_band(70), "56+");
    }

    #[test]
    fn age_breakdown_counts_missing_birth_dates() {
        let today = date(2024, 3, 15);
        let members = vec![
            member("Ana", Some(date(1990, 6, 1)), ts(2024, 1, 1, 0)),
            member("Bea", None, ts(2024, 1, 1, 0)),
        ];
        let breakdown = age_breakdown(&members, |m| m.birth_date, today);
        assert_eq!(breakdown.total, 2);
        assert_eq!(breakdown.count("26-35"), 1);
        assert_eq!(breakdown.count(UNSPECIFIED_LABEL), 1);
    }

    #[test]
    fn birthday_list_matches_month_and_orders_by_day() {
        let now = date(2024, 3, 15);
        let members = vec![
            member("March Five", Some(date(1990, 3, 5)), ts(2024, 1, 1, 0)),
            member("March Twenty", Some(date(1985, 3, 20)), ts(2024, 1, 1, 0)),
            member("April First", Some(date(1992, 4, 1)), ts(2024, 1, 1, 0)),
        ];
        let birthdays = birthdays_in_month(
            &members,
            |m| m.full_name.as_str(),
            |m| m.birth_date,
            now.month(),
            now.year(),
        );
        assert_eq!(birthdays.len(), 2);
        assert_eq!(birthdays[0].name, "March Five");
        assert_eq!(birthdays[0].day, 5);
        assert_eq!(birthdays[0].age, 34);
        assert_eq!(birthdays[1].name, "March Twenty");
        assert_eq!(birthdays[1].day, 20);
        assert_eq!(birthdays[1].age, 39);
    }

    #[test]
    fn birthday_list_is_stable_under_repeat() {
        let members = vec![
            member("B", Some(date(1991, 3, 12)), ts(2024, 1, 1, 0)),
            member("A", Some(date(1993, 3, 12)), ts(2024, 1, 1, 0)),
            member("C", Some(date(1980, 3, 2)), ts(2024, 1, 1, 0)),
        ];
        let once = birthdays_in_month(&members, |m| m.full_name.as_str(), |m| m.birth_date, 3, 2024);
        let mut resorted = once.clone();
        resorted.sort_by_key(|b| b.day);
        assert_eq!(once, resorted);
        let again = birthdays_in_month(&members, |m| m.full_name.as_str(), |m| m.birth_date, 3, 2024);
        assert_eq!(once, again);
    }

    #[test]
    fn window_count_skips_records_without_timestamps() {
        let now = ts(2024, 3, 15, 12);
        let pair = rolling_windows(now, 30);
        let visitors = vec![
            visitor("In Window", Some(now - Duration::days(3))),
            visitor("Too Old", Some(now - Duration::days(45))),
            visitor("Undated", None),
        ];
        assert_eq!(count_in_window(&visitors, |v| v.visited_at, &pair.current), 1);
        assert_eq!(count_in_window(&visitors, |v| v.visited_at, &pair.previous), 1);
    }

    #[test]
    fn member_profile_tracks_birthday_swing() {
        let today = date(2024, 3, 15);
        let members = vec![
            member("March A", Some(date(1990, 3, 5)), ts(2024, 1, 1, 0)),
            member("March B", Some(date(1992, 3, 9)), ts(2024, 1, 1, 0)),
            member("Feb Only", Some(date(1991, 2, 7)), ts(2024, 1, 1, 0)),
            member("No Birth", None, ts(2024, 1, 1, 0)),
        ];
        let profile = member_profile(&members, today);
        assert_eq!(profile.total, 4);
        assert_eq!(profile.birthdays_this_month, 2);
        assert_eq!(profile.birthday_change_pct, change_rate(2, 1));
        assert_eq!(profile.by_age_band.total, 4);
        assert_eq!(profile.by_age_band.count(UNSPECIFIED_LABEL), 1);
    }

    #[test]
    fn activity_feed_merges_newest_first() {
        let members = vec![member("Member New", None, ts(2024, 3, 10, 10))];
        let visitors = vec![
            visitor("Visitor Newest", Some(ts(2024, 3, 12, 9))),
            visitor("Visitor Old", Some(ts(2024, 2, 1, 9))),
            visitor("Visitor Undated", None),
        ];
        let feed = recent_activity(&members, &visitors, 5);
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].name, "Visitor Newest");
        assert_eq!(feed[0].kind, ActivityKind::Visitor);
        assert_eq!(feed[1].name, "Member New");
        assert_eq!(feed[2].name, "Visitor Old");

        let capped = recent_activity(&members, &visitors, 2);
        assert_eq!(capped.len(), 2);
    }
}
