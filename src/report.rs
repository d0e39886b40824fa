use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{
    Birthday, DashboardStats, DepartmentSummary, GroupSummary, MemberProfile, VisitorProfile,
};
use crate::stats::CategoryBreakdown;

/// Signed whole-percent label; zero reads as "+0%" to match the stat cards.
pub fn format_change(pct: i64) -> String {
    if pct >= 0 {
        format!("+{pct}%")
    } else {
        format!("{pct}%")
    }
}

/// Display order for category buckets: count descending, then label
/// ascending. The aggregation itself promises no order; this is the one
/// place ordering is applied.
pub fn ordered_buckets(breakdown: &CategoryBreakdown) -> Vec<(String, usize)> {
    let mut buckets: Vec<(String, usize)> = breakdown
        .buckets
        .iter()
        .map(|(label, count)| (label.clone(), *count))
        .collect();
    buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    buckets
}

fn write_breakdown(output: &mut String, heading: &str, breakdown: &CategoryBreakdown) {
    let _ = writeln!(output, "### {heading}");
    if breakdown.total == 0 {
        let _ = writeln!(output, "No records for this view.");
    } else {
        for (label, count) in ordered_buckets(breakdown) {
            let _ = writeln!(output, "- {label}: {count}");
        }
    }
    let _ = writeln!(output);
}

pub struct ReportData {
    pub church_label: String,
    pub generated_on: NaiveDate,
    pub window_days: i64,
    pub dashboard: DashboardStats,
    pub members: MemberProfile,
    pub new_members_this_month: i64,
    pub visitors: VisitorProfile,
    pub visitors_this_month: i64,
    pub visitors_last_month: i64,
    pub visitor_month_change_pct: i64,
    pub departments: Vec<DepartmentSummary>,
    pub groups: Vec<GroupSummary>,
    pub children_count: i64,
    pub birthdays: Vec<Birthday>,
}

pub fn build_report(data: &ReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Congregation Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (rolling window: {} days)",
        data.church_label, data.generated_on, data.window_days
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Growth");
    let _ = writeln!(
        output,
        "- New members, last {} days: {} ({} vs previous period)",
        data.window_days,
        data.dashboard.current_members,
        format_change(data.dashboard.member_change_pct)
    );
    let _ = writeln!(
        output,
        "- Visitors, last {} days: {} ({} vs previous period)",
        data.window_days,
        data.dashboard.current_visitors,
        format_change(data.dashboard.visitor_change_pct)
    );
    let _ = writeln!(
        output,
        "- New members this calendar month: {}",
        data.new_members_this_month
    );
    let _ = writeln!(
        output,
        "- Visitors this calendar month: {} vs {} last month ({})",
        data.visitors_this_month,
        data.visitors_last_month,
        format_change(data.visitor_month_change_pct)
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Member Profile");
    let _ = writeln!(output, "- Total members: {}", data.members.total);
    let _ = writeln!(output, "- Baptized: {}", data.members.baptized);
    let _ = writeln!(
        output,
        "- Serving in a department: {}",
        data.members.serving_in_department
    );
    let _ = writeln!(
        output,
        "- Holding a ministry role: {}",
        data.members.with_ministry_role
    );
    let _ = writeln!(output);
    write_breakdown(&mut output, "Members by age band", &data.members.by_age_band);
    write_breakdown(
        &mut output,
        "Members by marital status",
        &data.members.by_marital_status,
    );
    write_breakdown(&mut output, "Members by department", &data.members.by_department);
    write_breakdown(
        &mut output,
        "Members by ministry role",
        &data.members.by_ministry_role,
    );

    let _ = writeln!(output, "## Visitor Funnel");
    let _ = writeln!(output, "- Total visitors: {}", data.visitors.total);
    let _ = writeln!(output);
    write_breakdown(
        &mut output,
        "Visitors by source channel",
        &data.visitors.by_source_channel,
    );
    write_breakdown(&mut output, "Visitors by age band", &data.visitors.by_age_band);

    let _ = writeln!(output, "## Departments");
    if data.departments.is_empty() {
        let _ = writeln!(output, "No departments registered.");
    } else {
        for dept in &data.departments {
            let leader = dept.leader.as_deref().unwrap_or("no leader assigned");
            let _ = writeln!(
                output,
                "- {} ({}): {} members",
                dept.name, leader, dept.member_count
            );
        }
    }
    let _ = writeln!(output, "- Children's ministry: {} children", data.children_count);
    let _ = writeln!(output);

    let _ = writeln!(output, "## Small Groups");
    if data.groups.is_empty() {
        let _ = writeln!(output, "No small groups registered.");
    } else {
        for group in &data.groups {
            let leader = group.leader.as_deref().unwrap_or("no leader assigned");
            let day = group.meeting_day.as_deref().unwrap_or("no set day");
            let _ = writeln!(
                output,
                "- {} ({}, {}): {} members",
                group.name, leader, day, group.member_count
            );
        }
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Birthdays This Month");
    if data.birthdays.is_empty() {
        let _ = writeln!(output, "No birthdays this month.");
    } else {
        for birthday in &data.birthdays {
            let _ = writeln!(
                output,
                "- Day {:>2}: {} (turning {})",
                birthday.day, birthday.name, birthday.age
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::count_by;

    #[test]
    fn change_labels_carry_signs() {
        assert_eq!(format_change(20), "+20%");
        assert_eq!(format_change(0), "+0%");
        assert_eq!(format_change(-17), "-17%");
    }

    #[test]
    fn buckets_order_by_count_then_label() {
        let labels = [
            Some("media"),
            Some("worship"),
            Some("worship"),
            Some("kids"),
            Some("kids"),
        ];
        let breakdown = count_by(&labels, |l| *l);
        let ordered = ordered_buckets(&breakdown);
        assert_eq!(
            ordered,
            vec![
                ("kids".to_string(), 2),
                ("worship".to_string(), 2),
                ("media".to_string(), 1),
            ]
        );
    }
}
