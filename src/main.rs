use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod db;
mod error;
mod models;
mod report;
mod stats;

use db::SortOrder;
use models::{Birthday, DashboardStats};

#[derive(Parser)]
#[command(name = "congregation-insights")]
#[command(about = "Congregation growth and ministry insight tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data for a demo tenant
    Seed,
    /// Import members from a CSV file
    ImportMembers {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import visitors from a CSV file
    ImportVisitors {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rolling growth stats, birthdays and recent activity
    Dashboard {
        #[arg(long)]
        tenant: String,
        #[arg(long, default_value_t = 30)]
        window_days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Member totals and profile breakdowns
    Members {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        search: Option<String>,
    },
    /// Visitor list page and funnel stats
    Visitors {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },
    /// Departments with member headcounts
    Departments {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        search: Option<String>,
    },
    /// Small groups with member headcounts
    Groups {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        search: Option<String>,
    },
    /// Birthdays across members, visitors and children
    Birthdays {
        #[arg(long)]
        tenant: String,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },
    /// Calendar events in a date range
    Events {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Cross-tenant overview, allow-listed admins only
    Admin {
        #[arg(long)]
        email: String,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        tenant: String,
        #[arg(long, default_value_t = 30)]
        window_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportMembers { tenant, csv } => {
            let imported = db::import_members(&pool, &tenant, &csv).await?;
            println!("Imported {imported} members from {}.", csv.display());
        }
        Commands::ImportVisitors { tenant, csv } => {
            let inserted = db::import_visitors(&pool, &tenant, &csv).await?;
            println!("Inserted {inserted} visitors from {}.", csv.display());
        }
        Commands::Dashboard {
            tenant,
            window_days,
            json,
        } => {
            let dashboard = dashboard_stats(&pool, &tenant, window_days, Utc::now()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print_dashboard(&tenant, &dashboard);
            }
        }
        Commands::Members { tenant, search } => {
            let now = Utc::now();
            let members = db::fetch_members(
                &pool,
                &tenant,
                search.as_deref(),
                None,
                SortOrder::Descending,
            )
            .await?;
            let profile = stats::member_profile(&members, now.date_naive());
            let months = stats::calendar_month_windows(now);
            let new_this_month =
                db::count_members_in_window(&pool, &tenant, search.as_deref(), &months.current)
                    .await?;

            println!("Members for {tenant}:");
            if let Some(term) = search.as_deref() {
                println!("Matching \"{term}\":");
                if members.is_empty() {
                    println!("- none");
                }
                for member in &members {
                    let department = member.department.as_deref().unwrap_or("no department");
                    println!("- {} ({}, {department})", member.full_name, member.email);
                }
            }
            println!("- Total: {}", profile.total);
            println!("- New this month: {new_this_month}");
            println!("- Baptized: {}", profile.baptized);
            println!("- Serving in a department: {}", profile.serving_in_department);
            println!("- Holding a ministry role: {}", profile.with_ministry_role);
            println!(
                "- Birthdays this month: {} ({} vs last month)",
                profile.birthdays_this_month,
                report::format_change(profile.birthday_change_pct)
            );
            print_breakdown("By age band", &profile.by_age_band);
            print_breakdown("By marital status", &profile.by_marital_status);
            print_breakdown("By department", &profile.by_department);
            print_breakdown("By ministry role", &profile.by_ministry_role);
        }
        Commands::Visitors {
            tenant,
            search,
            page,
            page_size,
        } => {
            let now = Utc::now();
            let (page_rows, total) =
                db::fetch_visitors_page(&pool, &tenant, search.as_deref(), page, page_size).await?;
            let months = stats::calendar_month_windows(now);
            let this_month =
                db::count_visitors_in_window(&pool, &tenant, search.as_deref(), &months.current)
                    .await?;
            let last_month =
                db::count_visitors_in_window(&pool, &tenant, search.as_deref(), &months.previous)
                    .await?;
            let all = db::fetch_visitors(
                &pool,
                &tenant,
                search.as_deref(),
                None,
                SortOrder::Descending,
            )
            .await?;
            let profile = stats::visitor_profile(&all, now.date_naive());

            let total_pages = if total == 0 {
                1
            } else {
                (total + page_size.max(1) - 1) / page_size.max(1)
            };
            println!("Visitors for {tenant} (page {page} of {total_pages}, {total} total):");
            if page_rows.is_empty() {
                println!("No visitors on this page.");
            }
            for visitor in &page_rows {
                let visited = visitor
                    .visited_at
                    .map(|ts| ts.date_naive().to_string())
                    .unwrap_or_else(|| "no visit date".to_string());
                let channel = visitor.source_channel.as_deref().unwrap_or("unspecified");
                let contact = visitor
                    .email
                    .as_deref()
                    .or(visitor.whatsapp.as_deref())
                    .or(visitor.phone.as_deref())
                    .unwrap_or("no contact");
                println!("- {} ({visited}, via {channel}, {contact})", visitor.full_name);
            }
            println!(
                "This month: {this_month} vs {last_month} last month ({})",
                report::format_change(stats::change_rate(this_month, last_month))
            );
            println!(
                "Opted into devotionals: {}, into the agenda: {}",
                all.iter().filter(|v| v.wants_devotional).count(),
                all.iter().filter(|v| v.wants_agenda).count()
            );
            print_breakdown("By source channel", &profile.by_source_channel);
            print_breakdown("By age band", &profile.by_age_band);
            print_breakdown("By marital status", &profile.by_marital_status);
        }
        Commands::Departments { tenant, search } => {
            let departments =
                db::department_member_counts(&pool, &tenant, search.as_deref()).await?;
            let children = db::count_children(&pool, &tenant).await?;
            let serving: i64 = departments.iter().map(|d| d.member_count).sum();

            if departments.is_empty() {
                println!("No departments found for {tenant}.");
            } else {
                println!("Departments for {tenant}:");
                for dept in &departments {
                    let leader = dept.leader.as_deref().unwrap_or("no leader assigned");
                    println!("- {} ({leader}): {} members", dept.name, dept.member_count);
                }
            }
            println!("Members serving across departments: {serving}");
            println!("Children's ministry: {children} children");
        }
        Commands::Groups { tenant, search } => {
            let groups = db::group_member_counts(&pool, &tenant, search.as_deref()).await?;
            if groups.is_empty() {
                println!("No small groups found for {tenant}.");
            } else {
                println!("Small groups for {tenant}:");
                for group in &groups {
                    let leader = group.leader.as_deref().unwrap_or("no leader assigned");
                    let day = group.meeting_day.as_deref().unwrap_or("no set day");
                    println!(
                        "- {} ({leader}, {day}): {} members",
                        group.name, group.member_count
                    );
                }
                let enrolled: i64 = groups.iter().map(|g| g.member_count).sum();
                println!("Members enrolled in groups: {enrolled}");
            }
        }
        Commands::Birthdays { tenant, month } => {
            let today = Utc::now().date_naive();
            let month = month.unwrap_or_else(|| today.month());

            let members =
                db::fetch_members(&pool, &tenant, None, None, SortOrder::Ascending).await?;
            let visitors =
                db::fetch_visitors(&pool, &tenant, None, None, SortOrder::Ascending).await?;
            let children = db::fetch_children(&pool, &tenant, None).await?;

            let sections: [(&str, Vec<Birthday>); 3] = [
                (
                    "Members",
                    stats::birthdays_in_month(
                        &members,
                        |m| m.full_name.as_str(),
                        |m| m.birth_date,
                        month,
                        today.year(),
                    ),
                ),
                (
                    "Visitors",
                    stats::birthdays_in_month(
                        &visitors,
                        |v| v.full_name.as_str(),
                        |v| v.birth_date,
                        month,
                        today.year(),
                    ),
                ),
                (
                    "Children",
                    stats::birthdays_in_month(
                        &children,
                        |c| c.full_name.as_str(),
                        |c| c.birth_date,
                        month,
                        today.year(),
                    ),
                ),
            ];

            println!("Birthdays in month {month} for {tenant}:");
            for (label, birthdays) in &sections {
                println!("{label}:");
                if birthdays.is_empty() {
                    println!("- none");
                }
                for birthday in birthdays {
                    println!(
                        "- Day {:>2}: {} (turning {})",
                        birthday.day, birthday.name, birthday.age
                    );
                }
            }
        }
        Commands::Events { tenant, from, to } => {
            let today = Utc::now().date_naive();
            let from = from.unwrap_or(today);
            let to = to.unwrap_or(today + Duration::days(30));
            anyhow::ensure!(from <= to, "--from must not be after --to");

            // inclusive date range, realized as [from, to + 1 day)
            let window = stats::TimeWindow {
                start: from.and_time(NaiveTime::MIN).and_utc(),
                end: (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc(),
                inclusive_end: false,
            };
            let events = db::fetch_events(&pool, &tenant, &window).await?;
            let by_status = stats::count_by(&events, |e| Some(e.status.as_str()));

            println!("Events for {tenant} from {from} to {to}:");
            if events.is_empty() {
                println!("No events in this range.");
            }
            for event in &events {
                let location = event.location.as_deref().unwrap_or("no location");
                let flag = if event.status == "cancelled" {
                    " [cancelled]"
                } else {
                    ""
                };
                let when = match event.ends_at {
                    Some(ends) => format!(
                        "{} to {}",
                        event.starts_at.format("%Y-%m-%d %H:%M"),
                        ends.format("%H:%M")
                    ),
                    None => event.starts_at.format("%Y-%m-%d %H:%M").to_string(),
                };
                println!("- {} at {location}, {when}{flag}", event.title);
            }
            print_breakdown("By status", &by_status);
        }
        Commands::Admin { email } => {
            db::require_admin(&pool, &email).await?;

            let months = stats::calendar_month_windows(Utc::now());
            let this_month = db::count_churches_in_window(&pool, &months.current).await?;
            let last_month = db::count_churches_in_window(&pool, &months.previous).await?;
            let churches = db::church_overviews(&pool).await?;

            println!("Admin overview ({} churches):", churches.len());
            println!(
                "New churches this month: {this_month} vs {last_month} last month ({})",
                report::format_change(stats::change_rate(this_month, last_month))
            );
            for church in &churches {
                let city = church.city.as_deref().unwrap_or("unknown city");
                println!(
                    "- {} ({city}, tenant {}): {} members, {} visitors",
                    church.name, church.tenant_id, church.member_count, church.visitor_count
                );
            }
        }
        Commands::Report {
            tenant,
            window_days,
            out,
        } => {
            let now = Utc::now();
            let data = gather_report_data(&pool, &tenant, window_days, now).await?;
            let report = report::build_report(&data);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn dashboard_stats(
    pool: &PgPool,
    tenant: &str,
    window_days: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<DashboardStats> {
    let windows = stats::rolling_windows(now, window_days);
    let current_members = db::count_members_in_window(pool, tenant, None, &windows.current).await?;
    let previous_members =
        db::count_members_in_window(pool, tenant, None, &windows.previous).await?;
    let current_visitors =
        db::count_visitors_in_window(pool, tenant, None, &windows.current).await?;
    let previous_visitors =
        db::count_visitors_in_window(pool, tenant, None, &windows.previous).await?;

    let members = db::fetch_members(pool, tenant, None, None, SortOrder::Descending).await?;
    let visitors = db::fetch_visitors(pool, tenant, None, None, SortOrder::Descending).await?;

    let today = now.date_naive();
    let birthdays = stats::birthdays_in_month(
        &members,
        |m| m.full_name.as_str(),
        |m| m.birth_date,
        today.month(),
        today.year(),
    );
    let recent_activity = stats::recent_activity(&members, &visitors, 5);

    Ok(DashboardStats {
        window_days: window_days.max(1),
        current_members,
        previous_members,
        member_change_pct: stats::change_rate(current_members, previous_members),
        current_visitors,
        previous_visitors,
        visitor_change_pct: stats::change_rate(current_visitors, previous_visitors),
        birthdays,
        recent_activity,
    })
}

async fn gather_report_data(
    pool: &PgPool,
    tenant: &str,
    window_days: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<report::ReportData> {
    let today = now.date_naive();
    let dashboard = dashboard_stats(pool, tenant, window_days, now).await?;

    let members = db::fetch_members(pool, tenant, None, None, SortOrder::Descending).await?;
    let visitors = db::fetch_visitors(pool, tenant, None, None, SortOrder::Descending).await?;
    let children = db::fetch_children(pool, tenant, None).await?;

    let member_profile = stats::member_profile(&members, today);
    let visitor_profile = stats::visitor_profile(&visitors, today);

    let months = stats::calendar_month_windows(now);
    let new_members_this_month =
        db::count_members_in_window(pool, tenant, None, &months.current).await?;
    let visitors_this_month =
        db::count_visitors_in_window(pool, tenant, None, &months.current).await?;
    let visitors_last_month =
        db::count_visitors_in_window(pool, tenant, None, &months.previous).await?;

    let departments = db::department_member_counts(pool, tenant, None).await?;
    let groups = db::group_member_counts(pool, tenant, None).await?;
    let children_count = db::count_children(pool, tenant).await?;

    let mut birthdays = stats::birthdays_in_month(
        &members,
        |m| m.full_name.as_str(),
        |m| m.birth_date,
        today.month(),
        today.year(),
    );
    birthdays.extend(stats::birthdays_in_month(
        &visitors,
        |v| v.full_name.as_str(),
        |v| v.birth_date,
        today.month(),
        today.year(),
    ));
    birthdays.extend(stats::birthdays_in_month(
        &children,
        |c| c.full_name.as_str(),
        |c| c.birth_date,
        today.month(),
        today.year(),
    ));
    birthdays.sort_by_key(|b| b.day);

    let church_label = db::church_name(pool, tenant)
        .await?
        .unwrap_or_else(|| tenant.to_string());

    Ok(report::ReportData {
        church_label,
        generated_on: today,
        window_days: window_days.max(1),
        dashboard,
        members: member_profile,
        new_members_this_month,
        visitors: visitor_profile,
        visitors_this_month,
        visitors_last_month,
        visitor_month_change_pct: stats::change_rate(visitors_this_month, visitors_last_month),
        departments,
        groups,
        children_count,
        birthdays,
    })
}

fn print_dashboard(tenant: &str, dashboard: &DashboardStats) {
    println!(
        "Dashboard for {tenant} (last {} days):",
        dashboard.window_days
    );
    println!(
        "- New members: {} ({} vs previous period)",
        dashboard.current_members,
        report::format_change(dashboard.member_change_pct)
    );
    println!(
        "- Visitors: {} ({} vs previous period)",
        dashboard.current_visitors,
        report::format_change(dashboard.visitor_change_pct)
    );

    println!("Birthdays this month:");
    if dashboard.birthdays.is_empty() {
        println!("- none");
    }
    for birthday in &dashboard.birthdays {
        println!(
            "- Day {:>2}: {} (turning {})",
            birthday.day, birthday.name, birthday.age
        );
    }

    println!("Recent activity:");
    if dashboard.recent_activity.is_empty() {
        println!("- none");
    }
    for entry in &dashboard.recent_activity {
        let kind = match entry.kind {
            models::ActivityKind::Member => "member",
            models::ActivityKind::Visitor => "visitor",
        };
        println!(
            "- [{kind}] {} on {}",
            entry.name,
            entry.occurred_at.date_naive()
        );
    }
}

fn print_breakdown(heading: &str, breakdown: &stats::CategoryBreakdown) {
    println!("{heading}:");
    if breakdown.total == 0 {
        println!("- none");
        return;
    }
    for (label, count) in report::ordered_buckets(breakdown) {
        println!("- {label}: {count}");
    }
}
