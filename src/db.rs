use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::RetrievalError;
use crate::models::{
    ChildRecord, ChurchOverview, DepartmentSummary, EventRecord, GroupSummary, MemberRecord,
    VisitorRecord,
};
use crate::stats::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

// A blank tenant id must never reach the store as an unscoped query.
fn blank_tenant(tenant_id: &str) -> bool {
    tenant_id.trim().is_empty()
}

fn push_window(builder: &mut QueryBuilder<'_, Postgres>, column: &str, window: &TimeWindow) {
    builder.push(" AND ");
    builder.push(column);
    builder.push(" >= ");
    builder.push_bind(window.start);
    builder.push(" AND ");
    builder.push(column);
    builder.push(if window.inclusive_end { " <= " } else { " < " });
    builder.push_bind(window.end);
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let tenant = "demo-church";
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO congregation_insights.churches (id, tenant_id, name, city)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (tenant_id) DO UPDATE
        SET name = EXCLUDED.name, city = EXCLUDED.city
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant)
    .bind("Grace Community Church")
    .bind("Springfield")
    .execute(pool)
    .await?;

    let members: Vec<(
        &str,
        &str,
        Option<NaiveDate>,
        Option<&str>,
        Option<&str>,
        Option<&str>,
        Option<&str>,
        Option<NaiveDate>,
        i64,
    )> = vec![
        (
            "Marcos Oliveira",
            "marcos.oliveira@gracecommunity.church",
            NaiveDate::from_ymd_opt(1988, 3, 12),
            Some("married"),
            Some("Worship"),
            Some("Worship Leader"),
            Some("Northside Group"),
            NaiveDate::from_ymd_opt(2004, 6, 20),
            10,
        ),
        (
            "Ana Souza",
            "ana.souza@gracecommunity.church",
            NaiveDate::from_ymd_opt(1995, 7, 3),
            Some("single"),
            Some("Kids Ministry"),
            Some("Teacher"),
            Some("Downtown Group"),
            NaiveDate::from_ymd_opt(2015, 4, 5),
            8,
        ),
        (
            "João Pereira",
            "joao.pereira@gracecommunity.church",
            NaiveDate::from_ymd_opt(1979, 11, 21),
            Some("married"),
            Some("Media"),
            None,
            None,
            None,
            45,
        ),
        (
            "Carla Mendes",
            "carla.mendes@gracecommunity.church",
            None,
            Some("single"),
            None,
            None,
            None,
            None,
            50,
        ),
        (
            "Pedro Santos",
            "pedro.santos@gracecommunity.church",
            NaiveDate::from_ymd_opt(1965, 1, 30),
            Some("married"),
            Some("Worship"),
            Some("Deacon"),
            Some("Northside Group"),
            NaiveDate::from_ymd_opt(1989, 12, 3),
            400,
        ),
        (
            "Luiza Castro",
            "luiza.castro@gracecommunity.church",
            NaiveDate::from_ymd_opt(1958, 9, 14),
            Some("widowed"),
            Some("Reception"),
            None,
            None,
            None,
            100,
        ),
        (
            "Rafael Lima",
            "rafael.lima@gracecommunity.church",
            NaiveDate::from_ymd_opt(2000, 4, 8),
            Some("single"),
            Some("Media"),
            None,
            Some("Downtown Group"),
            None,
            20,
        ),
        (
            "Beatriz Nunes",
            "beatriz.nunes@gracecommunity.church",
            NaiveDate::from_ymd_opt(1992, 8, 22),
            Some("married"),
            Some("Kids Ministry"),
            Some("Coordinator"),
            None,
            NaiveDate::from_ymd_opt(2010, 10, 17),
            75,
        ),
    ];

    for (name, email, birth, marital, department, role, group, baptized, days_ago) in members {
        sqlx::query(
            r#"
            INSERT INTO congregation_insights.members
            (id, tenant_id, full_name, email, birth_date, marital_status,
             department, ministry_role, group_name, baptized_on, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tenant_id, email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                birth_date = EXCLUDED.birth_date,
                marital_status = EXCLUDED.marital_status,
                department = EXCLUDED.department,
                ministry_role = EXCLUDED.ministry_role,
                group_name = EXCLUDED.group_name,
                baptized_on = EXCLUDED.baptized_on
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant)
        .bind(name)
        .bind(email)
        .bind(birth)
        .bind(marital)
        .bind(department)
        .bind(role)
        .bind(group)
        .bind(baptized)
        .bind(now - Duration::days(days_ago))
        .execute(pool)
        .await?;
    }

    let visitors: Vec<(&str, &str, Option<&str>, Option<NaiveDate>, Option<i64>)> = vec![
        (
            "seed-v01",
            "Fernanda Costa",
            Some("friend"),
            NaiveDate::from_ymd_opt(1993, 5, 19),
            Some(3),
        ),
        (
            "seed-v02",
            "Diego Martins",
            Some("instagram"),
            NaiveDate::from_ymd_opt(1987, 12, 2),
            Some(10),
        ),
        ("seed-v03", "Paula Rocha", Some("service"), None, Some(20)),
        (
            "seed-v04",
            "Tiago Alves",
            Some("walk-in"),
            NaiveDate::from_ymd_opt(1999, 6, 27),
            Some(40),
        ),
        ("seed-v05", "Helena Dias", None, None, None),
    ];

    for (import_ref, name, channel, birth, visited_days_ago) in visitors {
        sqlx::query(
            r#"
            INSERT INTO congregation_insights.visitors
            (id, tenant_id, full_name, birth_date, source_channel,
             wants_devotional, wants_agenda, visited_at, import_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (import_ref) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant)
        .bind(name)
        .bind(birth)
        .bind(channel)
        .bind(true)
        .bind(false)
        .bind(visited_days_ago.map(|days| now - Duration::days(days)))
        .bind(import_ref)
        .execute(pool)
        .await?;
    }

    let departments = vec![
        ("Worship", Some("Marcos Oliveira")),
        ("Media", Some("João Pereira")),
        ("Kids Ministry", Some("Beatriz Nunes")),
        ("Reception", None),
    ];

    for (name, leader) in departments {
        sqlx::query(
            r#"
            INSERT INTO congregation_insights.departments (id, tenant_id, name, leader)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant)
        .bind(name)
        .bind(leader)
        .execute(pool)
        .await?;
    }

    let groups = vec![
        ("Northside Group", Some("Pedro Santos"), Some("Wednesday")),
        ("Downtown Group", Some("Ana Souza"), Some("Friday")),
    ];

    for (name, leader, meeting_day) in groups {
        sqlx::query(
            r#"
            INSERT INTO congregation_insights.small_groups (id, tenant_id, name, leader, meeting_day)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant)
        .bind(name)
        .bind(leader)
        .bind(meeting_day)
        .execute(pool)
        .await?;
    }

    let children = vec![
        (
            Uuid::parse_str("7c3f2a9e-5d14-4b6f-9b4a-2f6f1f1f9a01")?,
            "Sofia Almeida",
            NaiveDate::from_ymd_opt(2016, 5, 11),
            Some("Explorers"),
            Some("Beatriz Nunes"),
        ),
        (
            Uuid::parse_str("7c3f2a9e-5d14-4b6f-9b4a-2f6f1f1f9a02")?,
            "Theo Ramos",
            NaiveDate::from_ymd_opt(2019, 2, 2),
            Some("Sprouts"),
            Some("Paula Rocha"),
        ),
        (
            Uuid::parse_str("7c3f2a9e-5d14-4b6f-9b4a-2f6f1f1f9a03")?,
            "Lia Castro",
            None,
            None,
            Some("Luiza Castro"),
        ),
    ];

    for (id, name, birth, class_name, guardian) in children {
        sqlx::query(
            r#"
            INSERT INTO congregation_insights.children
            (id, tenant_id, full_name, birth_date, class_name, guardian)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(tenant)
        .bind(name)
        .bind(birth)
        .bind(class_name)
        .bind(guardian)
        .execute(pool)
        .await?;
    }

    let events = vec![
        (
            Uuid::parse_str("9a1b4c7d-0e2f-4a6b-8c9d-1e2f3a4b5c01")?,
            "Sunday Service",
            Some("Main Hall"),
            "confirmed",
            now + Duration::days(3),
        ),
        (
            Uuid::parse_str("9a1b4c7d-0e2f-4a6b-8c9d-1e2f3a4b5c02")?,
            "Youth Retreat",
            Some("Camp Horizon"),
            "pending",
            now + Duration::days(14),
        ),
        (
            Uuid::parse_str("9a1b4c7d-0e2f-4a6b-8c9d-1e2f3a4b5c03")?,
            "Choir Rehearsal",
            None,
            "cancelled",
            now - Duration::days(2),
        ),
    ];

    for (id, title, location, status, starts_at) in events {
        sqlx::query(
            r#"
            INSERT INTO congregation_insights.calendar_events
            (id, tenant_id, title, location, status, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(tenant)
        .bind(title)
        .bind(location)
        .bind(status)
        .bind(starts_at)
        .bind(starts_at + Duration::hours(2))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "INSERT INTO congregation_insights.admin_users (email) VALUES ($1) ON CONFLICT DO NOTHING",
    )
    .bind("overseer@gracecommunity.church")
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn import_members(
    pool: &PgPool,
    tenant_id: &str,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        phone: Option<String>,
        birth_date: Option<NaiveDate>,
        marital_status: Option<String>,
        department: Option<String>,
        ministry_role: Option<String>,
        group_name: Option<String>,
        baptized_on: Option<NaiveDate>,
    }

    anyhow::ensure!(!blank_tenant(tenant_id), "tenant id must not be blank");

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        sqlx::query(
            r#"
            INSERT INTO congregation_insights.members
            (id, tenant_id, full_name, email, phone, birth_date, marital_status,
             department, ministry_role, group_name, baptized_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tenant_id, email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                phone = EXCLUDED.phone,
                birth_date = EXCLUDED.birth_date,
                marital_status = EXCLUDED.marital_status,
                department = EXCLUDED.department,
                ministry_role = EXCLUDED.ministry_role,
                group_name = EXCLUDED.group_name,
                baptized_on = EXCLUDED.baptized_on
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(row.birth_date)
        .bind(&row.marital_status)
        .bind(&row.department)
        .bind(&row.ministry_role)
        .bind(&row.group_name)
        .bind(row.baptized_on)
        .execute(pool)
        .await?;
        imported += 1;
    }

    Ok(imported)
}

pub async fn import_visitors(
    pool: &PgPool,
    tenant_id: &str,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: Option<String>,
        phone: Option<String>,
        whatsapp: Option<String>,
        birth_date: Option<NaiveDate>,
        marital_status: Option<String>,
        source_channel: Option<String>,
        wants_devotional: Option<bool>,
        wants_agenda: Option<bool>,
        visited_at: Option<DateTime<Utc>>,
        import_ref: Option<String>,
    }

    anyhow::ensure!(!blank_tenant(tenant_id), "tenant id must not be blank");

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let import_ref = row
            .import_ref
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let outcome = sqlx::query(
            r#"
            INSERT INTO congregation_insights.visitors
            (id, tenant_id, full_name, email, phone, whatsapp, birth_date,
             marital_status, source_channel, wants_devotional, wants_agenda,
             visited_at, import_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (import_ref) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(&row.whatsapp)
        .bind(row.birth_date)
        .bind(&row.marital_status)
        .bind(&row.source_channel)
        .bind(row.wants_devotional.unwrap_or(false))
        .bind(row.wants_agenda.unwrap_or(false))
        .bind(row.visited_at)
        .bind(import_ref)
        .execute(pool)
        .await?;

        if outcome.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn member_from_row(row: &PgRow) -> Result<MemberRecord, sqlx::Error> {
    Ok(MemberRecord {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        birth_date: row.try_get("birth_date")?,
        marital_status: row.try_get("marital_status")?,
        department: row.try_get("department")?,
        ministry_role: row.try_get("ministry_role")?,
        group_name: row.try_get("group_name")?,
        baptized_on: row.try_get("baptized_on")?,
        created_at: row.try_get("created_at")?,
    })
}

fn visitor_from_row(row: &PgRow) -> Result<VisitorRecord, sqlx::Error> {
    Ok(VisitorRecord {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        whatsapp: row.try_get("whatsapp")?,
        birth_date: row.try_get("birth_date")?,
        marital_status: row.try_get("marital_status")?,
        source_channel: row.try_get("source_channel")?,
        wants_devotional: row.try_get("wants_devotional")?,
        wants_agenda: row.try_get("wants_agenda")?,
        visited_at: row.try_get("visited_at")?,
    })
}

pub async fn fetch_members(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
    window: Option<&TimeWindow>,
    order: SortOrder,
) -> Result<Vec<MemberRecord>, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT id, full_name, email, phone, birth_date, marital_status, \
         department, ministry_role, group_name, baptized_on, created_at \
         FROM congregation_insights.members WHERE tenant_id = ",
    );
    builder.push_bind(tenant_id);

    if let Some(term) = search {
        builder.push(" AND full_name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    if let Some(window) = window {
        push_window(&mut builder, "created_at", window);
    }
    builder.push(" ORDER BY created_at ");
    builder.push(order.sql());

    let rows = builder.build().fetch_all(pool).await?;
    tracing::debug!(tenant_id, rows = rows.len(), "fetched members");

    let mut members = Vec::with_capacity(rows.len());
    for row in &rows {
        members.push(member_from_row(row)?);
    }
    Ok(members)
}

pub async fn fetch_visitors(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
    window: Option<&TimeWindow>,
    order: SortOrder,
) -> Result<Vec<VisitorRecord>, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT id, full_name, email, phone, whatsapp, birth_date, marital_status, \
         source_channel, wants_devotional, wants_agenda, visited_at \
         FROM congregation_insights.visitors WHERE tenant_id = ",
    );
    builder.push_bind(tenant_id);

    if let Some(term) = search {
        builder.push(" AND full_name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    if let Some(window) = window {
        push_window(&mut builder, "visited_at", window);
    }
    builder.push(" ORDER BY visited_at ");
    builder.push(order.sql());
    builder.push(" NULLS LAST");

    let rows = builder.build().fetch_all(pool).await?;
    tracing::debug!(tenant_id, rows = rows.len(), "fetched visitors");

    let mut visitors = Vec::with_capacity(rows.len());
    for row in &rows {
        visitors.push(visitor_from_row(row)?);
    }
    Ok(visitors)
}

/// One page of the visitor list plus the total row count for the same
/// filter, both computed store-side.
pub async fn fetch_visitors_page(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
    page: i64,
    page_size: i64,
) -> Result<(Vec<VisitorRecord>, i64), RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok((Vec::new(), 0));
    }

    let mut count_builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM congregation_insights.visitors WHERE tenant_id = ");
    count_builder.push_bind(tenant_id);
    if let Some(term) = search {
        count_builder.push(" AND full_name ILIKE ");
        count_builder.push_bind(format!("%{term}%"));
    }
    let total: i64 = count_builder.build_query_scalar().fetch_one(pool).await?;

    let page = page.max(1);
    let page_size = page_size.max(1);

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT id, full_name, email, phone, whatsapp, birth_date, marital_status, \
         source_channel, wants_devotional, wants_agenda, visited_at \
         FROM congregation_insights.visitors WHERE tenant_id = ",
    );
    builder.push_bind(tenant_id);
    if let Some(term) = search {
        builder.push(" AND full_name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    builder.push(" ORDER BY visited_at DESC NULLS LAST LIMIT ");
    builder.push_bind(page_size);
    builder.push(" OFFSET ");
    builder.push_bind((page - 1) * page_size);

    let rows = builder.build().fetch_all(pool).await?;
    let mut visitors = Vec::with_capacity(rows.len());
    for row in &rows {
        visitors.push(visitor_from_row(row)?);
    }
    Ok((visitors, total))
}

pub async fn fetch_children(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
) -> Result<Vec<ChildRecord>, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT id, full_name, birth_date, class_name, guardian \
         FROM congregation_insights.children WHERE tenant_id = ",
    );
    builder.push_bind(tenant_id);
    if let Some(term) = search {
        builder.push(" AND full_name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    builder.push(" ORDER BY full_name ASC");

    let rows = builder.build().fetch_all(pool).await?;
    let mut children = Vec::with_capacity(rows.len());
    for row in &rows {
        children.push(ChildRecord {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            birth_date: row.try_get("birth_date")?,
            class_name: row.try_get("class_name")?,
            guardian: row.try_get("guardian")?,
        });
    }
    Ok(children)
}

pub async fn fetch_events(
    pool: &PgPool,
    tenant_id: &str,
    window: &TimeWindow,
) -> Result<Vec<EventRecord>, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT id, title, location, status, starts_at, ends_at \
         FROM congregation_insights.calendar_events WHERE tenant_id = ",
    );
    builder.push_bind(tenant_id);
    push_window(&mut builder, "starts_at", window);
    builder.push(" ORDER BY starts_at ASC");

    let rows = builder.build().fetch_all(pool).await?;
    let mut events = Vec::with_capacity(rows.len());
    for row in &rows {
        events.push(EventRecord {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            location: row.try_get("location")?,
            status: row.try_get("status")?,
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
        });
    }
    Ok(events)
}

pub async fn count_members_in_window(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
    window: &TimeWindow,
) -> Result<i64, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(0);
    }

    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM congregation_insights.members WHERE tenant_id = ");
    builder.push_bind(tenant_id);
    if let Some(term) = search {
        builder.push(" AND full_name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    push_window(&mut builder, "created_at", window);
    Ok(builder.build_query_scalar().fetch_one(pool).await?)
}

// NULL visit dates fail both window comparisons and therefore never count,
// which is exactly the malformed-record policy for windowed stats.
pub async fn count_visitors_in_window(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
    window: &TimeWindow,
) -> Result<i64, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(0);
    }

    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM congregation_insights.visitors WHERE tenant_id = ");
    builder.push_bind(tenant_id);
    if let Some(term) = search {
        builder.push(" AND full_name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    push_window(&mut builder, "visited_at", window);
    Ok(builder.build_query_scalar().fetch_one(pool).await?)
}

pub async fn count_children(pool: &PgPool, tenant_id: &str) -> Result<i64, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(0);
    }

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM congregation_insights.children WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Departments with their member headcounts in a single grouped query.
pub async fn department_member_counts(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
) -> Result<Vec<DepartmentSummary>, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT d.name, d.leader, COUNT(m.id) AS member_count \
         FROM congregation_insights.departments d \
         LEFT JOIN congregation_insights.members m \
           ON m.tenant_id = d.tenant_id AND m.department = d.name \
         WHERE d.tenant_id = ",
    );
    builder.push_bind(tenant_id);
    if let Some(term) = search {
        builder.push(" AND d.name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    builder.push(" GROUP BY d.name, d.leader ORDER BY member_count DESC, d.name ASC");

    let rows = builder.build().fetch_all(pool).await?;
    let mut departments = Vec::with_capacity(rows.len());
    for row in &rows {
        departments.push(DepartmentSummary {
            name: row.try_get("name")?,
            leader: row.try_get("leader")?,
            member_count: row.try_get("member_count")?,
        });
    }
    Ok(departments)
}

pub async fn group_member_counts(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
) -> Result<Vec<GroupSummary>, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT g.name, g.leader, g.meeting_day, COUNT(m.id) AS member_count \
         FROM congregation_insights.small_groups g \
         LEFT JOIN congregation_insights.members m \
           ON m.tenant_id = g.tenant_id AND m.group_name = g.name \
         WHERE g.tenant_id = ",
    );
    builder.push_bind(tenant_id);
    if let Some(term) = search {
        builder.push(" AND g.name ILIKE ");
        builder.push_bind(format!("%{term}%"));
    }
    builder
        .push(" GROUP BY g.name, g.leader, g.meeting_day ORDER BY member_count DESC, g.name ASC");

    let rows = builder.build().fetch_all(pool).await?;
    let mut groups = Vec::with_capacity(rows.len());
    for row in &rows {
        groups.push(GroupSummary {
            name: row.try_get("name")?,
            leader: row.try_get("leader")?,
            meeting_day: row.try_get("meeting_day")?,
            member_count: row.try_get("member_count")?,
        });
    }
    Ok(groups)
}

/// Admin gate: the overview below is the only cross-tenant read in the
/// system, and it is reachable only through this allow-list check.
pub async fn require_admin(pool: &PgPool, email: &str) -> Result<(), RetrievalError> {
    let allowed: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM congregation_insights.admin_users WHERE email = $1)",
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    if allowed {
        Ok(())
    } else {
        Err(RetrievalError::NotAuthorized(email.to_string()))
    }
}

pub async fn church_name(pool: &PgPool, tenant_id: &str) -> Result<Option<String>, RetrievalError> {
    if blank_tenant(tenant_id) {
        return Ok(None);
    }

    let name: Option<String> = sqlx::query_scalar(
        "SELECT name FROM congregation_insights.churches WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;
    Ok(name)
}

pub async fn church_overviews(pool: &PgPool) -> Result<Vec<ChurchOverview>, RetrievalError> {
    let rows = sqlx::query(
        "SELECT c.tenant_id, c.name, c.city, c.created_at, \
           (SELECT COUNT(*) FROM congregation_insights.members m \
             WHERE m.tenant_id = c.tenant_id) AS member_count, \
           (SELECT COUNT(*) FROM congregation_insights.visitors v \
             WHERE v.tenant_id = c.tenant_id) AS visitor_count \
         FROM congregation_insights.churches c \
         ORDER BY c.name ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut churches = Vec::with_capacity(rows.len());
    for row in &rows {
        churches.push(ChurchOverview {
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            city: row.try_get("city")?,
            member_count: row.try_get("member_count")?,
            visitor_count: row.try_get("visitor_count")?,
            created_at: row.try_get("created_at")?,
        });
    }
    Ok(churches)
}

pub async fn count_churches_in_window(
    pool: &PgPool,
    window: &TimeWindow,
) -> Result<i64, RetrievalError> {
    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM congregation_insights.churches WHERE TRUE");
    push_window(&mut builder, "created_at", window);
    Ok(builder.build_query_scalar().fetch_one(pool).await?)
}
