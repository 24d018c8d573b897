pub mod models;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::listing::sort::{SortKey, SortOrder};

use self::models::DryerReading;

const READING_COLUMNS: &str = r#"id, "type", t_set, h_set, t1, t2, t3, t4,
    h1, h2, h3, h4, t_ave, h_ave, bat_percentage, updated_at"#;

/// Number of rows returned by [`reading_stats`] as "recent".
pub const RECENT_READINGS: i64 = 5;

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// One server-side page request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingsQuery {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    /// Case-insensitive substring match on the type label.
    pub search: Option<String>,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl Default for ReadingsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            search: None,
            sort_by: SortKey::UpdatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadingPage {
    pub rows: Vec<DryerReading>,
    /// Rows matching the search across all pages.
    pub total: i64,
}

pub async fn list_readings(pool: &PgPool, query: &ReadingsQuery) -> Result<ReadingPage> {
    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let total: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM dryer_data WHERE ($1::text IS NULL OR "type" ILIKE $1)"#,
    )
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    let page_size = i64::from(query.page_size.max(1));
    let offset = i64::from(query.page.max(1) - 1) * page_size;

    // The sort column comes from a closed enum, never from user input.
    let sql = format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM dryer_data
        WHERE ($1::text IS NULL OR "type" ILIKE $1)
        ORDER BY {} {}, id {}
        LIMIT $2 OFFSET $3
        "#,
        query.sort_by.order_expr(),
        query.sort_order.sql(),
        query.sort_order.as_str(),
    );

    let rows = sqlx::query_as::<_, DryerReading>(&sql)
        .bind(pattern.as_deref())
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(ReadingPage { rows, total })
}

/// Newest readings first, at most `limit` rows.
pub async fn fetch_all_readings(pool: &PgPool, limit: i64) -> Result<Vec<DryerReading>> {
    let sql = format!(
        "SELECT {READING_COLUMNS} FROM dryer_data ORDER BY updated_at DESC, id DESC LIMIT $1"
    );
    let rows = sqlx::query_as::<_, DryerReading>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct ReadingStats {
    pub total: i64,
    pub recent: Vec<DryerReading>,
}

pub async fn reading_stats(pool: &PgPool) -> Result<ReadingStats> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dryer_data")
        .fetch_one(pool)
        .await?;
    let recent = fetch_all_readings(pool, RECENT_READINGS).await?;
    Ok(ReadingStats { total, recent })
}

/// `ILIKE` pattern matching `term` anywhere, with its wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// ---------------------------------------------------------------------------
// Admin profiles
// ---------------------------------------------------------------------------

/// Record an operator who signed up through the dashboard. Existing rows are
/// left untouched.
pub async fn insert_admin_profile(
    pool: &PgPool,
    id: Uuid,
    email: &str,
    full_name: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO admins (id, email, full_name) VALUES ($1, $2, $3) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(id)
    .bind(email)
    .bind(full_name)
    .execute(pool)
    .await?;
    Ok(())
}
