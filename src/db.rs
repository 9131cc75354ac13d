use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use chrono::{Datelike, Local, Months, NaiveDate};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{self, MonthRevenue, MonthlyTotal, PersonRevenueRecord, NO_OWNER};

/// Number of months a refresh covers when no window is given.
pub const DEFAULT_WINDOW_MONTHS: u32 = 5;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let owners = vec![
        (
            Uuid::parse_str("6b1f3c1e-6a0d-4b61-9a0e-2f1f6c0b9a11")?,
            "aj@sfdata.com",
            "AJ",
        ),
        (
            Uuid::parse_str("a4f2d8b9-0c3e-4c8e-8f2a-5d7e9b1c3a22")?,
            "kiriti@sfdata.com",
            "Kiriti",
        ),
    ];

    for (id, email, display_name) in owners {
        upsert_owner(pool, id, email, Some(display_name)).await?;
    }

    let this_month = first_of_month(Local::now().date_naive());
    let last_month = this_month
        .checked_sub_months(Months::new(1))
        .context("invalid date")?;

    let lines = vec![
        ("seed-001", Some("aj@sfdata.com"), 12_500.0, last_month),
        ("seed-002", Some("aj@sfdata.com"), 9_800.0, this_month),
        ("seed-003", Some("kiriti@sfdata.com"), 7_200.0, last_month),
        ("seed-004", Some("kiriti@sfdata.com"), 4_100.0, this_month),
        ("seed-005", None, 650.0, this_month),
    ];

    for (source_key, email, amount, ordered_at) in lines {
        let owner_id = match email {
            Some(email) => Some(owner_id_for(pool, email).await?),
            None => None,
        };
        insert_line(pool, owner_id, amount, ordered_at, source_key).await?;
    }

    info!("seed data inserted");
    Ok(())
}

async fn upsert_owner(
    pool: &PgPool,
    id: Uuid,
    email: &str,
    display_name: Option<&str>,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO ae_revenue.owners (id, email, display_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET display_name = COALESCE(EXCLUDED.display_name, ae_revenue.owners.display_name)
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(display_name)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn owner_id_for(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query("SELECT id FROM ae_revenue.owners WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .with_context(|| format!("unknown owner {email}"))?
        .get("id");
    Ok(id)
}

/// Returns true when the line was new.
async fn insert_line(
    pool: &PgPool,
    owner_id: Option<Uuid>,
    amount: f64,
    ordered_at: NaiveDate,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO ae_revenue.revenue_lines
        (id, owner_id, amount, ordered_at, source_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(amount)
    .bind(ordered_at)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        owner_email: Option<String>,
        amount: f64,
        ordered_at: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid row {}", line + 1))?;
        anyhow::ensure!(
            row.amount >= 0.0,
            "row {} has a negative amount",
            line + 1
        );

        let owner_id = match row.owner_email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() && email != NO_OWNER => {
                Some(upsert_owner(pool, Uuid::new_v4(), email, None).await?)
            }
            _ => None,
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_line(pool, owner_id, row.amount, row.ordered_at, &source_key).await? {
            inserted += 1;
        } else {
            debug!(%source_key, "skipping duplicate line");
        }
    }

    Ok(inserted)
}

/// Revenue per owner per month for every month in `[from, to]`.
pub async fn fetch_monthly_totals(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<MonthlyTotal>> {
    let end = to
        .checked_add_months(Months::new(1))
        .context("month window out of range")?;

    let rows = sqlx::query(
        r#"
        SELECT COALESCE(o.email, '(no owner)') AS owner_email,
               date_trunc('month', l.ordered_at)::date AS revenue_month,
               SUM(l.amount) AS total
        FROM ae_revenue.revenue_lines l
        LEFT JOIN ae_revenue.owners o ON o.id = l.owner_id
        WHERE l.ordered_at >= $1 AND l.ordered_at < $2
        GROUP BY 1, 2
        ORDER BY 1, 2
        "#,
    )
    .bind(from)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut totals = Vec::new();
    for row in rows {
        totals.push(MonthlyTotal {
            owner_email: row.get("owner_email"),
            month: row.get("revenue_month"),
            total: row.get("total"),
        });
    }

    Ok(totals)
}

/// One record per owner, sorted by email, carrying every month key in
/// the window (null where the owner had no revenue that month).
pub fn pivot_monthly_totals(totals: &[MonthlyTotal], months: &[NaiveDate]) -> Vec<PersonRevenueRecord> {
    let mut by_owner: BTreeMap<&str, HashMap<NaiveDate, f64>> = BTreeMap::new();
    for total in totals {
        *by_owner
            .entry(total.owner_email.as_str())
            .or_default()
            .entry(first_of_month(total.month))
            .or_insert(0.0) += total.total;
    }

    by_owner
        .into_iter()
        .map(|(owner, amounts)| PersonRevenueRecord {
            owner_email: owner.to_string(),
            months: months
                .iter()
                .map(|month| MonthRevenue {
                    month_key: models::month_key_for(*month),
                    amount: amounts.get(month).copied(),
                })
                .collect(),
        })
        .collect()
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of every month from `from` to `to`, inclusive.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut cursor = first_of_month(from);
    let end = first_of_month(to);
    while cursor <= end {
        months.push(cursor);
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    months
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .with_context(|| format!("expected a month as YYYY-MM, got `{value}`"))
}

/// The window ending with the current month.
pub fn default_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let to = first_of_month(today);
    let from = to
        .checked_sub_months(Months::new(DEFAULT_WINDOW_MONTHS - 1))
        .unwrap_or(to);
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn total(owner: &str, month: NaiveDate, amount: f64) -> MonthlyTotal {
        MonthlyTotal {
            owner_email: owner.to_string(),
            month,
            total: amount,
        }
    }

    #[test]
    fn window_defaults_to_five_months() {
        let (from, to) = default_window(date(2025, 5, 20));
        assert_eq!(from, date(2025, 1, 1));
        assert_eq!(to, date(2025, 5, 1));
        assert_eq!(months_between(from, to).len(), 5);
    }

    #[test]
    fn window_crosses_year_boundary() {
        let months = months_between(date(2024, 11, 15), date(2025, 2, 1));
        assert_eq!(
            months,
            vec![date(2024, 11, 1), date(2024, 12, 1), date(2025, 1, 1), date(2025, 2, 1)]
        );
        assert!(months_between(date(2025, 3, 1), date(2025, 1, 1)).is_empty());
    }

    #[test]
    fn parses_month_arguments() {
        assert_eq!(parse_month("2025-03").unwrap(), date(2025, 3, 1));
        assert!(parse_month("March").is_err());
        assert!(parse_month("2025-13").is_err());
    }

    #[test]
    fn pivot_fills_every_month_and_sorts_owners() {
        let months = months_between(date(2025, 1, 1), date(2025, 3, 1));
        let totals = vec![
            total("kiriti@sfdata.com", date(2025, 3, 1), 40.0),
            total(NO_OWNER, date(2025, 2, 1), 5.0),
            total("aj@sfdata.com", date(2025, 1, 1), 100.0),
            total("aj@sfdata.com", date(2025, 3, 1), 200.0),
        ];

        let records = pivot_monthly_totals(&totals, &months);
        let owners: Vec<&str> = records.iter().map(|r| r.owner_email.as_str()).collect();
        assert_eq!(owners, vec![NO_OWNER, "aj@sfdata.com", "kiriti@sfdata.com"]);

        let aj = &records[1];
        let keys: Vec<&str> = aj.month_keys().collect();
        assert_eq!(keys, vec!["jan_2025", "feb_2025", "mar_2025"]);
        assert_eq!(aj.revenue_for("jan_2025"), Some(100.0));
        assert_eq!(aj.revenue_for("feb_2025"), None);
        assert_eq!(aj.revenue_for("mar_2025"), Some(200.0));
    }

    #[test]
    fn pivot_of_nothing_is_empty() {
        let months = months_between(date(2025, 1, 1), date(2025, 3, 1));
        assert!(pivot_monthly_totals(&[], &months).is_empty());
    }
}
