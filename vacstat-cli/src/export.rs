//! SQLite export of converted vacancies
//!
//! Table `vacancies(name, salary, area_name, published_at)`, one row per
//! convertible record, salary in the base currency. Writing replaces the
//! table.

use crate::dataset::converted;
use crate::error::Result;
use sqlx::SqlitePool;
use tracing::info;
use vacstat_common::{RateLookup, RawVacancy};

/// Table holding the converted vacancies
pub const VACANCIES_TABLE: &str = "vacancies";

/// Replace the vacancies table with every convertible record
///
/// Returns the number of rows written.
pub async fn write_converted_db(
    pool: &SqlitePool,
    records: &[RawVacancy],
    rates: &dyn RateLookup,
) -> Result<usize> {
    let rows = converted(records, rates);

    let mut tx = pool.begin().await?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", VACANCIES_TABLE))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE {} (
            name TEXT NOT NULL,
            salary REAL NOT NULL,
            area_name TEXT NOT NULL,
            published_at TEXT NOT NULL
        )",
        VACANCIES_TABLE
    ))
    .execute(&mut *tx)
    .await?;

    let insert = format!(
        "INSERT INTO {} (name, salary, area_name, published_at) VALUES (?, ?, ?, ?)",
        VACANCIES_TABLE
    );
    for (record, salary) in &rows {
        sqlx::query(&insert)
            .bind(&record.name)
            .bind(*salary)
            .bind(&record.region)
            .bind(&record.published_at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(
        written = rows.len(),
        skipped = records.len() - rows.len(),
        "Converted vacancies table written"
    );
    Ok(rows.len())
}
