use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::domain::{Usage, YearMonth};

/// Delete the meter's usage rows whose (year, month) lies in `from..=to`.
pub async fn delete_usage_range(
    conn: &mut PgConnection,
    meter_id: i64,
    from: YearMonth,
    to: YearMonth,
) -> Result<u64, sqlx::Error> {
    // Row comparison keeps the range lexicographic across year boundaries.
    let result = sqlx::query(
        r#"
        DELETE FROM usages
        WHERE meter_id = $1
          AND (year, month) >= ($2, $3)
          AND (year, month) <= ($4, $5)
        "#,
    )
    .bind(meter_id)
    .bind(from.year())
    .bind(i32::from(from.month()))
    .bind(to.year())
    .bind(i32::from(to.month()))
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn insert_usage(
    conn: &mut PgConnection,
    meter_id: i64,
    period: YearMonth,
    usage: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO usages (meter_id, year, month, usage)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(meter_id)
    .bind(period.year())
    .bind(i32::from(period.month()))
    .bind(usage)
    .execute(conn)
    .await
    .map(|_| ())
}

/// All usage rows of a meter, oldest month first.
pub async fn list_usages(conn: &mut PgConnection, meter_id: i64) -> Result<Vec<Usage>, sqlx::Error> {
    sqlx::query_as::<_, Usage>(
        r#"
        SELECT meter_id, year, month, usage
        FROM usages
        WHERE meter_id = $1
        ORDER BY year, month
        "#,
    )
    .bind(meter_id)
    .fetch_all(conn)
    .await
}
