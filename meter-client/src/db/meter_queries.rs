use sqlx::PgConnection;

use crate::domain::Meter;

pub async fn insert_meter(conn: &mut PgConnection, name: &str, unit: &str) -> Result<Meter, sqlx::Error> {
    sqlx::query_as::<_, Meter>(
        r#"
        INSERT INTO meters (name, unit)
        VALUES ($1, $2)
        RETURNING id, name, unit
        "#,
    )
    .bind(name)
    .bind(unit)
    .fetch_one(conn)
    .await
}

pub async fn find_meter(conn: &mut PgConnection, meter_id: i64) -> Result<Option<Meter>, sqlx::Error> {
    sqlx::query_as::<_, Meter>("SELECT id, name, unit FROM meters WHERE id = $1")
        .bind(meter_id)
        .fetch_optional(conn)
        .await
}

pub async fn find_meter_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Meter>, sqlx::Error> {
    sqlx::query_as::<_, Meter>("SELECT id, name, unit FROM meters WHERE name = $1")
        .bind(name)
        .fetch_optional(conn)
        .await
}

/// Lock the meter row for the rest of the transaction.
///
/// Every reading mutation takes this lock first, which serializes usage
/// recalculation per meter.
pub async fn lock_meter(conn: &mut PgConnection, meter_id: i64) -> Result<Option<Meter>, sqlx::Error> {
    sqlx::query_as::<_, Meter>("SELECT id, name, unit FROM meters WHERE id = $1 FOR UPDATE")
        .bind(meter_id)
        .fetch_optional(conn)
        .await
}

/// Readings and usages go with the meter (`ON DELETE CASCADE`).
pub async fn delete_meter(conn: &mut PgConnection, meter_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM meters WHERE id = $1")
        .bind(meter_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
