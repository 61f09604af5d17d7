use sqlx::PgConnection;
use time::Date;

use crate::domain::{NewReading, Reading};

pub async fn insert_reading(conn: &mut PgConnection, reading: &NewReading) -> Result<Reading, sqlx::Error> {
    sqlx::query_as::<_, Reading>(
        r#"
        INSERT INTO readings (meter_id, date, reading, remark)
        VALUES ($1, $2, $3, $4)
        RETURNING id, meter_id, date, reading, remark
        "#,
    )
    .bind(reading.meter_id)
    .bind(reading.date)
    .bind(reading.reading)
    .bind(&reading.remark)
    .fetch_one(conn)
    .await
}

pub async fn get_reading(conn: &mut PgConnection, reading_id: i64) -> Result<Option<Reading>, sqlx::Error> {
    sqlx::query_as::<_, Reading>(
        "SELECT id, meter_id, date, reading, remark FROM readings WHERE id = $1",
    )
    .bind(reading_id)
    .fetch_optional(conn)
    .await
}

/// Fetch the reading and lock its row for the rest of the transaction.
///
/// Concurrent edits of the same reading wait here and then see the committed
/// row, so a snapshot taken this way cannot go stale before commit.
pub async fn get_reading_for_update(conn: &mut PgConnection, reading_id: i64) -> Result<Option<Reading>, sqlx::Error> {
    sqlx::query_as::<_, Reading>(
        "SELECT id, meter_id, date, reading, remark FROM readings WHERE id = $1 FOR UPDATE",
    )
    .bind(reading_id)
    .fetch_optional(conn)
    .await
}

pub async fn update_reading(conn: &mut PgConnection, reading: &Reading) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE readings
        SET meter_id = $2,
            date = $3,
            reading = $4,
            remark = $5
        WHERE id = $1
        "#,
    )
    .bind(reading.id)
    .bind(reading.meter_id)
    .bind(reading.date)
    .bind(reading.reading)
    .bind(&reading.remark)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_reading(conn: &mut PgConnection, reading_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM readings WHERE id = $1")
        .bind(reading_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Latest reading of the meter before `date` (`strict`) or on/before it.
pub async fn latest_reading_before(
    conn: &mut PgConnection,
    meter_id: i64,
    date: Date,
    strict: bool,
) -> Result<Option<Reading>, sqlx::Error> {
    let sql = if strict {
        r#"
        SELECT id, meter_id, date, reading, remark
        FROM readings
        WHERE meter_id = $1
          AND date < $2
        ORDER BY date DESC
        LIMIT 1
        "#
    } else {
        r#"
        SELECT id, meter_id, date, reading, remark
        FROM readings
        WHERE meter_id = $1
          AND date <= $2
        ORDER BY date DESC
        LIMIT 1
        "#
    };

    sqlx::query_as::<_, Reading>(sql)
        .bind(meter_id)
        .bind(date)
        .fetch_optional(conn)
        .await
}

/// Earliest reading of the meter after `date` (`strict`) or on/after it.
pub async fn earliest_reading_after(
    conn: &mut PgConnection,
    meter_id: i64,
    date: Date,
    strict: bool,
) -> Result<Option<Reading>, sqlx::Error> {
    let sql = if strict {
        r#"
        SELECT id, meter_id, date, reading, remark
        FROM readings
        WHERE meter_id = $1
          AND date > $2
        ORDER BY date
        LIMIT 1
        "#
    } else {
        r#"
        SELECT id, meter_id, date, reading, remark
        FROM readings
        WHERE meter_id = $1
          AND date >= $2
        ORDER BY date
        LIMIT 1
        "#
    };

    sqlx::query_as::<_, Reading>(sql)
        .bind(meter_id)
        .bind(date)
        .fetch_optional(conn)
        .await
}

/// Dates of the first and last reading of a meter, if it has any.
pub async fn reading_span(conn: &mut PgConnection, meter_id: i64) -> Result<Option<(Date, Date)>, sqlx::Error> {
    let row: (Option<Date>, Option<Date>) =
        sqlx::query_as("SELECT MIN(date), MAX(date) FROM readings WHERE meter_id = $1")
            .bind(meter_id)
            .fetch_one(conn)
            .await?;

    Ok(match row {
        (Some(first), Some(last)) => Some((first, last)),
        _ => None,
    })
}
