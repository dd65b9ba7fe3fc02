use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

/// A row from the `customers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Upserts a customer by email: latest name and phone win on an existing
/// match. Matching is case-insensitive while the stored email keeps its
/// original casing.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the lookup or write fails.
pub async fn upsert_customer(
    conn: &mut PgConnection,
    full_name: &str,
    email: &str,
    phone: Option<&str>,
) -> Result<CustomerRow, sqlx::Error> {
    let existing = sqlx::query_as::<_, CustomerRow>(
        "SELECT * FROM customers WHERE LOWER(email) = LOWER($1) LIMIT 1",
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(customer) = existing {
        let updated = sqlx::query_as::<_, CustomerRow>(
            "UPDATE customers SET \
                 full_name = $2, \
                 phone     = COALESCE($3, phone) \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(customer.id)
        .bind(full_name)
        .bind(phone)
        .fetch_one(&mut *conn)
        .await?;
        return Ok(updated);
    }

    sqlx::query_as::<_, CustomerRow>(
        "INSERT INTO customers (full_name, email, phone) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(full_name)
    .bind(email)
    .bind(phone)
    .fetch_one(&mut *conn)
    .await
}

/// Pool-level convenience wrapper for the standalone customer endpoint.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the upsert fails.
pub async fn upsert_customer_pool(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    phone: Option<&str>,
) -> Result<CustomerRow, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let customer = upsert_customer(&mut tx, full_name, email, phone).await?;
    tx.commit().await?;
    Ok(customer)
}
