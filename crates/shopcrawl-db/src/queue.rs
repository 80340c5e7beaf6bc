//! Database operations for the `crawl_tasks` queue table.
//!
//! Delivery is at-least-once. [`lease_next_task`] hands a row to exactly one
//! consumer for the lease duration; [`ack_task`] deletes it; [`release_task`]
//! puts it back after a delay. A consumer that disappears without doing
//! either loses its lease when `lease_expires_at` passes, and the row is
//! leased again by someone else.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{secs_param, DbError};

/// A row handed out by [`lease_next_task`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeasedTaskRow {
    pub id: i64,
    pub payload: serde_json::Value,
    /// Proof of ownership; ack and release only apply while it still matches.
    pub lease_token: Uuid,
    /// Number of times this row has been leased, including this one.
    pub attempts: i32,
}

/// Inserts messages into `queue` in one statement, in the given order.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn publish_tasks(
    pool: &PgPool,
    queue: &str,
    payloads: &[serde_json::Value],
) -> Result<u64, DbError> {
    if payloads.is_empty() {
        return Ok(0);
    }

    let inserted = sqlx::query(
        "INSERT INTO crawl_tasks (queue, payload) \
         SELECT $1, msg.value \
         FROM jsonb_array_elements($2::jsonb) WITH ORDINALITY AS msg(value, ord) \
         ORDER BY msg.ord",
    )
    .bind(queue)
    .bind(serde_json::Value::Array(payloads.to_vec()))
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted)
}

/// Leases the oldest available message in `queue` for `lease_secs` seconds.
///
/// A row is available when it is `ready` and its `available_at` has passed,
/// or when it is `leased` but the lease has expired. Concurrent consumers
/// skip rows locked by each other, so a row is never leased twice at once.
///
/// Returns `None` when nothing is available right now.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn lease_next_task(
    pool: &PgPool,
    queue: &str,
    lease_secs: u64,
) -> Result<Option<LeasedTaskRow>, DbError> {
    let row = sqlx::query_as::<_, LeasedTaskRow>(
        "UPDATE crawl_tasks AS t \
         SET status = 'leased', \
             lease_token = $2, \
             lease_expires_at = NOW() + make_interval(secs => $3::double precision), \
             attempts = t.attempts + 1 \
         WHERE t.id = ( \
             SELECT id FROM crawl_tasks \
             WHERE queue = $1 \
               AND ((status = 'ready' AND available_at <= NOW()) \
                 OR (status = 'leased' AND lease_expires_at <= NOW())) \
             ORDER BY id \
             FOR UPDATE SKIP LOCKED \
             LIMIT 1 \
         ) \
         RETURNING t.id, t.payload, t.lease_token, t.attempts",
    )
    .bind(queue)
    .bind(Uuid::new_v4())
    .bind(secs_param(lease_secs))
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Acknowledges a leased message by deleting it.
///
/// Returns `false` if the lease was no longer held (it expired and the row
/// was leased again, or it was already acknowledged).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn ack_task(pool: &PgPool, id: i64, lease_token: Uuid) -> Result<bool, DbError> {
    let deleted = sqlx::query("DELETE FROM crawl_tasks WHERE id = $1 AND lease_token = $2")
        .bind(id)
        .bind(lease_token)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(deleted > 0)
}

/// Returns a leased message to the queue, available again after `delay_secs`.
///
/// `reason` is kept in `last_error` for operators. Returns `false` if the
/// lease was no longer held.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn release_task(
    pool: &PgPool,
    id: i64,
    lease_token: Uuid,
    delay_secs: u64,
    reason: &str,
) -> Result<bool, DbError> {
    let updated = sqlx::query(
        "UPDATE crawl_tasks \
         SET status = 'ready', \
             lease_token = NULL, \
             lease_expires_at = NULL, \
             available_at = NOW() + make_interval(secs => $3::double precision), \
             last_error = $4 \
         WHERE id = $1 AND lease_token = $2",
    )
    .bind(id)
    .bind(lease_token)
    .bind(secs_param(delay_secs))
    .bind(reason)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(updated > 0)
}
